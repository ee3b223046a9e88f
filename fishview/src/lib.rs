use fisheye_unwrap::{Canvas, Engine, EngineSettings, Region, RegionDetector};
use image::RgbImage;
use log::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read settings: {0}")]
    Settings(#[from] serde_json::Error),
    #[error("failed to open settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("image i/o failed: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Unwrap(#[from] fisheye_unwrap::Error),
    #[error("view {0} has a channel count that can't be saved")]
    Unsaveable(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Load settings from a JSON file, or the defaults if the file doesn't exist.
pub fn load_settings(path: &Path) -> Result<EngineSettings> {
    match std::fs::File::open(path) {
        Ok(file) => {
            let settings = serde_json::from_reader(std::io::BufReader::new(file))?;
            info!("loaded settings from {}", path.display());
            Ok(settings)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("used default settings");
            Ok(EngineSettings::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Runs the engine over a sequence of frames from the same camera.
///
/// The disc is located once on the first frame and reused afterwards,
/// unless `redetect` is set.
pub struct Unwrapper<D> {
    engine: Engine,
    detector: D,
    region: Option<Region>,
    redetect: bool,
}

impl<D> Unwrapper<D>
where
    D: RegionDetector,
{
    pub fn new(engine: Engine, detector: D, redetect: bool) -> Self {
        Self {
            engine,
            detector,
            region: None,
            redetect,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn region(&self) -> Option<Region> {
        self.region
    }

    pub fn unwrap_frame(&mut self, frame: &RgbImage) -> Result<Vec<Canvas>> {
        let region = match self.region {
            Some(region) if !self.redetect => region,
            _ => {
                let region = self.detector.detect(frame).unwrap_or_else(|| {
                    warn!("no disc detected, using the whole frame");
                    Region::whole(frame.width() as usize, frame.height() as usize)
                });
                info!("using disc region {:?}", region);
                self.region = Some(region);
                region
            }
        };
        Ok(self.engine.remap_image(frame, region)?)
    }
}

/// `<output>/<stem>-view<index>.png`
pub fn output_path(output: &Path, input: &Path, index: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_owned());
    output.join(format!("{stem}-view{index}.png"))
}

/// Write every canvas of a frame next to each other in `output`.
pub fn save_canvases(output: &Path, input: &Path, canvases: Vec<Canvas>) -> Result<()> {
    for (index, canvas) in canvases.into_iter().enumerate() {
        let path = output_path(output, input, index);
        let image = canvas.into_dynamic().ok_or(Error::Unsaveable(index))?;
        image.save(&path)?;
        debug!("wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fisheye_unwrap::{ContourDetector, TileGrid, ViewParameters};
    use image::Rgb;

    fn frame(center: i64) -> RgbImage {
        RgbImage::from_fn(100, 80, |x, y| {
            let (dx, dy) = (x as i64 - center, y as i64 - 40);
            if dx * dx + dy * dy <= 25 * 25 {
                Rgb([220, 220, 220])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    fn unwrapper(redetect: bool) -> Unwrapper<ContourDetector> {
        let engine = Engine::from_views(
            vec![ViewParameters::new(0.0, 0.5, 1.5).unwrap()],
            20,
            20,
            TileGrid::new(1, 2),
        )
        .unwrap();
        Unwrapper::new(engine, ContourDetector::default(), redetect)
    }

    #[test]
    fn region_is_detected_once() {
        let mut unwrapper = unwrapper(false);
        unwrapper.unwrap_frame(&frame(40)).unwrap();
        assert_eq!(unwrapper.region(), Some(Region::new(15, 15, 51, 51)));
        unwrapper.unwrap_frame(&frame(50)).unwrap();
        assert_eq!(unwrapper.region(), Some(Region::new(15, 15, 51, 51)));
    }

    #[test]
    fn region_follows_the_disc_when_redetecting() {
        let mut unwrapper = unwrapper(true);
        unwrapper.unwrap_frame(&frame(40)).unwrap();
        unwrapper.unwrap_frame(&frame(50)).unwrap();
        assert_eq!(unwrapper.region(), Some(Region::new(25, 15, 51, 51)));
    }

    #[test]
    fn blank_frame_uses_everything() {
        let mut unwrapper = unwrapper(false);
        let canvases = unwrapper.unwrap_frame(&RgbImage::new(30, 30)).unwrap();
        assert_eq!(canvases.len(), 1);
        assert_eq!(unwrapper.region(), Some(Region::whole(30, 30)));
    }

    #[test]
    fn output_names_follow_input() {
        assert_eq!(
            output_path(Path::new("out"), Path::new("in/cam-0007.jpg"), 2),
            Path::new("out/cam-0007-view2.png")
        );
    }

    #[test]
    fn missing_settings_are_defaulted() {
        let settings = load_settings(Path::new("does/not/exist.json")).unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn unreadable_settings_are_an_error() {
        assert!(load_settings(Path::new(env!("CARGO_MANIFEST_DIR"))).is_err());
        // A path through a regular file fails with something other than NotFound.
        let through_file = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("Cargo.toml")
            .join("settings.json");
        assert!(matches!(load_settings(&through_file), Err(Error::Io(_))));
    }
}
