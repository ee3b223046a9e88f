use fishview::Unwrapper;
use fisheye_unwrap::{ContourDetector, Engine, Layout, Region, Threshold};
use log::*;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "fishview",
    about = "A tool to unwrap fisheye frames into perspective views"
)]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `fisheye_unwrap::EngineSettings`. Defaults are
    /// used if the file doesn't exist.
    #[structopt(short, long, default_value = "fishview.json")]
    settings: PathBuf,
    /// The directory the views are written to.
    #[structopt(short, long, default_value = ".", parse(from_os_str))]
    output: PathBuf,
    /// Brightness level above which pixels belong to the fisheye disc.
    #[structopt(short, long, default_value = "40")]
    threshold: u8,
    /// Pick the disc threshold per frame with Otsu's method instead.
    #[structopt(long)]
    otsu: bool,
    /// Pick the disc threshold at the histogram trough after the dark border.
    #[structopt(long, conflicts_with = "otsu")]
    trough: bool,
    /// Use a fixed disc region `x,y,width,height` instead of detecting it.
    #[structopt(short, long, parse(try_from_str = parse_region))]
    region: Option<Region>,
    /// Detect the disc on every frame instead of only the first one.
    #[structopt(long)]
    redetect: bool,
    /// Compose all views into one canvas with this many columns.
    #[structopt(long)]
    grid: Option<usize>,
    /// The image files to unwrap, in order.
    #[structopt(parse(from_os_str))]
    images: Vec<PathBuf>,
}

fn parse_region(src: &str) -> Result<Region, String> {
    let values = src
        .split(',')
        .map(|value| value.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    match values[..] {
        [x, y, width, height] => Ok(Region::new(x, y, width, height)),
        _ => Err(format!("expected x,y,width,height but got {src:?}")),
    }
}

fn main() -> fishview::Result<()> {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let mut settings = fishview::load_settings(&opt.settings)?;
    if let Some(columns) = opt.grid {
        settings.layout = Layout::Grid { columns };
    }
    let engine = Engine::new(&settings)?;

    let threshold = if opt.otsu {
        Threshold::Otsu
    } else if opt.trough {
        Threshold::Trough
    } else {
        Threshold::Fixed(opt.threshold)
    };
    let detector = ContourDetector::new(threshold);
    match opt.region {
        Some(region) => run(Unwrapper::new(engine, region, false), &opt),
        None => run(Unwrapper::new(engine, detector, opt.redetect), &opt),
    }
}

fn run<D>(mut unwrapper: Unwrapper<D>, opt: &Opt) -> fishview::Result<()>
where
    D: fisheye_unwrap::RegionDetector,
{
    for path in &opt.images {
        info!("unwrapping {}", path.display());
        let frame = image::open(path)?.to_rgb8();
        let canvases = unwrapper.unwrap_frame(&frame)?;
        fishview::save_canvases(&opt.output, path, canvases)?;
    }
    info!(
        "wrote {} frames of {} views",
        opt.images.len(),
        unwrapper.engine().view_count()
    );
    Ok(())
}
