use crate::{
    remap::Placement, Canvas, DiscGeometry, EngineSettings, Error, IndexTable, Layout, Region,
    Remapper, Result, Sampling, SourceDisc, TileGrid, ViewAngles, ViewParameters,
};
use image::{ImageBuffer, Pixel};
use log::*;
use ndarray::ArrayView3;

/// Whether a view's index table still matches its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableState {
    /// The table is missing or was built for different inputs.
    Stale,
    /// The table matches the current view, destination, sampling and disc.
    Fresh,
}

#[derive(Debug, Clone)]
struct ViewSlot {
    params: ViewParameters,
    table: Option<IndexTable>,
    state: TableState,
}

impl ViewSlot {
    fn new(params: ViewParameters) -> Self {
        Self {
            params,
            table: None,
            state: TableState::Stale,
        }
    }

    fn invalidate(&mut self) {
        self.state = TableState::Stale;
    }
}

/// Turns fisheye frames into one or more rectilinear views.
///
/// The engine keeps an [`IndexTable`] per view and only rebuilds the ones
/// whose inputs changed since the last frame. Rebuilds happen on the calling
/// thread at the start of a remap; the gather itself is spread over a fixed
/// pool of workers, one per tile. A failed call leaves the engine as it was.
#[derive(Debug)]
pub struct Engine {
    slots: Vec<ViewSlot>,
    width: usize,
    height: usize,
    layout: Layout,
    sampling: Sampling,
    /// The disc the tables were last built against.
    disc: Option<DiscGeometry>,
    remapper: Remapper,
}

impl Engine {
    pub fn new(settings: &EngineSettings) -> Result<Self> {
        let views = settings
            .views
            .iter()
            .map(|&angles| ViewParameters::from_angles(angles))
            .collect::<Result<Vec<_>>>()?;
        let mut engine = Self::from_views(views, settings.width, settings.height, settings.tiles)?;
        engine.set_layout(settings.layout)?;
        engine.set_sampling(settings.sampling)?;
        Ok(engine)
    }

    /// An engine with separate canvases and unit sampling.
    pub fn from_views(
        views: Vec<ViewParameters>,
        width: usize,
        height: usize,
        tiles: TileGrid,
    ) -> Result<Self> {
        check_destination(width, height)?;
        let slots = make_slots(views)?;
        let remapper = Remapper::new(tiles)?;
        info!(
            "Created engine with {} views of {}x{}",
            slots.len(),
            width,
            height
        );
        Ok(Self {
            slots,
            width,
            height,
            layout: Layout::default(),
            sampling: Sampling::default(),
            disc: None,
            remapper,
        })
    }

    pub fn view_count(&self) -> usize {
        self.slots.len()
    }

    pub fn view(&self, index: usize) -> Result<&ViewParameters> {
        Ok(&self.slot(index)?.params)
    }

    pub fn state(&self, index: usize) -> Result<TableState> {
        Ok(self.slot(index)?.state)
    }

    /// The last table built for a view, which may be stale.
    pub fn table(&self, index: usize) -> Result<Option<&IndexTable>> {
        Ok(self.slot(index)?.table.as_ref())
    }

    /// `(width, height)` of each view's block.
    pub fn destination_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    pub fn tiles(&self) -> TileGrid {
        self.remapper.grid()
    }

    pub fn disc(&self) -> Option<&DiscGeometry> {
        self.disc.as_ref()
    }

    /// `(width, height)` of every canvas a remap returns.
    pub fn canvas_size(&self) -> (usize, usize) {
        self.layout
            .arrange(self.slots.len(), self.width, self.height)
            .canvas_size
    }

    /// Point view `index` somewhere else. Setting the current parameters again
    /// keeps its table.
    pub fn set_view(&mut self, index: usize, params: ViewParameters) -> Result<()> {
        params.validate()?;
        let slot = self.slot_mut(index)?;
        if slot.params == params {
            return Ok(());
        }
        debug!("View {} changed to {:?}", index, params);
        slot.params = params;
        slot.invalidate();
        Ok(())
    }

    pub fn set_view_angles(&mut self, index: usize, angles: ViewAngles) -> Result<()> {
        self.set_view(index, ViewParameters::from_angles(angles)?)
    }

    /// Replace all views, possibly changing their number.
    ///
    /// Views that keep their index and parameters keep their tables.
    pub fn set_views(&mut self, views: Vec<ViewParameters>) -> Result<()> {
        let mut slots = make_slots(views)?;
        for (slot, old) in slots.iter_mut().zip(self.slots.drain(..)) {
            if slot.params == old.params {
                *slot = old;
            }
        }
        self.slots = slots;
        Ok(())
    }

    pub fn set_destination_size(&mut self, width: usize, height: usize) -> Result<()> {
        check_destination(width, height)?;
        if (width, height) != (self.width, self.height) {
            debug!("Destination resized to {}x{}", width, height);
            self.width = width;
            self.height = height;
            self.invalidate_all();
        }
        Ok(())
    }

    pub fn set_sampling(&mut self, sampling: Sampling) -> Result<()> {
        if let Sampling::Ratio {
            horizontal,
            vertical,
        } = sampling
        {
            if !(horizontal.is_finite() && horizontal > 0.0 && vertical.is_finite() && vertical > 0.0)
            {
                return Err(Error::InvalidParameters(format!(
                    "sampling ratios {horizontal} x {vertical} must be positive"
                )));
            }
        }
        if sampling != self.sampling {
            self.sampling = sampling;
            self.invalidate_all();
        }
        Ok(())
    }

    pub fn set_layout(&mut self, layout: Layout) -> Result<()> {
        if layout == (Layout::Grid { columns: 0 }) {
            return Err(Error::InvalidParameters(
                "grid layout needs at least one column".to_owned(),
            ));
        }
        if layout != self.layout {
            self.layout = layout;
            self.invalidate_all();
        }
        Ok(())
    }

    /// Crop `region` out of `frame` and remap it.
    pub fn remap(&mut self, frame: ArrayView3<'_, u8>, region: Region) -> Result<Vec<Canvas>> {
        let disc = region.crop(frame)?;
        self.remap_disc(&disc)
    }

    /// [`Engine::remap`] for an `image` crate buffer.
    pub fn remap_image<P>(
        &mut self,
        frame: &ImageBuffer<P, Vec<u8>>,
        region: Region,
    ) -> Result<Vec<Canvas>>
    where
        P: Pixel<Subpixel = u8>,
    {
        self.remap(crate::frame_view(frame), region)
    }

    /// Remap an already cropped disc, rebuilding stale tables first.
    ///
    /// Returns one canvas per view for [`Layout::Separate`] and a single
    /// composite for [`Layout::Grid`]. Pixels no view maps to stay black.
    pub fn remap_disc(&mut self, source: &SourceDisc<'_>) -> Result<Vec<Canvas>> {
        let disc = DiscGeometry::new(source.width(), source.height())?;
        if self.disc.map(|known| known.size()) != Some(disc.size()) {
            if let Some(known) = self.disc {
                info!(
                    "Disc changed from {}x{} to {}x{}, rebuilding all tables",
                    known.width, known.height, disc.width, disc.height
                );
            }
            self.disc = Some(disc);
            self.invalidate_all();
        }
        self.refresh(&disc);

        let arrangement = self
            .layout
            .arrange(self.slots.len(), self.width, self.height);
        let (canvas_width, canvas_height) = arrangement.canvas_size;
        let mut canvases: Vec<Canvas> = (0..arrangement.canvas_count)
            .map(|_| Canvas::new(canvas_width, canvas_height, source.channels()))
            .collect();
        let mut placements: Vec<Vec<Placement<'_>>> = vec![Vec::new(); canvases.len()];
        for (slot, &(canvas, offset)) in self.slots.iter().zip(&arrangement.placements) {
            if let Some(table) = &slot.table {
                placements[canvas].push(Placement::new(table, offset));
            }
        }
        let jobs = placements
            .iter()
            .map(Vec::as_slice)
            .zip(canvases.iter_mut())
            .collect();
        self.remapper.apply_all(source, jobs)?;
        Ok(canvases)
    }

    fn refresh(&mut self, disc: &DiscGeometry) {
        let (width, height, sampling) = (self.width, self.height, self.sampling);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.state == TableState::Stale {
                trace!("Rebuilding table of view {}", index);
                slot.table = Some(IndexTable::build_sampled(
                    &slot.params,
                    disc,
                    width,
                    height,
                    sampling,
                ));
                slot.state = TableState::Fresh;
            }
        }
    }

    fn invalidate_all(&mut self) {
        self.slots.iter_mut().for_each(ViewSlot::invalidate);
    }

    fn slot(&self, index: usize) -> Result<&ViewSlot> {
        let count = self.slots.len();
        self.slots
            .get(index)
            .ok_or(Error::NoSuchView { index, count })
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut ViewSlot> {
        let count = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or(Error::NoSuchView { index, count })
    }
}

fn check_destination(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDestination { width, height });
    }
    Ok(())
}

fn make_slots(views: Vec<ViewParameters>) -> Result<Vec<ViewSlot>> {
    if views.is_empty() {
        return Err(Error::InvalidParameters(
            "an engine needs at least one view".to_owned(),
        ));
    }
    views
        .into_iter()
        .map(|params| {
            params.validate()?;
            Ok(ViewSlot::new(params))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_view;
    use image::{Rgb, RgbImage};

    fn engine() -> Engine {
        let views = vec![
            ViewParameters::new(0.0, 0.7, 1.6).unwrap(),
            ViewParameters::new(3.0, 0.9, 1.2).unwrap(),
        ];
        Engine::from_views(views, 32, 24, TileGrid::new(2, 2)).unwrap()
    }

    fn frame() -> RgbImage {
        RgbImage::from_fn(80, 60, |x, y| Rgb([x as u8, y as u8, 1]))
    }

    #[test]
    fn views_start_stale_and_become_fresh() {
        let mut engine = engine();
        assert_eq!(engine.state(0).unwrap(), TableState::Stale);
        assert!(engine.table(1).unwrap().is_none());
        let frame = frame();
        let canvases = engine.remap_image(&frame, Region::whole(80, 60)).unwrap();
        assert_eq!(canvases.len(), 2);
        assert_eq!(engine.state(0).unwrap(), TableState::Fresh);
        assert_eq!(engine.state(1).unwrap(), TableState::Fresh);
        assert_eq!(engine.disc().unwrap().size(), (80, 60));
    }

    #[test]
    fn same_parameters_are_a_no_op() {
        let mut engine = engine();
        let frame = frame();
        engine.remap(frame_view(&frame), Region::whole(80, 60)).unwrap();
        let view = *engine.view(1).unwrap();
        engine.set_view(1, view).unwrap();
        assert_eq!(engine.state(1).unwrap(), TableState::Fresh);
        engine.set_destination_size(32, 24).unwrap();
        engine.set_layout(Layout::Separate).unwrap();
        engine.set_sampling(Sampling::Unit).unwrap();
        assert_eq!(engine.state(0).unwrap(), TableState::Fresh);
    }

    #[test]
    fn global_changes_invalidate_every_view() {
        let mut engine = engine();
        let frame = frame();
        engine.remap_image(&frame, Region::whole(80, 60)).unwrap();
        engine.set_sampling(Sampling::FitDisc).unwrap();
        assert_eq!(engine.state(0).unwrap(), TableState::Stale);
        assert_eq!(engine.state(1).unwrap(), TableState::Stale);

        engine.remap_image(&frame, Region::whole(80, 60)).unwrap();
        engine.remap_image(&frame, Region::new(0, 0, 60, 60)).unwrap();
        assert_eq!(engine.table(0).unwrap().unwrap().disc().size(), (60, 60));
        assert_eq!(engine.state(0).unwrap(), TableState::Fresh);
    }

    #[test]
    fn invalid_input_is_rejected_without_changes() {
        let mut engine = engine();
        let before = *engine.view(0).unwrap();
        assert!(matches!(
            engine.set_view(0, ViewParameters { fov: 0.0, ..before }),
            Err(Error::InvalidParameters(_))
        ));
        assert!(matches!(
            engine.set_view(2, before),
            Err(Error::NoSuchView { index: 2, count: 2 })
        ));
        assert!(matches!(
            engine.set_destination_size(0, 10),
            Err(Error::InvalidDestination { width: 0, height: 10 })
        ));
        assert!(engine.set_layout(Layout::Grid { columns: 0 }).is_err());
        assert!(engine
            .set_sampling(Sampling::Ratio {
                horizontal: -1.0,
                vertical: 1.0
            })
            .is_err());
        assert_eq!(engine.view(0).unwrap(), &before);
        assert_eq!(engine.destination_size(), (32, 24));
        assert_eq!(engine.layout(), Layout::Separate);
        assert_eq!(engine.sampling(), Sampling::Unit);
    }

    #[test]
    fn oversized_tile_grid_is_rejected() {
        let views = vec![ViewParameters::new(0.0, 0.7, 1.6).unwrap()];
        assert!(matches!(
            Engine::from_views(views, 32, 24, TileGrid::new(500, 500)),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn set_views_keeps_matching_tables() {
        let mut engine = engine();
        let frame = frame();
        engine.remap_image(&frame, Region::whole(80, 60)).unwrap();
        let first = *engine.view(0).unwrap();
        let third = ViewParameters::new(1.0, 0.2, 0.9).unwrap();
        engine.set_views(vec![first, third, third]).unwrap();
        assert_eq!(engine.view_count(), 3);
        assert_eq!(engine.state(0).unwrap(), TableState::Fresh);
        assert_eq!(engine.state(1).unwrap(), TableState::Stale);
        assert_eq!(engine.state(2).unwrap(), TableState::Stale);
        assert!(engine.set_views(Vec::new()).is_err());
        assert_eq!(engine.view_count(), 3);
    }
}
