//! Unwraps circular fisheye images into rectilinear views.
//!
//! Each view is a virtual perspective camera looking out of the fisheye lens
//! in some direction (`pan`, `tilt`) with some field of view. For every view
//! an [`IndexTable`] records which disc pixel each destination pixel copies
//! from, so per frame remapping is a plain gather that is split into tiles
//! and run on a small worker pool.
//!
//! ```no_run
//! use fisheye_unwrap::{ContourDetector, Engine, EngineSettings, RegionDetector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let frame = image::open("frame.png")?.to_rgb8();
//! let region = ContourDetector::default()
//!     .detect(&frame)
//!     .ok_or("no fisheye disc in frame")?;
//! let mut engine = Engine::new(&EngineSettings::default())?;
//! for (index, canvas) in engine.remap_image(&frame, region)?.into_iter().enumerate() {
//!     if let Some(image) = canvas.into_rgb() {
//!         image.save(format!("view-{index}.png"))?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod image;
mod index_table;
mod projector;
mod region;
mod remap;
mod settings;
mod view;

pub use crate::image::{frame_view, Canvas, SourceDisc};
pub use engine::{Engine, TableState};
pub use error::{Error, Result};
pub use index_table::{Arrangement, IndexTable, Layout, Sampling, SourceIndex};
pub use projector::{project, ViewBasis};
pub use region::{ContourDetector, Region, RegionDetector, Threshold};
pub use remap::{remap_serial, remap_tile, Placement, Remapper, Tile, TileGrid};
pub use settings::EngineSettings;
pub use view::{DiscGeometry, ViewAngles, ViewParameters};
