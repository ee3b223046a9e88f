use crate::{Layout, Sampling, TileGrid, ViewAngles};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The settings an [`Engine`](crate::Engine) is created from.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// The virtual cameras, in degrees
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_views"))]
    pub views: Vec<ViewAngles>,
    /// The width of each view's destination image
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_width"))]
    pub width: usize,
    /// The height of each view's destination image
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_height"))]
    pub height: usize,
    /// Whether views get their own canvas or share one
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub layout: Layout,
    /// How destination pixels are spread over the image plane
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub sampling: Sampling,
    /// The tiles each canvas is split into, one remap worker per tile
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub tiles: TileGrid,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            views: default_views(),
            width: default_width(),
            height: default_height(),
            layout: Layout::default(),
            sampling: Sampling::default(),
            tiles: TileGrid::default(),
        }
    }
}

fn default_views() -> Vec<ViewAngles> {
    vec![
        ViewAngles::new(0.0, 50.0, 95.0),
        ViewAngles::new(180.0, 55.0, 100.0),
        ViewAngles::new(270.0, 45.0, 85.0),
    ]
}

fn default_width() -> usize {
    480
}

fn default_height() -> usize {
    360
}
