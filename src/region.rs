//! Locating the fisheye disc inside a raw camera frame.

use crate::{Error, Result, SourceDisc};
use image::{imageops, GrayImage, RgbImage};
use imageproc::{
    contours::{find_contours, BorderType, Contour},
    contrast::{otsu_level, threshold},
    stats::histogram,
};
use log::*;
use ndarray::{s, ArrayView3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle of a frame, in pixels.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The region covering all of a `width` x `height` frame.
    pub fn whole(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Borrow this region of `frame` as a disc.
    ///
    /// The result is a strided view into `frame`; no pixels are copied. Fails
    /// if the region is empty or reaches outside of the frame.
    pub fn crop<'a>(&self, frame: ArrayView3<'a, u8>) -> Result<SourceDisc<'a>> {
        let (frame_height, frame_width, _) = frame.dim();
        let x_end = self.x.checked_add(self.width);
        let y_end = self.y.checked_add(self.height);
        match (x_end, y_end) {
            (Some(x_end), Some(y_end))
                if self.area() != 0 && x_end <= frame_width && y_end <= frame_height =>
            {
                SourceDisc::new(frame.slice_move(s![self.y..y_end, self.x..x_end, ..]))
            }
            _ => Err(Error::InvalidSource(format!(
                "region {}x{} at ({}, {}) does not fit in a {}x{} frame",
                self.width, self.height, self.x, self.y, frame_width, frame_height
            ))),
        }
    }
}

/// Finds the fisheye disc in a raw frame.
pub trait RegionDetector {
    /// The bounding rectangle of the disc, if one was found.
    fn detect(&self, frame: &RgbImage) -> Option<Region>;
}

/// A fixed region is a detector that always finds itself.
impl RegionDetector for Region {
    fn detect(&self, _: &RgbImage) -> Option<Region> {
        Some(*self)
    }
}

/// How [`ContourDetector`] binarizes a frame.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// Pixels brighter than this level are foreground.
    Fixed(u8),
    /// Pick the level per frame with Otsu's method.
    Otsu,
    /// Cut just before the histogram rises again after the dark border's peak.
    ///
    /// Falls back to the default fixed level if the histogram has no such trough.
    Trough,
}

const DEFAULT_LEVEL: u8 = 40;

impl Default for Threshold {
    fn default() -> Self {
        Self::Fixed(DEFAULT_LEVEL)
    }
}

/// The border around the disc is dark but rarely black.
const BORDER_LEVELS: std::ops::Range<usize> = 15..80;
/// Minimum growth between neighboring bins that counts as the disc rising.
const RISE: i64 = 10;

/// Find the level at which pixels stop belonging to the dark border.
///
/// Takes the tallest bin among the border levels, walks right until the
/// counts fall below half of it, then keeps walking until they start to rise
/// again. Levels from that rise on are foreground.
fn trough_level(bins: &[u32; 256]) -> Option<u8> {
    let mut peak = 0;
    let mut peak_count = 0;
    for level in BORDER_LEVELS {
        if bins[level] > peak_count {
            peak = level;
            peak_count = bins[level];
        }
    }
    if peak_count == 0 {
        return None;
    }
    let fallen = (peak..bins.len()).find(|&level| bins[level] < peak_count / 2)?;
    let rise = (fallen..bins.len())
        .find(|&level| i64::from(bins[level]) - i64::from(bins[level - 1]) >= RISE)?;
    // `threshold` keeps levels strictly above the cut.
    Some((rise - 1) as u8)
}

/// Detects the disc as the largest bright blob against the dark border
/// that fisheye lenses leave around the image circle.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContourDetector {
    pub threshold: Threshold,
}

impl ContourDetector {
    pub fn new(threshold: Threshold) -> Self {
        Self { threshold }
    }

    fn binarize(&self, frame: &RgbImage) -> GrayImage {
        let gray = imageops::grayscale(frame);
        let level = match self.threshold {
            Threshold::Fixed(level) => level,
            Threshold::Otsu => otsu_level(&gray),
            Threshold::Trough => {
                trough_level(&histogram(&gray).channels[0]).unwrap_or_else(|| {
                    debug!("No histogram trough, using the default level");
                    DEFAULT_LEVEL
                })
            }
        };
        trace!("Binarizing frame at level {}", level);
        threshold(&gray, level)
    }
}

impl RegionDetector for ContourDetector {
    fn detect(&self, frame: &RgbImage) -> Option<Region> {
        let binary = self.binarize(frame);
        let contours = find_contours::<u32>(&binary);
        let region = contours
            .iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer))
            .filter_map(bounding_box)
            .max_by_key(Region::area);
        match region {
            Some(region) => debug!(
                "Found disc {:?} among {} contours",
                region,
                contours.len()
            ),
            None => warn!("No disc found in {}x{} frame", frame.width(), frame.height()),
        }
        region
    }
}

fn bounding_box(contour: &Contour<u32>) -> Option<Region> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y) = (first.x, first.y);
    let (mut max_x, mut max_y) = (first.x, first.y);
    for point in &contour.points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    Some(Region::new(
        min_x as usize,
        min_y as usize,
        (max_x - min_x) as usize + 1,
        (max_y - min_y) as usize + 1,
    ))
}
