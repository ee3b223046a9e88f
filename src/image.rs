use crate::{Error, Result};
use derive_more::{Deref, DerefMut};
use image::{DynamicImage, GrayImage, ImageBuffer, Pixel, RgbImage, RgbaImage};
use ndarray::{Array3, ArrayView3, ArrayViewMut3};

/// A borrowed fisheye disc, laid out as `(row, column, channel)`.
///
/// The view may be strided; cropping the disc out of a larger frame never
/// copies pixels. An empty disc cannot be constructed.
#[derive(Debug, Clone, Copy)]
pub struct SourceDisc<'a> {
    pixels: ArrayView3<'a, u8>,
}

impl<'a> SourceDisc<'a> {
    pub fn new(pixels: ArrayView3<'a, u8>) -> Result<Self> {
        let (height, width, channels) = pixels.dim();
        if width == 0 || height == 0 || channels == 0 {
            return Err(Error::InvalidSource(format!(
                "fisheye disc is {width}x{height} with {channels} channels"
            )));
        }
        Ok(Self { pixels })
    }

    /// Borrow a whole `image` crate buffer as a disc.
    pub fn from_image<P>(image: &'a ImageBuffer<P, Vec<u8>>) -> Result<Self>
    where
        P: Pixel<Subpixel = u8>,
    {
        Self::new(frame_view(image))
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    pub fn view(&self) -> ArrayView3<'a, u8> {
        self.pixels
    }
}

/// View an `image` crate buffer as a `(row, column, channel)` array without copying.
pub fn frame_view<P>(image: &ImageBuffer<P, Vec<u8>>) -> ArrayView3<'_, u8>
where
    P: Pixel<Subpixel = u8>,
{
    let shape = (
        image.height() as usize,
        image.width() as usize,
        P::CHANNEL_COUNT as usize,
    );
    ArrayView3::from_shape(shape, image.as_raw().as_slice())
        .expect("image buffer length always matches its dimensions")
}

/// An owned destination image, initialized to the black background.
///
/// This is a thin wrapper around an `ndarray` so tiles of it can be handed
/// to different workers as disjoint mutable views.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deref, DerefMut)]
pub struct Canvas(pub Array3<u8>);

impl Canvas {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self(Array3::zeros((height, width, channels)))
    }

    pub fn width(&self) -> usize {
        self.0.dim().1
    }

    pub fn height(&self) -> usize {
        self.0.dim().0
    }

    pub fn channels(&self) -> usize {
        self.0.dim().2
    }

    /// The color channels of the pixel at column `x`, row `y`.
    ///
    /// Panics if the pixel is outside of the canvas.
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let (height, width, channels) = self.0.dim();
        assert!(
            x < width && y < height,
            "pixel ({x}, {y}) is outside of the {width}x{height} canvas"
        );
        let start = (y * width + x) * channels;
        &self.as_slice()[start..start + channels]
    }

    pub fn view_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        self.0.view_mut()
    }

    /// The pixels in row-major interleaved order.
    pub fn as_slice(&self) -> &[u8] {
        self.0
            .as_slice()
            .expect("canvases are always allocated in standard layout")
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.0.into_raw_vec()
    }

    /// Convert into a `DynamicImage`, picking the pixel type from the channel count.
    ///
    /// Returns `None` for channel counts the `image` crate has no 8-bit type for.
    pub fn into_dynamic(self) -> Option<DynamicImage> {
        let (width, height) = (self.width() as u32, self.height() as u32);
        Some(match self.channels() {
            1 => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, self.into_raw())?),
            3 => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, self.into_raw())?),
            4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, self.into_raw())?),
            _ => return None,
        })
    }

    pub fn into_rgb(self) -> Option<RgbImage> {
        match self.into_dynamic()? {
            DynamicImage::ImageRgb8(image) => Some(image),
            _ => None,
        }
    }
}

impl<P> From<&ImageBuffer<P, Vec<u8>>> for Canvas
where
    P: Pixel<Subpixel = u8>,
{
    fn from(image: &ImageBuffer<P, Vec<u8>>) -> Self {
        Self(frame_view(image).to_owned())
    }
}
