//! Image handling for the 2D overlay.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA canvas.
//! - [`Color`], including parsing of the clamped `rgba(...)` values used for depth tinting.
//! - Freestanding `draw_*` functions that draw alpha-blended shapes onto an [`Image`].

mod blend;
mod draw;

#[cfg(test)]
mod tests;

use std::{fmt, ops::Index, path::Path};

use anyhow::{bail, Context};
use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{imageops, ImageBuffer, Rgba, RgbaImage};

pub use blend::*;
pub use draw::*;

/// Standard deviation of the blur applied to the background frame, in pixels.
pub const BACKGROUND_BLUR: f32 = 8.0;

/// Returns whether `path` has an extension [`Image::load`] accepts, ignoring case.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            matches!(&*ext.to_ascii_lowercase(), "png" | "jpg" | "jpeg")
        })
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    buf: RgbaImage,
}

impl Image {
    /// Creates an image filled with transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image from tightly packed RGBA8 data.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> anyhow::Result<Self> {
        let len = data.len();
        match ImageBuffer::from_raw(width, height, data) {
            Some(buf) => Ok(Self { buf }),
            None => bail!("{len} bytes of RGBA data do not make up a {width}x{height} image"),
        }
    }

    /// Loads a PNG or JPEG image from the filesystem.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !is_image_path(path) {
            bail!(
                "invalid image path '{}' (expected a .png, .jpg or .jpeg file)",
                path.display()
            );
        }
        let buf = image::open(path)
            .with_context(|| format!("failed to load image '{}'", path.display()))?
            .to_rgba8();
        Ok(Self { buf })
    }

    /// Saves the image. The format is derived from the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        self.buf
            .save(path)
            .with_context(|| format!("failed to save image '{}'", path.display()))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the color of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf.get_pixel(x, y).0)
    }

    /// Sets the pixel at `(x, y)` to `color`, ignoring coordinates outside the image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        if x < self.width() && y < self.height() {
            self.buf.put_pixel(x, y, Rgba(color.0));
        }
    }

    /// Composites `color` over the pixel at `(x, y)`.
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x < self.width() && y < self.height() {
            let dest = self.get(x, y);
            self.set(x, y, blend_alpha(dest, color));
        }
    }

    /// Fills the whole image with `color`.
    pub fn clear(&mut self, color: Color) {
        for pixel in self.buf.pixels_mut() {
            pixel.0 = color.0;
        }
    }

    /// Returns a resized copy of the image.
    pub fn resized(&self, width: u32, height: u32) -> Image {
        if (width, height) == (self.width(), self.height()) {
            return self.clone();
        }
        Image {
            buf: imageops::resize(&self.buf, width, height, imageops::FilterType::Triangle),
        }
    }

    /// Returns a desaturated and blurred copy of the image.
    pub fn grayscale_blurred(&self, sigma: f32) -> Image {
        let mut gray = self.buf.clone();
        for pixel in gray.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            let luma = 0.2126 * f32::from(r) + 0.7152 * f32::from(g) + 0.0722 * f32::from(b);
            let luma = luma.round().clamp(0.0, 255.0) as u8;
            pixel.0 = [luma, luma, luma, a];
        }
        Image {
            buf: imageops::blur(&gray, sigma),
        }
    }

    /// Draws `src` at the origin through a grayscale and blur filter.
    pub fn draw_background(&mut self, src: &Image) {
        let filtered = src.grayscale_blurred(BACKGROUND_BLUR);
        self.blend_from(&filtered).mode(BlendMode::Alpha);
    }

    /// Composites `src` onto `self`, with their top left corners aligned.
    ///
    /// Returns a guard that performs the operation when dropped.
    pub fn blend_from<'b>(&'b mut self, src: &'b Image) -> Blend<'b> {
        Blend::new(self, src)
    }

    /// Iterates over the RGBA values of all pixels, row by row.
    pub fn pixels(&self) -> impl Iterator<Item = Color> + '_ {
        self.buf.pixels().map(|p| Color(p.0))
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image @ {}x{}", self.width(), self.height())
    }
}

/// An 8-bit RGBA color.
///
/// Colors are in the sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black.
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Converts a CSS `rgba(r, g, b, a)` color.
    ///
    /// Like in CSS, the color channels are rounded and clamped to `0..=255` and the alpha value is
    /// clamped to `0.0..=1.0`, so out of range tints saturate instead of wrapping.
    pub fn from_css_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        fn channel(v: f32) -> u8 {
            if v.is_nan() {
                return 0;
            }
            v.round().clamp(0.0, 255.0) as u8
        }
        let a = if a.is_nan() { 0.0 } else { a.clamp(0.0, 1.0) };
        Self([channel(r), channel(g), channel(b), channel(a * 255.0)])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }

    pub fn with_alpha(mut self, a: u8) -> Color {
        self.0[3] = a;
        self
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl Index<usize> for Color {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}
