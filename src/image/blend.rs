use super::{Color, Image};

/// How source pixels are combined with destination pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Destination pixels are replaced by the source pixels.
    Overwrite,

    /// Source-over compositing, making the source appear in front of the destination.
    Alpha,
}

/// A compositing operation of one image onto another.
///
/// Returned by [`Image::blend_from`]. The images are aligned at their top left corners and only
/// the overlapping area is touched. The operation runs when this guard is dropped.
pub struct Blend<'a> {
    dest: &'a mut Image,
    src: &'a Image,
    mode: BlendMode,
}

impl<'a> Blend<'a> {
    pub(super) fn new(dest: &'a mut Image, src: &'a Image) -> Self {
        Self {
            dest,
            src,
            mode: BlendMode::Alpha,
        }
    }

    /// Sets the blend mode. Defaults to [`BlendMode::Alpha`].
    pub fn mode(&mut self, mode: BlendMode) -> &mut Self {
        self.mode = mode;
        self
    }
}

impl Drop for Blend<'_> {
    fn drop(&mut self) {
        let width = self.dest.width().min(self.src.width());
        let height = self.dest.height().min(self.src.height());
        for y in 0..height {
            for x in 0..width {
                let src = self.src.get(x, y);
                let result = match self.mode {
                    BlendMode::Overwrite => src,
                    BlendMode::Alpha => blend_alpha(self.dest.get(x, y), src),
                };
                self.dest.set(x, y, result);
            }
        }
    }
}

/// Composites `src` over `dest`.
///
/// Like a 2D canvas, this operates on the sRGB values directly.
pub fn blend_alpha(dest: Color, src: Color) -> Color {
    match src.a() {
        255 => return src,
        0 => return dest,
        _ => {}
    }

    let src_a = f32::from(src.a()) / 255.0;
    let dest_a = f32::from(dest.a()) / 255.0;
    let out_a = src_a + dest_a * (1.0 - src_a);

    let channel = |i: usize| {
        let s = f32::from(src[i]);
        let d = f32::from(dest[i]);
        let v = (s * src_a + d * dest_a * (1.0 - src_a)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };

    Color([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round() as u8,
    ])
}
