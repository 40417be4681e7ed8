use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{Circle, Ellipse, Line, Polyline, PrimitiveStyle, Rectangle},
    text::{self, Text, TextStyleBuilder},
};

use super::{Color, Image};

fn point(x: f32, y: f32) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

fn stroke(color: Color, stroke_width: u32) -> PrimitiveStyle<Color> {
    PrimitiveStyle::with_stroke(color, stroke_width)
}

fn infallible(res: Result<(), Infallible>) {
    match res {
        Ok(()) => {}
        Err(infallible) => match infallible {},
    }
}

/// Guard returned by [`draw_line`]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start: (f32, f32),
    end: (f32, f32),
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width. Defaults to 1.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        let line = Line::new(
            point(self.start.0, self.start.1),
            point(self.end.0, self.end.1),
        );
        infallible(
            line.into_styled(stroke(self.color, self.stroke_width))
                .draw(&mut Target(&mut *self.image)),
        );
    }
}

/// Guard returned by [`draw_polyline`].
pub struct DrawPolyline<'a> {
    image: &'a mut Image,
    points: Vec<Point>,
    color: Color,
    stroke_width: u32,
}

impl DrawPolyline<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the stroke width. Defaults to 1.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawPolyline<'_> {
    fn drop(&mut self) {
        if self.points.len() < 2 {
            return;
        }
        infallible(
            Polyline::new(&self.points)
                .into_styled(stroke(self.color, self.stroke_width))
                .draw(&mut Target(&mut *self.image)),
        );
    }
}

/// Guard returned by [`draw_circle`].
pub struct DrawCircle<'a> {
    image: &'a mut Image,
    center: (f32, f32),
    radius: f32,
    color: Color,
}

impl DrawCircle<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawCircle<'_> {
    fn drop(&mut self) {
        let diameter = (self.radius * 2.0).round().max(1.0) as u32;
        let circle = Circle::with_center(point(self.center.0, self.center.1), diameter);
        infallible(
            circle
                .into_styled(PrimitiveStyle::with_fill(self.color))
                .draw(&mut Target(&mut *self.image)),
        );
    }
}

/// Guard returned by [`draw_ellipse`].
pub struct DrawEllipse<'a> {
    image: &'a mut Image,
    center: (f32, f32),
    radii: (f32, f32),
    color: Color,
    stroke_width: u32,
}

impl DrawEllipse<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the stroke width. Defaults to 1.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawEllipse<'_> {
    fn drop(&mut self) {
        let size = Size::new(
            (self.radii.0 * 2.0).round() as u32,
            (self.radii.1 * 2.0).round() as u32,
        );
        if size.width == 0 || size.height == 0 {
            return;
        }
        let ellipse = Ellipse::with_center(point(self.center.0, self.center.1), size);
        infallible(
            ellipse
                .into_styled(stroke(self.color, self.stroke_width))
                .draw(&mut Target(&mut *self.image)),
        );
    }
}

/// Guard returned by [`draw_text`].
pub struct DrawText<'a> {
    image: &'a mut Image,
    x: f32,
    y: f32,
    text: &'a str,
    color: Color,
    baseline: text::Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Aligns the top of the text with the anchor point.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = text::Baseline::Top;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(&FONT_10X20, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(text::Alignment::Left)
            .baseline(self.baseline)
            .build();
        let text = Text::with_text_style(
            self.text,
            point(self.x, self.y),
            character_style,
            text_style,
        );
        match text.draw(&mut Target(&mut *self.image)) {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a straight line.
pub fn draw_line(image: &mut Image, x0: f32, y0: f32, x1: f32, y1: f32) -> DrawLine<'_> {
    DrawLine {
        image,
        start: (x0, y0),
        end: (x1, y1),
        color: Color::BLACK,
        stroke_width: 1,
    }
}

/// Draws connected line segments through `points`.
///
/// Fewer than two points draw nothing.
pub fn draw_polyline<'a>(image: &'a mut Image, points: &[(f32, f32)]) -> DrawPolyline<'a> {
    DrawPolyline {
        image,
        points: points.iter().map(|&(x, y)| point(x, y)).collect(),
        color: Color::BLACK,
        stroke_width: 1,
    }
}

/// Draws a filled circle.
pub fn draw_circle(image: &mut Image, x: f32, y: f32, radius: f32) -> DrawCircle<'_> {
    DrawCircle {
        image,
        center: (x, y),
        radius,
        color: Color::BLACK,
    }
}

/// Draws the outline of an axis-aligned ellipse.
pub fn draw_ellipse(
    image: &mut Image,
    x: f32,
    y: f32,
    radius_x: f32,
    radius_y: f32,
) -> DrawEllipse<'_> {
    DrawEllipse {
        image,
        center: (x, y),
        radii: (radius_x, radius_y),
        color: Color::BLACK,
        stroke_width: 1,
    }
}

/// Draws a text string.
///
/// By default, the text starts at `x` and sits on the baseline at `y`.
pub fn draw_text<'a>(image: &'a mut Image, x: f32, y: f32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        x,
        y,
        text,
        color: Color::BLACK,
        baseline: text::Baseline::Alphabetic,
    }
}

/// Alpha-blends every drawn pixel onto the image, clipping to its bounds.
struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle {
            top_left: Point::zero(),
            size: Size::new(self.0.width(), self.0.height()),
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            if pos.x >= 0 && pos.y >= 0 {
                self.0.blend_pixel(pos.x as u32, pos.y as u32, color);
            }
        }
        Ok(())
    }
}
