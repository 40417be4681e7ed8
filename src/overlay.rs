//! The 2D overlay back-end.
//!
//! Draws detection results over a desaturated, blurred copy of the input frame. Depth is shown as
//! a tint: points closer to the camera (negative z) shift towards green, points further away
//! shift towards red.

use crate::image::{draw_circle, draw_ellipse, draw_line, draw_polyline, draw_text, Color, Image};
use crate::result::{
    BodyResult, DetectionResult, FaceResult, HandResult, Point, FACE_MESH_POINTS_WITH_IRIS,
};

const BODY_LINE_WIDTH: u32 = 12;
const HAND_LINE_WIDTH: u32 = 12;
const KEYPOINT_RADIUS: f32 = 12.0;
const FACE_POINT_RADIUS: f32 = 4.0;
const MESH_LINE_WIDTH: u32 = 2;
const OUTLINE_LINE_WIDTH: u32 = 4;
const IRIS_LINE_WIDTH: u32 = 2;

/// Tint offset applied to the lip outlines.
const LIPS_OFFSET: [f32; 3] = [50.0, -25.0, -25.0];

const IRIS_COLOR: Color = Color::from_rgba8(255, 200, 255, 255);

/// Fingers connected by the hand overlay, in drawing order.
const FINGERS: [&str; 5] = ["index", "middle", "ring", "pinky", "thumb"];

/// Selects which face layers are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayOptions {
    /// Draw every face mesh point.
    pub draw_points: bool,
    /// Draw the face annotation outlines (eyes, brows, lips, etc.).
    pub draw_outlines: bool,
    /// Draw the triangulated face mesh wireframe.
    pub draw_meshes: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            draw_points: false,
            draw_outlines: true,
            draw_meshes: true,
        }
    }
}

/// Depth tint of a point or line.
pub fn depth_color(z: f32, offset: [f32; 3]) -> Color {
    Color::from_css_rgba(
        127.5 + 2.0 * z + offset[0],
        127.5 - 2.0 * z + offset[1],
        255.0 + offset[2],
        0.5,
    )
}

/// Tint of the `i`-th segment of a finger.
fn finger_color(i: usize, z: f32) -> Color {
    let i = i as f32;
    Color::from_css_rgba(127.5 + i * z, 127.5 - i * 2.0 * z, 255.0, 0.5)
}

pub struct Overlay {
    triangulation: Vec<usize>,
    options: OverlayOptions,
}

impl Overlay {
    /// Creates an overlay renderer.
    ///
    /// `triangulation` lists face mesh indices, three per triangle.
    pub fn new(triangulation: Vec<usize>) -> Self {
        if triangulation.len() % 3 != 0 {
            log::warn!(
                "face triangulation has {} indices, ignoring the trailing {}",
                triangulation.len(),
                triangulation.len() % 3
            );
        }
        Self {
            triangulation,
            options: OverlayOptions::default(),
        }
    }

    pub fn options(&self) -> OverlayOptions {
        self.options
    }

    pub fn set_options(&mut self, options: OverlayOptions) {
        self.options = options;
    }

    /// Draws `result` onto `canvas`.
    ///
    /// `width` and `height` are the dimensions of the detector input the result refers to. When
    /// `input` is given it is drawn first as the background, otherwise the canvas is cleared.
    pub fn draw(
        &self,
        canvas: &mut Image,
        input: Option<&Image>,
        width: u32,
        height: u32,
        result: &DetectionResult,
    ) {
        match input {
            Some(frame) => canvas.draw_background(frame),
            None => canvas.clear(Color::NULL),
        }

        let scale = [
            width as f32 / canvas.width() as f32,
            height as f32 / canvas.height() as f32,
        ];
        let mut painter = Painter { canvas, scale };

        if let Some(face) = result.face.first() {
            painter.face(face, &self.triangulation, self.options);
        }
        if let Some(body) = result.body.first() {
            painter.body(body);
        }
        if !result.hand.is_empty() {
            painter.hands(&result.hand);
        }
    }
}

struct Painter<'a> {
    canvas: &'a mut Image,
    scale: [f32; 2],
}

impl Painter<'_> {
    /// Maps a detector-space point onto the canvas.
    fn norm(&self, p: Point) -> Point {
        Point::new(p.x / self.scale[0], p.y / self.scale[1], p.z)
    }

    fn point(&mut self, p: Point, radius: f32, label: Option<&str>) {
        let color = depth_color(p.z, [0.0; 3]);
        if let Some(label) = label {
            draw_text(self.canvas, p.x + radius, p.y + radius, label).color(color);
        }
        draw_circle(self.canvas, p.x, p.y, radius).color(color);
    }

    /// Strokes a polyline in the tint of its last point.
    fn lines(&mut self, points: &[Point], width: u32, offset: [f32; 3]) {
        let Some(last) = points.last() else { return };
        if points.len() < 2 {
            return;
        }
        let coords = points
            .iter()
            .map(|p| (p.x, p.y.round()))
            .collect::<Vec<_>>();
        draw_polyline(self.canvas, &coords)
            .color(depth_color(last.z, offset))
            .stroke_width(width);
    }

    fn face(&mut self, face: &FaceResult, triangulation: &[usize], options: OverlayOptions) {
        if face.mesh.len() != FACE_MESH_POINTS_WITH_IRIS {
            return;
        }
        let (cw, ch) = (self.canvas.width() as f32, self.canvas.height() as f32);

        if options.draw_points {
            for p in &face.mesh_raw {
                self.point(Point::new(p.x * cw, p.y * ch, p.z), FACE_POINT_RADIUS, None);
            }
        }

        if options.draw_meshes {
            for tri in triangulation.chunks_exact(3) {
                let points = tri
                    .iter()
                    .map(|&i| {
                        let raw = face.mesh_raw.get(i)?;
                        let z = face.mesh.get(i)?.z;
                        Some(Point::new(raw.x * cw, raw.y * ch, z))
                    })
                    .collect::<Option<Vec<_>>>();
                match points {
                    Some(points) => self.lines(&points, MESH_LINE_WIDTH, [0.0; 3]),
                    None => log::trace!("skipping triangle {tri:?} outside of the face mesh"),
                }
            }
        }

        if options.draw_outlines {
            for (name, line) in &face.annotations {
                let offset = if name.starts_with("lips") {
                    LIPS_OFFSET
                } else {
                    [0.0; 3]
                };
                let line = line.iter().map(|&p| self.norm(p)).collect::<Vec<_>>();
                self.lines(&line, OUTLINE_LINE_WIDTH, offset);
            }
        }

        for iris in ["leftEyeIris", "rightEyeIris"] {
            self.iris(face.annotation(iris));
        }
    }

    fn iris(&mut self, iris: &[Point]) {
        let [center, p1, p2, p3, p4, ..] = iris else {
            return;
        };
        let radius_x = (p3.x - p1.x).abs() / 2.0 / self.scale[0];
        let radius_y = (p4.y - p2.y).abs() / 2.0 / self.scale[1];
        let center = self.norm(*center);
        draw_ellipse(self.canvas, center.x, center.y, radius_x, radius_y)
            .color(IRIS_COLOR)
            .stroke_width(IRIS_LINE_WIDTH);
    }

    fn body(&mut self, body: &BodyResult) {
        for kpt in &body.keypoints {
            if kpt.score <= 0.0 {
                continue;
            }
            let label = format!("{} {}%", kpt.part, (100.0 * kpt.score).trunc());
            self.point(self.norm(kpt.position), KEYPOINT_RADIUS, Some(&label));
        }

        for lines in body.annotations.values() {
            for line in lines {
                let line = line.iter().map(|&p| self.norm(p)).collect::<Vec<_>>();
                self.lines(&line, BODY_LINE_WIDTH, [0.0; 3]);
            }
        }
    }

    fn hands(&mut self, hands: &[HandResult]) {
        for hand in hands {
            for &kpt in &hand.keypoints {
                self.point(self.norm(kpt), KEYPOINT_RADIUS, None);
            }

            for finger in FINGERS {
                let points = hand.finger(finger);
                for (i, &p) in points.iter().enumerate() {
                    let from = self.norm(points[i.saturating_sub(1)]);
                    let to = self.norm(p);
                    draw_line(self.canvas, from.x, from.y, to.x, to.y)
                        .color(finger_color(i, p.z))
                        .stroke_width(HAND_LINE_WIDTH);
                }
            }
        }
    }
}
