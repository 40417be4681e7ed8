//! The 3D skeleton back-end.
//!
//! Body parts and fingers become tubes with a sphere at every joint, the face becomes a textured
//! surface. On the first result the camera is moved so that it frames the detected subject.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::bail;
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::Vector3;

use crate::result::{
    BodyResult, DetectionResult, FaceResult, HandResult, Point, FACE_MESH_POINTS,
    FACE_MESH_POINTS_WITH_IRIS,
};
use crate::scene::anim::{Easing, Property, Tween};
use crate::scene::geometry::{self, Cap, MeshData};
use crate::scene::{MaterialKind, MeshKind, Scene, ScenePreset, SceneMesh};

/// Duration of the automatic camera move on the first result.
const CENTER_MS: f64 = 1000.0;

/// Ring segments of body and finger tubes.
const TUBE_TESSELLATION: u32 = 64;

/// Base diameter of the head sphere; it grows with the eye distance through its scaling.
const HEAD_DIAMETER: f32 = 0.1;
const IRIS_DIAMETER: f32 = 0.5;
const AUGMENT_DIAMETER: f32 = 0.005;

/// Camera and light preset selected by [`MeshRenderer::focus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    /// Only resets the renderer.
    None,
    Face,
    Hand,
    Body,
}

impl FromStr for FocusTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "" | "none" => Self::None,
            "face" => Self::Face,
            "hand" => Self::Hand,
            "body" => Self::Body,
            _ => bail!("unknown focus target '{s}' (expected face, hand or body)"),
        })
    }
}

/// Distance between the ends of a path, scaled down to scene units.
fn path_length(path: &[Vector3<f32>]) -> f32 {
    match (path.first(), path.last()) {
        (Some(first), Some(last)) => (first - last).norm() * 0.1,
        _ => 0.0,
    }
}

pub struct MeshRenderer {
    scene: Scene,
    /// Set once the camera has been moved towards the subject.
    initialized: bool,
    triangulation: Vec<u32>,
    uvmap: Vec<[f32; 2]>,
    /// Number of joint spheres of every drawn path.
    joints: BTreeMap<String, usize>,
    augments: usize,
}

impl MeshRenderer {
    pub fn new() -> Self {
        Self {
            scene: Scene::new(ScenePreset::Skeleton {
                camera_radius: 2.0,
                intro_ms: 1000.0,
            }),
            initialized: false,
            triangulation: Vec::new(),
            uvmap: Vec::new(),
            joints: BTreeMap::new(),
            augments: 0,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Resets the renderer and stores the face mesh topology.
    ///
    /// Every mesh created so far is disposed; the camera is moved again on the next result.
    pub fn init(&mut self, triangulation: Vec<u32>, uvmap: Vec<[f32; 2]>) {
        self.initialized = false;
        if triangulation.len() % 3 != 0 {
            warn!(
                "face triangulation has {} indices, which is not a multiple of 3",
                triangulation.len()
            );
        }
        self.triangulation = triangulation;
        self.uvmap = uvmap;

        let names = self
            .scene
            .meshes()
            .map(|mesh| mesh.name.clone())
            .collect::<Vec<_>>();
        for name in &names {
            self.scene.dispose(name);
        }
        self.joints.clear();
        self.augments = 0;
        debug!("mesh renderer reset, disposed {} meshes", names.len());
    }

    /// Moves the camera so that it frames `points` over `ms` milliseconds.
    ///
    /// The target moves to the center of the x/y range at `z = 0`, the camera to the top of that
    /// range at `z = -13`. Zero coordinates are treated as missing.
    pub fn center_camera(&mut self, ms: f64, points: &[Point]) {
        self.initialized = true;

        let range = |axis: fn(&Point) -> f32| {
            points
                .iter()
                .map(axis)
                .filter(|c| *c != 0.0 && !c.is_nan())
                .minmax_by(f32::total_cmp)
                .into_option()
        };
        let (Some((min_x, max_x)), Some((min_y, max_y))) = (range(|p| p.x), range(|p| p.y)) else {
            info!("no usable points to center the camera on, keeping it in place");
            return;
        };

        let cx = (max_x - min_x) / 2.0 + min_x;
        let cy = (max_y - min_y) / 2.0 + min_y;
        let moves = [
            (Property::CameraTargetX, cx),
            (Property::CameraTargetY, cy),
            (Property::CameraTargetZ, 0.0),
            (Property::CameraPositionX, cx),
            (Property::CameraPositionY, max_y),
            (Property::CameraPositionZ, -13.0),
        ];
        for (property, to) in moves {
            let from = self.scene.property(property);
            self.scene
                .animate(Tween::new(property, from, to, ms, Easing::Sine));
        }
        debug!("centering camera on ({cx:.3}, {cy:.3})");
    }

    /// Draws `path` as a tube named `desc`, with a joint sphere `{desc}{i}` at every point.
    ///
    /// Does nothing until the camera has been centered. Paths with fewer than two points remove
    /// the part from the scene.
    pub fn draw_path(&mut self, desc: &str, path: &[Vector3<f32>]) {
        if !self.initialized {
            return;
        }
        if path.len() < 2 {
            self.dispose_part(desc);
            return;
        }

        let diameter = 0.5 * path_length(path) + 0.015;
        let radius = diameter / 2.0;
        let mut tube = match geometry::tube(path, radius, TUBE_TESSELLATION, Cap::Both) {
            Ok(tube) => tube,
            Err(e) => {
                warn!("cannot update '{desc}': {e}");
                self.dispose_part(desc);
                return;
            }
        };
        tube.make_double_sided();
        let kind = MeshKind::Tube {
            path: path.to_vec(),
            radius,
            tessellation: TUBE_TESSELLATION,
            cap: Cap::Both,
        };

        match self.scene.mesh_mut(desc) {
            Some(mesh) => {
                mesh.kind = kind;
                mesh.geometry = tube;
            }
            None => {
                self.scene
                    .add_mesh(SceneMesh::new(desc, kind, tube).with_material(MaterialKind::Bone));
                self.scene.shadows.add_caster(desc);
            }
        }

        let previous = self.joints.insert(desc.to_string(), path.len()).unwrap_or(0);
        for i in path.len()..previous {
            self.scene.dispose(&format!("{desc}{i}"));
        }
        for (i, point) in path.iter().enumerate() {
            let name = format!("{desc}{i}");
            self.scene.shadows.add_caster(&name);
            let joint = self.scene.mesh_or_add(&name, || {
                SceneMesh::sphere(&name, 1.0).with_material(MaterialKind::Joint)
            });
            joint.position = *point;
            // Joints are slightly thicker than their bones.
            joint.scaling = Vector3::repeat(1.1 * diameter);
        }
    }

    fn dispose_part(&mut self, desc: &str) {
        self.scene.dispose(desc);
        for i in 0..self.joints.remove(desc).unwrap_or(0) {
            self.scene.dispose(&format!("{desc}{i}"));
        }
    }

    pub fn draw_body(&mut self, body: &BodyResult, scale: [f32; 2]) {
        let norm = |p: Point| Vector3::new(p.x / scale[0], 1.0 - p.y / scale[1], p.z / 2.0 / 256.0);

        if !self.initialized {
            let points = body
                .keypoints
                .iter()
                .filter(|kpt| kpt.score > 0.0)
                .map(|kpt| kpt.position_raw)
                .collect::<Vec<_>>();
            self.center_camera(CENTER_MS, &points);
        }

        for (desc, lines) in body.paths() {
            let path = lines.into_iter().flatten().map(norm).collect::<Vec<_>>();
            self.draw_path(&desc, &path);
        }
        self.draw_head(body, norm);
    }

    fn draw_head(&mut self, body: &BodyResult, norm: impl Fn(Point) -> Vector3<f32>) {
        if !self.initialized {
            return;
        }
        let position = |part: &str| body.keypoint(part).map(|kpt| kpt.position);
        let (Some(le), Some(re), Some(ls), Some(rs)) = (
            position("leftEye"),
            position("rightEye"),
            position("leftShoulder"),
            position("rightShoulder"),
        ) else {
            debug!("head keypoints missing, skipping head");
            return;
        };

        let eye_base = le.midpoint(re);
        let neck_base = ls.midpoint(rs);
        let neck_end = neck_base.midpoint(eye_base);
        self.draw_path("neck", &[norm(neck_base), norm(neck_end)]);

        let eyes = [Vector3::from(le.to_array()), Vector3::from(re.to_array())];
        let size = 0.5 * path_length(&eyes) + 0.2;
        let head = self.scene.mesh_or_add("head", || {
            SceneMesh::sphere("head", HEAD_DIAMETER).with_material(MaterialKind::Head)
        });
        head.position = norm(neck_end.midpoint(eye_base));
        head.scaling = Vector3::new(size, 1.1 * size, size);
    }

    pub fn draw_hand(&mut self, hand: &HandResult, scale: [f32; 2]) {
        if !self.initialized {
            let points = hand
                .keypoints
                .iter()
                .map(|p| Point::new(p.x / scale[0], p.y / scale[1], p.z))
                .collect::<Vec<_>>();
            self.center_camera(CENTER_MS, &points);
        }

        for (desc, points) in &hand.annotations {
            let path = points
                .iter()
                .filter(|p| p.x > 0.0 && p.y > 0.0)
                .map(|p| Vector3::new(p.x / scale[0], 1.0 - p.y / scale[1], p.z / 256.0 / 2.0))
                .collect::<Vec<_>>();
            if path.len() > 1 {
                self.draw_path(desc, &path);
            }
        }
    }

    pub fn draw_face(&mut self, face: &FaceResult) {
        if !self.initialized {
            self.center_camera(CENTER_MS, &face.mesh_raw);
        }
        if face.mesh_raw.len() < FACE_MESH_POINTS {
            return;
        }

        let positions = face
            .mesh_raw
            .iter()
            .map(|p| [p.x, 1.0 - 1.25 * p.y, p.z / 1.5])
            .collect::<Vec<_>>();

        match self.scene.mesh_mut("face") {
            Some(surface) => {
                surface.geometry.positions = positions.clone();
                surface.geometry.compute_normals();
            }
            None => {
                let mut data = MeshData {
                    positions: positions.clone(),
                    normals: Vec::new(),
                    uvs: self.uvmap.clone(),
                    indices: self.triangulation.clone(),
                };
                data.compute_normals();
                self.scene.add_mesh(
                    SceneMesh::new("face", MeshKind::Surface, data).with_material(MaterialKind::Head),
                );
            }
        }

        if positions.len() < FACE_MESH_POINTS_WITH_IRIS {
            return;
        }
        let size = (positions[469][0] - positions[471][0]).abs()
            + (positions[474][0] - positions[476][0]).abs();
        for (name, center) in [("leftEye", positions[468]), ("rightEye", positions[473])] {
            let iris = self.scene.mesh_or_add(name, || {
                let mut iris =
                    SceneMesh::sphere(name, IRIS_DIAMETER).with_material(MaterialKind::Joint);
                iris.rendering_group = 1;
                iris
            });
            iris.position = Vector3::new(center[0], center[1], center[2] / 10.0);
            iris.scaling = Vector3::repeat(size);
        }

        let augments = positions.len() - FACE_MESH_POINTS_WITH_IRIS;
        for i in augments..self.augments {
            self.scene
                .dispose(&format!("augment{}", FACE_MESH_POINTS_WITH_IRIS + i));
        }
        self.augments = augments;
        for (i, p) in positions.iter().enumerate().skip(FACE_MESH_POINTS_WITH_IRIS) {
            let name = format!("augment{i}");
            let augment = self
                .scene
                .mesh_or_add(&name, || SceneMesh::sphere(&name, AUGMENT_DIAMETER));
            augment.position = Vector3::new(p[0], p[1], p[2] / 20.0);
        }
    }

    /// Advances the scene animations and draws the first body, hand and face of `result`.
    ///
    /// `width` and `height` are the size of the detector input the pixel coordinates refer to.
    pub fn draw(&mut self, width: u32, height: u32, result: &DetectionResult, now_ms: f64) {
        self.scene.tick(now_ms);
        let scale = [width as f32, height as f32];
        if let Some(body) = result.body.first() {
            self.draw_body(body, scale);
        }
        if let Some(hand) = result.hand.first() {
            self.draw_hand(hand, scale);
        }
        if let Some(face) = result.face.first() {
            self.draw_face(face);
        }
    }

    /// Resets the renderer and moves camera and light to a preset.
    pub fn focus(&mut self, target: FocusTarget) {
        let triangulation = std::mem::take(&mut self.triangulation);
        let uvmap = std::mem::take(&mut self.uvmap);
        self.init(triangulation, uvmap);
        // Running camera moves would override the preset.
        self.scene.stop_animations();

        info!("update position: {target:?}");
        let (position, target, light_position, light_direction) = match target {
            FocusTarget::None => return,
            FocusTarget::Face => (
                [0.7, 1.3, -1.3],
                [0.7, 1.3, 0.0],
                [0.0, 5.0, 5.0],
                [0.7, 0.0, 0.3],
            ),
            FocusTarget::Hand => (
                [0.5, 0.5, -1.25],
                [0.5, 0.5, 0.0],
                [1.0, 5.0, 1.0],
                [2.5, -4.0, 2.0],
            ),
            FocusTarget::Body => (
                [0.5, 0.75, -1.5],
                [0.5, 0.5, 0.0],
                [0.0, 5.0, 5.0],
                [-0.5, 0.5, -1.0],
            ),
        };
        self.scene.camera.set_position(Vector3::from(position));
        self.scene.camera.set_target(Vector3::from(target));
        self.scene.light.position = Vector3::from(light_position);
        self.scene.light.direction = Vector3::from(light_direction);
    }
}

impl Default for MeshRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::result::BodyKeypoint;

    use super::*;

    fn v(x: f32, y: f32, z: f32) -> Vector3<f32> {
        Vector3::new(x, y, z)
    }

    fn kpt(part: &str, x: f32, y: f32) -> BodyKeypoint {
        BodyKeypoint {
            part: part.into(),
            position: Point::new(x, y, 0.0),
            position_raw: Point::new(x / 100.0, y / 100.0, 0.0),
            score: 0.9,
        }
    }

    fn body() -> BodyResult {
        BodyResult {
            keypoints: vec![
                kpt("leftEye", 45.0, 20.0),
                kpt("rightEye", 55.0, 20.0),
                kpt("leftShoulder", 30.0, 40.0),
                kpt("rightShoulder", 70.0, 40.0),
            ],
            annotations: BTreeMap::from([(
                "torso".to_string(),
                vec![
                    vec![Point::new(30.0, 40.0, 0.0), Point::new(70.0, 40.0, 0.0)],
                    vec![Point::new(70.0, 80.0, 0.0)],
                ],
            )]),
            ..Default::default()
        }
    }

    #[test]
    fn paths_wait_for_camera() {
        let mut renderer = MeshRenderer::new();
        renderer.draw_path("bone", &[v(0.0, 0.0, 0.0), v(0.0, 1.0, 0.0)]);
        assert_eq!(renderer.scene().mesh_count(), 0);
    }

    #[test]
    fn camera_frames_points() {
        let mut renderer = MeshRenderer::new();
        renderer.center_camera(
            100.0,
            &[
                Point::new(0.2, 0.4, 0.0),
                Point::new(0.6, 0.8, 0.0),
                // Zero coordinates count as missing.
                Point::new(0.0, 0.0, 3.0),
            ],
        );
        assert!(renderer.is_initialized());

        let scene = &mut renderer.scene;
        scene.tick(0.0);
        scene.tick(5000.0);
        assert_relative_eq!(scene.camera.target(), v(0.4, 0.6, 0.0), epsilon = 1e-5);
        assert_relative_eq!(scene.camera.position(), v(0.4, 0.8, -13.0), epsilon = 1e-4);
    }

    #[test]
    fn camera_stays_without_points() {
        let mut renderer = MeshRenderer::new();
        let before = renderer.scene().camera.clone();
        renderer.center_camera(100.0, &[Point::new(0.0, 0.0, 1.0)]);
        assert!(renderer.is_initialized());
        renderer.scene.tick(0.0);
        renderer.scene.tick(1e6);
        assert_relative_eq!(renderer.scene().camera.target(), before.target());
    }

    #[test]
    fn path_joints_follow_path() {
        let mut renderer = MeshRenderer::new();
        renderer.center_camera(0.0, &[]);

        let path = [v(0.0, 0.0, 0.0), v(0.0, 1.0, 0.0), v(1.0, 1.0, 0.0)];
        renderer.draw_path("arm", &path);
        let scene = renderer.scene();
        let tube = scene.mesh("arm").unwrap();
        assert_eq!(tube.material, Some(MaterialKind::Bone));
        assert!(scene.shadows.is_caster("arm"));
        let diameter = 0.5 * 0.1 * 2f32.sqrt() + 0.015;
        let MeshKind::Tube { radius, .. } = tube.kind else {
            panic!("arm is not a tube");
        };
        assert_relative_eq!(radius, diameter / 2.0);
        let joint = scene.mesh("arm2").unwrap();
        assert_eq!(joint.position, path[2]);
        assert_relative_eq!(joint.scaling.x, 1.1 * diameter);

        renderer.draw_path("arm", &path[..2]);
        assert!(!renderer.scene().contains("arm2"));
        assert!(renderer.scene().contains("arm1"));

        renderer.draw_path("arm", &path[..1]);
        assert_eq!(renderer.scene().mesh_count(), 0, "no ghost parts");
    }

    #[test]
    fn degenerate_path_disposes_part() {
        let mut renderer = MeshRenderer::new();
        renderer.center_camera(0.0, &[]);
        renderer.draw_path("leg", &[v(0.0, 0.0, 0.0), v(0.0, 1.0, 0.0)]);
        renderer.draw_path("leg", &[v(1.0, 1.0, 1.0), v(1.0, 1.0, 1.0)]);
        assert!(!renderer.scene().contains("leg"));
        assert!(!renderer.scene().shadows.is_caster("leg0"));
    }

    #[test]
    fn draws_body_and_head() {
        let mut renderer = MeshRenderer::new();
        let result = DetectionResult {
            body: vec![body()],
            ..Default::default()
        };
        renderer.draw(100, 100, &result, 0.0);
        assert!(renderer.is_initialized());

        let scene = renderer.scene();
        // Both polylines are joined into one path.
        assert!(scene.contains("torso2"));
        assert!(scene.contains("neck"));

        let head = scene.mesh("head").unwrap();
        assert_eq!(head.material, Some(MaterialKind::Head));
        // Halfway between the neck end (50, 30) and the eyes (50, 20).
        assert_relative_eq!(head.position, v(0.5, 0.75, 0.0), epsilon = 1e-6);
        let size = 0.5 * 10.0 * 0.1 + 0.2;
        assert_relative_eq!(head.scaling, v(size, 1.1 * size, size), epsilon = 1e-6);
    }

    #[test]
    fn hand_skips_missing_points() {
        let mut renderer = MeshRenderer::new();
        let hand = HandResult {
            keypoints: vec![Point::new(50.0, 50.0, 0.0)],
            annotations: BTreeMap::from([
                (
                    "index".to_string(),
                    vec![
                        Point::new(10.0, 10.0, 0.0),
                        Point::new(0.0, 20.0, 0.0),
                        Point::new(20.0, 30.0, 0.0),
                    ],
                ),
                ("thumb".to_string(), vec![Point::new(10.0, 10.0, 0.0)]),
            ]),
            ..Default::default()
        };
        renderer.draw_hand(&hand, [100.0, 100.0]);

        let scene = renderer.scene();
        assert!(scene.contains("index1"));
        assert!(!scene.contains("index2"));
        assert!(!scene.contains("thumb"));
        assert_relative_eq!(scene.mesh("index1").unwrap().position, v(0.2, 0.7, 0.0));
    }

    fn face(points: usize) -> FaceResult {
        FaceResult {
            mesh_raw: (0..points)
                .map(|i| Point::new(i as f32 / 1000.0, 0.5, 0.3))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn face_surface_and_iris() {
        let mut renderer = MeshRenderer::new();
        renderer.init(vec![0, 1, 2], vec![[0.0, 0.0]; 480]);
        renderer.draw_face(&face(480));

        let scene = renderer.scene();
        let surface = scene.mesh("face").unwrap();
        assert_eq!(surface.kind, MeshKind::Surface);
        assert_eq!(surface.geometry.indices, [0, 1, 2]);
        assert_relative_eq!(surface.geometry.positions[0][1], 1.0 - 0.625);
        assert_relative_eq!(surface.geometry.positions[0][2], 0.2);

        let iris = scene.mesh("leftEye").unwrap();
        assert_eq!(iris.rendering_group, 1);
        assert_relative_eq!(iris.position.z, 0.02, epsilon = 1e-6);
        assert_relative_eq!(iris.scaling.x, 0.004, epsilon = 1e-6);

        assert!(scene.contains("augment478"));
        assert!(scene.contains("augment479"));
        assert_relative_eq!(scene.mesh("augment479").unwrap().position.z, 0.01, epsilon = 1e-6);

        renderer.draw_face(&face(478));
        assert!(!renderer.scene().contains("augment479"));
    }

    #[test]
    fn small_faces_are_ignored() {
        let mut renderer = MeshRenderer::new();
        renderer.draw_face(&face(100));
        assert!(renderer.is_initialized());
        assert!(!renderer.scene().contains("face"));
    }

    #[test]
    fn focus_resets() {
        let mut renderer = MeshRenderer::new();
        renderer.init(vec![0, 1, 2], Vec::new());
        renderer.center_camera(0.0, &[]);
        renderer.draw_path("arm", &[v(0.0, 0.0, 0.0), v(0.0, 1.0, 0.0)]);

        renderer.focus("face".parse().unwrap());
        assert!(!renderer.is_initialized());
        let scene = renderer.scene();
        assert_eq!(scene.mesh_count(), 0);
        assert!(scene.animations().is_empty());
        assert_relative_eq!(scene.camera.position(), v(0.7, 1.3, -1.3), epsilon = 1e-4);
        assert_relative_eq!(scene.camera.target(), v(0.7, 1.3, 0.0));
        assert_eq!(scene.light.direction, v(0.7, 0.0, 0.3));
        assert_eq!(renderer.triangulation, [0, 1, 2]);

        assert!("feet".parse::<FocusTarget>().is_err());
    }
}
