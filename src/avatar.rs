//! The rigged avatar back-end.
//!
//! Orients the bones of a humanoid skeleton from pairs of body keypoints.

use std::path::Path;

use anyhow::{bail, Context};
use log::{debug, info};
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::keypoint::{AVATAR_BONES, BONE_PAIRS};
use crate::result::{DetectionResult, Point};
use crate::scene::{Scene, ScenePreset};

/// Prefix of the bone names in Mixamo rigs.
const MIXAMO_PREFIX: &str = "mixamorig:";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone in the skeleton.
    pub parent: Option<usize>,
    /// Rest pose, relative to the parent bone.
    rest: Matrix4<f32>,
    /// Rotation replacing the rest rotation, if the bone has been posed.
    rotation: Option<UnitQuaternion<f32>>,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, rest: Matrix4<f32>) -> Self {
        Self {
            name: name.into(),
            parent,
            rest,
            rotation: None,
        }
    }

    pub fn rest(&self) -> &Matrix4<f32> {
        &self.rest
    }

    pub fn rotation(&self) -> Option<UnitQuaternion<f32>> {
        self.rotation
    }

    /// Sets the local rotation to `Ry(yaw) * Rx(pitch) * Rz(roll)`.
    pub fn set_yaw_pitch_roll(&mut self, yaw: f32, pitch: f32, roll: f32) {
        self.rotation = Some(
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
                * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), pitch)
                * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), roll),
        );
    }

    /// Returns the local transform of the bone: the rest pose, with the rotation replaced if the
    /// bone has been posed. Translation and scale of the rest pose are kept.
    pub fn local_matrix(&self) -> Matrix4<f32> {
        let Some(rotation) = self.rotation else {
            return self.rest;
        };

        let linear = self.rest.fixed_view::<3, 3>(0, 0);
        let scale = Vector3::new(
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        );
        let mut local = rotation.to_homogeneous() * Matrix4::new_nonuniform_scaling(&scale);
        local
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&self.rest.fixed_view::<3, 1>(0, 3));
        local
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skeleton {
    pub name: String,
    bones: Vec<Bone>,
}

#[derive(Deserialize)]
struct BabylonScene {
    #[serde(default)]
    skeletons: Vec<BabylonSkeleton>,
}

#[derive(Deserialize)]
struct BabylonSkeleton {
    #[serde(default)]
    name: String,
    bones: Vec<BabylonBone>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BabylonBone {
    name: String,
    #[serde(default = "no_parent")]
    parent_bone_index: i64,
    matrix: Vec<f32>,
}

fn no_parent() -> i64 {
    -1
}

impl Skeleton {
    /// Creates a skeleton. Parents have to precede their children.
    pub fn new(name: impl Into<String>, bones: Vec<Bone>) -> anyhow::Result<Self> {
        for (i, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= i {
                    bail!(
                        "bone '{}' (#{i}) has parent #{parent}, parents must come first",
                        bone.name
                    );
                }
            }
        }
        Ok(Self {
            name: name.into(),
            bones,
        })
    }

    /// Builds an unposed skeleton with every humanoid avatar bone at the origin.
    pub fn humanoid() -> Self {
        Self {
            name: "humanoid".into(),
            bones: AVATAR_BONES
                .iter()
                .map(|name| Bone::new(*name, None, Matrix4::identity()))
                .collect(),
        }
    }

    /// Parses the first skeleton of a `.babylon` scene file.
    pub fn from_babylon(json: &str) -> anyhow::Result<Self> {
        let scene: BabylonScene = serde_json::from_str(json)?;
        let Some(skeleton) = scene.skeletons.into_iter().next() else {
            bail!("model contains no skeleton");
        };

        let count = skeleton.bones.len();
        let bones = skeleton
            .bones
            .into_iter()
            .map(|bone| {
                if bone.matrix.len() != 16 {
                    bail!(
                        "bone '{}' has a matrix of {} values, expected 16",
                        bone.name,
                        bone.matrix.len()
                    );
                }
                let parent = match usize::try_from(bone.parent_bone_index) {
                    Ok(index) if index < count => Some(index),
                    Ok(index) => bail!("bone '{}' has invalid parent #{index}", bone.name),
                    Err(_) => None,
                };
                let name = bone.name.trim_start_matches(MIXAMO_PREFIX);
                Ok(Bone::new(name, parent, Matrix4::from_column_slice(&bone.matrix)))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Self::new(skeleton.name, bones)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model '{}'", path.display()))?;
        let skeleton = Self::from_babylon(&json)
            .with_context(|| format!("failed to load skeleton from '{}'", path.display()))?;
        info!(
            "loaded skeleton '{}' with {} bones from '{}'",
            skeleton.name,
            skeleton.bones.len(),
            path.display()
        );
        Ok(skeleton)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|bone| bone.name == name)
    }

    pub fn bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        self.bones.iter_mut().find(|bone| bone.name == name)
    }

    /// Discards all bone rotations.
    pub fn return_to_rest(&mut self) {
        for bone in &mut self.bones {
            bone.rotation = None;
        }
    }

    /// Computes the model-space transform of every bone, in bone order.
    pub fn world_matrices(&self) -> Vec<Matrix4<f32>> {
        let mut world: Vec<Matrix4<f32>> = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let local = bone.local_matrix();
            let matrix = match bone.parent {
                Some(parent) => world[parent] * local,
                None => local,
            };
            world.push(matrix);
        }
        world
    }

    /// Serializes the skeleton as pretty-printed JSON.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Orientation of a segment, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Angles {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Orientation of the segment between two normalized keypoints.
///
/// Depth is on a much larger scale than x and y, so it is divided by 256 first.
pub fn angle(p0: Point, p1: Point) -> Angles {
    let (dx, dy, dz) = (p0.x - p1.x, p0.y - p1.y, (p0.z - p1.z) / 256.0);
    Angles {
        pitch: dx.atan2(dy),
        roll: dy.atan2(dz),
        yaw: dz.atan2(dx),
    }
}

/// Avatar models with a matching camera and light placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarModel {
    YBot,
    Skull,
}

impl AvatarModel {
    /// Guesses the model from its file name.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.contains("skull") {
            Self::Skull
        } else {
            Self::YBot
        }
    }

    /// Moves the camera and light of `scene` so that the model is in view.
    pub fn place(self, scene: &mut Scene) {
        let (position, target, light) = match self {
            Self::YBot => ([-1.0, 1.0, 3.0], [0.0, 1.0, 0.0], [-1.0, -1.0, -1.0]),
            Self::Skull => ([0.0, 10.0, -50.0], [0.0, 5.0, 0.0], [-1.0, -1.0, 0.0]),
        };
        scene.camera.set_position(Vector3::from(position));
        scene.camera.set_target(Vector3::from(target));
        scene.light.direction = Vector3::from(light);
    }
}

pub struct AvatarRenderer {
    scene: Scene,
    skeleton: Skeleton,
}

impl AvatarRenderer {
    pub fn new(mut skeleton: Skeleton, model: AvatarModel) -> Self {
        skeleton.return_to_rest();
        let mut scene = Scene::new(ScenePreset::Avatar);
        model.place(&mut scene);
        Self { scene, skeleton }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Poses the skeleton from the first body of `result`.
    ///
    /// Returns the number of bones that were updated. Pairs with a missing keypoint or bone are
    /// skipped.
    pub fn draw(&mut self, result: &DetectionResult) -> usize {
        let Some(body) = result.body.first() else {
            return 0;
        };

        let mut posed = 0;
        for (from, to, bone) in BONE_PAIRS {
            let from = body.keypoint(from.name()).map(|kpt| kpt.position_raw);
            let to = body.keypoint(to.name()).map(|kpt| kpt.position_raw);
            let (Some(p0), Some(p1), Some(bone)) = (from, to, self.skeleton.bone_mut(bone)) else {
                continue;
            };
            let Angles { yaw, pitch, roll } = angle(p0, p1);
            bone.set_yaw_pitch_roll(yaw, pitch, roll);
            posed += 1;
        }
        debug!("posed {posed} avatar bones");
        posed
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    use approx::assert_relative_eq;
    use nalgebra::{Point3, Rotation3};

    use crate::result::{BodyKeypoint, BodyResult};

    use super::*;

    #[test]
    fn segment_angles() {
        let a = angle(Point::new(0.5, 0.5, 0.0), Point::new(0.5, 0.0, 0.0));
        assert_relative_eq!(a.pitch, 0.0);
        assert_relative_eq!(a.roll, FRAC_PI_2);
        assert_relative_eq!(a.yaw, 0.0);

        let a = angle(Point::new(1.0, 0.0, 256.0), Point::new(0.0, 0.0, 0.0));
        assert_relative_eq!(a.pitch, FRAC_PI_2);
        assert_relative_eq!(a.yaw, FRAC_PI_4);
    }

    #[test]
    fn yaw_pitch_roll_order() {
        let (yaw, pitch, roll) = (0.3, -0.7, 1.1);
        let mut bone = Bone::new("b", None, Matrix4::identity());
        bone.set_yaw_pitch_roll(yaw, pitch, roll);

        let expected = Rotation3::from_axis_angle(&Vector3::y_axis(), yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), pitch)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), roll);
        assert_relative_eq!(
            bone.rotation().unwrap().to_rotation_matrix(),
            expected,
            epsilon = 1e-6
        );
    }

    #[test]
    fn posing_keeps_rest_translation_and_scale() {
        let rest =
            Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0)) * Matrix4::new_scaling(2.0);
        let mut bone = Bone::new("b", None, rest);
        bone.set_yaw_pitch_roll(FRAC_PI_2, 0.0, 0.0);

        let local = bone.local_matrix();
        let p = local.transform_point(&Point3::new(1.0, 0.0, 0.0));
        // The x axis turns into -z under a quarter yaw.
        assert_relative_eq!(p, Point3::new(1.0, 2.0, 1.0), epsilon = 1e-5);
    }

    const MODEL: &str = r#"{
        "skeletons": [{
            "name": "ybot",
            "bones": [
                { "name": "mixamorig:Hips", "parentBoneIndex": -1,
                  "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,1,0,1] },
                { "name": "mixamorig:Spine", "parentBoneIndex": 0,
                  "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,1,0,1] }
            ]
        }]
    }"#;

    #[test]
    fn loads_babylon_skeleton() {
        let mut skeleton = Skeleton::from_babylon(MODEL).unwrap();
        assert_eq!(skeleton.name, "ybot");
        assert_eq!(skeleton.bones()[1].name, "Spine");
        assert_eq!(skeleton.bone("Spine").unwrap().parent, Some(0));

        let world = skeleton.world_matrices();
        assert_relative_eq!(world[1][(1, 3)], 2.0);

        skeleton
            .bone_mut("Hips")
            .unwrap()
            .set_yaw_pitch_roll(0.0, 0.0, FRAC_PI_2);
        let world = skeleton.world_matrices();
        let spine = world[1].fixed_view::<3, 1>(0, 3).into_owned();
        assert_relative_eq!(spine, Vector3::new(-1.0, 1.0, 0.0), epsilon = 1e-6);

        skeleton.return_to_rest();
        assert!(skeleton.bones().iter().all(|b| b.rotation().is_none()));
    }

    #[test]
    fn rejects_bad_models() {
        assert!(Skeleton::from_babylon(r#"{ "meshes": [] }"#).is_err());
        let bad_parent = MODEL.replace(r#""parentBoneIndex": 0"#, r#""parentBoneIndex": 7"#);
        assert!(Skeleton::from_babylon(&bad_parent).is_err());
        let short = MODEL.replace("0,1,0,1] }\n", "0,1] }\n");
        assert!(Skeleton::from_babylon(&short).is_err());
        let bones = vec![
            Bone::new("child", Some(1), Matrix4::identity()),
            Bone::new("root", None, Matrix4::identity()),
        ];
        assert!(Skeleton::new("s", bones).is_err());
    }

    #[test]
    fn picks_model_placement() {
        assert_eq!(AvatarModel::from_path(Path::new("assets/Skull.babylon")), AvatarModel::Skull);
        assert_eq!(AvatarModel::from_path(Path::new("assets/ybot.babylon")), AvatarModel::YBot);

        let renderer = AvatarRenderer::new(Skeleton::humanoid(), AvatarModel::YBot);
        let camera = &renderer.scene().camera;
        assert_relative_eq!(camera.target(), Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(camera.position(), Vector3::new(-1.0, 1.0, 3.0), epsilon = 1e-4);
        assert_eq!(renderer.scene().light.direction, Vector3::new(-1.0, -1.0, -1.0));
    }

    fn kpt(part: &str, x: f32, y: f32) -> BodyKeypoint {
        BodyKeypoint {
            part: part.into(),
            position: Point::new(x * 100.0, y * 100.0, 0.0),
            position_raw: Point::new(x, y, 0.0),
            score: 1.0,
        }
    }

    #[test]
    fn poses_bones_from_keypoints() {
        let mut renderer = AvatarRenderer::new(Skeleton::humanoid(), AvatarModel::YBot);
        assert_eq!(renderer.draw(&DetectionResult::default()), 0);

        let result = DetectionResult {
            body: vec![BodyResult {
                keypoints: vec![
                    kpt("leftShoulder", 0.6, 0.3),
                    kpt("leftElbow", 0.7, 0.5),
                    kpt("leftWrist", 0.7, 0.7),
                    // The right elbow is missing, so neither right arm bone is posed.
                    kpt("rightShoulder", 0.4, 0.3),
                    kpt("rightWrist", 0.3, 0.7),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(renderer.draw(&result), 2);

        let skeleton = renderer.skeleton();
        assert!(skeleton.bone("LeftArm").unwrap().rotation().is_some());
        assert!(skeleton.bone("LeftForeArm").unwrap().rotation().is_some());
        assert!(skeleton.bone("RightArm").unwrap().rotation().is_none());

        let a = angle(Point::new(0.6, 0.3, 0.0), Point::new(0.7, 0.5, 0.0));
        let mut expected = Bone::new("LeftArm", None, Matrix4::identity());
        expected.set_yaw_pitch_roll(a.yaw, a.pitch, a.roll);
        assert_eq!(
            skeleton.bone("LeftArm").unwrap().rotation(),
            expected.rotation()
        );
    }
}
