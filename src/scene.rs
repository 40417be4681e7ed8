//! Engine-agnostic retained 3D scene.
//!
//! The back-ends in [`mesh`](crate::mesh) and [`avatar`](crate::avatar) describe what should be
//! visible by creating, updating and disposing named meshes in a [`Scene`]. A rendering engine
//! picks the scene up from there; the whole scene can also be serialized as JSON for inspection.

pub mod anim;
pub mod camera;
pub mod geometry;

use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use nalgebra::Vector3;
use serde::Serialize;

use anim::{Animations, Easing, Property, Tween};
use camera::ArcRotateCamera;
use geometry::{Cap, MeshData};

/// Converts a `0xRRGGBB` color to `0.0..=1.0` components.
fn rgb(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    [channel(16), channel(8), channel(0)]
}

/// Identifies one of the scene's shared materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Bone,
    Joint,
    Head,
}

/// A metallic-roughness material.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub name: &'static str,
    pub albedo: [f32; 3],
    pub metallic: f32,
    pub roughness: f32,
    pub alpha: f32,
    pub iridescence: bool,
    pub back_face_culling: bool,
}

impl Material {
    fn new(kind: MaterialKind) -> Self {
        let (name, albedo, roughness, alpha) = match kind {
            MaterialKind::Bone => ("bone", 0xB1ECFF, 0.4, 1.0),
            MaterialKind::Joint => ("joint", 0xFFFFFF, 0.0, 0.5),
            MaterialKind::Head => ("head", 0x91ECFF, 0.65, 1.0),
        };
        Self {
            name,
            albedo: rgb(albedo),
            metallic: 1.0,
            roughness,
            alpha,
            iridescence: true,
            back_face_culling: kind != MaterialKind::Head,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Materials {
    pub bone: Material,
    pub joint: Material,
    pub head: Material,
}

impl Materials {
    pub fn get(&self, kind: MaterialKind) -> &Material {
        match kind {
            MaterialKind::Bone => &self.bone,
            MaterialKind::Joint => &self.joint,
            MaterialKind::Head => &self.head,
        }
    }
}

impl Default for Materials {
    fn default() -> Self {
        Self {
            bone: Material::new(MaterialKind::Bone),
            joint: Material::new(MaterialKind::Joint),
            head: Material::new(MaterialKind::Head),
        }
    }
}

/// How a mesh's geometry was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MeshKind {
    Tube {
        path: Vec<Vector3<f32>>,
        radius: f32,
        tessellation: u32,
        cap: Cap,
    },
    Sphere {
        diameter: f32,
    },
    /// Custom geometry, eg. the face surface.
    Surface,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneMesh {
    pub name: String,
    pub kind: MeshKind,
    pub material: Option<MaterialKind>,
    pub position: Vector3<f32>,
    pub scaling: Vector3<f32>,
    /// Meshes in higher groups are drawn on top of lower groups.
    pub rendering_group: u8,
    /// Whether vertex data may be replaced after creation.
    pub updatable: bool,
    pub geometry: MeshData,
}

impl SceneMesh {
    pub fn new(name: impl Into<String>, kind: MeshKind, geometry: MeshData) -> Self {
        Self {
            name: name.into(),
            kind,
            material: None,
            position: Vector3::zeros(),
            scaling: Vector3::repeat(1.0),
            rendering_group: 0,
            updatable: true,
            geometry,
        }
    }

    /// Creates a sphere with a fixed base diameter; its size is changed through `scaling`.
    pub fn sphere(name: impl Into<String>, diameter: f32) -> Self {
        Self::new(
            name,
            MeshKind::Sphere { diameter },
            geometry::sphere(diameter, SPHERE_SEGMENTS),
        )
    }

    pub fn with_material(mut self, material: MaterialKind) -> Self {
        self.material = Some(material);
        self
    }
}

/// Ring count of generated spheres.
pub const SPHERE_SEGMENTS: u32 = 32;

/// Light that illuminates everything from one hemisphere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HemisphericLight {
    pub direction: Vector3<f32>,
    pub intensity: f32,
    pub specular: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionalLight {
    pub direction: Vector3<f32>,
    /// Position the shadow map is rendered from.
    pub position: Vector3<f32>,
    pub intensity: f32,
}

/// Blurred exponential shadow map cast by the directional light.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowGenerator {
    pub map_size: u32,
    pub blur_kernel: u32,
    pub depth_scale: Option<f32>,
    casters: BTreeSet<String>,
}

impl ShadowGenerator {
    fn new(blur_kernel: u32, depth_scale: Option<f32>) -> Self {
        Self {
            map_size: 1024,
            blur_kernel,
            depth_scale,
            casters: BTreeSet::new(),
        }
    }

    pub fn add_caster(&mut self, name: &str) {
        self.casters.insert(name.to_string());
    }

    pub fn remove_caster(&mut self, name: &str) {
        self.casters.remove(name);
    }

    pub fn is_caster(&self, name: &str) -> bool {
        self.casters.contains(name)
    }

    pub fn casters(&self) -> impl Iterator<Item = &str> {
        self.casters.iter().map(|s| s.as_str())
    }
}

/// Skybox and ground description.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub environment_texture: Option<String>,
    pub skybox_texture: Option<String>,
    pub skybox_color: [f32; 3],
    pub skybox_size: f32,
    pub ground_texture: Option<String>,
    pub ground_color: [f32; 3],
    pub ground_size: f32,
    pub ground_shadow_level: f32,
    pub enable_ground_shadow: bool,
    /// Tint applied to both skybox and ground.
    pub main_color: Option<[f32; 3]>,
}

/// Initial layout of a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScenePreset {
    /// Scene for the tube skeleton, with a camera/light intro animation.
    Skeleton {
        camera_radius: f32,
        /// Duration parameter of the intro; the intro runs for twice as long. `0` disables it.
        intro_ms: f64,
    },
    /// Scene for a rigged avatar model.
    Avatar,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub camera: ArcRotateCamera,
    pub ambient: HemisphericLight,
    pub light: DirectionalLight,
    pub shadows: ShadowGenerator,
    pub environment: Environment,
    pub materials: Materials,
    meshes: BTreeMap<String, SceneMesh>,
    animations: Animations,
}

impl Scene {
    pub fn new(preset: ScenePreset) -> Self {
        match preset {
            ScenePreset::Skeleton {
                camera_radius,
                intro_ms,
            } => {
                let mut scene = Self::skeleton(camera_radius);
                if intro_ms > 0.0 {
                    scene.intro(intro_ms);
                }
                scene
            }
            ScenePreset::Avatar => Self::avatar(),
        }
    }

    fn skeleton(camera_radius: f32) -> Self {
        let mut camera = ArcRotateCamera::new(0.0, 0.0, camera_radius, Vector3::new(0.5, 0.5, 0.5));
        camera.set_radius_limits(Some(0.001), Some(200.0));
        camera.set_position(Vector3::new(0.0, 2.0, -12.0));
        camera.set_target(Vector3::new(0.0, 0.5, -1.0));

        Self {
            camera,
            ambient: HemisphericLight {
                direction: Vector3::y(),
                intensity: 0.5,
                specular: [0.0; 3],
            },
            light: DirectionalLight {
                direction: Vector3::new(0.3, -0.5, 1.0),
                position: Vector3::new(2.5, 5.0, -5.0),
                intensity: 1.0,
            },
            shadows: ShadowGenerator::new(8, Some(60.0)),
            environment: Environment {
                environment_texture: Some("../assets/scene-environment.env".into()),
                skybox_texture: Some("../assets/scene-skybox.dds".into()),
                skybox_color: [0.0; 3],
                skybox_size: 100.0,
                ground_texture: Some("../assets/scene-ground.png".into()),
                ground_color: [1.0; 3],
                ground_size: 10.0,
                ground_shadow_level: 0.1,
                enable_ground_shadow: true,
                main_color: None,
            },
            materials: Materials::default(),
            meshes: BTreeMap::new(),
            animations: Animations::default(),
        }
    }

    fn avatar() -> Self {
        let mut camera = ArcRotateCamera::new(4.7, 1.6, 2.0, Vector3::new(0.5, 0.5, 0.5));
        camera.set_radius_limits(Some(1.0), Some(10.0));

        Self {
            camera,
            ambient: HemisphericLight {
                direction: Vector3::y(),
                intensity: 0.6,
                specular: [0.0; 3],
            },
            light: DirectionalLight {
                direction: Vector3::new(0.0, -0.5, -1.0),
                position: Vector3::new(0.0, 5.0, 5.0),
                intensity: 1.0,
            },
            shadows: ShadowGenerator::new(32, None),
            environment: Environment {
                environment_texture: Some("../assets/environmentSpecular.env".into()),
                skybox_texture: Some("../assets/backgroundSkybox.dds".into()),
                skybox_color: [0.0; 3],
                skybox_size: 20.0,
                ground_texture: Some("../assets/backgroundGround.png".into()),
                ground_color: rgb(0xFF0000),
                ground_size: 15.0,
                ground_shadow_level: 0.5,
                enable_ground_shadow: true,
                main_color: Some([0.5; 3]),
            },
            materials: Materials::default(),
            meshes: BTreeMap::new(),
            animations: Animations::default(),
        }
    }

    /// Queues the intro animation: the field of view narrows and the light swings into place.
    pub fn intro(&mut self, ms: f64) {
        let duration = 2.0 * ms;
        self.animate(Tween::new(Property::CameraFov, 1.0, 0.1, duration, Easing::Back));
        self.animate(Tween::new(
            Property::LightDirectionX,
            -0.6,
            0.3,
            duration,
            Easing::Circle,
        ));
        self.animate(Tween::new(
            Property::LightDirectionY,
            -0.1,
            -0.5,
            duration,
            Easing::Circle,
        ));
    }

    /// Starts a tween, replacing any running tween of the same property.
    pub fn animate(&mut self, tween: Tween) {
        self.animations.start(tween);
    }

    pub fn animations(&self) -> &Animations {
        &self.animations
    }

    /// Stops all running animations where they are.
    pub fn stop_animations(&mut self) {
        self.animations.clear();
    }

    /// Returns the current value of an animatable property.
    pub fn property(&self, property: Property) -> f32 {
        let target = self.camera.target();
        let position = self.camera.position();
        match property {
            Property::CameraTargetX => target.x,
            Property::CameraTargetY => target.y,
            Property::CameraTargetZ => target.z,
            Property::CameraPositionX => position.x,
            Property::CameraPositionY => position.y,
            Property::CameraPositionZ => position.z,
            Property::CameraFov => self.camera.fov,
            Property::LightDirectionX => self.light.direction.x,
            Property::LightDirectionY => self.light.direction.y,
            Property::LightDirectionZ => self.light.direction.z,
        }
    }

    /// Advances all animations to `now_ms` (milliseconds on any monotonic clock).
    pub fn tick(&mut self, now_ms: f64) {
        let values = self.animations.step(now_ms);
        if values.is_empty() {
            return;
        }

        // Targets are applied before positions, so a simultaneous move lands on both.
        let mut target = self.camera.target();
        let mut position = None;
        for &(property, value) in &values {
            match property {
                Property::CameraTargetX => target.x = value,
                Property::CameraTargetY => target.y = value,
                Property::CameraTargetZ => target.z = value,
                Property::CameraFov => self.camera.fov = value,
                Property::LightDirectionX => self.light.direction.x = value,
                Property::LightDirectionY => self.light.direction.y = value,
                Property::LightDirectionZ => self.light.direction.z = value,
                Property::CameraPositionX
                | Property::CameraPositionY
                | Property::CameraPositionZ => {}
            }
        }
        if target != self.camera.target() {
            self.camera.set_target(target);
        }

        for &(property, value) in &values {
            let axis = match property {
                Property::CameraPositionX => 0,
                Property::CameraPositionY => 1,
                Property::CameraPositionZ => 2,
                _ => continue,
            };
            position.get_or_insert_with(|| self.camera.position())[axis] = value;
        }
        if let Some(position) = position {
            if position != self.camera.position() {
                self.camera.set_position(position);
            }
        }
    }

    pub fn mesh(&self, name: &str) -> Option<&SceneMesh> {
        self.meshes.get(name)
    }

    pub fn mesh_mut(&mut self, name: &str) -> Option<&mut SceneMesh> {
        self.meshes.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.meshes.contains_key(name)
    }

    /// Adds a mesh, replacing any existing mesh of the same name.
    pub fn add_mesh(&mut self, mesh: SceneMesh) -> &mut SceneMesh {
        match self.meshes.entry(mesh.name.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(mesh);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(mesh),
        }
    }

    /// Returns the mesh called `name`, creating it with `create` first if it does not exist.
    pub fn mesh_or_add(
        &mut self,
        name: &str,
        create: impl FnOnce() -> SceneMesh,
    ) -> &mut SceneMesh {
        self.meshes
            .entry(name.to_string())
            .or_insert_with(create)
    }

    /// Removes a mesh and its shadow. Returns whether the mesh existed.
    pub fn dispose(&mut self, name: &str) -> bool {
        self.shadows.remove_caster(name);
        self.meshes.remove(name).is_some()
    }

    pub fn meshes(&self) -> impl Iterator<Item = &SceneMesh> {
        self.meshes.values()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Serializes the scene as pretty-printed JSON.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
