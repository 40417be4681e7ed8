use std::f32::consts::{FRAC_PI_2, TAU};

use nalgebra::Vector3;
use serde::Serialize;

/// Default vertical field of view, in radians.
pub const DEFAULT_FOV: f32 = 0.8;

/// A camera orbiting a target point.
///
/// The camera position is derived from the orbit angles: `alpha` is the longitudinal rotation
/// around the Y axis and `beta` the latitudinal angle from the positive Y axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcRotateCamera {
    alpha: f32,
    beta: f32,
    radius: f32,
    target: Vector3<f32>,
    pub fov: f32,
    lower_radius_limit: Option<f32>,
    upper_radius_limit: Option<f32>,
    /// Zoom speed for mouse wheel input, relative to the radius.
    pub wheel_delta_percentage: f32,
}

impl ArcRotateCamera {
    pub fn new(alpha: f32, beta: f32, radius: f32, target: Vector3<f32>) -> Self {
        Self {
            alpha: alpha.rem_euclid(TAU),
            beta,
            radius,
            target,
            fov: DEFAULT_FOV,
            lower_radius_limit: None,
            upper_radius_limit: None,
            wheel_delta_percentage: 0.01,
        }
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[inline]
    pub fn beta(&self) -> f32 {
        self.beta
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn target(&self) -> Vector3<f32> {
        self.target
    }

    /// Returns the world-space position of the camera.
    pub fn position(&self) -> Vector3<f32> {
        let (sin_a, cos_a) = self.alpha.sin_cos();
        let (sin_b, cos_b) = self.beta.sin_cos();
        self.target + Vector3::new(cos_a * sin_b, cos_b, sin_a * sin_b) * self.radius
    }

    /// Restricts the orbit radius. The current radius is clamped right away.
    pub fn set_radius_limits(&mut self, lower: Option<f32>, upper: Option<f32>) {
        self.lower_radius_limit = lower;
        self.upper_radius_limit = upper;
        self.radius = self.clamp_radius(self.radius);
    }

    pub fn radius_limits(&self) -> (Option<f32>, Option<f32>) {
        (self.lower_radius_limit, self.upper_radius_limit)
    }

    /// Moves the camera to `position`, keeping the target.
    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.rebuild_angles(position);
    }

    /// Points the camera at `target`, keeping its position.
    pub fn set_target(&mut self, target: Vector3<f32>) {
        let position = self.position();
        self.target = target;
        self.rebuild_angles(position);
    }

    fn rebuild_angles(&mut self, position: Vector3<f32>) {
        let rel = position - self.target;
        let radius = match rel.norm() {
            r if r == 0.0 => 0.0001,
            r => r,
        };

        let horizontal = (rel.x * rel.x + rel.z * rel.z).sqrt();
        let alpha = if horizontal == 0.0 {
            FRAC_PI_2
        } else {
            let alpha = (rel.x / horizontal).clamp(-1.0, 1.0).acos();
            if rel.z < 0.0 {
                TAU - alpha
            } else {
                alpha
            }
        };

        self.alpha = alpha.rem_euclid(TAU);
        self.beta = (rel.y / radius).clamp(-1.0, 1.0).acos();
        self.radius = self.clamp_radius(radius);
    }

    fn clamp_radius(&self, radius: f32) -> f32 {
        let radius = match self.lower_radius_limit {
            Some(lower) => radius.max(lower),
            None => radius,
        };
        match self.upper_radius_limit {
            Some(upper) => radius.min(upper),
            None => radius,
        }
    }
}
