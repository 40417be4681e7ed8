//! Property animations.
//!
//! A [`Tween`] moves one scalar [`Property`] of the scene from a start to an end value over a
//! fixed duration. Tweens start on the first [`Animations::step`] after they were added, so they
//! can be queued before the clock is known.

use std::f32::consts::{FRAC_PI_2, PI};

use serde::Serialize;

/// Easing functions, all applied in ease-in mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Easing {
    Linear,
    Sine,
    /// Overshoots backwards before moving towards the end value.
    Back,
    Circle,
}

impl Easing {
    /// Maps linear progress `t` (clamped to `0.0..=1.0`) to eased progress.
    pub fn ease(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Sine => 1.0 - ((1.0 - t) * FRAC_PI_2).sin(),
            Easing::Back => t * t * t - t * (t * PI).sin(),
            Easing::Circle => 1.0 - (1.0 - t * t).sqrt(),
        }
    }
}

/// An animatable scalar in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    CameraTargetX,
    CameraTargetY,
    CameraTargetZ,
    CameraPositionX,
    CameraPositionY,
    CameraPositionZ,
    CameraFov,
    LightDirectionX,
    LightDirectionY,
    LightDirectionZ,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tween {
    pub property: Property,
    pub from: f32,
    pub to: f32,
    pub duration_ms: f64,
    pub easing: Easing,
    start_ms: Option<f64>,
}

impl Tween {
    pub fn new(property: Property, from: f32, to: f32, duration_ms: f64, easing: Easing) -> Self {
        Self {
            property,
            from,
            to,
            duration_ms,
            easing,
            start_ms: None,
        }
    }

    /// Returns the value at `now_ms` and whether the tween has finished.
    fn sample(&mut self, now_ms: f64) -> (f32, bool) {
        let start = *self.start_ms.get_or_insert(now_ms);
        let elapsed = now_ms - start;
        if self.duration_ms <= 0.0 || elapsed >= self.duration_ms {
            return (self.to, true);
        }
        let t = (elapsed / self.duration_ms) as f32;
        let value = self.from + (self.to - self.from) * self.easing.ease(t);
        (value, false)
    }
}

/// The set of running tweens. At most one tween runs per property.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Animations {
    tweens: Vec<Tween>,
}

impl Animations {
    /// Adds a tween, replacing any running tween of the same property.
    pub fn start(&mut self, tween: Tween) {
        self.tweens.retain(|t| t.property != tween.property);
        self.tweens.push(tween);
    }

    /// Stops all tweens without applying their end values.
    pub fn clear(&mut self) {
        self.tweens.clear();
    }

    pub fn is_running(&self, property: Property) -> bool {
        self.tweens.iter().any(|t| t.property == property)
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    /// Advances all tweens to `now_ms`, returning the current value of every animated property.
    ///
    /// A finished tween reports its exact end value once and is then removed.
    pub fn step(&mut self, now_ms: f64) -> Vec<(Property, f32)> {
        let mut values = Vec::with_capacity(self.tweens.len());
        self.tweens.retain_mut(|tween| {
            let (value, done) = tween.sample(now_ms);
            values.push((tween.property, value));
            !done
        });
        values
    }
}
