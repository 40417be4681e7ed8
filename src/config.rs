//! Detector configuration.
//!
//! [`DetectorConfig`] is sent to the detection worker with every message. Its JSON form matches
//! the configuration object the inference engine expects, so a config file written for the engine
//! can be loaded directly. Every field has a default, so partial files are fine.

use std::{env, fs, path::Path};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Overrides [`DetectorConfig::backend`].
pub const BACKEND_ENV: &str = "POSEVIS_BACKEND";
/// Overrides [`DetectorConfig::model_base_path`].
pub const MODEL_BASE_PATH_ENV: &str = "POSEVIS_MODEL_BASE_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectorConfig {
    pub backend: String,
    pub model_base_path: String,
    /// How much the input has to change before cached results are invalidated. `0` disables the
    /// cache.
    pub cache_sensitivity: f32,
    pub filter: InputFilter,
    pub face: FaceConfig,
    pub body: BodyConfig,
    pub hand: HandConfig,
    pub object: Toggle,
    pub gesture: Toggle,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: "humangl".into(),
            model_base_path: "../assets".into(),
            cache_sensitivity: 0.0,
            filter: InputFilter::default(),
            face: FaceConfig::default(),
            body: BodyConfig::default(),
            hand: HandConfig::default(),
            object: Toggle::default(),
            gesture: Toggle::default(),
        }
    }
}

/// Input preprocessing done by the engine before detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputFilter {
    pub enabled: bool,
    pub equalization: bool,
    /// Width the input is resized to before detection.
    pub width: u32,
    /// Height the input is resized to before detection.
    pub height: u32,
}

impl Default for InputFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            equalization: false,
            width: 512,
            height: 512,
        }
    }
}

impl InputFilter {
    /// Returns the resolution the detector sees for a `width`×`height` input frame.
    ///
    /// Detection results are in this coordinate space. A disabled filter, or a zero filter size,
    /// keeps the frame resolution.
    pub fn input_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.enabled && self.width != 0 && self.height != 0 {
            (self.width, self.height)
        } else {
            (width, height)
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Toggle {
    pub enabled: bool,
}

/// A model that only needs a path.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelPath {
    pub model_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FaceConfig {
    pub enabled: bool,
    pub detector: FaceDetectorConfig,
    pub mesh: FaceMeshConfig,
    pub attention: Toggle,
    pub iris: Toggle,
    pub description: Toggle,
    pub emotion: Toggle,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            detector: FaceDetectorConfig::default(),
            mesh: FaceMeshConfig::default(),
            // Iris landmarks extend the mesh to 478 points.
            attention: Toggle { enabled: true },
            iris: Toggle { enabled: true },
            description: Toggle::default(),
            emotion: Toggle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FaceDetectorConfig {
    pub rotation: bool,
    pub model_path: String,
}

impl Default for FaceDetectorConfig {
    fn default() -> Self {
        Self {
            rotation: false,
            model_path: "blazeface.json".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FaceMeshConfig {
    pub enabled: bool,
    pub model_path: String,
}

impl Default for FaceMeshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: "facemesh.json".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BodyConfig {
    pub enabled: bool,
    pub min_confidence: f32,
    pub max_detected: u32,
    pub model_path: String,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_confidence: 0.1,
            max_detected: 1,
            model_path: "blazepose-heavy.json".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandConfig {
    pub enabled: bool,
    pub min_confidence: f32,
    pub max_detected: u32,
    pub landmarks: bool,
    pub rotation: bool,
    pub detector: ModelPath,
    pub skeleton: ModelPath,
}

impl Default for HandConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_confidence: 0.1,
            max_detected: 1,
            landmarks: true,
            rotation: false,
            detector: ModelPath {
                model_path: "handtrack.json".into(),
            },
            skeleton: ModelPath {
                model_path: "handlandmark-full.json".into(),
            },
        }
    }
}

impl DetectorConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(backend) = var(BACKEND_ENV) {
            log::debug!("{BACKEND_ENV}={backend}");
            self.backend = backend;
        }
        if let Some(path) = var(MODEL_BASE_PATH_ENV) {
            log::debug!("{MODEL_BASE_PATH_ENV}={path}");
            self.model_base_path = path;
        }
    }

    /// Enables exactly the selected models and returns the paths of every enabled model.
    pub fn set_enabled(&mut self, face: bool, body: bool, hand: bool) -> Vec<String> {
        self.face.enabled = face;
        self.body.enabled = body;
        self.hand.enabled = hand;

        let models = self.enabled_models();
        log::info!("enabled models: {}", models.join(" | "));
        models
    }

    /// Returns the paths of the models the engine will load.
    pub fn enabled_models(&self) -> Vec<String> {
        let mut models = Vec::new();
        if self.face.enabled {
            models.push(self.face.detector.model_path.clone());
            if self.face.mesh.enabled {
                models.push(self.face.mesh.model_path.clone());
            }
        }
        if self.body.enabled {
            models.push(self.body.model_path.clone());
        }
        if self.hand.enabled {
            models.push(self.hand.detector.model_path.clone());
            if self.hand.landmarks {
                models.push(self.hand.skeleton.model_path.clone());
            }
        }
        models
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, confidence) in [
            ("body", self.body.min_confidence),
            ("hand", self.hand.min_confidence),
        ] {
            if !(0.0..=1.0).contains(&confidence) {
                bail!("{name} minConfidence must be in range 0.0..=1.0, got {confidence}");
            }
        }
        if self.body.max_detected == 0 || self.hand.max_detected == 0 {
            bail!("maxDetected must be at least 1");
        }
        if self.filter.width == 0 || self.filter.height == 0 {
            bail!(
                "invalid input filter size {}x{}",
                self.filter.width,
                self.filter.height
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.backend, "humangl");
        assert_eq!(config.filter.width, 512);
        assert!(!config.face.enabled && !config.body.enabled && !config.hand.enabled);
        assert_eq!(config.body.model_path, "blazepose-heavy.json");
        assert!(config.face.iris.enabled && config.face.attention.enabled);
        assert!(!config.face.description.enabled && !config.face.emotion.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn detector_input_size() {
        let mut filter = InputFilter::default();
        assert_eq!(filter.input_size(1920, 1080), (512, 512));
        filter.width = 0;
        assert_eq!(filter.input_size(1920, 1080), (1920, 1080));
        filter.width = 640;
        filter.enabled = false;
        assert_eq!(filter.input_size(1920, 1080), (1920, 1080));
    }

    #[test]
    fn partial_json() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{"body": {"enabled": true, "maxDetected": 3}}"#).unwrap();
        assert!(config.body.enabled);
        assert_eq!(config.body.max_detected, 3);
        assert_eq!(config.body.min_confidence, 0.1);
        assert_eq!(config.model_base_path, "../assets");
    }

    #[test]
    fn json_uses_engine_names() {
        let json = serde_json::to_value(DetectorConfig::default()).unwrap();
        assert_eq!(json["modelBasePath"], "../assets");
        assert_eq!(json["hand"]["skeleton"]["modelPath"], "handlandmark-full.json");
    }

    #[test]
    fn enabling_models() {
        let mut config = DetectorConfig::default();
        assert_eq!(config.set_enabled(false, true, false), ["blazepose-heavy.json"]);
        assert_eq!(
            config.set_enabled(true, false, true),
            [
                "blazeface.json",
                "facemesh.json",
                "handtrack.json",
                "handlandmark-full.json"
            ]
        );
        assert!(!config.body.enabled);
    }

    #[test]
    fn validation() {
        let mut config = DetectorConfig::default();
        config.hand.min_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.body.max_detected = 0;
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.filter.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides() {
        let mut config = DetectorConfig::default();
        config.apply_overrides(|name| (name == BACKEND_ENV).then(|| "wasm".to_string()));
        assert_eq!(config.backend, "wasm");
        assert_eq!(config.model_base_path, "../assets");
    }
}
