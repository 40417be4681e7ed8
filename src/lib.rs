//! Visualization of body, hand and face tracking results.
//!
//! Detection results come from an external inference engine (see [`worker::Detector`]) and are
//! rendered by three independent back-ends:
//!
//! - [`overlay`] draws points, labels and polylines over the input frame.
//! - [`mesh`] reconstructs a tube skeleton in a retained 3D [`scene`], auto-framing the camera on
//!   the first frame.
//! - [`avatar`] drives the bones of a rigged skeleton from keypoint pairs.
//!
//! # 3D Coordinates
//!
//! Scene coordinates use a Y-up system. Detection results use image coordinates, where Y points
//! *down*; the back-ends flip Y when mapping points into a scene.
//!
//! # Environment Variables
//!
//! * `POSEVIS_BACKEND`: overrides the inference backend requested in the [`DetectorConfig`].
//! * `POSEVIS_MODEL_BASE_PATH`: overrides the directory the detector loads its models from.
//! * `RUST_LOG`: standard [`env_logger`] filter, applied on top of the defaults set by
//!   [`init_logger!`].
//!
//! [`DetectorConfig`]: config::DetectorConfig

use log::LevelFilter;

pub mod avatar;
pub mod config;
pub mod filter;
pub mod image;
pub mod interpolate;
pub mod keypoint;
pub mod mesh;
pub mod overlay;
pub mod result;
pub mod scene;
pub mod timer;
pub mod worker;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and posevis will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
