//! Per-frame detection results produced by the inference engine.
//!
//! The types in this module mirror the JSON shape emitted by the engine (camelCase field names).
//! A result is a read-only value: back-ends consume the latest one and discard it afterwards.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::keypoint::CONNECTED;

/// Number of face mesh points without iris refinement.
pub const FACE_MESH_POINTS: usize = 468;

/// Number of face mesh points including the 10 iris points.
pub const FACE_MESH_POINTS_WITH_IRIS: usize = 478;

/// A 2D or 3D point.
///
/// The engine omits the Z coordinate for some 2D-only models; it is read as `0.0` then.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "[f32; 3]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Returns the point halfway between `self` and `other`.
    pub fn midpoint(self, other: Point) -> Point {
        Point::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Point {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Point> for [f32; 3] {
    fn from(p: Point) -> Self {
        p.to_array()
    }
}

impl TryFrom<Vec<f32>> for Point {
    type Error = InvalidPoint;

    fn try_from(coords: Vec<f32>) -> Result<Self, Self::Error> {
        match coords[..] {
            [x, y] => Ok(Point::new(x, y, 0.0)),
            [x, y, z] => Ok(Point::new(x, y, z)),
            _ => Err(InvalidPoint(coords.len())),
        }
    }
}

/// Error returned when a point does not have 2 or 3 coordinates.
#[derive(Debug, Clone, Copy)]
pub struct InvalidPoint(usize);

impl fmt::Display for InvalidPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected a point with 2 or 3 coordinates, got {}", self.0)
    }
}

/// A single named body keypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyKeypoint {
    /// Keypoint name, eg. `leftShoulder`.
    pub part: String,
    /// Position in detector input pixels.
    pub position: Point,
    /// Position normalized to `0.0..=1.0`.
    pub position_raw: Point,
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BodyResult {
    pub id: u32,
    pub score: f32,
    pub box_raw: [f32; 4],
    pub keypoints: Vec<BodyKeypoint>,
    /// Named body parts, each made of one or more polylines.
    pub annotations: BTreeMap<String, Vec<Vec<Point>>>,
}

impl BodyResult {
    /// Looks up a keypoint by its engine name.
    pub fn keypoint(&self, part: &str) -> Option<&BodyKeypoint> {
        self.keypoints.iter().find(|kpt| kpt.part == part)
    }

    /// Returns the polylines of every body part.
    ///
    /// If the engine did not annotate the result, the parts are assembled from the keypoints using
    /// the [`CONNECTED`] table instead. Parts referencing missing keypoints are skipped.
    pub fn paths(&self) -> BTreeMap<String, Vec<Vec<Point>>> {
        if !self.annotations.is_empty() {
            return self.annotations.clone();
        }

        CONNECTED
            .iter()
            .filter_map(|(name, parts)| {
                let line = parts
                    .iter()
                    .map(|kpt| self.keypoint(kpt.name()).map(|k| k.position))
                    .collect::<Option<Vec<_>>>()?;
                Some((name.to_string(), vec![line]))
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandResult {
    pub id: u32,
    pub score: f32,
    /// Handedness or hand pose label reported by the engine.
    pub label: String,
    pub box_raw: [f32; 4],
    pub keypoints: Vec<Point>,
    /// Per-finger polylines (`index`, `middle`, `ring`, `pinky`, `thumb`, `palm`).
    pub annotations: BTreeMap<String, Vec<Point>>,
}

impl HandResult {
    pub fn finger(&self, name: &str) -> &[Point] {
        self.annotations.get(name).map_or(&[], |pts| &pts[..])
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FaceResult {
    pub id: u32,
    pub score: f32,
    pub box_raw: [f32; 4],
    /// Mesh points in detector input pixels.
    pub mesh: Vec<Point>,
    /// Mesh points normalized to `0.0..=1.0`.
    pub mesh_raw: Vec<Point>,
    pub annotations: BTreeMap<String, Vec<Point>>,
}

impl FaceResult {
    pub fn annotation(&self, name: &str) -> &[Point] {
        self.annotations.get(name).map_or(&[], |pts| &pts[..])
    }
}

/// Everything the engine detected in one frame.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionResult {
    pub face: Vec<FaceResult>,
    pub body: Vec<BodyResult>,
    pub hand: Vec<HandResult>,
    /// Time of detection, in milliseconds since the Unix epoch.
    pub timestamp: f64,
}

impl DetectionResult {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses a recording of results.
    ///
    /// Accepts either a JSON array of results or one result object per line (blank lines are
    /// skipped).
    pub fn from_json_lines(text: &str) -> anyhow::Result<Vec<Self>> {
        if text.trim_start().starts_with('[') {
            return Ok(serde_json::from_str(text)?);
        }

        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                Self::from_json(line).with_context(|| format!("invalid result on line {}", i + 1))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.face.is_empty() && self.body.is_empty() && self.hand.is_empty()
    }
}
