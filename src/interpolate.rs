//! Temporal smoothing of detection results.
//!
//! Raw detections jitter from frame to frame. The [`Interpolator`] runs every coordinate of every
//! point sequence in a result through a filter, so the back-ends see a stable skeleton.

use std::collections::HashMap;

use crate::filter::{FilterBase, Smoothing, TimeBasedFilter};
use crate::result::{DetectionResult, Point};

/// Time step assumed when two results carry no usable timestamps.
const DEFAULT_ELAPSED: f32 = 1.0 / 60.0;

/// Smooths a stream of [`DetectionResult`]s.
///
/// Every point sequence (eg. the keypoints of the first body, or one finger of the second hand)
/// is a separate channel with its own filter state. A channel is reset when its sequence changes
/// length or is missing from a result, and all channels are reset when timestamps go backwards.
pub struct Interpolator<F: TimeBasedFilter<f32> = Smoothing> {
    filter: F,
    channels: HashMap<String, Vec<[F::State; 3]>>,
    last_timestamp: Option<f64>,
}

impl<F: TimeBasedFilter<f32>> Interpolator<F> {
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            channels: HashMap::new(),
            last_timestamp: None,
        }
    }

    /// Forgets all accumulated history.
    pub fn reset(&mut self) {
        self.channels.clear();
        self.last_timestamp = None;
    }

    /// Returns the number of point sequences currently being tracked.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns a smoothed copy of `result`.
    pub fn next(&mut self, result: &DetectionResult) -> DetectionResult {
        let elapsed = match self.last_timestamp {
            Some(last) if result.timestamp < last => {
                log::debug!(
                    "result timestamp went backwards ({} -> {}), resetting filters",
                    last,
                    result.timestamp
                );
                self.channels.clear();
                DEFAULT_ELAPSED
            }
            Some(last) if result.timestamp > last => ((result.timestamp - last) / 1000.0) as f32,
            _ => DEFAULT_ELAPSED,
        };
        self.last_timestamp = Some(result.timestamp);

        let mut out = result.clone();
        let mut pass = Pass {
            filter: &self.filter,
            channels: &mut self.channels,
            seen: Vec::new(),
            elapsed,
        };

        for (i, body) in out.body.iter_mut().enumerate() {
            // Keypoint positions are smoothed as one sequence, raw positions as another.
            let mut positions = body.keypoints.iter().map(|k| k.position).collect::<Vec<_>>();
            pass.smooth(format!("body{i}.keypoints"), &mut positions);
            let mut raw = body
                .keypoints
                .iter()
                .map(|k| k.position_raw)
                .collect::<Vec<_>>();
            pass.smooth(format!("body{i}.raw"), &mut raw);
            for ((kpt, pos), raw) in body.keypoints.iter_mut().zip(positions).zip(raw) {
                kpt.position = pos;
                kpt.position_raw = raw;
            }

            for (name, lines) in &mut body.annotations {
                for (j, line) in lines.iter_mut().enumerate() {
                    pass.smooth(format!("body{i}.{name}.{j}"), line);
                }
            }
        }

        for (i, hand) in out.hand.iter_mut().enumerate() {
            pass.smooth(format!("hand{i}.keypoints"), &mut hand.keypoints);
            for (name, line) in &mut hand.annotations {
                pass.smooth(format!("hand{i}.{name}"), line);
            }
        }

        for (i, face) in out.face.iter_mut().enumerate() {
            pass.smooth(format!("face{i}.mesh"), &mut face.mesh);
            pass.smooth(format!("face{i}.raw"), &mut face.mesh_raw);
            for (name, line) in &mut face.annotations {
                pass.smooth(format!("face{i}.{name}"), line);
            }
        }

        let seen = pass.seen;
        self.channels.retain(|key, _| seen.contains(key));

        out
    }
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new(Smoothing::default())
    }
}

struct Pass<'a, F: FilterBase<f32>> {
    filter: &'a F,
    channels: &'a mut HashMap<String, Vec<[F::State; 3]>>,
    seen: Vec<String>,
    elapsed: f32,
}

impl<F: TimeBasedFilter<f32>> Pass<'_, F> {
    fn smooth(&mut self, key: String, points: &mut [Point]) {
        let states = self.channels.entry(key.clone()).or_default();
        if states.len() != points.len() {
            states.clear();
            states.resize_with(points.len(), Default::default);
        }

        for (point, [sx, sy, sz]) in points.iter_mut().zip(states.iter_mut()) {
            point.x = self.filter.filter(sx, point.x, self.elapsed);
            point.y = self.filter.filter(sy, point.y, self.elapsed);
            point.z = self.filter.filter(sz, point.z, self.elapsed);
        }

        self.seen.push(key);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::filter::ema::Ema;
    use crate::result::HandResult;

    use super::*;

    fn hand_at(x: f32, timestamp: f64) -> DetectionResult {
        DetectionResult {
            hand: vec![HandResult {
                keypoints: vec![Point::new(x, 2.0 * x, 0.0)],
                ..Default::default()
            }],
            timestamp,
            ..Default::default()
        }
    }

    #[test]
    fn smooths_across_frames() {
        let mut interp = Interpolator::new(Smoothing::Ema(Ema::new(0.5)));
        let first = interp.next(&hand_at(0.0, 0.0));
        assert_eq!(first.hand[0].keypoints[0], Point::new(0.0, 0.0, 0.0));

        let second = interp.next(&hand_at(10.0, 16.0));
        assert_relative_eq!(second.hand[0].keypoints[0].x, 5.0);
        assert_relative_eq!(second.hand[0].keypoints[0].y, 10.0);
    }

    #[test]
    fn vanished_sequences_start_over() {
        let mut interp = Interpolator::new(Smoothing::Ema(Ema::new(0.5)));
        interp.next(&hand_at(0.0, 0.0));
        assert_eq!(interp.channel_count(), 1);

        interp.next(&DetectionResult::default());
        assert_eq!(interp.channel_count(), 0);

        let res = interp.next(&hand_at(10.0, 32.0));
        assert_eq!(res.hand[0].keypoints[0].x, 10.0);
    }

    #[test]
    fn resized_sequences_start_over() {
        let mut interp = Interpolator::new(Smoothing::Ema(Ema::new(0.5)));
        interp.next(&hand_at(0.0, 0.0));

        let mut two_points = hand_at(10.0, 16.0);
        two_points.hand[0].keypoints.push(Point::new(20.0, 20.0, 0.0));
        let res = interp.next(&two_points);
        assert_eq!(res.hand[0].keypoints, two_points.hand[0].keypoints);
        assert_eq!(interp.channel_count(), 1);

        // Same length again, so smoothing picks up from the last frame.
        let mut moved = hand_at(20.0, 32.0);
        moved.hand[0].keypoints.push(Point::new(20.0, 20.0, 0.0));
        let res = interp.next(&moved);
        assert_relative_eq!(res.hand[0].keypoints[0].x, 15.0);
    }

    #[test]
    fn time_reversal_resets() {
        let mut interp = Interpolator::new(Smoothing::Ema(Ema::new(0.5)));
        interp.next(&hand_at(0.0, 100.0));
        let res = interp.next(&hand_at(10.0, 50.0));
        assert_eq!(res.hand[0].keypoints[0].x, 10.0);
    }

    #[test]
    fn off_is_identity() {
        let mut interp = Interpolator::new(Smoothing::Off);
        interp.next(&hand_at(0.0, 0.0));
        let input = hand_at(7.0, 10.0);
        assert_eq!(interp.next(&input), input);
    }
}
