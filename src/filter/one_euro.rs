//! The [1€ Filter], an adaptive low-pass filter for noisy tracking input.
//!
//! The cutoff frequency rises with the speed of the signal: slow movements are smoothed heavily
//! (reducing jitter), fast movements pass through with little lag.
//!
//! [1€ Filter]: https://gery.casiez.net/1euro/

use std::f32::consts::TAU;

use super::{FilterBase, TimeBasedFilter};

/// 1€ Filter parameters.
#[derive(Debug, Clone, Copy)]
pub struct OneEuroFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
}

impl OneEuroFilter {
    /// Creates a new set of 1€ Filter parameters.
    ///
    /// - `min_cutoff` is the minimum cutoff frequency in Hz. Lowering it reduces jitter but
    ///   increases lag.
    /// - `beta` is the speed coefficient. Increasing it reduces lag during fast movements.
    ///
    /// # Panics
    ///
    /// Panics if `min_cutoff` is not positive or `beta` is negative.
    pub fn new(min_cutoff: f32, beta: f32) -> Self {
        assert!(min_cutoff > 0.0, "min_cutoff must be positive");
        assert!(beta >= 0.0, "beta must not be negative");
        Self {
            min_cutoff,
            beta,
            d_cutoff: 1.0,
        }
    }

    /// Returns a copy of `self` with a different cutoff frequency for the derivative.
    ///
    /// Defaults to 1.0 Hz.
    pub fn with_d_cutoff(self, d_cutoff: f32) -> Self {
        Self { d_cutoff, ..self }
    }
}

/// Filter state for the [`OneEuroFilter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OneEuroFilterState {
    prev: Option<(f32, f32)>,
}

impl FilterBase<f32> for OneEuroFilter {
    type State = OneEuroFilterState;
}

impl TimeBasedFilter<f32> for OneEuroFilter {
    fn filter(&self, state: &mut OneEuroFilterState, x: f32, elapsed: f32) -> f32 {
        let Some((prev_x, prev_dx)) = state.prev else {
            state.prev = Some((x, 0.0));
            return x;
        };
        if elapsed <= 0.0 {
            // Same timestamp as the previous sample, nothing to integrate over.
            return prev_x;
        }

        let dx = (x - prev_x) / elapsed;
        let dx_hat = lerp(smoothing_factor(elapsed, self.d_cutoff), prev_dx, dx);

        let cutoff = self.min_cutoff + self.beta * dx_hat.abs();
        let x_hat = lerp(smoothing_factor(elapsed, cutoff), prev_x, x);

        state.prev = Some((x_hat, dx_hat));
        x_hat
    }
}

fn smoothing_factor(elapsed: f32, cutoff: f32) -> f32 {
    let r = TAU * cutoff * elapsed;
    r / (r + 1.0)
}

fn lerp(a: f32, from: f32, to: f32) -> f32 {
    a * to + (1.0 - a) * from
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn first_value_passes_through() {
        let f = OneEuroFilter::new(1.0, 0.0);
        let mut state = OneEuroFilterState::default();
        assert_eq!(f.filter(&mut state, 3.0, 1.0 / 60.0), 3.0);
    }

    #[test]
    fn fast_movement_lags_less() {
        let slow = OneEuroFilter::new(1.0, 0.0);
        let fast = OneEuroFilter::new(1.0, 1.0);
        let (mut s, mut f) = Default::default();
        slow.filter(&mut s, 0.0, 0.1);
        fast.filter(&mut f, 0.0, 0.1);

        let a = slow.filter(&mut s, 10.0, 0.1);
        let b = fast.filter(&mut f, 10.0, 0.1);
        assert!(a < b, "{a} >= {b}");
        assert!(b < 10.0);
    }

    #[test]
    fn zero_elapsed_keeps_previous() {
        let f = OneEuroFilter::new(1.0, 0.5);
        let mut state = OneEuroFilterState::default();
        f.filter(&mut state, 1.0, 0.1);
        assert_relative_eq!(f.filter(&mut state, 5.0, 0.0), 1.0);
    }
}
