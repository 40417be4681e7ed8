//! Data filtering and smoothing.
//!
//! Filters are split into parameters (the filter types themselves) and per-channel state
//! ([`FilterBase::State`]), so one set of parameters can smooth any number of independent
//! channels, eg. every coordinate of every tracked point.

pub mod ema;
pub mod one_euro;

use ema::{Ema, EmaState};
use one_euro::{OneEuroFilter, OneEuroFilterState};

/// Common base trait of [`Filter`] and [`TimeBasedFilter`].
pub trait FilterBase<T> {
    /// Per-channel filter state.
    type State: Default;
}

/// A filter that only looks at the sequence of values.
pub trait Filter<T>: FilterBase<T> {
    /// Feeds a new value into the filter, returning the filtered value.
    fn filter(&self, state: &mut Self::State, value: T) -> T;
}

/// A filter that also takes the time between values into account.
pub trait TimeBasedFilter<T>: FilterBase<T> {
    /// Feeds a new value into the filter, returning the filtered value.
    ///
    /// `elapsed` is the time since the previous value, in seconds.
    fn filter(&self, state: &mut Self::State, value: T, elapsed: f32) -> T;
}

/// Runtime selection of the smoothing filter applied to tracking data.
#[derive(Debug, Clone, Copy)]
pub enum Smoothing {
    /// Values are passed through unchanged.
    Off,
    Ema(Ema),
    OneEuro(OneEuroFilter),
}

impl Default for Smoothing {
    fn default() -> Self {
        Self::Ema(Ema::new(0.7))
    }
}

/// State of a [`Smoothing`] filter.
#[derive(Debug, Default)]
pub struct SmoothingState {
    ema: EmaState,
    one_euro: OneEuroFilterState,
}

impl FilterBase<f32> for Smoothing {
    type State = SmoothingState;
}

impl TimeBasedFilter<f32> for Smoothing {
    fn filter(&self, state: &mut Self::State, value: f32, elapsed: f32) -> f32 {
        match self {
            Smoothing::Off => value,
            Smoothing::Ema(ema) => Filter::filter(ema, &mut state.ema, value),
            Smoothing::OneEuro(euro) => euro.filter(&mut state.one_euro, value, elapsed),
        }
    }
}
