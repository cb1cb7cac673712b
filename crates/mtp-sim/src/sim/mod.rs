// crates/mtp-sim/src/sim/mod.rs

//! Synthetic signal generation for numeric tags.

pub mod config;
pub mod engine;
pub mod generator;

/// Amplitude of the sine every numeric tag follows.
pub const SINE_AMPLITUDE: f64 = 50.0;

/// Period, in seconds, of the sine every numeric tag follows.
pub const SINE_PERIOD_SECONDS: f64 = 30.0;
