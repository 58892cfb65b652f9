//! Testing utilities and mock implementations
//!
//! Lets the sampling loop and listeners run without a broker or sensor
//! hardware.

pub mod mocks;

pub use mocks::*;
