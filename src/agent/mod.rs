//! Station agent: periodic sampling plus the connection listener

pub mod listener;
pub mod sampler;

pub use listener::StationListener;
pub use sampler::{SampleOutcome, SamplingLoop, SamplingSettings};
