//! Observability for the station agent: structured logging and span macros

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat, LogSettings};

pub use logging::{mqtt_span, sample_span};
