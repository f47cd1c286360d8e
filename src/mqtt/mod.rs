pub mod client;
pub mod source;

pub use client::build_options;
pub use source::{TelemetrySource, PHASE_TOPICS};
