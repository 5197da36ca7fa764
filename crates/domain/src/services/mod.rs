//! Process-wide service helpers such as telemetry wiring.

pub mod telemetry;

pub use telemetry::*;
