//! Structured logging setup via `tracing`/`tracing-subscriber`.

pub mod logger;

pub use logger::{init, LogFormat};
