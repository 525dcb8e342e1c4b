//! Domain layer: models, errors, and ports. No I/O, no async runtime
//! dependency beyond trait signatures in `ports`.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{CoreError, CoreResult};
