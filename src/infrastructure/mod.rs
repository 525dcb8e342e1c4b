//! Infrastructure layer: config loading, logging, and other side-effecting
//! concerns that sit outside the domain model.

pub mod config;
pub mod logging;
