//! Command handlers, one module per subcommand.

pub mod cancel;
pub mod run;
pub mod status;
