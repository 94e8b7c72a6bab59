//! # Runtime
//!
//! Process-level wiring: startup, the controller watch loop and the error
//! policy shared by both controllers.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use error_policy::handle_reconciliation_error;
pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
