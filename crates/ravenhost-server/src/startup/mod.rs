//! Startup and shutdown plumbing for the RavenHost server

pub mod logging;
pub mod shutdown;

pub use logging::init_logging;
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
