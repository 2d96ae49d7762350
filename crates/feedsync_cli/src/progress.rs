//! Progress reporting for sync runs.
//!
//! The library narrates each paginated run through `SyncProgress` events; the CLI
//! renders them as structured log lines.

mod logging;

pub use logging::LoggingReporter;
