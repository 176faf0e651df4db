//! captime library crate: timing core, packet streams and rendering,
//! re-exported for the binary, benchmarks and tests.

pub mod capture;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod output;
pub mod session;
pub mod shutdown;
pub mod timestamp;
pub mod timing;

pub use error::{ConfigError, ReadError, SessionError, StreamError};
pub use output::OutputFormat;
pub use session::{Session, SessionConfig, SessionSummary, StopReason};
pub use shutdown::{Escalation, ShutdownToken};
pub use timestamp::Timestamp;
pub use timing::ReferenceFrame;
