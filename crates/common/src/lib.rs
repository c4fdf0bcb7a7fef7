//! Shared plumbing for the ReelSplit crates.
//!
//! [`error`] defines [`ReelsError`], the single error type every library
//! crate returns. [`config`] loads the user's defaults from disk and
//! [`logging`] installs the tracing subscriber.

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
