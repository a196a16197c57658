//! Live Bluesky timeline for the terminal.
//!
//! [`poller::Poller`] fetches the home timeline through a
//! [`feeds::TimelineSource`], keeps only posts it has not shown yet and
//! hands them to a [`notify::Notifier`] for printing, logging and alerts.

pub mod config;
pub mod dedup;
pub mod error;
pub mod feeds;
pub mod format;
pub mod notify;
pub mod parser;
pub mod poller;

pub use error::{Error, Result};
