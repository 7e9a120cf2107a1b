//! The monitoring loop and everything it decides with.
//!
//! - `config`: JSON configuration and startup validation
//! - `milestone`: when a reading is worth a notification
//! - `actions`: scripted input sequences
//! - `notify`: notification text
//! - `state`: loop states and the stop signal
//! - `runner`: the loop itself

pub mod actions;
pub mod config;
pub mod milestone;
pub mod notify;
pub mod runner;
pub mod state;

pub use config::MonitorConfig;
pub use milestone::{MilestonePolicy, MilestoneTracker, NotificationDecision};
pub use runner::{Collaborators, CycleReport, MonitorLoop};
pub use state::{MonitorState, StopSignal};
