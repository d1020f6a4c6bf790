//! Replay orchestration: cycles, looping and delivery accounting

mod controller;
mod session;

pub use controller::ReplayController;
pub use session::{ReplaySession, ReplayStats, ReplaySummary};
