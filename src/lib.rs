//! Cadence - timed CSV-to-MQTT event replayer
//!
//! Replays captured sensor traffic onto a broker with its original pacing,
//! optionally sped up, slowed down or looped.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod generate;
pub mod pacing;
pub mod publish;
pub mod record;
pub mod replay;
pub mod source;

pub use error::{CadenceError, Result};
pub use record::Record;
