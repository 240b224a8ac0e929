//! # Telemetry Module
//!
//! Handles recording of received samples to JSONL files with rotation.
//!
//! This module handles:
//! - Formatting each frame's new samples as one JSON Lines record
//! - Writing to rotating files (max N records per file)
//! - Retaining only the last M files

pub mod recorder;

pub use recorder::{SampleRecord, SampleRecorder};
