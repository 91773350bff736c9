//! Photo processing worker.
//!
//! Drains the `processing_jobs` queue filled by the media service: each job
//! reads a stored upload, extracts its dimensions from the image header and
//! either publishes the photo as `ready` or rejects it.

pub mod config;
pub mod processor;
pub mod runner;

pub use config::WorkerConfig;
pub use processor::{process_job, read_dimensions, JobOutcome, ReadError};
pub use runner::{run, run_once};
