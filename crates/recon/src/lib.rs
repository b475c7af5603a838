//! `tally-recon` — deterministic multi-source reconciliation engine.
//!
//! Receives parsed configuration and raw records, returns normalized records
//! and variances, and writes a hashed evidence bundle. No CLI dependencies.

pub mod amount;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod key;
pub mod loader;
pub mod mapper;
pub mod model;
pub mod normalize;
pub mod runlog;
pub mod timestamp;
pub mod value;
pub mod variance;

pub use config::{EngineInput, MappingConfig, Ruleset, RunSettings};
pub use engine::{run, run_to_dir, ReconConfig, ReconInput, ReconOutcome};
pub use error::ReconError;
pub use evidence::{verify_manifest, write_bundle, ManifestVerification};
pub use model::{EngineOutput, NormalizedRecord, SourceBatch, VarianceItem, VarianceKind};
