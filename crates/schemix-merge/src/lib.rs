//! Resolution and sequential merging for schemix.
//!
//! Folds a sequence of schema documents into one accumulated tree, records
//! the conflicts found at each step, applies caller decisions through the
//! resolution algebra, and regenerates later steps when an earlier decision
//! changes.
//!
//! # Key Types
//!
//! - [`MergeEngine`] -- Facade over compatibility, merge, resolution, and regeneration
//! - [`SequentialMerger`] -- Left-to-right fold with per-step detection and patching
//! - [`MergeConfig`] / [`CombineOptions`] -- Engine configuration, loadable from TOML
//! - [`CompatibilityReport`] -- Verdict of the pre-merge gate
//! - [`ConflictReport`] -- Exportable snapshot of conflicts and decisions
//! - [`Decision`] -- A decision keyed by conflict signature, for restore and import

pub mod algebra;
pub mod apply;
pub mod cascade;
pub mod compat;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod regenerate;
pub mod report;

pub use algebra::{combine, extrapolate, interpolate, Outcome};
pub use apply::apply_resolutions;
pub use cascade::{cascade, Cascade};
pub use compat::{check, CompatibilityReport};
pub use config::{CombineOptions, KeyConflictPolicy, MergeConfig};
pub use decision::{Decision, DecisionMap};
pub use engine::MergeEngine;
pub use error::{EngineResult, MergeError};
pub use orchestrator::SequentialMerger;
pub use regenerate::regenerate_from_step;
pub use report::{ConflictReport, ReportMetadata, ReportedConflict};
