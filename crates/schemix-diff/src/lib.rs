//! Conflict detection for schemix.
//!
//! Compares two JSON-like trees and produces a typed, non-overlapping list
//! of conflicts, plus the structural patch used to advance an accumulated
//! tree between merge steps.
//!
//! # Key Types
//!
//! - [`ConflictDetector`] -- Runs the twelve detection phases in priority order
//! - [`DetectionPhase`] / [`DetectionContext`] -- Phase trait and the shared claim state
//! - [`WalkNode`] -- One visited path of a parallel walk over two trees
//! - [`RefGraph`] -- `$ref` edges of a tree, with broken/cyclic reference queries
//! - [`StructuralSignature`] -- BLAKE3 fingerprint used for rename matching
//! - [`StructuralPatch`] / [`PatchOp`] -- Add/replace/remove operations between trees

pub mod detector;
pub mod enhance;
pub mod error;
pub mod keywords;
pub mod patch;
pub mod phase;
pub mod phases;
pub mod refs;
pub mod signature;
pub mod similarity;
pub mod walk;

pub use detector::{detect, ConflictDetector, Detection, PhaseResult};
pub use enhance::enhance_arrays;
pub use error::{DiffError, DiffResult};
pub use patch::{apply_patch, diff_trees, PatchOp, StructuralPatch};
pub use phase::{DetectionContext, DetectionPhase, Phase, TreePair};
pub use phases::meta::normalize_nullable;
pub use refs::{RefEdge, RefGraph};
pub use signature::StructuralSignature;
pub use similarity::{edit_distance, name_similarity};
pub use walk::{walk_pair, Container, Visit, WalkNode};
