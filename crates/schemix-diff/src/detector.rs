use std::time::{Duration, Instant};

use schemix_types::{Conflict, Tree};
use tracing::debug;

use crate::enhance::enhance_arrays;
use crate::phase::{DetectionContext, DetectionPhase, Phase, TreePair};
use crate::phases::{default_phases, meta::normalize_nullable};

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Per-phase record of one detection run.
#[derive(Clone, Debug)]
pub struct PhaseResult {
    pub phase: Phase,
    /// Conflicts this phase reported.
    pub conflicts: usize,
    pub elapsed: Duration,
}

/// The full outcome of a detection run.
#[derive(Clone, Debug)]
pub struct Detection {
    pub conflicts: Vec<Conflict>,
    pub phase_results: Vec<PhaseResult>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// ConflictDetector
// ---------------------------------------------------------------------------

/// The conflict detector: an ordered pipeline of phases sharing one claim
/// set, followed by per-index array expansion.
///
/// Detection is deterministic: the same inputs always yield the same
/// conflicts in the same order.
pub struct ConflictDetector {
    phases: Vec<Box<dyn DetectionPhase>>,
    expand_arrays: bool,
}

impl ConflictDetector {
    /// An empty pipeline. Use [`Self::add_phase`] to add phases, or
    /// [`Self::with_default_phases`] for the standard twelve.
    pub fn new() -> Self {
        Self {
            phases: Vec::new(),
            expand_arrays: true,
        }
    }

    pub fn with_default_phases() -> Self {
        let mut detector = Self::new();
        for phase in default_phases() {
            detector.add_phase(phase);
        }
        detector
    }

    /// Append a phase to the end of the pipeline.
    pub fn add_phase(&mut self, phase: Box<dyn DetectionPhase>) {
        self.phases.push(phase);
    }

    /// Enable or disable per-index expansion of array conflicts.
    pub fn with_array_expansion(mut self, enabled: bool) -> Self {
        self.expand_arrays = enabled;
        self
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// Detect conflicts between `base` and `incoming` for merge step `step`.
    pub fn detect(&self, base: &Tree, incoming: &Tree, step: usize) -> Vec<Conflict> {
        self.run(base, incoming, step).conflicts
    }

    /// Like [`Self::detect`], also returning per-phase timings.
    pub fn run(&self, base: &Tree, incoming: &Tree, step: usize) -> Detection {
        let start = Instant::now();
        let base = normalize_nullable(base);
        let incoming = normalize_nullable(incoming);
        let pair = TreePair::new(&base, &incoming);
        let mut ctx = DetectionContext::new(&pair, step);

        let mut phase_results = Vec::with_capacity(self.phases.len());
        for phase in &self.phases {
            let phase_start = Instant::now();
            let before = ctx.conflicts().len();
            ctx.enter(phase.phase());
            phase.run(&pair, &mut ctx);
            let reported = ctx.conflicts().len() - before;
            debug!(step, phase = %phase.phase(), reported, "detection phase complete");
            phase_results.push(PhaseResult {
                phase: phase.phase(),
                conflicts: reported,
                elapsed: phase_start.elapsed(),
            });
        }

        let mut conflicts = ctx.into_conflicts();
        if self.expand_arrays {
            conflicts = enhance_arrays(conflicts);
        }
        debug!(step, total = conflicts.len(), "detection complete");
        Detection {
            conflicts,
            phase_results,
            elapsed: start.elapsed(),
        }
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::with_default_phases()
    }
}

/// Detect with the default pipeline.
pub fn detect(base: &Tree, incoming: &Tree, step: usize) -> Vec<Conflict> {
    ConflictDetector::with_default_phases().detect(base, incoming, step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use schemix_types::{ConflictKind, Severity};
    use serde_json::{json, Value};

    fn kinds(conflicts: &[Conflict]) -> Vec<(&str, ConflictKind)> {
        conflicts.iter().map(|c| (c.path.as_str(), c.kind)).collect()
    }

    // -----------------------------------------------------------------------
    // 1. Pipeline shape
    // -----------------------------------------------------------------------

    #[test]
    fn default_pipeline_has_twelve_phases_in_order() {
        let detector = ConflictDetector::with_default_phases();
        assert_eq!(detector.phase_count(), 12);
        let run = detector.run(&json!({}), &json!({}), 1);
        let order: Vec<_> = run.phase_results.iter().map(|r| r.phase).collect();
        assert_eq!(order, Phase::ALL.to_vec());
    }

    #[test]
    fn identical_trees_have_no_conflicts() {
        let tree = json!({"type": "object", "properties": {"a": {"type": "string"}}});
        assert!(detect(&tree, &tree, 1).is_empty());
    }

    #[test]
    fn empty_pipeline_reports_nothing() {
        let detector = ConflictDetector::new();
        assert!(detector.detect(&json!({"a": 1}), &json!({"a": 2}), 1).is_empty());
    }

    // -----------------------------------------------------------------------
    // 2. Classification precedence
    // -----------------------------------------------------------------------

    #[test]
    fn removed_required_property_is_a_single_conflict() {
        let base = json!({
            "type": "object",
            "properties": {"id": {"type": "string"}, "email": {"type": "string"}},
            "required": ["id", "email"]
        });
        let incoming = json!({
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        });
        let conflicts = detect(&base, &incoming, 1);
        assert_eq!(kinds(&conflicts), vec![("/properties/email", ConflictKind::PropertyRemovedRequired)]);
        assert_eq!(conflicts[0].severity, Severity::Critical);
        assert!(conflicts[0].requires_manual_review);
    }

    #[test]
    fn type_expansion_suppresses_constraints() {
        let base = json!({"properties": {"code": {"type": "string", "minLength": 1, "pattern": "^[A-Z]"}}});
        let incoming = json!({"properties": {"code": {"type": ["string", "integer"], "minLength": 2}}});
        let conflicts = detect(&base, &incoming, 1);
        assert_eq!(kinds(&conflicts), vec![("/properties/code/type", ConflictKind::TypeExpanded)]);
    }

    #[test]
    fn openapi_nullable_is_normalized() {
        let base = json!({"openapi": "3.0.3", "components": {"schemas": {"A": {"type": "string"}}}});
        let incoming = json!({"openapi": "3.0.3", "components": {"schemas": {"A": {"type": "string", "nullable": true}}}});
        let conflicts = detect(&base, &incoming, 1);
        assert_eq!(
            kinds(&conflicts),
            vec![("/components/schemas/A/type", ConflictKind::TypeExpanded)]
        );
    }

    #[test]
    fn data_array_elements_are_examined() {
        let base = json!({"parameters": [{"name": "q", "description": "old"}]});
        let incoming = json!({"parameters": [{"name": "q", "description": "new"}]});
        let conflicts = detect(&base, &incoming, 1);
        assert_eq!(
            kinds(&conflicts),
            vec![
                ("/parameters", ConflictKind::ArrayItemsChanged),
                ("/parameters[0]", ConflictKind::ArrayItemChanged),
                ("/parameters[0]/description", ConflictKind::DescriptionChanged),
            ]
        );
        assert_eq!(conflicts[1].linked_conflict_paths, vec!["/parameters[0]/description"]);
    }

    #[test]
    fn reordered_objects_with_shuffled_keys_are_one_conflict() {
        let base = json!({"servers": [{"a": 1, "b": 2}, {"c": 3}]});
        let incoming = json!({"servers": [{"c": 3}, {"b": 2, "a": 1}]});
        let conflicts = detect(&base, &incoming, 1);
        assert_eq!(kinds(&conflicts), vec![("/servers", ConflictKind::ArrayReordered)]);
    }

    #[test]
    fn renamed_definition_and_its_references() {
        let address = json!({"type": "object", "properties": {"street": {"type": "string"}}});
        let base = json!({
            "$defs": {"Address": address},
            "properties": {"home": {"$ref": "#/$defs/Address"}}
        });
        let incoming = json!({
            "$defs": {"Location": address},
            "properties": {"home": {"$ref": "#/$defs/Location"}}
        });
        let conflicts = detect(&base, &incoming, 1);
        assert_eq!(
            kinds(&conflicts),
            vec![
                ("/properties/home/$ref", ConflictKind::RefTargetChanged),
                ("/$defs/Address", ConflictKind::DefinitionRenamed),
            ]
        );
    }

    #[test]
    fn step_number_is_stamped() {
        let conflicts = detect(&json!({"a": 1}), &json!({"a": 2}), 7);
        assert!(conflicts.iter().all(|c| c.step_number == 7));
    }

    // -----------------------------------------------------------------------
    // 3. Invariants
    // -----------------------------------------------------------------------

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::from),
            (0i64..5).prop_map(Value::from),
            prop::sample::select(vec!["string", "integer", "null", "a", "b"]).prop_map(Value::from),
        ]
    }

    fn schema() -> impl Strategy<Value = Value> {
        let keys = prop::sample::select(vec![
            "type", "properties", "required", "items", "enum", "title", "minLength", "anyOf", "x", "tags",
            "additionalProperties", "$ref",
        ]);
        leaf().prop_recursive(3, 32, 4, move |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..3).prop_map(Value::from),
                prop::collection::btree_map(keys.clone(), inner, 0..4).prop_map(|m| {
                    Value::Object(m.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn detection_is_deterministic(base in schema(), incoming in schema()) {
            let first = detect(&base, &incoming, 1);
            let second = detect(&base, &incoming, 1);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn paths_are_unique(base in schema(), incoming in schema()) {
            let conflicts = detect(&base, &incoming, 1);
            let mut paths: Vec<_> = conflicts.iter().map(|c| c.path.clone()).collect();
            let total = paths.len();
            paths.sort();
            paths.dedup();
            prop_assert_eq!(paths.len(), total);
        }

        #[test]
        fn identical_inputs_are_clean(tree in schema()) {
            prop_assert!(detect(&tree, &tree, 1).is_empty());
        }
    }
}
