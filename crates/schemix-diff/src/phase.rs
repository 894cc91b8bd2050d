use std::collections::BTreeMap;
use std::fmt;

use schemix_types::{get_at_path, join_key, parent_path, Conflict, ConflictKind, Tree};
use serde_json::Value;

use crate::refs::RefGraph;
use crate::walk::{walk_pair, Visit, WalkNode};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The detection phases, in the order they claim paths.
///
/// A path claimed by an earlier phase is invisible to every later one, so
/// the order here is the priority order of conflict classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Meta,
    References,
    Definitions,
    Composition,
    ObjectShape,
    Properties,
    Arrays,
    Types,
    Constraints,
    Required,
    Annotations,
    Revalidation,
}

impl Phase {
    pub const ALL: [Phase; 12] = [
        Self::Meta,
        Self::References,
        Self::Definitions,
        Self::Composition,
        Self::ObjectShape,
        Self::Properties,
        Self::Arrays,
        Self::Types,
        Self::Constraints,
        Self::Required,
        Self::Annotations,
        Self::Revalidation,
    ];

    /// 1-based position in the pipeline.
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::References => "references",
            Self::Definitions => "definitions",
            Self::Composition => "composition",
            Self::ObjectShape => "object-shape",
            Self::Properties => "properties",
            Self::Arrays => "arrays",
            Self::Types => "types",
            Self::Constraints => "constraints",
            Self::Required => "required",
            Self::Annotations => "annotations",
            Self::Revalidation => "revalidation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// TreePair
// ---------------------------------------------------------------------------

/// The two normalized trees being compared.
#[derive(Clone, Copy, Debug)]
pub struct TreePair<'t> {
    pub base: &'t Tree,
    pub incoming: &'t Tree,
}

impl<'t> TreePair<'t> {
    pub fn new(base: &'t Tree, incoming: &'t Tree) -> Self {
        Self { base, incoming }
    }

    /// Both sides of the sibling `key` of the node at `path`.
    pub fn sibling(&self, path: &str, key: &str) -> (Option<&'t Tree>, Option<&'t Tree>) {
        let Some(parent) = parent_path(path) else {
            return (None, None);
        };
        let target = join_key(&parent, key);
        (
            get_at_path(self.base, &target),
            get_at_path(self.incoming, &target),
        )
    }

    /// Both sides of the parent of `path`.
    pub fn parent(&self, path: &str) -> (Option<&'t Tree>, Option<&'t Tree>) {
        match parent_path(path) {
            Some(parent) => (
                get_at_path(self.base, &parent),
                get_at_path(self.incoming, &parent),
            ),
            None => (None, None),
        }
    }

    /// Walk the pair, hiding what no phase may classify: claimed subtrees,
    /// identical subtrees, and array elements owned by their array.
    pub fn walk<F>(&self, ctx: &mut DetectionContext, mut visit: F)
    where
        F: FnMut(&WalkNode<'t>, &mut DetectionContext) -> Visit,
    {
        walk_pair(self.base, self.incoming, &mut |node| {
            if ctx.covers(&node.path) || !node.differs() || node.is_covered_element() {
                return Visit::Skip;
            }
            if ctx.is_node_claimed(&node.path) {
                return Visit::Descend;
            }
            visit(node, ctx)
        });
    }
}

// ---------------------------------------------------------------------------
// DetectionContext
// ---------------------------------------------------------------------------

/// State shared by all phases of one detection run.
///
/// Reporting a conflict claims its path. A regular claim covers the whole
/// subtree; a node claim (used for plain data arrays) covers only the path
/// itself so later phases can still look inside the elements.
pub struct DetectionContext {
    step: usize,
    phase: Phase,
    claimed: BTreeMap<String, Phase>,
    claimed_nodes: BTreeMap<String, Phase>,
    conflicts: Vec<Conflict>,
    /// Old definition path to new definition path.
    pub definition_renames: BTreeMap<String, String>,
    /// Old property path to new property path.
    pub property_renames: BTreeMap<String, String>,
    pub base_refs: RefGraph,
    pub incoming_refs: RefGraph,
}

impl DetectionContext {
    pub fn new(pair: &TreePair<'_>, step: usize) -> Self {
        Self {
            step,
            phase: Phase::Meta,
            claimed: BTreeMap::new(),
            claimed_nodes: BTreeMap::new(),
            conflicts: Vec::new(),
            definition_renames: BTreeMap::new(),
            property_renames: BTreeMap::new(),
            base_refs: RefGraph::build(pair.base),
            incoming_refs: RefGraph::build(pair.incoming),
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// The phase currently running.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// The phase owning `path`, through an exact claim or a claimed ancestor.
    pub fn claimed_by(&self, path: &str) -> Option<Phase> {
        if let Some(phase) = self.claimed_nodes.get(path).or_else(|| self.claimed.get(path)) {
            return Some(*phase);
        }
        ancestors(path).find_map(|ancestor| self.claimed.get(ancestor).copied())
    }

    pub fn is_claimed(&self, path: &str) -> bool {
        self.claimed_by(path).is_some()
    }

    /// Returns `true` if a subtree claim covers `path`.
    pub fn covers(&self, path: &str) -> bool {
        self.claimed.contains_key(path) || ancestors(path).any(|a| self.claimed.contains_key(a))
    }

    /// Returns `true` if `path` itself was claimed without its subtree.
    pub fn is_node_claimed(&self, path: &str) -> bool {
        self.claimed_nodes.contains_key(path)
    }

    /// Claim `path` and everything below it. The first claim wins.
    pub fn claim(&mut self, path: impl Into<String>) {
        self.claimed.entry(path.into()).or_insert(self.phase);
    }

    /// Claim `path` alone, leaving its descendants open.
    pub fn claim_node(&mut self, path: impl Into<String>) {
        self.claimed_nodes.entry(path.into()).or_insert(self.phase);
    }

    /// Record a conflict and claim its subtree.
    pub fn report(
        &mut self,
        path: &str,
        kind: ConflictKind,
        current: Option<&Tree>,
        incoming: Option<&Tree>,
        description: impl Into<String>,
    ) -> &mut Conflict {
        self.claim(path);
        self.push(path, kind, current, incoming, description.into())
    }

    /// Record a conflict and claim only its own path.
    pub fn report_node(
        &mut self,
        path: &str,
        kind: ConflictKind,
        current: Option<&Tree>,
        incoming: Option<&Tree>,
        description: impl Into<String>,
    ) -> &mut Conflict {
        self.claim_node(path);
        self.push(path, kind, current, incoming, description.into())
    }

    fn push(
        &mut self,
        path: &str,
        kind: ConflictKind,
        current: Option<&Tree>,
        incoming: Option<&Tree>,
        description: String,
    ) -> &mut Conflict {
        let conflict = Conflict::new(
            path,
            kind,
            current.cloned(),
            incoming.cloned(),
            self.step,
            description,
        );
        let index = self.conflicts.len();
        self.conflicts.push(conflict);
        &mut self.conflicts[index]
    }

    /// Link the conflict at `from` to `to`, if one was reported.
    pub fn link(&mut self, from: &str, to: &str) {
        if let Some(conflict) = self.conflicts.iter_mut().find(|c| c.path == from) {
            if !conflict.linked_conflict_paths.iter().any(|p| p == to) {
                conflict.linked_conflict_paths.push(to.to_string());
            }
        }
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn into_conflicts(self) -> Vec<Conflict> {
        self.conflicts
    }
}

/// Strict ancestors of a canonical path, nearest last.
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.char_indices()
        .filter(|(_, c)| matches!(c, '/' | '['))
        .map(move |(i, _)| &path[..i])
}

// ---------------------------------------------------------------------------
// DetectionPhase trait
// ---------------------------------------------------------------------------

/// One phase of the detector.
///
/// Phases run in order against the same [`DetectionContext`]. A phase
/// reports conflicts only on unclaimed paths and claims what it reports.
pub trait DetectionPhase: Send + Sync {
    fn phase(&self) -> Phase;

    fn run(&self, pair: &TreePair<'_>, ctx: &mut DetectionContext);
}

/// Compact rendering of one side of a conflict for descriptions.
pub fn show(value: Option<&Tree>) -> String {
    const LIMIT: usize = 60;
    let rendered = match value {
        None => return "<absent>".to_string(),
        Some(Value::String(s)) => format!("\"{s}\""),
        Some(other) => other.to_string(),
    };
    if rendered.chars().count() > LIMIT {
        let cut: String = rendered.chars().take(LIMIT - 3).collect();
        format!("{cut}...")
    } else {
        rendered
    }
}
