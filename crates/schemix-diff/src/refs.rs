//! Reference graph over `$ref` keywords.

use std::collections::{BTreeMap, BTreeSet};

use schemix_types::{get_at_path, is_ancestor, join_index, join_key, parent_path, Tree};
use serde_json::Value;

use crate::walk::{walk_pair, Visit};

/// One `$ref` keyword.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefEdge {
    /// Path of the `$ref` keyword itself.
    pub path: String,
    /// Path of the schema holding the keyword.
    pub holder: String,
    /// The raw reference string.
    pub reference: String,
    /// Tree path of the target for local (`#/...`) references.
    pub target: Option<String>,
}

impl RefEdge {
    pub fn is_local(&self) -> bool {
        self.target.is_some()
    }
}

/// All `$ref` edges of one tree, in walk order.
#[derive(Clone, Debug, Default)]
pub struct RefGraph {
    edges: Vec<RefEdge>,
}

impl RefGraph {
    pub fn build(tree: &Tree) -> Self {
        let mut edges = Vec::new();
        walk_pair(tree, tree, &mut |node| {
            if node.keyword() == Some("$ref") {
                if let Some(Value::String(reference)) = node.base {
                    edges.push(RefEdge {
                        path: node.path.clone(),
                        holder: parent_path(&node.path).unwrap_or_default(),
                        reference: reference.clone(),
                        target: pointer_to_path(reference, tree),
                    });
                }
                return Visit::Skip;
            }
            Visit::Descend
        });
        Self { edges }
    }

    pub fn edges(&self) -> &[RefEdge] {
        &self.edges
    }

    pub fn get(&self, path: &str) -> Option<&RefEdge> {
        self.edges.iter().find(|e| e.path == path)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Returns `true` if a local reference's target does not exist in
    /// `tree`. Remote references are never considered broken.
    pub fn is_broken(edge: &RefEdge, tree: &Tree) -> bool {
        match &edge.target {
            Some(target) => get_at_path(tree, target).is_none(),
            None => false,
        }
    }

    /// Paths of `$ref` keywords that lie on a reference cycle.
    ///
    /// A reference from inside target `A` to target `B` is an edge `A -> B`;
    /// a `$ref` is cyclic when its target can reach a target enclosing it.
    pub fn cyclic_refs(&self) -> BTreeSet<String> {
        let targets: BTreeSet<&str> = self
            .edges
            .iter()
            .filter_map(|e| e.target.as_deref())
            .collect();

        let mut out: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for &target in &targets {
            let next = out.entry(target).or_default();
            for edge in &self.edges {
                let inside = edge.holder == target || is_ancestor(target, &edge.holder);
                if let (true, Some(to)) = (inside, edge.target.as_deref()) {
                    next.insert(to);
                }
            }
        }

        let mut cyclic = BTreeSet::new();
        for edge in &self.edges {
            let Some(start) = edge.target.as_deref() else {
                continue;
            };
            let reachable = reachable_from(start, &out);
            let closes = reachable.iter().any(|&t| {
                edge.holder == t || is_ancestor(t, &edge.holder)
            });
            if closes {
                cyclic.insert(edge.path.clone());
            }
        }
        cyclic
    }
}

fn reachable_from<'a>(start: &'a str, out: &BTreeMap<&'a str, BTreeSet<&'a str>>) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        if let Some(next) = out.get(node) {
            stack.extend(next.iter().copied());
        }
    }
    seen
}

/// Convert a local JSON pointer (`#/a/b/0`) into a tree path.
///
/// Numeric tokens become indices only where the tree holds an array at that
/// point. Returns `None` for remote references and plain-name anchors.
pub fn pointer_to_path(reference: &str, tree: &Tree) -> Option<String> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(String::new());
    }
    let pointer = pointer.strip_prefix('/')?;
    let mut path = String::new();
    let mut current = Some(tree);
    for raw in pointer.split('/') {
        let token = raw.replace("~1", "/").replace("~0", "~");
        match (current, token.parse::<usize>()) {
            (Some(Value::Array(items)), Ok(index)) => {
                path = join_index(&path, index);
                current = items.get(index);
            }
            (Some(Value::Object(map)), _) => {
                current = map.get(&token);
                path = join_key(&path, &token);
            }
            _ => {
                current = None;
                path = join_key(&path, &token);
            }
        }
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pointers_become_paths() {
        let tree = json!({"$defs": {"a/b": {}}, "list": [{"x": 1}]});
        assert_eq!(pointer_to_path("#/$defs/a~1b", &tree).as_deref(), Some("/$defs/a~1b"));
        assert_eq!(pointer_to_path("#/list/0/x", &tree).as_deref(), Some("/list[0]/x"));
        assert_eq!(pointer_to_path("#", &tree).as_deref(), Some(""));
        assert_eq!(pointer_to_path("other.json#/a", &tree), None);
        assert_eq!(pointer_to_path("#anchor", &tree), None);
    }

    #[test]
    fn graph_collects_edges() {
        let tree = json!({
            "properties": {"a": {"$ref": "#/$defs/A"}, "b": {"$ref": "#/$defs/Missing"}},
            "$defs": {"A": {"type": "string"}}
        });
        let graph = RefGraph::build(&tree);
        assert_eq!(graph.len(), 2);
        let a = graph.get("/properties/a/$ref").unwrap();
        assert_eq!(a.holder, "/properties/a");
        assert_eq!(a.target.as_deref(), Some("/$defs/A"));
        assert!(!RefGraph::is_broken(a, &tree));
        let b = graph.get("/properties/b/$ref").unwrap();
        assert!(RefGraph::is_broken(b, &tree));
    }

    #[test]
    fn property_named_ref_is_not_an_edge() {
        let tree = json!({"properties": {"$ref": {"type": "string"}}});
        assert!(RefGraph::build(&tree).is_empty());
    }

    #[test]
    fn detects_cycles() {
        let tree = json!({
            "$defs": {
                "Node": {"properties": {"next": {"$ref": "#/$defs/Node"}}},
                "A": {"properties": {"b": {"$ref": "#/$defs/B"}}},
                "B": {"properties": {"a": {"$ref": "#/$defs/A"}}},
                "Leaf": {"properties": {"n": {"$ref": "#/$defs/Node"}}}
            }
        });
        let cyclic = RefGraph::build(&tree).cyclic_refs();
        assert!(cyclic.contains("/$defs/Node/properties/next/$ref"));
        assert!(cyclic.contains("/$defs/A/properties/b/$ref"));
        assert!(cyclic.contains("/$defs/B/properties/a/$ref"));
        assert!(!cyclic.contains("/$defs/Leaf/properties/n/$ref"));
    }
}
