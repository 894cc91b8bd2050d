//! Parallel pre-order walk over two trees.
//!
//! Every path present on either side is visited once. Object children come
//! in base order, followed by incoming-only keys in incoming order; array
//! children by index up to the longer length.

use schemix_types::{join_index, join_key, Segment, Tree};
use serde_json::Value;

use crate::keywords;

/// What kind of parent a node sits in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    /// The node is the root.
    Root,
    /// The parent is a schema object; the node's key is a keyword.
    Keywords,
    /// The parent is a name map; the node's key is a user-chosen name.
    Names,
    /// The parent is an array.
    Array,
}

/// Returned by a visitor to control descent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    Descend,
    Skip,
}

/// One visited path.
#[derive(Clone, Debug)]
pub struct WalkNode<'t> {
    pub path: String,
    pub segment: Option<Segment>,
    pub container: Container,
    pub base: Option<&'t Tree>,
    pub incoming: Option<&'t Tree>,
    /// `true` when the parent exists on both sides (always at the root).
    pub shared_parent: bool,
}

impl<'t> WalkNode<'t> {
    fn root(base: &'t Tree, incoming: &'t Tree) -> Self {
        Self {
            path: String::new(),
            segment: None,
            container: Container::Root,
            base: Some(base),
            incoming: Some(incoming),
            shared_parent: true,
        }
    }

    /// The key of this node if it sits in keyword context.
    pub fn keyword(&self) -> Option<&str> {
        match (&self.container, &self.segment) {
            (Container::Keywords, Some(Segment::Key(key))) => Some(key),
            _ => None,
        }
    }

    /// The user-chosen name of this node if its parent is a name map.
    pub fn name(&self) -> Option<&str> {
        match (&self.container, &self.segment) {
            (Container::Names, Some(Segment::Key(key))) => Some(key),
            _ => None,
        }
    }

    /// The array index of this node, if any.
    pub fn index(&self) -> Option<usize> {
        self.segment.as_ref().and_then(Segment::as_index)
    }

    pub fn differs(&self) -> bool {
        self.base != self.incoming
    }

    pub fn present_on_both(&self) -> bool {
        self.base.is_some() && self.incoming.is_some()
    }

    /// A keyword that exists under a shared parent and differs between the
    /// sides. This is the shape every keyword-level phase looks for.
    pub fn changed_keyword(&self) -> Option<&str> {
        if self.shared_parent && self.differs() {
            self.keyword()
        } else {
            None
        }
    }

    /// Array elements that are not objects on both sides. Their changes are
    /// reported by the enclosing array, never by element-level phases.
    pub fn is_covered_element(&self) -> bool {
        self.index().is_some()
            && !(self.base.is_some_and(Value::is_object) && self.incoming.is_some_and(Value::is_object))
    }
}

/// Walk `base` and `incoming` in parallel, calling `visit` on every node.
pub fn walk_pair<'t, F>(base: &'t Tree, incoming: &'t Tree, visit: &mut F)
where
    F: FnMut(&WalkNode<'t>) -> Visit,
{
    walk_node(WalkNode::root(base, incoming), visit);
}

fn walk_node<'t, F>(node: WalkNode<'t>, visit: &mut F)
where
    F: FnMut(&WalkNode<'t>) -> Visit,
{
    if visit(&node) == Visit::Skip {
        return;
    }

    let child_container = match node.keyword() {
        Some(key) if keywords::is_name_map(key) => Container::Names,
        _ => Container::Keywords,
    };

    let base_map = node.base.and_then(Value::as_object);
    let incoming_map = node.incoming.and_then(Value::as_object);
    if base_map.is_some() || incoming_map.is_some() {
        let shared = base_map.is_some() && incoming_map.is_some();
        let base_keys = base_map.into_iter().flat_map(|m| m.keys());
        let incoming_only = incoming_map
            .into_iter()
            .flat_map(|m| m.keys())
            .filter(|k| !base_map.is_some_and(|m| m.contains_key(*k)));
        let keys: Vec<&String> = base_keys.chain(incoming_only).collect();
        for key in keys {
            walk_node(
                WalkNode {
                    path: join_key(&node.path, key),
                    segment: Some(Segment::Key(key.clone())),
                    container: child_container,
                    base: base_map.and_then(|m| m.get(key)),
                    incoming: incoming_map.and_then(|m| m.get(key)),
                    shared_parent: shared,
                },
                visit,
            );
        }
    }

    let base_items = node.base.and_then(Value::as_array);
    let incoming_items = node.incoming.and_then(Value::as_array);
    if base_items.is_some() || incoming_items.is_some() {
        let shared = base_items.is_some() && incoming_items.is_some();
        let len = base_items
            .map_or(0, Vec::len)
            .max(incoming_items.map_or(0, Vec::len));
        for index in 0..len {
            walk_node(
                WalkNode {
                    path: join_index(&node.path, index),
                    segment: Some(Segment::Index(index)),
                    container: Container::Array,
                    base: base_items.and_then(|items| items.get(index)),
                    incoming: incoming_items.and_then(|items| items.get(index)),
                    shared_parent: shared,
                },
                visit,
            );
        }
    }
}
