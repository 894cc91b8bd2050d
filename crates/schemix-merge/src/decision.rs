use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use schemix_types::{Conflict, ConflictSignature, Resolution, Tree};

/// A recorded decision, detached from the conflict it was made on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub resolution: Resolution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_value: Option<Tree>,
}

impl Decision {
    /// The decision on `conflict`, or `None` if it is unresolved.
    pub fn of(conflict: &Conflict) -> Option<Self> {
        conflict.is_resolved().then(|| Self {
            resolution: conflict.resolution,
            custom_value: conflict.custom_value.clone(),
        })
    }
}

/// Saved decisions keyed by conflict signature.
pub type DecisionMap = BTreeMap<ConflictSignature, Decision>;

/// Collect the decisions of every resolved conflict.
pub fn collect<'a>(conflicts: impl IntoIterator<Item = &'a Conflict>) -> DecisionMap {
    conflicts
        .into_iter()
        .filter_map(|c| Decision::of(c).map(|d| (c.signature(), d)))
        .collect()
}

/// Restore saved decisions onto unresolved conflicts with a matching
/// signature. Returns the number restored.
pub fn restore(conflicts: &mut [Conflict], decisions: &DecisionMap) -> usize {
    let mut restored = 0;
    for conflict in conflicts.iter_mut().filter(|c| !c.is_resolved()) {
        if let Some(d) = decisions.get(&conflict.signature()) {
            conflict.resolve(d.resolution, d.custom_value.clone());
            restored += 1;
        }
    }
    restored
}
