use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::document::Tree;
use crate::kind::ConflictKind;

/// Ordered severity: `info < low < medium < high < critical`.
///
/// Derived from [`ConflictKind::severity`], never assigned freely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{label}")
    }
}

/// How the final value of a conflicted path is produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// No decision yet. Every conflict starts here.
    #[default]
    Unresolved,
    /// Keep the accumulated (left) value.
    Current,
    /// Take the incoming (right) value.
    Incoming,
    /// Union of both sides.
    Combine,
    /// Intersection of both sides.
    Interpolate,
    /// Symmetric difference of both sides.
    Extrapolate,
    /// A caller-supplied literal.
    Custom,
}

impl Resolution {
    /// Returns `true` for anything but `Unresolved`.
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }

    /// Returns `true` if this resolution propagates along linked conflicts.
    pub fn cascades(&self) -> bool {
        matches!(self, Self::Current | Self::Incoming | Self::Combine)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unresolved => "unresolved",
            Self::Current => "current",
            Self::Incoming => "incoming",
            Self::Combine => "combine",
            Self::Interpolate => "interpolate",
            Self::Extrapolate => "extrapolate",
            Self::Custom => "custom",
        };
        write!(f, "{label}")
    }
}

/// Deserialize a field that is present on the wire, `null` included.
/// Pair with `default` so an absent field stays `None`.
pub fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Tree>, D::Error> {
    Tree::deserialize(deserializer).map(Some)
}

/// A classified disagreement between the accumulated tree and an incoming
/// document at one path.
///
/// A missing side is `None` and is left out on the wire, so an explicit
/// `null` value reads back as `Some(Value::Null)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub path: String,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub current_value: Option<Tree>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub incoming_value: Option<Tree>,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub custom_value: Option<Tree>,
    #[serde(default)]
    pub linked_conflict_paths: Vec<String>,
    pub step_number: usize,
    pub requires_manual_review: bool,
    pub auto_resolvable: bool,
}

impl Conflict {
    /// Create an unresolved conflict. Severity and review flags come from
    /// the kind's lookup tables.
    pub fn new(
        path: impl Into<String>,
        kind: ConflictKind,
        current_value: Option<Tree>,
        incoming_value: Option<Tree>,
        step_number: usize,
        description: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            severity: kind.severity(),
            description: description.into(),
            current_value,
            incoming_value,
            resolution: Resolution::Unresolved,
            custom_value: None,
            linked_conflict_paths: Vec::new(),
            step_number,
            requires_manual_review: kind.requires_manual_review(),
            auto_resolvable: kind.auto_resolvable(),
        }
    }

    /// The synthetic conflict reported when documents cannot be merged.
    pub fn incompatible(step_number: usize, reason: impl Into<String>) -> Self {
        Self::new(
            "",
            ConflictKind::IncompatibleSchema,
            None,
            None,
            step_number,
            reason,
        )
    }

    /// Returns `true` once a decision has been recorded.
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_decided()
    }

    /// Record a decision. `custom` is kept only for [`Resolution::Custom`].
    pub fn resolve(&mut self, resolution: Resolution, custom: Option<Tree>) {
        self.resolution = resolution;
        self.custom_value = match resolution {
            Resolution::Custom => custom,
            _ => None,
        };
    }

    /// The identity used to carry decisions across regeneration.
    pub fn signature(&self) -> ConflictSignature {
        ConflictSignature {
            step_number: self.step_number,
            path: self.path.clone(),
            kind: self.kind,
            description: self.description.clone(),
        }
    }
}

/// `(step, path, kind, description)`: the key under which a decision is
/// saved and restored. Positions are deliberately not part of it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictSignature {
    pub step_number: usize,
    pub path: String,
    pub kind: ConflictKind,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn new_conflict_is_unresolved_with_table_flags() {
        let c = Conflict::new(
            "/properties/email",
            ConflictKind::PropertyRemovedRequired,
            Some(json!({"type": "string"})),
            None,
            1,
            "required property 'email' was removed",
        );
        assert_eq!(c.resolution, Resolution::Unresolved);
        assert_eq!(c.severity, Severity::Critical);
        assert!(c.requires_manual_review);
        assert!(!c.auto_resolvable);
    }

    #[test]
    fn resolve_drops_custom_for_non_custom() {
        let mut c = Conflict::new("/a", ConflictKind::ValueChanged, None, None, 1, "x");
        c.resolve(Resolution::Custom, Some(json!(5)));
        assert_eq!(c.custom_value, Some(json!(5)));
        c.resolve(Resolution::Incoming, Some(json!(5)));
        assert_eq!(c.custom_value, None);
    }

    #[test]
    fn wire_format_is_camel_case() {
        let c = Conflict::new("/a", ConflictKind::TitleChanged, Some(json!("x")), None, 2, "d");
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["kind"], json!("title_changed"));
        assert_eq!(value["severity"], json!("info"));
        assert_eq!(value["resolution"], json!("unresolved"));
        assert_eq!(value["currentValue"], json!("x"));
        assert!(value.get("incomingValue").is_none());
        assert_eq!(value["stepNumber"], json!(2));
        assert!(value.get("customValue").is_none());

        let parsed: Conflict = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn null_value_is_not_a_missing_side() {
        let mut c = Conflict::new(
            "/default",
            ConflictKind::DefaultChanged,
            Some(json!(null)),
            Some(json!(0)),
            1,
            "d",
        );
        c.resolve(Resolution::Custom, Some(json!(null)));
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value.get("currentValue"), Some(&json!(null)));
        assert_eq!(value.get("customValue"), Some(&json!(null)));

        let parsed: Conflict = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.current_value, Some(json!(null)));
        assert_eq!(parsed.custom_value, Some(json!(null)));
        assert_eq!(parsed, c);
    }

    #[test]
    fn signature_ignores_resolution() {
        let a = Conflict::new("/a", ConflictKind::ValueChanged, None, None, 1, "d");
        let mut b = a.clone();
        b.resolve(Resolution::Current, None);
        assert_eq!(a.signature(), b.signature());
    }
}
