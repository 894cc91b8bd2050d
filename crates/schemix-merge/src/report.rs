//! Exportable conflict reports and decision import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use schemix_types::{
    Conflict, ConflictKind, ConflictSignature, Document, MergeResult, Resolution, Severity, Tree,
};

use crate::decision::{Decision, DecisionMap};
use crate::error::{EngineResult, MergeError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub export_date: DateTime<Utc>,
    pub document_count: usize,
    pub documents: Vec<String>,
    pub total_conflicts: usize,
    pub resolved_conflicts: usize,
    pub unresolved_conflicts: usize,
}

/// A conflict as written to a report, without link bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedConflict {
    pub path: String,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub description: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "schemix_types::present"
    )]
    pub current_value: Option<Tree>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "schemix_types::present"
    )]
    pub incoming_value: Option<Tree>,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "schemix_types::present"
    )]
    pub custom_value: Option<Tree>,
    pub step_number: usize,
}

impl From<&Conflict> for ReportedConflict {
    fn from(c: &Conflict) -> Self {
        Self {
            path: c.path.clone(),
            kind: c.kind,
            severity: c.severity,
            description: c.description.clone(),
            current_value: c.current_value.clone(),
            incoming_value: c.incoming_value.clone(),
            resolution: c.resolution,
            custom_value: c.custom_value.clone(),
            step_number: c.step_number,
        }
    }
}

/// A serializable snapshot of a merge's conflicts and decisions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub metadata: ReportMetadata,
    pub conflicts: Vec<ReportedConflict>,
    pub path_order: Vec<String>,
}

impl ConflictReport {
    pub fn from_result(result: &MergeResult, documents: &[Document]) -> Self {
        Self::at(result, documents, Utc::now())
    }

    /// Build a report with a fixed export date.
    pub fn at(result: &MergeResult, documents: &[Document], export_date: DateTime<Utc>) -> Self {
        let resolved = result.conflicts.iter().filter(|c| c.is_resolved()).count();
        Self {
            metadata: ReportMetadata {
                export_date,
                document_count: documents.len(),
                documents: documents.iter().map(|d| d.name.clone()).collect(),
                total_conflicts: result.conflicts.len(),
                resolved_conflicts: resolved,
                unresolved_conflicts: result.conflicts.len() - resolved,
            },
            conflicts: result.conflicts.iter().map(ReportedConflict::from).collect(),
            path_order: result.path_order(),
        }
    }

    /// The decisions in this report, keyed by conflict signature.
    pub fn decisions(&self) -> DecisionMap {
        self.conflicts
            .iter()
            .filter(|c| c.resolution.is_decided())
            .map(|c| {
                let signature = ConflictSignature {
                    step_number: c.step_number,
                    path: c.path.clone(),
                    kind: c.kind,
                    description: c.description.clone(),
                };
                let decision = Decision {
                    resolution: c.resolution,
                    custom_value: c.custom_value.clone(),
                };
                (signature, decision)
            })
            .collect()
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MergeError::Serialization(e.to_string()))
    }

    pub fn from_json(text: &str) -> EngineResult<Self> {
        serde_json::from_str(text).map_err(|e| MergeError::Serialization(e.to_string()))
    }
}
