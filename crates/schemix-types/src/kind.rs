//! The closed conflict taxonomy.
//!
//! Every conflict the detector can emit is one [`ConflictKind`]. Severity,
//! family, and wire name are declared next to each variant in a single
//! table, so adding a variant without classifying it does not compile.
//! The manual-review and valid-resolution tables are exhaustive matches
//! over the same enum.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conflict::{Resolution, Severity};

/// Grouping of conflict kinds, roughly one per detection phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFamily {
    Meta,
    Reference,
    Definition,
    Composition,
    ObjectShape,
    PropertySet,
    ArrayTopology,
    TypeSystem,
    Constraint,
    Required,
    Annotation,
    Content,
    /// Retained only so stored data from older releases still deserializes.
    Legacy,
}

impl fmt::Display for KindFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Meta => "meta",
            Self::Reference => "reference",
            Self::Definition => "definition",
            Self::Composition => "composition",
            Self::ObjectShape => "object shape",
            Self::PropertySet => "property set",
            Self::ArrayTopology => "array topology",
            Self::TypeSystem => "type system",
            Self::Constraint => "constraint",
            Self::Required => "required",
            Self::Annotation => "annotation",
            Self::Content => "content",
            Self::Legacy => "legacy",
        };
        write!(f, "{label}")
    }
}

macro_rules! conflict_kinds {
    ($( $variant:ident => $name:literal, $family:ident, $severity:ident; )*) => {
        /// A classified disagreement between two trees.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum ConflictKind {
            $( #[serde(rename = $name)] $variant, )*
        }

        impl ConflictKind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [ConflictKind] = &[$( ConflictKind::$variant, )*];

            /// The stable wire name (snake_case).
            pub fn as_str(&self) -> &'static str {
                match self { $( Self::$variant => $name, )* }
            }

            /// The family this kind belongs to.
            pub fn family(&self) -> KindFamily {
                match self { $( Self::$variant => KindFamily::$family, )* }
            }

            /// Fixed severity for this kind.
            pub fn severity(&self) -> Severity {
                match self { $( Self::$variant => Severity::$severity, )* }
            }
        }
    };
}

conflict_kinds! {
    // meta / identity
    SchemaDialectChanged => "schema_dialect_changed", Meta, High;
    SchemaIdChanged => "schema_id_changed", Meta, High;
    AnchorChanged => "anchor_changed", Meta, Medium;
    OpenapiVersionChanged => "openapi_version_changed", Meta, High;
    IncompatibleSchema => "incompatible_schema", Meta, Critical;

    // references
    RefAdded => "ref_added", Reference, Medium;
    RefRemoved => "ref_removed", Reference, Medium;
    RefTargetChanged => "ref_target_changed", Reference, High;
    RefReplacedInline => "ref_replaced_inline", Reference, Medium;
    RefBroken => "ref_broken", Reference, Critical;
    RefCycleIntroduced => "ref_cycle_introduced", Reference, High;
    DynamicRefChanged => "dynamic_ref_changed", Reference, Medium;

    // $defs / definitions identity
    DefinitionAdded => "definition_added", Definition, Low;
    DefinitionRemoved => "definition_removed", Definition, High;
    DefinitionRenamed => "definition_renamed", Definition, Medium;
    DefinitionMoved => "definition_moved", Definition, Medium;

    // composition
    AllOfAdded => "all_of_added", Composition, Medium;
    AllOfRemoved => "all_of_removed", Composition, High;
    AllOfMemberAdded => "all_of_member_added", Composition, Medium;
    AllOfMemberRemoved => "all_of_member_removed", Composition, High;
    AnyOfAdded => "any_of_added", Composition, Medium;
    AnyOfRemoved => "any_of_removed", Composition, High;
    AnyOfMemberAdded => "any_of_member_added", Composition, Low;
    AnyOfMemberRemoved => "any_of_member_removed", Composition, High;
    OneOfAdded => "one_of_added", Composition, Medium;
    OneOfRemoved => "one_of_removed", Composition, High;
    OneOfMemberAdded => "one_of_member_added", Composition, Medium;
    OneOfMemberRemoved => "one_of_member_removed", Composition, High;
    CompositionKeywordChanged => "composition_keyword_changed", Composition, High;
    NotAdded => "not_added", Composition, High;
    NotRemoved => "not_removed", Composition, Medium;
    NotChanged => "not_changed", Composition, High;
    ConditionalAdded => "conditional_added", Composition, Medium;
    ConditionalRemoved => "conditional_removed", Composition, Medium;
    ConditionalChanged => "conditional_changed", Composition, High;
    DiscriminatorChanged => "discriminator_changed", Composition, High;

    // object-shape governance
    AdditionalPropertiesRestricted => "additional_properties_restricted", ObjectShape, High;
    AdditionalPropertiesRelaxed => "additional_properties_relaxed", ObjectShape, Low;
    AdditionalPropertiesChanged => "additional_properties_changed", ObjectShape, Medium;
    PatternPropertiesAdded => "pattern_properties_added", ObjectShape, Medium;
    PatternPropertiesRemoved => "pattern_properties_removed", ObjectShape, Medium;
    PatternPropertiesChanged => "pattern_properties_changed", ObjectShape, Medium;
    PropertyNamesChanged => "property_names_changed", ObjectShape, Medium;
    DependentSchemasChanged => "dependent_schemas_changed", ObjectShape, Medium;
    DependentRequiredChanged => "dependent_required_changed", ObjectShape, Medium;
    UnevaluatedPropertiesChanged => "unevaluated_properties_changed", ObjectShape, Medium;
    MinPropertiesChanged => "min_properties_changed", ObjectShape, Medium;
    MaxPropertiesChanged => "max_properties_changed", ObjectShape, Medium;

    // property-set topology
    PropertyAdded => "property_added", PropertySet, Low;
    PropertyRemovedRequired => "property_removed_required", PropertySet, Critical;
    PropertyRemovedOptional => "property_removed_optional", PropertySet, Medium;
    PropertyRenamed => "property_renamed", PropertySet, High;
    PropertyMoved => "property_moved", PropertySet, Medium;
    PropertyDuplicate => "property_duplicate", PropertySet, Medium;

    // array topology
    ItemsAdded => "items_added", ArrayTopology, Medium;
    ItemsRemoved => "items_removed", ArrayTopology, Medium;
    ItemsChanged => "items_changed", ArrayTopology, High;
    PrefixItemsChanged => "prefix_items_changed", ArrayTopology, High;
    ContainsChanged => "contains_changed", ArrayTopology, Medium;
    UniqueItemsChanged => "unique_items_changed", ArrayTopology, Medium;
    MinItemsChanged => "min_items_changed", ArrayTopology, Medium;
    MaxItemsChanged => "max_items_changed", ArrayTopology, Medium;
    ContainsBoundsChanged => "contains_bounds_changed", ArrayTopology, Medium;
    ArrayLengthMismatch => "array_length_mismatch", ArrayTopology, Low;
    ArrayReordered => "array_reordered", ArrayTopology, Info;
    ArrayItemsChanged => "array_items_changed", ArrayTopology, Medium;
    ArrayItemAdded => "array_item_added", ArrayTopology, Low;
    ArrayItemRemoved => "array_item_removed", ArrayTopology, Medium;
    ArrayItemChanged => "array_item_changed", ArrayTopology, Medium;

    // type system
    TypeChanged => "type_changed", TypeSystem, Critical;
    TypeExpanded => "type_expanded", TypeSystem, High;
    TypeCollapsed => "type_collapsed", TypeSystem, High;
    TypeStructureChanged => "type_structure_changed", TypeSystem, Critical;
    NullableAdded => "nullable_added", TypeSystem, Medium;
    NullableRemoved => "nullable_removed", TypeSystem, High;
    TypeAdded => "type_added", TypeSystem, Medium;
    TypeRemoved => "type_removed", TypeSystem, Medium;

    // constraint keywords
    MinimumChanged => "minimum_changed", Constraint, Medium;
    MaximumChanged => "maximum_changed", Constraint, Medium;
    ExclusiveMinimumChanged => "exclusive_minimum_changed", Constraint, Medium;
    ExclusiveMaximumChanged => "exclusive_maximum_changed", Constraint, Medium;
    MultipleOfChanged => "multiple_of_changed", Constraint, Medium;
    MinLengthChanged => "min_length_changed", Constraint, Medium;
    MaxLengthChanged => "max_length_changed", Constraint, Medium;
    PatternChanged => "pattern_changed", Constraint, Medium;
    FormatChanged => "format_changed", Constraint, Medium;
    EnumValuesAdded => "enum_values_added", Constraint, Low;
    EnumValuesRemoved => "enum_values_removed", Constraint, High;
    EnumChanged => "enum_changed", Constraint, High;
    ConstChanged => "const_changed", Constraint, High;
    ConstraintAdded => "constraint_added", Constraint, Low;
    ConstraintRemoved => "constraint_removed", Constraint, High;

    // required / cross-field
    RequiredAdded => "required_added", Required, High;
    RequiredRemoved => "required_removed", Required, Medium;

    // annotations
    TitleChanged => "title_changed", Annotation, Info;
    DescriptionChanged => "description_changed", Annotation, Info;
    ExampleChanged => "example_changed", Annotation, Info;
    DefaultChanged => "default_changed", Annotation, Info;
    DeprecatedChanged => "deprecated_changed", Annotation, Info;
    ReadOnlyChanged => "read_only_changed", Annotation, Info;
    WriteOnlyChanged => "write_only_changed", Annotation, Info;
    CommentChanged => "comment_changed", Annotation, Info;
    ContentAnnotationChanged => "content_annotation_changed", Annotation, Info;
    ExtensionChanged => "extension_changed", Annotation, Info;

    // generic content outside schema keywords
    ValueAdded => "value_added", Content, Low;
    ValueRemoved => "value_removed", Content, Medium;
    ValueChanged => "value_changed", Content, Medium;

    // legacy aliases
    TypeMismatch => "type_mismatch", Legacy, High;
    PropertyConflict => "property_conflict", Legacy, Medium;
    EnumMismatch => "enum_mismatch", Legacy, Medium;
    ConstraintConflict => "constraint_conflict", Legacy, Medium;
    StructureMismatch => "structure_mismatch", Legacy, High;
}

const DECIDED: &[Resolution] = &[
    Resolution::Current,
    Resolution::Incoming,
    Resolution::Combine,
    Resolution::Interpolate,
    Resolution::Extrapolate,
    Resolution::Custom,
];

const SCALAR: &[Resolution] = &[Resolution::Current, Resolution::Incoming, Resolution::Custom];

impl ConflictKind {
    /// Whether a human must look at this conflict before the merge is
    /// trusted. Always `true` at severity `high` and above.
    pub fn requires_manual_review(&self) -> bool {
        if self.severity() >= Severity::High {
            return true;
        }
        matches!(
            self,
            Self::RefAdded
                | Self::RefRemoved
                | Self::RefReplacedInline
                | Self::DefinitionRenamed
                | Self::DefinitionMoved
                | Self::PropertyMoved
                | Self::PropertyDuplicate
                | Self::PropertyConflict
                | Self::ConstraintConflict
        )
    }

    /// Whether the conflict may be settled without review. Always `true` at
    /// severity `low` and below.
    pub fn auto_resolvable(&self) -> bool {
        self.severity() <= Severity::Low
    }

    /// The resolutions a caller may choose for this kind.
    ///
    /// Collection-valued kinds accept every algebra; scalar-valued kinds
    /// accept only a side or a custom value.
    pub fn valid_resolutions(&self) -> &'static [Resolution] {
        match self.family() {
            KindFamily::Meta => match self {
                Self::IncompatibleSchema => &[],
                _ => SCALAR,
            },
            KindFamily::Reference | KindFamily::Annotation => SCALAR,
            KindFamily::TypeSystem => match self {
                Self::TypeExpanded
                | Self::TypeCollapsed
                | Self::NullableAdded
                | Self::NullableRemoved => DECIDED,
                _ => SCALAR,
            },
            KindFamily::Constraint => match self {
                Self::EnumValuesAdded | Self::EnumValuesRemoved | Self::EnumChanged => DECIDED,
                _ => SCALAR,
            },
            KindFamily::Definition
            | KindFamily::Composition
            | KindFamily::ObjectShape
            | KindFamily::PropertySet
            | KindFamily::ArrayTopology
            | KindFamily::Required
            | KindFamily::Content
            | KindFamily::Legacy => DECIDED,
        }
    }

    /// Returns `true` if `resolution` is allowed for this kind. `Unresolved`
    /// is always allowed.
    pub fn accepts(&self, resolution: Resolution) -> bool {
        resolution == Resolution::Unresolved || self.valid_resolutions().contains(&resolution)
    }

    /// Returns `true` for the aliases kept for stored data.
    pub fn is_legacy(&self) -> bool {
        self.family() == KindFamily::Legacy
    }

    /// The modern kind a legacy alias maps to; other kinds map to themselves.
    pub fn canonical(&self) -> Self {
        match self {
            Self::TypeMismatch => Self::TypeChanged,
            Self::PropertyConflict => Self::ValueChanged,
            Self::EnumMismatch => Self::EnumChanged,
            Self::ConstraintConflict => Self::ValueChanged,
            Self::StructureMismatch => Self::TypeStructureChanged,
            other => *other,
        }
    }

    /// Returns `true` for the per-index kinds produced by array enhancement.
    pub fn is_array_item(&self) -> bool {
        matches!(
            self,
            Self::ArrayItemAdded | Self::ArrayItemRemoved | Self::ArrayItemChanged
        )
    }

    /// Returns `true` for kinds that report a schema or property found
    /// under a new path. The new path is linked from the conflict.
    pub fn is_relocation(&self) -> bool {
        matches!(
            self,
            Self::PropertyRenamed | Self::PropertyMoved | Self::DefinitionRenamed | Self::DefinitionMoved
        )
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
