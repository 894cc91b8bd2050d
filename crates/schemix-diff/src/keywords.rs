//! Keyword tables.
//!
//! A key is only treated as a keyword when it appears in keyword context,
//! i.e. directly inside a schema object. Keys of name maps such as
//! `properties` or `$defs` are user-chosen names and never match here.

/// Keys whose object value maps user-chosen names to sub-documents.
pub const NAME_MAPS: &[&str] = &[
    "properties",
    "patternProperties",
    "$defs",
    "definitions",
    "dependentSchemas",
    "dependentRequired",
    "schemas",
    "paths",
    "responses",
    "parameters",
    "headers",
    "securitySchemes",
    "requestBodies",
    "callbacks",
    "links",
    "webhooks",
    "content",
    "encoding",
    "variables",
    "mapping",
];

pub const META: &[&str] = &["$schema", "$id", "$anchor", "openapi", "swagger"];

pub const REFERENCES: &[&str] = &["$ref", "$dynamicRef", "$recursiveRef"];

pub const DEFINITIONS: &[&str] = &["$defs", "definitions"];

pub const COMPOSITION: &[&str] = &[
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "if",
    "then",
    "else",
    "discriminator",
];

pub const OBJECT_SHAPE: &[&str] = &[
    "additionalProperties",
    "patternProperties",
    "propertyNames",
    "dependentSchemas",
    "dependencies",
    "dependentRequired",
    "unevaluatedProperties",
    "minProperties",
    "maxProperties",
];

pub const ARRAY: &[&str] = &[
    "items",
    "prefixItems",
    "additionalItems",
    "unevaluatedItems",
    "contains",
    "uniqueItems",
    "minItems",
    "maxItems",
    "minContains",
    "maxContains",
];

pub const TYPE: &[&str] = &["type", "nullable"];

/// Keywords that only make sense for particular types. A type conflict
/// claims these siblings.
pub const CONSTRAINTS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "format",
    "enum",
    "const",
];

pub const ANNOTATIONS: &[&str] = &[
    "title",
    "description",
    "summary",
    "example",
    "examples",
    "default",
    "deprecated",
    "readOnly",
    "writeOnly",
    "$comment",
    "contentEncoding",
    "contentMediaType",
    "contentSchema",
];

/// Composition keywords holding a list of member schemas.
pub const COMBINATORS: &[&str] = &["allOf", "anyOf", "oneOf"];

/// Returns `true` for vendor extensions (`x-...`).
pub fn is_extension(key: &str) -> bool {
    key.starts_with("x-")
}

pub fn is_annotation(key: &str) -> bool {
    ANNOTATIONS.contains(&key) || is_extension(key)
}

/// Returns `true` if `key` names a schema object whose children are names.
pub fn is_name_map(key: &str) -> bool {
    NAME_MAPS.contains(&key)
}

/// Returns `true` for any keyword some detection phase owns.
pub fn is_schema_keyword(key: &str) -> bool {
    [
        META,
        REFERENCES,
        DEFINITIONS,
        COMPOSITION,
        OBJECT_SHAPE,
        ARRAY,
        TYPE,
        CONSTRAINTS,
        ANNOTATIONS,
    ]
    .iter()
    .any(|table| table.contains(&key))
        || matches!(key, "properties" | "required")
        || is_extension(key)
}
