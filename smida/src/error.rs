//! Build failures.
//!
//! Every error aborts the whole build (no partial output); wherever a stage
//! knows which glyph or source field it was working on, the error says so.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A required piece of source metadata is absent.
    #[error("missing required source field '{0}'")]
    MissingField(&'static str),

    /// A component points at a glyph that is not in the glyph table.
    #[error("glyph '{referenced_by}' references unknown glyph '{target}'")]
    UnknownGlyph {
        target: String,
        referenced_by: String,
    },

    /// Component references form a loop.
    #[error("component cycle detected at glyph '{0}'")]
    ComponentCycle(String),

    #[error("glyph '{glyph}': malformed anchor name '{anchor}'")]
    BadAnchorName { glyph: String, anchor: String },

    /// A derived glyph class names a target that neither exists nor can be
    /// synthesized from its base glyph.
    #[error("class '{class}': substitution target '{target}' does not resolve to a glyph")]
    UnresolvedClassTarget { class: String, target: String },

    #[error("class '{class}': bad pattern: {source}")]
    BadClassPattern {
        class: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown build token '$[{0}]'")]
    UnknownToken(String),

    /// No category for an exported glyph, neither explicit nor from the
    /// built-in glyph data.
    #[error("glyph '{0}' has no category and none could be looked up")]
    Unclassified(String),

    /// The boolean overlap pass could not resolve the outline.
    #[error("glyph '{glyph}': {detail}")]
    Geometry { glyph: String, detail: String },

    /// A contour violates drawing rules (e.g. an open path starting with an
    /// off-curve point).
    #[error("glyph '{glyph}': malformed outline: {detail}")]
    MalformedOutline { glyph: String, detail: String },

    #[error("cannot map codepoint U+{0:04X}: not a Unicode scalar value")]
    BadCodepoint(u32),

    #[error("two glyphs map the same codepoint: {0}")]
    CmapConflict(String),

    #[error("feature compilation failed: {0}")]
    Feature(String),

    #[error("malformed version string '{0}'")]
    BadVersion(String),

    #[error("failed to compile '{tag}' table: {detail}")]
    Table { tag: &'static str, detail: String },

    #[error("not a parseable font file: {0}")]
    ReadFont(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
