//! Fallback glyph classification.
//!
//! A compact stand-in for the design tool's glyph-info database: categories
//! for the names this pipeline has to classify when a glyph carries no
//! explicit override. The lookup is the ordered two-step the rest of the
//! crate relies on: explicit per-glyph category first, name lookup second,
//! and a [`Classification::NotFound`] result is the caller's cue to fail the
//! build.

use crate::source::{Category, Glyph, SubCategory};

/// Result of the two-step category lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// The glyph carries its own category.
    Explicit(Category, Option<SubCategory>),
    /// Category found by name in the built-in table.
    Fallback(Category, Option<SubCategory>),
    NotFound,
}

impl Classification {
    pub fn category(self) -> Option<(Category, Option<SubCategory>)> {
        match self {
            Classification::Explicit(c, s) | Classification::Fallback(c, s) => Some((c, s)),
            Classification::NotFound => None,
        }
    }
}

pub fn classify(glyph: &Glyph) -> Classification {
    if let Some(category) = glyph.category {
        return Classification::Explicit(category, glyph.sub_category);
    }
    match lookup(&glyph.name) {
        Some((category, sub)) => Classification::Fallback(category, sub),
        None => Classification::NotFound,
    }
}

/// Name-based category lookup. Suffixed variants (`beh-ar.init`) classify as
/// their base name; `_`-joined names classify as ligatures of their parts.
pub fn lookup(name: &str) -> Option<(Category, Option<SubCategory>)> {
    if name == ".notdef" {
        return Some((Category::Other, None));
    }
    let base = name.split('.').next().filter(|b| !b.is_empty())?;

    if let Some(hit) = table_lookup(base) {
        return Some(hit);
    }

    // Ligatures join their component names with underscores.
    if base.contains('_')
        && base
            .split('_')
            .all(|p| matches!(table_lookup(p), Some((Category::Letter, _))))
    {
        return Some((Category::Letter, Some(SubCategory::Ligature)));
    }

    // Single basic-Latin letters have no table entry of their own.
    let mut chars = base.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some((Category::Letter, None));
        }
    }

    if base.ends_with("comb") {
        return Some((Category::Mark, Some(SubCategory::Nonspacing)));
    }
    None
}

fn table_lookup(name: &str) -> Option<(Category, Option<SubCategory>)> {
    GLYPH_DATA
        .binary_search_by_key(&name, |entry| entry.0)
        .ok()
        .map(|ix| {
            let (_, category, sub) = GLYPH_DATA[ix];
            (category, sub)
        })
}

use Category::*;
use SubCategory::*;

/// Sorted by name.
#[rustfmt::skip]
static GLYPH_DATA: &[(&str, Category, Option<SubCategory>)] = &[
    ("ain-ar", Letter, None),
    ("alef-ar", Letter, None),
    ("alefHamzaabove-ar", Letter, None),
    ("alefHamzabelow-ar", Letter, None),
    ("alefMadda-ar", Letter, None),
    ("alefMaksura-ar", Letter, None),
    ("alefWasla-ar", Letter, None),
    ("beh-ar", Letter, None),
    ("comma", Punctuation, None),
    ("comma-ar", Punctuation, None),
    ("dad-ar", Letter, None),
    ("dal-ar", Letter, None),
    ("damma-ar", Mark, Some(Nonspacing)),
    ("dammatan-ar", Mark, Some(Nonspacing)),
    ("eight", Number, None),
    ("eight-ar", Number, None),
    ("emdash", Punctuation, None),
    ("endash", Punctuation, None),
    ("fatha-ar", Mark, Some(Nonspacing)),
    ("fathatan-ar", Mark, Some(Nonspacing)),
    ("feh-ar", Letter, None),
    ("five", Number, None),
    ("five-ar", Number, None),
    ("four", Number, None),
    ("four-ar", Number, None),
    ("ghain-ar", Letter, None),
    ("guillemetleft", Punctuation, None),
    ("guillemetright", Punctuation, None),
    ("hah-ar", Letter, None),
    ("hamza-ar", Letter, None),
    ("hamzaabove-ar", Mark, Some(Nonspacing)),
    ("hamzabelow-ar", Mark, Some(Nonspacing)),
    ("heh-ar", Letter, None),
    ("hyphen", Punctuation, None),
    ("jeem-ar", Letter, None),
    ("kaf-ar", Letter, None),
    ("kasra-ar", Mark, Some(Nonspacing)),
    ("kasratan-ar", Mark, Some(Nonspacing)),
    ("khah-ar", Letter, None),
    ("lam-ar", Letter, None),
    ("maddaAbove-ar", Mark, Some(Nonspacing)),
    ("meem-ar", Letter, None),
    ("nine", Number, None),
    ("nine-ar", Number, None),
    ("noon-ar", Letter, None),
    ("one", Number, None),
    ("one-ar", Number, None),
    ("parenleft", Punctuation, None),
    ("parenright", Punctuation, None),
    ("period", Punctuation, None),
    ("period-ar", Punctuation, None),
    ("qaf-ar", Letter, None),
    ("question", Punctuation, None),
    ("question-ar", Punctuation, None),
    ("reh-ar", Letter, None),
    ("sad-ar", Letter, None),
    ("seen-ar", Letter, None),
    ("semicolon-ar", Punctuation, None),
    ("seven", Number, None),
    ("seven-ar", Number, None),
    ("shadda-ar", Mark, Some(Nonspacing)),
    ("sheen-ar", Letter, None),
    ("six", Number, None),
    ("six-ar", Number, None),
    ("space", Separator, Some(Space)),
    ("sukun-ar", Mark, Some(Nonspacing)),
    ("tah-ar", Letter, None),
    ("teh-ar", Letter, None),
    ("tehMarbuta-ar", Letter, None),
    ("thal-ar", Letter, None),
    ("theh-ar", Letter, None),
    ("three", Number, None),
    ("three-ar", Number, None),
    ("two", Number, None),
    ("two-ar", Number, None),
    ("wasla-ar", Mark, Some(Nonspacing)),
    ("waw-ar", Letter, None),
    ("wawHamzaabove-ar", Letter, None),
    ("yeh-ar", Letter, None),
    ("yehHamzaabove-ar", Letter, None),
    ("zah-ar", Letter, None),
    ("zain-ar", Letter, None),
    ("zero", Number, None),
    ("zero-ar", Number, None),
];
