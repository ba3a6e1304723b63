//! Compile a glyph design source into OpenType font binaries.
//!
//! The pipeline takes a typed design-source document (glyph outlines,
//! component references, anchors, kerning, feature text) and produces a
//! conformant font: component decomposition, overlap removal, cubic to
//! quadratic conversion for TrueType targets, CharString encoding and
//! autohinting for PostScript targets, feature-text generation and
//! compilation, and binary table assembly.
//!
//! One build processes one source into one file, synchronously; any failure
//! aborts the whole build with an error naming the offending glyph or field.

pub mod anchors;
pub mod assemble;
pub mod cff;
pub mod charstring;
pub mod error;
pub mod features;
pub mod glyphdata;
pub mod hinting;
pub mod layout;
pub mod outline;
pub mod pathops;
pub mod pens;
pub mod quadratic;
pub mod source;
pub mod woff2;

pub use assemble::{build, compile, Flavor};
pub use error::BuildError;
