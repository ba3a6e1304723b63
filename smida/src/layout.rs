//! Compiling the generated feature text into binary layout tables.
//!
//! fea-rs compiles the feature file against the final glyph order; the
//! resulting GSUB/GPOS/GDEF tables cross back into our font at the byte
//! level, so nothing here depends on the compiler's internal table types.

use std::path::Path;

use fea_rs::{Compiler, GlyphMap, GlyphName};
use write_fonts::read::FontRef;
use write_fonts::types::Tag;

use crate::error::BuildError;

const LAYOUT_TABLES: [Tag; 3] = [Tag::new(b"GDEF"), Tag::new(b"GSUB"), Tag::new(b"GPOS")];

/// Compile a feature file and return the layout tables it produces.
pub fn compile(
    fea_path: &Path,
    glyph_order: &[String],
) -> Result<Vec<(Tag, Vec<u8>)>, BuildError> {
    let glyph_map: GlyphMap = glyph_order
        .iter()
        .map(|name| GlyphName::new(name.as_str()))
        .collect();

    let compilation = Compiler::new(fea_path.as_os_str().to_owned(), &glyph_map)
        .compile()
        .map_err(|err| BuildError::Feature(err.to_string()))?;
    let binary = compilation
        .to_binary(&glyph_map)
        .map_err(|err| BuildError::Feature(err.to_string()))?;

    let compiled = FontRef::new(&binary)
        .map_err(|err| BuildError::Feature(format!("unreadable compiler output: {err}")))?;
    let mut tables = Vec::new();
    for tag in LAYOUT_TABLES {
        if let Some(data) = compiled.table_data(tag) {
            tables.push((tag, data.as_bytes().to_vec()));
        }
    }
    log::debug!(
        "feature compilation produced {} layout tables",
        tables.len()
    );
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn mark_feature_compiles_to_gpos_and_gdef() {
        let fea = "\
markClass fatha-ar <anchor 100 400> @mark_top;
feature mark {
pos base beh-ar <anchor 200 500> mark @mark_top;
} mark;

@BASE = [beh-ar];
@MARK = [fatha-ar];
table GDEF {
 GlyphClassDef @BASE, , @MARK, ;
} GDEF;
";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(fea.as_bytes()).unwrap();
        let order = vec![
            ".notdef".to_owned(),
            "beh-ar".to_owned(),
            "fatha-ar".to_owned(),
        ];
        let tables = compile(file.path(), &order).unwrap();
        let tags: Vec<Tag> = tables.iter().map(|(tag, _)| *tag).collect();
        assert!(tags.contains(&Tag::new(b"GPOS")));
        assert!(tags.contains(&Tag::new(b"GDEF")));
    }

    #[test]
    fn unknown_glyph_fails_compilation() {
        let fea = "feature kern { pos missing other -10; } kern;\n";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(fea.as_bytes()).unwrap();
        let order = vec![".notdef".to_owned()];
        assert!(matches!(
            compile(file.path(), &order),
            Err(BuildError::Feature(_))
        ));
    }
}
