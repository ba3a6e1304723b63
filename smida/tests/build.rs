//! End-to-end builds over a small design source.

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use write_fonts::read::{FontRef, TableProvider};
use write_fonts::types::{GlyphId16, Tag};

fn test_source(include_vendor: bool) -> serde_json::Value {
    let mut source = serde_json::json!({
        "family_name": "Test",
        "units_per_em": 1000,
        "date": 1577836800,
        "copyright": "© 2026 The Test Project Authors",
        "designer": "A. Designer",
        "manufacturer": "The Test Project",
        "license": "This Font Software is licensed under the SIL Open Font License.",
        "use_typo_metrics": true,
        "code_page_ranges": [1256, 1252],
        "unicode_ranges": [13],
        "glyphs": [
            {
                "name": ".notdef",
                "layers": [{"master": "m1", "width": 500.0, "paths": [{
                    "closed": true,
                    "nodes": [
                        {"x": 50.0, "y": 0.0, "type": "line"},
                        {"x": 450.0, "y": 0.0, "type": "line"},
                        {"x": 450.0, "y": 700.0, "type": "line"},
                        {"x": 50.0, "y": 700.0, "type": "line"}
                    ]
                }]}]
            },
            {
                "name": "alef-ar",
                "unicodes": [1575],
                "layers": [{"master": "m1", "width": 600.0,
                    "paths": [{
                        "closed": true,
                        "nodes": [
                            {"x": 100.0, "y": 0.0, "type": "line"},
                            {"x": 500.0, "y": 0.0, "type": "line"},
                            {"x": 500.0, "y": 700.0, "type": "line"},
                            {"x": 100.0, "y": 700.0, "type": "line"}
                        ]
                    }],
                    "anchors": [{"name": "top", "x": 300.0, "y": 720.0}]
                }]
            },
            {
                "name": "fatha-ar",
                "unicodes": [1614],
                "layers": [{"master": "m1", "width": 400.0,
                    "paths": [{
                        "closed": true,
                        "nodes": [
                            {"x": 0.0, "y": 0.0, "type": "line"},
                            {"x": 200.0, "y": 0.0, "type": "line"},
                            {"x": 200.0, "y": 60.0, "type": "line"},
                            {"x": 0.0, "y": 60.0, "type": "line"}
                        ]
                    }],
                    "anchors": [{"name": "_top", "x": 100.0, "y": 0.0}]
                }]
            },
            {
                "name": "fathatan-ar",
                "unicodes": [1611],
                "layers": [{"master": "m1", "width": 400.0, "components": [
                    {"reference": "fatha-ar"},
                    {"reference": "fatha-ar",
                     "transform": [1.0, 0.0, 0.0, 1.0, 0.0, 100.0]}
                ]}]
            },
            {
                "name": "_part.stub",
                "category": "Temporary",
                "layers": [{"master": "m1", "width": 180.0}]
            }
        ],
        "masters": [{
            "id": "m1",
            "ascender": 800, "descender": -200,
            "x_height": 500, "cap_height": 700,
            "typo_line_gap": 200,
            "underline_thickness": 50, "underline_position": -100,
            "horizontal_stems": [60.0],
            "vertical_stems": [90.0],
            "alignment_zones": [
                {"position": 0.0, "size": -16.0},
                {"position": 700.0, "size": 16.0}
            ]
        }],
        "instances": [{
            "name": "Regular",
            "family_name": "Test",
            "full_name": "Test Regular",
            "font_name": "Test-Regular"
        }],
        "kerning": {"m1": {"alef-ar": {"fatha-ar": -25.0}}},
        "features": [{"name": "mark"}, {"name": "kern"}]
    });
    if include_vendor {
        source["vendor_id"] = serde_json::json!("TEST");
    }
    source
}

fn write_source(dir: &std::path::Path, include_vendor: bool) -> PathBuf {
    let path = dir.join("Test.json");
    fs::write(&path, test_source(include_vendor).to_string()).unwrap();
    path
}

#[test]
fn builds_a_postscript_font() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), true);
    let output = dir.path().join("Test-Regular.otf");
    smida::compile(&source, "1.007", &output).unwrap();

    let data = fs::read(&output).unwrap();
    let font = FontRef::new(&data).unwrap();

    // `.notdef` is glyph 0 and the temporary glyph comes last.
    let post = font.post().unwrap();
    assert_eq!(post.glyph_name(GlyphId16::new(0)), Some(".notdef"));
    let num_glyphs = font.maxp().unwrap().num_glyphs();
    assert_eq!(
        post.glyph_name(GlyphId16::new(num_glyphs - 1)),
        Some("_part.stub")
    );

    // The character map covers alef, and the outlines went into CFF.
    let cmap = font.cmap().unwrap();
    let alef = cmap.map_codepoint(0x0627u32).unwrap();
    assert_ne!(alef.to_u32(), 0);
    assert!(font.table_data(Tag::new(b"CFF ")).is_some());
    assert!(font.table_data(Tag::new(b"glyf")).is_none());

    // Marks get zero advance.
    let fatha = cmap.map_codepoint(0x064Eu32).unwrap();
    let hmtx = font.hmtx().unwrap();
    assert_eq!(hmtx.advance(fatha), Some(0));
    assert_eq!(hmtx.advance(alef), Some(600));

    // Layout tables compiled from the generated feature text.
    assert!(font.table_data(Tag::new(b"GPOS")).is_some());
    assert!(font.table_data(Tag::new(b"GDEF")).is_some());
    assert!(font.table_data(Tag::new(b"meta")).is_some());

    // The feature text itself is written next to the output.
    let fea = fs::read_to_string(dir.path().join("Test-Regular.fea")).unwrap();
    assert!(fea.contains("markClass fatha-ar"));
    assert!(fea.contains("pos alef-ar fatha-ar <-25 0 -25 0>;"));
    // The inherited mark anchor classifies the composite as a mark too.
    assert!(fea.contains("@MARK = [fatha-ar fathatan-ar];"));
}

#[test]
fn builds_a_truetype_font_and_woff2() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), true);
    let output = dir.path().join("Test-Regular.ttf");
    smida::compile(&source, "2.000", &output).unwrap();

    let data = fs::read(&output).unwrap();
    let font = FontRef::new(&data).unwrap();

    assert!(font.table_data(Tag::new(b"glyf")).is_some());
    assert!(font.table_data(Tag::new(b"loca")).is_some());
    assert!(font.table_data(Tag::new(b"CFF ")).is_none());
    assert!(font.table_data(Tag::new(b"gasp")).is_some());
    assert!(font.table_data(Tag::new(b"prep")).is_some());

    // The composite stayed a composite: its glyf record references the
    // leaf glyphs instead of repeating their points.
    let loca = font.loca(None).unwrap();
    let glyf = font.glyf().unwrap();
    let post = font.post().unwrap();
    let num_glyphs = font.maxp().unwrap().num_glyphs();
    let composite_gid = (0..num_glyphs)
        .find(|gid| post.glyph_name(GlyphId16::new(*gid)) == Some("fathatan-ar"))
        .unwrap();
    let glyph = loca
        .get_glyf(GlyphId16::new(composite_gid).into(), &glyf)
        .unwrap()
        .unwrap();
    assert!(matches!(
        glyph,
        write_fonts::read::tables::glyf::Glyph::Composite(_)
    ));

    let woff2 = smida::woff2::compress(&data).unwrap();
    assert_eq!(&woff2[..4], b"wOF2");
    assert_eq!(&woff2[4..8], &0x0001_0000u32.to_be_bytes());
    assert!(woff2.len() < data.len());
}

#[test]
fn missing_vendor_id_fails_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), false);
    let output = dir.path().join("Test-Regular.otf");
    let err = smida::compile(&source, "1.000", &output).unwrap_err();
    assert!(err.to_string().contains("vendor_id"), "{err}");
}
