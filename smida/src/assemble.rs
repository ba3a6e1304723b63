//! Font table assembly: the whole build for one design-source/output pair.
//!
//! Fixed policies live here: `.notdef` always takes glyph index 0,
//! placeholder and temporary glyphs go to the very end of the order with a
//! fixed advance and no outline, PostScript builds drop non-exported glyphs
//! while TrueType builds keep them (composite references may need them), and
//! marks get a zero advance. Every missing piece of required metadata fails
//! the build naming the field.

use std::fs;
use std::path::Path;

use kurbo::{BezPath, Shape};
use write_fonts::tables::cmap::Cmap;
use write_fonts::tables::gasp::{Gasp, GaspRange, GaspRangeBehavior};
use write_fonts::tables::glyf::{
    Anchor as GlyfAnchor, Bbox, Component, ComponentFlags, CompositeGlyph, GlyfLocaBuilder,
    Glyph as GlyfGlyph, SimpleGlyph, Transform as GlyfTransform,
};
use write_fonts::tables::head::{Flags as HeadFlags, Head, MacStyle};
use write_fonts::tables::hhea::Hhea;
use write_fonts::tables::hmtx::Hmtx;
use write_fonts::tables::maxp::Maxp;
use write_fonts::tables::meta::{DataMapRecord, Meta, Metadata, ScriptLangTag, DLNG, SLNG};
use write_fonts::tables::name::{Name, NameRecord};
use write_fonts::tables::os2::{Os2, SelectionFlags};
use write_fonts::tables::post::Post;
use write_fonts::types::{
    F2Dot14, FWord, Fixed, GlyphId, GlyphId16, LongDateTime, NameId, Tag, UfWord,
};
use write_fonts::{FontBuilder, OtRound};

use crate::error::BuildError;
use crate::source::{Category, Font, Instance, Master, Text};
use crate::{anchors, cff, charstring, features, hinting, layout, outline, pathops, quadratic};

/// Output flavor, selected by the output file's extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    PostScript,
    TrueType,
}

impl Flavor {
    pub fn from_path(path: &Path) -> Flavor {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ttf") => Flavor::TrueType,
            _ => Flavor::PostScript,
        }
    }
}

/// Seconds between the sfnt epoch (1904) and the unix epoch (1970).
const EPOCH_1904: i64 = 2_082_844_800;

/// Forced advance for placeholder and temporary glyphs.
const PLACEHOLDER_WIDTH: f64 = 600.0;

/// The fixed grid-fitting program: PUSHW 511, SCANCTRL, PUSHB 4, SCANTYPE.
const PREP_PROGRAM: [u8; 7] = [0xb8, 0x01, 0xff, 0x85, 0xb0, 0x04, 0x8d];

/// Build one font file end to end.
pub fn compile(source_path: &Path, version: &str, output: &Path) -> Result<(), BuildError> {
    let flavor = Flavor::from_path(output);
    let mut font = Font::load(source_path)?;
    let data = build(&mut font, version, flavor, &output.with_extension("fea"))?;
    fs::write(output, data)?;
    log::info!("wrote {}", output.display());
    Ok(())
}

/// Run the full pipeline over a loaded source. The generated feature text is
/// written to `fea_path` and compiled from there.
pub fn build(
    font: &mut Font,
    version: &str,
    flavor: Flavor,
    fea_path: &Path,
) -> Result<Vec<u8>, BuildError> {
    let is_ttf = flavor == Flavor::TrueType;
    let revision = version
        .parse::<f64>()
        .map_err(|_| BuildError::BadVersion(version.to_owned()))?;

    // Preparation pass: the glyph table is mutated here and read-only after.
    let classes = features::expand_classes(font, version)?;
    anchors::propagate_anchors(font)?;
    assign_glyph_order(font, is_ttf)?;

    let master = font.first_master()?.clone();
    let instance = font.first_instance()?.clone();
    let (fea, marks) = features::generate(font, &master, version, &classes)?;
    fs::write(fea_path, &fea)?;

    if is_ttf {
        for glyph in &mut font.glyphs {
            let name = glyph.name.clone();
            if let Some(layer) = glyph.layer_mut(&master.id) {
                quadratic::convert_layer(layer, quadratic::TOLERANCE).map_err(|detail| {
                    BuildError::MalformedOutline {
                        glyph: name.clone(),
                        detail,
                    }
                })?;
            }
        }
    }

    let order = font.glyph_order.clone();
    log::info!(
        "assembling {} glyphs ({})",
        order.len(),
        if is_ttf { "TrueType" } else { "PostScript" }
    );

    let mut builder = FontBuilder::new();
    let mut metrics: Vec<(u16, i16)> = Vec::new();
    let mut x_maxes: Vec<Option<i16>> = Vec::new();
    let mut mappings: Vec<(char, GlyphId)> = Vec::new();
    let mut font_bbox: Option<Bbox> = None;
    let mut loca_format = 0i16;

    let mut widths: Vec<u16> = Vec::new();
    for name in &order {
        let glyph = font.glyph(name).expect("ordered glyphs exist");
        let width = match glyph.layer(&master.id) {
            Some(_) if marks.contains(name) => 0.0,
            Some(layer) => layer.width,
            None => 0.0,
        };
        widths.push(width.ot_round());
        for &code in &glyph.unicodes {
            let ch = char::from_u32(code).ok_or(BuildError::BadCodepoint(code))?;
            mappings.push((ch, GlyphId::new(widths.len() as u32 - 1)));
        }
    }

    if is_ttf {
        let mut glyf_builder = GlyfLocaBuilder::new();
        let mut stats = TrueTypeStats::default();
        for (ix, name) in order.iter().enumerate() {
            let glyph = build_truetype_glyph(font, name, &master, &order, &mut stats)?;
            let bbox = glyph_bbox(&glyph);
            if let Some(bbox) = bbox {
                font_bbox = Some(merge_bbox(font_bbox, bbox));
            }
            glyf_builder
                .add_glyph(&glyph)
                .map_err(|err| BuildError::Table {
                    tag: "glyf",
                    detail: format!("glyph '{name}': {err}"),
                })?;
            metrics.push((widths[ix], bbox.map(|b| b.x_min).unwrap_or_default()));
            x_maxes.push(bbox.map(|b| b.x_max));
        }
        let (glyf, loca, format) = glyf_builder.build();
        builder.add_table(&glyf).map_err(table_err("glyf"))?;
        builder.add_table(&loca).map_err(table_err("loca"))?;
        loca_format = format as i16;

        let maxp = Maxp {
            num_glyphs: order.len() as u16,
            max_points: Some(stats.max_points),
            max_contours: Some(stats.max_contours),
            max_composite_points: Some(stats.max_composite_points),
            max_composite_contours: Some(stats.max_composite_contours),
            max_zones: Some(1),
            max_twilight_points: Some(0),
            max_storage: Some(0),
            max_function_defs: Some(0),
            max_instruction_defs: Some(0),
            max_stack_elements: Some(0),
            max_size_of_instructions: Some(0),
            max_component_elements: Some(stats.max_component_elements),
            max_component_depth: Some(if stats.max_component_elements > 0 { 1 } else { 0 }),
        };
        builder.add_table(&maxp).map_err(table_err("maxp"))?;

        let gasp = Gasp {
            version: 1,
            num_ranges: 1,
            gasp_ranges: vec![GaspRange {
                range_max_ppem: 0xFFFF,
                range_gasp_behavior: GaspRangeBehavior::GASP_GRIDFIT
                    | GaspRangeBehavior::GASP_DOGRAY
                    | GaspRangeBehavior::GASP_SYMMETRIC_GRIDFIT
                    | GaspRangeBehavior::GASP_SYMMETRIC_SMOOTHING,
            }],
        };
        builder.add_table(&gasp).map_err(table_err("gasp"))?;
        builder.add_raw(Tag::new(b"prep"), PREP_PROGRAM.to_vec());
    } else {
        let params = hinting::derive_params(&master)?;
        let mut charstrings: Vec<(String, Vec<u8>)> = Vec::new();
        for (ix, name) in order.iter().enumerate() {
            let path = outline::resolve_outline(font, name, &master.id)?;
            let simplified =
                pathops::remove_overlaps(&path).map_err(|detail| BuildError::Geometry {
                    glyph: name.clone(),
                    detail,
                })?;
            let hints = hinting::glyph_hints(&simplified, &params);
            let bytes = charstring::encode(&simplified, widths[ix] as i32, &hints);
            if simplified.elements().is_empty() {
                metrics.push((widths[ix], 0));
                x_maxes.push(None);
            } else {
                let bbox = to_bbox(simplified.bounding_box());
                font_bbox = Some(merge_bbox(font_bbox, bbox));
                metrics.push((widths[ix], bbox.x_min));
                x_maxes.push(Some(bbox.x_max));
            }
            charstrings.push((name.clone(), bytes));
        }

        let maxp = Maxp {
            num_glyphs: order.len() as u16,
            ..Default::default()
        };
        builder.add_table(&maxp).map_err(table_err("maxp"))?;

        let bbox = font_bbox.unwrap_or_default();
        let notice = font.copyright()?.replace('©', "(c)");
        let table = cff::build(&cff::CffFont {
            ps_name: &instance.font_name,
            version,
            notice: &notice,
            full_name: &instance.full_name,
            family_name: &instance.family_name,
            weight: &instance.name,
            units_per_em: font.units_per_em,
            font_bbox: [
                bbox.x_min as i32,
                bbox.y_min as i32,
                bbox.x_max as i32,
                bbox.y_max as i32,
            ],
            charstrings: &charstrings,
            params: &params,
        });
        builder.add_raw(Tag::new(b"CFF "), table);
    }

    let bbox = font_bbox.unwrap_or_default();
    let mut mac_style = MacStyle::empty();
    if instance.is_bold {
        mac_style |= MacStyle::BOLD;
    }
    if instance.is_italic {
        mac_style |= MacStyle::ITALIC;
    }
    let date = LongDateTime::new(font.date + EPOCH_1904);
    let head = Head {
        font_revision: Fixed::from_f64(revision),
        flags: HeadFlags::BASELINE_AT_Y_0 | HeadFlags::LSB_AT_X_0,
        units_per_em: font.units_per_em,
        created: date,
        modified: date,
        x_min: bbox.x_min,
        y_min: bbox.y_min,
        x_max: bbox.x_max,
        y_max: bbox.y_max,
        mac_style,
        lowest_rec_ppem: 3,
        index_to_loc_format: loca_format,
        ..Default::default()
    };
    builder.add_table(&head).map_err(table_err("head"))?;

    let line_gap = master.typo_line_gap()?;
    let hhea = hhea_table(&master, line_gap, &metrics, &x_maxes, bbox, order.len() as u16);
    builder.add_table(&hhea).map_err(table_err("hhea"))?;

    let h_metrics = metrics
        .iter()
        .map(|&(advance, side_bearing)| write_fonts::tables::hmtx::LongMetric {
            advance,
            side_bearing,
        })
        .collect();
    builder.add_table(&Hmtx::new(h_metrics, Vec::new())).map_err(table_err("hmtx"))?;

    let cmap = Cmap::from_mappings(mappings.clone())
        .map_err(|err| BuildError::CmapConflict(err.to_string()))?;
    builder.add_table(&cmap).map_err(table_err("cmap"))?;

    let name = name_table(font, &instance, version)?;
    builder.add_table(&name).map_err(table_err("name"))?;

    let os2 = os2_table(font, &master, &instance, line_gap, &widths, &mappings)?;
    builder.add_table(&os2).map_err(table_err("OS/2"))?;

    let post = post_table(&master, &order)?;
    builder.add_table(&post).map_err(table_err("post"))?;

    let meta = meta_table()?;
    builder.add_table(&meta).map_err(table_err("meta"))?;

    for (tag, data) in layout::compile(fea_path, &order)? {
        builder.add_raw(tag, data);
    }

    let mut data = builder.build();
    patch_checksum_adjustment(&mut data);
    Ok(data)
}

fn table_err<E: std::fmt::Display>(tag: &'static str) -> impl Fn(E) -> BuildError {
    move |err| BuildError::Table {
        tag,
        detail: err.to_string(),
    }
}

/// `.notdef` first, placeholders and temporaries last (with their advance
/// forced), non-exported glyphs dropped for PostScript outputs.
fn assign_glyph_order(font: &mut Font, is_ttf: bool) -> Result<(), BuildError> {
    if font.glyph(".notdef").is_none() {
        return Err(BuildError::MissingField(".notdef"));
    }
    let mut order = vec![".notdef".to_owned()];
    let mut end = Vec::new();
    for glyph in &mut font.glyphs {
        if matches!(
            glyph.category,
            Some(Category::Placeholder | Category::Temporary)
        ) {
            end.push(glyph.name.clone());
            for layer in &mut glyph.layers {
                layer.width = PLACEHOLDER_WIDTH;
            }
            continue;
        }
        if !glyph.export && !is_ttf {
            continue;
        }
        if glyph.name == ".notdef" {
            continue;
        }
        order.push(glyph.name.clone());
    }
    order.extend(end);
    font.glyph_order = order;
    Ok(())
}

#[derive(Default)]
struct TrueTypeStats {
    max_points: u16,
    max_contours: u16,
    max_composite_points: u16,
    max_composite_contours: u16,
    max_component_elements: u16,
}

fn build_truetype_glyph(
    font: &Font,
    name: &str,
    master: &Master,
    order: &[String],
    stats: &mut TrueTypeStats,
) -> Result<GlyfGlyph, BuildError> {
    let Some(layer) = font.glyph(name).and_then(|g| g.layer(&master.id)) else {
        return Ok(GlyfGlyph::Simple(SimpleGlyph::default()));
    };

    if layer.paths.is_empty() && !layer.components.is_empty() {
        if let Some(flat) = outline::flatten_components(font, name, &master.id)? {
            return composite_glyph(font, name, master, order, &flat, stats);
        }
    }
    if layer.paths.is_empty() && layer.components.is_empty() {
        return Ok(GlyfGlyph::Simple(SimpleGlyph::default()));
    }

    // Decompose and remove overlaps.
    let path = outline::resolve_outline(font, name, &master.id)?;
    let simplified = pathops::remove_overlaps(&path).map_err(|detail| BuildError::Geometry {
        glyph: name.to_owned(),
        detail,
    })?;
    if simplified.elements().is_empty() {
        return Ok(GlyfGlyph::Simple(SimpleGlyph::default()));
    }
    // The union leaves outer contours counter-clockwise; glyf wants the
    // outside clockwise.
    let simplified = pathops::reverse_winding(&simplified);
    let simple = SimpleGlyph::from_bezpath(&simplified).map_err(|err| BuildError::Geometry {
        glyph: name.to_owned(),
        detail: format!("cannot encode outline: {err:?}"),
    })?;
    let (points, contours) = path_stats(&simplified);
    stats.max_points = stats.max_points.max(points);
    stats.max_contours = stats.max_contours.max(contours);
    Ok(GlyfGlyph::Simple(simple))
}

/// Keep the composite representation: one binary component per flattened
/// leaf, with the overlap flag on the first component when leaves intersect.
fn composite_glyph(
    font: &Font,
    name: &str,
    master: &Master,
    order: &[String],
    flat: &[outline::FlatComponent],
    stats: &mut TrueTypeStats,
) -> Result<GlyfGlyph, BuildError> {
    let mut parts: Vec<(GlyphId16, GlyfTransform, GlyfAnchor, Bbox, BezPath)> = Vec::new();
    let mut total_points = 0u16;
    let mut total_contours = 0u16;
    for component in flat {
        let gid = order
            .iter()
            .position(|n| n == &component.glyph)
            .ok_or_else(|| BuildError::UnknownGlyph {
                target: component.glyph.clone(),
                referenced_by: name.to_owned(),
            })?;
        let coeffs = component.transform.as_coeffs();
        let transform = GlyfTransform {
            xx: F2Dot14::from_f32(coeffs[0] as f32),
            yx: F2Dot14::from_f32(coeffs[1] as f32),
            xy: F2Dot14::from_f32(coeffs[2] as f32),
            yy: F2Dot14::from_f32(coeffs[3] as f32),
        };
        let anchor = GlyfAnchor::Offset {
            x: coeffs[4].ot_round(),
            y: coeffs[5].ot_round(),
        };
        let mut leaf = outline::resolve_outline(font, &component.glyph, &master.id)?;
        leaf.apply_affine(component.transform);
        let bbox = if leaf.elements().is_empty() {
            Bbox::default()
        } else {
            let (points, contours) = path_stats(&leaf);
            total_points += points;
            total_contours += contours;
            to_bbox(leaf.bounding_box())
        };
        parts.push((GlyphId16::new(gid as u16), transform, anchor, bbox, leaf));
    }

    let overlapping = parts
        .iter()
        .enumerate()
        .any(|(i, (_, _, _, _, a))| {
            parts[i + 1..]
                .iter()
                .any(|(_, _, _, _, b)| pathops::paths_overlap(a, b))
        });

    stats.max_composite_points = stats.max_composite_points.max(total_points);
    stats.max_composite_contours = stats.max_composite_contours.max(total_contours);
    stats.max_component_elements = stats.max_component_elements.max(parts.len() as u16);

    let mut composite: Option<CompositeGlyph> = None;
    for (ix, (gid, transform, anchor, bbox, _)) in parts.into_iter().enumerate() {
        let flags = ComponentFlags {
            round_xy_to_grid: true,
            overlap_compound: ix == 0 && overlapping,
            ..Default::default()
        };
        let component = Component::new(gid, anchor, transform, flags);
        match &mut composite {
            None => composite = Some(CompositeGlyph::new(component, bbox)),
            Some(glyph) => glyph.add_component(component, bbox),
        }
    }
    match composite {
        Some(glyph) => Ok(GlyfGlyph::Composite(glyph)),
        None => Ok(GlyfGlyph::Simple(SimpleGlyph::default())),
    }
}

fn path_stats(path: &BezPath) -> (u16, u16) {
    let mut points = 0u16;
    let mut contours = 0u16;
    for el in path.elements() {
        match el {
            kurbo::PathEl::MoveTo(_) => {
                contours += 1;
                points += 1;
            }
            kurbo::PathEl::LineTo(_) => points += 1,
            kurbo::PathEl::QuadTo(..) => points += 2,
            kurbo::PathEl::CurveTo(..) => points += 3,
            kurbo::PathEl::ClosePath => {}
        }
    }
    (points, contours)
}

fn glyph_bbox(glyph: &GlyfGlyph) -> Option<Bbox> {
    let bbox = match glyph {
        GlyfGlyph::Simple(simple) => {
            if simple.contours.is_empty() {
                return None;
            }
            simple.bbox
        }
        GlyfGlyph::Composite(composite) => composite.bbox,
    };
    Some(bbox)
}

fn to_bbox(rect: kurbo::Rect) -> Bbox {
    Bbox {
        x_min: rect.x0.floor() as i16,
        y_min: rect.y0.floor() as i16,
        x_max: rect.x1.ceil() as i16,
        y_max: rect.y1.ceil() as i16,
    }
}

fn merge_bbox(current: Option<Bbox>, new: Bbox) -> Bbox {
    match current {
        Some(existing) => existing.union(new),
        None => new,
    }
}

fn hhea_table(
    master: &Master,
    line_gap: i16,
    metrics: &[(u16, i16)],
    x_maxes: &[Option<i16>],
    bbox: Bbox,
    num_glyphs: u16,
) -> Hhea {
    let advance_width_max = metrics.iter().map(|&(a, _)| a).max().unwrap_or_default();
    let min_lsb = metrics
        .iter()
        .zip(x_maxes)
        .filter(|(_, x_max)| x_max.is_some())
        .map(|(&(_, lsb), _)| lsb)
        .min()
        .unwrap_or_default();
    let min_rsb = metrics
        .iter()
        .zip(x_maxes)
        .filter_map(|(&(advance, _), x_max)| x_max.map(|x| advance as i32 - x as i32))
        .min()
        .unwrap_or_default()
        .clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    Hhea {
        ascender: FWord::new(master.ascender),
        descender: FWord::new(master.descender),
        line_gap: FWord::new(line_gap),
        advance_width_max: UfWord::new(advance_width_max),
        min_left_side_bearing: FWord::new(min_lsb),
        min_right_side_bearing: FWord::new(min_rsb),
        x_max_extent: FWord::new(bbox.x_max),
        caret_slope_rise: 1,
        caret_slope_run: 0,
        caret_offset: 0,
        number_of_long_metrics: num_glyphs,
        ..Default::default()
    }
}

fn name_table(font: &Font, instance: &Instance, version: &str) -> Result<Name, BuildError> {
    let vendor = font.vendor_id()?.to_owned();
    let mut records: Vec<NameRecord> = Vec::new();

    push_name(&mut records, 0, 0x0409, font.copyright()?.to_owned());
    push_name(&mut records, 1, 0x0409, instance.family_name.clone());
    push_name(&mut records, 2, 0x0409, instance.name.clone());
    push_name(
        &mut records,
        3,
        0x0409,
        format!("{version};{vendor};{}", instance.font_name),
    );
    push_name(&mut records, 4, 0x0409, instance.full_name.clone());
    push_name(&mut records, 5, 0x0409, format!("Version {version}"));
    push_name(&mut records, 6, 0x0409, instance.font_name.clone());
    if let Some(manufacturer) = &font.manufacturer {
        push_name(&mut records, 8, 0x0409, manufacturer.clone());
    }
    if let Some(designer) = &font.designer {
        push_name(&mut records, 9, 0x0409, designer.clone());
    }
    push_localized(&mut records, 10, &font.description);
    if let Some(url) = &font.manufacturer_url {
        push_name(&mut records, 11, 0x0409, url.clone());
    }
    if let Some(url) = &font.designer_url {
        push_name(&mut records, 12, 0x0409, url.clone());
    }
    push_localized(&mut records, 13, &font.license);
    if let Some(url) = &font.license_url {
        push_name(&mut records, 14, 0x0409, url.clone());
    }
    push_localized(&mut records, 19, &font.sample_text);

    records.sort();
    Ok(Name::new(records))
}

fn push_name(records: &mut Vec<NameRecord>, id: u16, lang_id: u16, value: String) {
    records.push(NameRecord::new(3, 1, lang_id, NameId::new(id), value.into()));
}

fn push_localized(records: &mut Vec<NameRecord>, id: u16, text: &Option<Text>) {
    let Some(text) = text else { return };
    if let Some(default) = text.default_text() {
        push_name(records, id, 0x0409, default.to_owned());
    }
    for (lang, value) in text.localized() {
        let Some(lang_id) = windows_language(lang) else {
            log::warn!("no Windows language id for '{lang}', skipping name {id}");
            continue;
        };
        push_name(records, id, lang_id, value.to_owned());
    }
}

fn windows_language(lang: &str) -> Option<u16> {
    match lang {
        "ar" => Some(0x0C01),
        "en" => Some(0x0409),
        _ => None,
    }
}

fn os2_table(
    font: &Font,
    master: &Master,
    instance: &Instance,
    line_gap: i16,
    widths: &[u16],
    mappings: &[(char, GlyphId)],
) -> Result<Os2, BuildError> {
    let vendor = font.vendor_id()?;
    let vendor_tag = Tag::new_checked(vendor.as_bytes()).map_err(|_| BuildError::Table {
        tag: "OS/2",
        detail: format!("vendor id '{vendor}' is not a 4-character tag"),
    })?;

    let mut fs_selection = SelectionFlags::empty();
    if font.use_typo_metrics {
        fs_selection |= SelectionFlags::USE_TYPO_METRICS;
    }
    if instance.is_italic {
        fs_selection |= SelectionFlags::ITALIC;
    }
    if instance.is_bold {
        fs_selection |= SelectionFlags::BOLD;
    }
    if !(instance.is_italic || instance.is_bold) {
        fs_selection |= SelectionFlags::REGULAR;
    }

    let code_page_bits = font
        .code_page_ranges
        .iter()
        .map(|page| {
            codepage_bit(*page).ok_or_else(|| BuildError::Table {
                tag: "OS/2",
                detail: format!("unknown codepage {page}"),
            })
        })
        .collect::<Result<Vec<u32>, _>>()?;

    let nonzero: Vec<u16> = widths.iter().copied().filter(|w| *w > 0).collect();
    let x_avg_char_width = if nonzero.is_empty() {
        0
    } else {
        (nonzero.iter().map(|w| *w as u32).sum::<u32>() / nonzero.len() as u32) as i16
    };

    let first_char = mappings.iter().map(|(c, _)| *c as u32).min();
    let last_char = mappings.iter().map(|(c, _)| *c as u32).max();

    Ok(Os2 {
        x_avg_char_width,
        us_weight_class: if instance.is_bold { 700 } else { 400 },
        us_width_class: 5,
        fs_type: calc_bits(&font.fs_type, 0, 16) as u16,
        s_family_class: 0,
        panose_10: [0; 10],
        ul_unicode_range_1: calc_bits(&font.unicode_ranges, 0, 32),
        ach_vend_id: vendor_tag,
        fs_selection,
        us_first_char_index: first_char.unwrap_or(0).min(0xFFFF) as u16,
        us_last_char_index: last_char.unwrap_or(0).min(0xFFFF) as u16,
        s_typo_ascender: master.ascender,
        s_typo_descender: master.descender,
        s_typo_line_gap: line_gap,
        us_win_ascent: master.ascender.max(0) as u16,
        us_win_descent: (-master.descender).max(0) as u16,
        ul_code_page_range_1: Some(calc_bits(&code_page_bits, 0, 32)),
        ul_code_page_range_2: Some(0),
        sx_height: Some(master.x_height),
        s_cap_height: Some(master.cap_height),
        us_default_char: Some(0),
        us_break_char: Some(0x20),
        us_max_context: Some(2),
        ..Default::default()
    })
}

/// The original's `calcBits`: one output bit per position in `[start, end)`.
fn calc_bits(bits: &[u32], start: u32, end: u32) -> u32 {
    let mut out = 0u32;
    for i in (start..end).rev() {
        out <<= 1;
        if bits.contains(&i) {
            out |= 1;
        }
    }
    out
}

/// OS/2 code-page bit assignments for Windows codepage numbers.
fn codepage_bit(page: u32) -> Option<u32> {
    Some(match page {
        1252 => 0,
        1250 => 1,
        1251 => 2,
        1253 => 3,
        1254 => 4,
        1255 => 5,
        1256 => 6,
        1257 => 7,
        1258 => 8,
        874 => 16,
        932 => 17,
        936 => 18,
        949 => 19,
        950 => 20,
        1361 => 21,
        869 => 48,
        866 => 49,
        865 => 50,
        864 => 51,
        863 => 52,
        862 => 53,
        861 => 54,
        860 => 55,
        857 => 56,
        855 => 57,
        852 => 58,
        775 => 59,
        737 => 60,
        708 => 61,
        850 => 62,
        437 => 63,
        _ => return None,
    })
}

fn post_table(master: &Master, order: &[String]) -> Result<Post, BuildError> {
    let thickness = master.underline_thickness()?;
    let position = master.underline_position()?;
    let mut post = Post {
        italic_angle: Fixed::from_f64(master.italic_angle.unwrap_or(0.0)),
        underline_position: FWord::new(position + thickness / 2),
        underline_thickness: FWord::new(thickness),
        ..Default::default()
    };
    post.set_glyph_names(order.iter().map(String::as_str));
    Ok(post)
}

fn meta_table() -> Result<Meta, BuildError> {
    let arab = || {
        ScriptLangTag::new("Arab".to_owned()).map_err(|err| BuildError::Table {
            tag: "meta",
            detail: err.to_string(),
        })
    };
    Ok(Meta::new(vec![
        DataMapRecord::new(DLNG, Metadata::ScriptLangTags(vec![arab()?])),
        DataMapRecord::new(SLNG, Metadata::ScriptLangTags(vec![arab()?])),
    ]))
}

/// Patch the whole-font checksum adjustment into the assembled binary.
fn patch_checksum_adjustment(data: &mut [u8]) {
    const ADJUSTMENT_MAGIC: u32 = 0xB1B0_AFBA;
    let num_tables = u16::from_be_bytes([data[4], data[5]]) as usize;
    let mut head_offset = None;
    for i in 0..num_tables {
        let record = 12 + i * 16;
        if data[record..record + 4] == *b"head" {
            let offset = u32::from_be_bytes(data[record + 8..record + 12].try_into().unwrap());
            head_offset = Some(offset as usize);
        }
    }
    let Some(head_offset) = head_offset else {
        return;
    };
    let checksum = write_fonts::read::tables::compute_checksum(data);
    let adjustment = ADJUSTMENT_MAGIC.wrapping_sub(checksum);
    data[head_offset + 8..head_offset + 12].copy_from_slice(&adjustment.to_be_bytes());
}
