//! Feature text generation.
//!
//! Everything the layout compiler consumes is produced here: glyph classes,
//! the authored prefix and feature blocks (after token expansion), generated
//! mark/cursive/kern rules from anchors and kerning tables, and the GDEF
//! block. Rules are built as typed directives and rendered to feature-file
//! text in one final pass; text only exists at the boundary.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use regex::Regex;
use write_fonts::OtRound;

use crate::error::BuildError;
use crate::glyphdata::{self, Classification};
use crate::source::{AnchorKind, Category, Font, Glyph, Master, SubCategory};

/// Windows language ids for feature display names.
const LANG_IDS: &[(&str, u16)] = &[("ARA", 0x0C01), ("ENG", 0x0409)];

#[derive(Clone, Debug)]
enum Directive {
    /// `@name = [members];`
    GroupDef { name: String, members: Vec<String> },
    /// Pre-expanded free text, emitted verbatim.
    Raw(String),
    /// `markClass glyph <anchor x y> @mark_class;`
    MarkClassDef(MarkAnchor),
    /// `pos base glyph <anchor x y> mark @mark_class;`
    BaseMark(MarkAnchor),
    /// `pos ligature glyph ...;` with component groups in index order.
    LigatureMarks {
        glyph: String,
        components: Vec<(u32, Vec<MarkAnchor>)>,
    },
    /// `pos cursive glyph <anchor ...> <anchor ...>;`
    Cursive {
        glyph: String,
        entry: Option<(i16, i16)>,
        exit: Option<(i16, i16)>,
    },
    /// `pos`/`enum pos` kerning rule.
    KernPair {
        enumerated: bool,
        left: String,
        right: String,
        value: i16,
    },
    LookupFlag(&'static str),
    Feature {
        name: String,
        labels: Vec<(u16, String)>,
        body: Vec<Directive>,
    },
    GdefTable {
        base: Vec<String>,
        liga: Vec<String>,
        mark: Vec<String>,
        carets: Vec<(String, Vec<i16>)>,
    },
}

#[derive(Clone, Debug)]
struct MarkAnchor {
    glyph: String,
    class: String,
    x: i16,
    y: i16,
}

/// A glyph class after expansion.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpandedClass {
    pub name: String,
    pub members: Vec<String>,
}

/// Expand every enabled glyph class. Pattern classes match over all glyph
/// names; derived classes substitute a name suffix and synthesize missing
/// targets as zero-outline temporary glyphs (appended to the glyph table
/// here, ordered to the end later).
pub fn expand_classes(font: &mut Font, version: &str) -> Result<Vec<ExpandedClass>, BuildError> {
    let mut expanded: Vec<ExpandedClass> = Vec::new();
    let classes = font.classes.clone();
    for class in classes.iter().filter(|c| !c.disabled) {
        let members = if let Some(code) = &class.code {
            expand_tokens(code, font, version)?
                .split_whitespace()
                .map(str::to_owned)
                .collect()
        } else if let Some(pattern) = &class.pattern {
            let re = Regex::new(pattern).map_err(|source| BuildError::BadClassPattern {
                class: class.name.clone(),
                source,
            })?;
            font.glyphs
                .iter()
                .filter(|g| re.is_match(&g.name))
                .map(|g| g.name.clone())
                .collect()
        } else if let Some(derive) = &class.derive {
            let base = expanded
                .iter()
                .find(|c| c.name == derive.from)
                .ok_or_else(|| BuildError::UnresolvedClassTarget {
                    class: class.name.clone(),
                    target: format!("@{}", derive.from),
                })?;
            let mut members = Vec::new();
            for member in base.members.clone() {
                // Suffix substitution: an empty `replace` appends.
                let Some(stem) = member.strip_suffix(derive.replace.as_str()) else {
                    return Err(BuildError::UnresolvedClassTarget {
                        class: class.name.clone(),
                        target: member,
                    });
                };
                let target = format!("{stem}{}", derive.with);
                if font.glyph(&target).is_none() {
                    synthesize_glyph(font, &target);
                }
                members.push(target);
            }
            members
        } else {
            Vec::new()
        };
        expanded.push(ExpandedClass {
            name: class.name.clone(),
            members,
        });
    }
    Ok(expanded)
}

/// A zero-outline stand-in, categorized Temporary so the ordering pass sends
/// it to the end.
fn synthesize_glyph(font: &mut Font, name: &str) {
    log::debug!("synthesizing placeholder glyph '{name}'");
    let layers = font
        .masters
        .iter()
        .map(|master| {
            serde_json::from_value(serde_json::json!({
                "master": master.id,
                "width": 600.0,
            }))
            .expect("static layer shape")
        })
        .collect();
    let mut glyph: Glyph = serde_json::from_value(serde_json::json!({
        "name": name,
        "category": "Temporary",
    }))
    .expect("static glyph shape");
    glyph.layers = layers;
    font.glyphs.push(glyph);
}

/// Substitute `$[key]` build-time tokens from font metadata.
pub fn expand_tokens(text: &str, font: &Font, version: &str) -> Result<String, BuildError> {
    if !text.contains("$[") {
        return Ok(text.to_owned());
    }
    let master = font.first_master()?;
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("$[") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find(']') else {
            return Err(BuildError::UnknownToken(after.into()));
        };
        let key = &after[..end];
        let value = match key {
            "upm" => font.units_per_em.to_string(),
            "ascender" => master.ascender.to_string(),
            "descender" => master.descender.to_string(),
            "xHeight" => master.x_height.to_string(),
            "capHeight" => master.cap_height.to_string(),
            "version" => version.to_owned(),
            _ => return Err(BuildError::UnknownToken(key.into())),
        };
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Generate the complete feature program for one master. Returns the text
/// and the set of glyphs classified as marks (their advance width is zeroed
/// during table assembly).
pub fn generate(
    font: &Font,
    master: &Master,
    version: &str,
    classes: &[ExpandedClass],
) -> Result<(String, BTreeSet<String>), BuildError> {
    let mut directives = Vec::new();

    for class in classes {
        directives.push(Directive::GroupDef {
            name: class.name.clone(),
            members: class.members.clone(),
        });
    }

    for prefix in font.feature_prefixes.iter().filter(|p| !p.disabled) {
        directives.push(Directive::Raw(expand_tokens(&prefix.code, font, version)?));
    }

    let anchor_rules = collect_anchor_rules(font, master)?;

    for feature in font.features.iter().filter(|f| !f.disabled) {
        if feature.name == "mark" {
            directives.extend(anchor_rules.mark_section());
        }

        let mut labels = Vec::new();
        for label in &feature.labels {
            let lang_id = LANG_IDS
                .iter()
                .find(|(lang, _)| *lang == label.language)
                .map(|(_, id)| *id)
                .ok_or_else(|| {
                    BuildError::Feature(format!(
                        "feature '{}': unknown label language '{}'",
                        feature.name, label.language
                    ))
                })?;
            labels.push((lang_id, label.value.clone()));
        }
        let mut body = Vec::new();
        if !feature.notes.is_empty() {
            body.push(Directive::Raw(expand_tokens(&feature.notes, font, version)?));
        }
        if !feature.code.is_empty() {
            body.push(Directive::Raw(expand_tokens(&feature.code, font, version)?));
        }
        directives.push(Directive::Feature {
            name: feature.name.clone(),
            labels,
            body,
        });

        if feature.name == "kern" {
            directives.extend(kerning_rules(font, master));
        }
    }

    let (gdef, marks) = gdef_table(font, master)?;
    directives.push(gdef);

    let mut fea = String::new();
    for directive in &directives {
        directive.render(&mut fea);
    }
    Ok((fea, marks))
}

/// Everything the anchors of the glyph set say: mark classes, base and
/// ligature attachments, cursive connections.
struct AnchorRules {
    mark_classes: Vec<Directive>,
    bases: Vec<Directive>,
    ligatures: Vec<Directive>,
    cursive: Vec<Directive>,
}

impl AnchorRules {
    /// The generated half of the mark feature: class declarations up front,
    /// then the curs and mark feature blocks.
    fn mark_section(&self) -> Vec<Directive> {
        let mut out = self.mark_classes.clone();
        let mut curs = vec![Directive::LookupFlag("IgnoreMarks RightToLeft")];
        curs.extend(self.cursive.iter().cloned());
        out.push(Directive::Feature {
            name: "curs".into(),
            labels: Vec::new(),
            body: curs,
        });
        let mut mark = self.bases.clone();
        mark.extend(self.ligatures.iter().cloned());
        out.push(Directive::Feature {
            name: "mark".into(),
            labels: Vec::new(),
            body: mark,
        });
        out
    }
}

fn collect_anchor_rules(font: &Font, master: &Master) -> Result<AnchorRules, BuildError> {
    let mut mark_classes = Vec::new();
    let mut bases = Vec::new();
    let mut ligatures = Vec::new();
    let mut entries: BTreeMap<&str, (i16, i16)> = BTreeMap::new();
    let mut exits: BTreeMap<&str, (i16, i16)> = BTreeMap::new();

    for glyph in font.glyphs.iter().filter(|g| g.export) {
        let Some(layer) = glyph.layer(&master.id) else {
            continue;
        };
        let mut lig: BTreeMap<u32, Vec<MarkAnchor>> = BTreeMap::new();
        for anchor in &layer.anchors {
            let x: i16 = anchor.x.ot_round();
            let y: i16 = anchor.y.ot_round();
            match &anchor.kind {
                AnchorKind::Mark(class) => mark_classes.push(Directive::MarkClassDef(MarkAnchor {
                    glyph: glyph.name.clone(),
                    class: class.clone(),
                    x,
                    y,
                })),
                AnchorKind::Caret(_) => {}
                AnchorKind::Ligature { class, index } => {
                    lig.entry(*index).or_default().push(MarkAnchor {
                        glyph: glyph.name.clone(),
                        class: class.clone(),
                        x,
                        y,
                    });
                }
                AnchorKind::Entry => {
                    entries.insert(&glyph.name, (x, y));
                }
                AnchorKind::Exit => {
                    exits.insert(&glyph.name, (x, y));
                }
                AnchorKind::Base => bases.push(Directive::BaseMark(MarkAnchor {
                    glyph: glyph.name.clone(),
                    class: anchor.name.clone(),
                    x,
                    y,
                })),
            }
        }
        if !lig.is_empty() {
            ligatures.push(Directive::LigatureMarks {
                glyph: glyph.name.clone(),
                components: lig.into_iter().collect(),
            });
        }
    }

    // Cursive rules pair entry and exit per glyph, in glyph order.
    let cursive = font
        .glyphs
        .iter()
        .filter(|g| entries.contains_key(g.name.as_str()) || exits.contains_key(g.name.as_str()))
        .map(|g| Directive::Cursive {
            glyph: g.name.clone(),
            entry: entries.get(g.name.as_str()).copied(),
            exit: exits.get(g.name.as_str()).copied(),
        })
        .collect();

    Ok(AnchorRules {
        mark_classes,
        bases,
        ligatures,
        cursive,
    })
}

/// Kerning-group membership plus the kern feature: literal pairs first, then
/// enumerated mixed rules, then class pairs (zero-valued class pairs are
/// dropped).
fn kerning_rules(font: &Font, master: &Master) -> Vec<Directive> {
    let mut out = Vec::new();

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for glyph in &font.glyphs {
        if let Some(group) = &glyph.left_kerning_group {
            groups
                .entry(format!("MMK_R_{group}"))
                .or_default()
                .push(glyph.name.clone());
        }
        if let Some(group) = &glyph.right_kerning_group {
            groups
                .entry(format!("MMK_L_{group}"))
                .or_default()
                .push(glyph.name.clone());
        }
    }
    for (name, members) in groups {
        out.push(Directive::GroupDef { name, members });
    }

    let mut pairs = Vec::new();
    let mut enums = Vec::new();
    let mut classes = Vec::new();
    if let Some(kerning) = font.kerning_for(&master.id) {
        for (left, row) in kerning {
            for (right, value) in row {
                let value: i16 = value.ot_round();
                let left_is_class = left.starts_with('@');
                let right_is_class = right.starts_with('@');
                let rule = Directive::KernPair {
                    enumerated: left_is_class != right_is_class,
                    left: left.clone(),
                    right: right.clone(),
                    value,
                };
                if left_is_class && right_is_class {
                    if value != 0 {
                        classes.push(rule);
                    }
                } else if left_is_class || right_is_class {
                    enums.push(rule);
                } else {
                    pairs.push(rule);
                }
            }
        }
    }

    let mut body = vec![Directive::LookupFlag("IgnoreMarks")];
    body.extend(pairs);
    body.extend(enums);
    body.extend(classes);
    out.push(Directive::Feature {
        name: "kern".into(),
        labels: Vec::new(),
        body,
    });
    out
}

/// Partition exported glyphs into base/ligature/mark classes and collect
/// ligature carets.
fn gdef_table(font: &Font, master: &Master) -> Result<(Directive, BTreeSet<String>), BuildError> {
    let mut base = BTreeSet::new();
    let mut liga = BTreeSet::new();
    let mut mark = BTreeSet::new();
    let mut carets = Vec::new();

    for glyph in font.glyphs.iter().filter(|g| g.export) {
        match glyphdata::classify(glyph).category() {
            Some((Category::Mark, Some(SubCategory::Nonspacing))) => {
                mark.insert(glyph.name.clone());
            }
            Some((Category::Letter, Some(SubCategory::Ligature))) => {
                liga.insert(glyph.name.clone());
            }
            Some((Category::Letter, _)) => {
                base.insert(glyph.name.clone());
            }
            Some(_) => {}
            None => return Err(BuildError::Unclassified(glyph.name.clone())),
        }

        let Some(layer) = glyph.layer(&master.id) else {
            continue;
        };
        let mut glyph_carets: Vec<(u32, i16)> = Vec::new();
        for anchor in &layer.anchors {
            match &anchor.kind {
                AnchorKind::Mark(_) => {
                    // A mark attachment anchor makes this a mark glyph no
                    // matter what the category tables say.
                    base.remove(&glyph.name);
                    liga.remove(&glyph.name);
                    mark.insert(glyph.name.clone());
                }
                AnchorKind::Caret(index) => {
                    glyph_carets.push((*index, anchor.x.ot_round()));
                }
                _ => {}
            }
        }
        if !glyph_carets.is_empty() {
            glyph_carets.sort_unstable();
            carets.push((
                glyph.name.clone(),
                glyph_carets.into_iter().map(|(_, x)| x).collect(),
            ));
        }
    }

    let marks = mark.clone();
    Ok((
        Directive::GdefTable {
            base: base.into_iter().collect(),
            liga: liga.into_iter().collect(),
            mark: mark.into_iter().collect(),
            carets,
        },
        marks,
    ))
}

impl Directive {
    fn render(&self, out: &mut String) {
        match self {
            Directive::GroupDef { name, members } => {
                let _ = writeln!(out, "@{name} = [{}];", members.join(" "));
            }
            Directive::Raw(text) => {
                out.push_str(text);
                out.push('\n');
            }
            Directive::MarkClassDef(a) => {
                let _ = writeln!(
                    out,
                    "markClass {} <anchor {} {}> @mark_{};",
                    a.glyph, a.x, a.y, a.class
                );
            }
            Directive::BaseMark(a) => {
                let _ = writeln!(
                    out,
                    "pos base {} <anchor {} {}> mark @mark_{};",
                    a.glyph, a.x, a.y, a.class
                );
            }
            Directive::LigatureMarks { glyph, components } => {
                let _ = write!(out, "pos ligature {glyph}");
                for (index, anchors) in components {
                    if *index != 1 {
                        out.push_str(" ligComponent");
                    }
                    for a in anchors {
                        let _ = write!(out, " <anchor {} {}> mark @mark_{}", a.x, a.y, a.class);
                    }
                }
                out.push_str(";\n");
            }
            Directive::Cursive { glyph, entry, exit } => {
                let fmt = |a: &Option<(i16, i16)>| match a {
                    Some((x, y)) => format!("{x} {y}"),
                    None => "NULL".into(),
                };
                let _ = writeln!(
                    out,
                    "pos cursive {} <anchor {}> <anchor {}>;",
                    glyph,
                    fmt(entry),
                    fmt(exit)
                );
            }
            Directive::KernPair {
                enumerated,
                left,
                right,
                value,
            } => {
                let prefix = if *enumerated { "enum pos" } else { "pos" };
                let _ = writeln!(out, "{prefix} {left} {right} <{value} 0 {value} 0>;");
            }
            Directive::LookupFlag(flags) => {
                let _ = writeln!(out, "lookupflag {flags};");
            }
            Directive::Feature { name, labels, body } => {
                let _ = writeln!(out, "\nfeature {name} {{");
                if !labels.is_empty() {
                    out.push_str("featureNames {\n");
                    for (lang_id, label) in labels {
                        let _ = writeln!(out, "name 3 1 0x{lang_id:04X} \"{label}\";");
                    }
                    out.push_str("};\n");
                }
                for directive in body {
                    directive.render(out);
                }
                let _ = writeln!(out, "}} {name};");
            }
            Directive::GdefTable {
                base,
                liga,
                mark,
                carets,
            } => {
                // An empty class leaves its GlyphClassDef slot blank instead
                // of referencing an empty definition.
                out.push('\n');
                fn slot<'a>(
                    out: &mut String,
                    name: &'a str,
                    members: &[String],
                ) -> &'a str {
                    if members.is_empty() {
                        return "";
                    }
                    let _ = writeln!(out, "{name} = [{}];", members.join(" "));
                    name
                }
                let base_slot = slot(out, "@BASE", base);
                let liga_slot = slot(out, "@LIGA", liga);
                let mark_slot = slot(out, "@MARK", mark);
                out.push_str("table GDEF {\n");
                let _ = writeln!(
                    out,
                    " GlyphClassDef {base_slot}, {liga_slot}, {mark_slot}, ;"
                );
                for (glyph, positions) in carets {
                    let _ = write!(out, "LigatureCaretByPos {glyph}");
                    for x in positions {
                        let _ = write!(out, " {x}");
                    }
                    out.push_str(";\n");
                }
                out.push_str("} GDEF;\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::propagate_anchors;

    fn load(value: serde_json::Value) -> Font {
        let mut font: Font = serde_json::from_value(value).unwrap();
        for glyph in &mut font.glyphs {
            for layer in &mut glyph.layers {
                for anchor in &mut layer.anchors {
                    anchor.kind = AnchorKind::parse(&anchor.name).unwrap();
                }
            }
        }
        font
    }

    fn base_font(glyphs: serde_json::Value, extra: serde_json::Value) -> Font {
        let mut value = serde_json::json!({
            "family_name": "Test",
            "units_per_em": 1000,
            "date": 1577836800,
            "glyphs": glyphs,
            "masters": [{
                "id": "m1", "ascender": 800, "descender": -200,
                "x_height": 500, "cap_height": 700
            }],
            "instances": [{
                "name": "Regular", "family_name": "Test",
                "full_name": "Test Regular", "font_name": "Test-Regular"
            }],
            "features": [{"name": "mark"}, {"name": "kern"}]
        });
        if let (Some(obj), Some(add)) = (value.as_object_mut(), extra.as_object()) {
            for (k, v) in add {
                obj.insert(k.clone(), v.clone());
            }
        }
        load(value)
    }

    fn generate_fea(font: &Font) -> String {
        let master = font.masters[0].clone();
        let (fea, _) = generate(font, &master, "1.000", &[]).unwrap();
        fea
    }

    #[test]
    fn kerning_rule_partition() {
        let font = base_font(
            serde_json::json!([
                {"name": "alef-ar", "layers": [{"master": "m1", "width": 300.0}]},
                {"name": "beh-ar", "layers": [{"master": "m1", "width": 400.0}]}
            ]),
            serde_json::json!({
                "kerning": {"m1": {
                    "alef-ar": {"beh-ar": -30.0},
                    "@MMK_L_x": {"@MMK_R_y": 40.0, "@MMK_R_zero": 0.0, "beh-ar": -10.0}
                }}
            }),
        );
        let fea = generate_fea(&font);
        assert!(fea.contains("pos alef-ar beh-ar <-30 0 -30 0>;"));
        assert!(fea.contains("enum pos @MMK_L_x beh-ar <-10 0 -10 0>;"));
        assert!(fea.contains("pos @MMK_L_x @MMK_R_y <40 0 40 0>;"));
        // Zero-valued class pairs disappear entirely.
        assert!(!fea.contains("@MMK_R_zero"));
    }

    #[test]
    fn kerning_groups_precede_rules() {
        let font = base_font(
            serde_json::json!([
                {"name": "alef-ar", "left_kerning_group": "alef",
                 "layers": [{"master": "m1", "width": 300.0}]},
                {"name": "beh-ar", "right_kerning_group": "beh",
                 "layers": [{"master": "m1", "width": 400.0}]}
            ]),
            serde_json::json!({}),
        );
        let fea = generate_fea(&font);
        assert!(fea.contains("@MMK_R_alef = [alef-ar];"));
        assert!(fea.contains("@MMK_L_beh = [beh-ar];"));
        // Membership declarations come ahead of the generated rule block.
        let groups_at = fea.find("@MMK_R_alef").unwrap();
        let generated_kern_at = fea.rfind("feature kern").unwrap();
        assert!(groups_at < generated_kern_at);
    }

    #[test]
    fn ligature_anchor_grouping() {
        let font = base_font(
            serde_json::json!([
                {"name": "lam-ar_alef-ar", "layers": [{"master": "m1", "width": 700.0,
                    "anchors": [
                        {"name": "top_2", "x": 500.0, "y": 800.0},
                        {"name": "top_1", "x": 100.0, "y": 800.0}
                    ]}]}
            ]),
            serde_json::json!({}),
        );
        let fea = generate_fea(&font);
        // One rule, components ascending, only the second flagged.
        assert!(fea.contains(
            "pos ligature lam-ar_alef-ar <anchor 100 800> mark @mark_top \
             ligComponent <anchor 500 800> mark @mark_top;"
        ));
    }

    #[test]
    fn mark_and_cursive_rules() {
        let font = base_font(
            serde_json::json!([
                {"name": "fatha-ar", "layers": [{"master": "m1", "width": 0.0,
                    "anchors": [{"name": "_top", "x": 50.0, "y": 60.5}]}]},
                {"name": "beh-ar", "layers": [{"master": "m1", "width": 400.0,
                    "anchors": [
                        {"name": "top", "x": 200.0, "y": 700.0},
                        {"name": "exit", "x": 0.0, "y": 100.0}
                    ]}]},
                {"name": "alef-ar", "layers": [{"master": "m1", "width": 300.0,
                    "anchors": [{"name": "entry", "x": 290.0, "y": 100.0}]}]}
            ]),
            serde_json::json!({}),
        );
        let fea = generate_fea(&font);
        assert!(fea.contains("markClass fatha-ar <anchor 50 61> @mark_top;"));
        assert!(fea.contains("pos base beh-ar <anchor 200 700> mark @mark_top;"));
        assert!(fea.contains("pos cursive beh-ar <anchor NULL> <anchor 0 100>;"));
        assert!(fea.contains("pos cursive alef-ar <anchor 290 100> <anchor NULL>;"));
        assert!(fea.contains("lookupflag IgnoreMarks RightToLeft;"));
    }

    #[test]
    fn gdef_partition_and_carets() {
        let font = base_font(
            serde_json::json!([
                {"name": "beh-ar", "layers": [{"master": "m1", "width": 400.0}]},
                {"name": "lam-ar_alef-ar", "layers": [{"master": "m1", "width": 700.0,
                    "anchors": [
                        {"name": "caret_2", "x": 420.0, "y": 0.0},
                        {"name": "caret_1", "x": 180.0, "y": 0.0}
                    ]}]},
                {"name": "fatha-ar", "layers": [{"master": "m1", "width": 0.0,
                    "anchors": [{"name": "_top", "x": 50.0, "y": 60.0}]}]}
            ]),
            serde_json::json!({}),
        );
        let fea = generate_fea(&font);
        assert!(fea.contains("@BASE = [beh-ar];"));
        assert!(fea.contains("@LIGA = [lam-ar_alef-ar];"));
        assert!(fea.contains("@MARK = [fatha-ar];"));
        // Carets ordered by index regardless of anchor order.
        assert!(fea.contains("LigatureCaretByPos lam-ar_alef-ar 180 420;"));
    }

    #[test]
    fn unclassifiable_exported_glyph_fails() {
        let font = base_font(
            serde_json::json!([
                {"name": "xx#bad", "layers": [{"master": "m1", "width": 100.0}]}
            ]),
            serde_json::json!({}),
        );
        let master = font.masters[0].clone();
        let err = generate(&font, &master, "1.000", &[]).unwrap_err();
        assert!(matches!(err, BuildError::Unclassified(name) if name == "xx#bad"));
    }

    #[test]
    fn token_expansion() {
        let font = base_font(serde_json::json!([]), serde_json::json!({}));
        let expanded =
            expand_tokens("pos x y $[ascender]; # $[version]", &font, "2.000").unwrap();
        assert_eq!(expanded, "pos x y 800; # 2.000");
        assert!(matches!(
            expand_tokens("$[nope]", &font, "1.0"),
            Err(BuildError::UnknownToken(_))
        ));
    }

    #[test]
    fn derived_class_synthesizes_missing_glyphs() {
        let mut font = base_font(
            serde_json::json!([
                {"name": "one", "layers": [{"master": "m1", "width": 500.0}]},
                {"name": "two", "layers": [{"master": "m1", "width": 500.0}]},
                {"name": "one.numr", "layers": [{"master": "m1", "width": 300.0}]}
            ]),
            serde_json::json!({
                "classes": [
                    {"name": "figures", "code": "one two"},
                    {"name": "numerators", "derive": {
                        "from": "figures", "replace": "", "with": ".numr"
                    }}
                ]
            }),
        );
        let classes = expand_classes(&mut font, "1.000").unwrap();
        assert_eq!(classes[1].members, vec!["one.numr", "two.numr"]);
        // "two.numr" did not exist and was synthesized as Temporary.
        let synthesized = font.glyph("two.numr").unwrap();
        assert_eq!(synthesized.category, Some(Category::Temporary));
        assert_eq!(synthesized.layers[0].width, 600.0);
    }

    #[test]
    fn propagated_mark_anchor_reclassifies_composite() {
        let mut font = base_font(
            serde_json::json!([
                {"name": "fatha-ar", "layers": [{"master": "m1", "width": 0.0,
                    "anchors": [{"name": "_top", "x": 50.0, "y": 60.0}]}]},
                {"name": "shadda-ar", "layers": [{"master": "m1", "width": 0.0,
                    "components": [{"reference": "fatha-ar"}]}]}
            ]),
            serde_json::json!({}),
        );
        propagate_anchors(&mut font).unwrap();
        let master = font.masters[0].clone();
        let (_, marks) = generate(&font, &master, "1.000", &[]).unwrap();
        assert!(marks.contains("shadda-ar"));
    }
}
