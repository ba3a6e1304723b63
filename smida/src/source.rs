//! The typed design-source document.
//!
//! The design tool's document model is an external collaborator; its on-disk
//! form here is a JSON document deserialized into the structs below. Glyph
//! outlines, anchors, kerning and feature text all arrive through this module,
//! and nothing downstream touches serde again.
//!
//! Anchor names carry semantics in their lexical form (`_top`, `caret_2`,
//! `top_1`, `entry`, `exit`); they are parsed once at load time into
//! [`AnchorKind`] so later stages match on an enum instead of re-splitting
//! strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::BuildError;

/// Pair-kerning values for one design source, `(left, right) -> value`.
///
/// Keys starting with `@` name kerning classes, anything else is a glyph
/// name.
pub type Kerning = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Clone, Debug, Deserialize)]
pub struct Font {
    pub family_name: String,
    pub units_per_em: u16,
    /// Source modification date, seconds since the unix epoch.
    pub date: i64,
    pub copyright: Option<String>,
    pub designer: Option<String>,
    pub designer_url: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturer_url: Option<String>,
    pub vendor_id: Option<String>,
    pub description: Option<Text>,
    pub license: Option<Text>,
    pub license_url: Option<String>,
    pub sample_text: Option<Text>,
    #[serde(default)]
    pub use_typo_metrics: bool,
    /// Set bit positions for OS/2 `fsType`.
    #[serde(default)]
    pub fs_type: Vec<u32>,
    /// Set bit positions for OS/2 `ulUnicodeRange1`.
    #[serde(default)]
    pub unicode_ranges: Vec<u32>,
    /// Windows codepage numbers (1256, 1252, ...) for OS/2 `ulCodePageRange1`.
    #[serde(default)]
    pub code_page_ranges: Vec<u32>,
    pub glyphs: Vec<Glyph>,
    pub masters: Vec<Master>,
    pub instances: Vec<Instance>,
    /// Kerning tables keyed by master id.
    #[serde(default)]
    pub kerning: BTreeMap<String, Kerning>,
    #[serde(default)]
    pub classes: Vec<GlyphClass>,
    #[serde(default)]
    pub feature_prefixes: Vec<FeatureBlock>,
    #[serde(default)]
    pub features: Vec<FeatureBlock>,
    /// Final glyph order, assigned by the preparation pass.
    #[serde(skip)]
    pub glyph_order: Vec<String>,
}

/// A string that may carry localized variants keyed by language tag.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Text {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl Text {
    /// The default rendition: the plain string, or the English variant, or
    /// the first variant in key order.
    pub fn default_text(&self) -> Option<&str> {
        match self {
            Text::Plain(s) => Some(s),
            Text::Localized(map) => map
                .get("en")
                .or_else(|| map.values().next())
                .map(String::as_str),
        }
    }

    /// Localized variants other than the default, `(language tag, text)`.
    pub fn localized(&self) -> impl Iterator<Item = (&str, &str)> {
        let map = match self {
            Text::Plain(_) => None,
            Text::Localized(map) => Some(map),
        };
        map.into_iter()
            .flatten()
            .filter(|(lang, _)| *lang != "en")
            .map(|(lang, text)| (lang.as_str(), text.as_str()))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Glyph {
    pub name: String,
    #[serde(default = "yes")]
    pub export: bool,
    /// Explicit category override; the built-in glyph data is the fallback.
    pub category: Option<Category>,
    pub sub_category: Option<SubCategory>,
    #[serde(default)]
    pub unicodes: Vec<u32>,
    pub left_kerning_group: Option<String>,
    pub right_kerning_group: Option<String>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

fn yes() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum Category {
    Letter,
    Mark,
    Number,
    Punctuation,
    Separator,
    Symbol,
    Placeholder,
    Temporary,
    Other,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum SubCategory {
    Nonspacing,
    Spacing,
    Ligature,
    Space,
    Other,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Layer {
    /// Id of the master this outline belongs to.
    pub master: String,
    pub width: f64,
    #[serde(default)]
    pub paths: Vec<Contour>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
}

impl Layer {
    pub fn anchor(&self, name: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.name == name)
    }
}

/// One contour: nodes in drawing order, the first node being the start point.
#[derive(Clone, Debug, Deserialize)]
pub struct Contour {
    #[serde(default = "yes")]
    pub closed: bool,
    pub nodes: Vec<Node>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Node {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub smooth: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Line,
    /// On-curve point ending a cubic segment.
    Curve,
    /// On-curve point ending a quadratic segment.
    QCurve,
    #[serde(rename = "offcurve")]
    OffCurve,
}

impl Node {
    pub fn is_on_curve(&self) -> bool {
        self.node_type != NodeType::OffCurve
    }
}

/// A placed reference to another glyph's outline.
#[derive(Clone, Debug, Deserialize)]
pub struct Component {
    pub reference: String,
    /// `[xx, xy, yx, yy, dx, dy]`; identity when omitted.
    #[serde(default = "identity")]
    pub transform: [f64; 6],
}

fn identity() -> [f64; 6] {
    [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
}

impl Component {
    pub fn is_identity(&self) -> bool {
        self.transform == identity()
    }

    pub fn affine(&self) -> kurbo::Affine {
        kurbo::Affine::new(self.transform)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Anchor {
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    pub kind: AnchorKind,
}

/// The parsed meaning of an anchor name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AnchorKind {
    /// A plain base-attachment anchor (`top`, `bottom`, ...).
    #[default]
    Base,
    /// `_name`: the attachment point a mark glyph presents.
    Mark(String),
    /// `caret_N`: a ligature caret position.
    Caret(u32),
    /// `name_N`: mark attachment for ligature component `N`.
    Ligature { class: String, index: u32 },
    /// Cursive-attachment entry point.
    Entry,
    /// Cursive-attachment exit point.
    Exit,
}

impl AnchorKind {
    /// Classify an anchor name. `Err(())` means the name is malformed (the
    /// caller attaches glyph context).
    pub fn parse(name: &str) -> Result<AnchorKind, ()> {
        if let Some(rest) = name.strip_prefix('_') {
            if rest.is_empty() || rest.contains('_') {
                return Err(());
            }
            return Ok(AnchorKind::Mark(rest.into()));
        }
        match name {
            "entry" => return Ok(AnchorKind::Entry),
            "exit" => return Ok(AnchorKind::Exit),
            _ => {}
        }
        match name.split_once('_') {
            None => Ok(AnchorKind::Base),
            Some((base, index)) => {
                if base.is_empty() || index.contains('_') {
                    return Err(());
                }
                let index: u32 = index.parse().map_err(|_| ())?;
                if base == "caret" {
                    Ok(AnchorKind::Caret(index))
                } else {
                    Ok(AnchorKind::Ligature {
                        class: base.into(),
                        index,
                    })
                }
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Master {
    pub id: String,
    pub ascender: i16,
    pub descender: i16,
    pub x_height: i16,
    pub cap_height: i16,
    pub typo_line_gap: Option<i16>,
    pub underline_thickness: Option<i16>,
    pub underline_position: Option<i16>,
    pub italic_angle: Option<f64>,
    #[serde(default)]
    pub horizontal_stems: Vec<f64>,
    #[serde(default)]
    pub vertical_stems: Vec<f64>,
    #[serde(default)]
    pub alignment_zones: Vec<AlignmentZone>,
}

impl Master {
    pub fn typo_line_gap(&self) -> Result<i16, BuildError> {
        self.typo_line_gap
            .ok_or(BuildError::MissingField("typo_line_gap"))
    }

    pub fn underline_thickness(&self) -> Result<i16, BuildError> {
        self.underline_thickness
            .ok_or(BuildError::MissingField("underline_thickness"))
    }

    pub fn underline_position(&self) -> Result<i16, BuildError> {
        self.underline_position
            .ok_or(BuildError::MissingField("underline_position"))
    }

    pub fn horizontal_stems(&self) -> Result<&[f64], BuildError> {
        if self.horizontal_stems.is_empty() {
            return Err(BuildError::MissingField("horizontal_stems"));
        }
        Ok(&self.horizontal_stems)
    }

    pub fn vertical_stems(&self) -> Result<&[f64], BuildError> {
        if self.vertical_stems.is_empty() {
            return Err(BuildError::MissingField("vertical_stems"));
        }
        Ok(&self.vertical_stems)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct AlignmentZone {
    pub position: f64,
    pub size: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Instance {
    pub name: String,
    pub family_name: String,
    pub full_name: String,
    /// PostScript font name.
    pub font_name: String,
    #[serde(default)]
    pub is_italic: bool,
    #[serde(default)]
    pub is_bold: bool,
}

/// A feature-authoring glyph class: a literal member list, a pattern over all
/// glyph names, or a derivation from another class by suffix substitution.
#[derive(Clone, Debug, Deserialize)]
pub struct GlyphClass {
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    /// Space-separated literal member list.
    pub code: Option<String>,
    /// Regex matched against every glyph name.
    pub pattern: Option<String>,
    pub derive: Option<DeriveClass>,
}

/// `from` members with `replace` swapped for `with`; missing targets are
/// synthesized as zero-outline placeholder glyphs.
#[derive(Clone, Debug, Deserialize)]
pub struct DeriveClass {
    pub from: String,
    pub replace: String,
    pub with: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FeatureBlock {
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// A localized display name for a feature.
#[derive(Clone, Debug, Deserialize)]
pub struct Label {
    pub language: String,
    pub value: String,
}

impl Font {
    pub fn load(path: &Path) -> Result<Font, BuildError> {
        let text = fs::read_to_string(path)?;
        let mut font: Font = serde_json::from_str(&text)?;
        font.parse_anchors()?;
        log::debug!(
            "loaded '{}': {} glyphs, {} masters",
            font.family_name,
            font.glyphs.len(),
            font.masters.len()
        );
        Ok(font)
    }

    /// Resolve every anchor name into its [`AnchorKind`]. Runs once, right
    /// after deserialization.
    fn parse_anchors(&mut self) -> Result<(), BuildError> {
        for glyph in &mut self.glyphs {
            for layer in &mut glyph.layers {
                for anchor in &mut layer.anchors {
                    anchor.kind = AnchorKind::parse(&anchor.name).map_err(|()| {
                        BuildError::BadAnchorName {
                            glyph: glyph.name.clone(),
                            anchor: anchor.name.clone(),
                        }
                    })?;
                }
            }
        }
        Ok(())
    }

    pub fn glyph(&self, name: &str) -> Option<&Glyph> {
        self.glyphs.iter().find(|g| g.name == name)
    }

    pub fn glyph_mut(&mut self, name: &str) -> Option<&mut Glyph> {
        self.glyphs.iter_mut().find(|g| g.name == name)
    }

    pub fn first_master(&self) -> Result<&Master, BuildError> {
        self.masters.first().ok_or(BuildError::MissingField("masters"))
    }

    pub fn first_instance(&self) -> Result<&Instance, BuildError> {
        self.instances
            .first()
            .ok_or(BuildError::MissingField("instances"))
    }

    pub fn copyright(&self) -> Result<&str, BuildError> {
        self.copyright
            .as_deref()
            .ok_or(BuildError::MissingField("copyright"))
    }

    pub fn vendor_id(&self) -> Result<&str, BuildError> {
        self.vendor_id
            .as_deref()
            .ok_or(BuildError::MissingField("vendor_id"))
    }

    pub fn kerning_for(&self, master_id: &str) -> Option<&Kerning> {
        self.kerning.get(master_id)
    }
}

impl Glyph {
    /// The outline for one master, falling back to the first layer the way
    /// the design tool does.
    pub fn layer(&self, master_id: &str) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|l| l.master == master_id)
            .or_else(|| self.layers.first())
    }

    pub fn layer_mut(&mut self, master_id: &str) -> Option<&mut Layer> {
        if self.layers.iter().any(|l| l.master == master_id) {
            self.layers.iter_mut().find(|l| l.master == master_id)
        } else {
            self.layers.first_mut()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_kinds() {
        assert_eq!(AnchorKind::parse("top"), Ok(AnchorKind::Base));
        assert_eq!(
            AnchorKind::parse("_top"),
            Ok(AnchorKind::Mark("top".into()))
        );
        assert_eq!(AnchorKind::parse("entry"), Ok(AnchorKind::Entry));
        assert_eq!(AnchorKind::parse("exit"), Ok(AnchorKind::Exit));
        assert_eq!(AnchorKind::parse("caret_2"), Ok(AnchorKind::Caret(2)));
        assert_eq!(
            AnchorKind::parse("top_1"),
            Ok(AnchorKind::Ligature {
                class: "top".into(),
                index: 1
            })
        );
    }

    #[test]
    fn malformed_anchor_names() {
        assert!(AnchorKind::parse("top_x").is_err());
        assert!(AnchorKind::parse("top_1_2").is_err());
        assert!(AnchorKind::parse("caret_").is_err());
        assert!(AnchorKind::parse("_").is_err());
        assert!(AnchorKind::parse("_a_b").is_err());
    }

    #[test]
    fn layer_falls_back_to_first() {
        let glyph: Glyph = serde_json::from_value(serde_json::json!({
            "name": "alef-ar",
            "layers": [{"master": "m1", "width": 100.0}]
        }))
        .unwrap();
        assert_eq!(glyph.layer("m1").unwrap().width, 100.0);
        assert_eq!(glyph.layer("nope").unwrap().width, 100.0);
    }

    #[test]
    fn localized_text() {
        let text: Text = serde_json::from_value(serde_json::json!({
            "en": "Free license",
            "ar": "رخصة حرة"
        }))
        .unwrap();
        assert_eq!(text.default_text(), Some("Free license"));
        let other: Vec<_> = text.localized().collect();
        assert_eq!(other, vec![("ar", "رخصة حرة")]);
    }
}
