//! Anchor propagation.
//!
//! Composite glyphs inherit the anchors of the glyphs they reference, with
//! each anchor position pushed through the component's placement transform.
//! Anchors already present on the composite shadow inherited ones by name,
//! and cursive `entry`/`exit` points never propagate. Mark-attachment anchors
//! (leading `_`) do propagate: a composite that contains a mark must present
//! the mark's attachment point itself.
//!
//! Propagation is two-phase: every synthesized anchor is computed against the
//! unmodified glyph table first, then applied, so traversal order cannot
//! observe partially updated layers.

use std::collections::HashMap;

use kurbo::Point;

use crate::error::BuildError;
use crate::source::{Anchor, AnchorKind, Font};

pub fn propagate_anchors(font: &mut Font) -> Result<(), BuildError> {
    let mut memo = HashMap::new();
    let mut additions: Vec<(String, String, Vec<Anchor>)> = Vec::new();

    for glyph in font.glyphs.iter().filter(|g| g.export) {
        for layer in &glyph.layers {
            let effective =
                effective_anchors(font, &glyph.name, &layer.master, &mut memo, &mut Vec::new())?;
            let extra: Vec<Anchor> = effective
                .into_iter()
                .filter(|a| layer.anchor(&a.name).is_none())
                .collect();
            if !extra.is_empty() {
                additions.push((glyph.name.clone(), layer.master.clone(), extra));
            }
        }
    }

    for (glyph_name, master, extra) in additions {
        let layer = font
            .glyph_mut(&glyph_name)
            .and_then(|g| g.layer_mut(&master))
            .expect("computed against the same table");
        log::debug!("glyph '{glyph_name}': {} propagated anchors", extra.len());
        layer.anchors.extend(extra);
    }
    Ok(())
}

/// The anchors a layer exposes: its own, plus those inherited from its
/// component tree. Own anchors come first and shadow inherited names.
fn effective_anchors(
    font: &Font,
    glyph_name: &str,
    master_id: &str,
    memo: &mut HashMap<(String, String), Vec<Anchor>>,
    visiting: &mut Vec<String>,
) -> Result<Vec<Anchor>, BuildError> {
    let key = (glyph_name.to_owned(), master_id.to_owned());
    if let Some(hit) = memo.get(&key) {
        return Ok(hit.clone());
    }
    if visiting.iter().any(|name| name == glyph_name) {
        return Err(BuildError::ComponentCycle(glyph_name.into()));
    }

    let glyph = font
        .glyph(glyph_name)
        .expect("checked by the caller before recursing");
    let Some(layer) = glyph.layer(master_id) else {
        return Ok(Vec::new());
    };

    let mut anchors = layer.anchors.clone();
    visiting.push(glyph_name.to_owned());
    for component in &layer.components {
        if font.glyph(&component.reference).is_none() {
            return Err(BuildError::UnknownGlyph {
                target: component.reference.clone(),
                referenced_by: glyph_name.into(),
            });
        }
        let inherited =
            effective_anchors(font, &component.reference, master_id, memo, visiting)?;
        for anchor in inherited {
            if matches!(anchor.kind, AnchorKind::Entry | AnchorKind::Exit) {
                continue;
            }
            if anchors.iter().any(|a| a.name == anchor.name) {
                continue;
            }
            let mut anchor = anchor;
            if !component.is_identity() {
                let pos = component.affine() * Point::new(anchor.x, anchor.y);
                anchor.x = pos.x;
                anchor.y = pos.y;
            }
            anchors.push(anchor);
        }
    }
    visiting.pop();

    memo.insert(key, anchors.clone());
    Ok(anchors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_font(glyphs: serde_json::Value) -> Font {
        let mut font: Font = serde_json::from_value(serde_json::json!({
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
            }]
        }))
        .unwrap();
        for glyph in &mut font.glyphs {
            for layer in &mut glyph.layers {
                for anchor in &mut layer.anchors {
                    anchor.kind = AnchorKind::parse(&anchor.name).unwrap();
                }
            }
        }
        font
    }

    fn anchor(layer_glyph: &Font, glyph: &str, name: &str) -> Option<(f64, f64)> {
        let layer = layer_glyph.glyph(glyph).unwrap().layer("m1").unwrap();
        layer.anchor(name).map(|a| (a.x, a.y))
    }

    #[test]
    fn transform_aware_propagation() {
        let mut font = test_font(serde_json::json!([
            {"name": "beh-ar", "layers": [{"master": "m1", "width": 400.0,
                "anchors": [{"name": "top", "x": 100.0, "y": 200.0},
                            {"name": "entry", "x": 0.0, "y": 0.0}]}]},
            {"name": "beh-ar.init", "layers": [{"master": "m1", "width": 400.0,
                "components": [{"reference": "beh-ar",
                                "transform": [2.0, 0.0, 0.0, 3.0, 10.0, 20.0]}]}]}
        ]));
        propagate_anchors(&mut font).unwrap();
        // (100 * 2 + 10, 200 * 3 + 20), never the untransformed position
        assert_eq!(anchor(&font, "beh-ar.init", "top"), Some((210.0, 620.0)));
        // entry/exit stay on the component
        assert_eq!(anchor(&font, "beh-ar.init", "entry"), None);
    }

    #[test]
    fn existing_anchors_shadow_inherited() {
        let mut font = test_font(serde_json::json!([
            {"name": "beh-ar", "layers": [{"master": "m1", "width": 400.0,
                "anchors": [{"name": "top", "x": 100.0, "y": 200.0}]}]},
            {"name": "beh-ar.fina", "layers": [{"master": "m1", "width": 400.0,
                "anchors": [{"name": "top", "x": 7.0, "y": 8.0}],
                "components": [{"reference": "beh-ar"}]}]}
        ]));
        propagate_anchors(&mut font).unwrap();
        assert_eq!(anchor(&font, "beh-ar.fina", "top"), Some((7.0, 8.0)));
    }

    #[test]
    fn mark_anchors_do_propagate() {
        let mut font = test_font(serde_json::json!([
            {"name": "fatha-ar", "layers": [{"master": "m1", "width": 0.0,
                "anchors": [{"name": "_top", "x": 50.0, "y": 60.0}]}]},
            {"name": "behFatha-ar", "layers": [{"master": "m1", "width": 400.0,
                "components": [{"reference": "fatha-ar",
                                "transform": [1.0, 0.0, 0.0, 1.0, 30.0, 0.0]}]}]}
        ]));
        propagate_anchors(&mut font).unwrap();
        assert_eq!(anchor(&font, "behFatha-ar", "_top"), Some((80.0, 60.0)));
    }

    #[test]
    fn cycles_are_detected() {
        let mut font = test_font(serde_json::json!([
            {"name": "a", "layers": [{"master": "m1", "width": 100.0,
                "components": [{"reference": "b"}]}]},
            {"name": "b", "layers": [{"master": "m1", "width": 100.0,
                "components": [{"reference": "a"}]}]}
        ]));
        let err = propagate_anchors(&mut font).unwrap_err();
        assert!(matches!(err, BuildError::ComponentCycle(_)));
    }
}
