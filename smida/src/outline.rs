//! Component resolution: turning a layer into concrete contours.
//!
//! Components resolve recursively, post-order: a referenced glyph's outline
//! is resolved first, then drawn through the caller's transform. Mirroring
//! transforms (negative determinant) reverse the contour winding on the way
//! through, so the boolean union downstream sees consistent directions.
//!
//! TrueType builds get a second mode: a composite glyph with no contours of
//! its own, referencing only leaf glyphs (possibly through further
//! contour-less composites), keeps its composite representation instead of
//! being decomposed into points. One contour anywhere in the chain forces
//! full decomposition.

use kurbo::{Affine, BezPath, PathEl};
use crate::pens::{BezPathPen, Pen, ReverseContourPen, TransformPen};

use crate::error::BuildError;
use crate::source::{Contour, Font, Layer, Node, NodeType};

/// Replay a finished path into a pen.
pub fn replay(path: &BezPath, pen: &mut impl Pen) {
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => pen.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => pen.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => pen.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c0, c1, p) => pen.curve_to(
                c0.x as f32,
                c0.y as f32,
                c1.x as f32,
                c1.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => pen.close(),
        }
    }
}

/// Draw one contour into a pen. Returns a description of the problem if the
/// contour breaks drawing rules; the caller attaches the glyph name.
pub fn draw_contour(contour: &Contour, pen: &mut impl Pen) -> Result<(), String> {
    if contour.nodes.is_empty() {
        return Ok(());
    }
    if !contour.closed {
        return draw_open(contour, pen);
    }

    // Rotate so the contour starts on an on-curve point.
    let start = contour
        .nodes
        .iter()
        .position(Node::is_on_curve)
        .ok_or("closed contour has no on-curve points")?;
    let nodes: Vec<&Node> = contour.nodes[start..]
        .iter()
        .chain(&contour.nodes[..start])
        .collect();

    let first = nodes[0];
    pen.move_to(first.x as f32, first.y as f32);
    let mut pending: Vec<&Node> = Vec::new();
    for &node in &nodes[1..] {
        if !node.is_on_curve() {
            pending.push(node);
            continue;
        }
        emit_segment(&pending, node, pen)?;
        pending.clear();
    }
    // The start node's type describes the closing segment; a plain closing
    // line is implied by close() itself.
    if !(pending.is_empty() && first.node_type == NodeType::Line) {
        emit_segment(&pending, first, pen)?;
    }
    pen.close();
    Ok(())
}

fn draw_open(contour: &Contour, pen: &mut impl Pen) -> Result<(), String> {
    let first = &contour.nodes[0];
    if !first.is_on_curve() {
        return Err("open contour starts with an off-curve point".into());
    }
    pen.move_to(first.x as f32, first.y as f32);
    let mut pending: Vec<&Node> = Vec::new();
    for node in &contour.nodes[1..] {
        if !node.is_on_curve() {
            pending.push(node);
            continue;
        }
        emit_segment(&pending, node, pen)?;
        pending.clear();
    }
    if !pending.is_empty() {
        return Err("open contour ends with off-curve points".into());
    }
    Ok(())
}

fn emit_segment(pending: &[&Node], target: &Node, pen: &mut impl Pen) -> Result<(), String> {
    let (x, y) = (target.x as f32, target.y as f32);
    match (target.node_type, pending) {
        (NodeType::Line | NodeType::Curve | NodeType::QCurve, []) => pen.line_to(x, y),
        (NodeType::Curve, [c0, c1]) => pen.curve_to(
            c0.x as f32,
            c0.y as f32,
            c1.x as f32,
            c1.y as f32,
            x,
            y,
        ),
        (NodeType::QCurve, offs) => {
            // TrueType-style runs of off-curves have implied on-curve
            // midpoints between them.
            for pair in offs.windows(2) {
                let mid_x = (pair[0].x + pair[1].x) / 2.0;
                let mid_y = (pair[0].y + pair[1].y) / 2.0;
                pen.quad_to(pair[0].x as f32, pair[0].y as f32, mid_x as f32, mid_y as f32);
            }
            let last = offs.last().unwrap();
            pen.quad_to(last.x as f32, last.y as f32, x, y);
        }
        (NodeType::Line, _) => return Err("line segment preceded by off-curve points".into()),
        (NodeType::Curve, _) => {
            return Err("cubic segment without exactly two off-curve points".into())
        }
        (NodeType::OffCurve, _) => unreachable!("caller only passes on-curve targets"),
    }
    Ok(())
}

/// Draw a layer's own contours (no components) into a pen.
pub fn draw_layer_paths(layer: &Layer, pen: &mut impl Pen) -> Result<(), String> {
    for contour in &layer.paths {
        draw_contour(contour, pen)?;
    }
    Ok(())
}

/// Fully decompose a glyph's layer for one master: recursively resolve every
/// component into concrete contours, applying transforms and reversing
/// winding under mirroring transforms.
pub fn resolve_outline(
    font: &Font,
    glyph_name: &str,
    master_id: &str,
) -> Result<BezPath, BuildError> {
    resolve_into(font, glyph_name, master_id, &mut Vec::new())
}

fn resolve_into(
    font: &Font,
    glyph_name: &str,
    master_id: &str,
    visiting: &mut Vec<String>,
) -> Result<BezPath, BuildError> {
    if visiting.iter().any(|name| name == glyph_name) {
        return Err(BuildError::ComponentCycle(glyph_name.into()));
    }
    let glyph = font.glyph(glyph_name).ok_or_else(|| BuildError::UnknownGlyph {
        target: glyph_name.into(),
        referenced_by: visiting.last().cloned().unwrap_or_default(),
    })?;
    let Some(layer) = glyph.layer(master_id) else {
        return Ok(BezPath::new());
    };

    let mut pen = BezPathPen::new();
    draw_layer_paths(layer, &mut pen).map_err(|detail| BuildError::MalformedOutline {
        glyph: glyph_name.into(),
        detail,
    })?;
    let mut path = pen.into_inner();

    visiting.push(glyph_name.to_owned());
    for component in &layer.components {
        let sub = resolve_into(font, &component.reference, master_id, visiting)?;
        if component.is_identity() {
            extend(&mut path, &sub);
            continue;
        }
        let affine = component.affine();
        let mut sink = BezPathPen::new();
        let mut transformed = TransformPen::new(&mut sink, affine);
        if affine.determinant() < 0.0 {
            let mut reversed = ReverseContourPen::new(&mut transformed);
            replay(&sub, &mut reversed);
            reversed.flush().map_err(|err| BuildError::Geometry {
                glyph: glyph_name.into(),
                detail: format!("cannot reverse mirrored component: {err:?}"),
            })?;
        } else {
            replay(&sub, &mut transformed);
        }
        extend(&mut path, &sink.into_inner());
    }
    visiting.pop();
    Ok(path)
}

fn extend(path: &mut BezPath, other: &BezPath) {
    for el in other.elements() {
        path.push(*el);
    }
}

/// A flattened component reference: a leaf glyph and the composed transform
/// placing it.
#[derive(Clone, Debug)]
pub struct FlatComponent {
    pub glyph: String,
    pub transform: Affine,
}

/// Flatten a contour-less composite into direct leaf references, composing
/// transforms through intermediate contour-less composites. Returns `None`
/// when any referenced glyph mixes contours and components, in which case the
/// caller must fall back to full decomposition.
pub fn flatten_components(
    font: &Font,
    glyph_name: &str,
    master_id: &str,
) -> Result<Option<Vec<FlatComponent>>, BuildError> {
    let mut flat = Vec::new();
    let done = flatten_into(
        font,
        glyph_name,
        master_id,
        Affine::IDENTITY,
        &mut flat,
        &mut Vec::new(),
    )?;
    Ok(done.then_some(flat))
}

fn flatten_into(
    font: &Font,
    glyph_name: &str,
    master_id: &str,
    transform: Affine,
    flat: &mut Vec<FlatComponent>,
    visiting: &mut Vec<String>,
) -> Result<bool, BuildError> {
    if visiting.iter().any(|name| name == glyph_name) {
        return Err(BuildError::ComponentCycle(glyph_name.into()));
    }
    let glyph = font.glyph(glyph_name).ok_or_else(|| BuildError::UnknownGlyph {
        target: glyph_name.into(),
        referenced_by: visiting.last().cloned().unwrap_or_default(),
    })?;
    let Some(layer) = glyph.layer(master_id) else {
        return Ok(true);
    };

    visiting.push(glyph_name.to_owned());
    for component in &layer.components {
        let target = font
            .glyph(&component.reference)
            .ok_or_else(|| BuildError::UnknownGlyph {
                target: component.reference.clone(),
                referenced_by: glyph_name.into(),
            })?;
        let combined = transform * component.affine();
        let target_layer = target.layer(master_id);
        let (has_paths, has_components) = target_layer
            .map(|l| (!l.paths.is_empty(), !l.components.is_empty()))
            .unwrap_or((false, false));
        if has_paths && has_components {
            // A level with its own contours: give up on the composite
            // representation.
            visiting.pop();
            return Ok(false);
        }
        if has_components {
            if !flatten_into(font, &component.reference, master_id, combined, flat, visiting)? {
                visiting.pop();
                return Ok(false);
            }
        } else {
            flat.push(FlatComponent {
                glyph: component.reference.clone(),
                transform: combined,
            });
        }
    }
    visiting.pop();
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape;

    fn test_font(glyphs: serde_json::Value) -> Font {
        serde_json::from_value(serde_json::json!({
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
        .unwrap()
    }

    fn triangle_glyph(name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "layers": [{"master": "m1", "width": 200.0, "paths": [{
                "closed": true,
                "nodes": [
                    {"x": 0.0, "y": 0.0, "type": "line"},
                    {"x": 100.0, "y": 0.0, "type": "line"},
                    {"x": 50.0, "y": 100.0, "type": "line"}
                ]
            }]}]
        })
    }

    #[test]
    fn identity_component_draws_directly() {
        let mut glyphs = vec![triangle_glyph("base")];
        glyphs.push(serde_json::json!({
            "name": "composite",
            "layers": [{"master": "m1", "width": 200.0,
                "components": [{"reference": "base"}]}]
        }));
        let font = test_font(serde_json::Value::Array(glyphs));
        let base = resolve_outline(&font, "base", "m1").unwrap();
        let composite = resolve_outline(&font, "composite", "m1").unwrap();
        assert_eq!(base.elements(), composite.elements());
    }

    #[test]
    fn mirrored_component_reverses_winding() {
        let mut glyphs = vec![triangle_glyph("base")];
        glyphs.push(serde_json::json!({
            "name": "mirrored",
            "layers": [{"master": "m1", "width": 200.0,
                "components": [{"reference": "base",
                    "transform": [-1.0, 0.0, 0.0, 1.0, 100.0, 0.0]}]}]
        }));
        let font = test_font(serde_json::Value::Array(glyphs));
        let base = resolve_outline(&font, "base", "m1").unwrap();
        let mirrored = resolve_outline(&font, "mirrored", "m1").unwrap();
        // Mirroring alone would flip the signed area; the winding reversal
        // flips it back.
        assert!((base.area() - mirrored.area()).abs() < 1e-6);
    }

    #[test]
    fn scaled_component_applies_transform() {
        let mut glyphs = vec![triangle_glyph("base")];
        glyphs.push(serde_json::json!({
            "name": "scaled",
            "layers": [{"master": "m1", "width": 200.0,
                "components": [{"reference": "base",
                    "transform": [2.0, 0.0, 0.0, 2.0, 10.0, 10.0]}]}]
        }));
        let font = test_font(serde_json::Value::Array(glyphs));
        let scaled = resolve_outline(&font, "scaled", "m1").unwrap();
        let bbox = scaled.bounding_box();
        assert_eq!((bbox.x0, bbox.y0, bbox.x1, bbox.y1), (10.0, 10.0, 210.0, 210.0));
    }

    #[test]
    fn pure_composite_chain_flattens() {
        let glyphs = serde_json::json!([
            triangle_glyph("leaf"),
            {"name": "inner", "layers": [{"master": "m1", "width": 200.0,
                "components": [{"reference": "leaf",
                    "transform": [1.0, 0.0, 0.0, 1.0, 50.0, 0.0]}]}]},
            {"name": "outer", "layers": [{"master": "m1", "width": 200.0,
                "components": [{"reference": "inner",
                    "transform": [1.0, 0.0, 0.0, 1.0, 0.0, 25.0]}]}]}
        ]);
        let font = test_font(glyphs);
        let flat = flatten_components(&font, "outer", "m1").unwrap().unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].glyph, "leaf");
        let moved = flat[0].transform * kurbo::Point::new(0.0, 0.0);
        assert_eq!((moved.x, moved.y), (50.0, 25.0));
    }

    #[test]
    fn contours_in_chain_force_decomposition() {
        let glyphs = serde_json::json!([
            triangle_glyph("leaf"),
            {"name": "mixed", "layers": [{"master": "m1", "width": 200.0,
                "paths": [{"closed": true, "nodes": [
                    {"x": 0.0, "y": 0.0, "type": "line"},
                    {"x": 10.0, "y": 0.0, "type": "line"},
                    {"x": 10.0, "y": 10.0, "type": "line"}
                ]}],
                "components": [{"reference": "leaf"}]}]},
            {"name": "outer", "layers": [{"master": "m1", "width": 200.0,
                "components": [{"reference": "mixed"}]}]}
        ]);
        let font = test_font(glyphs);
        assert!(flatten_components(&font, "outer", "m1").unwrap().is_none());
    }
}
