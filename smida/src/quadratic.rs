//! Cubic to quadratic conversion for TrueType outlines.
//!
//! Conversion runs over the undecomposed glyph record (components stay
//! references) before decomposition and overlap removal, and reverses the
//! contour direction on the way: TrueType wants the outside clockwise, the
//! design space draws it counter-clockwise.
//!
//! Each cubic is replaced by the smallest run of quadratics whose worst-case
//! deviation stays inside the tolerance, using the standard bound for the
//! midpoint approximation: err <= sqrt(3)/36 * |p3 - 3 p2 + 3 p1 - p0| (the
//! bound scales with 1/n^3 as the cubic is split).

use kurbo::{BezPath, CubicBez, ParamCurve, PathEl, Point, QuadBez};
use crate::pens::{BezPathPen, ReverseContourPen};

use crate::outline::{draw_layer_paths, replay};
use crate::source::{Contour, Layer, Node, NodeType};

/// The unit-space tolerance the build passes to the converter.
pub const TOLERANCE: f64 = 1.0;

const MAX_SPLITS: usize = 16;

/// Convert a layer's own contours in place (components are untouched) and
/// reverse their winding.
pub fn convert_layer(layer: &mut Layer, tolerance: f64) -> Result<(), String> {
    if layer.paths.is_empty() {
        return Ok(());
    }
    let mut pen = BezPathPen::new();
    draw_layer_paths(layer, &mut pen)?;
    let quads = path_to_quadratic(&pen.into_inner(), tolerance);

    let mut sink = BezPathPen::new();
    let mut reverser = ReverseContourPen::new(&mut sink);
    replay(&quads, &mut reverser);
    reverser
        .flush()
        .map_err(|err| format!("cannot reverse contour: {err:?}"))?;
    layer.paths = contours_from_path(&sink.into_inner());
    Ok(())
}

/// Replace every cubic in the path by a quadratic spline.
pub fn path_to_quadratic(path: &BezPath, tolerance: f64) -> BezPath {
    let mut out = BezPath::new();
    let mut current = Point::ZERO;
    let mut start = Point::ZERO;
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                out.move_to(p);
                current = p;
                start = p;
            }
            PathEl::LineTo(p) => {
                out.line_to(p);
                current = p;
            }
            PathEl::QuadTo(c, p) => {
                out.quad_to(c, p);
                current = p;
            }
            PathEl::CurveTo(c0, c1, p) => {
                let cubic = CubicBez::new(current, c0, c1, p);
                for quad in cubic_to_quads(cubic, tolerance) {
                    out.quad_to(quad.p1, quad.p2);
                }
                current = p;
            }
            PathEl::ClosePath => {
                out.close_path();
                current = start;
            }
        }
    }
    out
}

/// Approximate one cubic with the fewest quadratics that stay inside
/// `tolerance`.
pub fn cubic_to_quads(cubic: CubicBez, tolerance: f64) -> Vec<QuadBez> {
    for n in 1..=MAX_SPLITS {
        if split_error(cubic, n) <= tolerance {
            return split_into_quads(cubic, n);
        }
    }
    split_into_quads(cubic, MAX_SPLITS)
}

/// Worst-case deviation of the n-way split approximation.
fn split_error(cubic: CubicBez, n: usize) -> f64 {
    // The midpoint quadratic errs by sqrt(3)/36 * |d3|, where d3 is the
    // third finite difference of the control points; splitting into n
    // pieces scales d3 by 1/n^3.
    let d3 = (cubic.p3.to_vec2() - cubic.p2.to_vec2() * 3.0 + cubic.p1.to_vec2() * 3.0
        - cubic.p0.to_vec2())
    .hypot();
    3f64.sqrt() / 36.0 * d3 / (n * n * n) as f64
}

fn split_into_quads(cubic: CubicBez, n: usize) -> Vec<QuadBez> {
    (0..n)
        .map(|i| {
            let t0 = i as f64 / n as f64;
            let t1 = (i + 1) as f64 / n as f64;
            let piece = cubic.subsegment(t0..t1);
            let control = ((piece.p1.to_vec2() + piece.p2.to_vec2()) * 3.0
                - (piece.p0.to_vec2() + piece.p3.to_vec2()))
                / 4.0;
            QuadBez::new(piece.p0, control.to_point(), piece.p3)
        })
        .collect()
}

/// Rebuild source contours from a finished path. The first node of a closed
/// contour describes the closing segment, mirroring how drawing consumes it.
pub fn contours_from_path(path: &BezPath) -> Vec<Contour> {
    let mut contours = Vec::new();
    let mut nodes: Vec<Node> = Vec::new();
    let mut closed = false;

    let node = |p: Point, node_type: NodeType| Node {
        x: p.x,
        y: p.y,
        node_type,
        smooth: false,
    };

    let mut flush = |nodes: &mut Vec<Node>, closed: bool| {
        if nodes.is_empty() {
            return;
        }
        let mut nodes = std::mem::take(nodes);
        if closed && nodes.len() > 1 {
            let last = nodes.last().unwrap();
            let first = &nodes[0];
            if last.node_type != NodeType::OffCurve && last.x == first.x && last.y == first.y {
                let closing = last.node_type;
                nodes[0].node_type = closing;
                nodes.pop();
            }
        }
        contours.push(Contour { closed, nodes });
    };

    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                flush(&mut nodes, closed);
                closed = false;
                nodes.push(node(p, NodeType::Line));
            }
            PathEl::LineTo(p) => nodes.push(node(p, NodeType::Line)),
            PathEl::QuadTo(c, p) => {
                nodes.push(node(c, NodeType::OffCurve));
                nodes.push(node(p, NodeType::QCurve));
            }
            PathEl::CurveTo(c0, c1, p) => {
                nodes.push(node(c0, NodeType::OffCurve));
                nodes.push(node(c1, NodeType::OffCurve));
                nodes.push(node(p, NodeType::Curve));
            }
            PathEl::ClosePath => closed = true,
        }
    }
    flush(&mut nodes, closed);
    contours
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape;

    #[test]
    fn lines_and_quads_pass_through() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.quad_to((15.0, 5.0), (10.0, 10.0));
        path.close_path();
        let converted = path_to_quadratic(&path, TOLERANCE);
        assert_eq!(path.elements(), converted.elements());
    }

    #[test]
    fn conversion_stays_within_tolerance() {
        let cubic = CubicBez::new(
            Point::new(0.0, 0.0),
            Point::new(100.0, 200.0),
            Point::new(300.0, 200.0),
            Point::new(400.0, 0.0),
        );
        let quads = cubic_to_quads(cubic, TOLERANCE);
        assert!(quads.len() > 1);
        let n = quads.len();
        for i in 0..n {
            for k in 0..=8 {
                let local = k as f64 / 8.0;
                let t = (i as f64 + local) / n as f64;
                let err = (cubic.eval(t) - quads[i].eval(local)).hypot();
                assert!(err <= TOLERANCE + 0.25, "error {err} at t {t}");
            }
        }
        // Endpoints are preserved exactly.
        assert_eq!(quads[0].p0, cubic.p0);
        assert_eq!(quads[n - 1].p2, cubic.p3);
    }

    #[test]
    fn flat_cubic_needs_one_quad() {
        let cubic = CubicBez::new(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.1),
            Point::new(20.0, 0.1),
            Point::new(30.0, 0.0),
        );
        assert_eq!(cubic_to_quads(cubic, TOLERANCE).len(), 1);
    }

    #[test]
    fn convert_layer_reverses_winding_and_keeps_start() {
        let mut layer: Layer = serde_json::from_value(serde_json::json!({
            "master": "m1",
            "width": 100.0,
            "paths": [{"closed": true, "nodes": [
                {"x": 0.0, "y": 0.0, "type": "line"},
                {"x": 100.0, "y": 0.0, "type": "line"},
                {"x": 100.0, "y": 30.0, "type": "offcurve"},
                {"x": 100.0, "y": 70.0, "type": "offcurve"},
                {"x": 100.0, "y": 100.0, "type": "curve"},
                {"x": 0.0, "y": 100.0, "type": "line"}
            ]}]
        }))
        .unwrap();

        let mut before = BezPathPen::new();
        draw_layer_paths(&layer, &mut before).unwrap();
        let area_before = before.into_inner().area();

        convert_layer(&mut layer, TOLERANCE).unwrap();
        // No cubics remain.
        assert!(layer.paths[0]
            .nodes
            .iter()
            .all(|n| n.node_type != NodeType::Curve));
        // Start point unchanged, winding reversed.
        assert_eq!((layer.paths[0].nodes[0].x, layer.paths[0].nodes[0].y), (0.0, 0.0));
        let mut after = BezPathPen::new();
        draw_layer_paths(&layer, &mut after).unwrap();
        let area_after = after.into_inner().area();
        assert!(area_before > 0.0 && area_after < 0.0);
        assert!((area_before + area_after).abs() < 2.0);
    }
}
