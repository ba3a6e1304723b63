//! Boolean "simplify": union of a contour set under nonzero winding.
//!
//! The input is a set of closed, possibly overlapping contours (components
//! already decomposed); the output covers the same filled region with
//! non-overlapping contours, outer contours counter-clockwise and holes
//! clockwise. Contours that need no rework keep their exact point sequence
//! and starting point, so point numbering is stable across rebuilds of
//! unchanged input.
//!
//! The approach is the usual planar-graph one: find intersections (exact for
//! line pairs, adaptive subdivision otherwise), split segments at the
//! intersection parameters, classify each split edge by sampling the winding
//! number on both sides, keep boundary edges oriented with the filled side on
//! the left, and trace the kept edges back into contours. Inputs with no
//! intersections skip the rebuild entirely and only get their winding fixed,
//! which also makes the pass idempotent.

use kurbo::{BezPath, ParamCurve, PathEl, PathSeg, Point, Shape};

/// Positions closer than this merge into one graph node.
const NODE_TOL: f64 = 0.05;
/// Intersection parameters this close to a segment end are the end.
const END_T: f64 = 1e-6;

pub fn remove_overlaps(path: &BezPath) -> Result<BezPath, String> {
    let mut contours = Vec::new();
    // Exactly coincident contours (a component placed twice) collapse to
    // one; their doubled winding would otherwise degenerate the graph.
    for contour in split_contours(path) {
        if !contours.contains(&contour) {
            contours.push(contour);
        }
    }
    if contours.is_empty() {
        return Ok(BezPath::new());
    }
    // Winding samples always run against the full original outline.
    let full = closed_path(&contours);

    let splits = find_intersections(&contours);
    if splits.iter().all(|per_contour| {
        per_contour
            .iter()
            .all(|per_segment| per_segment.is_empty())
    }) {
        return fix_winding(&contours, &full);
    }
    rebuild(&contours, &splits, &full)
}

/// One closed contour as a segment list.
type Contour = Vec<PathSeg>;

fn split_contours(path: &BezPath) -> Vec<Contour> {
    let mut contours = Vec::new();
    let mut current = Vec::new();
    for el in path.elements() {
        if matches!(el, PathEl::MoveTo(_)) && !current.is_empty() {
            contours.push(std::mem::take(&mut current));
        }
        current.push(*el);
    }
    if !current.is_empty() {
        contours.push(current);
    }

    contours
        .into_iter()
        .filter_map(|els| {
            let sub = BezPath::from_vec(els);
            let mut segs: Contour = sub
                .segments()
                .filter(|seg| !is_degenerate(seg))
                .collect();
            // Treat every contour as closed: glyph outlines are.
            if let (Some(first), Some(last)) = (segs.first(), segs.last()) {
                let (start, end) = (first.start(), last.end());
                if (end - start).hypot() > END_T {
                    segs.push(PathSeg::Line(kurbo::Line::new(end, start)));
                }
            }
            (!segs.is_empty()).then_some(segs)
        })
        .collect()
}

fn is_degenerate(seg: &PathSeg) -> bool {
    let bbox = seg.bounding_box();
    bbox.width() < 1e-9 && bbox.height() < 1e-9
}

fn closed_path(contours: &[Contour]) -> BezPath {
    let mut path = BezPath::new();
    for contour in contours {
        path.move_to(contour[0].start());
        for seg in contour {
            push_seg(&mut path, seg);
        }
        path.close_path();
    }
    path
}

fn push_seg(path: &mut BezPath, seg: &PathSeg) {
    match seg {
        PathSeg::Line(line) => path.line_to(line.p1),
        PathSeg::Quad(quad) => path.quad_to(quad.p1, quad.p2),
        PathSeg::Cubic(cubic) => path.curve_to(cubic.p1, cubic.p2, cubic.p3),
    }
}

/// Interior split parameters per contour, per segment.
fn find_intersections(contours: &[Contour]) -> Vec<Vec<Vec<f64>>> {
    let mut splits: Vec<Vec<Vec<f64>>> = contours
        .iter()
        .map(|c| vec![Vec::new(); c.len()])
        .collect();

    let all: Vec<(usize, usize, PathSeg)> = contours
        .iter()
        .enumerate()
        .flat_map(|(ci, c)| c.iter().enumerate().map(move |(si, seg)| (ci, si, *seg)))
        .collect();

    for i in 0..all.len() {
        for j in (i + 1)..all.len() {
            let (ca, sa, a) = all[i];
            let (cb, sb, b) = all[j];
            let mut hits = Vec::new();
            intersect_segments(&a, &b, &mut hits);
            // A split lands only where it will not merge into an endpoint
            // node anyway; this keeps splitting consistent with NODE_TOL.
            let interior = |seg: &PathSeg, t: f64| {
                let p = seg.eval(t);
                t > END_T
                    && t < 1.0 - END_T
                    && (p - seg.start()).hypot() > NODE_TOL
                    && (p - seg.end()).hypot() > NODE_TOL
            };
            for (ta, tb) in hits {
                if interior(&a, ta) {
                    splits[ca][sa].push(ta);
                }
                if interior(&b, tb) {
                    splits[cb][sb].push(tb);
                }
            }
        }
    }
    for per_contour in &mut splits {
        for per_segment in per_contour {
            per_segment.sort_by(f64::total_cmp);
            per_segment.dedup_by(|a, b| (*a - *b).abs() < 1e-4);
        }
    }
    splits
}

fn intersect_segments(a: &PathSeg, b: &PathSeg, out: &mut Vec<(f64, f64)>) {
    if let (PathSeg::Line(la), PathSeg::Line(lb)) = (a, b) {
        if let Some(hit) = line_line(la, lb) {
            out.push(hit);
        }
        return;
    }
    let mut budget = 100_000u32;
    subdivide(a, b, 0.0, 1.0, 0.0, 1.0, out, 48, &mut budget);
    out.sort_by(|x, y| f64::total_cmp(&x.0, &y.0));
    out.dedup_by(|x, y| (x.0 - y.0).abs() < 1e-3 && (x.1 - y.1).abs() < 1e-3);
}

fn line_line(a: &kurbo::Line, b: &kurbo::Line) -> Option<(f64, f64)> {
    let da = a.p1 - a.p0;
    let db = b.p1 - b.p0;
    let denom = da.cross(db);
    if denom.abs() < 1e-12 {
        return None; // parallel (or colinear; colinear overlap is left alone)
    }
    let w = b.p0 - a.p0;
    let ta = w.cross(db) / denom;
    let tb = w.cross(da) / denom;
    ((-END_T..=1.0 + END_T).contains(&ta) && (-END_T..=1.0 + END_T).contains(&tb))
        .then_some((ta.clamp(0.0, 1.0), tb.clamp(0.0, 1.0)))
}

#[allow(clippy::too_many_arguments)]
fn subdivide(
    a: &PathSeg,
    b: &PathSeg,
    ta0: f64,
    ta1: f64,
    tb0: f64,
    tb1: f64,
    out: &mut Vec<(f64, f64)>,
    depth: u32,
    budget: &mut u32,
) {
    // Near-coincident curve pairs defeat bounding-box pruning; the budget
    // bounds the walk and leaves resolution to the caller's error path.
    if *budget == 0 {
        return;
    }
    *budget -= 1;
    let ra = a.subsegment(ta0..ta1).bounding_box().inflate(1e-9, 1e-9);
    let rb = b.subsegment(tb0..tb1).bounding_box().inflate(1e-9, 1e-9);
    let clip = ra.intersect(rb);
    if clip.width() <= 0.0 || clip.height() <= 0.0 {
        return;
    }
    let small = |r: kurbo::Rect| r.width() < 1e-3 && r.height() < 1e-3;
    if depth == 0 || (small(ra) && small(rb)) {
        out.push(((ta0 + ta1) / 2.0, (tb0 + tb1) / 2.0));
        return;
    }
    let tam = (ta0 + ta1) / 2.0;
    let tbm = (tb0 + tb1) / 2.0;
    if ra.width().max(ra.height()) > rb.width().max(rb.height()) {
        subdivide(a, b, ta0, tam, tb0, tb1, out, depth - 1, budget);
        subdivide(a, b, tam, ta1, tb0, tb1, out, depth - 1, budget);
    } else {
        subdivide(a, b, ta0, ta1, tb0, tbm, out, depth - 1, budget);
        subdivide(a, b, ta0, ta1, tbm, tb1, out, depth - 1, budget);
    }
}

/// The no-intersections fast path: drop contours that are redundant under
/// nonzero winding and reverse those whose filled side sits on the right.
/// Untouched contours pass through byte-for-byte.
fn fix_winding(contours: &[Contour], full: &BezPath) -> Result<BezPath, String> {
    let mut out = BezPath::new();
    for contour in contours {
        let seg = longest_seg(contour);
        match classify(seg, full) {
            EdgeClass::Dropped => continue,
            EdgeClass::Keep => append_contour(&mut out, contour.iter().copied()),
            EdgeClass::Flip => {
                append_contour(&mut out, reverse_contour(contour).into_iter())
            }
        }
    }
    Ok(out)
}

fn longest_seg(contour: &Contour) -> &PathSeg {
    contour
        .iter()
        .max_by(|a, b| {
            let la = (a.end() - a.start()).hypot();
            let lb = (b.end() - b.start()).hypot();
            f64::total_cmp(&la, &lb)
        })
        .expect("contours are never empty")
}

enum EdgeClass {
    /// Boundary edge, filled side already on the left.
    Keep,
    /// Boundary edge, filled side on the right.
    Flip,
    /// Interior or exterior edge.
    Dropped,
}

fn classify(seg: &PathSeg, full: &BezPath) -> EdgeClass {
    let mid = seg.eval(0.5);
    let tangent = seg.eval(0.55) - seg.eval(0.45);
    let len = tangent.hypot();
    if len < 1e-12 {
        return EdgeClass::Dropped;
    }
    let normal = kurbo::Vec2::new(-tangent.y, tangent.x) * (1.0 / len);
    let eps = ((seg.end() - seg.start()).hypot() * 0.05).clamp(0.02, 0.5);
    let left = full.winding(mid + normal * eps) != 0;
    let right = full.winding(mid - normal * eps) != 0;
    match (left, right) {
        (true, false) => EdgeClass::Keep,
        (false, true) => EdgeClass::Flip,
        _ => EdgeClass::Dropped,
    }
}

/// Reverse a closed contour, keeping its starting point.
fn reverse_contour(contour: &Contour) -> Contour {
    contour.iter().rev().map(PathSeg::reverse).collect()
}

/// Reverse every contour of a path, keeping starting points. The union
/// normalizes outer contours counter-clockwise (the PostScript convention);
/// TrueType output flips them through this.
pub fn reverse_winding(path: &BezPath) -> BezPath {
    let mut out = BezPath::new();
    for contour in split_contours(path) {
        append_contour(&mut out, reverse_contour(&contour).into_iter());
    }
    out
}

fn append_contour(out: &mut BezPath, segs: impl Iterator<Item = PathSeg>) {
    let segs: Vec<PathSeg> = segs.collect();
    let Some(first) = segs.first() else { return };
    let start = first.start();
    out.move_to(start);
    for (ix, seg) in segs.iter().enumerate() {
        // A plain closing line back to the start is what close_path() means.
        if ix + 1 == segs.len() {
            if let PathSeg::Line(line) = seg {
                if (line.p1 - start).hypot() < NODE_TOL {
                    break;
                }
            }
        }
        push_seg(out, seg);
    }
    out.close_path();
}

/// Full rebuild: split, classify, re-trace.
fn rebuild(
    contours: &[Contour],
    splits: &[Vec<Vec<f64>>],
    full: &BezPath,
) -> Result<BezPath, String> {
    // Split every segment at its interior intersection parameters.
    struct Edge {
        seg: PathSeg,
        from: usize,
        to: usize,
        used: bool,
    }

    let mut pieces: Vec<PathSeg> = Vec::new();
    let mut starts: Vec<Point> = Vec::new();
    for (contour, contour_splits) in contours.iter().zip(splits) {
        starts.push(contour[0].start());
        for (seg, ts) in contour.iter().zip(contour_splits) {
            let mut t0 = 0.0;
            for &t in ts {
                pieces.push(seg.subsegment(t0..t));
                t0 = t;
            }
            pieces.push(seg.subsegment(t0..1.0));
        }
    }

    // Merge endpoints into nodes.
    let mut nodes: Vec<Point> = Vec::new();
    let mut node_of = |p: Point, nodes: &mut Vec<Point>| -> usize {
        if let Some(ix) = nodes
            .iter()
            .position(|n| (*n - p).hypot() < NODE_TOL)
        {
            return ix;
        }
        nodes.push(p);
        nodes.len() - 1
    };

    let mut edges: Vec<Edge> = Vec::new();
    for piece in pieces {
        let from = node_of(piece.start(), &mut nodes);
        let to = node_of(piece.end(), &mut nodes);
        // Slivers that collapse into a single node are intersection noise.
        if from == to && piece.bounding_box().size().max_side() < NODE_TOL * 2.0 {
            continue;
        }
        let (seg, from, to) = match classify(&piece, full) {
            EdgeClass::Dropped => continue,
            EdgeClass::Keep => (piece, from, to),
            EdgeClass::Flip => (piece.reverse(), to, from),
        };
        // Snap endpoints onto the node representatives so traced contours
        // are exactly continuous.
        let seg = snap_ends(seg, nodes[from], nodes[to]);
        edges.push(Edge {
            seg,
            from,
            to,
            used: false,
        });
    }

    // Trace boundary contours, following kept edges with the interior on the
    // left; junctions take the most counter-clockwise continuation.
    let mut out = BezPath::new();
    for start_edge in 0..edges.len() {
        if edges[start_edge].used {
            continue;
        }
        let mut cycle: Vec<usize> = Vec::new();
        let mut current = start_edge;
        let origin = edges[start_edge].from;
        loop {
            edges[current].used = true;
            cycle.push(current);
            let node = edges[current].to;
            if node == origin {
                break;
            }
            let incoming = {
                let seg = &edges[current].seg;
                seg.eval(1.0) - seg.eval(0.95)
            };
            let next = edges
                .iter()
                .enumerate()
                .filter(|(_, e)| !e.used && e.from == node)
                .max_by(|(_, ea), (_, eb)| {
                    let angle = |e: &Edge| {
                        let out_dir = e.seg.eval(0.05) - e.seg.eval(0.0);
                        ccw_turn(incoming, out_dir)
                    };
                    f64::total_cmp(&angle(ea), &angle(eb))
                })
                .map(|(ix, _)| ix);
            match next {
                Some(ix) => current = ix,
                None => {
                    return Err(format!(
                        "unresolved overlap: boundary trace dead-ends at ({:.1}, {:.1})",
                        nodes[node].x, nodes[node].y
                    ))
                }
            }
        }

        // Prefer an original starting point for the rebuilt contour.
        let rotate = cycle
            .iter()
            .position(|&e| {
                starts
                    .iter()
                    .any(|s| (*s - edges[e].seg.start()).hypot() < NODE_TOL)
            })
            .or_else(|| {
                cycle
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        let pa = edges[**a].seg.start();
                        let pb = edges[**b].seg.start();
                        (pa.x, pa.y).partial_cmp(&(pb.x, pb.y)).unwrap()
                    })
                    .map(|(ix, _)| ix)
            })
            .unwrap_or(0);
        cycle.rotate_left(rotate);
        append_contour(&mut out, cycle.iter().map(|&e| edges[e].seg));
    }

    if out.elements().is_empty() {
        return Err("unresolved overlap: no boundary contours survived".into());
    }
    Ok(out)
}

/// Whether two closed outlines intersect or one contains the other. Drives
/// the overlap flag on composite glyphs.
pub fn paths_overlap(a: &BezPath, b: &BezPath) -> bool {
    if a.elements().is_empty() || b.elements().is_empty() {
        return false;
    }
    let bounds = a.bounding_box().intersect(b.bounding_box());
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return false;
    }
    for sa in a.segments() {
        for sb in b.segments() {
            let mut hits = Vec::new();
            intersect_segments(&sa, &sb, &mut hits);
            if !hits.is_empty() {
                return true;
            }
        }
    }
    // No edge crossings: containment is the remaining possibility.
    let probe_a = a.segments().next().map(|seg| seg.eval(0.5));
    let probe_b = b.segments().next().map(|seg| seg.eval(0.5));
    probe_a.is_some_and(|p| b.winding(p) != 0) || probe_b.is_some_and(|p| a.winding(p) != 0)
}

/// Angle of the turn from `incoming` to `outgoing`, higher = more
/// counter-clockwise.
fn ccw_turn(incoming: kurbo::Vec2, outgoing: kurbo::Vec2) -> f64 {
    let angle = outgoing.atan2() - incoming.atan2();
    let two_pi = std::f64::consts::TAU;
    let mut a = angle % two_pi;
    if a <= -std::f64::consts::PI {
        a += two_pi;
    } else if a > std::f64::consts::PI {
        a -= two_pi;
    }
    a
}

fn snap_ends(seg: PathSeg, start: Point, end: Point) -> PathSeg {
    match seg {
        PathSeg::Line(mut line) => {
            line.p0 = start;
            line.p1 = end;
            PathSeg::Line(line)
        }
        PathSeg::Quad(mut quad) => {
            quad.p0 = start;
            quad.p2 = end;
            PathSeg::Quad(quad)
        }
        PathSeg::Cubic(mut cubic) => {
            cubic.p0 = start;
            cubic.p3 = end;
            PathSeg::Cubic(cubic)
        }
    }
}
