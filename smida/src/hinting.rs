//! Autohinting for the PostScript path.
//!
//! Global parameters come from the first master: alignment zones partition
//! into BlueValues (baseline or positive-size zones) and OtherBlues, each
//! contributing its sorted `(position, position + size)` pair; stem-snap
//! arrays pass through, with the first entry of each serving as the standard
//! width. The per-glyph pass finds axis-aligned stem pairs that match a snap
//! width and merges them into the CharString ahead of the drawing program.

use kurbo::{BezPath, PathSeg};

use crate::charstring::Hints;
use crate::error::BuildError;
use crate::source::Master;

/// How far a detected width may sit from a stem-snap value.
const SNAP_TOL: f64 = 2.0;
/// How far from exactly horizontal/vertical an edge may tilt.
const AXIS_TOL: f64 = 1.0;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HintParams {
    pub blue_values: Vec<i32>,
    pub other_blues: Vec<i32>,
    pub stem_snap_h: Vec<f64>,
    pub stem_snap_v: Vec<f64>,
    pub std_hw: f64,
    pub std_vw: f64,
}

pub fn derive_params(master: &Master) -> Result<HintParams, BuildError> {
    let stem_snap_h = master.horizontal_stems()?.to_vec();
    let stem_snap_v = master.vertical_stems()?.to_vec();

    let mut zones = master.alignment_zones.clone();
    zones.sort_by(|a, b| {
        (a.position, a.size)
            .partial_cmp(&(b.position, b.size))
            .expect("zone values are finite")
    });

    let mut blue_values = Vec::new();
    let mut other_blues = Vec::new();
    for zone in zones {
        let mut pair = [zone.position, zone.position + zone.size];
        pair.sort_by(f64::total_cmp);
        let values = if zone.position == 0.0 || zone.size >= 0.0 {
            &mut blue_values
        } else {
            &mut other_blues
        };
        values.extend(pair.map(|v| v.round() as i32));
    }

    Ok(HintParams {
        std_hw: stem_snap_h[0],
        std_vw: stem_snap_v[0],
        stem_snap_h,
        stem_snap_v,
        blue_values,
        other_blues,
    })
}

/// An axis-aligned edge of the outline.
#[derive(Clone, Copy)]
struct AlignedEdge {
    /// Position along the hinted axis (y for horizontal edges).
    at: f64,
    /// Extent along the other axis.
    lo: f64,
    hi: f64,
    /// With counter-clockwise winding the interior lies left of the edge
    /// direction, which tells a lower edge from an upper one.
    interior_above: bool,
}

pub fn glyph_hints(path: &BezPath, params: &HintParams) -> Hints {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();
    for seg in path.segments() {
        let PathSeg::Line(line) = seg else { continue };
        let (dx, dy) = (line.p1.x - line.p0.x, line.p1.y - line.p0.y);
        if dy.abs() <= AXIS_TOL && dx.abs() > AXIS_TOL {
            horizontal.push(AlignedEdge {
                at: (line.p0.y + line.p1.y) / 2.0,
                lo: line.p0.x.min(line.p1.x),
                hi: line.p0.x.max(line.p1.x),
                // Interior above means this is a bottom edge (runs +x).
                interior_above: dx > 0.0,
            });
        } else if dx.abs() <= AXIS_TOL && dy.abs() > AXIS_TOL {
            vertical.push(AlignedEdge {
                at: (line.p0.x + line.p1.x) / 2.0,
                lo: line.p0.y.min(line.p1.y),
                hi: line.p0.y.max(line.p1.y),
                // Interior right of a downward edge: a left edge.
                interior_above: dy < 0.0,
            });
        }
    }

    let mut hints = Hints {
        hstems: stems(&horizontal, &params.stem_snap_h),
        vstems: stems(&vertical, &params.stem_snap_v),
    };
    add_ghosts(&mut hints.hstems, &horizontal, params);
    hints
}

/// Pair lower edges with upper edges whose distance matches a snap width.
fn stems(edges: &[AlignedEdge], snaps: &[f64]) -> Vec<(i32, i32)> {
    let mut found: Vec<(i32, i32)> = Vec::new();
    for lower in edges.iter().filter(|e| e.interior_above) {
        for upper in edges.iter().filter(|e| !e.interior_above) {
            let width = upper.at - lower.at;
            if width <= 0.0 {
                continue;
            }
            if upper.lo.max(lower.lo) >= upper.hi.min(lower.hi) {
                continue; // no overlap across the stem
            }
            if !snaps.iter().any(|snap| (width - snap).abs() <= SNAP_TOL) {
                continue;
            }
            let pair = (lower.at.round() as i32, width.round() as i32);
            if !found.contains(&pair) {
                found.push(pair);
            }
        }
    }
    found.sort_unstable();
    // Plain hstem/vstem programs cannot express overlapping stems.
    let mut kept: Vec<(i32, i32)> = Vec::new();
    for (edge, width) in found {
        if kept
            .last()
            .is_none_or(|&(prev_edge, prev_width)| prev_edge + prev_width <= edge)
        {
            kept.push((edge, width));
        }
    }
    kept
}

/// Unpaired horizontal edges sitting in an alignment zone still get a ghost
/// hint (conventional widths: -20 for a top edge, -21 for a bottom one).
fn add_ghosts(hstems: &mut Vec<(i32, i32)>, edges: &[AlignedEdge], params: &HintParams) {
    let zones: Vec<(i32, i32)> = params
        .blue_values
        .chunks(2)
        .chain(params.other_blues.chunks(2))
        .filter(|pair| pair.len() == 2)
        .map(|pair| (pair[0], pair[1]))
        .collect();

    let mut ghosts = Vec::new();
    for edge in edges {
        let at = edge.at.round() as i32;
        if !zones.iter().any(|&(lo, hi)| at >= lo && at <= hi) {
            continue;
        }
        let covered = hstems
            .iter()
            .any(|&(stem_edge, width)| stem_edge == at || stem_edge + width == at);
        if covered {
            continue;
        }
        let ghost = if edge.interior_above { (at, -21) } else { (at, -20) };
        if !ghosts.contains(&ghost) {
            ghosts.push(ghost);
        }
    }
    hstems.extend(ghosts);
    hstems.sort_unstable();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::AlignmentZone;

    fn master_with_zones(zones: Vec<AlignmentZone>) -> Master {
        let mut master: Master = serde_json::from_value(serde_json::json!({
            "id": "m1", "ascender": 800, "descender": -200,
            "x_height": 500, "cap_height": 700,
            "horizontal_stems": [90.0, 100.0],
            "vertical_stems": [120.0]
        }))
        .unwrap();
        master.alignment_zones = zones;
        master
    }

    #[test]
    fn zones_partition_into_blues_and_other_blues() {
        let master = master_with_zones(vec![
            AlignmentZone { position: 700.0, size: 16.0 },
            AlignmentZone { position: 0.0, size: -16.0 },
            AlignmentZone { position: -200.0, size: -16.0 },
        ]);
        let params = derive_params(&master).unwrap();
        // Baseline zone belongs to BlueValues even with negative size.
        assert_eq!(params.blue_values, vec![-16, 0, 700, 716]);
        assert_eq!(params.other_blues, vec![-216, -200]);
        assert_eq!(params.std_hw, 90.0);
        assert_eq!(params.std_vw, 120.0);
    }

    #[test]
    fn missing_stems_fail_by_name() {
        let mut master = master_with_zones(vec![]);
        master.horizontal_stems.clear();
        let err = derive_params(&master).unwrap_err();
        assert!(err.to_string().contains("horizontal_stems"));
    }

    #[test]
    fn bar_gets_one_hstem_and_one_vstem() {
        // A 120-wide, 90-tall counter-clockwise bar.
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((120.0, 0.0));
        path.line_to((120.0, 90.0));
        path.line_to((0.0, 90.0));
        path.close_path();
        let master = master_with_zones(vec![]);
        let params = derive_params(&master).unwrap();
        let hints = glyph_hints(&path, &params);
        assert_eq!(hints.hstems, vec![(0, 90)]);
        assert_eq!(hints.vstems, vec![(0, 120)]);
    }

    #[test]
    fn baseline_edge_in_zone_gets_ghost_hint() {
        // A bar whose height matches no snap width.
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((120.0, 0.0));
        path.line_to((120.0, 700.0));
        path.line_to((0.0, 700.0));
        path.close_path();
        let master = master_with_zones(vec![
            AlignmentZone { position: 0.0, size: -16.0 },
            AlignmentZone { position: 700.0, size: 16.0 },
        ]);
        let params = derive_params(&master).unwrap();
        let hints = glyph_hints(&path, &params);
        assert_eq!(hints.hstems, vec![(0, -21), (700, -20)]);
    }
}
