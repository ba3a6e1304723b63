//! Type 2 CharString encoding.
//!
//! The advance width is packed as the first operand of the first
//! stack-clearing operator, the hint program (if any) comes right after it,
//! and the drawing program follows: relative moves, lines and curves, closed
//! implicitly, terminated by `endchar`.

use kurbo::{BezPath, PathEl, Point};

/// Stem hints for one glyph, `(edge, width)` pairs in ascending edge order.
/// Ghost hints carry the conventional negative widths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hints {
    pub hstems: Vec<(i32, i32)>,
    pub vstems: Vec<(i32, i32)>,
}

impl Hints {
    pub fn is_empty(&self) -> bool {
        self.hstems.is_empty() && self.vstems.is_empty()
    }
}

mod op {
    pub const HSTEM: u8 = 1;
    pub const VSTEM: u8 = 3;
    pub const RLINETO: u8 = 5;
    pub const RRCURVETO: u8 = 8;
    pub const ENDCHAR: u8 = 14;
    pub const RMOVETO: u8 = 21;
}

/// Encode a finished outline as a Type 2 CharString.
pub fn encode(path: &BezPath, width: i32, hints: &Hints) -> Vec<u8> {
    let mut cs = Encoder::new(width);
    cs.stems(&hints.hstems, op::HSTEM);
    cs.stems(&hints.vstems, op::VSTEM);

    let mut current = IntPoint { x: 0, y: 0 };
    let mut start = current;
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                let p = IntPoint::from(p);
                cs.operand(p.x - current.x);
                cs.operand(p.y - current.y);
                cs.operator(op::RMOVETO);
                current = p;
                start = p;
            }
            PathEl::LineTo(p) => {
                let p = IntPoint::from(p);
                cs.operand(p.x - current.x);
                cs.operand(p.y - current.y);
                cs.operator(op::RLINETO);
                current = p;
            }
            PathEl::QuadTo(c, p) => {
                // The PostScript path is cubic-only; a stray quadratic is
                // elevated exactly.
                let (c, p) = (Point::new(c.x, c.y), Point::new(p.x, p.y));
                let from = Point::new(current.x as f64, current.y as f64);
                let c0 = from + (c - from) * (2.0 / 3.0);
                let c1 = p + (c - p) * (2.0 / 3.0);
                current = cs.curve(current, c0, c1, p);
            }
            PathEl::CurveTo(c0, c1, p) => {
                current = cs.curve(current, c0, c1, p);
            }
            PathEl::ClosePath => {
                // Charstring subpaths close themselves.
                current = start;
            }
        }
    }
    cs.operator(op::ENDCHAR);
    cs.bytes
}

#[derive(Clone, Copy, PartialEq)]
struct IntPoint {
    x: i32,
    y: i32,
}

impl From<Point> for IntPoint {
    fn from(p: Point) -> IntPoint {
        IntPoint {
            x: round(p.x),
            y: round(p.y),
        }
    }
}

fn round(v: f64) -> i32 {
    (v + 0.5).floor() as i32
}

struct Encoder {
    bytes: Vec<u8>,
    width: Option<i32>,
}

impl Encoder {
    fn new(width: i32) -> Encoder {
        Encoder {
            bytes: Vec::new(),
            width: Some(width),
        }
    }

    /// The width rides along as the first operand of the first
    /// stack-clearing operator.
    fn operand(&mut self, value: i32) {
        if let Some(width) = self.width.take() {
            push_int(&mut self.bytes, width);
        }
        push_int(&mut self.bytes, value);
    }

    fn operator(&mut self, operator: u8) {
        // An empty glyph still needs its width packed before endchar.
        if let Some(width) = self.width.take() {
            push_int(&mut self.bytes, width);
        }
        self.bytes.push(operator);
    }

    fn stems(&mut self, stems: &[(i32, i32)], operator: u8) {
        if stems.is_empty() {
            return;
        }
        let mut previous = 0;
        for &(edge, width) in stems {
            self.operand(edge - previous);
            self.operand(width);
            previous = edge + width;
        }
        self.operator(operator);
    }

    fn curve(&mut self, current: IntPoint, c0: Point, c1: Point, p: Point) -> IntPoint {
        let (c0, c1, p) = (IntPoint::from(c0), IntPoint::from(c1), IntPoint::from(p));
        self.operand(c0.x - current.x);
        self.operand(c0.y - current.y);
        self.operand(c1.x - c0.x);
        self.operand(c1.y - c0.y);
        self.operand(p.x - c1.x);
        self.operand(p.y - c1.y);
        self.operator(op::RRCURVETO);
        p
    }
}

/// Type 2 integer operand encoding. Glyph coordinates are bounded well
/// inside the 16-bit form.
fn push_int(out: &mut Vec<u8>, v: i32) {
    match v {
        -107..=107 => out.push((v + 139) as u8),
        108..=1131 => {
            let v = v - 108;
            out.push(247 + (v >> 8) as u8);
            out.push((v & 0xff) as u8);
        }
        -1131..=-108 => {
            let v = -v - 108;
            out.push(251 + (v >> 8) as u8);
            out.push((v & 0xff) as u8);
        }
        _ => {
            let v = v.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            out.push(28);
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i32) -> Vec<u8> {
        let mut out = Vec::new();
        push_int(&mut out, v);
        out
    }

    #[test]
    fn integer_forms() {
        assert_eq!(int(0), vec![139]);
        assert_eq!(int(-107), vec![32]);
        assert_eq!(int(107), vec![246]);
        assert_eq!(int(108), vec![247, 0]);
        assert_eq!(int(600), vec![248, 236]);
        assert_eq!(int(1131), vec![250, 255]);
        assert_eq!(int(-108), vec![251, 0]);
        assert_eq!(int(-1131), vec![254, 255]);
        assert_eq!(int(2000), vec![28, 0x07, 0xd0]);
        assert_eq!(int(-1200), vec![28, 0xfb, 0x50]);
    }

    #[test]
    fn empty_glyph_is_width_and_endchar() {
        let bytes = encode(&BezPath::new(), 600, &Hints::default());
        assert_eq!(bytes, vec![248, 236, op::ENDCHAR]);
    }

    #[test]
    fn width_packs_before_first_move() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((100.0, 0.0));
        path.line_to((50.0, 100.0));
        path.close_path();
        let bytes = encode(&path, 500, &Hints::default());
        let expected = vec![
            248, 136, // width 500
            139, 139, op::RMOVETO, // 0 0
            int(100)[0], 139, op::RLINETO,
            89, int(100)[0], op::RLINETO, // -50 100
            op::ENDCHAR,
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn hints_come_before_the_outline() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.close_path();
        let hints = Hints {
            hstems: vec![(0, 10), (90, 10)],
            vstems: vec![(20, 30)],
        };
        let bytes = encode(&path, 250, &hints);
        let expected = vec![
            247, 142, // width 250
            139, 149, // 0 10
            219, 149, // 80 10 (relative to previous top edge)
            op::HSTEM,
            159, 169, // 20 30
            op::VSTEM,
            139, 139, op::RMOVETO,
            149, 139, op::RLINETO,
            op::ENDCHAR,
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn deltas_use_rounded_positions() {
        // 0.6 and 1.2 round to 1 and 1: the second delta must be 0, not 1.
        let mut path = BezPath::new();
        path.move_to((0.6, 0.0));
        path.line_to((1.2, 0.0));
        path.close_path();
        let bytes = encode(&path, 0, &Hints::default());
        let expected = vec![
            139, // width 0
            140, 139, op::RMOVETO, // 1 0
            139, 139, op::RLINETO, // 0 0
            op::ENDCHAR,
        ];
        assert_eq!(bytes, expected);
    }
}
