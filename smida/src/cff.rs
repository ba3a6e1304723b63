//! CFF table assembly.
//!
//! One non-CID font: header, Name/TopDict/String/GlobalSubr INDEXes, a
//! format 0 charset, the CharStrings INDEX and a Private DICT carrying the
//! hinting parameter block. Offsets that land in the Top DICT are encoded in
//! the fixed-width 5-byte form so the dict's size is independent of their
//! values.

use write_fonts::read::tables::postscript::StringId;

use crate::hinting::HintParams;

/// Size of the standard string set (Appendix A of the CFF spec); custom
/// strings are numbered after it.
const N_STD_STRINGS: u16 = 391;

pub struct CffFont<'a> {
    pub ps_name: &'a str,
    pub version: &'a str,
    pub notice: &'a str,
    pub full_name: &'a str,
    pub family_name: &'a str,
    pub weight: &'a str,
    pub units_per_em: u16,
    /// `[x_min, y_min, x_max, y_max]` over all glyphs.
    pub font_bbox: [i32; 4],
    /// `(glyph name, Type 2 charstring)`, `.notdef` first.
    pub charstrings: &'a [(String, Vec<u8>)],
    pub params: &'a HintParams,
}

mod op {
    pub const VERSION: u8 = 0;
    pub const NOTICE: u8 = 1;
    pub const FULL_NAME: u8 = 2;
    pub const FAMILY_NAME: u8 = 3;
    pub const WEIGHT: u8 = 4;
    pub const FONT_BBOX: u8 = 5;
    pub const BLUE_VALUES: u8 = 6;
    pub const OTHER_BLUES: u8 = 7;
    pub const STD_HW: u8 = 10;
    pub const STD_VW: u8 = 11;
    pub const CHARSET: u8 = 15;
    pub const CHAR_STRINGS: u8 = 17;
    pub const PRIVATE: u8 = 18;
    pub const ESCAPE: u8 = 12;
    pub const FONT_MATRIX: u8 = 7; // escaped
    pub const STEM_SNAP_H: u8 = 12; // escaped
    pub const STEM_SNAP_V: u8 = 13; // escaped
}

pub fn build(font: &CffFont) -> Vec<u8> {
    let mut strings = Strings::default();
    let sids = TopDictSids {
        version: strings.sid(font.version),
        notice: strings.sid(font.notice),
        full_name: strings.sid(font.full_name),
        family_name: strings.sid(font.family_name),
        weight: strings.sid(font.weight),
    };
    let charset_sids: Vec<u16> = font.charstrings[1..]
        .iter()
        .map(|(name, _)| strings.sid(name))
        .collect();

    let name_index = index(&[font.ps_name.as_bytes()]);
    let string_index = index(
        &strings
            .custom
            .iter()
            .map(|s| s.as_bytes())
            .collect::<Vec<_>>(),
    );
    let global_subrs = index(&[]);
    let charset = charset(&charset_sids);
    let charstring_index = index(
        &font
            .charstrings
            .iter()
            .map(|(_, cs)| cs.as_slice())
            .collect::<Vec<_>>(),
    );
    let private = private_dict(font.params);

    // The Top DICT's length does not depend on the offset values, so size it
    // with zeros first, then rebuild with real offsets.
    let sized = top_dict(font, &sids, 0, 0, private.len(), 0);
    let top_index_len = index(&[&sized]).len();

    let header: [u8; 4] = [1, 0, 4, 4];
    let charset_offset =
        header.len() + name_index.len() + top_index_len + string_index.len() + global_subrs.len();
    let charstrings_offset = charset_offset + charset.len();
    let private_offset = charstrings_offset + charstring_index.len();

    let top = top_dict(
        font,
        &sids,
        charset_offset as i32,
        charstrings_offset as i32,
        private.len(),
        private_offset as i32,
    );
    let top_index = index(&[&top]);
    debug_assert_eq!(top_index.len(), top_index_len);

    let mut out = Vec::new();
    out.extend_from_slice(&header);
    out.extend_from_slice(&name_index);
    out.extend_from_slice(&top_index);
    out.extend_from_slice(&string_index);
    out.extend_from_slice(&global_subrs);
    out.extend_from_slice(&charset);
    out.extend_from_slice(&charstring_index);
    out.extend_from_slice(&private);
    out
}

struct TopDictSids {
    version: u16,
    notice: u16,
    full_name: u16,
    family_name: u16,
    weight: u16,
}

fn top_dict(
    font: &CffFont,
    sids: &TopDictSids,
    charset_offset: i32,
    charstrings_offset: i32,
    private_len: usize,
    private_offset: i32,
) -> Vec<u8> {
    let mut dict = Vec::new();
    dict_int(&mut dict, sids.version as i32);
    dict.push(op::VERSION);
    dict_int(&mut dict, sids.notice as i32);
    dict.push(op::NOTICE);
    dict_int(&mut dict, sids.full_name as i32);
    dict.push(op::FULL_NAME);
    dict_int(&mut dict, sids.family_name as i32);
    dict.push(op::FAMILY_NAME);
    dict_int(&mut dict, sids.weight as i32);
    dict.push(op::WEIGHT);
    if font.units_per_em != 1000 {
        let scale = 1.0 / font.units_per_em as f64;
        for value in [scale, 0.0, 0.0, scale, 0.0, 0.0] {
            dict_number(&mut dict, value);
        }
        dict.push(op::ESCAPE);
        dict.push(op::FONT_MATRIX);
    }
    for value in font.font_bbox {
        dict_int(&mut dict, value);
    }
    dict.push(op::FONT_BBOX);
    dict_int_fixed(&mut dict, charset_offset);
    dict.push(op::CHARSET);
    dict_int_fixed(&mut dict, charstrings_offset);
    dict.push(op::CHAR_STRINGS);
    dict_int(&mut dict, private_len as i32);
    dict_int_fixed(&mut dict, private_offset);
    dict.push(op::PRIVATE);
    dict
}

fn private_dict(params: &HintParams) -> Vec<u8> {
    let mut dict = Vec::new();
    if !params.blue_values.is_empty() {
        dict_delta(&mut dict, &params.blue_values);
        dict.push(op::BLUE_VALUES);
    }
    if !params.other_blues.is_empty() {
        dict_delta(&mut dict, &params.other_blues);
        dict.push(op::OTHER_BLUES);
    }
    dict_number(&mut dict, params.std_hw);
    dict.push(op::STD_HW);
    dict_number(&mut dict, params.std_vw);
    dict.push(op::STD_VW);
    if !params.stem_snap_h.is_empty() {
        dict_delta_f64(&mut dict, &params.stem_snap_h);
        dict.push(op::ESCAPE);
        dict.push(op::STEM_SNAP_H);
    }
    if !params.stem_snap_v.is_empty() {
        dict_delta_f64(&mut dict, &params.stem_snap_v);
        dict.push(op::ESCAPE);
        dict.push(op::STEM_SNAP_V);
    }
    dict
}

fn charset(sids: &[u16]) -> Vec<u8> {
    let mut out = vec![0u8]; // format 0
    for sid in sids {
        out.extend_from_slice(&sid.to_be_bytes());
    }
    out
}

/// Map strings to SIDs: the 391 standard strings by position, custom strings
/// in first-use order after them.
#[derive(Default)]
struct Strings {
    custom: Vec<String>,
}

impl Strings {
    fn sid(&mut self, s: &str) -> u16 {
        let standard = (0..N_STD_STRINGS).find(|&ix| {
            StringId::new(ix)
                .standard_string()
                .is_ok_and(|std| std == s)
        });
        if let Some(ix) = standard {
            return ix;
        }
        let ix = match self.custom.iter().position(|c| c == s) {
            Some(ix) => ix,
            None => {
                self.custom.push(s.to_owned());
                self.custom.len() - 1
            }
        };
        N_STD_STRINGS + ix as u16
    }
}

fn index(items: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(items.len() as u16).to_be_bytes());
    if items.is_empty() {
        return out;
    }
    let data_len: usize = items.iter().map(|i| i.len()).sum();
    let end = data_len + 1;
    let off_size: u8 = match end {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xff_ffff => 3,
        _ => 4,
    };
    out.push(off_size);
    let mut offset = 1usize;
    let mut push_offset = |out: &mut Vec<u8>, offset: usize| {
        let bytes = (offset as u32).to_be_bytes();
        out.extend_from_slice(&bytes[4 - off_size as usize..]);
    };
    push_offset(&mut out, offset);
    for item in items {
        offset += item.len();
        push_offset(&mut out, offset);
    }
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

fn dict_int(out: &mut Vec<u8>, v: i32) {
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
        -32768..=32767 => {
            out.push(28);
            out.extend_from_slice(&(v as i16).to_be_bytes());
        }
        _ => dict_int_fixed(out, v),
    }
}

/// The 5-byte integer form, used where the operand's size must not depend on
/// its value.
fn dict_int_fixed(out: &mut Vec<u8>, v: i32) {
    out.push(29);
    out.extend_from_slice(&v.to_be_bytes());
}

fn dict_number(out: &mut Vec<u8>, v: f64) {
    if v.fract() == 0.0 && (i32::MIN as f64..=i32::MAX as f64).contains(&v) {
        dict_int(out, v as i32);
    } else {
        dict_real(out, v);
    }
}

/// Nibble-packed real number encoding.
fn dict_real(out: &mut Vec<u8>, v: f64) {
    let text = format!("{v}");
    let mut nibbles: Vec<u8> = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '0'..='9' => nibbles.push(c as u8 - b'0'),
            '.' => nibbles.push(0xa),
            '-' => nibbles.push(0xe),
            'e' => {
                if chars.peek() == Some(&'-') {
                    chars.next();
                    nibbles.push(0xc);
                } else {
                    nibbles.push(0xb);
                }
            }
            _ => {}
        }
    }
    nibbles.push(0xf);
    if nibbles.len() % 2 != 0 {
        nibbles.push(0xf);
    }
    out.push(30);
    for pair in nibbles.chunks(2) {
        out.push((pair[0] << 4) | pair[1]);
    }
}

fn dict_delta(out: &mut Vec<u8>, values: &[i32]) {
    let mut previous = 0;
    for &v in values {
        dict_int(out, v - previous);
        previous = v;
    }
}

fn dict_delta_f64(out: &mut Vec<u8>, values: &[f64]) {
    let mut previous = 0.0;
    for &v in values {
        dict_number(out, v - previous);
        previous = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use write_fonts::read::tables::cff::Cff;
    use write_fonts::read::{FontData, FontRead};

    #[test]
    fn integer_and_real_operands() {
        let mut out = Vec::new();
        dict_int(&mut out, 0);
        assert_eq!(out, vec![139]);

        out.clear();
        dict_int(&mut out, 2000);
        assert_eq!(out, vec![28, 0x07, 0xd0]);

        out.clear();
        dict_real(&mut out, 0.001);
        assert_eq!(out, vec![30, 0x0a, 0x00, 0x1f]);

        out.clear();
        dict_real(&mut out, -2.5);
        assert_eq!(out, vec![30, 0xe2, 0xa5, 0xff]);
    }

    #[test]
    fn index_layout() {
        let built = index(&[b"ab", b"c"]);
        assert_eq!(
            built,
            vec![0, 2, 1, 1, 3, 4, b'a', b'b', b'c']
        );
        assert_eq!(index(&[]), vec![0, 0]);
    }

    #[test]
    fn standard_and_custom_sids() {
        let mut strings = Strings::default();
        // ".notdef" is standard string 0.
        assert_eq!(strings.sid(".notdef"), 0);
        assert_eq!(strings.sid("space"), 1);
        let custom = strings.sid("alef-ar");
        assert_eq!(custom, N_STD_STRINGS);
        // Repeated lookups reuse the slot.
        assert_eq!(strings.sid("alef-ar"), custom);
    }

    #[test]
    fn built_table_parses() {
        let params = HintParams {
            blue_values: vec![-16, 0, 700, 716],
            other_blues: vec![-216, -200],
            stem_snap_h: vec![90.0],
            stem_snap_v: vec![120.0],
            std_hw: 90.0,
            std_vw: 120.0,
        };
        let charstrings = vec![
            (".notdef".to_owned(), vec![139, 14]),
            ("alef-ar".to_owned(), vec![248, 136, 139, 14]),
        ];
        let table = build(&CffFont {
            ps_name: "Test-Regular",
            version: "1.000",
            notice: "(c) 2026",
            full_name: "Test Regular",
            family_name: "Test",
            weight: "Regular",
            units_per_em: 1000,
            font_bbox: [0, -200, 600, 800],
            charstrings: &charstrings,
            params: &params,
        });
        let cff = Cff::read(FontData::new(&table)).unwrap();
        assert_eq!(cff.name(0).unwrap().to_string(), "Test-Regular");
        assert_eq!(cff.top_dicts().count(), 1);
    }
}
