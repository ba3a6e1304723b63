//! WOFF2 container writing.
//!
//! Repackages a compiled font: table data is concatenated in directory
//! order (untransformed; glyf and loca carry the null-transform marker) and
//! brotli-compressed into the WOFF2 container. Any `SVG ` table is dropped,
//! and the head checksum adjustment is recomputed for the reduced table set.

use std::fs;
use std::path::Path;

use write_fonts::read::{tables::compute_checksum, FontRef};
use write_fonts::types::Tag;

use crate::error::BuildError;

const SVG: Tag = Tag::new(b"SVG ");
const HEAD: Tag = Tag::new(b"head");
const GLYF: Tag = Tag::new(b"glyf");
const LOCA: Tag = Tag::new(b"loca");

const WOFF2_SIGNATURE: u32 = 0x774F_4632;
const WOFF2_HEADER_LEN: usize = 48;
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

/// Flag bits for the glyf/loca null transform (version 3).
const NULL_TRANSFORM: u8 = 0b1100_0000;

pub fn compress_file(input: &Path, output: &Path) -> Result<(), BuildError> {
    let data = fs::read(input)?;
    let woff2 = compress(&data)?;
    fs::write(output, woff2)?;
    log::info!("wrote {}", output.display());
    Ok(())
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>, BuildError> {
    let font = FontRef::new(data).map_err(|err| BuildError::ReadFont(err.to_string()))?;
    let flavor = font.table_directory().sfnt_version();

    let mut tables: Vec<(Tag, Vec<u8>)> = Vec::new();
    for record in font.table_directory().table_records() {
        let tag = record.tag();
        if tag == SVG {
            log::debug!("dropping SVG table");
            continue;
        }
        let data = font
            .table_data(tag)
            .ok_or_else(|| BuildError::ReadFont(format!("missing data for table '{tag}'")))?;
        tables.push((tag, data.as_bytes().to_vec()));
    }

    patch_head(&mut tables, flavor);

    let mut out = Vec::new();
    let stream_len: usize = tables.iter().map(|(_, data)| data.len()).sum();
    let mut stream = Vec::with_capacity(stream_len);
    for (_, data) in &tables {
        stream.extend_from_slice(data);
    }
    let mut compressed = Vec::new();
    brotli::BrotliCompress(
        &mut &stream[..],
        &mut compressed,
        &brotli::enc::BrotliEncoderParams::default(),
    )
    .map_err(|err| BuildError::ReadFont(format!("brotli compression failed: {err}")))?;

    let mut directory = Vec::new();
    for (tag, data) in &tables {
        directory.push(flag_byte(*tag));
        if known_table_index(*tag).is_none() {
            directory.extend_from_slice(&tag.to_be_bytes());
        }
        write_uint_base128(&mut directory, data.len() as u32);
    }

    let total_sfnt_size: usize = 12
        + 16 * tables.len()
        + tables
            .iter()
            .map(|(_, data)| round4(data.len()))
            .sum::<usize>();
    let mut file_len = WOFF2_HEADER_LEN + directory.len() + compressed.len();
    file_len = round4(file_len);

    write_u32(&mut out, WOFF2_SIGNATURE);
    write_u32(&mut out, flavor);
    write_u32(&mut out, file_len as u32);
    write_u16(&mut out, tables.len() as u16);
    write_u16(&mut out, 0); // reserved
    write_u32(&mut out, total_sfnt_size as u32);
    write_u32(&mut out, compressed.len() as u32);
    write_u16(&mut out, 0); // major version
    write_u16(&mut out, 0); // minor version
    write_u32(&mut out, 0); // metadata offset
    write_u32(&mut out, 0); // metadata length
    write_u32(&mut out, 0); // original metadata length
    write_u32(&mut out, 0); // private block offset
    write_u32(&mut out, 0); // private block length
    debug_assert_eq!(out.len(), WOFF2_HEADER_LEN);

    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    Ok(out)
}

/// Recompute the head checksum adjustment for the table set as it would
/// reconstruct into an sfnt.
fn patch_head(tables: &mut [(Tag, Vec<u8>)], flavor: u32) {
    let Some(head_ix) = tables.iter().position(|(tag, _)| *tag == HEAD) else {
        return;
    };
    if tables[head_ix].1.len() < 12 {
        return;
    }
    tables[head_ix].1[8..12].copy_from_slice(&[0; 4]);

    // Header and directory of the reconstructed font.
    let mut header = Vec::new();
    write_u32(&mut header, flavor);
    let num_tables = tables.len() as u16;
    let entry_selector = (num_tables as f32).log2() as u16;
    let search_range = 16 * (1 << entry_selector);
    write_u16(&mut header, num_tables);
    write_u16(&mut header, search_range);
    write_u16(&mut header, entry_selector);
    write_u16(&mut header, 16 * num_tables - search_range);

    let mut offset = 12 + 16 * tables.len() as u32;
    for (tag, data) in tables.iter() {
        let checksum = compute_checksum(data);
        header.extend_from_slice(&tag.to_be_bytes());
        write_u32(&mut header, checksum);
        write_u32(&mut header, offset);
        write_u32(&mut header, data.len() as u32);
        offset += round4(data.len()) as u32;
    }

    let mut total = compute_checksum(&header);
    for (_, data) in tables.iter() {
        total = total.wrapping_add(compute_checksum(data));
    }
    let adjustment = CHECKSUM_MAGIC.wrapping_sub(total);
    tables[head_ix].1[8..12].copy_from_slice(&adjustment.to_be_bytes());
}

fn flag_byte(tag: Tag) -> u8 {
    let index = known_table_index(tag).unwrap_or(63);
    if tag == GLYF || tag == LOCA {
        index | NULL_TRANSFORM
    } else {
        index
    }
}

/// The WOFF2 known-table index, for the tags this pipeline emits.
fn known_table_index(tag: Tag) -> Option<u8> {
    let index = match &tag.to_be_bytes() {
        b"cmap" => 0,
        b"head" => 1,
        b"hhea" => 2,
        b"hmtx" => 3,
        b"maxp" => 4,
        b"name" => 5,
        b"OS/2" => 6,
        b"post" => 7,
        b"cvt " => 8,
        b"fpgm" => 9,
        b"glyf" => 10,
        b"loca" => 11,
        b"prep" => 12,
        b"CFF " => 13,
        b"VORG" => 14,
        b"EBDT" => 15,
        b"EBLC" => 16,
        b"gasp" => 17,
        b"hdmx" => 18,
        b"kern" => 19,
        b"LTSH" => 20,
        b"PCLT" => 21,
        b"VDMX" => 22,
        b"vhea" => 23,
        b"vmtx" => 24,
        b"BASE" => 25,
        b"GDEF" => 26,
        b"GPOS" => 27,
        b"GSUB" => 28,
        _ => return None,
    };
    Some(index)
}

fn round4(len: usize) -> usize {
    (len + 3) & !3
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_uint_base128(out: &mut Vec<u8>, value: u32) {
    if value >= 1 << 28 {
        out.push(0x80 | (value >> 28) as u8);
    }
    if value >= 1 << 21 {
        out.push(0x80 | (value >> 21) as u8 & 0xff);
    }
    if value >= 1 << 14 {
        out.push(0x80 | (value >> 14) as u8 & 0xff);
    }
    if value >= 1 << 7 {
        out.push(0x80 | (value >> 7) as u8 & 0xff);
    }
    out.push((value & 0x7f) as u8);
}
