//! The BFFNT bitmap font container.
//!
//! A font is one FFNT header, one FINF (font metrics and the offsets
//! of everything else), one TGLP (glyph cell geometry plus the tiled
//! sheet images), a chain of CWDH sections (per-glyph width records)
//! and a chain of CMAP sections (code point to glyph index maps).
//! FINF's three offsets, and the chain links, all point at a section's
//! body; the magic sits eight bytes before.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ctr_types::{ByteOrder, Tag};

use crate::data::ByteData;
use crate::error::{BuildError, ParseError};
use crate::pixel::{Bitmap, PixelFormat};
use crate::section::{body_offset, next_section_position, SectionHeader};
use crate::swizzle;
use crate::writer::Writer;

pub const FFNT_MAGIC: Tag = Tag::new(b"FFNT");
/// Accepted alongside FFNT; carried through verbatim.
pub const FFNU_MAGIC: Tag = Tag::new(b"FFNU");
const FINF_MAGIC: Tag = Tag::new(b"FINF");
const TGLP_MAGIC: Tag = Tag::new(b"TGLP");
const CWDH_MAGIC: Tag = Tag::new(b"CWDH");
const CMAP_MAGIC: Tag = Tag::new(b"CMAP");

const FFNT_HEADER_LEN: u16 = 0x14;
const FINF_LEN: u32 = 0x20;
const CWDH_HEADER_LEN: u32 = 0x10;
const CMAP_HEADER_LEN: u32 = 0x14;

pub const VERSION_4: u32 = 0x0400_0000;
pub const VERSION_3: u32 = 0x0300_0000;

/// Glyph indices map to "no glyph" with this value in table mode.
pub const UNMAPPED: u16 = 0xFFFF;

/// A decoded bitmap font.
#[derive(Debug, Clone)]
pub struct Bffnt {
    pub order: ByteOrder,
    /// FFNT or FFNU, preserved verbatim.
    pub magic: Tag,
    /// 0x04000000 or 0x03000000, preserved verbatim.
    pub version: u32,
    pub finf: Finf,
    pub tglp: Tglp,
    /// Width sections, each covering a contiguous glyph index range.
    pub widths: Vec<WidthSection>,
    /// Code maps, tried in order during lookup.
    pub maps: Vec<CodeMap>,
    /// One decoded RGBA8 bitmap per sheet.
    pub sheets: Vec<Bitmap>,
}

/// FINF: font-wide metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finf {
    pub font_type: u8,
    pub height: u8,
    pub width: u8,
    pub ascent: u8,
    pub line_feed: u16,
    pub alter_char_index: u16,
    pub default_width: GlyphWidth,
    pub encoding: u8,
}

/// One glyph's width record: left bearing, glyph width, advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphWidth {
    pub left: i8,
    pub glyph: u8,
    #[serde(rename = "char")]
    pub char_width: u8,
}

/// TGLP: glyph cell geometry and sheet layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tglp {
    pub cell_width: u8,
    pub cell_height: u8,
    pub sheet_count: u8,
    pub max_char_width: u8,
    pub sheet_size: u32,
    pub baseline: u16,
    pub format: PixelFormat,
    pub sheet_cols: u16,
    pub sheet_rows: u16,
    pub sheet_width: u16,
    pub sheet_height: u16,
    pub sheet_data_offset: u32,
}

/// CWDH: width records for glyph indices `start_index..=end_index`.
///
/// On the wire the end index is stored decremented by one; parsing
/// restores it, so the in-memory bounds are always inclusive and
/// `widths.len() == end_index - start_index + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidthSection {
    pub start_index: u16,
    pub end_index: u16,
    pub widths: Vec<GlyphWidth>,
}

/// CMAP: one code-point range and its mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMap {
    pub code_begin: u16,
    pub code_end: u16,
    /// The unknown u16 between the mapping type and the chain offset,
    /// preserved for byte-exact round trips.
    pub reserved: u16,
    pub mapping: Mapping,
}

/// The three CMAP body variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapping {
    /// Codes map to consecutive indices starting at `index_offset`.
    Direct { index_offset: u16 },
    /// One index per code in the range; [`UNMAPPED`] for holes.
    Table { indices: Vec<u16> },
    /// An explicit (code point, index) list; anything absent is
    /// unmapped.
    Scan { entries: Vec<(u16, u16)> },
}

/// The BFFNT pixel-format code table (distinct from BFLIM's).
pub fn format_from_code(code: u8) -> Option<PixelFormat> {
    Some(match code {
        0x00 => PixelFormat::Rgba8,
        0x01 => PixelFormat::Rgb8,
        0x02 => PixelFormat::Rgba5551,
        0x03 => PixelFormat::Rgb565,
        0x04 => PixelFormat::Rgba4,
        0x05 => PixelFormat::La8,
        0x06 => PixelFormat::Hilo8,
        0x07 => PixelFormat::L8,
        0x08 => PixelFormat::A8,
        0x09 => PixelFormat::La4,
        0x0A => PixelFormat::L4,
        0x0B => PixelFormat::A4,
        0x0C => PixelFormat::Etc1,
        0x0D => PixelFormat::Etc1A4,
        _ => return None,
    })
}

pub fn format_code(format: PixelFormat) -> u8 {
    match format {
        PixelFormat::Rgba8 => 0x00,
        PixelFormat::Rgb8 => 0x01,
        PixelFormat::Rgba5551 => 0x02,
        PixelFormat::Rgb565 => 0x03,
        PixelFormat::Rgba4 => 0x04,
        PixelFormat::La8 => 0x05,
        PixelFormat::Hilo8 => 0x06,
        PixelFormat::L8 => 0x07,
        PixelFormat::A8 => 0x08,
        PixelFormat::La4 => 0x09,
        PixelFormat::L4 => 0x0A,
        PixelFormat::A4 => 0x0B,
        PixelFormat::Etc1 => 0x0C,
        PixelFormat::Etc1A4 => 0x0D,
    }
}

impl CodeMap {
    /// Look a code point up in this map alone.
    pub fn lookup(&self, codepoint: u16) -> Option<u16> {
        match &self.mapping {
            Mapping::Direct { index_offset } => {
                if (self.code_begin..=self.code_end).contains(&codepoint) {
                    Some(codepoint - self.code_begin + index_offset)
                } else {
                    None
                }
            }
            Mapping::Table { indices } => {
                if !(self.code_begin..=self.code_end).contains(&codepoint) {
                    return None;
                }
                match indices.get(usize::from(codepoint - self.code_begin)) {
                    Some(&UNMAPPED) | None => None,
                    Some(&index) => Some(index),
                }
            }
            Mapping::Scan { entries } => entries
                .iter()
                .find(|(code, _)| *code == codepoint)
                .map(|&(_, index)| index),
        }
    }
}

impl Bffnt {
    /// Parse a font from its raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Bffnt, ParseError> {
        let data = ByteData::new(bytes);
        let magic = data.tag_at(0)?;
        if magic != FFNT_MAGIC && magic != FFNU_MAGIC {
            return Err(ParseError::BadMagic {
                container: "BFFNT",
                found: magic.to_string(),
                expected: "FFNT",
            });
        }
        let bom = [
            data.read_at::<u8>(4, ByteOrder::Big)?,
            data.read_at::<u8>(5, ByteOrder::Big)?,
        ];
        let order =
            ByteOrder::from_bom(bom).ok_or(ParseError::BadBom(u16::from_be_bytes(bom)))?;

        let mut cursor = data.cursor(order);
        cursor.seek(6);
        let header_size: u16 = cursor.read()?;
        if header_size != FFNT_HEADER_LEN {
            return Err(ParseError::BadHeaderSize {
                container: "FFNT",
                found: header_size.into(),
                expected: FFNT_HEADER_LEN.into(),
            });
        }
        let version: u32 = cursor.read()?;
        if version != VERSION_4 && version != VERSION_3 {
            return Err(ParseError::UnknownVersion(version));
        }
        let file_size: u32 = cursor.read()?;
        if file_size as usize != bytes.len() {
            return Err(ParseError::SizeMismatch {
                container: "BFFNT",
                header: file_size.into(),
                actual: bytes.len() as u64,
            });
        }
        let section_count: u16 = cursor.read()?;
        cursor.skip(2);
        log::debug!("FFNT: version 0x{version:08X}, {section_count} sections");

        // FINF
        let finf_header = SectionHeader::expect(&mut cursor, FINF_MAGIC, "BFFNT")?;
        if finf_header.size != FINF_LEN {
            return Err(ParseError::BadHeaderSize {
                container: "FINF",
                found: finf_header.size,
                expected: FINF_LEN,
            });
        }
        let finf = Finf {
            font_type: cursor.read()?,
            height: cursor.read()?,
            width: cursor.read()?,
            ascent: cursor.read()?,
            line_feed: cursor.read()?,
            alter_char_index: cursor.read()?,
            default_width: GlyphWidth {
                left: cursor.read()?,
                glyph: cursor.read()?,
                char_width: cursor.read()?,
            },
            encoding: cursor.read()?,
        };
        let tglp_offset: u32 = cursor.read()?;
        let cwdh_offset: u32 = cursor.read()?;
        let cmap_offset: u32 = cursor.read()?;

        // TGLP and its sheets
        let tglp_pos =
            next_section_position(tglp_offset).ok_or(ParseError::TruncatedSection("TGLP"))?;
        cursor.seek(tglp_pos);
        SectionHeader::expect(&mut cursor, TGLP_MAGIC, "BFFNT")?;
        let cell_width: u8 = cursor.read()?;
        let cell_height: u8 = cursor.read()?;
        let sheet_count: u8 = cursor.read()?;
        let max_char_width: u8 = cursor.read()?;
        let sheet_size: u32 = cursor.read()?;
        let baseline: u16 = cursor.read()?;
        let format_code_raw: u16 = cursor.read()?;
        let format = u8::try_from(format_code_raw)
            .ok()
            .and_then(format_from_code)
            .ok_or(ParseError::UnknownPixelFormat(format_code_raw as u8))?;
        let tglp = Tglp {
            cell_width,
            cell_height,
            sheet_count,
            max_char_width,
            sheet_size,
            baseline,
            format,
            sheet_cols: cursor.read()?,
            sheet_rows: cursor.read()?,
            sheet_width: cursor.read()?,
            sheet_height: cursor.read()?,
            sheet_data_offset: cursor.read()?,
        };
        log::debug!(
            "TGLP: {} sheets of {}x{} {}",
            tglp.sheet_count,
            tglp.sheet_width,
            tglp.sheet_height,
            format.name()
        );
        let mut sheets = Vec::with_capacity(tglp.sheet_count.into());
        for i in 0..usize::from(tglp.sheet_count) {
            let start = tglp.sheet_data_offset as usize + i * tglp.sheet_size as usize;
            let sheet = data
                .slice(start, tglp.sheet_size as usize)
                .map_err(|_| ParseError::TruncatedSection("TGLP"))?;
            sheets.push(swizzle::decode_sheet(
                sheet,
                tglp.sheet_width.into(),
                tglp.sheet_height.into(),
                format,
                order,
            )?);
        }

        // CWDH chain
        let mut widths = Vec::new();
        let mut next = cwdh_offset;
        while let Some(pos) = next_section_position(next) {
            cursor.seek(pos);
            SectionHeader::expect(&mut cursor, CWDH_MAGIC, "BFFNT")?;
            let start_index: u16 = cursor.read()?;
            let stored_end: u16 = cursor.read()?;
            next = cursor.read()?;
            // the writer stores the end index decremented by one
            let end_index = stored_end
                .checked_add(1)
                .ok_or(ParseError::TruncatedSection("CWDH"))?;
            if end_index < start_index {
                return Err(ParseError::TruncatedSection("CWDH"));
            }
            let count = usize::from(end_index - start_index) + 1;
            let mut records = Vec::with_capacity(count);
            for _ in 0..count {
                records.push(GlyphWidth {
                    left: cursor.read()?,
                    glyph: cursor.read()?,
                    char_width: cursor.read()?,
                });
            }
            widths.push(WidthSection {
                start_index,
                end_index,
                widths: records,
            });
        }

        // CMAP chain
        let mut maps = Vec::new();
        let mut next = cmap_offset;
        while let Some(pos) = next_section_position(next) {
            cursor.seek(pos);
            SectionHeader::expect(&mut cursor, CMAP_MAGIC, "BFFNT")?;
            let code_begin: u16 = cursor.read()?;
            let code_end: u16 = cursor.read()?;
            let mapping_type: u16 = cursor.read()?;
            let reserved: u16 = cursor.read()?;
            next = cursor.read()?;
            let mapping = match mapping_type {
                0 => Mapping::Direct {
                    index_offset: cursor.read()?,
                },
                1 => {
                    if code_end < code_begin {
                        return Err(ParseError::TruncatedSection("CMAP"));
                    }
                    let count = usize::from(code_end - code_begin) + 1;
                    let mut indices = Vec::with_capacity(count);
                    for _ in 0..count {
                        indices.push(cursor.read()?);
                    }
                    Mapping::Table { indices }
                }
                2 => {
                    let count: u16 = cursor.read()?;
                    let mut entries = Vec::with_capacity(count.into());
                    for _ in 0..count {
                        let code = cursor.read()?;
                        let index = cursor.read()?;
                        entries.push((code, index));
                    }
                    Mapping::Scan { entries }
                }
                other => return Err(ParseError::InvalidMappingType(other)),
            };
            maps.push(CodeMap {
                code_begin,
                code_end,
                reserved,
                mapping,
            });
        }

        Ok(Bffnt {
            order,
            magic,
            version,
            finf,
            tglp,
            widths,
            maps,
            sheets,
        })
    }

    /// Resolve a code point to a glyph index through the map chain.
    pub fn glyph_index(&self, codepoint: u16) -> Option<u16> {
        self.maps.iter().find_map(|map| map.lookup(codepoint))
    }

    /// The width record for a glyph index, falling back to the font's
    /// default record.
    pub fn glyph_width(&self, index: u16) -> GlyphWidth {
        for section in &self.widths {
            if (section.start_index..=section.end_index).contains(&index) {
                return section.widths[usize::from(index - section.start_index)];
            }
        }
        self.finf.default_width
    }

    /// Serialize the font.
    ///
    /// Sheets are re-packed from their bitmaps, so fonts in a block
    /// format cannot be rebuilt.
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        for (i, sheet) in self.sheets.iter().enumerate() {
            let expected = (self.tglp.sheet_width.into(), self.tglp.sheet_height.into());
            let found = (sheet.width(), sheet.height());
            if found != expected {
                log::debug!("sheet {i} has the wrong dimensions");
                return Err(BuildError::DimensionMismatch { expected, found });
            }
        }
        if usize::from(self.tglp.sheet_count) != self.sheets.len() {
            return Err(BuildError::InvalidInput(format!(
                "font declares {} sheets but {} were provided",
                self.tglp.sheet_count,
                self.sheets.len()
            )));
        }

        let mut w = Writer::new(self.order);
        w.write_tag(self.magic);
        w.write_bytes(&self.order.to_bom());
        w.write(FFNT_HEADER_LEN);
        w.write(self.version);
        w.write(0u32); // patched: total file size
        w.write(0u16); // patched: section count
        w.write(0u16);

        w.write_tag(FINF_MAGIC);
        w.write(FINF_LEN);
        w.write(self.finf.font_type);
        w.write(self.finf.height);
        w.write(self.finf.width);
        w.write(self.finf.ascent);
        w.write(self.finf.line_feed);
        w.write(self.finf.alter_char_index);
        w.write(self.finf.default_width.left);
        w.write(self.finf.default_width.glyph);
        w.write(self.finf.default_width.char_width);
        w.write(self.finf.encoding);
        let section_offsets_pos = w.position();
        w.write(0u32); // patched: TGLP body offset
        w.write(0u32); // patched: first CWDH body offset
        w.write(0u32); // patched: first CMAP body offset

        // TGLP and sheet data
        let tglp_pos = w.position();
        w.patch(section_offsets_pos, body_offset(tglp_pos));
        let sheet_bytes: Vec<Vec<u8>> = self
            .sheets
            .iter()
            .map(|sheet| swizzle::encode_sheet(sheet, self.tglp.format, self.order))
            .collect::<Result<_, _>>()?;
        let sheet_size = sheet_bytes.first().map(Vec::len).unwrap_or(0) as u32;
        let data_offset = self.tglp.sheet_data_offset as usize;
        if data_offset < tglp_pos + 0x20 {
            return Err(BuildError::InvalidInput(format!(
                "sheet data offset 0x{data_offset:X} overlaps the TGLP header"
            )));
        }
        let tglp_size =
            (data_offset - tglp_pos) as u32 + sheet_size * u32::from(self.tglp.sheet_count);
        w.write_tag(TGLP_MAGIC);
        w.write(tglp_size);
        w.write(self.tglp.cell_width);
        w.write(self.tglp.cell_height);
        w.write(self.tglp.sheet_count);
        w.write(self.tglp.max_char_width);
        w.write(sheet_size);
        w.write(self.tglp.baseline);
        w.write(u16::from(format_code(self.tglp.format)));
        w.write(self.tglp.sheet_cols);
        w.write(self.tglp.sheet_rows);
        w.write(self.tglp.sheet_width);
        w.write(self.tglp.sheet_height);
        w.write(self.tglp.sheet_data_offset);
        w.pad_to(data_offset);
        for sheet in &sheet_bytes {
            w.write_bytes(sheet);
        }

        // CWDH chain, ordered by start index
        let mut width_order: Vec<&WidthSection> = self.widths.iter().collect();
        width_order.sort_by_key(|section| section.start_index);
        let mut previous_link = section_offsets_pos + 4;
        for section in width_order {
            if section.end_index < section.start_index
                || section.end_index == 0
                || section.widths.len() != usize::from(section.end_index - section.start_index) + 1
            {
                return Err(BuildError::InvalidInput(format!(
                    "width section {}..={} carries {} records",
                    section.start_index,
                    section.end_index,
                    section.widths.len()
                )));
            }
            w.align(4, 0);
            let pos = w.position();
            w.patch(previous_link, body_offset(pos));
            w.write_tag(CWDH_MAGIC);
            w.write(CWDH_HEADER_LEN + section.widths.len() as u32 * 3);
            w.write(section.start_index);
            // the stored end index is decremented by one
            w.write(section.end_index - 1);
            previous_link = w.position();
            w.write(0u32); // patched: next CWDH body offset, 0 terminates
            for record in &section.widths {
                w.write(record.left);
                w.write(record.glyph);
                w.write(record.char_width);
            }
        }

        // CMAP chain
        let mut previous_link = section_offsets_pos + 8;
        for map in &self.maps {
            w.align(4, 0);
            let pos = w.position();
            w.patch(previous_link, body_offset(pos));
            w.write_tag(CMAP_MAGIC);
            let body_len = match &map.mapping {
                Mapping::Direct { .. } => 2,
                Mapping::Table { indices } => indices.len() as u32 * 2,
                Mapping::Scan { entries } => 2 + entries.len() as u32 * 4,
            };
            w.write(CMAP_HEADER_LEN + body_len);
            w.write(map.code_begin);
            w.write(map.code_end);
            w.write(match &map.mapping {
                Mapping::Direct { .. } => 0u16,
                Mapping::Table { .. } => 1,
                Mapping::Scan { .. } => 2,
            });
            w.write(map.reserved);
            previous_link = w.position();
            w.write(0u32); // patched: next CMAP body offset, 0 terminates
            match &map.mapping {
                Mapping::Direct { index_offset } => w.write(*index_offset),
                Mapping::Table { indices } => {
                    if map.code_end < map.code_begin
                        || indices.len() != usize::from(map.code_end - map.code_begin) + 1
                    {
                        return Err(BuildError::InvalidInput(format!(
                            "table map {:#X}..={:#X} carries {} indices",
                            map.code_begin,
                            map.code_end,
                            indices.len()
                        )));
                    }
                    for index in indices {
                        w.write(*index);
                    }
                }
                Mapping::Scan { entries } => {
                    w.write(entries.len() as u16);
                    for (code, index) in entries {
                        w.write(*code);
                        w.write(*index);
                    }
                }
            }
        }

        let total = w.position();
        w.patch(0x0C, total as u32);
        let section_count = 2 + self.widths.len() + self.maps.len();
        w.patch(0x10, section_count as u16);
        Ok(w.into_vec())
    }
}

// ---- the JSON manifest ----

/// The authoring document written on extract and read on create.
///
/// Keys of the two maps are strings because JSON object keys are:
/// glyph width keys are base-10 glyph indices, glyph map keys are the
/// single-character string of each code point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(rename = "fileType")]
    pub file_type: String,
    #[serde(rename = "fontInfo")]
    pub font_info: ManifestFontInfo,
    #[serde(rename = "textureInfo")]
    pub texture_info: ManifestTextureInfo,
    #[serde(rename = "glyphWidths")]
    pub glyph_widths: BTreeMap<String, GlyphWidth>,
    #[serde(rename = "glyphMap")]
    pub glyph_map: BTreeMap<String, u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFontInfo {
    pub height: u8,
    pub width: u8,
    pub ascent: u8,
    #[serde(rename = "lineFeed")]
    pub line_feed: u16,
    #[serde(rename = "alterCharIdx")]
    pub alter_char_index: u16,
    #[serde(rename = "defaultWidth")]
    pub default_width: ManifestDefaultWidth,
    #[serde(rename = "fontType")]
    pub font_type: u8,
    pub encoding: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDefaultWidth {
    pub left: i8,
    #[serde(rename = "glyphWidth")]
    pub glyph_width: u8,
    #[serde(rename = "charWidth")]
    pub char_width: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestTextureInfo {
    pub glyph: ManifestGlyphCell,
    #[serde(rename = "sheetCount")]
    pub sheet_count: u8,
    #[serde(rename = "sheetInfo")]
    pub sheet_info: ManifestSheetInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestGlyphCell {
    pub width: u8,
    pub height: u8,
    pub baseline: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSheetInfo {
    pub cols: u16,
    pub rows: u16,
    pub width: u16,
    pub height: u16,
    #[serde(rename = "colorFormat")]
    pub color_format: String,
}

impl Bffnt {
    /// Flatten the font into its manifest document.
    pub fn to_manifest(&self) -> Manifest {
        let mut glyph_widths = BTreeMap::new();
        for section in &self.widths {
            for (i, record) in section.widths.iter().enumerate() {
                let index = section.start_index + i as u16;
                glyph_widths.insert(index.to_string(), *record);
            }
        }
        let mut glyph_map = BTreeMap::new();
        for map in &self.maps {
            let mut insert = |code: u16, index: u16| {
                match char::from_u32(code.into()) {
                    Some(c) => {
                        glyph_map.insert(c.to_string(), index);
                    }
                    None => log::warn!("code point 0x{code:04X} is not a scalar value; skipped"),
                }
            };
            match &map.mapping {
                Mapping::Direct { index_offset } => {
                    for code in map.code_begin..=map.code_end {
                        insert(code, code - map.code_begin + index_offset);
                    }
                }
                Mapping::Table { indices } => {
                    for (i, &index) in indices.iter().enumerate() {
                        if index != UNMAPPED {
                            insert(map.code_begin + i as u16, index);
                        }
                    }
                }
                Mapping::Scan { entries } => {
                    for &(code, index) in entries {
                        insert(code, index);
                    }
                }
            }
        }
        Manifest {
            version: self.version,
            file_type: self.magic.to_string(),
            font_info: ManifestFontInfo {
                height: self.finf.height,
                width: self.finf.width,
                ascent: self.finf.ascent,
                line_feed: self.finf.line_feed,
                alter_char_index: self.finf.alter_char_index,
                default_width: ManifestDefaultWidth {
                    left: self.finf.default_width.left,
                    glyph_width: self.finf.default_width.glyph,
                    char_width: self.finf.default_width.char_width,
                },
                font_type: self.finf.font_type,
                encoding: self.finf.encoding,
            },
            texture_info: ManifestTextureInfo {
                glyph: ManifestGlyphCell {
                    width: self.tglp.cell_width,
                    height: self.tglp.cell_height,
                    baseline: self.tglp.baseline,
                },
                sheet_count: self.tglp.sheet_count,
                sheet_info: ManifestSheetInfo {
                    cols: self.tglp.sheet_cols,
                    rows: self.tglp.sheet_rows,
                    width: self.tglp.sheet_width,
                    height: self.tglp.sheet_height,
                    color_format: self.tglp.format.name().to_string(),
                },
            },
            glyph_widths,
            glyph_map,
        }
    }

    /// Assemble a font from a manifest and its sheet bitmaps.
    ///
    /// Width records are regrouped into one CWDH per contiguous index
    /// run; the glyph map becomes a single scan-mode CMAP over all
    /// authored code points.
    pub fn from_manifest(
        manifest: &Manifest,
        sheets: Vec<Bitmap>,
        order: ByteOrder,
    ) -> Result<Bffnt, BuildError> {
        let magic = match manifest.file_type.as_str() {
            "FFNT" => FFNT_MAGIC,
            "FFNU" => FFNU_MAGIC,
            other => {
                return Err(BuildError::InvalidInput(format!(
                    "unknown file type \"{other}\""
                )))
            }
        };
        let format = PixelFormat::from_name(&manifest.texture_info.sheet_info.color_format)
            .ok_or_else(|| {
                BuildError::UnknownFormatName(manifest.texture_info.sheet_info.color_format.clone())
            })?;

        // numeric order, not the map's lexicographic key order
        let mut indexed: Vec<(u16, GlyphWidth)> = Vec::with_capacity(manifest.glyph_widths.len());
        for (key, record) in &manifest.glyph_widths {
            let index: u16 = key.parse().map_err(|_| {
                BuildError::InvalidInput(format!("glyph width key \"{key}\" is not an index"))
            })?;
            indexed.push((index, *record));
        }
        indexed.sort_by_key(|&(index, _)| index);
        let mut widths: Vec<WidthSection> = Vec::new();
        for (index, record) in indexed {
            match widths.last_mut() {
                Some(section) if section.end_index + 1 == index => {
                    section.end_index = index;
                    section.widths.push(record);
                }
                _ => widths.push(WidthSection {
                    start_index: index,
                    end_index: index,
                    widths: vec![record],
                }),
            }
        }

        let mut entries: Vec<(u16, u16)> = Vec::with_capacity(manifest.glyph_map.len());
        for (key, &index) in &manifest.glyph_map {
            let mut chars = key.chars();
            let (code, rest) = (chars.next(), chars.next());
            let code = match (code, rest) {
                (Some(c), None) => u16::try_from(c as u32).map_err(|_| {
                    BuildError::InvalidInput(format!("code point {c:?} is outside the BMP"))
                })?,
                _ => {
                    return Err(BuildError::InvalidInput(format!(
                        "glyph map key \"{key}\" is not a single character"
                    )))
                }
            };
            entries.push((code, index));
        }
        entries.sort_by_key(|&(code, _)| code);
        let maps = if entries.is_empty() {
            Vec::new()
        } else {
            vec![CodeMap {
                code_begin: entries[0].0,
                code_end: entries[entries.len() - 1].0,
                reserved: 0,
                mapping: Mapping::Scan { entries },
            }]
        };

        let sheet_width = manifest.texture_info.sheet_info.width;
        let sheet_height = manifest.texture_info.sheet_info.height;
        let tglp = Tglp {
            cell_width: manifest.texture_info.glyph.width,
            cell_height: manifest.texture_info.glyph.height,
            sheet_count: manifest.texture_info.sheet_count,
            max_char_width: manifest.font_info.default_width.char_width,
            sheet_size: swizzle::sheet_byte_len(sheet_width.into(), sheet_height.into(), format)
                as u32,
            baseline: manifest.texture_info.glyph.baseline,
            format,
            sheet_cols: manifest.texture_info.sheet_info.cols,
            sheet_rows: manifest.texture_info.sheet_info.rows,
            sheet_width,
            sheet_height,
            sheet_data_offset: 0x2000,
        };

        Ok(Bffnt {
            order,
            magic,
            version: manifest.version,
            finf: Finf {
                font_type: manifest.font_info.font_type,
                height: manifest.font_info.height,
                width: manifest.font_info.width,
                ascent: manifest.font_info.ascent,
                line_feed: manifest.font_info.line_feed,
                alter_char_index: manifest.font_info.alter_char_index,
                default_width: GlyphWidth {
                    left: manifest.font_info.default_width.left,
                    glyph: manifest.font_info.default_width.glyph_width,
                    char_width: manifest.font_info.default_width.char_width,
                },
                encoding: manifest.font_info.encoding,
            },
            tglp,
            widths,
            maps,
            sheets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctr_types::Rgba;
    use pretty_assertions::assert_eq;

    fn test_sheet(width: u32, height: u32) -> Bitmap {
        let mut bmp = Bitmap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                bmp.set_pixel(x, y, Rgba::new(x as u8, y as u8, 0x40, 0xFF));
            }
        }
        bmp
    }

    fn small_font(order: ByteOrder) -> Bffnt {
        Bffnt {
            order,
            magic: FFNT_MAGIC,
            version: VERSION_4,
            finf: Finf {
                font_type: 1,
                height: 16,
                width: 8,
                ascent: 12,
                line_feed: 18,
                alter_char_index: 0,
                default_width: GlyphWidth {
                    left: 0,
                    glyph: 8,
                    char_width: 8,
                },
                encoding: 1,
            },
            tglp: Tglp {
                cell_width: 8,
                cell_height: 16,
                sheet_count: 1,
                max_char_width: 8,
                sheet_size: swizzle::sheet_byte_len(32, 16, PixelFormat::Rgba8) as u32,
                baseline: 12,
                format: PixelFormat::Rgba8,
                sheet_cols: 4,
                sheet_rows: 1,
                sheet_width: 32,
                sheet_height: 16,
                sheet_data_offset: 0x2000,
            },
            widths: vec![WidthSection {
                start_index: 0,
                end_index: 3,
                widths: vec![
                    GlyphWidth { left: 0, glyph: 8, char_width: 8 },
                    GlyphWidth { left: 1, glyph: 7, char_width: 8 },
                    GlyphWidth { left: -1, glyph: 8, char_width: 7 },
                    GlyphWidth { left: 0, glyph: 6, char_width: 6 },
                ],
            }],
            maps: vec![CodeMap {
                code_begin: 0x41,
                code_end: 0x44,
                reserved: 0,
                mapping: Mapping::Scan {
                    entries: vec![(0x41, 0), (0x42, 1), (0x43, 2), (0x44, 3)],
                },
            }],
            sheets: vec![test_sheet(32, 16)],
        }
    }

    #[test]
    fn round_trip_both_orders() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let font = small_font(order);
            let bytes = font.build().unwrap();
            let parsed = Bffnt::parse(&bytes).unwrap();
            assert_eq!(parsed.order, order);
            assert_eq!(parsed.finf, font.finf);
            assert_eq!(parsed.tglp, font.tglp);
            assert_eq!(parsed.widths, font.widths);
            assert_eq!(parsed.maps, font.maps);
            assert_eq!(parsed.sheets, font.sheets);
            assert_eq!(parsed.build().unwrap(), bytes);
        }
    }

    #[test]
    fn header_patches_land_at_known_positions() {
        let bytes = small_font(ByteOrder::Little).build().unwrap();
        // total file size at 0x0C
        let size = u32::from_le_bytes(bytes[0x0C..0x10].try_into().unwrap());
        assert_eq!(size as usize, bytes.len());
        // section count at 0x10: FINF + TGLP + 1 CWDH + 1 CMAP
        let sections = u16::from_le_bytes(bytes[0x10..0x12].try_into().unwrap());
        assert_eq!(sections, 4);
        // sheet data begins at 0x2000
        assert!(bytes.len() > 0x2000);
    }

    #[test]
    fn cwdh_end_index_is_stored_decremented() {
        let font = small_font(ByteOrder::Little);
        let bytes = font.build().unwrap();
        // FINF's cwdh offset field (0x2C) points at the section body
        let cwdh_body = u32::from_le_bytes(bytes[0x2C..0x30].try_into().unwrap()) as usize;
        let cwdh = cwdh_body - 8;
        assert_eq!(&bytes[cwdh..cwdh + 4], b"CWDH");
        let start = u16::from_le_bytes(bytes[cwdh + 8..cwdh + 10].try_into().unwrap());
        let stored_end = u16::from_le_bytes(bytes[cwdh + 10..cwdh + 12].try_into().unwrap());
        assert_eq!(start, 0);
        assert_eq!(stored_end, 2); // in-memory end index 3, minus one
        let parsed = Bffnt::parse(&bytes).unwrap();
        assert_eq!(parsed.widths[0].end_index, 3);
    }

    #[test]
    fn code_map_dispatch() {
        let mut font = small_font(ByteOrder::Little);
        font.maps = vec![
            CodeMap {
                code_begin: 0x20,
                code_end: 0x7F,
                reserved: 0,
                mapping: Mapping::Direct { index_offset: 1 },
            },
            CodeMap {
                code_begin: 0xFF21,
                code_end: 0xFF22,
                reserved: 0,
                mapping: Mapping::Scan {
                    entries: vec![(0xFF21, 100), (0xFF22, 101)],
                },
            },
        ];
        assert_eq!(font.glyph_index(0x41), Some(34));
        assert_eq!(font.glyph_index(0xFF21), Some(100));
        assert_eq!(font.glyph_index(0xFF22), Some(101));
        assert_eq!(font.glyph_index(0x80), None);
    }

    #[test]
    fn table_mapping_holes_are_unmapped() {
        let map = CodeMap {
            code_begin: 0x30,
            code_end: 0x33,
            reserved: 0,
            mapping: Mapping::Table {
                indices: vec![5, UNMAPPED, 7, 8],
            },
        };
        assert_eq!(map.lookup(0x30), Some(5));
        assert_eq!(map.lookup(0x31), None);
        assert_eq!(map.lookup(0x32), Some(7));
        assert_eq!(map.lookup(0x34), None);
    }

    #[test]
    fn width_lookup_falls_back_to_default() {
        let font = small_font(ByteOrder::Little);
        assert_eq!(font.glyph_width(2).left, -1);
        assert_eq!(font.glyph_width(900), font.finf.default_width);
    }

    #[test]
    fn manifest_round_trip() {
        let font = small_font(ByteOrder::Little);
        let manifest = font.to_manifest();
        assert_eq!(manifest.file_type, "FFNT");
        assert_eq!(manifest.glyph_map.get("A"), Some(&0));
        assert_eq!(manifest.glyph_widths.len(), 4);

        let json = serde_json::to_string_pretty(&manifest).unwrap();
        let read_back: Manifest = serde_json::from_str(&json).unwrap();
        let rebuilt =
            Bffnt::from_manifest(&read_back, font.sheets.clone(), ByteOrder::Little).unwrap();
        assert_eq!(rebuilt.widths, font.widths);
        assert_eq!(rebuilt.maps, font.maps);
        assert_eq!(rebuilt.build().unwrap(), font.build().unwrap());
    }

    #[test]
    fn manifest_width_keys_sort_numerically() {
        let mut font = small_font(ByteOrder::Little);
        // indices 2 and 10: lexicographic order would put "10" first
        font.widths = vec![
            WidthSection {
                start_index: 2,
                end_index: 2,
                widths: vec![GlyphWidth { left: 2, glyph: 2, char_width: 2 }],
            },
            WidthSection {
                start_index: 10,
                end_index: 10,
                widths: vec![GlyphWidth { left: 10, glyph: 10, char_width: 10 }],
            },
        ];
        let rebuilt = Bffnt::from_manifest(
            &font.to_manifest(),
            font.sheets.clone(),
            ByteOrder::Little,
        )
        .unwrap();
        assert_eq!(rebuilt.widths.len(), 2);
        assert_eq!(rebuilt.widths[0].start_index, 2);
        assert_eq!(rebuilt.widths[1].start_index, 10);
    }

    #[test]
    fn wrong_sheet_dimensions_abort_build() {
        let mut font = small_font(ByteOrder::Little);
        font.sheets = vec![test_sheet(16, 16)];
        assert!(matches!(
            font.build().unwrap_err(),
            BuildError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn parse_rejects_corruption() {
        let good = small_font(ByteOrder::Little).build().unwrap();

        let mut bad = good.clone();
        bad[0] = b'X';
        assert!(matches!(
            Bffnt::parse(&bad).unwrap_err(),
            ParseError::BadMagic { .. }
        ));

        let mut bad = good.clone();
        bad[4] = 0;
        assert!(matches!(
            Bffnt::parse(&bad).unwrap_err(),
            ParseError::BadBom(_)
        ));

        let mut bad = good.clone();
        bad[8..12].copy_from_slice(&0x05000000u32.to_le_bytes());
        assert!(matches!(
            Bffnt::parse(&bad).unwrap_err(),
            ParseError::UnknownVersion(_)
        ));

        // a truncated file no longer matches its header size
        let bad = &good[..good.len() - 1];
        assert!(matches!(
            Bffnt::parse(bad).unwrap_err(),
            ParseError::SizeMismatch { .. }
        ));
    }

    #[test]
    fn parses_hand_written_etc1a4_font() {
        use ctr_test_data::EndianBuffer;

        for order in [ByteOrder::Big, ByteOrder::Little] {
            // an 8x8 sheet is 2x2 ETC1A4 blocks; the first block splits
            // red/blue down the middle, the rest stay black
            let color_word: u64 = (0xF << 60) | (0xF << 40);
            let mut sheet = EndianBuffer::new(order)
                .bytes(&u64::MAX.to_le_bytes()) // opaque alpha plane
                .u64(color_word)
                .to_vec();
            sheet.resize(4 * 16, 0);

            let total = 0x14 + 0x20 + 0x20 + sheet.len();
            let bytes = EndianBuffer::new(order)
                // FFNT
                .tag(b"FFNT")
                .bom()
                .u16(0x14)
                .u32(VERSION_4)
                .u32(total as u32)
                .u16(2)
                .u16(0)
                // FINF
                .tag(b"FINF")
                .u32(0x20)
                .u8(1) // font type
                .u8(8) // height
                .u8(8) // width
                .u8(6) // ascent
                .u16(9) // line feed
                .u16(0) // alternate char index
                .i8(0)
                .u8(8)
                .u8(8)
                .u8(1) // encoding
                .u32(0x34 + 8) // TGLP body
                .u32(0) // no CWDH chain
                .u32(0) // no CMAP chain
                // TGLP
                .tag(b"TGLP")
                .u32(0x20 + sheet.len() as u32)
                .u8(8) // cell width
                .u8(8) // cell height
                .u8(1) // sheet count
                .u8(8) // max char width
                .u32(sheet.len() as u32)
                .u16(6) // baseline
                .u16(0x0D) // ETC1A4
                .u16(1)
                .u16(1)
                .u16(8) // sheet width
                .u16(8) // sheet height
                .u32(0x54) // sheet data follows the header
                .bytes(&sheet)
                .to_vec();
            assert_eq!(bytes.len(), total);

            let font = Bffnt::parse(&bytes).unwrap();
            assert_eq!(font.tglp.format, PixelFormat::Etc1A4);
            let sheet = &font.sheets[0];
            assert_eq!(sheet.pixel(0, 0), Rgba::new(255, 2, 2, 255));
            assert_eq!(sheet.pixel(3, 3), Rgba::new(2, 2, 255, 255));
            // the zeroed blocks decode to black with zero alpha
            assert_eq!(sheet.pixel(4, 4), Rgba::new(2, 2, 2, 0));
        }
    }

    #[test]
    fn ffnu_magic_and_old_version_survive() {
        let mut font = small_font(ByteOrder::Big);
        font.magic = FFNU_MAGIC;
        font.version = VERSION_3;
        let bytes = font.build().unwrap();
        let parsed = Bffnt::parse(&bytes).unwrap();
        assert_eq!(parsed.magic, FFNU_MAGIC);
        assert_eq!(parsed.version, VERSION_3);
        assert_eq!(parsed.build().unwrap(), bytes);
    }
}
