//! The MSBT (MsgStdBn) message table container.
//!
//! A message table is a `MsgStdBn` header followed by tagged sections:
//! LBL1 (hash-bucketed label names, each carrying a text index), ATR1
//! (per-message attributes, opaque here) and TXT2 (the UTF-16 texts).
//! Sections share one shape: magic, a 32-bit size spanning the body
//! from its leading entry-count word, and eight reserved bytes.
//! Between sections the file is padded to 16-byte alignment with 0xAB.
//!
//! Texts may embed color escapes: the code units 0x0003 0x0004
//! followed by a 32-bit RGBA color in the container's order. When the
//! caller opts in, these surface as literal `[#rrggbbaa]` markers in
//! the exported document and are re-encoded from the same form.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use ctr_types::{ByteOrder, Tag};

use crate::data::ByteData;
use crate::error::{BuildError, ParseError};
use crate::section::SECTION_PAD;
use crate::writer::Writer;

const MSBT_MAGIC: &[u8; 8] = b"MsgStdBn";
const LBL1_MAGIC: Tag = Tag::new(b"LBL1");
const ATR1_MAGIC: Tag = Tag::new(b"ATR1");
const TXT2_MAGIC: Tag = Tag::new(b"TXT2");
const NLI1_MAGIC: Tag = Tag::new(b"NLI1");

const HEADER_LEN: usize = 0x20;
/// Magic, size and the reserved bytes before each section's body.
const SECTION_PREFIX_LEN: usize = 0x10;

const COLOR_ESCAPE_LEAD: u16 = 0x0003;
const COLOR_ESCAPE_KIND: u16 = 0x0004;

/// A decoded message table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msbt {
    pub order: ByteOrder,
    pub header: HeaderFields,
    pub lbl1: Option<Lbl1>,
    pub atr1: Option<Atr1>,
    pub txt2: Option<Txt2>,
}

/// The opaque MsgStdBn header fields, preserved for round trips.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderFields {
    pub unknown1: u16,
    pub unknown2: u16,
    pub unknown3: u16,
    pub trailing: [u8; 10],
}

/// LBL1: label names in their hash buckets.
///
/// The bucket structure is preserved exactly as read; building a table
/// from scratch puts every label in a single bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lbl1 {
    pub reserved: [u8; 8],
    pub buckets: Vec<Vec<Label>>,
}

/// One label: a name and the index of its text in TXT2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub index: u32,
}

/// ATR1: attribute records, carried as an opaque blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atr1 {
    pub reserved: [u8; 8],
    pub entry_count: u32,
    pub data: Vec<u8>,
}

/// TXT2: the texts themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Txt2 {
    pub reserved: [u8; 8],
    pub strings: Vec<Message>,
}

/// One text as its raw UTF-16 code units, terminator excluded.
///
/// Escapes stay inline; [`Message::decode`] and [`Message::encode`]
/// translate between units and readable strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub units: Vec<u16>,
}

fn color_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[#([0-9a-fA-F]{8})\]").unwrap())
}

impl Message {
    /// Render the text, optionally translating color escapes into
    /// `[#rrggbbaa]` markers.
    pub fn decode(&self, colors: bool, order: ByteOrder) -> String {
        let mut out = String::new();
        let mut pending: Vec<u16> = Vec::new();
        let mut i = 0;
        let flush = |pending: &mut Vec<u16>, out: &mut String| {
            out.extend(
                char::decode_utf16(pending.drain(..))
                    .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
            );
        };
        while i < self.units.len() {
            if colors
                && self.units[i] == COLOR_ESCAPE_LEAD
                && i + 3 < self.units.len()
                && self.units[i + 1] == COLOR_ESCAPE_KIND
            {
                flush(&mut pending, &mut out);
                let (lo, hi) = (self.units[i + 2], self.units[i + 3]);
                let color = match order {
                    ByteOrder::Little => u32::from(lo) | u32::from(hi) << 16,
                    ByteOrder::Big => u32::from(lo) << 16 | u32::from(hi),
                };
                out.push_str(&format!("[#{color:08x}]"));
                i += 4;
            } else {
                pending.push(self.units[i]);
                i += 1;
            }
        }
        flush(&mut pending, &mut out);
        out
    }

    /// Build a message from readable text, optionally translating
    /// `[#rrggbbaa]` markers back into color escapes.
    pub fn encode(text: &str, colors: bool, order: ByteOrder) -> Message {
        let mut units = Vec::new();
        if !colors {
            units.extend(text.encode_utf16());
            return Message { units };
        }
        let mut rest = 0;
        for capture in color_marker().captures_iter(text) {
            // the marker pattern guarantees eight hex digits
            let whole = capture.get(0).unwrap();
            let color = u32::from_str_radix(&capture[1], 16).unwrap_or(0);
            units.extend(text[rest..whole.start()].encode_utf16());
            units.push(COLOR_ESCAPE_LEAD);
            units.push(COLOR_ESCAPE_KIND);
            match order {
                ByteOrder::Little => {
                    units.push(color as u16);
                    units.push((color >> 16) as u16);
                }
                ByteOrder::Big => {
                    units.push((color >> 16) as u16);
                    units.push(color as u16);
                }
            }
            rest = whole.end();
        }
        units.extend(text[rest..].encode_utf16());
        Message { units }
    }
}

impl Msbt {
    /// Parse a message table from its raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Msbt, ParseError> {
        if bytes.len() < HEADER_LEN {
            return Err(ParseError::TruncatedSection("MsgStdBn"));
        }
        if &bytes[..8] != MSBT_MAGIC {
            return Err(ParseError::BadMagic {
                container: "MSBT",
                found: String::from_utf8_lossy(&bytes[..8]).into_owned(),
                expected: "MsgStdBn",
            });
        }
        let order = ByteOrder::from_bom([bytes[8], bytes[9]])
            .ok_or(ParseError::BadBom(u16::from_be_bytes([bytes[8], bytes[9]])))?;

        let data = ByteData::new(bytes);
        let mut cursor = data.cursor(order);
        cursor.seek(10);
        let unknown1: u16 = cursor.read()?;
        let unknown2: u16 = cursor.read()?;
        let section_count: u16 = cursor.read()?;
        let unknown3: u16 = cursor.read()?;
        let file_size: u32 = cursor.read()?;
        // this can't fail, the header length was checked above
        let trailing: [u8; 10] = cursor.read_bytes(10)?.try_into().unwrap_or_default();
        if file_size as usize != bytes.len() {
            log::warn!(
                "MSBT header disagrees with file size: header {file_size}, file {}",
                bytes.len()
            );
        }
        log::debug!("MSBT: {section_count} sections");

        let mut msbt = Msbt {
            order,
            header: HeaderFields {
                unknown1,
                unknown2,
                unknown3,
                trailing,
            },
            lbl1: None,
            atr1: None,
            txt2: None,
        };

        let mut position = HEADER_LEN;
        for _ in 0..section_count {
            if position + SECTION_PREFIX_LEN > bytes.len() {
                log::warn!("section list ran past the end of the file");
                break;
            }
            let tag = data.tag_at(position)?;
            let size: u32 = data.read_at(position + 4, order)?;
            // this can't fail, the prefix bound was checked above
            let reserved: [u8; 8] = data
                .slice(position + 8, 8)?
                .try_into()
                .unwrap_or_default();
            let body = data
                .slice(position + SECTION_PREFIX_LEN, size as usize)
                .map_err(|_| ParseError::TruncatedSection("MSBT"))?;

            if tag == LBL1_MAGIC {
                msbt.lbl1 = Some(parse_lbl1(body, reserved, order)?);
            } else if tag == ATR1_MAGIC {
                msbt.atr1 = Some(parse_atr1(body, reserved, order)?);
            } else if tag == TXT2_MAGIC {
                msbt.txt2 = Some(parse_txt2(body, reserved, order)?);
            } else if tag == NLI1_MAGIC {
                log::debug!("skipping NLI1 section ({size} bytes)");
            } else {
                log::warn!("skipping unknown section \"{tag}\" ({size} bytes)");
            }

            position += SECTION_PREFIX_LEN + size as usize;
            while position < bytes.len() && bytes[position] == SECTION_PAD {
                position += 1;
            }
        }

        Ok(msbt)
    }

    /// Serialize the table: header, then LBL1 / ATR1 / TXT2 in their
    /// canonical order, each 0xAB-padded to 16-byte alignment.
    pub fn build(&self) -> Vec<u8> {
        let mut w = Writer::new(self.order);
        w.write_bytes(MSBT_MAGIC);
        w.write_bytes(&self.order.to_bom());
        w.write(self.header.unknown1);
        w.write(self.header.unknown2);
        let section_count =
            self.lbl1.is_some() as u16 + self.atr1.is_some() as u16 + self.txt2.is_some() as u16;
        w.write(section_count);
        w.write(self.header.unknown3);
        let file_size_pos = w.position();
        w.write(0u32); // patched: total file size
        w.write_bytes(&self.header.trailing);

        if let Some(lbl1) = &self.lbl1 {
            write_lbl1(&mut w, lbl1);
        }
        if let Some(atr1) = &self.atr1 {
            write_atr1(&mut w, atr1);
        }
        if let Some(txt2) = &self.txt2 {
            write_txt2(&mut w, txt2);
        }

        let total = w.position();
        w.patch(file_size_pos, total as u32);
        w.into_vec()
    }

    /// The number of texts, for sizing checks.
    pub fn text_count(&self) -> usize {
        self.txt2.as_ref().map(|t| t.strings.len()).unwrap_or(0)
    }
}

fn parse_lbl1(body: &[u8], reserved: [u8; 8], order: ByteOrder) -> Result<Lbl1, ParseError> {
    let data = ByteData::new(body);
    let mut cursor = data.cursor(order);
    let bucket_count: u32 = cursor.read()?;
    if bucket_count as usize > body.len().saturating_sub(4) / 8 {
        return Err(ParseError::TruncatedSection("LBL1"));
    }
    let mut bucket_refs = Vec::with_capacity(bucket_count as usize);
    for _ in 0..bucket_count {
        let count: u32 = cursor.read()?;
        let offset: u32 = cursor.read()?;
        bucket_refs.push((count, offset));
    }
    let mut buckets = Vec::with_capacity(bucket_refs.len());
    for (count, offset) in bucket_refs {
        let mut labels = Vec::with_capacity(count as usize);
        let mut entry = data.cursor(order);
        entry.seek(offset as usize);
        for _ in 0..count {
            let len: u8 = entry.read()?;
            let name = entry.read_bytes(len.into())?;
            let index: u32 = entry.read()?;
            labels.push(Label {
                name: String::from_utf8_lossy(name).into_owned(),
                index,
            });
        }
        buckets.push(labels);
    }
    Ok(Lbl1 { reserved, buckets })
}

fn parse_atr1(body: &[u8], reserved: [u8; 8], order: ByteOrder) -> Result<Atr1, ParseError> {
    let data = ByteData::new(body);
    let entry_count: u32 = data.read_at(0, order)?;
    Ok(Atr1 {
        reserved,
        entry_count,
        data: body[4..].to_vec(),
    })
}

fn parse_txt2(body: &[u8], reserved: [u8; 8], order: ByteOrder) -> Result<Txt2, ParseError> {
    let data = ByteData::new(body);
    let mut cursor = data.cursor(order);
    let entry_count: u32 = cursor.read()?;
    if entry_count as usize > body.len().saturating_sub(4) / 4 {
        return Err(ParseError::TruncatedSection("TXT2"));
    }
    let mut offsets = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        offsets.push(cursor.read::<u32>()? as usize);
    }
    let mut strings = Vec::with_capacity(offsets.len());
    for offset in offsets {
        let mut units = Vec::new();
        let mut reader = data.cursor(order);
        reader.seek(offset);
        loop {
            if reader.remaining() < 2 {
                break;
            }
            let unit: u16 = reader.read()?;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        strings.push(Message { units });
    }
    Ok(Txt2 { reserved, strings })
}

fn write_lbl1(w: &mut Writer, lbl1: &Lbl1) {
    let bucket_count = lbl1.buckets.len() as u32;
    let table_len = 4 + bucket_count * 8;
    let labels_len: u32 = lbl1
        .buckets
        .iter()
        .flatten()
        .map(|label| 1 + label.name.len() as u32 + 4)
        .sum();
    w.write_tag(LBL1_MAGIC);
    w.write(table_len + labels_len);
    w.write_bytes(&lbl1.reserved);
    w.write(bucket_count);
    let mut offset = table_len;
    for bucket in &lbl1.buckets {
        w.write(bucket.len() as u32);
        w.write(offset);
        offset += bucket
            .iter()
            .map(|label| 1 + label.name.len() as u32 + 4)
            .sum::<u32>();
    }
    for label in lbl1.buckets.iter().flatten() {
        w.write(label.name.len() as u8);
        w.write_bytes(label.name.as_bytes());
        w.write(label.index);
    }
    w.align(16, SECTION_PAD);
}

fn write_atr1(w: &mut Writer, atr1: &Atr1) {
    w.write_tag(ATR1_MAGIC);
    w.write(4 + atr1.data.len() as u32);
    w.write_bytes(&atr1.reserved);
    w.write(atr1.entry_count);
    w.write_bytes(&atr1.data);
    w.align(16, SECTION_PAD);
}

fn write_txt2(w: &mut Writer, txt2: &Txt2) {
    let entry_count = txt2.strings.len() as u32;
    let table_len = 4 + entry_count * 4;
    let strings_len: u32 = txt2
        .strings
        .iter()
        .map(|message| (message.units.len() as u32 + 1) * 2)
        .sum();
    w.write_tag(TXT2_MAGIC);
    w.write(table_len + strings_len);
    w.write_bytes(&txt2.reserved);
    w.write(entry_count);
    let mut offset = table_len;
    for message in &txt2.strings {
        w.write(offset);
        offset += (message.units.len() as u32 + 1) * 2;
    }
    for message in &txt2.strings {
        for unit in &message.units {
            w.write(*unit);
        }
        w.write(0u16);
    }
    w.align(16, SECTION_PAD);
}

// ---- the JSON document ----

/// The exported document: label → text, plus the bucket structure
/// needed to reassemble the original label layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub strings: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structure: Vec<Vec<String>>,
}

impl Msbt {
    /// Export to a document, resolving each label's text.
    pub fn to_document(&self, colors: bool) -> Document {
        let empty = Txt2 {
            reserved: [0; 8],
            strings: Vec::new(),
        };
        let txt2 = self.txt2.as_ref().unwrap_or(&empty);
        let mut strings = BTreeMap::new();
        let mut structure = Vec::new();
        if let Some(lbl1) = &self.lbl1 {
            for bucket in &lbl1.buckets {
                let mut names = Vec::with_capacity(bucket.len());
                for label in bucket {
                    names.push(label.name.clone());
                    match txt2.strings.get(label.index as usize) {
                        Some(message) => {
                            strings.insert(label.name.clone(), message.decode(colors, self.order));
                        }
                        None => log::warn!(
                            "label \"{}\" points at missing text {}",
                            label.name,
                            label.index
                        ),
                    }
                }
                structure.push(names);
            }
        }
        Document { strings, structure }
    }

    /// Assemble a table from a document.
    ///
    /// When the document carries a bucket structure the labels keep
    /// their original buckets and order; otherwise every label goes
    /// into a single bucket in key order.
    pub fn from_document(
        document: &Document,
        order: ByteOrder,
        colors: bool,
    ) -> Result<Msbt, BuildError> {
        let structure: Vec<Vec<String>> = if document.structure.is_empty() {
            vec![document.strings.keys().cloned().collect()]
        } else {
            document.structure.clone()
        };

        let mut buckets = Vec::with_capacity(structure.len());
        let mut strings = Vec::with_capacity(document.strings.len());
        for names in &structure {
            let mut labels = Vec::with_capacity(names.len());
            for name in names {
                let text = document.strings.get(name).ok_or_else(|| {
                    BuildError::InvalidInput(format!(
                        "structure names \"{name}\" but strings does not define it"
                    ))
                })?;
                labels.push(Label {
                    name: name.clone(),
                    index: strings.len() as u32,
                });
                strings.push(Message::encode(text, colors, order));
            }
            buckets.push(labels);
        }

        Ok(Msbt {
            order,
            header: HeaderFields::default(),
            lbl1: Some(Lbl1 {
                reserved: [0; 8],
                buckets,
            }),
            atr1: None,
            txt2: Some(Txt2 {
                reserved: [0; 8],
                strings,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(order: ByteOrder) -> Msbt {
        Msbt {
            order,
            header: HeaderFields {
                unknown1: 0,
                unknown2: 0x0103,
                unknown3: 0,
                trailing: [0; 10],
            },
            lbl1: Some(Lbl1 {
                reserved: [0; 8],
                buckets: vec![
                    vec![Label {
                        name: "GREET".into(),
                        index: 0,
                    }],
                    vec![],
                    vec![Label {
                        name: "BYE".into(),
                        index: 1,
                    }],
                ],
            }),
            atr1: Some(Atr1 {
                reserved: [0; 8],
                entry_count: 2,
                data: vec![0xDE, 0xAD, 0xBE, 0xEF],
            }),
            txt2: Some(Txt2 {
                reserved: [0; 8],
                strings: vec![
                    Message::encode("hi", true, order),
                    Message::encode("bye[#000000ff]!", true, order),
                ],
            }),
        }
    }

    #[test]
    fn round_trip_both_orders() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let original = sample(order);
            let bytes = original.build();
            let parsed = Msbt::parse(&bytes).unwrap();
            assert_eq!(parsed, original);
            assert_eq!(parsed.build(), bytes);
        }
    }

    #[test]
    fn sections_are_padded_with_ab() {
        let bytes = sample(ByteOrder::Little).build();
        assert_eq!(bytes.len() % 16, 0);
        assert_eq!(*bytes.last().unwrap(), 0xAB);
    }

    #[test]
    fn color_escape_units() {
        // `hello[#ff8800ff]world` becomes
        // h e l l o 0003 0004 <color> w o r l d
        let message = Message::encode("hello[#ff8800ff]world", true, ByteOrder::Little);
        let expected_prefix: Vec<u16> = "hello".encode_utf16().collect();
        assert_eq!(&message.units[..5], &expected_prefix[..]);
        assert_eq!(message.units[5], 0x0003);
        assert_eq!(message.units[6], 0x0004);
        // 0xFF8800FF little-endian: low half first
        assert_eq!(message.units[7], 0x00FF);
        assert_eq!(message.units[8], 0xFF88);
        let expected_suffix: Vec<u16> = "world".encode_utf16().collect();
        assert_eq!(&message.units[9..], &expected_suffix[..]);

        assert_eq!(
            message.decode(true, ByteOrder::Little),
            "hello[#ff8800ff]world"
        );

        let be = Message::encode("hello[#ff8800ff]world", true, ByteOrder::Big);
        assert_eq!(be.units[7], 0xFF88);
        assert_eq!(be.units[8], 0x00FF);
        assert_eq!(be.decode(true, ByteOrder::Big), "hello[#ff8800ff]world");
    }

    #[test]
    fn color_escapes_ignored_when_disabled() {
        let message = Message::encode("a[#11223344]b", false, ByteOrder::Little);
        assert_eq!(
            message.decode(false, ByteOrder::Little),
            "a[#11223344]b"
        );
    }

    #[test]
    fn document_round_trip() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let table = sample(order);
            let document = table.to_document(true);
            assert_eq!(document.strings.get("GREET").unwrap(), "hi");
            assert_eq!(document.strings.get("BYE").unwrap(), "bye[#000000ff]!");

            let rebuilt = Msbt::from_document(&document, order, true).unwrap();
            let reread = Msbt::parse(&rebuilt.build()).unwrap();
            let redocument = reread.to_document(true);
            assert_eq!(redocument.strings, document.strings);
            // bucket structure survives the document round trip
            assert_eq!(redocument.structure, document.structure);
        }
    }

    #[test]
    fn fresh_document_uses_single_bucket() {
        let mut document = Document::default();
        document
            .strings
            .insert("KEY".into(), "value".into());
        let table = Msbt::from_document(&document, ByteOrder::Little, false).unwrap();
        assert_eq!(table.lbl1.as_ref().unwrap().buckets.len(), 1);
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let mut table = sample(ByteOrder::Little);
        table.atr1 = None;
        let mut bytes = table.build();
        // graft an unknown section between header and LBL1 by hand
        let mut grafted = bytes[..0x20].to_vec();
        grafted.extend_from_slice(b"ZZZ1");
        grafted.extend_from_slice(&4u32.to_le_bytes());
        grafted.extend_from_slice(&[0u8; 8]);
        grafted.extend_from_slice(&[0u8; 4]);
        grafted.extend_from_slice(&[0xAB; 12]);
        grafted.extend_from_slice(&bytes[0x20..]);
        // section count grows by one
        let count = u16::from_le_bytes(grafted[14..16].try_into().unwrap()) + 1;
        grafted[14..16].copy_from_slice(&count.to_le_bytes());
        bytes = grafted;
        let parsed = Msbt::parse(&bytes).unwrap();
        assert!(parsed.lbl1.is_some());
        assert!(parsed.txt2.is_some());
    }

    #[test]
    fn rejects_bad_header() {
        assert!(matches!(
            Msbt::parse(b"NotMsbt!").unwrap_err(),
            ParseError::TruncatedSection(_)
        ));
        let mut bytes = sample(ByteOrder::Little).build();
        bytes[0] = b'X';
        assert!(matches!(
            Msbt::parse(&bytes).unwrap_err(),
            ParseError::BadMagic { .. }
        ));
        let mut bytes = sample(ByteOrder::Little).build();
        bytes[8] = 0;
        bytes[9] = 0;
        assert!(matches!(
            Msbt::parse(&bytes).unwrap_err(),
            ParseError::BadBom(_)
        ));
    }
}
