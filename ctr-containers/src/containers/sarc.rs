//! The SARC archive container and its streaming reader.
//!
//! An archive is `SARC header | SFAT header | SFAT nodes | SFNT header
//! | name table | file data`. Nodes are keyed and ordered by a rolling
//! hash of the member's filename; members may omit their name and are
//! then identified by hash alone. The whole archive may be wrapped in
//! a zlib stream prefixed with a 4-byte big-endian uncompressed size.
//!
//! Reading is streaming: [`ArchiveStream`] is a state machine fed
//! arbitrary chunks (straight from a file, or out of the inflater) and
//! emits each member as soon as its byte range is complete, holding at
//! most one partially produced member in memory.

use std::io::{Read, Write};

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use ctr_types::{ByteOrder, Tag};

use crate::data::ByteData;
use crate::error::{BuildError, ParseError};
use crate::writer::Writer;

const SARC_MAGIC: Tag = Tag::new(b"SARC");
const SFAT_MAGIC: Tag = Tag::new(b"SFAT");
const SFNT_MAGIC: Tag = Tag::new(b"SFNT");

const SARC_HEADER_LEN: usize = 0x14;
const SFAT_HEADER_LEN: usize = 0x0C;
const SFNT_HEADER_LEN: usize = 0x08;
const SFAT_NODE_LEN: usize = 0x10;

/// The constant in the SARC header's last field.
const SARC_RESERVED: u32 = 0x100;

/// Every known archive uses this filename-hash multiplier.
pub const HASH_MULTIPLIER: u32 = 0x65;

/// Each member's data starts on this boundary within the archive.
const FILE_ALIGN: usize = 0x80;
/// The data region itself starts on this boundary.
const DATA_REGION_ALIGN: usize = 0x100;

const READ_CHUNK: usize = 1024;
const INFLATE_CHUNK: usize = 512;

/// The rolling filename hash with the standard multiplier.
pub fn filename_hash(name: &str) -> u32 {
    hash_bytes(name.as_bytes(), HASH_MULTIPLIER)
}

fn hash_bytes(bytes: &[u8], multiplier: u32) -> u32 {
    bytes.iter().fold(0u32, |hash, &byte| {
        u32::from(byte).wrapping_add(hash.wrapping_mul(multiplier))
    })
}

/// An archive held fully in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub order: ByteOrder,
    pub entries: Vec<ArchiveEntry>,
}

/// One member: its name (if stored), hash, and bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: Option<String>,
    pub hash: u32,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn named(name: impl Into<String>, data: Vec<u8>) -> ArchiveEntry {
        let name = name.into();
        let hash = filename_hash(&name);
        ArchiveEntry {
            name: Some(name),
            hash,
            data,
        }
    }

    /// A member identified by hash only, with no name-table entry.
    pub fn hash_only(hash: u32, data: Vec<u8>) -> ArchiveEntry {
        ArchiveEntry {
            name: None,
            hash,
            data,
        }
    }

    /// The stored name, or the `0x<hash>.noname.bin` placeholder.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("0x{:08x}.noname.bin", self.hash),
        }
    }
}

impl Archive {
    /// Serialize the archive. Nodes are emitted in ascending hash
    /// order regardless of the order entries were added.
    pub fn build(&self) -> Vec<u8> {
        let mut ordered: Vec<&ArchiveEntry> = self.entries.iter().collect();
        ordered.sort_by_key(|entry| entry.hash);

        // the name table and each node's name reference
        let mut names = Vec::new();
        let mut name_entries = Vec::with_capacity(ordered.len());
        for entry in &ordered {
            match &entry.name {
                Some(name) => {
                    name_entries.push(0x0100_0000 | (names.len() as u32 / 4));
                    names.extend_from_slice(name.as_bytes());
                    names.push(0);
                    while names.len() % 4 != 0 {
                        names.push(0);
                    }
                }
                None => name_entries.push(0),
            }
        }

        let mut w = Writer::new(self.order);
        w.write_tag(SARC_MAGIC);
        w.write(SARC_HEADER_LEN as u16);
        w.write_bytes(&self.order.to_bom());
        w.write(0u32); // patched: total file size
        w.write(0u32); // patched: data region offset
        w.write(SARC_RESERVED);

        w.write_tag(SFAT_MAGIC);
        w.write(SFAT_HEADER_LEN as u16);
        w.write(ordered.len() as u16);
        w.write(HASH_MULTIPLIER);
        let nodes_pos = w.position();
        for (entry, name_entry) in ordered.iter().zip(&name_entries) {
            w.write(entry.hash);
            w.write(*name_entry);
            w.write(0u32); // patched: data start
            w.write(0u32); // patched: data end
        }

        w.write_tag(SFNT_MAGIC);
        w.write(SFNT_HEADER_LEN as u16);
        w.write(0u16);
        w.write_bytes(&names);

        w.align(DATA_REGION_ALIGN, 0);
        let data_offset = w.position();
        w.patch(0x0C, data_offset as u32);

        for (i, entry) in ordered.iter().enumerate() {
            w.align(FILE_ALIGN, 0);
            let start = w.position() - data_offset;
            let end = start + entry.data.len();
            w.patch(nodes_pos + i * SFAT_NODE_LEN + 8, start as u32);
            w.patch(nodes_pos + i * SFAT_NODE_LEN + 12, end as u32);
            log::info!("adding {} ({} bytes)", entry.display_name(), entry.data.len());
            w.write_bytes(&entry.data);
        }

        let total = w.position();
        w.patch(0x08, total as u32);
        w.into_vec()
    }

    /// Parse an uncompressed archive held in memory.
    pub fn parse(bytes: &[u8]) -> Result<Archive, ParseError> {
        let mut stream = ArchiveStream::new(true, Some(bytes.len() as u64));
        let mut entries = Vec::new();
        stream.push(bytes, &mut entries)?;
        if !stream.finished() {
            return Err(ParseError::TruncatedSection("SARC"));
        }
        Ok(Archive {
            order: stream.order(),
            entries,
        })
    }

    /// Wrap archive bytes in the length-prefixed zlib stream.
    pub fn compress(bytes: &[u8], level: u32) -> Result<Vec<u8>, BuildError> {
        let mut out = Vec::with_capacity(bytes.len() / 2 + 4);
        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        let mut encoder = ZlibEncoder::new(out, Compression::new(level));
        encoder.write_all(bytes)?;
        Ok(encoder.finish()?)
    }
}

/// Metadata of one SFAT node, available once the name table has been
/// consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    pub hash: u32,
    pub name: Option<String>,
    pub start: u32,
    pub end: u32,
    name_offset: u32,
}

impl NodeMeta {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("0x{:08x}.noname.bin", self.hash),
        }
    }

    fn len(&self) -> usize {
        (self.end - self.start) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    SarcHeader,
    SfatHeader,
    SfatNodes,
    SfntHeader,
    SfntNames,
    FileData,
    Done,
}

/// The streaming archive reader.
///
/// Feed it chunks with [`push`](Self::push); each call advances the
/// state machine as far as the accumulated bytes allow and appends any
/// completed members to the caller's vector. In listing mode
/// (`extract = false`) the stream finishes after the name table.
#[derive(Debug)]
pub struct ArchiveStream {
    extract: bool,
    expected_size: Option<u64>,
    state: StreamState,
    order: ByteOrder,
    buf: Vec<u8>,
    /// Absolute archive offset of `buf[0]`.
    buf_start: u64,
    data_offset: u64,
    node_count: usize,
    hash_multiplier: u32,
    names_len: usize,
    nodes: Vec<NodeMeta>,
    next_file: usize,
    pending: Vec<u8>,
}

impl ArchiveStream {
    pub fn new(extract: bool, expected_size: Option<u64>) -> ArchiveStream {
        ArchiveStream {
            extract,
            expected_size,
            state: StreamState::SarcHeader,
            order: ByteOrder::Little,
            buf: Vec::new(),
            buf_start: 0,
            data_offset: 0,
            node_count: 0,
            hash_multiplier: HASH_MULTIPLIER,
            names_len: 0,
            nodes: Vec::new(),
            next_file: 0,
            pending: Vec::new(),
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Node metadata; complete once the name table has been consumed.
    pub fn nodes(&self) -> &[NodeMeta] {
        &self.nodes
    }

    pub fn finished(&self) -> bool {
        self.state == StreamState::Done
    }

    fn consume(&mut self, n_bytes: usize) {
        self.buf.drain(..n_bytes);
        self.buf_start += n_bytes as u64;
    }

    /// Feed a chunk, appending completed members to `out`.
    pub fn push(
        &mut self,
        chunk: &[u8],
        out: &mut Vec<ArchiveEntry>,
    ) -> Result<(), ParseError> {
        self.buf.extend_from_slice(chunk);
        loop {
            match self.state {
                StreamState::SarcHeader => {
                    if self.buf.len() < SARC_HEADER_LEN {
                        return Ok(());
                    }
                    self.parse_sarc_header()?;
                    self.consume(SARC_HEADER_LEN);
                    self.state = StreamState::SfatHeader;
                }
                StreamState::SfatHeader => {
                    if self.buf.len() < SFAT_HEADER_LEN {
                        return Ok(());
                    }
                    self.parse_sfat_header()?;
                    self.consume(SFAT_HEADER_LEN);
                    self.state = StreamState::SfatNodes;
                }
                StreamState::SfatNodes => {
                    let wanted = self.node_count * SFAT_NODE_LEN;
                    if self.buf.len() < wanted {
                        return Ok(());
                    }
                    self.parse_nodes()?;
                    self.consume(wanted);
                    self.state = StreamState::SfntHeader;
                }
                StreamState::SfntHeader => {
                    if self.buf.len() < SFNT_HEADER_LEN {
                        return Ok(());
                    }
                    self.parse_sfnt_header()?;
                    self.consume(SFNT_HEADER_LEN);
                    self.state = StreamState::SfntNames;
                }
                StreamState::SfntNames => {
                    if self.buf.len() < self.names_len {
                        return Ok(());
                    }
                    self.parse_names()?;
                    let names_len = self.names_len;
                    self.consume(names_len);
                    self.state = if self.extract && self.node_count > 0 {
                        StreamState::FileData
                    } else {
                        StreamState::Done
                    };
                }
                StreamState::FileData => {
                    if !self.step_file_data(out)? {
                        return Ok(());
                    }
                }
                StreamState::Done => return Ok(()),
            }
        }
    }

    fn parse_sarc_header(&mut self) -> Result<(), ParseError> {
        let bom = [self.buf[6], self.buf[7]];
        self.order = ByteOrder::from_bom(bom)
            .ok_or(ParseError::BadBom(u16::from_be_bytes(bom)))?;
        let data = ByteData::new(&self.buf);
        let magic = data.tag_at(0)?;
        if magic != SARC_MAGIC {
            return Err(ParseError::BadMagic {
                container: "SARC",
                found: magic.to_string(),
                expected: "SARC",
            });
        }
        let header_len: u16 = data.read_at(4, self.order)?;
        if usize::from(header_len) != SARC_HEADER_LEN {
            return Err(ParseError::BadHeaderSize {
                container: "SARC",
                found: header_len.into(),
                expected: SARC_HEADER_LEN as u32,
            });
        }
        let file_size: u32 = data.read_at(8, self.order)?;
        if let Some(expected) = self.expected_size {
            if u64::from(file_size) != expected {
                return Err(ParseError::SizeMismatch {
                    container: "SARC",
                    header: file_size.into(),
                    actual: expected,
                });
            }
        }
        let data_offset: u32 = data.read_at(0x0C, self.order)?;
        let minimum = SARC_HEADER_LEN + SFAT_HEADER_LEN + SFNT_HEADER_LEN;
        if u64::from(file_size) < u64::from(data_offset) || (data_offset as usize) < minimum {
            return Err(ParseError::OutOfBounds);
        }
        self.data_offset = data_offset.into();
        log::debug!("SARC: size {file_size}, data at 0x{data_offset:X}");
        Ok(())
    }

    fn parse_sfat_header(&mut self) -> Result<(), ParseError> {
        let data = ByteData::new(&self.buf);
        let magic = data.tag_at(0)?;
        if magic != SFAT_MAGIC {
            return Err(ParseError::BadMagic {
                container: "SARC",
                found: magic.to_string(),
                expected: "SFAT",
            });
        }
        let header_len: u16 = data.read_at(4, self.order)?;
        if usize::from(header_len) != SFAT_HEADER_LEN {
            return Err(ParseError::BadHeaderSize {
                container: "SFAT",
                found: header_len.into(),
                expected: SFAT_HEADER_LEN as u32,
            });
        }
        self.node_count = usize::from(data.read_at::<u16>(6, self.order)?);
        self.hash_multiplier = data.read_at(8, self.order)?;
        let consumed = SARC_HEADER_LEN + SFAT_HEADER_LEN + self.node_count * SFAT_NODE_LEN
            + SFNT_HEADER_LEN;
        self.names_len = (self.data_offset as usize)
            .checked_sub(consumed)
            .ok_or(ParseError::OutOfBounds)?;
        log::debug!(
            "SFAT: {} nodes, multiplier 0x{:X}",
            self.node_count,
            self.hash_multiplier
        );
        Ok(())
    }

    fn parse_nodes(&mut self) -> Result<(), ParseError> {
        let data = ByteData::new(&self.buf);
        for i in 0..self.node_count {
            let base = i * SFAT_NODE_LEN;
            let hash: u32 = data.read_at(base, self.order)?;
            let name_entry: u32 = data.read_at(base + 4, self.order)?;
            let start: u32 = data.read_at(base + 8, self.order)?;
            let end: u32 = data.read_at(base + 12, self.order)?;
            if end < start {
                return Err(ParseError::TruncatedSection("SFAT"));
            }
            self.nodes.push(NodeMeta {
                hash,
                // the high byte of the name entry flags a stored name;
                // flagged names resolve once the table arrives
                name: (name_entry >> 24 != 0).then(String::new),
                start,
                end,
                name_offset: (name_entry & 0x00FF_FFFF) * 4,
            });
        }
        Ok(())
    }

    fn parse_sfnt_header(&mut self) -> Result<(), ParseError> {
        let data = ByteData::new(&self.buf);
        let magic = data.tag_at(0)?;
        if magic != SFNT_MAGIC {
            return Err(ParseError::BadMagic {
                container: "SARC",
                found: magic.to_string(),
                expected: "SFNT",
            });
        }
        let header_len: u16 = data.read_at(4, self.order)?;
        if usize::from(header_len) != SFNT_HEADER_LEN {
            return Err(ParseError::BadHeaderSize {
                container: "SFNT",
                found: header_len.into(),
                expected: SFNT_HEADER_LEN as u32,
            });
        }
        Ok(())
    }

    fn parse_names(&mut self) -> Result<(), ParseError> {
        let names = &self.buf[..self.names_len];
        for node in &mut self.nodes {
            if node.name.is_none() {
                continue;
            }
            let start = node.name_offset as usize;
            let tail = names.get(start..).ok_or(ParseError::OutOfBounds)?;
            let end = tail
                .iter()
                .position(|&b| b == 0)
                .ok_or(ParseError::TruncatedSection("SFNT"))?;
            let name = String::from_utf8_lossy(&tail[..end]).into_owned();
            let computed = hash_bytes(name.as_bytes(), self.hash_multiplier);
            if computed != node.hash {
                return Err(ParseError::HashMismatch {
                    name,
                    computed,
                    stored: node.hash,
                });
            }
            log::debug!("member {} at {}..{}", name, node.start, node.end);
            node.name = Some(name);
        }
        Ok(())
    }

    /// Advance within the data region. Returns false when more input
    /// is needed.
    fn step_file_data(&mut self, out: &mut Vec<ArchiveEntry>) -> Result<bool, ParseError> {
        let node_len = self.nodes[self.next_file].len();
        let abs_start = self.data_offset + u64::from(self.nodes[self.next_file].start);

        if self.pending.is_empty() {
            // discard alignment padding in front of this member
            if self.buf_start < abs_start {
                let gap = (abs_start - self.buf_start) as usize;
                let skip = gap.min(self.buf.len());
                self.consume(skip);
                if self.buf_start < abs_start {
                    return Ok(false);
                }
            } else if self.buf_start > abs_start {
                // the stream is past this member's start; it cannot be
                // recovered
                return Err(ParseError::TruncatedSection("SARC"));
            }
        }

        let take = (node_len - self.pending.len()).min(self.buf.len());
        self.pending.extend_from_slice(&self.buf[..take]);
        self.consume(take);
        if self.pending.len() < node_len {
            return Ok(false);
        }

        let data = std::mem::take(&mut self.pending);
        let node = &self.nodes[self.next_file];
        out.push(ArchiveEntry {
            name: node.name.clone(),
            hash: node.hash,
            data,
        });
        self.next_file += 1;
        if self.next_file == self.node_count {
            self.state = StreamState::Done;
        }
        Ok(true)
    }
}

struct Inflater {
    raw: Decompress,
}

impl Inflater {
    fn new() -> Inflater {
        Inflater {
            raw: Decompress::new(true),
        }
    }

    /// Inflate as much of `input` as fits one output chunk. Returns
    /// the bytes consumed, the bytes produced, and whether the stream
    /// ended.
    fn inflate(&mut self, input: &[u8]) -> Result<(usize, Vec<u8>, bool), ParseError> {
        let mut output = Vec::with_capacity(INFLATE_CHUNK);
        let before = self.raw.total_in();
        let status = self
            .raw
            .decompress_vec(input, &mut output, FlushDecompress::None)
            .map_err(|err| ParseError::BadZlibStream(err.to_string()))?;
        let consumed = (self.raw.total_in() - before) as usize;
        Ok((consumed, output, status == Status::StreamEnd))
    }
}

/// Pull an archive out of a reader, streaming.
///
/// With `compressed` the reader must start with the 4-byte big-endian
/// uncompressed size followed by the zlib stream; otherwise
/// `physical_size`, when known, is checked against the header. Each
/// completed member is handed to `on_entry` (never called in listing
/// mode); the returned metadata lists every node in stored order.
pub fn read_archive<R: Read>(
    mut reader: R,
    compressed: bool,
    extract: bool,
    physical_size: Option<u64>,
    mut on_entry: impl FnMut(ArchiveEntry) -> Result<(), ParseError>,
) -> Result<Vec<NodeMeta>, ParseError> {
    let expected_size = if compressed {
        let mut prefix = [0u8; 4];
        reader.read_exact(&mut prefix)?;
        Some(u64::from(u32::from_be_bytes(prefix)))
    } else {
        physical_size
    };

    let mut stream = ArchiveStream::new(extract, expected_size);
    let mut inflater = if compressed {
        Some(Inflater::new())
    } else {
        None
    };
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut completed = Vec::new();

    'read: while !stream.finished() {
        let got = reader.read(&mut chunk)?;
        if got == 0 {
            break;
        }
        match &mut inflater {
            Some(inflater) => {
                let mut input = &chunk[..got];
                loop {
                    let (consumed, inflated, ended) = inflater.inflate(input)?;
                    input = &input[consumed..];
                    stream.push(&inflated, &mut completed)?;
                    for entry in completed.drain(..) {
                        on_entry(entry)?;
                    }
                    if ended || stream.finished() {
                        break 'read;
                    }
                    if input.is_empty() {
                        break;
                    }
                }
            }
            None => {
                stream.push(&chunk[..got], &mut completed)?;
                for entry in completed.drain(..) {
                    on_entry(entry)?;
                }
            }
        }
    }

    if !stream.finished() {
        return Err(ParseError::TruncatedSection("SARC"));
    }
    Ok(stream.nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(order: ByteOrder) -> Archive {
        Archive {
            order,
            entries: vec![
                ArchiveEntry::named("textures/icon.bflim", vec![1, 2, 3, 4, 5]),
                ArchiveEntry::named("font/main.bffnt", vec![0xAA; 0x90]),
                ArchiveEntry::hash_only(0x0000_0042, vec![9, 9]),
            ],
        }
    }

    #[test]
    fn hash_vectors() {
        assert_eq!(filename_hash(""), 0);
        assert_eq!(filename_hash("example.bffnt"), 0x40e57ea6);
        // the iteration, spelled out
        let mut expected = 0u32;
        for byte in b"example.bffnt" {
            expected = u32::from(*byte).wrapping_add(expected.wrapping_mul(0x65));
        }
        assert_eq!(filename_hash("example.bffnt"), expected);
    }

    #[test]
    fn nodes_sorted_by_hash() {
        let bytes = sample(ByteOrder::Little).build();
        let archive = Archive::parse(&bytes).unwrap();
        let hashes: Vec<u32> = archive.entries.iter().map(|e| e.hash).collect();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);
        assert!(hashes.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn round_trip_both_orders() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let archive = sample(order);
            let bytes = archive.build();
            let parsed = Archive::parse(&bytes).unwrap();
            assert_eq!(parsed.order, order);
            // parse returns hash order; compare as sets of members
            for entry in &archive.entries {
                let found = parsed
                    .entries
                    .iter()
                    .find(|e| e.hash == entry.hash)
                    .unwrap();
                assert_eq!(found, entry);
            }
            assert_eq!(parsed.build(), bytes);
        }
    }

    #[test]
    fn data_region_alignment() {
        let bytes = sample(ByteOrder::Little).build();
        let data_offset = u32::from_le_bytes(bytes[0x0C..0x10].try_into().unwrap());
        assert_eq!(data_offset % 0x100, 0);
        let file_size = u32::from_le_bytes(bytes[0x08..0x0C].try_into().unwrap());
        assert_eq!(file_size as usize, bytes.len());
        // members after the first start on 0x80 boundaries: every
        // node's start offset is 0x80-aligned
        let archive = Archive::parse(&bytes).unwrap();
        let mut stream = ArchiveStream::new(false, Some(bytes.len() as u64));
        stream.push(&bytes, &mut Vec::new()).unwrap();
        for node in stream.nodes() {
            assert_eq!(node.start % 0x80, 0, "{}", node.display_name());
        }
        assert_eq!(archive.entries.len(), 3);
    }

    #[test]
    fn hash_only_members_have_no_name() {
        let bytes = sample(ByteOrder::Little).build();
        let archive = Archive::parse(&bytes).unwrap();
        let noname = archive.entries.iter().find(|e| e.name.is_none()).unwrap();
        assert_eq!(noname.hash, 0x42);
        assert_eq!(noname.display_name(), "0x00000042.noname.bin");
    }

    #[test]
    fn hash_mismatch_is_fatal() {
        let mut bytes = sample(ByteOrder::Little).build();
        // corrupt the first byte of the first stored name
        let names_start = SARC_HEADER_LEN + SFAT_HEADER_LEN + 3 * SFAT_NODE_LEN + SFNT_HEADER_LEN;
        bytes[names_start] ^= 0x01;
        assert!(matches!(
            Archive::parse(&bytes).unwrap_err(),
            ParseError::HashMismatch { .. }
        ));
    }

    #[test]
    fn chunked_delivery_matches_single_push() {
        let bytes = sample(ByteOrder::Big).build();
        let whole = Archive::parse(&bytes).unwrap();

        let mut stream = ArchiveStream::new(true, Some(bytes.len() as u64));
        let mut entries = Vec::new();
        for chunk in bytes.chunks(17) {
            stream.push(chunk, &mut entries).unwrap();
        }
        assert!(stream.finished());
        assert_eq!(entries, whole.entries);
    }

    #[test]
    fn compressed_round_trip_in_17_byte_chunks() {
        /// A reader that rations its bytes to exercise resumption.
        struct Trickle<'a>(&'a [u8]);
        impl Read for Trickle<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = self.0.len().min(buf.len()).min(17);
                buf[..n].copy_from_slice(&self.0[..n]);
                self.0 = &self.0[n..];
                Ok(n)
            }
        }

        let archive = sample(ByteOrder::Little);
        let bytes = archive.build();
        let wrapped = Archive::compress(&bytes, 6).unwrap();
        assert_eq!(
            u32::from_be_bytes(wrapped[..4].try_into().unwrap()) as usize,
            bytes.len()
        );

        let mut extracted = Vec::new();
        let nodes = read_archive(Trickle(&wrapped), true, true, None, |entry| {
            extracted.push(entry);
            Ok(())
        })
        .unwrap();
        assert_eq!(nodes.len(), 3);
        let direct = Archive::parse(&bytes).unwrap();
        assert_eq!(extracted, direct.entries);
    }

    #[test]
    fn list_mode_stops_before_file_data() {
        let bytes = sample(ByteOrder::Little).build();
        let mut entries = Vec::new();
        let nodes = read_archive(
            std::io::Cursor::new(&bytes),
            false,
            false,
            Some(bytes.len() as u64),
            |entry| {
                entries.push(entry);
                Ok(())
            },
        )
        .unwrap();
        assert!(entries.is_empty());
        assert_eq!(nodes.len(), 3);
        // names resolve in listing mode too
        assert!(nodes.iter().any(|n| n.name.as_deref() == Some("font/main.bffnt")));
    }

    #[test]
    fn rejects_corrupt_headers() {
        let good = sample(ByteOrder::Little).build();

        let mut bad = good.clone();
        bad[0] = b'X';
        assert!(matches!(
            Archive::parse(&bad).unwrap_err(),
            ParseError::BadMagic { .. }
        ));

        let mut bad = good.clone();
        bad[6] = 0;
        assert!(matches!(
            Archive::parse(&bad).unwrap_err(),
            ParseError::BadBom(_)
        ));

        let mut bad = good.clone();
        bad[8..12].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(
            Archive::parse(&bad).unwrap_err(),
            ParseError::SizeMismatch { .. }
        ));
    }
}
