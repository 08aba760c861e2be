//! Codecs for the CTR resource container family.
//!
//! Four related binary containers share one engine here: **BFFNT**
//! bitmap fonts (glyph sheets, per-glyph widths, code-point maps),
//! **BFLIM** single-texture images, **SARC** hash-indexed archives with
//! an optional zlib wrapping, and **MSBT** message tables. All of them
//! are built from the same parts: a byte-order marker chosen at run
//! time, magic-tagged sections with forward offset chains, tiled GPU
//! texture layouts, and a family of per-pixel packers.
//!
//! Decoding builds an owned model in one pass over a byte buffer;
//! encoding serializes that model back, patching sizes and offsets at
//! their known positions. There is no incremental mutation: parse,
//! inspect or edit the model, then build.

#![deny(rustdoc::broken_intra_doc_links)]

pub mod containers;
pub mod data;
pub mod error;
pub mod etc1;
pub mod pixel;
pub mod section;
pub mod swizzle;
pub mod writer;

pub use ctr_types::{ByteOrder, Rgba, Scalar, Tag};

pub use data::{ByteData, Cursor};
pub use error::{BuildError, ParseError};
pub use pixel::{Bitmap, PixelFormat};
pub use writer::Writer;
