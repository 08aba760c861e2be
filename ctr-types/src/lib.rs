//! Common scalar data types used in CTR resource containers.
//!
//! Every container in this family (fonts, layout images, archives,
//! message tables) shares the same low-level vocabulary: a two-byte
//! byte-order marker, four-byte ASCII magics, and multi-byte integers
//! encoded in whichever order the marker selects. This crate holds that
//! vocabulary so the codec crate and the tools agree on it.

#![deny(rustdoc::broken_intra_doc_links)]

mod order;
mod pixel;
mod tag;

pub use order::{ByteOrder, Scalar};
pub use pixel::Rgba;
pub use tag::Tag;
