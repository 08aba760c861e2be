//! Test-only helpers shared by the workspace crates.
//!
//! Container tests build their wire images by hand so every byte is
//! accounted for; [`EndianBuffer`] keeps that tolerable under both
//! byte orders.

mod buffer;

pub use buffer::EndianBuffer;
