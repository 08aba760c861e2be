//! The container codecs.

pub mod bffnt;
pub mod bflim;
pub mod msbt;
pub mod sarc;
