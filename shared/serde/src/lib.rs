//! # Tilesync Serde
//! Byte-aligned, little-endian serialization for the tilesync wire protocol.
//!
//! Every payload that travels inside a message envelope implements [`Serde`].
//! Codecs are symmetric: a reader that knows the static type of a payload does
//! not need any length prefix for fixed-size fields, only for collections.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod byte_reader;
mod byte_writer;
mod constants;
mod error;
mod impls;
mod integer;
mod serde;

pub use byte_reader::ByteReader;
pub use byte_writer::{ByteCounter, ByteWrite, ByteWriter};
pub use constants::{MAX_COLLECTION_LENGTH, MTU_SIZE_BYTES};
pub use error::SerdeErr;
pub use integer::VarInt;
pub use serde::{ConstByteLength, Serde};
