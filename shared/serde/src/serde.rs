use crate::{byte_reader::ByteReader, byte_writer::ByteWrite, error::SerdeErr};

/// A type that can be written to and read back from the wire.
pub trait Serde: Sized + Clone + PartialEq {
    /// Serialize into the given writer
    fn ser(&self, writer: &mut dyn ByteWrite);

    /// Deserialize from the given reader
    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr>;

    /// Number of bytes `ser` will produce
    fn byte_length(&self) -> u32;
}

/// A type whose serialized length never depends on its value.
pub trait ConstByteLength {
    fn const_byte_length() -> u32;
}
