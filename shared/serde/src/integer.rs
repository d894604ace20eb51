use crate::{byte_reader::ByteReader, byte_writer::ByteWrite, error::SerdeErr, serde::Serde};

/// Unsigned integer written with a variable number of bytes: 7 value bits per
/// byte, high bit set while more bytes follow. Used for collection lengths.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct VarInt(u64);

impl VarInt {
    const MAX_BYTES: usize = 10;

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Serde for VarInt {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        let mut value = self.0;
        loop {
            let low = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                writer.write_byte(low);
                return;
            }
            writer.write_byte(low | 0x80);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let mut output: u64 = 0;
        for index in 0..Self::MAX_BYTES {
            let byte = reader.read_byte()?;
            let bits = u64::from(byte & 0x7F);
            let shift = (index * 7) as u32;
            // the tenth byte may only contribute the single top bit
            if shift == 63 && bits > 1 {
                return Err(SerdeErr);
            }
            output |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(Self(output));
            }
        }
        Err(SerdeErr)
    }

    fn byte_length(&self) -> u32 {
        let mut value = self.0 >> 7;
        let mut output = 1;
        while value != 0 {
            value >>= 7;
            output += 1;
        }
        output
    }
}
