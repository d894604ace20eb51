use crate::{
    byte_reader::ByteReader, byte_writer::ByteWrite, constants::MAX_COLLECTION_LENGTH,
    error::SerdeErr, integer::VarInt, serde::ConstByteLength, serde::Serde,
};

// Numbers

macro_rules! impl_serde_number {
    ($($t:ty),*) => {$(
        impl Serde for $t {
            fn ser(&self, writer: &mut dyn ByteWrite) {
                writer.write_bytes(&self.to_le_bytes());
            }

            fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
                Ok(<$t>::from_le_bytes(reader.read_array()?))
            }

            fn byte_length(&self) -> u32 {
                <Self as ConstByteLength>::const_byte_length()
            }
        }

        impl ConstByteLength for $t {
            fn const_byte_length() -> u32 {
                std::mem::size_of::<$t>() as u32
            }
        }
    )*};
}

impl_serde_number!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

// Unit

impl Serde for () {
    fn ser(&self, _writer: &mut dyn ByteWrite) {}

    fn de(_reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(())
    }

    fn byte_length(&self) -> u32 {
        0
    }
}

impl ConstByteLength for () {
    fn const_byte_length() -> u32 {
        0
    }
}

// Bool

impl Serde for bool {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        writer.write_byte(u8::from(*self));
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match reader.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerdeErr),
        }
    }

    fn byte_length(&self) -> u32 {
        1
    }
}

impl ConstByteLength for bool {
    fn const_byte_length() -> u32 {
        1
    }
}

// Collections

fn read_length(reader: &mut ByteReader) -> Result<usize, SerdeErr> {
    let length = VarInt::de(reader)?.get();
    if length > MAX_COLLECTION_LENGTH {
        return Err(SerdeErr);
    }
    usize::try_from(length).map_err(|_| SerdeErr)
}

impl Serde for String {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        VarInt::new(self.len() as u64).ser(writer);
        writer.write_bytes(self.as_bytes());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let length = read_length(reader)?;
        let bytes = reader.read_bytes(length)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SerdeErr)
    }

    fn byte_length(&self) -> u32 {
        VarInt::new(self.len() as u64).byte_length() + self.len() as u32
    }
}

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        VarInt::new(self.len() as u64).ser(writer);
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let length = read_length(reader)?;
        // every element takes at least one byte, except zero-sized ones
        let mut output = Vec::with_capacity(length.min(reader.remaining_len()));
        for _ in 0..length {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }

    fn byte_length(&self) -> u32 {
        let mut output = VarInt::new(self.len() as u64).byte_length();
        for item in self {
            output += item.byte_length();
        }
        output
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        match self {
            Some(value) => {
                true.ser(writer);
                value.ser(writer);
            }
            None => false.ser(writer),
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        if bool::de(reader)? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn byte_length(&self) -> u32 {
        match self {
            Some(value) => 1 + value.byte_length(),
            None => 1,
        }
    }
}

// Tuples, arity 1 through 4. Anything wider should be a struct payload.

macro_rules! impl_serde_tuple {
    ($($name:ident : $index:tt),+) => {
        impl<$($name: Serde),+> Serde for ($($name,)+) {
            fn ser(&self, writer: &mut dyn ByteWrite) {
                $(self.$index.ser(writer);)+
            }

            fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
                Ok(($($name::de(reader)?,)+))
            }

            fn byte_length(&self) -> u32 {
                0 $(+ self.$index.byte_length())+
            }
        }
    };
}

impl_serde_tuple!(A: 0);
impl_serde_tuple!(A: 0, B: 1);
impl_serde_tuple!(A: 0, B: 1, C: 2);
impl_serde_tuple!(A: 0, B: 1, C: 2, D: 3);
