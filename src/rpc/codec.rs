//! Wire codec for the RPC substrate.
//!
//! A call travels as one length-prefixed record per connection. Record
//! headers (method identity, parameter type descriptors, status tag) are
//! encoded with big-endian primitives; argument tuples, return values and
//! exceptions are serde object graphs encoded with bincode. All multibyte
//! header values are in network byte order.

use std::io::{self, Error, ErrorKind, Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Maximum length of a method identifier on the wire.
pub const MAX_METHOD_LEN: usize = 64;

/// Maximum number of parameter type descriptors per call.
pub const MAX_DESCRIPTORS: usize = 8;

/// Maximum length of a single parameter type descriptor.
pub const MAX_DESCRIPTOR_LEN: usize = 32;

/// Maximum length of a serialized argument or return payload.
pub const MAX_PAYLOAD_LEN: usize = 8 * 1024 * 1024;

/// Status tag preceding every reply payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Status {
    /// The payload is the serialized return value.
    Ok = 0,
    /// The payload is the serialized exception.
    Error = 1,
}

/// One marshalled call: method identity, parameter type descriptors used to
/// disambiguate overloads, and the serialized argument tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub method: String,
    pub descriptors: Vec<String>,
    pub payload: Vec<u8>,
}

/// One marshalled reply: status tag plus return value or exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    pub status: Status,
    pub payload: Vec<u8>,
}

/// Serializes a value into the bincode object-graph payload encoding.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> io::Result<Vec<u8>> {
    bincode::serialize(value).map_err(|err| Error::new(ErrorKind::InvalidData, err))
}

/// Deserializes a value from the bincode object-graph payload encoding.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> io::Result<T> {
    bincode::deserialize(bytes).map_err(|err| Error::new(ErrorKind::InvalidData, err))
}

/// Serializes a [`CallFrame`] into its record body.
pub fn write_call(dest: &mut impl Write, frame: &CallFrame) -> io::Result<()> {
    emit::string_max_size(dest, &frame.method, MAX_METHOD_LEN)?;
    if frame.descriptors.len() > MAX_DESCRIPTORS {
        return Err(Error::new(ErrorKind::InvalidInput, "too many parameter descriptors"));
    }
    emit::usize_as_u32(dest, frame.descriptors.len())?;
    for descriptor in &frame.descriptors {
        emit::string_max_size(dest, descriptor, MAX_DESCRIPTOR_LEN)?;
    }
    emit::vec_max_size(dest, &frame.payload, MAX_PAYLOAD_LEN)
}

/// Parses a [`CallFrame`] from a record body.
pub fn read_call(src: &mut impl Read) -> io::Result<CallFrame> {
    let method = parse::string_max_size(src, MAX_METHOD_LEN)?;
    let count = parse::u32_as_usize(src)?;
    if count > MAX_DESCRIPTORS {
        return Err(Error::new(ErrorKind::InvalidData, "too many parameter descriptors"));
    }
    let mut descriptors = Vec::with_capacity(count);
    for _ in 0..count {
        descriptors.push(parse::string_max_size(src, MAX_DESCRIPTOR_LEN)?);
    }
    let payload = parse::vec_max_size(src, MAX_PAYLOAD_LEN)?;
    Ok(CallFrame { method, descriptors, payload })
}

/// Serializes a [`ReplyFrame`] into its record body.
pub fn write_reply(dest: &mut impl Write, frame: &ReplyFrame) -> io::Result<()> {
    emit::variant(dest, frame.status)?;
    emit::vec_max_size(dest, &frame.payload, MAX_PAYLOAD_LEN)
}

/// Parses a [`ReplyFrame`] from a record body.
pub fn read_reply(src: &mut impl Read) -> io::Result<ReplyFrame> {
    let status = parse::variant(src)?;
    let payload = parse::vec_max_size(src, MAX_PAYLOAD_LEN)?;
    Ok(ReplyFrame { status, payload })
}

/// Primitive big-endian parsers over any `Read` source.
pub mod parse {
    use byteorder::{BigEndian, ReadBytesExt};
    use num_traits::{FromPrimitive, ToPrimitive};

    use super::*;

    /// Parses an unsigned 32-bit integer in network byte order.
    pub fn u32(src: &mut impl Read) -> io::Result<u32> {
        src.read_u32::<BigEndian>()
    }

    /// Parses an unsigned 64-bit integer in network byte order.
    pub fn u64(src: &mut impl Read) -> io::Result<u64> {
        src.read_u64::<BigEndian>()
    }

    /// Parses a `u32` and converts it to `usize`.
    pub fn u32_as_usize(src: &mut impl Read) -> io::Result<usize> {
        u32(src)?
            .to_usize()
            .ok_or_else(|| Error::new(ErrorKind::InvalidData, "length does not fit in usize"))
    }

    /// Parses a counted byte vector with an explicit maximum length.
    pub fn vec_max_size(src: &mut impl Read, max_size: usize) -> io::Result<Vec<u8>> {
        let size = u32_as_usize(src)?;
        if size > max_size {
            return Err(Error::new(ErrorKind::InvalidData, "counted value exceeds maximum"));
        }
        let mut vec = vec![0u8; size];
        src.read_exact(vec.as_mut_slice())?;
        Ok(vec)
    }

    /// Parses a counted UTF-8 string with an explicit maximum length.
    pub fn string_max_size(src: &mut impl Read, max_size: usize) -> io::Result<String> {
        let vec = vec_max_size(src, max_size)?;
        String::from_utf8(vec).map_err(|err| Error::new(ErrorKind::InvalidData, err))
    }

    /// Parses an enum discriminant encoded as a 32-bit integer.
    pub fn variant<T: FromPrimitive>(src: &mut impl Read) -> io::Result<T> {
        FromPrimitive::from_u32(u32(src)?)
            .ok_or_else(|| Error::new(ErrorKind::InvalidData, "unknown discriminant"))
    }
}

/// Primitive big-endian writers, mirror images of [`parse`].
pub mod emit {
    use byteorder::{BigEndian, WriteBytesExt};
    use num_traits::ToPrimitive;

    use super::*;

    /// Serializes an unsigned 32-bit integer in network byte order.
    pub fn u32(dest: &mut impl Write, n: u32) -> io::Result<()> {
        dest.write_u32::<BigEndian>(n)
    }

    /// Serializes an unsigned 64-bit integer in network byte order.
    pub fn u64(dest: &mut impl Write, n: u64) -> io::Result<()> {
        dest.write_u64::<BigEndian>(n)
    }

    /// Serializes a `usize` as a 32-bit length, failing on overflow.
    pub fn usize_as_u32(dest: &mut impl Write, n: usize) -> io::Result<()> {
        u32(
            dest,
            n.to_u32()
                .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "length exceeds u32"))?,
        )
    }

    /// Serializes a counted byte vector with an explicit maximum length.
    pub fn vec_max_size(dest: &mut impl Write, vec: &[u8], max_size: usize) -> io::Result<()> {
        if vec.len() > max_size {
            return Err(Error::new(ErrorKind::InvalidInput, "counted value exceeds maximum"));
        }
        usize_as_u32(dest, vec.len())?;
        dest.write_all(vec)
    }

    /// Serializes a counted UTF-8 string with an explicit maximum length.
    pub fn string_max_size(dest: &mut impl Write, string: &str, max_size: usize) -> io::Result<()> {
        vec_max_size(dest, string.as_bytes(), max_size)
    }

    /// Serializes an enum discriminant as a 32-bit integer.
    pub fn variant<T: ToPrimitive>(dest: &mut impl Write, val: T) -> io::Result<()> {
        u32(
            dest,
            ToPrimitive::to_u32(&val)
                .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "discriminant exceeds u32"))?,
        )
    }
}
