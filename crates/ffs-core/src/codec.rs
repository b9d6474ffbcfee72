//! Canonical binary codec for control messages and session payloads.
//!
//! One layout, no options:
//!   - integers are big-endian at their declared width; signed and unsigned
//!     variants of the same width share the bit pattern
//!   - strings are a u16 byte length followed by raw UTF-8 (no terminator)
//!   - enumerations travel as int32
//!   - fixed-size arrays are raw bytes, length checked against the declaration
//!
//! Decoding never panics on short input. Nested structures spend one unit of
//! recursion depth per level and fail closed when it runs out.

use bytes::{BufMut, Bytes, BytesMut};

/// Largest string payload, in encoded bytes, a u16 length prefix can describe.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Recursion budget handed to a fresh encoder or decoder.
pub const DEFAULT_RECURSION_DEPTH: u32 = 32;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unrecognized enum value: {0}")]
    UnrecognizedEnum(i32),

    #[error("array has length {0}, which does not match its declared length")]
    ArrayLength(usize),

    #[error("recursion depth limit reached")]
    Recursion,

    #[error("string of {0} encoded bytes exceeds the {MAX_STRING_LEN}-byte limit")]
    StringTooLong(usize),

    #[error("string is not valid UTF-8")]
    StringEncoding,
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// A value with a canonical wire encoding.
pub trait Encode {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CodecError>;
}

/// A value that can be rebuilt from its canonical wire encoding.
pub trait Decode: Sized {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError>;
}

/// An enumeration carried on the wire as an int32 discriminant.
pub trait WireEnum: Sized + Copy {
    fn to_wire(self) -> i32;
    fn from_wire(value: i32) -> Result<Self, CodecError>;
}

/// Encode a single value into a fresh buffer.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Result<Bytes, CodecError> {
    let mut enc = Encoder::new();
    value.encode(&mut enc)?;
    Ok(enc.finish())
}

/// Decode a single value from the front of `buf`. Trailing bytes are ignored,
/// since session payloads arrive zero-padded to the packet size.
pub fn from_bytes<T: Decode>(buf: &[u8]) -> Result<T, CodecError> {
    let mut dec = Decoder::new(buf);
    T::decode(&mut dec)
}

// ── Encoder ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Encoder {
    buf: BytesMut,
    depth: u32,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_RECURSION_DEPTH)
    }

    pub fn with_depth(depth: u32) -> Self {
        Self {
            buf: BytesMut::new(),
            depth,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn put_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    /// Length-prefixed UTF-8. Fails before writing anything if the encoded
    /// form does not fit the u16 prefix.
    pub fn put_string(&mut self, s: &str) -> Result<(), CodecError> {
        let encoded = s.as_bytes();
        let len = u16::try_from(encoded.len())
            .map_err(|_| CodecError::StringTooLong(encoded.len()))?;
        self.buf.put_u16(len);
        self.buf.put_slice(encoded);
        Ok(())
    }

    /// Raw bytes of a fixed-size array declared as `declared` bytes long.
    pub fn put_fixed(&mut self, bytes: &[u8], declared: usize) -> Result<(), CodecError> {
        if bytes.len() != declared {
            return Err(CodecError::ArrayLength(bytes.len()));
        }
        self.buf.put_slice(bytes);
        Ok(())
    }

    pub fn put_enum<E: WireEnum>(&mut self, v: E) {
        self.buf.put_i32(v.to_wire());
    }

    pub fn put<T: Encode + ?Sized>(&mut self, v: &T) -> Result<(), CodecError> {
        v.encode(self)
    }

    /// Run `f` one nesting level deeper.
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CodecError>,
    ) -> Result<T, CodecError> {
        if self.depth == 0 {
            return Err(CodecError::Recursion);
        }
        self.depth -= 1;
        let out = f(self);
        self.depth += 1;
        out
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    depth: u32,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_depth(buf, DEFAULT_RECURSION_DEPTH)
    }

    pub fn with_depth(buf: &'a [u8], depth: u32) -> Self {
        Self { buf, depth }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Bytes not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < n {
            return Err(CodecError::Truncated {
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn get_i8(&mut self) -> Result<i8, CodecError> {
        Ok(i8::from_be_bytes(self.take_array()?))
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn get_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn get_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn get_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn get_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn get_string(&mut self) -> Result<String, CodecError> {
        let len = self.get_u16()? as usize;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| CodecError::StringEncoding)
    }

    pub fn get_fixed<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.take_array()
    }

    pub fn get_enum<E: WireEnum>(&mut self) -> Result<E, CodecError> {
        E::from_wire(self.get_i32()?)
    }

    pub fn get<T: Decode>(&mut self) -> Result<T, CodecError> {
        T::decode(self)
    }

    /// Run `f` one nesting level deeper.
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CodecError>,
    ) -> Result<T, CodecError> {
        if self.depth == 0 {
            return Err(CodecError::Recursion);
        }
        self.depth -= 1;
        let out = f(self);
        self.depth += 1;
        out
    }
}

// ── Primitive impls ───────────────────────────────────────────────────────────

macro_rules! integral_codec {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, enc: &mut Encoder) -> Result<(), CodecError> {
                    enc.$put(*self);
                    Ok(())
                }
            }

            impl Decode for $ty {
                fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
                    dec.$get()
                }
            }
        )*
    };
}

integral_codec! {
    u8  => put_u8,  get_u8;
    i8  => put_i8,  get_i8;
    u16 => put_u16, get_u16;
    i16 => put_i16, get_i16;
    u32 => put_u32, get_u32;
    i32 => put_i32, get_i32;
    u64 => put_u64, get_u64;
    i64 => put_i64, get_i64;
}

impl Encode for str {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CodecError> {
        enc.put_string(self)
    }
}

impl Encode for String {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CodecError> {
        enc.put_string(self)
    }
}

impl Decode for String {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        dec.get_string()
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CodecError> {
        enc.put_fixed(self, N)
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        dec.get_fixed()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
