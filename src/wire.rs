//! Self-describing binary wire format and the zero-copy `View` over it
//!
//! Every value starts with a one-byte kind:
//!
//! ```text
//! 0x00 unit
//! 0x01 bool      [u8]
//! 0x02 uint      [u64 LE]
//! 0x03 string    [len: u32 LE][utf-8 bytes]
//! 0x04 sequence  [count: u32 LE][count x offset: u32 LE][elements...]
//! 0x05 record    [count: u32 LE][count x offset: u32 LE][(string name, value)...]
//! 0x06 variant   [tag: u32 LE][value]
//! 0x07 none
//! 0x08 some      [value]
//! ```
//!
//! Offsets are relative to the first byte after the offset table, so
//! `elem(i)` is a constant-time jump. Reading never copies: a `WireView`
//! is a position into the caller's buffer and every accessor bounds-checks
//! before it touches a byte.
//!
//! Depth counts variant payloads only. Every recursive schema type (a shape
//! nested in a shape) is a variant, so a view's depth is the shape nesting
//! level and records or sequences around it are free.

use crate::error::CodecError;

pub const KIND_UNIT: u8 = 0x00;
pub const KIND_BOOL: u8 = 0x01;
pub const KIND_UINT: u8 = 0x02;
pub const KIND_STRING: u8 = 0x03;
pub const KIND_SEQ: u8 = 0x04;
pub const KIND_RECORD: u8 = 0x05;
pub const KIND_VARIANT: u8 = 0x06;
pub const KIND_NONE: u8 = 0x07;
pub const KIND_SOME: u8 = 0x08;

/// Default nesting limit for views, in variant levels
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default maximum encoded size (16MB)
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Largest encoding the format can address: lengths and offsets are u32
pub const MAX_ENCODED_SIZE: usize = u32::MAX as usize;

fn kind_name(kind: u8) -> &'static str {
    match kind {
        KIND_UNIT => "unit",
        KIND_BOOL => "bool",
        KIND_UINT => "uint",
        KIND_STRING => "string",
        KIND_SEQ => "sequence",
        KIND_RECORD => "record",
        KIND_VARIANT => "variant",
        KIND_NONE => "none",
        KIND_SOME => "some",
        _ => "unknown",
    }
}

// =============================================================================
// View
// =============================================================================

/// Random-access reader over an encoded value.
///
/// Decoding and structural comparison in the registry are written purely
/// against this trait, so any encoding that can answer these questions is
/// interchangeable with [`WireView`].
pub trait View: Sized {
    /// Discriminant of a variant value
    fn tag(&self) -> Result<u32, CodecError>;
    /// Payload of a variant value; fails if the tag is not `tag`
    fn value(&self, tag: u32) -> Result<Self, CodecError>;
    /// Named field of a record value
    fn field(&self, name: &str) -> Result<Self, CodecError>;
    /// Element `index` of a sequence value
    fn elem(&self, index: usize) -> Result<Self, CodecError>;
    /// Element count of a sequence or record value
    fn len(&self) -> Result<usize, CodecError>;
    fn bool(&self) -> Result<bool, CodecError>;
    fn uint(&self) -> Result<u64, CodecError>;
    fn str(&self) -> Result<&str, CodecError>;
    /// `None` for an absent optional, the inner view otherwise
    fn option(&self) -> Result<Option<Self>, CodecError>;
}

/// Zero-copy view into a wire-encoded buffer
#[derive(Debug, Clone, Copy)]
pub struct WireView<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> WireView<'a> {
    /// View the root value of `buf` with default limits
    pub fn new(buf: &'a [u8]) -> Result<Self, CodecError> {
        Self::with_limits(buf, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAYLOAD)
    }

    /// View the root value of `buf`, rejecting oversized buffers and
    /// variant payloads nested deeper than `max_depth`
    pub fn with_limits(
        buf: &'a [u8],
        max_depth: usize,
        max_payload: usize,
    ) -> Result<Self, CodecError> {
        if buf.len() > max_payload {
            return Err(CodecError::PayloadTooLarge {
                size: buf.len(),
                max: max_payload,
            });
        }
        let view = Self {
            buf,
            pos: 0,
            depth: 0,
            max_depth,
        };
        view.kind()?;
        Ok(view)
    }

    /// Number of variant payloads entered between the root and this view
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn kind(&self) -> Result<u8, CodecError> {
        let kind = self.byte(self.pos)?;
        if kind > KIND_SOME {
            return Err(CodecError::UnknownKind(kind));
        }
        Ok(kind)
    }

    fn expect(&self, expected: u8) -> Result<(), CodecError> {
        let found = self.kind()?;
        if found != expected {
            return Err(CodecError::KindMismatch {
                expected: kind_name(expected),
                found: kind_name(found),
            });
        }
        Ok(())
    }

    fn bytes(&self, at: usize, need: usize) -> Result<&'a [u8], CodecError> {
        let end = at.checked_add(need).filter(|end| *end <= self.buf.len());
        match end {
            Some(end) => Ok(&self.buf[at..end]),
            None => Err(CodecError::UnexpectedEof {
                offset: at,
                need,
                len: self.buf.len(),
            }),
        }
    }

    fn byte(&self, at: usize) -> Result<u8, CodecError> {
        Ok(self.bytes(at, 1)?[0])
    }

    fn u32_at(&self, at: usize) -> Result<u32, CodecError> {
        let b = self.bytes(at, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64_at(&self, at: usize) -> Result<u64, CodecError> {
        let b = self.bytes(at, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    fn str_at(&self, at: usize) -> Result<(&'a str, usize), CodecError> {
        let len = self.u32_at(at + 1)? as usize;
        let raw = self.bytes(at + 5, len)?;
        let s = std::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?;
        Ok((s, at + 5 + len))
    }

    fn child(&self, pos: usize) -> Result<Self, CodecError> {
        let child = Self { pos, ..*self };
        child.kind()?;
        Ok(child)
    }

    fn nested(&self, pos: usize) -> Result<Self, CodecError> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(CodecError::DepthExceeded(self.max_depth));
        }
        let child = Self {
            depth,
            ..self.child(pos)?
        };
        Ok(child)
    }

    /// Count, offset-table start and body start of a sequence or record.
    /// The offset table is checked to fit the buffer, which bounds `count`.
    fn table(&self) -> Result<(usize, usize, usize), CodecError> {
        let count = self.u32_at(self.pos + 1)? as usize;
        let table = self.pos + 5;
        let body = count
            .checked_mul(4)
            .and_then(|size| table.checked_add(size))
            .ok_or(CodecError::IntegerOverflow(count as u64))?;
        if body > self.buf.len() {
            return Err(CodecError::UnexpectedEof {
                offset: table,
                need: body - table,
                len: self.buf.len(),
            });
        }
        Ok((count, table, body))
    }

    fn entry(&self, table: usize, body: usize, index: usize) -> Result<usize, CodecError> {
        let offset = self.u32_at(table + index * 4)? as usize;
        body.checked_add(offset)
            .ok_or(CodecError::IntegerOverflow(offset as u64))
    }
}

impl<'a> View for WireView<'a> {
    fn tag(&self) -> Result<u32, CodecError> {
        self.expect(KIND_VARIANT)?;
        self.u32_at(self.pos + 1)
    }

    fn value(&self, tag: u32) -> Result<Self, CodecError> {
        let found = self.tag()?;
        if found != tag {
            return Err(CodecError::TagMismatch {
                expected: tag,
                found,
            });
        }
        self.nested(self.pos + 5)
    }

    fn field(&self, name: &str) -> Result<Self, CodecError> {
        self.expect(KIND_RECORD)?;
        let (count, table, body) = self.table()?;
        for index in 0..count {
            let at = self.entry(table, body, index)?;
            if self.byte(at)? != KIND_STRING {
                return Err(CodecError::KindMismatch {
                    expected: kind_name(KIND_STRING),
                    found: kind_name(self.byte(at)?),
                });
            }
            let (key, next) = self.str_at(at)?;
            if key == name {
                return self.child(next);
            }
        }
        Err(CodecError::MissingField(name.to_string()))
    }

    fn elem(&self, index: usize) -> Result<Self, CodecError> {
        self.expect(KIND_SEQ)?;
        let (count, table, body) = self.table()?;
        if index >= count {
            return Err(CodecError::IndexOutOfRange { index, len: count });
        }
        let at = self.entry(table, body, index)?;
        self.child(at)
    }

    fn len(&self) -> Result<usize, CodecError> {
        match self.kind()? {
            KIND_SEQ | KIND_RECORD => Ok(self.table()?.0),
            found => Err(CodecError::KindMismatch {
                expected: "sequence or record",
                found: kind_name(found),
            }),
        }
    }

    fn bool(&self) -> Result<bool, CodecError> {
        self.expect(KIND_BOOL)?;
        Ok(self.byte(self.pos + 1)? != 0)
    }

    fn uint(&self) -> Result<u64, CodecError> {
        self.expect(KIND_UINT)?;
        self.u64_at(self.pos + 1)
    }

    fn str(&self) -> Result<&str, CodecError> {
        self.expect(KIND_STRING)?;
        Ok(self.str_at(self.pos)?.0)
    }

    fn option(&self) -> Result<Option<Self>, CodecError> {
        match self.kind()? {
            KIND_NONE => Ok(None),
            KIND_SOME => Ok(Some(self.child(self.pos + 1)?)),
            found => Err(CodecError::KindMismatch {
                expected: "option",
                found: kind_name(found),
            }),
        }
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Types with a wire representation
pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>);

    /// Encode into a fresh buffer
    fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Encode, rejecting results larger than `max_payload` or than the
    /// format can address. A table whose body outgrew u32 offsets is always
    /// caught here, since the whole encoding is at least as large.
    fn to_wire_checked(&self, max_payload: usize) -> Result<Vec<u8>, CodecError> {
        let max = max_payload.min(MAX_ENCODED_SIZE);
        let out = self.to_wire();
        if out.len() > max {
            return Err(CodecError::PayloadTooLarge { size: out.len(), max });
        }
        Ok(out)
    }
}

pub fn write_unit(out: &mut Vec<u8>) {
    out.push(KIND_UNIT);
}

/// Write a variant header; the payload must follow immediately
pub fn write_variant(out: &mut Vec<u8>, tag: u32) {
    out.push(KIND_VARIANT);
    out.extend_from_slice(&tag.to_le_bytes());
}

/// Counts and offsets are written as u32 and wrap past [`MAX_ENCODED_SIZE`];
/// [`Encode::to_wire_checked`] rejects such encodings.
fn write_table(out: &mut Vec<u8>, kind: u8, parts: Vec<Vec<u8>>) {
    out.push(kind);
    out.extend_from_slice(&(parts.len() as u32).to_le_bytes());
    let mut offset = 0usize;
    for part in &parts {
        out.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += part.len();
    }
    for part in parts {
        out.extend_from_slice(&part);
    }
}

pub fn write_seq<T: Encode>(out: &mut Vec<u8>, items: &[T]) {
    let parts = items.iter().map(Encode::to_wire).collect();
    write_table(out, KIND_SEQ, parts);
}

pub fn write_record(out: &mut Vec<u8>, entries: &[(&str, &dyn Encode)]) {
    let parts = entries
        .iter()
        .map(|(name, value)| {
            let mut part = Vec::new();
            name.encode(&mut part);
            value.encode(&mut part);
            part
        })
        .collect();
    write_table(out, KIND_RECORD, parts);
}

impl Encode for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(KIND_BOOL);
        out.push(u8::from(*self));
    }
}

impl Encode for u64 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(KIND_UINT);
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Encode for u16 {
    fn encode(&self, out: &mut Vec<u8>) {
        u64::from(*self).encode(out);
    }
}

impl Encode for str {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(KIND_STRING);
        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        out.extend_from_slice(self.as_bytes());
    }
}

impl Encode for &str {
    fn encode(&self, out: &mut Vec<u8>) {
        (**self).encode(out);
    }
}

impl Encode for String {
    fn encode(&self, out: &mut Vec<u8>) {
        self.as_str().encode(out);
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(KIND_NONE),
            Some(value) => {
                out.push(KIND_SOME);
                value.encode(out);
            }
        }
    }
}

impl<T: Encode> Encode for Box<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        (**self).encode(out);
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        write_seq(out, self);
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Types that can be materialized from a [`View`]
pub trait Decode: Sized {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError>;
}

/// Decode the root value of `bytes` with default limits
pub fn from_wire<T: Decode>(bytes: &[u8]) -> Result<T, CodecError> {
    T::decode(&WireView::new(bytes)?)
}

impl Decode for bool {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        view.bool()
    }
}

impl Decode for u64 {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        view.uint()
    }
}

impl Decode for u16 {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        let raw = view.uint()?;
        u16::try_from(raw).map_err(|_| CodecError::IntegerOverflow(raw))
    }
}

impl Decode for String {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        Ok(view.str()?.to_owned())
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        view.option()?.map(|inner| T::decode(&inner)).transpose()
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        T::decode(view).map(Box::new)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        let len = view.len()?;
        let mut items = Vec::with_capacity(len);
        for index in 0..len {
            items.push(T::decode(&view.elem(index)?)?);
        }
        Ok(items)
    }
}
