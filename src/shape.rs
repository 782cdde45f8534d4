//! Shape model
//!
//! A `Shape` is one structural definition of a type at a point in its
//! history. Composite nodes own their children exclusively (`Box`/`Vec`),
//! so a shape is always a finite tree and dropping the root releases every
//! node beneath it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::declare::Decl;
use crate::error::CodecError;
use crate::fingerprint::Fingerprint;
use crate::wire::{self, Decode, Encode, View};

/// Wire tags for each shape variant
pub mod tag {
    pub const VOID: u32 = 0;
    pub const BOOL: u32 = 1;
    pub const INT: u32 = 2;
    pub const FLOAT: u32 = 3;
    pub const OPTIONAL: u32 = 4;
    pub const REF: u32 = 5;
    pub const ARRAY: u32 = 6;
    pub const LIST: u32 = 7;
    pub const MAP: u32 = 8;
    pub const STRING: u32 = 9;
    pub const STRUCT: u32 = 10;
    pub const TUPLE: u32 = 11;
    pub const UNION: u32 = 12;
    pub const ENUM: u32 = 13;
}

/// Reference to a named object, in the current scheme (`scheme == None`)
/// or in an external one
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ref {
    pub scheme: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Ref {
    pub fn local(type_name: impl Into<String>) -> Self {
        Self {
            scheme: None,
            type_name: type_name.into(),
        }
    }

    pub fn external(scheme: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            scheme: Some(scheme.into()),
            type_name: type_name.into(),
        }
    }

    /// Both schemes absent or both present and equal, and equal type names
    pub fn eql(&self, other: &Ref) -> bool {
        let same_scheme = match (&self.scheme, &other.scheme) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        same_scheme && self.type_name == other.type_name
    }

    pub fn eql_view<V: View>(&self, view: &V) -> Result<bool, CodecError> {
        let same_scheme = match (&self.scheme, view.field("scheme")?.option()?) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b.str()?,
            _ => false,
        };
        Ok(same_scheme && view.field("type")?.str()? == self.type_name)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scheme {
            Some(scheme) => write!(f, "{}.{}", scheme, self.type_name),
            None => write!(f, "{}", self.type_name),
        }
    }
}

/// Named member of a struct or union shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
}

impl Field {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// Every representable field shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Void,
    Bool,
    Int { signed: bool, bits: u16 },
    Float { bits: u16 },
    Optional(Box<Shape>),
    Ref(Ref),
    Array { len: u64, child: Box<Shape> },
    List(Box<Shape>),
    Map { key: Box<Shape>, value: Box<Shape> },
    String,
    Struct(Vec<Field>),
    Tuple(Vec<Shape>),
    Union(Vec<Field>),
    Enum(Vec<String>),
}

impl Shape {
    /// Map a declared field into the shape model.
    ///
    /// Returns `None` only for [`Decl::Ignore`]; struct, union and tuple
    /// members that map to `None` are dropped from their parent. Wrappers
    /// (optional, array, list, map) cannot drop their child, so an ignored
    /// child there becomes `Void`. `this` names the enclosing object and
    /// resolves the [`Decl::This`] marker.
    pub fn from_decl(decl: &Decl, this: &str) -> Option<Shape> {
        fn fields(members: &[(String, Decl)], this: &str) -> Vec<Field> {
            members
                .iter()
                .filter_map(|(name, d)| {
                    Shape::from_decl(d, this).map(|shape| Field::new(name, shape))
                })
                .collect()
        }
        let child = |d: &Decl| Box::new(Shape::from_decl(d, this).unwrap_or(Shape::Void));

        Some(match decl {
            Decl::Ignore => return None,
            Decl::Void => Shape::Void,
            Decl::Bool => Shape::Bool,
            Decl::Int { signed, bits } => Shape::Int {
                signed: *signed,
                bits: *bits,
            },
            Decl::Float { bits } => Shape::Float { bits: *bits },
            Decl::Optional(inner) => Shape::Optional(child(inner)),
            Decl::Ref { scheme, type_name } => Shape::Ref(Ref::external(&scheme.name, type_name)),
            Decl::Local(type_name) => Shape::Ref(Ref::local(type_name)),
            Decl::This => Shape::Ref(Ref::local(this)),
            Decl::Array { len, child: inner } => Shape::Array {
                len: *len,
                child: child(inner),
            },
            Decl::List(inner) => Shape::List(child(inner)),
            Decl::Map { key, value } => Shape::Map {
                key: child(key),
                value: child(value),
            },
            Decl::String => Shape::String,
            Decl::Struct(members) => Shape::Struct(fields(members, this)),
            Decl::Tuple(items) => Shape::Tuple(
                items
                    .iter()
                    .filter_map(|d| Shape::from_decl(d, this))
                    .collect(),
            ),
            Decl::Union(members) => Shape::Union(fields(members, this)),
            Decl::Enum(names) => Shape::Enum(names.clone()),
        })
    }

    /// Wire tag of this variant
    pub fn tag(&self) -> u32 {
        match self {
            Shape::Void => tag::VOID,
            Shape::Bool => tag::BOOL,
            Shape::Int { .. } => tag::INT,
            Shape::Float { .. } => tag::FLOAT,
            Shape::Optional(_) => tag::OPTIONAL,
            Shape::Ref(_) => tag::REF,
            Shape::Array { .. } => tag::ARRAY,
            Shape::List(_) => tag::LIST,
            Shape::Map { .. } => tag::MAP,
            Shape::String => tag::STRING,
            Shape::Struct(_) => tag::STRUCT,
            Shape::Tuple(_) => tag::TUPLE,
            Shape::Union(_) => tag::UNION,
            Shape::Enum(_) => tag::ENUM,
        }
    }

    /// Structural equality.
    ///
    /// Same variant and recursively equal children. Struct and union
    /// fields are matched by position, and the name is checked at each
    /// position: `{a, b}` and `{b, a}` are different shapes. Enum names
    /// are matched the same way.
    pub fn eql(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Void, Shape::Void)
            | (Shape::Bool, Shape::Bool)
            | (Shape::String, Shape::String) => true,
            (
                Shape::Int { signed, bits },
                Shape::Int {
                    signed: other_signed,
                    bits: other_bits,
                },
            ) => signed == other_signed && bits == other_bits,
            (Shape::Float { bits }, Shape::Float { bits: other_bits }) => bits == other_bits,
            (Shape::Optional(a), Shape::Optional(b)) | (Shape::List(a), Shape::List(b)) => a.eql(b),
            (Shape::Ref(a), Shape::Ref(b)) => a.eql(b),
            (
                Shape::Array { len, child },
                Shape::Array {
                    len: other_len,
                    child: other_child,
                },
            ) => len == other_len && child.eql(other_child),
            (
                Shape::Map { key, value },
                Shape::Map {
                    key: other_key,
                    value: other_value,
                },
            ) => key.eql(other_key) && value.eql(other_value),
            (Shape::Struct(a), Shape::Struct(b)) | (Shape::Union(a), Shape::Union(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| x.name == y.name && x.shape.eql(&y.shape))
            }
            (Shape::Tuple(a), Shape::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eql(y))
            }
            (Shape::Enum(a), Shape::Enum(b)) => a == b,
            _ => false,
        }
    }

    /// [`Shape::eql`] evaluated directly against an encoded shape, without
    /// materializing it. Recursion is bounded by the depth of `self`.
    pub fn eql_view<V: View>(&self, view: &V) -> Result<bool, CodecError> {
        let found = view.tag()?;
        if found != self.tag() {
            return Ok(false);
        }
        let payload = view.value(found)?;

        match self {
            Shape::Void | Shape::Bool | Shape::String => Ok(true),
            Shape::Int { signed, bits } => Ok(payload.field("signed")?.bool()? == *signed
                && payload.field("bits")?.uint()? == u64::from(*bits)),
            Shape::Float { bits } => Ok(payload.field("bits")?.uint()? == u64::from(*bits)),
            Shape::Optional(child) | Shape::List(child) => child.eql_view(&payload),
            Shape::Ref(r) => r.eql_view(&payload),
            Shape::Array { len, child } => {
                if payload.field("len")?.uint()? != *len {
                    return Ok(false);
                }
                child.eql_view(&payload.field("child")?)
            }
            Shape::Map { key, value } => {
                Ok(key.eql_view(&payload.field("key")?)?
                    && value.eql_view(&payload.field("value")?)?)
            }
            Shape::Struct(fields) | Shape::Union(fields) => {
                if payload.len()? != fields.len() {
                    return Ok(false);
                }
                for (index, field) in fields.iter().enumerate() {
                    let entry = payload.elem(index)?;
                    if entry.field("name")?.str()? != field.name
                        || !field.shape.eql_view(&entry.field("shape")?)?
                    {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Shape::Tuple(items) => {
                if payload.len()? != items.len() {
                    return Ok(false);
                }
                for (index, item) in items.iter().enumerate() {
                    if !item.eql_view(&payload.elem(index)?)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Shape::Enum(names) => {
                if payload.len()? != names.len() {
                    return Ok(false);
                }
                for (index, name) in names.iter().enumerate() {
                    if payload.elem(index)?.str()? != name {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Every reference in this tree, depth-first
    pub fn refs(&self) -> Vec<&Ref> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a Ref>) {
        match self {
            Shape::Ref(r) => out.push(r),
            Shape::Optional(child) | Shape::List(child) | Shape::Array { child, .. } => {
                child.collect_refs(out)
            }
            Shape::Map { key, value } => {
                key.collect_refs(out);
                value.collect_refs(out);
            }
            Shape::Struct(fields) | Shape::Union(fields) => {
                for field in fields {
                    field.shape.collect_refs(out);
                }
            }
            Shape::Tuple(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            Shape::Void
            | Shape::Bool
            | Shape::Int { .. }
            | Shape::Float { .. }
            | Shape::String
            | Shape::Enum(_) => {}
        }
    }

    /// Content address of the canonical encoding
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.eql(other)
    }
}

impl Eq for Shape {}

fn write_fields(f: &mut fmt::Formatter<'_>, keyword: &str, fields: &[Field]) -> fmt::Result {
    write!(f, "{}{{", keyword)?;
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", field.name, field.shape)?;
    }
    write!(f, "}}")
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Void => write!(f, "void"),
            Shape::Bool => write!(f, "bool"),
            Shape::Int { signed, bits } => write!(f, "{}{}", if *signed { "i" } else { "u" }, bits),
            Shape::Float { bits } => write!(f, "f{}", bits),
            Shape::Optional(child) => write!(f, "?{}", child),
            Shape::Ref(r) => write!(f, "{}", r),
            Shape::Array { len, child } => write!(f, "[{}]{}", len, child),
            Shape::List(child) => write!(f, "[]{}", child),
            Shape::Map { key, value } => write!(f, "map[{}]{}", key, value),
            Shape::String => write!(f, "string"),
            Shape::Struct(fields) => write_fields(f, "struct", fields),
            Shape::Union(fields) => write_fields(f, "union", fields),
            Shape::Tuple(items) => {
                write!(f, "(")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Shape::Enum(names) => write!(f, "enum{{{}}}", names.join(", ")),
        }
    }
}

// --- Wire representation ---

impl Encode for Ref {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(out, &[("scheme", &self.scheme), ("type", &self.type_name)]);
    }
}

impl Decode for Ref {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        Ok(Self {
            scheme: Option::<String>::decode(&view.field("scheme")?)?,
            type_name: String::decode(&view.field("type")?)?,
        })
    }
}

impl Encode for Field {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(out, &[("name", &self.name), ("shape", &self.shape)]);
    }
}

impl Decode for Field {
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        Ok(Self {
            name: String::decode(&view.field("name")?)?,
            shape: Shape::decode(&view.field("shape")?)?,
        })
    }
}

impl Encode for Shape {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_variant(out, self.tag());
        match self {
            Shape::Void | Shape::Bool | Shape::String => wire::write_unit(out),
            Shape::Int { signed, bits } => {
                wire::write_record(out, &[("signed", signed), ("bits", bits)])
            }
            Shape::Float { bits } => wire::write_record(out, &[("bits", bits)]),
            Shape::Optional(child) | Shape::List(child) => child.encode(out),
            Shape::Ref(r) => r.encode(out),
            Shape::Array { len, child } => {
                wire::write_record(out, &[("len", len), ("child", child)])
            }
            Shape::Map { key, value } => wire::write_record(out, &[("key", key), ("value", value)]),
            Shape::Struct(fields) | Shape::Union(fields) => wire::write_seq(out, fields),
            Shape::Tuple(items) => wire::write_seq(out, items),
            Shape::Enum(names) => wire::write_seq(out, names),
        }
    }
}

impl Decode for Shape {
    /// Materialize a fresh, exclusively owned tree from `view`
    fn decode<V: View>(view: &V) -> Result<Self, CodecError> {
        let found = view.tag()?;
        let payload = view.value(found)?;
        Ok(match found {
            tag::VOID => Shape::Void,
            tag::BOOL => Shape::Bool,
            tag::INT => Shape::Int {
                signed: payload.field("signed")?.bool()?,
                bits: u16::decode(&payload.field("bits")?)?,
            },
            tag::FLOAT => Shape::Float {
                bits: u16::decode(&payload.field("bits")?)?,
            },
            tag::OPTIONAL => Shape::Optional(Box::decode(&payload)?),
            tag::REF => Shape::Ref(Ref::decode(&payload)?),
            tag::ARRAY => Shape::Array {
                len: payload.field("len")?.uint()?,
                child: Box::decode(&payload.field("child")?)?,
            },
            tag::LIST => Shape::List(Box::decode(&payload)?),
            tag::MAP => Shape::Map {
                key: Box::decode(&payload.field("key")?)?,
                value: Box::decode(&payload.field("value")?)?,
            },
            tag::STRING => Shape::String,
            tag::STRUCT => Shape::Struct(Vec::decode(&payload)?),
            tag::TUPLE => Shape::Tuple(Vec::decode(&payload)?),
            tag::UNION => Shape::Union(Vec::decode(&payload)?),
            tag::ENUM => Shape::Enum(Vec::decode(&payload)?),
            other => {
                return Err(CodecError::UnknownVariant {
                    ty: "shape",
                    tag: u64::from(other),
                })
            }
        })
    }
}
