//! Declarative schema input
//!
//! Service authors describe their schemes with these builders instead of
//! host-language reflection. A scheme referenced from another scheme is
//! held as `Arc<SchemeDecl>`; the referencing site captures the scheme as it
//! looked when the reference was written, so two sites may see two
//! different snapshots of the same-named scheme. Identity of a snapshot is
//! `Arc` pointer identity.
//!
//! ```
//! use wire_schemas::declare::{Decl, SchemeDecl};
//!
//! let users = SchemeDecl::new("users")
//!     .object("User", [Decl::structure([("name", Decl::String)])])
//!     .build();
//! let posts = SchemeDecl::new("posts")
//!     .object("Post", [Decl::structure([
//!         ("author", Decl::reference(&users, "User")),
//!         ("replies", Decl::list(Decl::This)),
//!     ])])
//!     .build();
//! assert_eq!(posts.objects[0].versions.len(), 1);
//! ```

use std::sync::Arc;

/// Declared field type
#[derive(Debug, Clone)]
pub enum Decl {
    Void,
    Bool,
    Int { signed: bool, bits: u16 },
    Float { bits: u16 },
    Optional(Box<Decl>),
    /// Reference to an object of another scheme
    Ref { scheme: Arc<SchemeDecl>, type_name: String },
    /// Reference to an object of the enclosing scheme
    Local(String),
    /// Reference to the enclosing object itself
    This,
    Array { len: u64, child: Box<Decl> },
    List(Box<Decl>),
    Map { key: Box<Decl>, value: Box<Decl> },
    String,
    Struct(Vec<(String, Decl)>),
    Tuple(Vec<Decl>),
    Union(Vec<(String, Decl)>),
    Enum(Vec<String>),
    /// Drop this member from the wire shape
    Ignore,
}

impl Decl {
    pub fn int(signed: bool, bits: u16) -> Self {
        Decl::Int { signed, bits }
    }

    pub fn float(bits: u16) -> Self {
        Decl::Float { bits }
    }

    pub fn optional(inner: Decl) -> Self {
        Decl::Optional(Box::new(inner))
    }

    pub fn reference(scheme: &Arc<SchemeDecl>, type_name: impl Into<String>) -> Self {
        Decl::Ref {
            scheme: Arc::clone(scheme),
            type_name: type_name.into(),
        }
    }

    pub fn local(type_name: impl Into<String>) -> Self {
        Decl::Local(type_name.into())
    }

    pub fn array(len: u64, child: Decl) -> Self {
        Decl::Array {
            len,
            child: Box::new(child),
        }
    }

    pub fn list(inner: Decl) -> Self {
        Decl::List(Box::new(inner))
    }

    pub fn map(key: Decl, value: Decl) -> Self {
        Decl::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn structure<N: Into<String>>(fields: impl IntoIterator<Item = (N, Decl)>) -> Self {
        Decl::Struct(fields.into_iter().map(|(n, d)| (n.into(), d)).collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Decl>) -> Self {
        Decl::Tuple(items.into_iter().collect())
    }

    pub fn union<N: Into<String>>(variants: impl IntoIterator<Item = (N, Decl)>) -> Self {
        Decl::Union(variants.into_iter().map(|(n, d)| (n.into(), d)).collect())
    }

    pub fn enumeration<N: Into<String>>(names: impl IntoIterator<Item = N>) -> Self {
        Decl::Enum(names.into_iter().map(Into::into).collect())
    }

    /// Short name of the declared form, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Decl::Void => "void",
            Decl::Bool => "bool",
            Decl::Int { .. } => "int",
            Decl::Float { .. } => "float",
            Decl::Optional(_) => "optional",
            Decl::Ref { .. } => "ref",
            Decl::Local(_) => "local ref",
            Decl::This => "self ref",
            Decl::Array { .. } => "array",
            Decl::List(_) => "list",
            Decl::Map { .. } => "map",
            Decl::String => "string",
            Decl::Struct(_) => "struct",
            Decl::Tuple(_) => "tuple",
            Decl::Union(_) => "union",
            Decl::Enum(_) => "enum",
            Decl::Ignore => "ignore",
        }
    }

    /// Direct children of this declaration, in declaration order
    pub fn children(&self) -> Vec<&Decl> {
        match self {
            Decl::Optional(inner) | Decl::List(inner) | Decl::Array { child: inner, .. } => {
                vec![inner.as_ref()]
            }
            Decl::Map { key, value } => vec![key.as_ref(), value.as_ref()],
            Decl::Struct(members) | Decl::Union(members) => {
                members.iter().map(|(_, d)| d).collect()
            }
            Decl::Tuple(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// True if this tree refers to its own scheme (`Local` or `This`)
    pub fn has_local_ref(&self) -> bool {
        match self {
            Decl::Local(_) | Decl::This => true,
            other => other.children().into_iter().any(Decl::has_local_ref),
        }
    }
}

/// Named object with its ordered version history
#[derive(Debug, Clone)]
pub struct ObjectDecl {
    pub name: String,
    pub versions: Vec<Decl>,
}

/// A named scheme of versioned objects
#[derive(Debug, Clone)]
pub struct SchemeDecl {
    pub name: String,
    pub objects: Vec<ObjectDecl>,
}

impl SchemeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
        }
    }

    /// Add an object with its versions, oldest first
    pub fn object(
        mut self,
        name: impl Into<String>,
        versions: impl IntoIterator<Item = Decl>,
    ) -> Self {
        self.objects.push(ObjectDecl {
            name: name.into(),
            versions: versions.into_iter().collect(),
        });
        self
    }

    /// Freeze the declaration so other schemes can refer to it
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// A named message payload
#[derive(Debug, Clone)]
pub struct CommandDecl {
    pub name: String,
    pub payload: Decl,
}

#[derive(Debug, Clone)]
pub struct CommandSchemeDecl {
    pub name: String,
    pub commands: Vec<CommandDecl>,
}

impl CommandSchemeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    pub fn command(mut self, name: impl Into<String>, payload: Decl) -> Self {
        self.commands.push(CommandDecl {
            name: name.into(),
            payload,
        });
        self
    }
}

/// One historical signature of a remote function
#[derive(Debug, Clone)]
pub struct SignatureDecl {
    pub params: Vec<Decl>,
    pub ret: Decl,
}

impl SignatureDecl {
    pub fn new(params: impl IntoIterator<Item = Decl>, ret: Decl) -> Self {
        Self {
            params: params.into_iter().collect(),
            ret,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub versions: Vec<SignatureDecl>,
}

#[derive(Debug, Clone)]
pub struct FunctionSchemeDecl {
    pub name: String,
    pub functions: Vec<FunctionDecl>,
}

impl FunctionSchemeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Add a function with its signatures, oldest first
    pub fn function(
        mut self,
        name: impl Into<String>,
        versions: impl IntoIterator<Item = SignatureDecl>,
    ) -> Self {
        self.functions.push(FunctionDecl {
            name: name.into(),
            versions: versions.into_iter().collect(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ref_detection() {
        assert!(Decl::list(Decl::This).has_local_ref());
        assert!(Decl::structure([("a", Decl::optional(Decl::local("B")))]).has_local_ref());
        assert!(!Decl::map(Decl::String, Decl::Bool).has_local_ref());
    }

    #[test]
    fn test_reference_shares_snapshot() {
        let users = SchemeDecl::new("users").object("User", [Decl::String]).build();
        let decl = Decl::reference(&users, "User");
        match decl {
            Decl::Ref { scheme, type_name } => {
                assert!(Arc::ptr_eq(&scheme, &users));
                assert_eq!(type_name, "User");
            }
            other => panic!("Expected Ref, got {:?}", other),
        }
    }
}
