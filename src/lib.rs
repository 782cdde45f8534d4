//! Wire Schemas
//!
//! Builds self-describing schema graphs from declarative type descriptions
//! and keeps a runtime registry of every shape version seen on the wire.
//!
//! ## Features
//!
//! - **Shape Model**: Structural descriptions of data with deep equality
//! - **Object Schemes**: Named objects whose versions form an append-only history
//! - **Dependency Closure**: Transitive discovery and reconciliation of referenced schemes
//! - **Command and Function Schemes**: Message payloads and remote signatures
//! - **Type Registry**: Stable `(scheme, name, version)` ids for shapes read from the wire
//!
//! ## Architecture
//!
//! ```text
//! declare (Decl, SchemeDecl, ...)
//!     │  Shape::from_decl / dependency_closure
//!     ▼
//! ObjectAnnouncement / CommandScheme / FunctionScheme
//!     │  Encode
//!     ▼
//! wire bytes ──WireView──▶ TypeRegistry::update ──▶ TypeId
//! ```

pub mod announce;
pub mod closure;
pub mod command;
pub mod config;
pub mod declare;
pub mod error;
pub mod fingerprint;
pub mod function;
pub mod graph;
pub mod registry;
pub mod scheme;
pub mod shape;
pub mod wire;

pub use announce::{Announcement, ObjectAnnouncement};
pub use closure::{dependency_closure, merge_schemes, merge_unique, resolve_dependencies};
pub use command::{Command, CommandScheme};
pub use config::{BuildConfig, CyclePolicy, SchemaConfig, WireConfig};
pub use declare::{CommandSchemeDecl, Decl, FunctionSchemeDecl, SchemeDecl, SignatureDecl};
pub use error::{CodecError, RegistryError, Result, SchemaError};
pub use fingerprint::Fingerprint;
pub use function::{Function, FunctionScheme, Signature};
pub use graph::SchemeGraph;
pub use registry::{TypeId, TypeRegistry};
pub use scheme::{Object, ObjectScheme};
pub use shape::{Field, Ref, Shape};
pub use wire::{Decode, Encode, View, WireView};
