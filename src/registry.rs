//! Type Registry
//!
//! Runtime store that assigns every structurally distinct shape seen for a
//! `(scheme, object)` pair a stable [`TypeId`]. The registry only grows:
//! a slot goes from absent to `[v0]` on its first update, stays unchanged
//! when a known shape is resubmitted, and gains `vN+1` for a new shape.
//!
//! `update` takes `&mut self` and `get` takes `&self`, so the borrow
//! checker enforces the single-writer discipline. Share a registry across
//! threads behind a `RwLock`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::announce::Announcement;
use crate::config::WireConfig;
use crate::error::RegistryError;
use crate::fingerprint::Fingerprint;
use crate::shape::Shape;
use crate::wire::{Decode, Encode, View, WireView};

/// Coordinate of a shape inside one registry instance.
///
/// Meaningless across registries; carries no ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId {
    pub scheme: usize,
    pub name: usize,
    pub version: usize,
}

impl TypeId {
    pub fn new(scheme: usize, name: usize, version: usize) -> Self {
        Self {
            scheme,
            name,
            version,
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scheme, self.name, self.version)
    }
}

type ObjectBucket = IndexMap<String, Vec<Shape>>;

/// The runtime type registry
#[derive(Debug, Default)]
pub struct TypeRegistry {
    schemes: IndexMap<String, ObjectBucket>,
    limits: WireConfig,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose byte-level entry points enforce `limits`
    pub fn with_limits(limits: WireConfig) -> Self {
        Self {
            schemes: IndexMap::new(),
            limits,
        }
    }

    /// Look up a shape by id
    pub fn get(&self, id: TypeId) -> Result<&Shape, RegistryError> {
        let (_, objects) = self
            .schemes
            .get_index(id.scheme)
            .ok_or(RegistryError::SchemeNotDefined(id.scheme))?;
        let (_, versions) = objects
            .get_index(id.name)
            .ok_or(RegistryError::ObjectNotDefined {
                scheme: id.scheme,
                name: id.name,
            })?;
        versions.get(id.version).ok_or(RegistryError::VersionNotDefined {
            scheme: id.scheme,
            name: id.name,
            version: id.version,
        })
    }

    /// Register the shape in `view` for `(scheme, object)`.
    ///
    /// Stored versions are compared against the view directly; a match
    /// returns its existing id without allocating. Otherwise the view is
    /// decoded into a new owned tree and appended. Nothing is modified if
    /// the view turns out to be malformed.
    pub fn update<V: View>(
        &mut self,
        scheme: &str,
        object: &str,
        view: &V,
    ) -> Result<TypeId, RegistryError> {
        let scheme_idx = self.schemes.get_index_of(scheme);
        let object_idx = scheme_idx.and_then(|s| self.schemes[s].get_index_of(object));

        if let (Some(s), Some(o)) = (scheme_idx, object_idx) {
            for (version, stored) in self.schemes[s][o].iter().enumerate() {
                if stored.eql_view(view)? {
                    debug!(scheme, object, version, "shape already registered");
                    return Ok(TypeId::new(s, o, version));
                }
            }
        }

        let shape = Shape::decode(view)?;

        let s = match scheme_idx {
            Some(s) => s,
            None => self.schemes.insert_full(scheme.to_owned(), ObjectBucket::new()).0,
        };
        let objects = &mut self.schemes[s];
        let o = match object_idx {
            Some(o) => o,
            None => objects.insert_full(object.to_owned(), Vec::new()).0,
        };
        let versions = &mut objects[o];
        let id = TypeId::new(s, o, versions.len());
        info!(scheme, object, %id, shape = %shape, "registered new shape version");
        versions.push(shape);
        Ok(id)
    }

    /// [`TypeRegistry::update`] over raw wire bytes, applying the
    /// registry's limits
    pub fn update_bytes(
        &mut self,
        scheme: &str,
        object: &str,
        bytes: &[u8],
    ) -> Result<TypeId, RegistryError> {
        let view = WireView::with_limits(bytes, self.limits.max_depth, self.limits.max_payload)?;
        self.update(scheme, object, &view)
    }

    /// Register an in-memory shape by round-tripping it through the wire
    /// format
    pub fn update_shape(
        &mut self,
        scheme: &str,
        object: &str,
        shape: &Shape,
    ) -> Result<TypeId, RegistryError> {
        let bytes = shape.to_wire_checked(self.limits.max_payload)?;
        self.update_bytes(scheme, object, &bytes)
    }

    /// Register every shape carried by an announcement.
    ///
    /// Object versions are registered under their scheme and object name,
    /// command payloads under the command scheme and command name.
    /// Function signatures are not single shapes and only contribute their
    /// dependencies.
    pub fn register_announcement(
        &mut self,
        announcement: &Announcement,
    ) -> Result<Vec<TypeId>, RegistryError> {
        let mut ids = Vec::new();
        for scheme in announcement.object_schemes() {
            for object in &scheme.objects {
                for shape in &object.versions {
                    ids.push(self.update_shape(&scheme.name, &object.name, shape)?);
                }
            }
        }
        if let Announcement::Commands(commands) = announcement {
            for command in &commands.commands {
                ids.push(self.update_shape(&commands.name, &command.name, &command.shape)?);
            }
        }
        Ok(ids)
    }

    /// Scheme and object indices for a pair of names
    pub fn lookup(&self, scheme: &str, object: &str) -> Option<(usize, usize)> {
        let (s, _, objects) = self.schemes.get_full(scheme)?;
        let o = objects.get_index_of(object)?;
        Some((s, o))
    }

    /// Scheme and object names of an id's slot
    pub fn names(&self, id: TypeId) -> Option<(&str, &str)> {
        let (scheme, objects) = self.schemes.get_index(id.scheme)?;
        let (object, _) = objects.get_index(id.name)?;
        Some((scheme.as_str(), object.as_str()))
    }

    pub fn scheme_count(&self) -> usize {
        self.schemes.len()
    }

    pub fn object_count(&self, scheme: usize) -> Option<usize> {
        self.schemes.get_index(scheme).map(|(_, objects)| objects.len())
    }

    pub fn version_count(&self, scheme: usize, name: usize) -> Option<usize> {
        let (_, objects) = self.schemes.get_index(scheme)?;
        objects.get_index(name).map(|(_, versions)| versions.len())
    }

    /// Every stored shape with its id and names, in id order
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &str, &str, &Shape)> {
        self.schemes.iter().enumerate().flat_map(|(s, (scheme, objects))| {
            objects.iter().enumerate().flat_map(move |(o, (object, versions))| {
                versions.iter().enumerate().map(move |(v, shape)| {
                    (TypeId::new(s, o, v), scheme.as_str(), object.as_str(), shape)
                })
            })
        })
    }

    /// Content fingerprint of a stored shape
    pub fn fingerprint(&self, id: TypeId) -> Result<Fingerprint, RegistryError> {
        Ok(self.get(id)?.fingerprint())
    }
}
