//! Object schemes
//!
//! An `Object` is a named type with an append-only version history; an
//! `ObjectScheme` groups the objects of one namespace.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::declare::SchemeDecl;
use crate::error::{CodecError, Result, SchemaError};
use crate::shape::{Ref, Shape};
use crate::wire::{self, Decode, Encode, View};

/// A named type and its historical shapes; index = version number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub name: String,
    pub versions: Vec<Shape>,
}

impl Object {
    pub fn new(name: impl Into<String>, versions: Vec<Shape>) -> Self {
        Self {
            name: name.into(),
            versions,
        }
    }

    /// Reconcile another view of the same object into this one.
    ///
    /// The shorter history must be a structural prefix of the longer one;
    /// the result is the longer history. `scheme` is only used to report a
    /// conflict.
    pub fn merge(&mut self, other: Object, scheme: &str) -> Result<()> {
        let overlap = self.versions.len().min(other.versions.len());
        for (version, (ours, theirs)) in self.versions.iter().zip(&other.versions).enumerate() {
            if !ours.eql(theirs) {
                return Err(SchemaError::VersionConflict {
                    scheme: scheme.to_string(),
                    object: self.name.clone(),
                    version,
                });
            }
        }
        if other.versions.len() > overlap {
            debug!(
                scheme,
                object = %self.name,
                from = overlap,
                to = other.versions.len(),
                "extending object history"
            );
            self.versions.extend(other.versions.into_iter().skip(overlap));
        }
        Ok(())
    }
}

/// A named scheme of versioned objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectScheme {
    pub name: String,
    pub objects: Vec<Object>,
}

impl ObjectScheme {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
        }
    }

    /// Get an object by name
    pub fn object(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Fold another view of this scheme into this one. Objects known to
    /// both are merged version by version; objects known only to `other`
    /// are appended.
    pub fn merge(&mut self, other: ObjectScheme) -> Result<()> {
        for object in other.objects {
            match self.objects.iter_mut().find(|o| o.name == object.name) {
                Some(existing) => existing.merge(object, &self.name)?,
                None => self.objects.push(object),
            }
        }
        Ok(())
    }

    /// Every reference made by any version of any object
    pub fn refs(&self) -> impl Iterator<Item = &Ref> {
        self.objects
            .iter()
            .flat_map(|o| o.versions.iter())
            .flat_map(|shape| shape.refs())
    }
}

impl From<&SchemeDecl> for ObjectScheme {
    fn from(decl: &SchemeDecl) -> Self {
        let objects = decl
            .objects
            .iter()
            .map(|object| {
                let versions = object
                    .versions
                    .iter()
                    .map(|d| Shape::from_decl(d, &object.name).unwrap_or(Shape::Void))
                    .collect();
                Object::new(&object.name, versions)
            })
            .collect();
        Self {
            name: decl.name.clone(),
            objects,
        }
    }
}

// --- Wire representation ---

impl Encode for Object {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(out, &[("name", &self.name), ("versions", &self.versions)]);
    }
}

impl Decode for Object {
    fn decode<V: View>(view: &V) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            name: String::decode(&view.field("name")?)?,
            versions: Vec::decode(&view.field("versions")?)?,
        })
    }
}

impl Encode for ObjectScheme {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(out, &[("name", &self.name), ("objects", &self.objects)]);
    }
}

impl Decode for ObjectScheme {
    fn decode<V: View>(view: &V) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            name: String::decode(&view.field("name")?)?,
            objects: Vec::decode(&view.field("objects")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::Decl;
    use crate::shape::Field;

    #[test]
    fn test_from_decl_one_shape_per_version() {
        let decl = SchemeDecl::new("chat")
            .object("Message", [Decl::String, Decl::structure([("text", Decl::String)])])
            .object("Thread", [Decl::list(Decl::local("Message"))]);
        let scheme = ObjectScheme::from(&decl);

        assert_eq!(scheme.name, "chat");
        assert_eq!(scheme.objects.len(), 2);
        let message = scheme.object("Message").unwrap();
        assert_eq!(message.versions.len(), 2);
        assert_eq!(message.versions[1], Shape::Struct(vec![Field::new("text", Shape::String)]));
        assert_eq!(
            scheme.object("Thread").unwrap().versions[0],
            Shape::List(Box::new(Shape::Ref(Ref::local("Message"))))
        );
    }

    #[test]
    fn test_ignore_marker_drops_field() {
        let decl = SchemeDecl::new("s").object(
            "Obj",
            [Decl::structure([
                ("kept", Decl::Bool),
                ("cache", Decl::Ignore),
                ("next", Decl::optional(Decl::This)),
            ])],
        );
        let scheme = ObjectScheme::from(&decl);
        assert_eq!(
            scheme.objects[0].versions[0],
            Shape::Struct(vec![
                Field::new("kept", Shape::Bool),
                Field::new("next", Shape::Optional(Box::new(Shape::Ref(Ref::local("Obj"))))),
            ])
        );
    }

    #[test]
    fn test_merge_extends_prefix() {
        let mut short = Object::new("Obj", vec![Shape::Bool]);
        short.merge(Object::new("Obj", vec![Shape::Bool, Shape::String]), "dep1").unwrap();
        assert_eq!(short.versions, vec![Shape::Bool, Shape::String]);

        let mut long = Object::new("Obj", vec![Shape::Bool, Shape::String]);
        long.merge(Object::new("Obj", vec![Shape::Bool]), "dep1").unwrap();
        assert_eq!(long.versions, vec![Shape::Bool, Shape::String]);
    }

    #[test]
    fn test_merge_conflicting_prefix_fails() {
        let mut ours = Object::new("Obj", vec![Shape::Bool, Shape::String]);
        let err = ours
            .merge(Object::new("Obj", vec![Shape::Bool, Shape::Void]), "dep1")
            .unwrap_err();
        match err {
            SchemaError::VersionConflict { scheme, object, version } => {
                assert_eq!(scheme, "dep1");
                assert_eq!(object, "Obj");
                assert_eq!(version, 1);
            }
            other => panic!("Expected VersionConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_scheme_merge_keeps_disjoint_objects() {
        let mut a = ObjectScheme {
            name: "dep".to_string(),
            objects: vec![Object::new("A", vec![Shape::Bool])],
        };
        let b = ObjectScheme {
            name: "dep".to_string(),
            objects: vec![
                Object::new("B", vec![Shape::String]),
                Object::new("A", vec![Shape::Bool]),
            ],
        };
        a.merge(b).unwrap();
        let names: Vec<_> = a.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
