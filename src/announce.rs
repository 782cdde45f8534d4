//! Schema announcements
//!
//! An announcement is what one party sends another to declare the shapes it
//! will use: a scheme together with every object scheme it depends on,
//! already reconciled.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::closure::{dependency_closure, reconcile};
use crate::command::CommandScheme;
use crate::config::BuildConfig;
use crate::declare::SchemeDecl;
use crate::error::{CodecError, Result};
use crate::fingerprint::Fingerprint;
use crate::function::FunctionScheme;
use crate::graph::SchemeGraph;
use crate::scheme::ObjectScheme;
use crate::wire::{self, Decode, Encode, View};

/// An object scheme with its reconciled dependency closure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAnnouncement {
    pub scheme: ObjectScheme,
    pub dependencies: Vec<ObjectScheme>,
}

impl ObjectAnnouncement {
    pub fn build(root: &Arc<SchemeDecl>, config: &BuildConfig) -> Result<Self> {
        let mut scheme = ObjectScheme::from(root.as_ref());
        let dependencies = reconcile(&mut scheme, &dependency_closure(root), config)?;
        info!(
            scheme = %scheme.name,
            objects = scheme.objects.len(),
            dependencies = dependencies.len(),
            "built object announcement"
        );
        Ok(Self {
            scheme,
            dependencies,
        })
    }
}

/// Any announcement that can travel on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Announcement {
    Objects(ObjectAnnouncement),
    Commands(CommandScheme),
    Functions(FunctionScheme),
}

impl Announcement {
    const OBJECTS: u64 = 0;
    const COMMANDS: u64 = 1;
    const FUNCTIONS: u64 = 2;

    /// Name of the announced scheme
    pub fn name(&self) -> &str {
        match self {
            Announcement::Objects(a) => &a.scheme.name,
            Announcement::Commands(c) => &c.name,
            Announcement::Functions(f) => &f.name,
        }
    }

    pub fn dependencies(&self) -> &[ObjectScheme] {
        match self {
            Announcement::Objects(a) => &a.dependencies,
            Announcement::Commands(c) => &c.dependencies,
            Announcement::Functions(f) => &f.dependencies,
        }
    }

    /// Every object scheme carried, the announced one first
    pub fn object_schemes(&self) -> impl Iterator<Item = &ObjectScheme> {
        let root = match self {
            Announcement::Objects(a) => Some(&a.scheme),
            _ => None,
        };
        root.into_iter().chain(self.dependencies())
    }

    /// Name-level dependency graph of everything announced
    pub fn graph(&self) -> SchemeGraph {
        let mut graph = SchemeGraph::new();
        match self {
            Announcement::Objects(_) => {}
            Announcement::Commands(c) => graph.add_edges(
                &c.name,
                c.commands
                    .iter()
                    .flat_map(|cmd| cmd.shape.refs())
                    .filter_map(|r| r.scheme.clone())
                    .collect::<Vec<_>>(),
            ),
            Announcement::Functions(f) => graph.add_edges(
                &f.name,
                f.functions
                    .iter()
                    .flat_map(|func| func.versions.iter())
                    .flat_map(|sig| sig.params.iter().chain(std::iter::once(&sig.ret)))
                    .flat_map(|shape| shape.refs())
                    .filter_map(|r| r.scheme.clone())
                    .collect::<Vec<_>>(),
            ),
        }
        for scheme in self.object_schemes() {
            graph.add_scheme(scheme);
        }
        graph
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

impl From<ObjectAnnouncement> for Announcement {
    fn from(a: ObjectAnnouncement) -> Self {
        Announcement::Objects(a)
    }
}

impl From<CommandScheme> for Announcement {
    fn from(c: CommandScheme) -> Self {
        Announcement::Commands(c)
    }
}

impl From<FunctionScheme> for Announcement {
    fn from(f: FunctionScheme) -> Self {
        Announcement::Functions(f)
    }
}

// --- Wire representation ---
//
// An announcement is a `{kind, body}` record rather than a variant, so the
// envelope does not count towards the shape nesting limit.

impl Encode for ObjectAnnouncement {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(out, &[("scheme", &self.scheme), ("dependencies", &self.dependencies)]);
    }
}

impl Decode for ObjectAnnouncement {
    fn decode<V: View>(view: &V) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            scheme: ObjectScheme::decode(&view.field("scheme")?)?,
            dependencies: Vec::decode(&view.field("dependencies")?)?,
        })
    }
}

impl Encode for Announcement {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Announcement::Objects(a) => {
                wire::write_record(out, &[("kind", &Self::OBJECTS), ("body", a)])
            }
            Announcement::Commands(c) => {
                wire::write_record(out, &[("kind", &Self::COMMANDS), ("body", c)])
            }
            Announcement::Functions(f) => {
                wire::write_record(out, &[("kind", &Self::FUNCTIONS), ("body", f)])
            }
        }
    }
}

impl Decode for Announcement {
    fn decode<V: View>(view: &V) -> std::result::Result<Self, CodecError> {
        let body = view.field("body")?;
        match view.field("kind")?.uint()? {
            Self::OBJECTS => Ok(Announcement::Objects(ObjectAnnouncement::decode(&body)?)),
            Self::COMMANDS => Ok(Announcement::Commands(CommandScheme::decode(&body)?)),
            Self::FUNCTIONS => Ok(Announcement::Functions(FunctionScheme::decode(&body)?)),
            other => Err(CodecError::UnknownVariant {
                ty: "announcement",
                tag: other,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::Decl;
    use crate::shape::Shape;

    #[test]
    fn test_object_announcement_scenario() {
        let dep1_old = SchemeDecl::new("dep1").object("Obj", [Decl::Bool]).build();
        let dep1 = SchemeDecl::new("dep1").object("Obj", [Decl::Bool, Decl::String]).build();
        let dep2 = SchemeDecl::new("dep2")
            .object("Obj", [Decl::reference(&dep1_old, "Obj")])
            .build();
        let objs = SchemeDecl::new("objs")
            .object(
                "One",
                [Decl::structure([
                    ("first", Decl::reference(&dep1, "Obj")),
                    ("second", Decl::reference(&dep2, "Obj")),
                ])],
            )
            .build();

        let announcement = ObjectAnnouncement::build(&objs, &BuildConfig::default()).unwrap();
        let names: Vec<_> = announcement.dependencies.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["dep1", "dep2"]);
        assert_eq!(
            announcement.dependencies[0].object("Obj").unwrap().versions,
            vec![Shape::Bool, Shape::String]
        );
    }

    #[test]
    fn test_graph_of_command_announcement() {
        let users = SchemeDecl::new("users").object("User", [Decl::String]).build();
        let decl = crate::declare::CommandSchemeDecl::new("chat")
            .command("Send", Decl::reference(&users, "User"));
        let announcement = Announcement::from(CommandScheme::try_from(&decl).unwrap());
        let graph = announcement.graph();
        assert_eq!(graph.dependencies_of("chat"), vec!["users"]);
        assert_eq!(announcement.name(), "chat");
        assert_eq!(announcement.object_schemes().count(), 1);
    }

    #[test]
    fn test_serde_tagging() {
        let scheme = ObjectScheme::new("empty");
        let announcement = Announcement::from(ObjectAnnouncement {
            scheme,
            dependencies: Vec::new(),
        });
        let json = serde_json::to_value(&announcement).unwrap();
        assert_eq!(json["kind"], "objects");
        let back: Announcement = serde_json::from_value(json).unwrap();
        assert_eq!(back, announcement);
    }
}
