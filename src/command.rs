//! Command schemes: named message payloads and the object schemes they need

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::closure::{closure_of, reconcile_detached};
use crate::config::BuildConfig;
use crate::declare::{CommandSchemeDecl, Decl};
use crate::error::{CodecError, Result, SchemaError};
use crate::scheme::ObjectScheme;
use crate::shape::Shape;
use crate::wire::{self, Decode, Encode, View};

/// A named message payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandScheme {
    pub name: String,
    pub commands: Vec<Command>,
    /// Reconciled object schemes referenced by any payload
    pub dependencies: Vec<ObjectScheme>,
}

/// Commands carry message-shaped data only: references, arrays, lists,
/// structs and unions over scalar leaves
fn check_payload(command: &str, decl: &Decl) -> Result<()> {
    match decl {
        Decl::Local(_) | Decl::This => Err(SchemaError::LocalRefOutsideObjectScheme {
            owner: command.to_string(),
        }),
        Decl::Optional(_) | Decl::Map { .. } | Decl::Tuple(_) => {
            Err(SchemaError::UnsupportedCommandShape {
                command: command.to_string(),
                shape: decl.kind_name().to_string(),
            })
        }
        Decl::Array { .. } | Decl::List(_) | Decl::Struct(_) | Decl::Union(_) => decl
            .children()
            .into_iter()
            .try_for_each(|child| check_payload(command, child)),
        Decl::Void
        | Decl::Bool
        | Decl::Int { .. }
        | Decl::Float { .. }
        | Decl::String
        | Decl::Enum(_)
        | Decl::Ref { .. }
        | Decl::Ignore => Ok(()),
    }
}

impl CommandScheme {
    /// Extract a command scheme and resolve its dependencies
    pub fn build(decl: &CommandSchemeDecl, config: &BuildConfig) -> Result<Self> {
        let mut commands = Vec::with_capacity(decl.commands.len());
        for command in &decl.commands {
            check_payload(&command.name, &command.payload)?;
            commands.push(Command {
                name: command.name.clone(),
                shape: Shape::from_decl(&command.payload, &command.name).unwrap_or(Shape::Void),
            });
        }

        let closure = closure_of(decl.commands.iter().map(|c| &c.payload));
        let refs = commands
            .iter()
            .flat_map(|c| c.shape.refs())
            .filter_map(|r| r.scheme.clone())
            .collect::<Vec<_>>();
        let dependencies = reconcile_detached(&decl.name, refs, &closure, config)?;

        info!(
            scheme = %decl.name,
            commands = commands.len(),
            dependencies = dependencies.len(),
            "built command scheme"
        );
        Ok(Self {
            name: decl.name.clone(),
            commands,
            dependencies,
        })
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }
}

impl TryFrom<&CommandSchemeDecl> for CommandScheme {
    type Error = SchemaError;

    fn try_from(decl: &CommandSchemeDecl) -> Result<Self> {
        Self::build(decl, &BuildConfig::default())
    }
}

// --- Wire representation ---

impl Encode for Command {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(out, &[("name", &self.name), ("shape", &self.shape)]);
    }
}

impl Decode for Command {
    fn decode<V: View>(view: &V) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            name: String::decode(&view.field("name")?)?,
            shape: Shape::decode(&view.field("shape")?)?,
        })
    }
}

impl Encode for CommandScheme {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(
            out,
            &[
                ("name", &self.name),
                ("commands", &self.commands),
                ("dependencies", &self.dependencies),
            ],
        );
    }
}

impl Decode for CommandScheme {
    fn decode<V: View>(view: &V) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            name: String::decode(&view.field("name")?)?,
            commands: Vec::decode(&view.field("commands")?)?,
            dependencies: Vec::decode(&view.field("dependencies")?)?,
        })
    }
}
