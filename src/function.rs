//! Function schemes: remote signatures evolving over time

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::closure::{closure_of, reconcile_detached};
use crate::config::BuildConfig;
use crate::declare::{FunctionSchemeDecl, SignatureDecl};
use crate::error::{CodecError, Result, SchemaError};
use crate::scheme::ObjectScheme;
use crate::shape::Shape;
use crate::wire::{self, Decode, Encode, View};

/// One historical signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Shape>,
    #[serde(rename = "return")]
    pub ret: Shape,
}

impl Signature {
    /// Ignored parameters are dropped; an ignored return type is `Void`
    fn from_decl(decl: &SignatureDecl, function: &str) -> Self {
        Self {
            params: decl
                .params
                .iter()
                .filter_map(|p| Shape::from_decl(p, function))
                .collect(),
            ret: Shape::from_decl(&decl.ret, function).unwrap_or(Shape::Void),
        }
    }
}

/// A named function and its signature history; index = version number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub versions: Vec<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionScheme {
    pub name: String,
    pub functions: Vec<Function>,
    /// Reconciled object schemes referenced by any signature
    pub dependencies: Vec<ObjectScheme>,
}

impl FunctionScheme {
    /// Extract a function scheme and resolve its dependencies
    pub fn build(decl: &FunctionSchemeDecl, config: &BuildConfig) -> Result<Self> {
        let mut functions = Vec::with_capacity(decl.functions.len());
        for function in &decl.functions {
            let local = function
                .versions
                .iter()
                .flat_map(|sig| sig.params.iter().chain(std::iter::once(&sig.ret)))
                .any(|d| d.has_local_ref());
            if local {
                return Err(SchemaError::LocalRefOutsideObjectScheme {
                    owner: function.name.clone(),
                });
            }
            functions.push(Function {
                name: function.name.clone(),
                versions: function
                    .versions
                    .iter()
                    .map(|sig| Signature::from_decl(sig, &function.name))
                    .collect(),
            });
        }

        let decls = decl
            .functions
            .iter()
            .flat_map(|f| f.versions.iter())
            .flat_map(|sig| sig.params.iter().chain(std::iter::once(&sig.ret)));
        let closure = closure_of(decls);
        let refs = functions
            .iter()
            .flat_map(|f| f.versions.iter())
            .flat_map(|sig| sig.params.iter().chain(std::iter::once(&sig.ret)))
            .flat_map(|shape| shape.refs())
            .filter_map(|r| r.scheme.clone())
            .collect::<Vec<_>>();
        let dependencies = reconcile_detached(&decl.name, refs, &closure, config)?;

        info!(
            scheme = %decl.name,
            functions = functions.len(),
            dependencies = dependencies.len(),
            "built function scheme"
        );
        Ok(Self {
            name: decl.name.clone(),
            functions,
            dependencies,
        })
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl TryFrom<&FunctionSchemeDecl> for FunctionScheme {
    type Error = SchemaError;

    fn try_from(decl: &FunctionSchemeDecl) -> Result<Self> {
        Self::build(decl, &BuildConfig::default())
    }
}

// --- Wire representation ---

impl Encode for Signature {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(out, &[("params", &self.params), ("return", &self.ret)]);
    }
}

impl Decode for Signature {
    fn decode<V: View>(view: &V) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            params: Vec::decode(&view.field("params")?)?,
            ret: Shape::decode(&view.field("return")?)?,
        })
    }
}

impl Encode for Function {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(out, &[("name", &self.name), ("versions", &self.versions)]);
    }
}

impl Decode for Function {
    fn decode<V: View>(view: &V) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            name: String::decode(&view.field("name")?)?,
            versions: Vec::decode(&view.field("versions")?)?,
        })
    }
}

impl Encode for FunctionScheme {
    fn encode(&self, out: &mut Vec<u8>) {
        wire::write_record(
            out,
            &[
                ("name", &self.name),
                ("functions", &self.functions),
                ("dependencies", &self.dependencies),
            ],
        );
    }
}

impl Decode for FunctionScheme {
    fn decode<V: View>(view: &V) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            name: String::decode(&view.field("name")?)?,
            functions: Vec::decode(&view.field("functions")?)?,
            dependencies: Vec::decode(&view.field("dependencies")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::{Decl, SchemeDecl};
    use crate::shape::Ref;

    #[test]
    fn test_signature_history_and_dependencies() {
        let geo = SchemeDecl::new("geo")
            .object("Point", [Decl::tuple([Decl::float(64), Decl::float(64)])])
            .build();
        let units = SchemeDecl::new("units").object("Meters", [Decl::float(64)]).build();
        let decl = FunctionSchemeDecl::new("routing").function(
            "distance",
            [
                SignatureDecl::new(
                    [Decl::reference(&geo, "Point"), Decl::reference(&geo, "Point")],
                    Decl::float(64),
                ),
                SignatureDecl::new(
                    [Decl::reference(&geo, "Point"), Decl::reference(&geo, "Point"), Decl::Ignore],
                    Decl::reference(&units, "Meters"),
                ),
            ],
        );

        let scheme = FunctionScheme::try_from(&decl).unwrap();
        let distance = scheme.function("distance").unwrap();
        assert_eq!(distance.versions.len(), 2);
        assert_eq!(distance.versions[1].params.len(), 2);
        assert_eq!(distance.versions[1].ret, Shape::Ref(Ref::external("units", "Meters")));

        let names: Vec<_> = scheme.dependencies.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["geo", "units"]);
    }

    #[test]
    fn test_ignored_return_is_void() {
        let decl = FunctionSchemeDecl::new("svc")
            .function("fire", [SignatureDecl::new([Decl::Bool], Decl::Ignore)]);
        let scheme = FunctionScheme::try_from(&decl).unwrap();
        assert_eq!(scheme.functions[0].versions[0].ret, Shape::Void);
    }

    #[test]
    fn test_local_ref_rejected() {
        let decl = FunctionSchemeDecl::new("svc")
            .function("echo", [SignatureDecl::new([Decl::local("X")], Decl::Void)]);
        assert!(matches!(
            FunctionScheme::try_from(&decl),
            Err(SchemaError::LocalRefOutsideObjectScheme { owner }) if owner == "echo"
        ));
    }
}
