//! Dependency closure and merge-reconciliation of schemes
//!
//! Declarations refer to other schemes through `Arc` snapshots. The same
//! scheme name can therefore be reached through several snapshots, each a
//! partial view of that scheme's history. The closure collects every
//! snapshot (deduplicated by identity, in first-discovery order) and
//! `merge_schemes` folds same-named views into one reconciled scheme.
//!
//! Snapshots are immutable, so the identity graph is acyclic and the walk
//! always terminates. Cycles can still exist between scheme *names*; those
//! are found by [`crate::graph::SchemeGraph`] and handled per
//! [`CyclePolicy`].

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{BuildConfig, CyclePolicy};
use crate::declare::{Decl, SchemeDecl};
use crate::error::{Result, SchemaError};
use crate::graph::SchemeGraph;
use crate::scheme::ObjectScheme;

/// Union of `a` and `b`, keeping `a`'s order and appending the elements
/// of `b` that are not already present by identity
pub fn merge_unique(mut a: Vec<Arc<SchemeDecl>>, b: Vec<Arc<SchemeDecl>>) -> Vec<Arc<SchemeDecl>> {
    for scheme in b {
        if !a.iter().any(|known| Arc::ptr_eq(known, &scheme)) {
            a.push(scheme);
        }
    }
    a
}

/// Schemes referenced directly by `decl`.
///
/// Walks wrappers and members down to each `Ref` but never into the
/// referenced scheme itself.
pub fn referenced_schemes(decl: &Decl) -> Vec<Arc<SchemeDecl>> {
    let mut found = Vec::new();
    collect_referenced(decl, &mut found);
    found
}

fn collect_referenced(decl: &Decl, found: &mut Vec<Arc<SchemeDecl>>) {
    match decl {
        Decl::Ref { scheme, .. } => {
            if !found.iter().any(|known| Arc::ptr_eq(known, scheme)) {
                found.push(Arc::clone(scheme));
            }
        }
        other => {
            for child in other.children() {
                collect_referenced(child, found);
            }
        }
    }
}

type ClosureCache = HashMap<*const SchemeDecl, Vec<Arc<SchemeDecl>>>;

/// Every scheme transitively referenced by `scheme`, excluding `scheme`
/// itself, in first-discovery order
pub fn dependency_closure(scheme: &Arc<SchemeDecl>) -> Vec<Arc<SchemeDecl>> {
    let mut cache = ClosureCache::new();
    scheme_closure(scheme, &mut cache)
}

/// Closure over an arbitrary set of declarations (command payloads,
/// function signatures)
pub fn closure_of<'a>(decls: impl IntoIterator<Item = &'a Decl>) -> Vec<Arc<SchemeDecl>> {
    let mut cache = ClosureCache::new();
    closure_of_cached(decls, &mut cache)
}

fn scheme_closure(scheme: &Arc<SchemeDecl>, cache: &mut ClosureCache) -> Vec<Arc<SchemeDecl>> {
    if let Some(known) = cache.get(&Arc::as_ptr(scheme)) {
        return known.clone();
    }
    let decls = scheme.objects.iter().flat_map(|o| o.versions.iter());
    let mut closure = closure_of_cached(decls, cache);
    closure.retain(|dep| !Arc::ptr_eq(dep, scheme));
    cache.insert(Arc::as_ptr(scheme), closure.clone());
    closure
}

fn closure_of_cached<'a>(
    decls: impl IntoIterator<Item = &'a Decl>,
    cache: &mut ClosureCache,
) -> Vec<Arc<SchemeDecl>> {
    let mut direct = Vec::new();
    for decl in decls {
        direct = merge_unique(direct, referenced_schemes(decl));
    }
    let mut closure = direct.clone();
    for dep in &direct {
        closure = merge_unique(closure, scheme_closure(dep, cache));
    }
    closure
}

/// Fold same-named schemes into one, in first-seen name order.
///
/// Fails if two views disagree on an overlapping version.
pub fn merge_schemes(schemes: Vec<ObjectScheme>) -> Result<Vec<ObjectScheme>> {
    let mut merged: Vec<ObjectScheme> = Vec::new();
    for scheme in schemes {
        match merged.iter_mut().find(|m| m.name == scheme.name) {
            Some(existing) => existing.merge(scheme)?,
            None => merged.push(scheme),
        }
    }
    Ok(merged)
}

/// Turn a closure into reconciled object schemes.
///
/// Views named like `root` are not dependencies: they are stale snapshots of
/// the root reached back through a mutual reference. They are merged into
/// `root` so any disagreement is still reported, then dropped from the list.
pub(crate) fn reconcile(
    root: &mut ObjectScheme,
    closure: &[Arc<SchemeDecl>],
    config: &BuildConfig,
) -> Result<Vec<ObjectScheme>> {
    let merged = merge_schemes(closure.iter().map(|d| ObjectScheme::from(d.as_ref())).collect())?;

    let mut dependencies = Vec::with_capacity(merged.len());
    for scheme in merged {
        if scheme.name == root.name {
            debug!(scheme = %root.name, "folding self view reached through a dependency");
            root.merge(scheme)?;
        } else {
            dependencies.push(scheme);
        }
    }

    check_cycles(root, &dependencies, config)?;
    Ok(dependencies)
}

/// Reconcile the closure of a root scheme that is not itself an object
/// scheme (commands, functions)
pub(crate) fn reconcile_detached(
    owner: &str,
    refs: impl IntoIterator<Item = String>,
    closure: &[Arc<SchemeDecl>],
    config: &BuildConfig,
) -> Result<Vec<ObjectScheme>> {
    let dependencies =
        merge_schemes(closure.iter().map(|d| ObjectScheme::from(d.as_ref())).collect())?;

    let mut graph = SchemeGraph::new();
    graph.add_edges(owner, refs);
    for scheme in &dependencies {
        graph.add_scheme(scheme);
    }
    apply_cycle_policy(&graph, config)?;
    Ok(dependencies)
}

/// Resolve the reconciled dependency list of an object scheme
pub fn resolve_dependencies(
    root: &Arc<SchemeDecl>,
    config: &BuildConfig,
) -> Result<Vec<ObjectScheme>> {
    let mut scheme = ObjectScheme::from(root.as_ref());
    reconcile(&mut scheme, &dependency_closure(root), config)
}

fn check_cycles(
    root: &ObjectScheme,
    dependencies: &[ObjectScheme],
    config: &BuildConfig,
) -> Result<()> {
    let mut graph = SchemeGraph::new();
    graph.add_scheme(root);
    for scheme in dependencies {
        graph.add_scheme(scheme);
    }
    apply_cycle_policy(&graph, config)
}

fn apply_cycle_policy(graph: &SchemeGraph, config: &BuildConfig) -> Result<()> {
    for cycle in graph.cycles() {
        match config.cycles {
            CyclePolicy::Allow => warn!(cycle = %cycle.join(" -> "), "cyclic scheme dependency"),
            CyclePolicy::Reject => return Err(SchemaError::CyclicDependency { cycle }),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    fn names(schemes: &[Arc<SchemeDecl>]) -> Vec<&str> {
        schemes.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_referenced_schemes_walks_wrappers() {
        let a = SchemeDecl::new("a").object("A", [Decl::Bool]).build();
        let b = SchemeDecl::new("b").object("B", [Decl::Bool]).build();
        let decl = Decl::structure([
            ("x", Decl::optional(Decl::list(Decl::reference(&a, "A")))),
            ("y", Decl::map(Decl::String, Decl::array(2, Decl::reference(&b, "B")))),
            ("z", Decl::reference(&a, "A")),
        ]);
        assert_eq!(names(&referenced_schemes(&decl)), vec!["a", "b"]);
    }

    #[test]
    fn test_referenced_schemes_stops_at_ref() {
        let inner = SchemeDecl::new("inner").object("I", [Decl::Bool]).build();
        let outer = SchemeDecl::new("outer")
            .object("O", [Decl::reference(&inner, "I")])
            .build();
        let decl = Decl::reference(&outer, "O");
        assert_eq!(names(&referenced_schemes(&decl)), vec!["outer"]);
    }

    #[test]
    fn test_closure_is_transitive_and_excludes_self() {
        let c = SchemeDecl::new("c").object("C", [Decl::Bool]).build();
        let b = SchemeDecl::new("b").object("B", [Decl::reference(&c, "C")]).build();
        let a = SchemeDecl::new("a")
            .object("A", [Decl::structure([("b", Decl::reference(&b, "B")), ("me", Decl::This)])])
            .build();
        assert_eq!(names(&dependency_closure(&a)), vec!["b", "c"]);
    }

    #[test]
    fn test_closure_deduplicates_by_identity() {
        let shared = SchemeDecl::new("shared").object("S", [Decl::Bool]).build();
        let left = SchemeDecl::new("left").object("L", [Decl::reference(&shared, "S")]).build();
        let right = SchemeDecl::new("right").object("R", [Decl::reference(&shared, "S")]).build();
        let root = SchemeDecl::new("root")
            .object(
                "Root",
                [Decl::tuple([Decl::reference(&left, "L"), Decl::reference(&right, "R")])],
            )
            .build();
        assert_eq!(names(&dependency_closure(&root)), vec!["left", "right", "shared"]);
    }

    #[test]
    fn test_merge_unique_preserves_order() {
        let a = SchemeDecl::new("a").build();
        let b = SchemeDecl::new("b").build();
        let c = SchemeDecl::new("c").build();
        let merged = merge_unique(
            vec![Arc::clone(&a), Arc::clone(&b)],
            vec![Arc::clone(&c), Arc::clone(&a)],
        );
        assert_eq!(names(&merged), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_schemes_reconciles_views() {
        let old = SchemeDecl::new("dep1").object("Obj", [Decl::Bool]);
        let new = SchemeDecl::new("dep1").object("Obj", [Decl::Bool, Decl::String]);
        let other = SchemeDecl::new("dep2").object("Obj", [Decl::Void]);
        let merged = merge_schemes(vec![
            ObjectScheme::from(&old),
            ObjectScheme::from(&other),
            ObjectScheme::from(&new),
        ])
        .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "dep1");
        assert_eq!(merged[0].objects[0].versions, vec![Shape::Bool, Shape::String]);
        assert_eq!(merged[1].name, "dep2");
    }

    #[test]
    fn test_merge_schemes_conflict() {
        let a = SchemeDecl::new("dep1").object("Obj", [Decl::Bool]);
        let b = SchemeDecl::new("dep1").object("Obj", [Decl::String]);
        let err = merge_schemes(vec![ObjectScheme::from(&a), ObjectScheme::from(&b)]).unwrap_err();
        assert!(matches!(err, SchemaError::VersionConflict { version: 0, .. }));
    }

    #[test]
    fn test_self_view_is_folded_into_root() {
        let a_v1 = SchemeDecl::new("a").object("A", [Decl::Bool]).build();
        let b = SchemeDecl::new("b").object("B", [Decl::reference(&a_v1, "A")]).build();
        let a_v2 = SchemeDecl::new("a")
            .object("A", [Decl::Bool, Decl::reference(&b, "B")])
            .build();

        let deps = resolve_dependencies(&a_v2, &BuildConfig::default()).unwrap();
        let names: Vec<_> = deps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);

        let reject = BuildConfig {
            cycles: CyclePolicy::Reject,
        };
        match resolve_dependencies(&a_v2, &reject).unwrap_err() {
            SchemaError::CyclicDependency { cycle } => {
                assert_eq!(cycle.len(), 2);
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
            other => panic!("Expected CyclicDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_self_view_conflict_is_reported() {
        let a_v1 = SchemeDecl::new("a").object("A", [Decl::String]).build();
        let b = SchemeDecl::new("b").object("B", [Decl::reference(&a_v1, "A")]).build();
        let a_v2 = SchemeDecl::new("a")
            .object("A", [Decl::Bool, Decl::reference(&b, "B")])
            .build();
        assert!(matches!(
            resolve_dependencies(&a_v2, &BuildConfig::default()),
            Err(SchemaError::VersionConflict { .. })
        ));
    }
}
