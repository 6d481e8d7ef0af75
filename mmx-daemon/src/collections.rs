//! Saved collections and id queries
//!
//! Named collections live in one of two namespaces. Queries are delegated to
//! a [`QueryEngine`]; the stock [`IdUniverseEngine`] evaluates the structural
//! operators over a fixed, ordered set of known media ids and refuses the
//! property filters, which need a media library.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mmx_common::value::CmdDict;
use mmx_common::{
    CmdValue, Collection, CollectionKind, CollectionNamespace, CommandId, Error, ObjectKind, Result,
    SignalKind,
};
use tracing::{debug, info};

use crate::dispatch::CommandDescriptor;
use crate::object::ObjectRef;

/// Nesting limit for references, so a reference cycle fails instead of recursing forever
pub const MAX_REFERENCE_DEPTH: usize = 32;

/// Looks up a saved collection by name
pub trait CollectionResolver {
    fn resolve(&self, name: &str, namespace: CollectionNamespace) -> Option<Collection>;
}

/// Evaluates a collection into an ordered list of media ids
pub trait QueryEngine: Send + Sync {
    fn query_ids(&self, collection: &Collection, resolver: &dyn CollectionResolver) -> Result<Vec<u32>>;
}

/// Query engine over a known, ordered id universe
#[derive(Debug, Clone, Default)]
pub struct IdUniverseEngine {
    universe: Vec<u32>,
}

impl IdUniverseEngine {
    pub fn new(universe: Vec<u32>) -> Self {
        Self { universe }
    }

    fn eval(&self, coll: &Collection, resolver: &dyn CollectionResolver, depth: usize) -> Result<Vec<u32>> {
        if depth > MAX_REFERENCE_DEPTH {
            return Err(Error::InvalidInput(format!(
                "collection nesting deeper than {}",
                MAX_REFERENCE_DEPTH
            )));
        }

        match coll.kind() {
            CollectionKind::Universe => Ok(self.universe.clone()),
            CollectionKind::Idlist => Ok(coll.ids().to_vec()),
            CollectionKind::Reference => {
                let name = coll
                    .attribute("reference")
                    .ok_or_else(|| Error::InvalidInput("reference without a name".to_string()))?;
                // "All Media" is the conventional name of the universe
                if name == "All Media" {
                    return Ok(self.universe.clone());
                }
                let namespace = match coll.attribute("namespace") {
                    Some(ns) => CollectionNamespace::parse(ns)
                        .ok_or_else(|| Error::InvalidInput(format!("unknown namespace {}", ns)))?,
                    None => CollectionNamespace::Collections,
                };
                let target = resolver
                    .resolve(name, namespace)
                    .ok_or_else(|| Error::NotFound(format!("collection {}/{}", namespace.as_str(), name)))?;
                self.eval(&target, resolver, depth + 1)
            }
            CollectionKind::Union => {
                let mut seen = HashSet::new();
                let mut ids = Vec::new();
                for operand in coll.operands() {
                    for id in self.eval(operand, resolver, depth + 1)? {
                        if seen.insert(id) {
                            ids.push(id);
                        }
                    }
                }
                Ok(ids)
            }
            CollectionKind::Intersection => {
                let mut operands = coll.operands().iter();
                let Some(first) = operands.next() else {
                    return Ok(Vec::new());
                };
                let mut ids = self.eval(first, resolver, depth + 1)?;
                for operand in operands {
                    let keep: BTreeSet<u32> = self.eval(operand, resolver, depth + 1)?.into_iter().collect();
                    ids.retain(|id| keep.contains(id));
                }
                Ok(ids)
            }
            CollectionKind::Complement => {
                let excluded: BTreeSet<u32> = match coll.operands() {
                    [operand] => self.eval(operand, resolver, depth + 1)?.into_iter().collect(),
                    other => {
                        return Err(Error::InvalidInput(format!(
                            "complement takes one operand, got {}",
                            other.len()
                        )))
                    }
                };
                Ok(self
                    .universe
                    .iter()
                    .copied()
                    .filter(|id| !excluded.contains(id))
                    .collect())
            }
            kind => Err(Error::command(format!(
                "{} filters need a media library",
                kind.label()
            ))),
        }
    }
}

impl QueryEngine for IdUniverseEngine {
    fn query_ids(&self, collection: &Collection, resolver: &dyn CollectionResolver) -> Result<Vec<u32>> {
        self.eval(collection, resolver, 0)
    }
}

type Saved = Mutex<BTreeMap<(CollectionNamespace, String), Collection>>;

struct SavedResolver<'a>(&'a BTreeMap<(CollectionNamespace, String), Collection>);

impl CollectionResolver for SavedResolver<'_> {
    fn resolve(&self, name: &str, namespace: CollectionNamespace) -> Option<Collection> {
        self.0.get(&(namespace, name.to_string())).cloned()
    }
}

fn lock(saved: &Saved) -> MutexGuard<'_, BTreeMap<(CollectionNamespace, String), Collection>> {
    saved.lock().unwrap_or_else(PoisonError::into_inner)
}

fn parse_namespace(name: &str) -> Result<CollectionNamespace> {
    CollectionNamespace::parse(name).ok_or_else(|| Error::InvalidInput(format!("unknown namespace {}", name)))
}

fn change_record(name: &str, namespace: CollectionNamespace, kind: &str) -> CmdDict {
    let mut record = CmdDict::new();
    record.insert("name".to_string(), CmdValue::String(name.to_string()));
    record.insert("namespace".to_string(), CmdValue::String(namespace.as_str().to_string()));
    record.insert("type".to_string(), CmdValue::String(kind.to_string()));
    record
}

/// Collection store object
#[derive(Clone)]
pub struct CollectionStore {
    object: ObjectRef,
    saved: Arc<Saved>,
}

impl CollectionStore {
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        let object = ObjectRef::new(ObjectKind::Collection);
        let saved = Arc::new(Mutex::new(BTreeMap::new()));
        register_commands(&object, &saved, engine);
        Self { object, saved }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn get(&self, name: &str, namespace: CollectionNamespace) -> Option<Collection> {
        SavedResolver(&lock(&self.saved)).resolve(name, namespace)
    }

    pub fn len(&self) -> usize {
        lock(&self.saved).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn register_commands(object: &ObjectRef, saved: &Arc<Saved>, engine: Arc<dyn QueryEngine>) {
    let s = Arc::clone(saved);
    object.register_command(CommandDescriptor::new3(
        CommandId::CollectionSave,
        move |obj, coll: Collection, name: String, namespace: String| {
            if name.is_empty() {
                return Err(Error::InvalidInput("collection name must not be empty".to_string()));
            }
            let namespace = parse_namespace(&namespace)?;
            let replaced = lock(&s).insert((namespace, name.clone()), coll).is_some();

            info!("Saved collection {}/{}", namespace.as_str(), name);
            let kind = if replaced { "update" } else { "add" };
            obj.emit_value(SignalKind::CollectionChanged, change_record(&name, namespace, kind));
            Ok(())
        },
    ));

    let s = Arc::clone(saved);
    object.register_command(CommandDescriptor::new2(
        CommandId::CollectionGet,
        move |_, name: String, namespace: String| {
            let namespace = parse_namespace(&namespace)?;
            SavedResolver(&lock(&s))
                .resolve(&name, namespace)
                .ok_or_else(|| Error::NotFound(format!("collection {}/{}", namespace.as_str(), name)))
        },
    ));

    let s = Arc::clone(saved);
    object.register_command(CommandDescriptor::new1(
        CommandId::CollectionList,
        move |_, namespace: String| {
            let namespace = parse_namespace(&namespace)?;
            Ok(lock(&s)
                .keys()
                .filter(|(ns, _)| *ns == namespace)
                .map(|(_, name)| name.clone())
                .collect::<Vec<String>>())
        },
    ));

    let s = Arc::clone(saved);
    object.register_command(CommandDescriptor::new2(
        CommandId::CollectionRemove,
        move |obj, name: String, namespace: String| {
            let namespace = parse_namespace(&namespace)?;
            lock(&s)
                .remove(&(namespace, name.clone()))
                .ok_or_else(|| Error::NotFound(format!("collection {}/{}", namespace.as_str(), name)))?;

            info!("Removed collection {}/{}", namespace.as_str(), name);
            obj.emit_value(SignalKind::CollectionChanged, change_record(&name, namespace, "remove"));
            Ok(())
        },
    ));

    let s = Arc::clone(saved);
    object.register_command(CommandDescriptor::new1(
        CommandId::CollectionQueryIds,
        move |_, coll: Collection| {
            // Evaluate against a snapshot so the engine never runs under the lock
            let snapshot = lock(&s).clone();
            let ids = engine.query_ids(&coll, &SavedResolver(&snapshot))?;
            debug!("Query over {} nodes matched {} ids", coll.node_count(), ids.len());
            Ok(ids)
        },
    ));
}
