//! In-process gateway holding collections in memory.
//!
//! Understands the common subset of query documents: field equality (dotted
//! paths allowed), the comparison operators `$eq`, `$ne`, `$gt`, `$gte`,
//! `$lt`, `$lte`, `$in`, `$nin`, `$exists`, and top-level `$and`/`$or`.
//! Anything else is rejected the way a server rejects an unknown operator.
//! Failures can be injected to exercise error paths.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use parking_lot::{Mutex, RwLock};

use crate::bson::lookup_dotted;
use crate::connection::gateway::{DocumentGateway, DocumentStream, require_id};
use crate::connection::types::{FindDocumentsOptions, QuerySpec};
use crate::error::{Error, Result};

/// Called with the find options before every `find`, outside any lock.
pub type FindHook = Arc<dyn Fn(&FindDocumentsOptions) + Send + Sync>;

#[derive(Default)]
pub struct MemoryGateway {
    database: String,
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
    failure: Mutex<Option<String>>,
    find_hook: Mutex<Option<FindHook>>,
    count_calls: AtomicU64,
    find_calls: AtomicU64,
}

impl MemoryGateway {
    pub fn new(database: impl Into<String>) -> Self {
        Self { database: database.into(), ..Default::default() }
    }

    /// Seed a collection, assigning `_id`s where missing.
    pub fn with_documents(self, collection: &str, documents: Vec<Document>) -> Self {
        {
            let mut collections = self.collections.write();
            let stored = collections.entry(collection.to_string()).or_default();
            stored.extend(documents.into_iter().map(with_object_id));
        }
        self
    }

    /// Make every subsequent call fail with `message` until cleared.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    pub fn set_find_hook(&self, hook: Option<FindHook>) {
        *self.find_hook.lock() = hook;
    }

    pub fn count_calls(&self) -> u64 {
        self.count_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn find_calls(&self) -> u64 {
        self.find_calls.load(AtomicOrdering::SeqCst)
    }

    /// Snapshot of a collection in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections.read().get(collection).cloned().unwrap_or_default()
    }

    fn check_failure(&self) -> Result<()> {
        match self.failure.lock().as_ref() {
            Some(message) => Err(Error::Gateway(message.clone())),
            None => Ok(()),
        }
    }

    fn matching(&self, collection: &str, query: &QuerySpec) -> Result<Vec<Document>> {
        let collections = self.collections.read();
        let Some(stored) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        for doc in stored {
            let keep = match &query.filter {
                Some(filter) => matches_filter(doc, filter)?,
                None => true,
            };
            if keep {
                matched.push(doc.clone());
            }
        }
        drop(collections);

        if let Some(sort) = &query.sort {
            sort_documents(&mut matched, sort)?;
        }
        if let Some(projection) = &query.projection {
            let projector = Projection::parse(projection)?;
            matched = matched.into_iter().map(|doc| projector.apply(doc)).collect();
        }
        Ok(matched)
    }
}

impl DocumentGateway for MemoryGateway {
    fn database(&self) -> &str {
        &self.database
    }

    fn count(&self, collection: &str, filter: Option<&Document>) -> Result<u64> {
        self.count_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_failure()?;
        let query = QuerySpec { filter: filter.cloned(), ..Default::default() };
        Ok(self.matching(collection, &query)?.len() as u64)
    }

    fn find(&self, collection: &str, options: FindDocumentsOptions) -> Result<Vec<Document>> {
        self.find_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let hook = self.find_hook.lock().clone();
        if let Some(hook) = hook {
            hook(&options);
        }
        self.check_failure()?;

        let query = QuerySpec {
            filter: options.filter,
            projection: options.projection,
            sort: options.sort,
        };
        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = match options.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };
        Ok(self.matching(collection, &query)?.into_iter().skip(skip).take(limit).collect())
    }

    fn stream(&self, collection: &str, query: QuerySpec) -> Result<DocumentStream<'_>> {
        self.check_failure()?;
        let documents = self.matching(collection, &query)?;
        Ok(Box::new(documents.into_iter().map(Ok)))
    }

    fn insert(&self, collection: &str, document: Document) -> Result<()> {
        self.insert_many(collection, vec![document]).map(|_| ())
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        self.check_failure()?;
        let mut collections = self.collections.write();
        let stored = collections.entry(collection.to_string()).or_default();

        let incoming: Vec<Document> = documents.into_iter().map(with_object_id).collect();
        for doc in &incoming {
            let id = doc.get("_id");
            if stored.iter().any(|existing| existing.get("_id") == id) {
                return Err(Error::Gateway(format!(
                    "E11000 duplicate key error collection: {}.{collection} dup key: {}",
                    self.database,
                    id.map(ToString::to_string).unwrap_or_default()
                )));
            }
        }

        let count = incoming.len() as u64;
        stored.extend(incoming);
        Ok(count)
    }

    fn remove(&self, collection: &str, document: &Document) -> Result<()> {
        self.check_failure()?;
        let id = require_id(document)?;
        if let Some(stored) = self.collections.write().get_mut(collection) {
            stored.retain(|existing| existing.get("_id") != Some(id));
        }
        Ok(())
    }

    fn replace(&self, collection: &str, document: Document) -> Result<()> {
        self.check_failure()?;
        let id = require_id(&document)?.clone();
        if let Some(stored) = self.collections.write().get_mut(collection)
            && let Some(slot) = stored.iter_mut().find(|existing| existing.get("_id") == Some(&id))
        {
            *slot = document;
        }
        Ok(())
    }

    fn drop_collection(&self, collection: &str) -> Result<()> {
        self.check_failure()?;
        self.collections.write().remove(collection);
        Ok(())
    }

    fn rename_collection(&self, from: &str, to: &str) -> Result<()> {
        self.check_failure()?;
        let mut collections = self.collections.write();
        if collections.contains_key(to) {
            return Err(Error::Gateway(format!("target namespace exists: {}.{to}", self.database)));
        }
        let documents = collections.remove(from).ok_or_else(|| {
            Error::Gateway(format!("source namespace does not exist: {}.{from}", self.database))
        })?;
        collections.insert(to.to_string(), documents);
        Ok(())
    }

    fn list_collection_names(&self) -> Result<Vec<String>> {
        self.check_failure()?;
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort_unstable_by_key(|name| name.to_lowercase());
        Ok(names)
    }

    fn list_database_names(&self) -> Result<Vec<String>> {
        self.check_failure()?;
        Ok(vec![self.database.clone()])
    }
}

fn with_object_id(mut doc: Document) -> Document {
    if !doc.contains_key("_id") {
        let mut with_id = Document::new();
        with_id.insert("_id", ObjectId::new());
        for (key, value) in std::mem::take(&mut doc) {
            with_id.insert(key, value);
        }
        return with_id;
    }
    doc
}

fn matches_filter(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => clauses(condition, key)?
                .iter()
                .try_fold(true, |acc, clause| Ok::<_, Error>(acc && matches_filter(doc, clause)?))?,
            "$or" => clauses(condition, key)?
                .iter()
                .try_fold(false, |acc, clause| Ok::<_, Error>(acc || matches_filter(doc, clause)?))?,
            op if op.starts_with('$') => {
                return Err(Error::Gateway(format!("unknown top level operator: {op}")));
            }
            field => matches_condition(lookup_dotted(doc, field), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(value: &'a Bson, op: &str) -> Result<Vec<&'a Document>> {
    let Bson::Array(items) = value else {
        return Err(Error::Gateway(format!("{op} must be an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(doc) => Ok(doc),
            _ => Err(Error::Gateway(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    let Bson::Document(ops) = condition else {
        return Ok(value.is_some_and(|v| values_equal(v, condition)));
    };
    if !ops.keys().next().is_some_and(|key| key.starts_with('$')) {
        return Ok(value.is_some_and(|v| values_equal(v, condition)));
    }

    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => value.is_some_and(|v| values_equal(v, operand)),
            "$ne" => !value.is_some_and(|v| values_equal(v, operand)),
            "$gt" => ordered(value, operand, |o| o == Ordering::Greater),
            "$gte" => ordered(value, operand, |o| o != Ordering::Less),
            "$lt" => ordered(value, operand, |o| o == Ordering::Less),
            "$lte" => ordered(value, operand, |o| o != Ordering::Greater),
            "$in" => in_list(value, operand, op)?,
            "$nin" => !in_list(value, operand, op)?,
            "$exists" => value.is_some() == truthy(operand),
            other => return Err(Error::Gateway(format!("unknown operator: {other}"))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_list(value: Option<&Bson>, operand: &Bson, op: &str) -> Result<bool> {
    let Bson::Array(candidates) = operand else {
        return Err(Error::Gateway(format!("{op} needs an array")));
    };
    Ok(value.is_some_and(|v| candidates.iter().any(|candidate| values_equal(v, candidate))))
}

fn ordered(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    value.and_then(|v| compare_values(v, operand)).is_some_and(accept)
}

fn values_equal(left: &Bson, right: &Bson) -> bool {
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => a == b,
        _ => match left {
            // Equality against an array field matches any element.
            Bson::Array(items) if !matches!(right, Bson::Array(_)) => {
                items.iter().any(|item| item == right)
            }
            _ => left == right,
        },
    }
}

fn compare_values(left: &Bson, right: &Bson) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(left), as_number(right)) {
        return a.partial_cmp(&b);
    }
    match (left, right) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => Some(a.bytes().cmp(&b.bytes())),
        _ => None,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_number(other).is_none_or(|n| n != 0.0),
    }
}

/// Rank used to order values of different types (missing sorts first).
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
        Some(Bson::String(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::ObjectId(_)) => 5,
        Some(Bson::Boolean(_)) => 6,
        Some(Bson::DateTime(_)) => 7,
        Some(_) => 8,
    }
}

fn sort_documents(documents: &mut [Document], sort: &Document) -> Result<()> {
    let mut keys = Vec::with_capacity(sort.len());
    for (field, direction) in sort {
        let descending = match as_number(direction) {
            Some(n) if n == 1.0 => false,
            Some(n) if n == -1.0 => true,
            _ => return Err(Error::Gateway(format!("invalid sort direction for {field}"))),
        };
        keys.push((field.as_str(), descending));
    }

    documents.sort_by(|a, b| {
        for (field, descending) in &keys {
            let (left, right) = (lookup_dotted(a, field), lookup_dotted(b, field));
            let ordering = type_rank(left).cmp(&type_rank(right)).then_with(|| {
                match (left, right) {
                    (Some(l), Some(r)) => compare_values(l, r).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                }
            });
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

enum Projection {
    Include { fields: Vec<String>, keep_id: bool },
    Exclude(Vec<String>),
}

impl Projection {
    fn parse(spec: &Document) -> Result<Self> {
        let keep_id = spec.get("_id").is_none_or(truthy);
        let fields: Vec<(&String, bool)> =
            spec.iter().filter(|(key, _)| key.as_str() != "_id").map(|(k, v)| (k, truthy(v))).collect();

        let included = fields.iter().filter(|(_, include)| *include).count();
        if included > 0 && included != fields.len() {
            return Err(Error::Gateway(
                "Cannot do exclusion in inclusion projection".to_string(),
            ));
        }

        if included > 0 {
            Ok(Projection::Include {
                fields: fields.into_iter().map(|(k, _)| k.clone()).collect(),
                keep_id,
            })
        } else {
            let mut excluded: Vec<String> = fields.into_iter().map(|(k, _)| k.clone()).collect();
            if !keep_id {
                excluded.push("_id".to_string());
            }
            Ok(Projection::Exclude(excluded))
        }
    }

    fn apply(&self, doc: Document) -> Document {
        match self {
            Projection::Include { fields, keep_id } => doc
                .into_iter()
                .filter(|(key, _)| (key == "_id" && *keep_id) || fields.contains(key))
                .collect(),
            Projection::Exclude(fields) => {
                doc.into_iter().filter(|(key, _)| !fields.contains(key)).collect()
            }
        }
    }
}
