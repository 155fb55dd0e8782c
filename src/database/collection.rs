use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::filter::Predicate;
use crate::types::SortSpec;

/// Errors from the shipped collection backends
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid collection name: {0}")]
    InvalidName(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Unknown relation: {0}")]
    UnknownRelation(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// One sorted, sliced read.
#[derive(Debug, Clone, Copy)]
pub struct FindQuery<'a> {
    pub predicate: &'a Predicate,
    pub sort: &'a SortSpec,
    pub skip: u64,
    pub limit: u64,
    /// Relation fields to replace with the documents they reference
    pub populate: &'a [String],
}

/// Query executor over a document collection.
#[async_trait]
pub trait Collection: Send + Sync {
    type Record: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Logical model name, used for logging
    fn name(&self) -> &str;

    async fn find(&self, query: FindQuery<'_>) -> Result<Vec<Self::Record>, Self::Error>;

    async fn count(&self, predicate: &Predicate) -> Result<u64, Self::Error>;
}

/// Identity of a document reference: a plain string/number or `{"$oid": ..}`.
pub(crate) fn reference_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_ascii_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_ascii_lowercase),
        _ => None,
    }
}

/// Replaces references at `field` with matching `related` documents.
/// Missing single references become null; missing array entries are dropped.
pub(crate) fn attach_relation(documents: &mut [Value], field: &str, related: &[Value], id_field: &str) {
    let lookup = |reference: &Value| -> Option<Value> {
        let key = reference_key(reference)?;
        related
            .iter()
            .find(|doc| doc.get(id_field).and_then(reference_key).as_deref() == Some(key.as_str()))
            .cloned()
    };

    for document in documents.iter_mut() {
        let Some(slot) = path_mut(document, field) else { continue };
        let replacement = match &*slot {
            Value::Array(references) => Value::Array(references.iter().filter_map(|r| lookup(r)).collect()),
            Value::Null => Value::Null,
            reference => lookup(reference).unwrap_or(Value::Null),
        };
        *slot = replacement;
    }
}

/// Reference values found at `field` across the page, deduplicated.
pub(crate) fn collect_references(documents: &[Value], field: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for document in documents {
        let Some(value) = path_ref(document, field) else { continue };
        let candidates: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for key in candidates.into_iter().filter_map(reference_key) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

fn path_ref<'v>(document: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(document, |current, segment| current.as_object()?.get(segment))
}

fn path_mut<'v>(document: &'v mut Value, path: &str) -> Option<&'v mut Value> {
    path.split('.').try_fold(document, |current, segment| current.as_object_mut()?.get_mut(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attaches_single_and_array_references() {
        let related = vec![
            json!({ "_id": "507f1f77bcf86cd799439011", "name": "Ada" }),
            json!({ "_id": "507f1f77bcf86cd799439012", "name": "Grace" }),
        ];
        let mut docs = vec![
            json!({ "owner": "507F1F77BCF86CD799439011", "reviewers": ["507f1f77bcf86cd799439012", "missing"] }),
            json!({ "owner": { "$oid": "ffffffffffffffffffffffff" } }),
        ];

        attach_relation(&mut docs, "owner", &related, "_id");
        attach_relation(&mut docs, "reviewers", &related, "_id");

        assert_eq!(docs[0]["owner"]["name"], "Ada");
        assert_eq!(docs[0]["reviewers"], json!([{ "_id": "507f1f77bcf86cd799439012", "name": "Grace" }]));
        assert_eq!(docs[1]["owner"], Value::Null);
    }

    #[test]
    fn collects_unique_references() {
        let docs = vec![json!({ "meta": { "owner": "a" } }), json!({ "meta": { "owner": ["a", "b"] } }), json!({})];
        assert_eq!(collect_references(&docs, "meta.owner"), vec!["a".to_string(), "b".to_string()]);
    }
}
