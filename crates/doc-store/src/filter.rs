use serde_json::Value;

use crate::document::id_value;
use crate::{Document, DocumentId, ID_FIELD};

/// A single predicate on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value. When the stored field is an array, matches
    /// if any element equals the value.
    Eq(Value),

    /// Field equals any of the values (same array rule as [`Condition::Eq`]).
    In(Vec<Value>),

    /// Field is present and not null (`true`), or absent/null (`false`).
    Exists(bool),

    /// Field is a string containing the needle, ignoring case.
    ContainsText(String),
}

impl Condition {
    /// Evaluates this condition against a (possibly missing) field value.
    pub fn matches(&self, field: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => value_matches(field, expected),
            Condition::In(candidates) => candidates.iter().any(|c| value_matches(field, c)),
            Condition::Exists(should_exist) => {
                let exists = !matches!(field, None | Some(Value::Null));
                exists == *should_exist
            }
            Condition::ContainsText(needle) => field
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
        }
    }
}

fn value_matches(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(actual) => actual == expected,
        None => expected.is_null(),
    }
}

/// Conjunction of field predicates.
///
/// An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    /// Creates a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter matching a single document by ID.
    pub fn by_id(id: DocumentId) -> Self {
        Self::new().eq_id(ID_FIELD, id)
    }

    /// Adds an equality clause.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), Condition::Eq(value.into())));
        self
    }

    /// Adds an equality clause against an ID.
    pub fn eq_id(self, field: impl Into<String>, id: DocumentId) -> Self {
        self.eq(field, id_value(id))
    }

    /// Adds a membership clause.
    pub fn is_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push((field.into(), Condition::In(values)));
        self
    }

    /// Adds a presence clause.
    pub fn exists(mut self, field: impl Into<String>, should_exist: bool) -> Self {
        self.clauses
            .push((field.into(), Condition::Exists(should_exist)));
        self
    }

    /// Adds a case-insensitive substring clause.
    pub fn contains_text(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.clauses
            .push((field.into(), Condition::ContainsText(needle.into())));
        self
    }

    /// Returns the clauses in insertion order.
    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    /// Returns true if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns true if the document satisfies every clause.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, condition)| condition.matches(doc.get_path(field)))
    }

    /// Builds the document a keyed upsert would insert: every equality
    /// clause becomes a field.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        for (field, condition) in &self.clauses {
            if let Condition::Eq(value) = condition {
                doc.set_path(field, value.clone());
            }
        }
        doc
    }

    /// Returns true if every clause is an equality, which is what keyed
    /// operations such as toggles require.
    pub fn is_exact_key(&self) -> bool {
        !self.clauses.is_empty()
            && self
                .clauses
                .iter()
                .all(|(_, c)| matches!(c, Condition::Eq(_)))
    }
}
