use std::cmp::Ordering;

use serde_json::Value;

use crate::document::lookup_path;
use crate::{Document, DocStoreError, Filter, Result, compare_values};

/// Joins documents from another collection into each input document.
///
/// Every input document gains an array field `as_field` holding the foreign
/// documents whose `foreign_field` equals the input's `local_field`. When
/// the local field is an array, any element may match, and joined documents
/// keep the local array's order unless the sub-pipeline sorts them.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
    /// Applied to the joined set before it is attached.
    pub pipeline: Pipeline,
}

impl Lookup {
    /// Creates a lookup with an empty sub-pipeline.
    pub fn new(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
            pipeline: Pipeline::new(),
        }
    }

    /// Sets the sub-pipeline run over the joined set.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// A computed field.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// Number of elements in an array field (0 when missing).
    Count(String),

    /// Whether any element of `array` has `field` equal to `value`.
    /// Always false when `value` is `None`.
    Contains {
        array: String,
        field: String,
        value: Option<Value>,
    },

    /// First element of an array field, or null.
    First(String),

    /// `field` of the first element of an array field, or null.
    FirstOf { array: String, field: String },

    /// Copy of another path, or null.
    Field(String),

    /// A constant.
    Literal(Value),
}

impl Derivation {
    /// Evaluates the derivation against a document.
    pub fn evaluate(&self, doc: &Document) -> Value {
        match self {
            Derivation::Count(path) => {
                let len = doc
                    .get_path(path)
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Value::from(len)
            }
            Derivation::Contains {
                array,
                field,
                value,
            } => {
                let Some(needle) = value else {
                    return Value::Bool(false);
                };
                let found = doc
                    .get_path(array)
                    .and_then(Value::as_array)
                    .is_some_and(|items| {
                        items
                            .iter()
                            .any(|item| lookup_path(item, field) == Some(needle))
                    });
                Value::Bool(found)
            }
            Derivation::First(path) => doc
                .get_path(path)
                .and_then(Value::as_array)
                .and_then(|items| items.first())
                .cloned()
                .unwrap_or(Value::Null),
            Derivation::FirstOf { array, field } => doc
                .get_path(array)
                .and_then(Value::as_array)
                .and_then(|items| items.first())
                .and_then(|first| lookup_path(first, field))
                .cloned()
                .unwrap_or(Value::Null),
            Derivation::Field(path) => doc.get_path(path).cloned().unwrap_or(Value::Null),
            Derivation::Literal(value) => value.clone(),
        }
    }
}

/// Allow-list projection.
///
/// Each entry copies a source path to an output path. Fields not listed are
/// dropped; listed sources that are missing come out as null so that the
/// response shape does not depend on the data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    fields: Vec<(String, String)>,
}

impl Projection {
    /// Creates an empty projection (which keeps nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps a path under the same name.
    pub fn include(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.fields.push((path.clone(), path));
        self
    }

    /// Copies `source` to `output`.
    pub fn rename(mut self, output: impl Into<String>, source: impl Into<String>) -> Self {
        self.fields.push((output.into(), source.into()));
        self
    }

    /// Returns `(output, source)` pairs in declaration order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Applies the projection to one document.
    pub fn apply(&self, doc: &Document) -> Document {
        let mut shaped = Document::new();
        for (output, source) in &self.fields {
            let value = doc.get_path(source).cloned().unwrap_or(Value::Null);
            shaped.set_path(output, value);
        }
        shaped
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Ordered list of sort keys. Sorting is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    keys: Vec<(String, SortOrder)>,
}

impl SortSpec {
    /// Sorts ascending by a single field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            keys: vec![(field.into(), SortOrder::Ascending)],
        }
    }

    /// Sorts descending by a single field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            keys: vec![(field.into(), SortOrder::Descending)],
        }
    }

    /// Adds a tie-breaking key.
    pub fn then(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.keys.push((field.into(), order));
        self
    }

    /// Returns the sort keys.
    pub fn keys(&self) -> &[(String, SortOrder)] {
        &self.keys
    }

    /// Compares two documents under this spec.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, order) in &self.keys {
            let ordering = compare_values(a.get_path(field), b.get_path(field));
            let ordering = match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// One step of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Lookup(Lookup),
    AddFields(Vec<(String, Derivation)>),
    Project(Projection),
    Sort(SortSpec),
    Skip(usize),
    Limit(usize),
    /// Replaces the stream with a single document `{field: <count>}`.
    Count(String),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "match",
            Stage::Lookup(_) => "lookup",
            Stage::AddFields(_) => "addFields",
            Stage::Project(_) => "project",
            Stage::Sort(_) => "sort",
            Stage::Skip(_) => "skip",
            Stage::Limit(_) => "limit",
            Stage::Count(_) => "count",
        }
    }
}

/// An ordered sequence of stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends a filter stage.
    pub fn filter(self, filter: Filter) -> Self {
        self.stage(Stage::Match(filter))
    }

    /// Appends a lookup stage.
    pub fn lookup(self, lookup: Lookup) -> Self {
        self.stage(Stage::Lookup(lookup))
    }

    /// Appends a single derived field.
    pub fn add_field(self, field: impl Into<String>, derivation: Derivation) -> Self {
        self.stage(Stage::AddFields(vec![(field.into(), derivation)]))
    }

    /// Appends a projection stage.
    pub fn project(self, projection: Projection) -> Self {
        self.stage(Stage::Project(projection))
    }

    /// Appends a sort stage.
    pub fn sort(self, spec: SortSpec) -> Self {
        self.stage(Stage::Sort(spec))
    }

    /// Appends a skip stage.
    pub fn skip(self, n: usize) -> Self {
        self.stage(Stage::Skip(n))
    }

    /// Appends a limit stage.
    pub fn limit(self, n: usize) -> Self {
        self.stage(Stage::Limit(n))
    }

    /// Appends a count stage.
    pub fn count(self, field: impl Into<String>) -> Self {
        self.stage(Stage::Count(field.into()))
    }

    /// Returns the stages in order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns true if there are no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns true if any stage (at this level) is a sort.
    pub fn sorts(&self) -> bool {
        self.stages.iter().any(|s| matches!(s, Stage::Sort(_)))
    }

    /// Checks the structural rules a store enforces before running anything.
    ///
    /// Lookup sub-pipelines are evaluated once over the whole joined set, so
    /// stages that depend on the set's size or position (`skip`, `limit`,
    /// `count`) are rejected there.
    pub fn validate(&self) -> Result<()> {
        for stage in &self.stages {
            if let Stage::Lookup(lookup) = stage {
                lookup.pipeline.validate_nested(&lookup.as_field)?;
            }
        }
        Ok(())
    }

    fn validate_nested(&self, context: &str) -> Result<()> {
        for stage in &self.stages {
            match stage {
                Stage::Skip(_) | Stage::Limit(_) | Stage::Count(_) => {
                    return Err(DocStoreError::InvalidPipeline(format!(
                        "'{}' is not allowed inside lookup '{}'",
                        stage.name(),
                        context
                    )));
                }
                Stage::Lookup(inner) => inner.pipeline.validate_nested(&inner.as_field)?,
                _ => {}
            }
        }
        Ok(())
    }
}
