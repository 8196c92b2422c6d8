//! Declarative query composition.

use common::DocumentId;
use doc_store::{
    CREATED_AT, Derivation, Document, DocumentStore, Filter, Lookup, Pipeline, SortSpec, Stage,
    id_value,
};
use serde_json::Value;

use crate::error::{ReadModelError, Result};
use crate::shaper::Shaper;

/// Parses a caller-supplied identifier without touching storage.
pub fn parse_id(name: &str, raw: &str) -> Result<DocumentId> {
    DocumentId::parse(raw).map_err(|_| ReadModelError::Validation(format!("Invalid {name}")))
}

/// Builds the ordered pipeline behind a read model.
///
/// Stages run as filter, then joins and derivations in the order they were
/// added, then sort (newest first unless overridden). Shaping happens after
/// the pipeline, on the documents it returns.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    collection: String,
    filter: Filter,
    stages: Vec<Stage>,
    sort: Option<SortSpec>,
    shaper: Option<Shaper>,
}

impl QueryBuilder {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::new(),
            stages: Vec::new(),
            sort: Some(SortSpec::desc(CREATED_AT)),
            shaper: None,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The primary filter.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Adds an equality clause to the primary filter.
    pub fn filter_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.eq(field, value);
        self
    }

    /// Adds an identifier clause to the primary filter.
    pub fn filter_ref(self, field: &str, id: DocumentId) -> Self {
        self.filter_eq(field, id_value(id))
    }

    /// Parses `raw` and adds it as an identifier clause; a malformed value
    /// fails here, before anything is executed.
    pub fn filter_id(self, field: &str, name: &str, raw: &str) -> Result<Self> {
        let id = parse_id(name, raw)?;
        Ok(self.filter_ref(field, id))
    }

    /// Adds a case-insensitive substring clause to the primary filter.
    pub fn filter_text(mut self, field: &str, needle: &str) -> Self {
        self.filter = self.filter.contains_text(field, needle);
        self
    }

    /// Attaches the first matching record under `lookup.as_field`, or null.
    pub fn join_one(mut self, lookup: Lookup) -> Self {
        let field = lookup.as_field.clone();
        self.stages.push(Stage::Lookup(lookup));
        self.stages
            .push(Stage::AddFields(vec![(field.clone(), Derivation::First(field))]));
        self
    }

    /// Attaches every matching record under `lookup.as_field`.
    pub fn join_many(mut self, lookup: Lookup) -> Self {
        self.stages.push(Stage::Lookup(lookup));
        self
    }

    /// Joins and stores the number of matching records in `count_field`.
    pub fn join_count(self, lookup: Lookup, count_field: &str) -> Self {
        let array = lookup.as_field.clone();
        self.join_many(lookup).count(count_field, &array)
    }

    /// Filters on joined or derived data.
    pub fn then_filter(mut self, filter: Filter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    /// Stores the cardinality of the array at `array`.
    pub fn count(self, field: &str, array: &str) -> Self {
        self.derive(field, Derivation::Count(array.to_string()))
    }

    /// Whether `viewer` appears as `member_field` of any element of
    /// `array`. Always false for anonymous viewers.
    pub fn membership(
        self,
        field: &str,
        array: &str,
        member_field: &str,
        viewer: Option<DocumentId>,
    ) -> Self {
        self.derive(
            field,
            Derivation::Contains {
                array: array.to_string(),
                field: member_field.to_string(),
                value: viewer.map(id_value),
            },
        )
    }

    pub fn derive(mut self, field: &str, derivation: Derivation) -> Self {
        self.stages
            .push(Stage::AddFields(vec![(field.to_string(), derivation)]));
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort = Some(spec);
        self
    }

    /// Keeps storage order.
    pub fn unsorted(mut self) -> Self {
        self.sort = None;
        self
    }

    pub fn shape(mut self, shaper: Shaper) -> Self {
        self.shaper = Some(shaper);
        self
    }

    /// The complete pipeline, without pagination.
    pub fn pipeline(&self) -> Pipeline {
        let mut pipeline = self.body();
        if let Some(sort) = &self.sort {
            pipeline = pipeline.sort(sort.clone());
        }
        pipeline
    }

    /// The pipeline restricted to one window of results.
    pub fn window(&self, skip: usize, limit: usize) -> Pipeline {
        self.pipeline().skip(skip).limit(limit)
    }

    /// The pipeline counting every result, or `None` when the primary
    /// filter alone determines the count.
    pub fn count_pipeline(&self) -> Option<Pipeline> {
        let filters_after_joins = self.stages.iter().any(|s| matches!(s, Stage::Match(_)));
        filters_after_joins.then(|| self.body().count("total"))
    }

    fn body(&self) -> Pipeline {
        self.stages
            .iter()
            .cloned()
            .fold(Pipeline::new().filter(self.filter.clone()), Pipeline::stage)
    }

    /// Applies the shaper, if any.
    pub fn shape_all(&self, docs: Vec<Document>) -> Vec<Document> {
        match &self.shaper {
            Some(shaper) => docs.iter().map(|doc| shaper.apply(doc)).collect(),
            None => docs,
        }
    }

    /// Runs the query and shapes every result.
    #[tracing::instrument(skip(self, store), fields(collection = %self.collection))]
    pub async fn fetch<S: DocumentStore + ?Sized>(&self, store: &S) -> Result<Vec<Document>> {
        let docs = store.aggregate(&self.collection, &self.pipeline()).await?;
        Ok(self.shape_all(docs))
    }

    /// Runs the query expecting a single primary record.
    pub async fn fetch_one<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        entity: &'static str,
    ) -> Result<Document> {
        let docs = store
            .aggregate(&self.collection, &self.pipeline().limit(1))
            .await?;
        self.shape_all(docs)
            .into_iter()
            .next()
            .ok_or(ReadModelError::NotFound { entity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_identifier_fails_while_building() {
        let err = QueryBuilder::new("comments")
            .filter_id("video", "videoId", "42")
            .unwrap_err();
        assert!(matches!(err, ReadModelError::Validation(ref m) if m == "Invalid videoId"));
    }

    #[test]
    fn sort_comes_after_joins_and_derivations() {
        let query = QueryBuilder::new("comments")
            .filter_eq("video", "v1")
            .join_count(Lookup::new("likes", "_id", "comment", "likes"), "totalLikes")
            .membership("likedByMe", "likes", "likedBy", None);

        let stages = query.pipeline().stages().to_vec();
        assert!(matches!(stages.first(), Some(Stage::Match(_))));
        assert!(matches!(stages.last(), Some(Stage::Sort(_))));
        assert_eq!(stages.len(), 5);
    }

    #[test]
    fn count_pipeline_only_when_joins_filter() {
        let plain = QueryBuilder::new("videos").join_many(Lookup::new("likes", "_id", "video", "likes"));
        assert!(plain.count_pipeline().is_none());

        let filtered = plain.then_filter(Filter::new().exists("likes", true));
        let count = filtered.count_pipeline().unwrap();
        assert!(matches!(count.stages().last(), Some(Stage::Count(_))));
    }

    #[test]
    fn unsorted_query_has_no_sort_stage() {
        let query = QueryBuilder::new("users").unsorted();
        assert!(!query.pipeline().sorts());
    }
}
