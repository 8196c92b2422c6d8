//! Pipeline evaluation shared by every backend.
//!
//! Backends only have to answer filtered reads ([`Source::fetch`]); joins,
//! derivations, projections and sorting run here over in-memory documents.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Document, Filter, Lookup, Pipeline, Result, Stage};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read access a backend exposes to the evaluator.
#[async_trait]
pub trait Source: Send + Sync {
    /// Returns the documents of `collection` matching `filter`, in
    /// insertion order.
    async fn fetch(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;
}

/// A document travelling through the stages, tagged with its position in
/// the set it was fetched as. Lookups use the tag to hand sub-pipeline
/// results back to the documents they were joined for.
struct Row {
    doc: Document,
    tag: usize,
}

/// Executes a pipeline against a collection.
///
/// A leading filter stage is pushed down to the backend; everything after it
/// runs in memory, strictly in order.
#[tracing::instrument(skip(source, pipeline), fields(stages = pipeline.stages().len()))]
pub async fn execute<S: Source + ?Sized>(
    source: &S,
    collection: &str,
    pipeline: &Pipeline,
) -> Result<Vec<Document>> {
    pipeline.validate()?;
    let started = Instant::now();

    let (initial, rest) = match pipeline.stages().split_first() {
        Some((Stage::Match(filter), rest)) => (filter.clone(), rest),
        _ => (Filter::new(), pipeline.stages()),
    };

    let docs = source.fetch(collection, &initial).await?;
    let rows = tag(docs);
    let rows = run_stages(source, rows, rest).await?;

    metrics::counter!("doc_store_pipelines_total").increment(1);
    metrics::histogram!("doc_store_pipeline_duration_seconds")
        .record(started.elapsed().as_secs_f64());

    Ok(rows.into_iter().map(|row| row.doc).collect())
}

fn tag(docs: Vec<Document>) -> Vec<Row> {
    docs.into_iter()
        .enumerate()
        .map(|(tag, doc)| Row { doc, tag })
        .collect()
}

fn run_stages<'a, S: Source + ?Sized>(
    source: &'a S,
    rows: Vec<Row>,
    stages: &'a [Stage],
) -> BoxFuture<'a, Result<Vec<Row>>> {
    Box::pin(async move {
        let mut rows = rows;
        for stage in stages {
            rows = match stage {
                Stage::Match(filter) => rows.into_iter().filter(|r| filter.matches(&r.doc)).collect(),
                Stage::Lookup(lookup) => join(source, rows, lookup).await?,
                Stage::AddFields(fields) => {
                    for row in &mut rows {
                        for (field, derivation) in fields {
                            let value = derivation.evaluate(&row.doc);
                            row.doc.set_path(field, value);
                        }
                    }
                    rows
                }
                Stage::Project(projection) => rows
                    .into_iter()
                    .map(|r| Row {
                        doc: projection.apply(&r.doc),
                        tag: r.tag,
                    })
                    .collect(),
                Stage::Sort(spec) => {
                    rows.sort_by(|a, b| spec.compare(&a.doc, &b.doc));
                    rows
                }
                Stage::Skip(n) => rows.into_iter().skip(*n).collect(),
                Stage::Limit(n) => rows.into_iter().take(*n).collect(),
                Stage::Count(field) => {
                    let mut doc = Document::new();
                    doc.set(field.clone(), Value::from(rows.len()));
                    vec![Row { doc, tag: 0 }]
                }
            };
        }
        Ok(rows)
    })
}

/// Values a document offers for joining: the elements when the field is an
/// array, the value itself otherwise, nothing when missing or null.
fn join_keys(doc: &Document, field: &str) -> Vec<Value> {
    match doc.get_path(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(value) => vec![value.clone()],
    }
}

fn key_matches(local: &Value, foreign: Option<&Value>) -> bool {
    match foreign {
        Some(Value::Array(items)) => items.contains(local),
        Some(value) => value == local,
        None => false,
    }
}

async fn join<S: Source + ?Sized>(
    source: &S,
    mut rows: Vec<Row>,
    lookup: &Lookup,
) -> Result<Vec<Row>> {
    let mut keys: Vec<Value> = Vec::new();
    for row in &rows {
        for key in join_keys(&row.doc, &lookup.local_field) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    let foreign = if keys.is_empty() {
        Vec::new()
    } else {
        let filter = Filter::new().is_in(lookup.foreign_field.clone(), keys);
        source.fetch(&lookup.from, &filter).await?
    };

    // Keys are read before the sub-pipeline runs, since it may project the
    // foreign field away.
    let foreign_keys: Vec<Option<Value>> = foreign
        .iter()
        .map(|doc| doc.get_path(&lookup.foreign_field).cloned())
        .collect();

    let joined = run_stages(source, tag(foreign), lookup.pipeline.stages()).await?;
    let keep_local_order = !lookup.pipeline.sorts();

    for row in &mut rows {
        let locals = join_keys(&row.doc, &lookup.local_field);
        let matches_local =
            |local: &Value, tag: usize| key_matches(local, foreign_keys[tag].as_ref());

        let attached: Vec<Value> = if keep_local_order && locals.len() > 1 {
            let mut ordered = Vec::new();
            for local in &locals {
                ordered.extend(
                    joined
                        .iter()
                        .filter(|j| matches_local(local, j.tag))
                        .map(|j| j.doc.clone().into_value()),
                );
            }
            ordered
        } else {
            joined
                .iter()
                .filter(|j| locals.iter().any(|local| matches_local(local, j.tag)))
                .map(|j| j.doc.clone().into_value())
                .collect()
        };

        row.doc.set_path(&lookup.as_field, Value::Array(attached));
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::{Derivation, Projection, SortSpec};

    struct FixedSource {
        collections: HashMap<String, Vec<Document>>,
    }

    #[async_trait]
    impl Source for FixedSource {
        async fn fetch(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
            Ok(self
                .collections
                .get(collection)
                .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
                .unwrap_or_default())
        }
    }

    fn source(data: Value) -> FixedSource {
        let collections = data
            .as_object()
            .unwrap()
            .iter()
            .map(|(name, docs)| {
                let docs = docs
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|d| Document::from_value(d.clone()).unwrap())
                    .collect();
                (name.clone(), docs)
            })
            .collect();
        FixedSource { collections }
    }

    #[tokio::test]
    async fn lookup_attaches_matching_documents() {
        let src = source(json!({
            "comments": [
                {"_id": "c1", "owner": "u1"},
                {"_id": "c2", "owner": "u2"}
            ],
            "users": [
                {"_id": "u1", "username": "alice"},
                {"_id": "u2", "username": "bob"}
            ]
        }));
        let pipeline = Pipeline::new()
            .lookup(Lookup::new("users", "owner", "_id", "owner"))
            .add_field("owner", Derivation::First("owner".into()));

        let out = execute(&src, "comments", &pipeline).await.unwrap();
        assert_eq!(out[0].get_path("owner.username"), Some(&json!("alice")));
        assert_eq!(out[1].get_path("owner.username"), Some(&json!("bob")));
    }

    #[tokio::test]
    async fn sub_pipeline_filters_before_counting() {
        let src = source(json!({
            "playlists": [{"_id": "p1", "videos": ["v1", "v2", "v3"]}],
            "videos": [
                {"_id": "v1", "isPublished": true},
                {"_id": "v2", "isPublished": false},
                {"_id": "v3", "isPublished": true}
            ]
        }));
        let pipeline = Pipeline::new()
            .lookup(
                Lookup::new("videos", "videos", "_id", "videos")
                    .with_pipeline(Pipeline::new().filter(Filter::new().eq("isPublished", true))),
            )
            .add_field("totalVideos", Derivation::Count("videos".into()));

        let out = execute(&src, "playlists", &pipeline).await.unwrap();
        assert_eq!(out[0].get("totalVideos"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn array_lookup_keeps_local_order_unless_sorted() {
        let src = source(json!({
            "users": [{"_id": "u1", "history": ["v2", "v1"]}],
            "videos": [
                {"_id": "v1", "createdAt": "2024-01-01T00:00:00Z"},
                {"_id": "v2", "createdAt": "2024-02-01T00:00:00Z"}
            ]
        }));
        let plain = Pipeline::new().lookup(Lookup::new("videos", "history", "_id", "history"));
        let out = execute(&src, "users", &plain).await.unwrap();
        let ids: Vec<_> = out[0].get("history").unwrap().as_array().unwrap().iter().map(|v| v["_id"].clone()).collect();
        assert_eq!(ids, vec![json!("v2"), json!("v1")]);

        let sorted = Pipeline::new().lookup(
            Lookup::new("videos", "history", "_id", "history")
                .with_pipeline(Pipeline::new().sort(SortSpec::asc("createdAt"))),
        );
        let out = execute(&src, "users", &sorted).await.unwrap();
        let ids: Vec<_> = out[0].get("history").unwrap().as_array().unwrap().iter().map(|v| v["_id"].clone()).collect();
        assert_eq!(ids, vec![json!("v1"), json!("v2")]);
    }

    #[tokio::test]
    async fn sub_pipeline_projection_does_not_break_matching() {
        let src = source(json!({
            "videos": [{"_id": "v1"}, {"_id": "v2"}],
            "likes": [
                {"_id": "l1", "video": "v1", "likedBy": "u1"},
                {"_id": "l2", "video": "v2", "likedBy": "u2"}
            ]
        }));
        let pipeline = Pipeline::new().lookup(
            Lookup::new("likes", "_id", "video", "likes")
                .with_pipeline(Pipeline::new().project(Projection::new().include("likedBy"))),
        );
        let out = execute(&src, "videos", &pipeline).await.unwrap();
        assert_eq!(out[0].get("likes"), Some(&json!([{"likedBy": "u1"}])));
        assert_eq!(out[1].get("likes"), Some(&json!([{"likedBy": "u2"}])));
    }

    #[tokio::test]
    async fn count_stage_reports_zero_on_empty_input() {
        let src = source(json!({"videos": []}));
        let out = execute(&src, "videos", &Pipeline::new().count("total")).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("total"), Some(&json!(0)));
    }
}
