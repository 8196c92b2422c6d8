use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};

use crate::{
    Condition, DocStoreError, Document, DocumentId, Filter, ID_FIELD, Pipeline, Result,
    eval::{Source, execute},
    id_value,
    store::{
        Cascade, Changes, DocumentStore, Toggled, WriteOptions, prepare_insert,
        validate_toggle_key,
    },
};

/// PostgreSQL-backed document store.
///
/// All collections share one `documents` table holding JSONB bodies.
/// Filters are translated to SQL; pipelines fetch through the same
/// translation and evaluate the remaining stages in memory.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        let body: Value = row.try_get("body")?;
        Document::from_value(body)
    }
}

fn path_of(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

fn push_is_null(qb: &mut QueryBuilder<'_, Postgres>, path: &[String]) {
    qb.push("((body #> ");
    qb.push_bind(path.to_vec());
    qb.push(") IS NULL OR (body #> ");
    qb.push_bind(path.to_vec());
    qb.push(") = 'null'::jsonb)");
}

fn push_eq(qb: &mut QueryBuilder<'_, Postgres>, path: &[String], value: &Value) {
    match value {
        Value::Null => push_is_null(qb, path),
        Value::Array(_) | Value::Object(_) => {
            qb.push("(body #> ");
            qb.push_bind(path.to_vec());
            qb.push(") = ");
            qb.push_bind(value.clone());
        }
        _ => {
            // Scalars also match as an element of an array field.
            qb.push("((body #> ");
            qb.push_bind(path.to_vec());
            qb.push(") = ");
            qb.push_bind(value.clone());
            qb.push(" OR (body #> ");
            qb.push_bind(path.to_vec());
            qb.push(") @> jsonb_build_array(");
            qb.push_bind(value.clone());
            qb.push("::jsonb))");
        }
    }
}

/// Appends ` AND <clause>` for every clause of the filter.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for (field, condition) in filter.clauses() {
        let path = path_of(field);
        qb.push(" AND ");
        match condition {
            Condition::Eq(value) => push_eq(qb, &path, value),
            Condition::In(values) if values.is_empty() => {
                qb.push("FALSE");
            }
            Condition::In(values) => {
                qb.push("(");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    push_eq(qb, &path, value);
                }
                qb.push(")");
            }
            Condition::Exists(true) => {
                qb.push("NOT ");
                push_is_null(qb, &path);
            }
            Condition::Exists(false) => push_is_null(qb, &path),
            Condition::ContainsText(needle) => {
                qb.push("position(lower(");
                qb.push_bind(needle.clone());
                qb.push(") in lower(body #>> ");
                qb.push_bind(path);
                qb.push(")) > 0");
            }
        }
    }
}

fn select_where<'a>(collection: &str, filter: &Filter) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("SELECT body FROM documents WHERE collection = ");
    qb.push_bind(collection.to_string());
    push_filter(&mut qb, filter);
    qb
}

async fn lock(conn: &mut PgConnection, key: &str) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key)
        .execute(conn)
        .await?;
    Ok(())
}

async fn unique_violation(
    conn: &mut PgConnection,
    collection: &str,
    doc: &Document,
    fields: &[String],
) -> Result<Option<String>> {
    let own_id = doc.id().map(|id| id.as_uuid());
    for field in fields {
        let Some(value) = doc.get_path(field).filter(|v| !v.is_null()) else {
            continue;
        };
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = $1 AND body #> $2 = $3 AND id IS DISTINCT FROM $4)",
        )
        .bind(collection)
        .bind(path_of(field))
        .bind(value.clone())
        .bind(own_id)
        .fetch_one(&mut *conn)
        .await?;
        if taken {
            return Ok(Some(field.clone()));
        }
    }
    Ok(None)
}

#[async_trait]
impl Source for PostgresDocumentStore {
    async fn fetch(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        let mut qb = select_where(collection, filter);
        qb.push(" ORDER BY seq");
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(
        &self,
        collection: &str,
        doc: Document,
        options: WriteOptions,
    ) -> Result<Document> {
        let doc = prepare_insert(doc, Utc::now());
        let id = doc.id().ok_or(DocStoreError::NotAnObject)?;

        let mut tx = self.pool.begin().await?;
        if !options.unique_fields.is_empty() {
            lock(&mut tx, collection).await?;
            if let Some(field) =
                unique_violation(&mut tx, collection, &doc, &options.unique_fields).await?
            {
                return Err(DocStoreError::DuplicateKey {
                    collection: collection.to_string(),
                    field,
                });
            }
        }

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id.as_uuid())
            .bind(doc.clone().into_value())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(doc)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        self.fetch(collection, filter).await
    }

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_document).transpose()
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS n FROM documents WHERE collection = ");
        qb.push_bind(collection.to_string());
        push_filter(&mut qb, filter);
        let row = qb.build().fetch_one(&self.pool).await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: DocumentId,
        changes: &Changes,
        options: WriteOptions,
    ) -> Result<Option<Document>> {
        let mut tx = self.pool.begin().await?;
        if !options.unique_fields.is_empty() {
            lock(&mut tx, collection).await?;
        }

        let row = sqlx::query(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut doc = Self::row_to_document(row)?;
        changes.apply(&mut doc, Utc::now());

        if let Some(field) =
            unique_violation(&mut tx, collection, &doc, &options.unique_fields).await?
        {
            return Err(DocStoreError::DuplicateKey {
                collection: collection.to_string(),
                field,
            });
        }

        sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.as_uuid())
            .bind(doc.clone().into_value())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(doc))
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_cascade(
        &self,
        collection: &str,
        id: DocumentId,
        rules: &[Cascade],
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let root = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;
        if root.rows_affected() == 0 {
            return Ok(false);
        }

        let now = Utc::now();
        let mut pending: Vec<(Value, &[Cascade])> = vec![(id_value(id), rules)];
        while let Some((parent, rules)) = pending.pop() {
            for rule in rules {
                match rule {
                    Cascade::Delete {
                        collection,
                        field,
                        then,
                    } => {
                        let mut qb =
                            QueryBuilder::new("DELETE FROM documents WHERE collection = ");
                        qb.push_bind(collection.clone());
                        push_filter(&mut qb, &Filter::new().eq(field.clone(), parent.clone()));
                        qb.push(" RETURNING body");
                        let rows = qb.build().fetch_all(&mut *tx).await?;
                        for row in rows {
                            let body: Value = row.try_get("body")?;
                            if let Some(child) = body.get(ID_FIELD) {
                                pending.push((child.clone(), then.as_slice()));
                            }
                        }
                    }
                    Cascade::Pull { collection, field } => {
                        let filter = Filter::new().eq(field.clone(), parent.clone());
                        let mut qb = select_where(collection, &filter);
                        qb.push(" FOR UPDATE");
                        let rows = qb.build().fetch_all(&mut *tx).await?;
                        let changes = Changes::new().pull(field.clone(), parent.clone());
                        for row in rows {
                            let mut doc = Self::row_to_document(row)?;
                            changes.apply(&mut doc, now);
                            let Some(doc_id) = doc.id() else {
                                continue;
                            };
                            sqlx::query(
                                "UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2",
                            )
                            .bind(collection)
                            .bind(doc_id.as_uuid())
                            .bind(doc.into_value())
                            .execute(&mut *tx)
                            .await?;
                        }
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn toggle(&self, collection: &str, key: &Filter) -> Result<Toggled> {
        validate_toggle_key(key)?;
        let key_doc = key.to_document();

        let mut tx = self.pool.begin().await?;
        lock(
            &mut tx,
            &format!("{collection}:{}", serde_json::to_string(&key_doc)?),
        )
        .await?;

        let mut qb = QueryBuilder::new("DELETE FROM documents WHERE collection = ");
        qb.push_bind(collection.to_string());
        push_filter(&mut qb, key);
        qb.push(" RETURNING body");
        let removed = qb.build().fetch_all(&mut *tx).await?;

        let outcome = if let Some(row) = removed.into_iter().next() {
            Toggled::Removed(Self::row_to_document(row)?)
        } else {
            let doc = prepare_insert(key_doc, Utc::now());
            let id = doc.id().ok_or(DocStoreError::NotAnObject)?;
            sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
                .bind(collection)
                .bind(id.as_uuid())
                .bind(doc.clone().into_value())
                .execute(&mut *tx)
                .await?;
            Toggled::Added(doc)
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Document>> {
        execute(self, collection, pipeline).await
    }
}
