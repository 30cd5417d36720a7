//! PostgreSQL change extraction
//!
//! Three query shapes against the movies catalog:
//! - time-bounded scan of a tracked table for changed rows (one page)
//! - projection of changed satellite rows to the film ids they touch
//! - the full five-way join for a set of film ids, streamed
//!
//! Table and column names are interpolated (they are configuration, not user
//! input); every value travels through bind parameters.

use crate::error::Result;
use crate::models::FilmRow;
use crate::retry::{with_retry, RetryPolicy};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

/// A changed row: its id and when it changed.
#[derive(Debug, Clone, FromRow)]
pub struct ChangeRecord {
    pub id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// Link-table projection for a satellite table.
#[derive(Debug, Clone)]
pub struct LinkSpec {
    /// Fully qualified link table, e.g. `content.person_film_work`
    pub table: String,
    /// Column on the link table filtered against the changed ids
    pub field: String,
}

/// A normalized table participating in change detection. The aggregate table
/// itself carries no link: its changed ids are the rebuild set directly.
#[derive(Debug, Clone)]
pub struct TrackedTable {
    /// Fully qualified name, also the checkpoint key
    pub name: String,
    pub link: Option<LinkSpec>,
}

impl TrackedTable {
    fn aggregate(schema: &str) -> Self {
        Self {
            name: format!("{}.film_work", schema),
            link: None,
        }
    }

    fn satellite(schema: &str, table: &str, link_table: &str, link_field: &str) -> Self {
        Self {
            name: format!("{}.{}", schema, table),
            link: Some(LinkSpec {
                table: format!("{}.{}", schema, link_table),
                field: link_field.to_string(),
            }),
        }
    }
}

/// The tracked tables of the movies catalog, in processing order.
pub fn tracked_tables(schema: &str) -> Vec<TrackedTable> {
    vec![
        TrackedTable::satellite(schema, "person", "person_film_work", "person_id"),
        TrackedTable::satellite(schema, "genre", "genre_film_work", "genre_id"),
        TrackedTable::aggregate(schema),
    ]
}

fn detect_sql(table: &TrackedTable) -> String {
    format!(
        "SELECT id, updated_at FROM {} WHERE updated_at > $1 ORDER BY updated_at LIMIT $2",
        table.name
    )
}

fn resolve_sql(schema: &str, link: &LinkSpec) -> String {
    format!(
        "SELECT fw.id, fw.updated_at \
         FROM {schema}.film_work fw \
         LEFT JOIN {link_table} lnk ON lnk.film_work_id = fw.id \
         WHERE lnk.{link_field} = ANY($1) \
         ORDER BY fw.updated_at",
        schema = schema,
        link_table = link.table,
        link_field = link.field,
    )
}

fn film_rows_sql(schema: &str) -> String {
    format!(
        "SELECT fw.id AS fw_id, fw.title, fw.description, fw.rating, \
                pfw.role, p.id AS person_id, p.full_name, g.name AS genre \
         FROM {schema}.film_work fw \
         LEFT JOIN {schema}.person_film_work pfw ON pfw.film_work_id = fw.id \
         LEFT JOIN {schema}.person p ON p.id = pfw.person_id \
         LEFT JOIN {schema}.genre_film_work gfw ON gfw.film_work_id = fw.id \
         LEFT JOIN {schema}.genre g ON g.id = gfw.genre_id \
         WHERE fw.id = ANY($1)",
        schema = schema,
    )
}

fn film_ids_page_sql(schema: &str, after: bool) -> String {
    if after {
        format!(
            "SELECT id FROM {}.film_work WHERE id > $1 ORDER BY id LIMIT $2",
            schema
        )
    } else {
        format!("SELECT id FROM {}.film_work ORDER BY id LIMIT $1", schema)
    }
}

/// Postgres extraction handle
pub struct Extractor {
    pool: PgPool,
    retry: RetryPolicy,
    schema: String,
    page_size: i64,
    fetch_batch_size: usize,
}

impl Extractor {
    /// Build the extraction handle. The pool is lazy: nothing connects until
    /// the first query, and connection failures are retried per the policy.
    pub fn connect(
        url: &str,
        max_connections: u32,
        schema: &str,
        page_size: i64,
        fetch_batch_size: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)?;

        Ok(Self {
            pool,
            retry,
            schema: schema.to_string(),
            page_size,
            fetch_batch_size,
        })
    }

    /// Acquire a connection, retrying connectivity failures without bound.
    async fn acquire(&self) -> sqlx::pool::PoolConnection<sqlx::Postgres> {
        with_retry(&self.retry, "postgres connect", || self.pool.acquire()).await
    }

    /// One page of rows changed since `since`, strictly after, oldest first.
    /// Returns an empty page when nothing changed.
    pub async fn detect_changes(
        &self,
        table: &TrackedTable,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChangeRecord>> {
        let mut conn = self.acquire().await;
        let records = sqlx::query_as::<_, ChangeRecord>(&detect_sql(table))
            .bind(since)
            .bind(self.page_size)
            .fetch_all(&mut *conn)
            .await?;
        Ok(records)
    }

    /// Film ids whose documents are invalidated by the given satellite-table
    /// changes. No time filter: a film joins the rebuild set regardless of
    /// its own `updated_at`.
    pub async fn resolve_film_ids(
        &self,
        changed_ids: &[Uuid],
        link: &LinkSpec,
    ) -> Result<Vec<ChangeRecord>> {
        if changed_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.acquire().await;
        let records = sqlx::query_as::<_, ChangeRecord>(&resolve_sql(&self.schema, link))
            .bind(changed_ids)
            .fetch_all(&mut *conn)
            .await?;
        Ok(records)
    }

    /// The full flattened join for a set of film ids. Ids are queried in
    /// fixed-size batches and each result set is streamed off the wire row
    /// by row; an empty id set short-circuits without touching the database.
    pub async fn fetch_film_rows(&self, film_ids: &[Uuid]) -> Result<Vec<FilmRow>> {
        if film_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = film_rows_sql(&self.schema);
        let mut rows = Vec::new();

        for batch in film_ids.chunks(self.fetch_batch_size) {
            let mut conn = self.acquire().await;
            let mut stream = sqlx::query_as::<_, FilmRow>(&sql)
                .bind(batch)
                .fetch(&mut *conn);

            while let Some(row) = stream.try_next().await? {
                rows.push(row);
            }
        }

        Ok(rows)
    }

    /// One ascending-id page of film ids, for the bootstrap full load.
    pub async fn film_ids_page(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        let mut conn = self.acquire().await;
        let ids = match after {
            Some(after) => {
                sqlx::query_scalar::<_, Uuid>(&film_ids_page_sql(&self.schema, true))
                    .bind(after)
                    .bind(limit)
                    .fetch_all(&mut *conn)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, Uuid>(&film_ids_page_sql(&self.schema, false))
                    .bind(limit)
                    .fetch_all(&mut *conn)
                    .await?
            }
        };
        Ok(ids)
    }
}
