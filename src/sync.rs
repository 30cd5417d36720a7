//! The sync loop
//!
//! One traversal per tracked table per cycle: detect changed rows since the
//! table's checkpoint, project satellite changes to film ids, re-fetch and
//! re-fold the affected films, bulk-write the documents, then advance the
//! checkpoint. Tables run sequentially and cycles never overlap; the loop
//! sleeps a fixed interval and only ends with the process.

use crate::error::Result;
use crate::extract::{Extractor, TrackedTable};
use crate::index::ElasticClient;
use crate::models::FilmDocument;
use crate::state::SyncState;
use crate::transform::fold_rows;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Counters for one cycle across all tracked tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStats {
    pub tables_processed: usize,
    pub changes_detected: usize,
    pub films_rebuilt: usize,
    pub documents_written: usize,
    pub index_failures: usize,
}

/// Orchestrates extraction, folding and index writes.
pub struct SyncService {
    extractor: Extractor,
    elastic: ElasticClient,
    state: SyncState,
    tables: Vec<TrackedTable>,
    poll_interval: Duration,
    bootstrap_batch_size: i64,
    /// Effective checkpoint for tables with no stored state: the process
    /// start time. A cold start does not backfill; that is the bootstrap
    /// path's job.
    default_since: DateTime<Utc>,
}

impl SyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        extractor: Extractor,
        elastic: ElasticClient,
        state: SyncState,
        tables: Vec<TrackedTable>,
        poll_interval: Duration,
        bootstrap_batch_size: i64,
        default_since: DateTime<Utc>,
    ) -> Self {
        Self {
            extractor,
            elastic,
            state,
            tables,
            poll_interval,
            bootstrap_batch_size,
            default_since,
        }
    }

    /// Create the index and push every film when it does not exist yet.
    pub async fn ensure_index(&self) -> Result<()> {
        if self.elastic.index_exists().await? {
            info!("Index '{}' already exists", self.elastic.index());
            return Ok(());
        }

        info!("Index '{}' does not exist, running full load", self.elastic.index());
        self.elastic.create_index().await?;
        let total = self.full_load().await?;
        info!("Full load complete: {} film(s)", total);
        Ok(())
    }

    /// Page over all film ids in ascending order, reusing the incremental
    /// fetch → fold → bulk path per page.
    async fn full_load(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut after: Option<Uuid> = None;

        loop {
            let ids = self
                .extractor
                .film_ids_page(after, self.bootstrap_batch_size)
                .await?;
            if ids.is_empty() {
                break;
            }
            after = ids.last().copied();

            let documents = self.rebuild_documents(&ids).await?;
            let failed = self.elastic.bulk_upsert(&documents).await?;
            if failed > 0 {
                warn!("{} document(s) rejected during full load", failed);
            }

            total += documents.len() as u64;
            info!("Loaded {} film(s) ({} total)", documents.len(), total);
        }

        Ok(total)
    }

    async fn rebuild_documents(&self, film_ids: &[Uuid]) -> Result<Vec<FilmDocument>> {
        let rows = self.extractor.fetch_film_rows(film_ids).await?;
        Ok(fold_rows(rows))
    }

    /// One traversal of every tracked table.
    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let mut stats = CycleStats::default();

        for table in &self.tables {
            // Captured before detection: a row committed while this table is
            // being processed stays strictly after the stored checkpoint.
            let cycle_started = Utc::now();
            let since = self.state.get(&table.name).unwrap_or(self.default_since);

            let changes = self.extractor.detect_changes(table, since).await?;
            stats.changes_detected += changes.len();

            let film_ids = match &table.link {
                Some(link) if !changes.is_empty() => {
                    let changed: Vec<Uuid> = changes.iter().map(|c| c.id).collect();
                    let resolved = self.extractor.resolve_film_ids(&changed, link).await?;
                    dedup_ids(resolved.iter().map(|r| r.id))
                }
                Some(_) => Vec::new(),
                None => dedup_ids(changes.iter().map(|c| c.id)),
            };
            stats.films_rebuilt += film_ids.len();

            if !film_ids.is_empty() {
                let documents = self.rebuild_documents(&film_ids).await?;
                let failed = self.elastic.bulk_upsert(&documents).await?;
                stats.documents_written += documents.len();
                stats.index_failures += failed;
                info!(
                    "{}: {} change(s) -> {} film(s) -> {} document(s)",
                    table.name,
                    changes.len(),
                    film_ids.len(),
                    documents.len()
                );
            }

            // The checkpoint advances even when nothing changed.
            self.state.set(&table.name, cycle_started)?;
            stats.tables_processed += 1;
        }

        Ok(stats)
    }

    /// Run until the process is terminated. With `once`, run a single cycle.
    pub async fn run(&self, once: bool) -> Result<()> {
        self.ensure_index().await?;

        loop {
            let stats = self.run_cycle().await?;
            info!(
                "Cycle complete: {} change(s), {} document(s) written, {} failure(s)",
                stats.changes_detected, stats.documents_written, stats.index_failures
            );

            if once {
                return Ok(());
            }

            info!("Sleeping for {:?}", self.poll_interval);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Collapse an id sequence to unique ids in first-seen order.
fn dedup_ids<I: IntoIterator<Item = Uuid>>(ids: I) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_ids_keeps_first_seen_order() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);

        assert_eq!(dedup_ids(vec![b, a, b, c, a]), vec![b, a, c]);
    }

    #[test]
    fn test_dedup_ids_empty() {
        assert!(dedup_ids(Vec::new()).is_empty());
    }
}
