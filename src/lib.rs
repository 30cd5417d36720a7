//! cinesync keeps an Elasticsearch movies index in sync with a PostgreSQL
//! catalog.
//!
//! The daemon polls tracked tables for rows changed since a per-table
//! checkpoint, resolves the changes to the films they affect, re-fetches and
//! re-folds each film's full relational graph into a nested document, and
//! bulk-writes the documents to the index. Checkpoints are persisted to a
//! JSON file so restarts resume where they left off.

pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod models;
pub mod retry;
pub mod state;
pub mod sync;
pub mod transform;
