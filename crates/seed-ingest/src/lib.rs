//! Campus seed ingestion library
//!
//! Seeds the campus entity services (students, instructors, courses and
//! enrollments) from tabular sources held in a blob store, then generates a
//! synthetic enrollment load against them.
//!
//! # Pipeline
//!
//! 1. Tabular passes in [`schema::EntityKind::SOURCE_ORDER`], each row
//!    transformed per its entity schema and dispatched with retries
//! 2. Student and course id pools, from this run or from the services'
//!    paginated listings
//! 3. Synthetic enrollments dispatched in fixed-size batches
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use seed_ingest::config::IngestConfig;
//! use seed_ingest::dispatch::Dispatcher;
//! use seed_ingest::orchestrator::BatchOrchestrator;
//! use seed_ingest::storage::LocalBlobStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let dispatcher = Dispatcher::from_config(&config)?;
//!     let store = Arc::new(LocalBlobStore::new(&config.source_dir));
//!
//!     let summary = BatchOrchestrator::new(config, dispatcher, store).run().await;
//!     println!("{} enrollments created", summary.enrollments.succeeded);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod dispatch;
pub mod enrollment;
pub mod error;
pub mod ingestor;
pub mod orchestrator;
pub mod pagination;
pub mod progress;
pub mod resolver;
pub mod schema;
pub mod storage;
pub mod tabular;

pub use error::{IngestError, Result};
