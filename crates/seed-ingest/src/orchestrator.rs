// Seeding run orchestrator
//
// Runs the tabular passes in dependency order, gathers the student and course
// pools, then pushes synthetic enrollments in fixed-size batches. Passes and
// batches are strictly sequential; dispatches inside one of them run under the
// shared worker pool.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use seed_common::{IdentifierSet, RawRecord};

use crate::config::{CourseSelection, IngestConfig};
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::enrollment::{CoursePool, EnrollmentGenerator, EnrollmentRecord};
use crate::ingestor::{EntityIngestor, IngestReport};
use crate::pagination::PaginatedFetcher;
use crate::progress::{ProgressObserver, SilentProgress};
use crate::resolver::ReferenceResolver;
use crate::schema::EntityKind;
use crate::storage::{archive_key, BlobStore};

/// Where a pool of ids came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolOrigin {
    /// Ids assigned during this run
    Ingested,
    /// Ids listed from the service
    Fetched,
    /// Integers drawn from the configured course id range
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentSummary {
    pub student_pool: usize,
    pub student_origin: PoolOrigin,
    /// `None` when the stage ended before choosing courses
    pub course_origin: Option<PoolOrigin>,
    pub batches: u64,
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl EnrollmentSummary {
    fn empty(student_origin: PoolOrigin) -> Self {
        Self {
            student_pool: 0,
            student_origin,
            course_origin: None,
            batches: 0,
            submitted: 0,
            succeeded: 0,
            failed: 0,
        }
    }
}

/// Result of one orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub reports: Vec<IngestReport>,
    /// Entity types whose source was absent or unreadable
    pub skipped_sources: Vec<EntityKind>,
    pub enrollments: EnrollmentSummary,
    /// Archive keys written after the run
    pub archived: Vec<String>,
    pub dispatch: DispatchStats,
    pub duration_seconds: f64,
}

impl RunSummary {
    pub fn report(&self, kind: EntityKind) -> Option<&IngestReport> {
        self.reports.iter().find(|r| r.entity == kind)
    }

    /// Write the summary as pretty JSON followed by a newline
    pub fn write_json<W: Write>(&self, mut writer: W) -> seed_common::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

pub struct BatchOrchestrator {
    config: IngestConfig,
    dispatcher: Dispatcher,
    store: Arc<dyn BlobStore>,
    progress: Arc<dyn ProgressObserver>,
}

impl BatchOrchestrator {
    /// Create an orchestrator reporting no progress
    pub fn new(config: IngestConfig, dispatcher: Dispatcher, store: Arc<dyn BlobStore>) -> Self {
        Self {
            config,
            dispatcher,
            store,
            progress: Arc::new(SilentProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    /// Run every stage once.
    ///
    /// Never fails: per-record failures are counted in the summary, missing
    /// sources are skipped, and an empty student pool ends the enrollment
    /// stage early. Natural keys recorded during one run are not visible to
    /// the next.
    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn run_with_id(&self, run_id: Uuid) -> RunSummary {
        let start_time = Instant::now();
        let started_at = Utc::now();

        info!(store = %self.store.describe(), "Starting seeding run");

        // Step 1: Tabular passes, in dependency order
        let ingestor = EntityIngestor::new(
            self.dispatcher.clone(),
            self.config.endpoints.clone(),
            self.config.concurrency,
        );

        let resolver = ReferenceResolver::new();
        let mut reports = Vec::new();
        let mut skipped_sources = Vec::new();
        let mut read_sources = Vec::new();

        for kind in EntityKind::SOURCE_ORDER {
            if kind == EntityKind::Students && self.config.skip_students {
                info!("Student source skipped by configuration");
                skipped_sources.push(kind);
                continue;
            }

            let Some(records) = self.load_source(kind).await else {
                skipped_sources.push(kind);
                continue;
            };
            read_sources.push(kind.source_file());

            reports.push(ingestor.ingest(kind, records, &resolver).await);
        }

        // Step 2: Synthetic enrollments
        let enrollments = self.run_enrollments(&reports).await;

        // Step 3: Archive what was read
        let archived = if self.config.archive {
            self.archive_sources(&read_sources, started_at).await
        } else {
            Vec::new()
        };

        let dispatch = self.dispatcher.stats();
        let duration = start_time.elapsed();

        info!(
            passes = reports.len(),
            skipped = skipped_sources.len(),
            enrollments_succeeded = enrollments.succeeded,
            enrollments_failed = enrollments.failed,
            attempts = dispatch.attempts,
            exhausted = dispatch.exhausted,
            "Seeding run complete in {:.2}s",
            duration.as_secs_f64()
        );

        RunSummary {
            run_id,
            started_at,
            reports,
            skipped_sources,
            enrollments,
            archived,
            dispatch,
            duration_seconds: duration.as_secs_f64(),
        }
    }

    /// Run every stage once under a fresh run id
    pub async fn run(&self) -> RunSummary {
        self.run_with_id(Uuid::new_v4()).await
    }

    async fn load_source(&self, kind: EntityKind) -> Option<Vec<RawRecord>> {
        let key = kind.source_file();

        let data = match self.store.get(key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                warn!(entity = %kind, key, "Source not found, skipping pass");
                return None;
            },
            Err(e) => {
                warn!(entity = %kind, key, error = %e, "Source could not be read, skipping pass");
                return None;
            },
        };

        match crate::tabular::parse_records(key, &data) {
            Ok(records) => {
                info!(entity = %kind, key, rows = records.len(), "Loaded source");
                Some(records)
            },
            Err(e) => {
                warn!(entity = %kind, key, error = %e, "Source could not be parsed, skipping pass");
                None
            },
        }
    }

    fn fetcher(&self) -> PaginatedFetcher {
        PaginatedFetcher::new(&self.dispatcher, self.config.page_size)
    }

    /// Ids ingested this run for `kind`, or those listed from its service
    async fn pool_for(
        &self,
        kind: EntityKind,
        reports: &[IngestReport],
    ) -> (IdentifierSet, PoolOrigin) {
        if let Some(report) = reports.iter().find(|r| r.entity == kind) {
            if !report.ids.is_empty() {
                return (report.ids.clone(), PoolOrigin::Ingested);
            }
        }

        let endpoint = self.config.endpoints.for_entity(kind);
        info!(entity = %kind, endpoint, "No ingested ids, listing existing entities");
        (self.fetcher().fetch_all_ids(endpoint).await, PoolOrigin::Fetched)
    }

    async fn course_pool(&self, reports: &[IngestReport]) -> (CoursePool, PoolOrigin) {
        let range = self.config.course_id_range.clone();

        match self.config.course_selection {
            CourseSelection::Range => (CoursePool::Range(range), PoolOrigin::Range),
            CourseSelection::Known => {
                let (ids, origin) = self.pool_for(EntityKind::Courses, reports).await;
                if ids.is_empty() {
                    warn!(
                        min = range.start(),
                        max = range.end(),
                        "No course ids known, drawing course ids from the configured range"
                    );
                    return (CoursePool::Range(range), PoolOrigin::Range);
                }
                (CoursePool::known_or_range(ids, range), origin)
            },
        }
    }

    #[instrument(skip_all)]
    async fn run_enrollments(&self, reports: &[IngestReport]) -> EnrollmentSummary {
        let (students, student_origin) = self.pool_for(EntityKind::Students, reports).await;

        if students.is_empty() {
            warn!("No student ids available, skipping synthetic enrollments");
            return EnrollmentSummary::empty(student_origin);
        }

        let (courses, course_origin) = self.course_pool(reports).await;

        let mut generator =
            EnrollmentGenerator::new(&students, courses, self.config.enrollment_count);
        if let Some(seed) = self.config.rng_seed {
            generator = generator.with_seed(seed);
        }

        let batch_size = self.config.batch_size.max(1);
        let total = generator.len();
        let total_batches = total.div_ceil(batch_size) as u64;

        info!(
            students = students.len(),
            ?course_origin,
            total,
            batch_size,
            total_batches,
            "Dispatching synthetic enrollments"
        );

        let endpoint = self.config.endpoints.enrollments.as_str();
        let dispatcher = &self.dispatcher;
        let mut records = generator.iter();
        let mut summary = EnrollmentSummary {
            student_pool: students.len(),
            student_origin,
            course_origin: Some(course_origin),
            ..EnrollmentSummary::empty(student_origin)
        };

        for batch_number in 1..=total_batches {
            let batch: Vec<EnrollmentRecord> = records.by_ref().take(batch_size).collect();
            let batch_len = batch.len();

            let succeeded = stream::iter(batch)
                .map(|record| async move {
                    match serde_json::to_value(&record) {
                        Ok(payload) => dispatcher.create(endpoint, &payload).await.is_some(),
                        Err(e) => {
                            warn!(error = %e, "Enrollment could not be serialized");
                            false
                        },
                    }
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .fold(0usize, |acc, ok| async move { acc + usize::from(ok) })
                .await;

            summary.batches = batch_number;
            summary.submitted += batch_len;
            summary.succeeded += succeeded;
            summary.failed += batch_len - succeeded;

            self.progress.on_progress(batch_number, total_batches);
        }
        self.progress.on_finish();

        info!(
            submitted = summary.submitted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Synthetic enrollments finished"
        );

        summary
    }

    async fn archive_sources(&self, keys: &[&str], started_at: DateTime<Utc>) -> Vec<String> {
        let date = started_at.date_naive();
        let mut archived = Vec::new();

        for key in keys {
            let dest = archive_key(key, date);
            match self.store.copy(key, &dest).await {
                Ok(()) => archived.push(dest),
                Err(e) => warn!(key, %dest, error = %e, "Failed to archive source"),
            }
        }

        archived
    }
}
