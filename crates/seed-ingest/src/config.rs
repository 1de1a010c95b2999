//! Ingestion configuration
//!
//! Every knob of a seeding run comes from environment variables (optionally
//! loaded from a `.env` file); the CLI overrides a few of them per
//! invocation.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use seed_common::{Result, SeedError};

use crate::dispatch::RetryPolicy;
use crate::schema::EntityKind;

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Base URL of the load balancer fronting the entity services.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Maximum dispatches in flight at any instant.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Attempts per dispatch, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff before retry `i` is this value times `i`.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Timeout applied to each individual attempt.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Page size used when listing existing entities.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Synthetic records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Synthetic enrollments generated per run.
pub const DEFAULT_ENROLLMENT_COUNT: usize = 10_000;

/// Course ids drawn when no real course ids are used.
pub const DEFAULT_COURSE_ID_MIN: i64 = 1;
pub const DEFAULT_COURSE_ID_MAX: i64 = 100;

/// Local directory holding source files when not reading from S3.
pub const DEFAULT_SOURCE_DIR: &str = "/tmp/ingesta_data";

/// How synthetic enrollments pick their course id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseSelection {
    /// Ids of courses ingested this run, or listed from the service
    #[default]
    Known,
    /// Uniform integer from the configured course id range
    Range,
}

impl FromStr for CourseSelection {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "known" | "real" => Ok(CourseSelection::Known),
            "range" | "random" => Ok(CourseSelection::Range),
            other => Err(SeedError::config(format!("Invalid course selection: {}", other))),
        }
    }
}

/// Where tabular sources are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    #[default]
    S3,
    Local,
}

impl FromStr for SourceKind {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(SourceKind::S3),
            "local" | "fs" => Ok(SourceKind::Local),
            other => Err(SeedError::config(format!("Invalid source kind: {}", other))),
        }
    }
}

/// Collection URLs of the entity services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub students: String,
    pub instructors: String,
    pub courses: String,
    pub enrollments: String,
}

impl Endpoints {
    /// Derive every collection URL from one base URL
    pub fn from_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let url = |kind: EntityKind| format!("{}/{}", base, kind.collection_path());

        Self {
            students: url(EntityKind::Students),
            instructors: url(EntityKind::Instructors),
            courses: url(EntityKind::Courses),
            enrollments: url(EntityKind::Enrollments),
        }
    }

    pub fn for_entity(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Students => &self.students,
            EntityKind::Instructors => &self.instructors,
            EntityKind::Courses => &self.courses,
            EntityKind::Enrollments => &self.enrollments,
        }
    }

    fn set(&mut self, kind: EntityKind, url: String) {
        match kind {
            EntityKind::Students => self.students = url,
            EntityKind::Instructors => self.instructors = url,
            EntityKind::Courses => self.courses = url,
            EntityKind::Enrollments => self.enrollments = url,
        }
    }
}

/// Settings of one seeding run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub endpoints: Endpoints,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub concurrency: usize,
    pub page_size: usize,
    pub batch_size: usize,
    pub enrollment_count: usize,
    pub course_selection: CourseSelection,
    pub course_id_range: RangeInclusive<i64>,
    /// Skip the student source and list existing students instead
    pub skip_students: bool,
    pub source: SourceKind,
    pub source_dir: PathBuf,
    /// Copy processed sources to `{basename}/{yyyy-mm-dd}/{filename}`
    pub archive: bool,
    /// Fixed seed for reproducible synthetic data
    pub rng_seed: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::from_base(DEFAULT_BASE_URL),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            enrollment_count: DEFAULT_ENROLLMENT_COUNT,
            course_selection: CourseSelection::Known,
            course_id_range: DEFAULT_COURSE_ID_MIN..=DEFAULT_COURSE_ID_MAX,
            skip_students: false,
            source: SourceKind::S3,
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            archive: false,
            rng_seed: None,
        }
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SeedError::config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

impl IngestConfig {
    /// Load configuration from the environment, honouring a `.env` file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// - `SEED_BASE_URL` and `SEED_<ENTITY>_ENDPOINT` overrides
    /// - `SEED_CONCURRENCY`, `SEED_MAX_ATTEMPTS`, `SEED_RETRY_BASE_DELAY_MS`,
    ///   `SEED_REQUEST_TIMEOUT_SECS`
    /// - `SEED_PAGE_SIZE`, `SEED_BATCH_SIZE`, `SEED_ENROLLMENT_COUNT`
    /// - `SEED_COURSE_POLICY` (known/range), `SEED_COURSE_ID_MIN`, `SEED_COURSE_ID_MAX`
    /// - `SEED_SKIP_STUDENTS`, `SEED_SOURCE` (s3/local), `SEED_SOURCE_DIR`,
    ///   `SEED_ARCHIVE`, `SEED_RNG_SEED`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let base_url = lookup("SEED_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut endpoints = Endpoints::from_base(&base_url);
        for kind in EntityKind::SOURCE_ORDER {
            let key = format!("SEED_{}_ENDPOINT", kind.as_str().to_uppercase());
            if let Some(url) = lookup(&key) {
                endpoints.set(kind, url);
            }
        }

        let retry = RetryPolicy::new(
            parsed(&lookup, "SEED_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            Duration::from_millis(parsed(
                &lookup,
                "SEED_RETRY_BASE_DELAY_MS",
                DEFAULT_RETRY_BASE_DELAY_MS,
            )?),
        );

        let rng_seed = match lookup("SEED_RNG_SEED") {
            Some(raw) => Some(raw.trim().parse().map_err(|_| {
                SeedError::config(format!("SEED_RNG_SEED has an invalid value: {}", raw))
            })?),
            None => None,
        };

        let config = Self {
            endpoints,
            retry,
            request_timeout: Duration::from_secs(parsed(
                &lookup,
                "SEED_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            concurrency: parsed(&lookup, "SEED_CONCURRENCY", defaults.concurrency)?,
            page_size: parsed(&lookup, "SEED_PAGE_SIZE", defaults.page_size)?,
            batch_size: parsed(&lookup, "SEED_BATCH_SIZE", defaults.batch_size)?,
            enrollment_count: parsed(&lookup, "SEED_ENROLLMENT_COUNT", defaults.enrollment_count)?,
            course_selection: parsed(&lookup, "SEED_COURSE_POLICY", defaults.course_selection)?,
            course_id_range: parsed(&lookup, "SEED_COURSE_ID_MIN", DEFAULT_COURSE_ID_MIN)?
                ..=parsed(&lookup, "SEED_COURSE_ID_MAX", DEFAULT_COURSE_ID_MAX)?,
            skip_students: parsed(&lookup, "SEED_SKIP_STUDENTS", false)?,
            source: parsed(&lookup, "SEED_SOURCE", defaults.source)?,
            source_dir: lookup("SEED_SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.source_dir),
            archive: parsed(&lookup, "SEED_ARCHIVE", false)?,
            rng_seed,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall or panic a run
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(SeedError::config("Concurrency must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(SeedError::config("Max attempts must be greater than 0"));
        }
        if self.page_size == 0 {
            return Err(SeedError::config("Page size must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(SeedError::config("Batch size must be greater than 0"));
        }
        if self.course_id_range.is_empty() {
            return Err(SeedError::config(format!(
                "Course id range is empty: {}..={}",
                self.course_id_range.start(),
                self.course_id_range.end()
            )));
        }
        for kind in EntityKind::SOURCE_ORDER {
            let url = self.endpoints.for_entity(kind);
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SeedError::config(format!(
                    "Endpoint for {} is not an HTTP URL: {}",
                    kind, url
                )));
            }
        }
        Ok(())
    }
}
