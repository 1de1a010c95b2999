//! Pushing the rows of one tabular source to its entity service
//!
//! Rows are transformed per the entity schema, then dispatched concurrently
//! through a bounded pool (`buffer_unordered`). Outcomes are folded by the
//! single consumer of that stream, which is the only writer of the report and
//! of new resolver entries.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use seed_common::{IdentifierSet, RawRecord, RemoteId};

use crate::config::Endpoints;
use crate::dispatch::Dispatcher;
use crate::resolver::ReferenceResolver;
use crate::schema::EntityKind;

/// Outcome of ingesting one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub entity: EntityKind,
    /// Assigned ids, in the order responses completed
    pub ids: IdentifierSet,
    pub submitted: usize,
    /// Records dropped after exhausting retries
    pub failed: usize,
}

impl IngestReport {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            ids: IdentifierSet::new(),
            submitted: 0,
            failed: 0,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.submitted - self.failed
    }
}

/// Dispatches raw records of any entity type under a worker pool
#[derive(Debug, Clone)]
pub struct EntityIngestor {
    dispatcher: Dispatcher,
    endpoints: Endpoints,
    concurrency: usize,
}

impl EntityIngestor {
    pub fn new(dispatcher: Dispatcher, endpoints: Endpoints, concurrency: usize) -> Self {
        Self {
            dispatcher,
            endpoints,
            concurrency: concurrency.max(1),
        }
    }

    /// Ingest `records` as entities of type `kind`.
    ///
    /// Returns once every record has succeeded or exhausted its retries.
    /// Failed records are left out of the report's ids; nothing is rolled
    /// back.
    #[instrument(skip_all, fields(entity = %kind))]
    pub async fn ingest<I>(
        &self,
        kind: EntityKind,
        records: I,
        resolver: &ReferenceResolver,
    ) -> IngestReport
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let schema = kind.schema();
        let endpoint = self.endpoints.for_entity(kind);
        let dispatcher = &self.dispatcher;

        info!(endpoint, concurrency = self.concurrency, "Starting ingestion");

        let report = stream::iter(records)
            .map(|record| async move {
                let natural_key = schema.natural_key_of(&record).map(str::to_owned);
                let payload = Value::Object(schema.transform(record, resolver).await);
                let response = dispatcher.create(endpoint, &payload).await;
                (natural_key, response)
            })
            .buffer_unordered(self.concurrency)
            .fold(IngestReport::new(kind), |mut report, (natural_key, response)| async move {
                report.submitted += 1;

                let Some(body) = response else {
                    report.failed += 1;
                    return report;
                };

                match RemoteId::from_entity(&body) {
                    Some(id) => {
                        if let Some(key) = natural_key {
                            resolver.record(key, id.clone()).await;
                        }
                        report.ids.push(id);
                    },
                    None => warn!(response = %body, "Created entity has no id, skipping"),
                }

                report
            })
            .await;

        info!(
            submitted = report.submitted,
            succeeded = report.succeeded(),
            failed = report.failed,
            ids = report.ids.len(),
            "Ingestion finished"
        );

        report
    }
}
