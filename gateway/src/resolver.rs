//! Resolution of a single drama record by id.
//!
//! The upstream has no "get by id" endpoint, so a record is reconstructed
//! from the list feeds:
//!
//! 1. Fan out to the trending, new-releases and for-you feeds concurrently
//!    and wait until all three have settled.
//! 2. Search the settled results for the id, in priority order trending,
//!    then new releases, then for-you (flattened across groups). The first
//!    match wins. Failed sources are skipped.
//! 3. If the match has no summary but has a title, run one name search with
//!    that title and merge the first candidate's summary, tags and lead
//!    character into the match where the candidate has them.
//!
//! A record missing from every list is a [`Resolution::NotFound`], even if
//! the name search would know it. The name search is never a primary lookup.

use crate::metrics_defs::{
    RESOLVE_DURATION, RESOLVE_ENRICHMENT, RESOLVE_OUTCOME, RESOLVE_SOURCE_FAILURES,
};
use catalog::{Catalog, Group, PartialRecord, SourceError, flatten_groups};
use shared::{counter, histogram};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::sleep;

/// The list feeds queried during fan-out, in search priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Trending,
    Latest,
    ForYou,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Trending, SourceKind::Latest, SourceKind::ForYou];

    pub const fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Trending => "trending",
            SourceKind::Latest => "latest",
            SourceKind::ForYou => "for_you",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Found(PartialRecord),
    NotFound,
}

impl Resolution {
    fn outcome_tag(&self) -> &'static str {
        match self {
            Resolution::Found(_) => "found",
            Resolution::NotFound => "not_found",
        }
    }
}

/// Result of one fan-out task.
enum SourceOutcome {
    Trending(Result<Vec<PartialRecord>, SourceError>),
    Latest(Result<Vec<PartialRecord>, SourceError>),
    ForYou(Result<Vec<Group>, SourceError>),
}

impl SourceOutcome {
    async fn fetch(catalog: &dyn Catalog, kind: SourceKind) -> Self {
        match kind {
            SourceKind::Trending => SourceOutcome::Trending(catalog.trending().await),
            SourceKind::Latest => SourceOutcome::Latest(catalog.latest().await),
            SourceKind::ForYou => SourceOutcome::ForYou(catalog.for_you().await),
        }
    }

    fn kind(&self) -> SourceKind {
        match self {
            SourceOutcome::Trending(_) => SourceKind::Trending,
            SourceOutcome::Latest(_) => SourceKind::Latest,
            SourceOutcome::ForYou(_) => SourceKind::ForYou,
        }
    }
}

/// Settled fan-out results. `None` means the source failed or never settled.
#[derive(Debug, Default)]
pub struct Snapshot {
    trending: Option<Vec<PartialRecord>>,
    latest: Option<Vec<PartialRecord>>,
    for_you: Option<Vec<Group>>,
    settled: Vec<SourceKind>,
}

impl Snapshot {
    fn settle(&mut self, outcome: SourceOutcome) {
        let kind = outcome.kind();
        self.settled.push(kind);

        match outcome {
            SourceOutcome::Trending(result) => self.trending = accept(kind, result),
            SourceOutcome::Latest(result) => self.latest = accept(kind, result),
            SourceOutcome::ForYou(result) => self.for_you = accept(kind, result),
        }
    }

    /// Finds `id` in priority order and reports which source it came from.
    /// Records without an id never match.
    pub fn find(&self, id: &str) -> Option<(SourceKind, &PartialRecord)> {
        if id.is_empty() {
            return None;
        }

        let lists = [
            (SourceKind::Trending, &self.trending),
            (SourceKind::Latest, &self.latest),
        ];
        for (kind, records) in lists {
            if let Some(record) = records.iter().flatten().find(|r| r.id == id) {
                return Some((kind, record));
            }
        }

        self.for_you
            .iter()
            .flat_map(|groups| flatten_groups(groups))
            .find(|r| r.id == id)
            .map(|record| (SourceKind::ForYou, record))
    }

    /// Sources that did not produce a usable result.
    pub fn failed_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                SourceKind::Trending => self.trending.is_none(),
                SourceKind::Latest => self.latest.is_none(),
                SourceKind::ForYou => self.for_you.is_none(),
            })
            .collect()
    }

    /// Records a source whose task died without producing an outcome.
    fn settle_lost(&mut self, kind: SourceKind) {
        self.settled.push(kind);
        counter!(RESOLVE_SOURCE_FAILURES, "source" => kind.as_str()).increment(1);
    }

    fn pending_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| !self.settled.contains(kind))
            .collect()
    }
}

fn accept<T>(kind: SourceKind, result: Result<Vec<T>, SourceError>) -> Option<Vec<T>> {
    match result {
        Ok(records) => {
            tracing::debug!(source = %kind, count = records.len(), "Source settled");
            Some(records)
        }
        Err(e) => {
            tracing::warn!(source = %kind, error = %e, "Source failed, skipping it");
            counter!(RESOLVE_SOURCE_FAILURES, "source" => kind.as_str()).increment(1);
            None
        }
    }
}

/// A matched record is incomplete when it lacks a summary; it can only be
/// looked up by name if it has a title.
pub fn needs_enrichment(record: &PartialRecord) -> bool {
    record.summary.is_empty() && !record.title.is_empty()
}

/// Copies the candidate's summary, tags and lead character over the
/// record's, each only when the candidate's value is non-empty. Identity and
/// cover fields of the record are never touched.
pub fn merge_enrichment(record: &mut PartialRecord, candidate: PartialRecord) {
    if !candidate.summary.is_empty() {
        record.summary = candidate.summary;
    }
    if !candidate.tags.is_empty() {
        record.tags = candidate.tags;
    }
    if !candidate.lead_character.is_empty() {
        record.lead_character = candidate.lead_character;
    }
}

#[derive(Clone)]
pub struct Resolver {
    catalog: Arc<dyn Catalog>,
    fanout_deadline: Option<Duration>,
}

impl Resolver {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            fanout_deadline: None,
        }
    }

    /// Bounds the fan-out. Sources still pending at the deadline are treated
    /// as failed and resolution continues with what has settled.
    pub fn with_fanout_deadline(mut self, deadline: Duration) -> Self {
        self.fanout_deadline = Some(deadline);
        self
    }

    pub async fn resolve_by_id(&self, id: &str) -> Resolution {
        if id.is_empty() {
            tracing::debug!("Empty id, nothing to resolve");
            counter!(RESOLVE_OUTCOME, "outcome" => Resolution::NotFound.outcome_tag()).increment(1);
            return Resolution::NotFound;
        }

        let started = Instant::now();
        let snapshot = self.fan_out().await;

        let resolution = match snapshot.find(id) {
            Some((source, record)) => {
                let mut record = record.clone();
                let enriched = self.enrich(&mut record).await;
                tracing::info!(id, source = %source, enriched, "Resolved record");
                Resolution::Found(record)
            }
            None => {
                tracing::info!(
                    id,
                    failed_sources = ?snapshot.failed_sources(),
                    "Record not found in any list"
                );
                Resolution::NotFound
            }
        };

        counter!(RESOLVE_OUTCOME, "outcome" => resolution.outcome_tag()).increment(1);
        histogram!(RESOLVE_DURATION).record(started.elapsed().as_secs_f64());
        resolution
    }

    /// First name-search candidate for `title`, if any.
    pub async fn search_by_title(&self, title: &str) -> Result<Option<PartialRecord>, SourceError> {
        let candidates = self.catalog.search(title).await?;
        Ok(candidates.into_iter().next())
    }

    /// Queries all list sources concurrently and waits for every one of them
    /// to settle, or for the fan-out deadline if one is configured.
    async fn fan_out(&self) -> Snapshot {
        let mut join_set = JoinSet::new();
        let mut task_sources = HashMap::new();
        for kind in SourceKind::ALL {
            let catalog = self.catalog.clone();
            let handle =
                join_set.spawn(async move { SourceOutcome::fetch(catalog.as_ref(), kind).await });
            task_sources.insert(handle.id(), kind);
        }

        let deadline = self.fanout_deadline;
        let expired = async move {
            match deadline {
                Some(deadline) => sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut snapshot = Snapshot::default();
        loop {
            tokio::select! {
                _ = &mut expired => {
                    tracing::warn!(
                        pending = ?snapshot.pending_sources(),
                        "Fan-out deadline elapsed, skipping pending sources"
                    );
                    for kind in snapshot.pending_sources() {
                        counter!(RESOLVE_SOURCE_FAILURES, "source" => kind.as_str()).increment(1);
                    }
                    join_set.abort_all();
                    break;
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok(outcome)) => snapshot.settle(outcome),
                        Some(Err(e)) => match task_sources.get(&e.id()) {
                            Some(&kind) => {
                                tracing::error!(source = %kind, error = %e, "Fan-out task failed");
                                snapshot.settle_lost(kind);
                            }
                            None => tracing::error!(error = %e, "Fan-out task failed"),
                        },
                        None => break,
                    }
                }
            }
        }

        snapshot
    }

    /// Fills in fields missing from a list-feed match. Best effort: any
    /// failure leaves the record as it was. Returns whether a candidate was
    /// merged.
    async fn enrich(&self, record: &mut PartialRecord) -> bool {
        if !needs_enrichment(record) {
            return false;
        }

        match self.search_by_title(&record.title).await {
            Ok(Some(candidate)) => {
                merge_enrichment(record, candidate);
                counter!(RESOLVE_ENRICHMENT, "result" => "merged").increment(1);
                true
            }
            Ok(None) => {
                tracing::debug!(id = %record.id, title = %record.title, "Name search had no candidates");
                counter!(RESOLVE_ENRICHMENT, "result" => "empty").increment(1);
                false
            }
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Enrichment failed, keeping record as found");
                counter!(RESOLVE_ENRICHMENT, "result" => "failed").increment(1);
                false
            }
        }
    }
}
