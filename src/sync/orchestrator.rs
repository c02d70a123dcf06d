//! Sync orchestrator
//!
//! Drives one end-to-end run: committees, then legislators, then bills, for
//! every configured congress. Each (entity, congress) stream is paginated
//! under the [`Paginator`] failure policy, normalized item by item, and
//! flushed to the store in batches through find-then-create-or-update.
//!
//! Only one run may be active at a time; an overlapping trigger returns
//! [`SyncOutcome::AlreadyRunning`] immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::pagination::{BudgetExceeded, ErrorBudget, PageStep, Paginator};
use crate::config::{Config, SyncConfig};
use crate::database::Database;
use crate::error::{AppError, DbError, SyncError};
use crate::models::{
    Bill, Committee, EntityKind, Legislator, SyncErrorEntry, SyncOutcome, SyncReport,
    SyncRunState, SyncStats, UpsertOutcome,
};
use crate::normalize::{
    current_congress, normalize_bill, normalize_bill_detail, normalize_committee,
    normalize_member, normalize_member_detail,
};
use crate::otel::SyncMetrics;
use crate::upstream::{BillFilter, CommitteeFilter, CongressApi, MemberFilter, Page, PageRequest};

/// A normalized record of any entity kind
#[derive(Debug, Clone, PartialEq)]
enum Record {
    Committee(Committee),
    Legislator(Legislator),
    Bill(Bill),
}

impl Record {
    fn id(&self) -> &str {
        match self {
            Record::Committee(c) => &c.id,
            Record::Legislator(l) => &l.id,
            Record::Bill(b) => &b.id,
        }
    }

    /// Subcommittees must be written after their parents
    fn has_parent(&self) -> bool {
        matches!(self, Record::Committee(c) if c.parent_id.is_some())
    }
}

/// A page item after normalization
type Candidate = Result<Record, SyncErrorEntry>;

/// Mutable state of one run
struct RunContext {
    since: Option<DateTime<Utc>>,
    stats: SyncStats,
    errors: Vec<SyncErrorEntry>,
    budget: ErrorBudget,
    stalled: bool,
}

/// Resets the running flag even if the run panics
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs syncs against the upstream API and the local store
pub struct SyncOrchestrator {
    config: SyncConfig,
    page_size: u32,
    api: Arc<dyn CongressApi>,
    db: Arc<dyn Database>,
    metrics: Option<Arc<SyncMetrics>>,
    running: AtomicBool,
    state: RwLock<SyncRunState>,
}

impl SyncOrchestrator {
    /// Create an orchestrator from the application config
    pub fn new(config: &Config, api: Arc<dyn CongressApi>, db: Arc<dyn Database>) -> Self {
        Self {
            config: config.sync.clone(),
            page_size: config.upstream.page_size,
            api,
            db,
            metrics: None,
            running: AtomicBool::new(false),
            state: RwLock::new(SyncRunState::default()),
        }
    }

    /// Record metrics for every run
    pub fn with_metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Load the watermark of the last successful run from the store
    pub async fn restore_state(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        let last = self.db.last_successful_sync().await?;
        self.write_state(|state| state.last_successful_sync_at = last);
        if let Some(at) = last {
            info!(last_successful_sync_at = %at, "Restored sync watermark");
        }
        Ok(last)
    }

    /// Snapshot of the run state
    pub fn state(&self) -> SyncRunState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True while a run is in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one sync unless another is in progress
    pub async fn run(&self) -> SyncOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Sync already in progress, ignoring trigger");
            return SyncOutcome::AlreadyRunning;
        }
        let _guard = RunningGuard(&self.running);

        SyncOutcome::Completed(self.execute().await)
    }

    fn write_state(&self, update: impl FnOnce(&mut SyncRunState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut state);
    }

    fn congresses(&self, now: DateTime<Utc>) -> Vec<u32> {
        if self.config.congresses.is_empty() {
            vec![current_congress(now)]
        } else {
            self.config.congresses.clone()
        }
    }

    async fn execute(&self) -> SyncReport {
        let started_at = Utc::now();
        let mut since = None;
        self.write_state(|state| {
            state.started_at = Some(started_at);
            state.is_running = true;
            since = state.last_successful_sync_at;
        });

        let mut run = RunContext {
            since: since.filter(|_| self.config.incremental),
            stats: SyncStats::default(),
            errors: Vec::new(),
            budget: ErrorBudget::new(self.config.max_total_errors),
            stalled: false,
        };
        let congresses = self.congresses(started_at);

        info!(
            congresses = ?congresses,
            since = ?run.since,
            "Starting sync run"
        );

        let mut aborted = false;
        'entities: for kind in EntityKind::ALL {
            for &congress in &congresses {
                if let Err(exceeded) = self.sync_entity(kind, congress, &mut run).await {
                    error!(
                        entity = %kind,
                        congress,
                        total_errors = exceeded.total,
                        "Error budget exceeded, aborting sync run"
                    );
                    run.errors.push(SyncErrorEntry::new("run", exceeded));
                    aborted = true;
                    break 'entities;
                }
            }
        }

        let report = SyncReport {
            success: !aborted && !run.stalled,
            aborted,
            stalled: run.stalled,
            started_at,
            finished_at: Utc::now(),
            stats: run.stats,
            errors: run.errors,
        };

        self.write_state(|state| {
            state.is_running = false;
            state.error_count = report.errors.len() as u64;
            state.last_error = report.errors.last().map(|e| e.error.clone());
            if report.success {
                state.last_successful_sync_at = Some(started_at);
            }
        });

        if let Err(e) = self.db.record_sync_run(&report).await {
            warn!(error = %e, "Failed to persist sync report");
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_run(&report);
        }

        for kind in EntityKind::ALL {
            let stats = report.stats.get(kind);
            info!(
                entity = %kind,
                processed = stats.processed,
                created = stats.created,
                updated = stats.updated,
                errors = stats.errors,
                "Entity sync summary"
            );
        }
        info!(
            success = report.success,
            aborted = report.aborted,
            stalled = report.stalled,
            errors = report.errors.len(),
            "Sync run finished"
        );

        report
    }

    /// Paginate one (entity, congress) stream to completion
    async fn sync_entity(
        &self,
        kind: EntityKind,
        congress: u32,
        run: &mut RunContext,
    ) -> Result<(), BudgetExceeded> {
        let mut paginator = Paginator::new(self.page_size, self.config.max_consecutive_errors);
        let batch_size = self.config.batch_size.max(1);
        let mut batch: Vec<Record> = Vec::with_capacity(batch_size);
        let mut deferred: Vec<Record> = Vec::new();

        debug!(entity = %kind, congress, "Syncing entity");

        while !paginator.is_finished() {
            let request = paginator.request();
            let result = self.fetch_page(kind, congress, run.since, request).await;

            let step = match paginator.step(result, &mut run.budget) {
                Ok(step) => step,
                Err(exceeded) => {
                    self.record_page_failure(kind);
                    self.flush(kind, &mut batch, &mut deferred, run).await;
                    return Err(exceeded);
                }
            };

            match step {
                PageStep::Page(page) => {
                    for rejected in &page.rejected {
                        self.item_error(
                            kind,
                            run,
                            SyncErrorEntry::new(
                                format!("{}@{}", kind, request.offset + rejected.index as u32),
                                &rejected.reason,
                            ),
                        );
                    }
                    run.stats.get_mut(kind).processed += page.rejected.len() as u64;

                    for candidate in page.items {
                        run.stats.get_mut(kind).processed += 1;
                        match candidate {
                            Ok(Record::Bill(bill)) if self.config.fetch_bill_details => {
                                let bill = self.with_details(bill, run).await;
                                batch.push(Record::Bill(bill));
                            }
                            Ok(record) => batch.push(record),
                            Err(entry) => self.item_error(kind, run, entry),
                        }
                        if batch.len() >= batch_size {
                            self.flush(kind, &mut batch, &mut deferred, run).await;
                        }
                    }
                }
                PageStep::RetrySameOffset { error, consecutive } => {
                    self.record_page_failure(kind);
                    warn!(
                        entity = %kind,
                        congress,
                        offset = request.offset,
                        consecutive,
                        error = %error,
                        "Page fetch failed, retrying same offset"
                    );
                    if self.config.page_retry_delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.config.page_retry_delay_ms))
                            .await;
                    }
                }
                PageStep::Stalled { error, offset } => {
                    self.record_page_failure(kind);
                    error!(
                        entity = %kind,
                        congress,
                        offset,
                        error = %error,
                        "Pagination stalled, stopping entity for manual follow-up"
                    );
                    run.stalled = true;
                    run.errors.push(SyncErrorEntry::new(
                        format!("{}-{}@{}", kind, congress, offset),
                        error,
                    ));
                }
                PageStep::EndOfData if request.offset == 0 => {
                    info!(
                        entity = %kind,
                        congress,
                        "No records found (404 on first page)"
                    );
                }
                PageStep::EndOfData => {
                    debug!(entity = %kind, congress, offset = request.offset, "End of data");
                }
            }
        }

        self.flush(kind, &mut batch, &mut deferred, run).await;

        // Subcommittees whose parent arrived on a later page
        if !deferred.is_empty() {
            debug!(entity = %kind, count = deferred.len(), "Retrying deferred records");
            for record in std::mem::take(&mut deferred) {
                self.persist(kind, &record, run).await;
            }
        }

        Ok(())
    }

    async fn fetch_page(
        &self,
        kind: EntityKind,
        congress: u32,
        since: Option<DateTime<Utc>>,
        request: PageRequest,
    ) -> Result<Page<Candidate>, SyncError> {
        let now = Utc::now();
        match kind {
            EntityKind::Committees => {
                let filter = CommitteeFilter {
                    congress: Some(congress),
                    chamber: None,
                };
                let page = self.api.list_committees(&filter, request).await?;
                Ok(map_page(page, |raw| {
                    normalize_committee(raw, now)
                        .map(Record::Committee)
                        .map_err(|e| SyncErrorEntry::new(raw.system_code.clone(), e))
                }))
            }
            EntityKind::Legislators => {
                let filter = MemberFilter {
                    congress: Some(congress),
                    current_member: None,
                    from_date_time: since,
                };
                let page = self.api.list_members(&filter, request).await?;
                Ok(map_page(page, |raw| {
                    normalize_member(raw, now)
                        .map(Record::Legislator)
                        .map_err(|e| SyncErrorEntry::new(raw.bioguide_id.clone(), e))
                }))
            }
            EntityKind::Bills => {
                let filter = BillFilter {
                    congress: Some(congress),
                    bill_type: None,
                    from_date_time: since,
                    to_date_time: None,
                };
                let page = self.api.list_bills(&filter, request).await?;
                Ok(map_page(page, |raw| {
                    normalize_bill(raw, now).map(Record::Bill).map_err(|e| {
                        let id = format!(
                            "{}{}-{}",
                            raw.bill_type.to_lowercase(),
                            raw.number.trim(),
                            raw.congress
                        );
                        SyncErrorEntry::new(id, e)
                    })
                }))
            }
        }
    }

    /// Enrich a bill from its detail record, falling back to the summary
    async fn with_details(&self, bill: Bill, run: &mut RunContext) -> Bill {
        match self.fetch_details(&bill).await {
            Ok(mut detailed) => {
                self.ensure_sponsor(&mut detailed, run).await;
                detailed
            }
            Err(e) => {
                self.item_error(
                    EntityKind::Bills,
                    run,
                    SyncErrorEntry::new(bill.id.clone(), format!("detail fetch failed: {}", e)),
                );
                bill
            }
        }
    }

    async fn fetch_details(&self, bill: &Bill) -> Result<Bill, SyncError> {
        let detail = self
            .api
            .get_bill(bill.congress, bill.bill_type, bill.number)
            .await?;
        let committees = match self
            .api
            .get_bill_committees(bill.congress, bill.bill_type, bill.number)
            .await
        {
            Ok(committees) => committees,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        let actions = match self
            .api
            .get_bill_actions(bill.congress, bill.bill_type, bill.number)
            .await
        {
            Ok(actions) => actions,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        normalize_bill_detail(&detail, &committees, &actions, Utc::now())
            .map_err(|e| SyncError::InvalidData(e.to_string()))
    }

    /// Store a sponsor the member listing did not cover
    ///
    /// When the sponsor cannot be fetched the bill is kept without one.
    async fn ensure_sponsor(&self, bill: &mut Bill, run: &mut RunContext) {
        let Some(sponsor_id) = bill.sponsor_id.clone() else {
            return;
        };
        match self.db.find_legislator(&sponsor_id).await {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(e) => {
                warn!(bill = %bill.id, sponsor = %sponsor_id, error = %e, "Sponsor lookup failed");
                return;
            }
        }

        debug!(bill = %bill.id, sponsor = %sponsor_id, "Backfilling sponsor");
        match self.backfill_legislator(&sponsor_id).await {
            Ok(()) => self.record_upsert(EntityKind::Legislators, UpsertOutcome::Created, run),
            Err(e) => {
                self.item_error(
                    EntityKind::Legislators,
                    run,
                    SyncErrorEntry::new(sponsor_id, format!("sponsor backfill failed: {}", e)),
                );
                bill.sponsor_id = None;
            }
        }
    }

    async fn backfill_legislator(&self, bioguide_id: &str) -> Result<(), AppError> {
        let raw = self.api.get_member(bioguide_id).await?;
        let legislator = normalize_member_detail(&raw, Utc::now())?;
        self.db.create_legislator(&legislator).await?;
        Ok(())
    }

    /// Write every batched record
    async fn flush(
        &self,
        kind: EntityKind,
        batch: &mut Vec<Record>,
        deferred: &mut Vec<Record>,
        run: &mut RunContext,
    ) {
        if batch.is_empty() {
            return;
        }
        batch.sort_by_key(Record::has_parent);
        debug!(entity = %kind, size = batch.len(), "Flushing batch");

        for record in batch.drain(..) {
            match self.upsert(&record).await {
                Ok(outcome) => self.record_upsert(kind, outcome, run),
                Err(DbError::ConstraintViolation(_)) if record.has_parent() => {
                    deferred.push(record);
                }
                Err(e) => self.item_error(kind, run, SyncErrorEntry::new(record.id(), e)),
            }
        }
    }

    async fn persist(&self, kind: EntityKind, record: &Record, run: &mut RunContext) {
        match self.upsert(record).await {
            Ok(outcome) => self.record_upsert(kind, outcome, run),
            Err(e) => self.item_error(kind, run, SyncErrorEntry::new(record.id(), e)),
        }
    }

    /// Find by id, then create or update
    async fn upsert(&self, record: &Record) -> Result<UpsertOutcome, DbError> {
        match record {
            Record::Committee(committee) => {
                if self.db.find_committee(&committee.id).await?.is_some() {
                    self.db.update_committee(committee).await?;
                    Ok(UpsertOutcome::Updated)
                } else {
                    self.db.create_committee(committee).await?;
                    Ok(UpsertOutcome::Created)
                }
            }
            Record::Legislator(legislator) => {
                if self.db.find_legislator(&legislator.id).await?.is_some() {
                    self.db.update_legislator(legislator).await?;
                    Ok(UpsertOutcome::Updated)
                } else {
                    self.db.create_legislator(legislator).await?;
                    Ok(UpsertOutcome::Created)
                }
            }
            Record::Bill(bill) => {
                if self.db.find_bill(&bill.id).await?.is_some() {
                    self.db.update_bill(bill).await?;
                    Ok(UpsertOutcome::Updated)
                } else {
                    self.db.create_bill(bill).await?;
                    Ok(UpsertOutcome::Created)
                }
            }
        }
    }

    fn record_upsert(&self, kind: EntityKind, outcome: UpsertOutcome, run: &mut RunContext) {
        let stats = run.stats.get_mut(kind);
        match outcome {
            UpsertOutcome::Created => stats.created += 1,
            UpsertOutcome::Updated => stats.updated += 1,
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_upsert(kind, outcome);
        }
    }

    fn item_error(&self, kind: EntityKind, run: &mut RunContext, entry: SyncErrorEntry) {
        warn!(entity = %kind, id = %entry.id, error = %entry.error, "Failed to sync record");
        run.stats.get_mut(kind).errors += 1;
        run.errors.push(entry);
        if let Some(metrics) = &self.metrics {
            metrics.record_item_error(kind);
        }
    }

    fn record_page_failure(&self, kind: EntityKind) {
        if let Some(metrics) = &self.metrics {
            metrics.record_page_failure(kind);
        }
    }
}

fn map_page<R>(page: Page<R>, normalize: impl Fn(&R) -> Candidate) -> Page<Candidate> {
    Page {
        items: page.items.iter().map(normalize).collect(),
        next_offset: page.next_offset,
        total_count: page.total_count,
        rejected: page.rejected,
    }
}
