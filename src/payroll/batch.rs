//! Background bulk operations over a pay period.
//!
//! Operations live in memory and are polled by id. Each employee is one item;
//! an item failing is recorded and the batch moves on. Cancelling stops new
//! items from being dispatched, items already done stay done.

use std::{
    collections::HashMap,
    future::{self, Future},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use actix_web::web;
use chrono::{DateTime, FixedOffset, Local, TimeDelta};
use futures_util::{stream, StreamExt as _};
use sea_orm::{DatabaseConnection, EntityTrait as _, QueryOrder as _, QuerySelect as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    consts,
    entity::{employee, pay_period, prelude::*, sea_orm_active_enums::PayPeriodStatus},
    error::{PayrollError, Result},
    payroll::{aggregate::{self, PayrollRecord}, bonus, period},
    utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    /// Re-derive and record bonuses for every month the period touches
    Recalculate,
    /// Aggregate everyone, then commit the period
    Approve,
    /// Aggregate everyone without touching the period
    Export,
    /// Aggregate everyone, then mark the committed period paid
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSettings {
    pub concurrency: usize,
    /// Fraction of failed items above which the whole batch fails
    pub failure_threshold: f64,
    /// Finished operations older than this are forgotten
    pub retention: TimeDelta,
    /// Most finished operations kept, oldest dropped first
    pub max_finished: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            concurrency: consts::DEFAULT_BATCH_CONCURRENCY,
            failure_threshold: consts::DEFAULT_BATCH_FAILURE_THRESHOLD,
            retention: TimeDelta::seconds(consts::DEFAULT_BATCH_RETENTION_SECS),
            max_finished: consts::DEFAULT_BATCH_MAX_FINISHED,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(rename = "type")]
    pub operation_type: BatchType,
    pub pay_period_id: String,
    /// Every employee when absent
    pub employee_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub employee_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperation {
    pub operation_id: Uuid,
    #[serde(rename = "type")]
    pub operation_type: BatchType,
    pub pay_period_id: String,
    pub status: BatchStatus,
    pub employee_count: usize,
    pub processed: usize,
    pub succeeded: usize,
    /// 0 to 100
    pub progress: u8,
    pub errors: Vec<ItemError>,
    pub cancelled: bool,
    /// Why the batch as a whole failed
    pub failure: Option<String>,
    /// Export output, ordered by employee
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<PayrollRecord>,
    pub created_at: DateTime<FixedOffset>,
    pub finished_at: Option<DateTime<FixedOffset>>,
}

struct Tracked {
    operation: BatchOperation,
    cancel: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct BatchOrchestrator {
    db: web::Data<DatabaseConnection>,
    settings: BatchSettings,
    operations: Arc<RwLock<HashMap<Uuid, Tracked>>>,
}

impl BatchOrchestrator {
    pub fn new(db: web::Data<DatabaseConnection>, settings: BatchSettings) -> Self {
        Self {
            db,
            settings,
            operations: Arc::default(),
        }
    }

    /// Registers the operation and runs it in the background.
    pub async fn start(&self, request: BatchRequest) -> Result<BatchOperation> {
        let period = period::find(self.db.get_ref(), &request.pay_period_id).await?;

        let employee_ids = match request.employee_ids {
            Some(mut ids) => {
                ids.sort();
                ids.dedup();
                ids
            },
            None => Employee::find()
                .select_only()
                .column(employee::Column::Id)
                .order_by_asc(employee::Column::Id)
                .into_tuple::<String>()
                .all(self.db.get_ref()).await?,
        };

        let operation = BatchOperation {
            operation_id: Uuid::new_v4(),
            operation_type: request.operation_type,
            pay_period_id: period.id.clone(),
            status: BatchStatus::Pending,
            employee_count: employee_ids.len(),
            processed: 0,
            succeeded: 0,
            progress: 0,
            errors: Vec::new(),
            cancelled: false,
            failure: None,
            records: Vec::new(),
            created_at: Local::now().fixed_offset(),
            finished_at: None,
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let mut operations = self.write();
        evict_finished(&mut operations, &self.settings, operation.created_at);
        operations.insert(operation.operation_id, Tracked { operation: operation.clone(), cancel: cancel.clone() });
        drop(operations);

        info!(operation_id = %operation.operation_id, operation_type = ?operation.operation_type, period_id = %period.id, employees = employee_ids.len(), "Batch operation queued");

        let this = self.clone();
        let operation_id = operation.operation_id;
        actix_web::rt::spawn(async move {
            this.run(operation_id, request.operation_type, period, employee_ids, cancel).await;
        });

        Ok(operation)
    }

    pub fn get(&self, operation_id: Uuid) -> Result<BatchOperation> {
        self.read()
            .get(&operation_id)
            .map(|tracked| tracked.operation.clone())
            .ok_or_else(|| PayrollError::not_found("batch operation", operation_id.to_string()))
    }

    /// Only a running operation can be cancelled.
    pub fn cancel(&self, operation_id: Uuid) -> Result<BatchOperation> {
        let mut operations = self.write();

        let tracked = operations.get_mut(&operation_id)
            .ok_or_else(|| PayrollError::not_found("batch operation", operation_id.to_string()))?;

        if tracked.operation.status != BatchStatus::Running {
            return Err(PayrollError::NotCancellable { operation_id, status: tracked.operation.status.as_str() });
        }

        tracked.cancel.store(true, Ordering::SeqCst);
        tracked.operation.cancelled = true;

        info!(%operation_id, "Batch operation cancelled");

        Ok(tracked.operation.clone())
    }

    #[instrument(skip(self, period, employee_ids, cancel), fields(period_id = %period.id))]
    async fn run(&self, operation_id: Uuid, operation_type: BatchType, period: pay_period::Model, employee_ids: Vec<String>, cancel: Arc<AtomicBool>) {
        self.update(operation_id, |op| op.status = BatchStatus::Running);

        if let Err(err) = self.prepare(operation_type, &period).await {
            error!(%operation_id, %err, "Batch operation could not start");
            self.finish(operation_id, Some(err.to_string()));
            return;
        }

        let db = self.db.get_ref();
        let period_ref = &period;
        dispatch(employee_ids, self.settings.concurrency, &cancel, |employee_id| async move {
            let result = process_item(db, operation_type, &employee_id, period_ref).await;
            (employee_id, result)
        }, |employee_id, result| {
            self.update(operation_id, |op| record_item(op, employee_id, result));
        }).await;

        let failure = match self.conclude(operation_id, operation_type, &period).await {
            Ok(()) => None,
            Err(err) => {
                error!(%operation_id, %err, "Batch operation could not conclude");
                Some(err.to_string())
            },
        };

        self.finish(operation_id, failure);
    }

    /// Checks the period can take this operation and parks it in `processing`
    async fn prepare(&self, operation_type: BatchType, period: &pay_period::Model) -> Result<()> {
        let expected = match operation_type {
            BatchType::Export => return Ok(()),
            BatchType::Recalculate | BatchType::Approve => (PayPeriodStatus::Draft, "draft"),
            BatchType::Process => (PayPeriodStatus::Committed, "committed"),
        };

        let current = period::find(self.db.get_ref(), &period.id).await?;
        if current.status != expected.0 {
            return Err(PayrollError::State { period_id: current.id, actual: current.status, expected: expected.1 });
        }

        period::begin_processing(self.db.get_ref(), &period.id).await?;

        Ok(())
    }

    /// Releases the period and applies the final transition when every item succeeded
    async fn conclude(&self, operation_id: Uuid, operation_type: BatchType, period: &pay_period::Model) -> Result<()> {
        if operation_type == BatchType::Export {
            return Ok(());
        }

        if let Err(err) = period::finish_processing(self.db.get_ref(), &period.id).await {
            error!(%operation_id, period_id = %period.id, %err, "Period left in processing, release it by hand");
            return Err(err);
        }

        let operation = self.get(operation_id)?;
        if !operation.errors.is_empty() || operation.cancelled {
            return Ok(());
        }

        match operation_type {
            BatchType::Approve => { period::commit(self.db.get_ref(), &period.id).await?; },
            BatchType::Process => { period::mark_paid(self.db.get_ref(), &period.id).await?; },
            BatchType::Recalculate | BatchType::Export => {},
        }

        Ok(())
    }

    fn finish(&self, operation_id: Uuid, failure: Option<String>) {
        let threshold = self.settings.failure_threshold;

        self.update(operation_id, |op| {
            op.records.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
            op.finished_at = Some(Local::now().fixed_offset());

            let failed = op.errors.len();
            let total = op.employee_count;
            let over_threshold = total > 0 && failed as f64 / total as f64 > threshold;

            op.failure = failure.or_else(|| over_threshold.then(|| {
                PayrollError::PartialBatchFailure { failed, total }.to_string()
            }));
            op.status = if op.failure.is_some() { BatchStatus::Failed } else { BatchStatus::Completed };

            info!(operation_id = %op.operation_id, status = op.status.as_str(), succeeded = op.succeeded, failed, cancelled = op.cancelled, "Batch operation finished");
        });
    }

    fn update(&self, operation_id: Uuid, f: impl FnOnce(&mut BatchOperation)) {
        if let Some(tracked) = self.write().get_mut(&operation_id) {
            f(&mut tracked.operation);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Tracked>> {
        self.operations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Tracked>> {
        self.operations.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drops finished operations past retention, then the oldest beyond the cap.
/// Pending and running operations are never dropped.
fn evict_finished(operations: &mut HashMap<Uuid, Tracked>, settings: &BatchSettings, now: DateTime<FixedOffset>) {
    let before = operations.len();

    operations.retain(|_, tracked| match tracked.operation.finished_at {
        Some(finished_at) => now - finished_at < settings.retention,
        None => true,
    });

    let mut finished = operations.values()
        .filter_map(|tracked| tracked.operation.finished_at.map(|at| (at, tracked.operation.operation_id)))
        .collect::<Vec<_>>();

    if finished.len() > settings.max_finished {
        finished.sort();
        let excess = finished.len() - settings.max_finished;
        for (_, operation_id) in &finished[..excess] {
            operations.remove(operation_id);
        }
    }

    let evicted = before - operations.len();
    if evicted > 0 {
        debug!(evicted, kept = operations.len(), "Evicted finished batch operations");
    }
}

fn record_item(op: &mut BatchOperation, employee_id: String, result: Result<Option<PayrollRecord>>) {
    op.processed += 1;

    match result {
        Ok(record) => {
            op.succeeded += 1;
            op.records.extend(record);
        },
        Err(err) => {
            warn!(operation_id = %op.operation_id, %employee_id, %err, "Batch item failed");
            op.errors.push(ItemError { employee_id, message: err.to_string() });
        },
    }

    op.progress = match op.employee_count {
        0 => 100,
        total => (op.processed * 100 / total).min(100) as u8,
    };
}

/// Runs `work` over `items` with at most `concurrency` in flight, checking
/// `cancel` before each new item.
async fn dispatch<T, Fut>(
    items: Vec<String>,
    concurrency: usize,
    cancel: &AtomicBool,
    work: impl FnMut(String) -> Fut,
    mut done: impl FnMut(String, T),
) where
    Fut: Future<Output = (String, T)>,
{
    let mut results = stream::iter(items)
        .take_while(|_| future::ready(!cancel.load(Ordering::SeqCst)))
        .map(work)
        .buffer_unordered(concurrency.max(1));

    while let Some((item, result)) = results.next().await {
        done(item, result);
    }
}

async fn process_item(db: &DatabaseConnection, operation_type: BatchType, employee_id: &str, period: &pay_period::Model) -> Result<Option<PayrollRecord>> {
    match operation_type {
        BatchType::Recalculate => {
            recalculate(db, employee_id, period).await?;
            Ok(None)
        },
        BatchType::Export => Ok(Some(aggregate::aggregate(db, employee_id, period).await?)),
        BatchType::Approve | BatchType::Process => {
            aggregate::aggregate(db, employee_id, period).await?;
            Ok(None)
        },
    }
}

async fn recalculate(db: &DatabaseConnection, employee_id: &str, period: &pay_period::Model) -> Result<()> {
    let employee = Employee::find_by_id(employee_id)
        .one(db).await?
        .ok_or_else(|| PayrollError::not_found("employee", employee_id))?;

    let facility_id = employee.facility_id
        .ok_or_else(|| PayrollError::Validation(format!("employee `{employee_id}` has no facility")))?;

    for month in utils::months_between(period.start_date, period.end_date) {
        let snapshot = bonus::performance_snapshot(db, employee_id, &facility_id, month).await?;
        bonus::record_bonuses(db, &bonus::calculate(employee_id, &facility_id, &snapshot)).await?;
    }

    Ok(())
}
