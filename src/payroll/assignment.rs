//! Moves unpaid commissions into a pay period.
//!
//! The eligibility check and the write share one transaction. Eligible rows
//! are locked, and the update is guarded by `pay_period_id IS NULL` again, so
//! two callers can never both claim the same activity.

use std::collections::BTreeSet;

use chrono::Local;
use sea_orm::{
    prelude::Expr, ColumnTrait as _, DatabaseConnection, DatabaseTransaction, EntityTrait as _,
    QueryFilter as _, QueryOrder as _, QuerySelect as _, TransactionTrait as _,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    entity::{activity, pay_period, prelude::*},
    error::{PayrollError, Result},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReport {
    pub pay_period_id: String,
    pub assigned: Vec<String>,
    /// Unknown or already assigned elsewhere
    pub skipped: Vec<String>,
}

impl AssignmentReport {
    pub fn count(&self) -> usize {
        self.assigned.len()
    }
}

/// Result object for the HTTP surface, failures are data rather than errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentOutcome {
    pub success: bool,
    pub message: String,
}

/// Assigns every currently unassigned activity in `activity_ids` to the
/// period. Already assigned ids are skipped, which makes retries harmless.
pub async fn assign(db: &DatabaseConnection, activity_ids: &[String], period_id: &str) -> Result<AssignmentReport> {
    let requested = activity_ids.iter().cloned().collect::<BTreeSet<_>>();
    if requested.is_empty() {
        return Err(PayrollError::Assignment("no activities selected".to_string()));
    }

    let txn = db.begin().await?;

    let period = lock_open_period(&txn, period_id).await?;

    let eligible = Activity::find()
        .select_only()
        .column(activity::Column::Id)
        .filter(activity::Column::Id.is_in(requested.iter().cloned()))
        .filter(activity::Column::PayPeriodId.is_null())
        .order_by_asc(activity::Column::Id)
        .lock_exclusive()
        .into_tuple::<String>()
        .all(&txn).await?;

    let skipped = requested.iter()
        .filter(|id| !eligible.contains(id))
        .cloned()
        .collect::<Vec<_>>();

    if eligible.is_empty() {
        debug!(period_id = %period.id, ?skipped, "No eligible activities to assign");

        return Ok(AssignmentReport { pay_period_id: period.id, assigned: Vec::new(), skipped });
    }

    let res = Activity::update_many()
        .col_expr(activity::Column::PayPeriodId, Expr::value(period.id.clone()))
        .col_expr(activity::Column::UpdatedAt, Expr::value(Local::now().fixed_offset()))
        .filter(activity::Column::Id.is_in(eligible.iter().cloned()))
        .filter(activity::Column::PayPeriodId.is_null())
        .exec(&txn).await?;

    if res.rows_affected != eligible.len() as u64 {
        // Dropping the transaction rolls the partial claim back
        warn!(period_id = %period.id, expected = eligible.len(), claimed = res.rows_affected, "Activities claimed concurrently");

        return Err(PayrollError::ConcurrencyConflict { entity: "activity", id: eligible.join(",") });
    }

    txn.commit().await?;

    info!(period_id = %period.id, assigned = eligible.len(), skipped = skipped.len(), "Commissions assigned");

    Ok(AssignmentReport { pay_period_id: period.id, assigned: eligible, skipped })
}

/// `addUnpaidCommissionsToPayroll`: never fails, the outcome says what happened.
pub async fn add_unpaid_commissions_to_payroll(db: &DatabaseConnection, activity_ids: &[String], period_id: &str) -> AssignmentOutcome {
    match assign(db, activity_ids, period_id).await {
        Ok(report) if report.count() == 0 => AssignmentOutcome {
            success: false,
            message: PayrollError::Assignment(
                "no eligible activities matched, they may already be assigned".to_string()
            ).to_string(),
        },
        Ok(report) => AssignmentOutcome {
            success: true,
            message: match report.skipped.len() {
                0 => format!("Added {} commission(s) to pay period {}", report.count(), report.pay_period_id),
                skipped => format!(
                    "Added {} commission(s) to pay period {}, skipped {skipped} already assigned",
                    report.count(), report.pay_period_id,
                ),
            },
        },
        Err(err) => {
            if let PayrollError::Database(db_err) = &err {
                tracing::error!(error = %db_err, period_id, "Failed to assign commissions");
            }

            AssignmentOutcome { success: false, message: err.to_string() }
        },
    }
}

/// Explicitly moves an assigned activity to another period. Both periods
/// have to be open.
pub async fn reassign(db: &DatabaseConnection, activity_id: &str, to_period_id: &str) -> Result<activity::Model> {
    let txn = db.begin().await?;

    let Some(current) = Activity::find_by_id(activity_id)
        .lock_exclusive()
        .one(&txn).await?
    else {
        return Err(PayrollError::not_found("activity", activity_id));
    };

    let Some(from_period_id) = current.pay_period_id.clone() else {
        return Err(PayrollError::Assignment(format!("activity `{activity_id}` is unpaid, assign it instead")));
    };

    if from_period_id == to_period_id {
        return Ok(current);
    }

    // Lock in id order so two opposite moves cannot deadlock
    let (first, second) = if from_period_id.as_str() < to_period_id {
        (from_period_id.as_str(), to_period_id)
    } else {
        (to_period_id, from_period_id.as_str())
    };
    lock_open_period(&txn, first).await?;
    lock_open_period(&txn, second).await?;

    let now = Local::now().fixed_offset();
    let res = Activity::update_many()
        .col_expr(activity::Column::PayPeriodId, Expr::value(to_period_id))
        .col_expr(activity::Column::UpdatedAt, Expr::value(now))
        .filter(activity::Column::Id.eq(activity_id))
        .filter(activity::Column::PayPeriodId.eq(from_period_id.as_str()))
        .exec(&txn).await?;

    if res.rows_affected == 0 {
        return Err(PayrollError::ConcurrencyConflict { entity: "activity", id: activity_id.to_string() });
    }

    txn.commit().await?;

    info!(activity_id, from = %from_period_id, to = to_period_id, "Activity reassigned");

    Ok(activity::Model {
        pay_period_id: Some(to_period_id.to_string()),
        updated_at: now,
        ..current
    })
}

async fn lock_open_period(txn: &DatabaseTransaction, period_id: &str) -> Result<pay_period::Model> {
    let period = PayPeriod::find_by_id(period_id)
        .lock_exclusive()
        .one(txn).await?
        .ok_or_else(|| PayrollError::not_found("pay period", period_id))?;

    if !period.status.is_open() {
        return Err(PayrollError::Assignment(format!(
            "pay period `{}` is {:?}, only draft periods accept commissions",
            period.id, period.status,
        )));
    }

    Ok(period)
}
