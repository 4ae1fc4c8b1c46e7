//! Pay period registry.
//!
//! Periods never overlap and only move forward, `draft -> committed -> paid`.
//! Every transition is a compare-and-set on `(id, version)`, so two callers
//! racing on the same period cannot both win.

use chrono::{Local, NaiveDate};
use sea_orm::{
    prelude::Expr, ActiveModelTrait as _, ActiveValue::Set, ColumnTrait as _, DatabaseConnection,
    EntityTrait as _, QueryFilter as _, QueryOrder as _, TransactionTrait as _,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    entity::{pay_period, prelude::*, sea_orm_active_enums::PayPeriodStatus},
    error::{PayrollError, Result},
};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PeriodFilter {
    /// Only periods that have already started on this day
    pub started_by: Option<NaiveDate>,
}

pub async fn find(db: &impl sea_orm::ConnectionTrait, period_id: &str) -> Result<pay_period::Model> {
    PayPeriod::find_by_id(period_id)
        .one(db).await?
        .ok_or_else(|| PayrollError::not_found("pay period", period_id))
}

pub async fn create_period(db: &DatabaseConnection, start: NaiveDate, end: NaiveDate) -> Result<pay_period::Model> {
    if end < start {
        return Err(PayrollError::Validation(format!("period ends ({end}) before it starts ({start})")));
    }

    let txn = db.begin().await?;

    let existing = PayPeriod::find()
        .filter(pay_period::Column::StartDate.lte(end))
        .filter(pay_period::Column::EndDate.gte(start))
        .one(&txn).await?;

    if let Some(existing) = existing {
        return Err(PayrollError::Overlap { start, end, existing: existing.id });
    }

    // Start dates are unique because periods never overlap
    let period = pay_period::ActiveModel {
        id: Set(format!("PP-{}", start.format("%Y-%m-%d"))),
        created_at: Set(Local::now().fixed_offset()),
        updated_at: Set(Local::now().fixed_offset()),
        start_date: Set(start),
        end_date: Set(end),
        status: Set(PayPeriodStatus::Draft),
        resume_status: Set(None),
        version: Set(0),
    }
    .insert(&txn).await?;

    txn.commit().await?;

    info!(period_id = %period.id, %start, %end, "Pay period created");

    Ok(period)
}

/// Periods ordered by start date, newest first
pub async fn list(db: &DatabaseConnection, filter: &PeriodFilter) -> Result<Vec<pay_period::Model>> {
    let mut query = PayPeriod::find()
        .order_by_desc(pay_period::Column::StartDate);

    if let Some(day) = filter.started_by {
        query = query.filter(pay_period::Column::StartDate.lte(day));
    }

    Ok(query.all(db).await?)
}

/// The period covering `today`, resolved once per request and handed down
pub async fn resolve_current(db: &DatabaseConnection, today: NaiveDate) -> Result<Option<pay_period::Model>> {
    Ok(PayPeriod::find()
        .filter(pay_period::Column::StartDate.lte(today))
        .filter(pay_period::Column::EndDate.gte(today))
        .one(db).await?)
}

pub async fn commit(db: &DatabaseConnection, period_id: &str) -> Result<pay_period::Model> {
    transition(db, period_id, &[PayPeriodStatus::Draft], "draft", |_| {
        (PayPeriodStatus::Committed, None)
    }).await
}

/// After this the period is frozen, assignments into or out of it are refused.
pub async fn mark_paid(db: &DatabaseConnection, period_id: &str) -> Result<pay_period::Model> {
    transition(db, period_id, &[PayPeriodStatus::Committed], "committed", |_| {
        (PayPeriodStatus::Paid, None)
    }).await
}

pub async fn begin_processing(db: &DatabaseConnection, period_id: &str) -> Result<pay_period::Model> {
    transition(db, period_id, &[PayPeriodStatus::Draft, PayPeriodStatus::Committed], "draft or committed", |period| {
        (PayPeriodStatus::Processing, Some(period.status))
    }).await
}

pub async fn finish_processing(db: &DatabaseConnection, period_id: &str) -> Result<pay_period::Model> {
    transition(db, period_id, &[PayPeriodStatus::Processing], "processing", |period| {
        (period.resume_status.unwrap_or(PayPeriodStatus::Draft), None)
    }).await
}

async fn transition(
    db: &DatabaseConnection,
    period_id: &str,
    from: &[PayPeriodStatus],
    expected: &'static str,
    next: impl FnOnce(&pay_period::Model) -> (PayPeriodStatus, Option<PayPeriodStatus>),
) -> Result<pay_period::Model> {
    let period = find(db, period_id).await?;

    if !from.contains(&period.status) {
        return Err(PayrollError::State { period_id: period.id, actual: period.status, expected });
    }

    let (status, resume_status) = next(&period);
    let now = Local::now().fixed_offset();

    let res = PayPeriod::update_many()
        .col_expr(pay_period::Column::Status, Expr::value(status))
        .col_expr(pay_period::Column::ResumeStatus, Expr::value(resume_status))
        .col_expr(pay_period::Column::Version, Expr::col(pay_period::Column::Version).add(1))
        .col_expr(pay_period::Column::UpdatedAt, Expr::value(now))
        .filter(pay_period::Column::Id.eq(period.id.as_str()))
        .filter(pay_period::Column::Version.eq(period.version))
        .exec(db).await?;

    if res.rows_affected == 0 {
        debug!(period_id = %period.id, version = period.version, "Lost pay period transition race");
        return Err(PayrollError::ConcurrencyConflict { entity: "pay period", id: period.id });
    }

    info!(period_id = %period.id, from = ?period.status, to = ?status, "Pay period transitioned");

    Ok(pay_period::Model {
        status,
        resume_status,
        version: period.version + 1,
        updated_at: now,
        ..period
    })
}
