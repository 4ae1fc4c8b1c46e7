//! Vacation, holiday and mileage inputs supplied per employee, period and facility.

use chrono::Local;
use sea_orm::{
    ActiveModelTrait as _, ActiveValue::Set, ColumnTrait as _, DatabaseConnection, EntityTrait as _,
    IntoActiveModel as _, QueryFilter as _, QuerySelect as _, TransactionTrait as _,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    entity::{fixed_pay, prelude::*, sea_orm_active_enums::PayPeriodStatus},
    error::{PayrollError, Result},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedPayInput {
    pub employee_id: String,
    pub pay_period_id: String,
    pub facility_id: String,
    #[serde(default)]
    pub vacation_hours: f64,
    #[serde(default)]
    pub holiday_hours: f64,
    /// Cents
    #[serde(default)]
    pub mileage_amount: i64,
    pub hourly_rate: Option<i64>,
}

/// Replaces whatever was recorded for the same employee, period and facility.
pub async fn record_fixed_pay(db: &DatabaseConnection, input: FixedPayInput) -> Result<fixed_pay::Model> {
    if input.vacation_hours < 0.0 || input.holiday_hours < 0.0 || input.mileage_amount < 0 {
        return Err(PayrollError::Validation("hours and mileage cannot be negative".to_string()));
    }

    if input.hourly_rate.is_some_and(|rate| rate < 0) {
        return Err(PayrollError::Validation("hourly rate cannot be negative".to_string()));
    }

    let txn = db.begin().await?;

    let period = PayPeriod::find_by_id(input.pay_period_id.as_str())
        .lock_shared()
        .one(&txn).await?
        .ok_or_else(|| PayrollError::not_found("pay period", input.pay_period_id.as_str()))?;

    if period.status == PayPeriodStatus::Paid {
        return Err(PayrollError::State { period_id: period.id, actual: period.status, expected: "unpaid" });
    }

    let existing = FixedPay::find()
        .filter(fixed_pay::Column::EmployeeId.eq(input.employee_id.as_str()))
        .filter(fixed_pay::Column::PayPeriodId.eq(input.pay_period_id.as_str()))
        .filter(fixed_pay::Column::FacilityId.eq(input.facility_id.as_str()))
        .one(&txn).await?;

    let now = Local::now().fixed_offset();

    let model = match existing {
        Some(existing) => {
            let mut model = existing.into_active_model();
            model.updated_at = Set(now);
            model.vacation_hours = Set(input.vacation_hours);
            model.holiday_hours = Set(input.holiday_hours);
            model.mileage_amount = Set(input.mileage_amount);
            model.hourly_rate = Set(input.hourly_rate);

            model.update(&txn).await?
        },
        None => fixed_pay::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            employee_id: Set(input.employee_id),
            pay_period_id: Set(input.pay_period_id),
            facility_id: Set(input.facility_id),
            vacation_hours: Set(input.vacation_hours),
            holiday_hours: Set(input.holiday_hours),
            mileage_amount: Set(input.mileage_amount),
            hourly_rate: Set(input.hourly_rate),
        }
        .insert(&txn).await?,
    };

    txn.commit().await?;

    info!(employee_id = %model.employee_id, pay_period_id = %model.pay_period_id, facility_id = %model.facility_id, "Fixed pay recorded");

    Ok(model)
}
