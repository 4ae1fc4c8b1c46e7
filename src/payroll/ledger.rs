//! Activity ledger, the commission-earning rentals.

use chrono::{Local, NaiveDate};
use sea_orm::{
    ActiveModelTrait as _, ActiveValue::Set, ColumnTrait as _, ConnectionTrait, EntityTrait as _,
    PaginatorTrait as _, QueryFilter as _, QueryOrder as _,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    entity::{activity, prelude::*},
    error::{PayrollError, Result},
};

/// A rental as reported by the facility software, ids come from there.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub id: String,
    pub employee_id: String,
    pub facility_id: String,
    pub date: NaiveDate,
    pub unit_name: String,
    pub tenant_name: String,
    pub has_insurance: bool,
    pub commission_amount: i64,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedFilter {
    pub employee_id: Option<String>,
    pub facility_id: Option<String>,
}

/// Every activity starts out unpaid.
pub async fn record_activity(db: &impl ConnectionTrait, new: NewActivity) -> Result<activity::Model> {
    if new.commission_amount < 0 {
        return Err(PayrollError::Validation(format!("activity `{}` has a negative commission", new.id)));
    }

    let model = activity::ActiveModel {
        id: Set(new.id),
        created_at: Set(Local::now().fixed_offset()),
        updated_at: Set(Local::now().fixed_offset()),
        employee_id: Set(new.employee_id),
        facility_id: Set(new.facility_id),
        date: Set(new.date),
        unit_name: Set(new.unit_name),
        tenant_name: Set(new.tenant_name),
        has_insurance: Set(new.has_insurance),
        commission_amount: Set(new.commission_amount),
        pay_period_id: Set(None),
    }
    .insert(db).await?;

    info!(activity_id = %model.id, employee_id = %model.employee_id, amount = model.commission_amount, "Activity recorded");

    Ok(model)
}

pub async fn list_unassigned(db: &impl ConnectionTrait, filter: &UnassignedFilter) -> Result<Vec<activity::Model>> {
    let mut query = Activity::find()
        .filter(activity::Column::PayPeriodId.is_null())
        .order_by_asc(activity::Column::Date)
        .order_by_asc(activity::Column::Id);

    if let Some(employee_id) = &filter.employee_id {
        query = query.filter(activity::Column::EmployeeId.eq(employee_id.as_str()));
    }

    if let Some(facility_id) = &filter.facility_id {
        query = query.filter(activity::Column::FacilityId.eq(facility_id.as_str()));
    }

    Ok(query.all(db).await?)
}

/// Live count of an employee's unpaid commissions, across every facility.
pub async fn count_unassigned(db: &impl ConnectionTrait, employee_id: &str) -> Result<u64> {
    Ok(Activity::find()
        .filter(activity::Column::EmployeeId.eq(employee_id))
        .filter(activity::Column::PayPeriodId.is_null())
        .count(db).await?)
}
