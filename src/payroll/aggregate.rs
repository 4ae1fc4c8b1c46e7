//! Builds one payroll record per employee per pay period.
//!
//! Every figure on a [`PayrollRecord`] is derived from its `line_items`, so
//! totals and breakdowns cannot disagree. Reads happen inside one snapshot
//! transaction, an assignment landing mid-read is either fully in or out.

use std::collections::{BTreeSet, HashMap};

use sea_orm::{
    AccessMode, ColumnTrait as _, ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction,
    EntityTrait as _, IsolationLevel, QueryFilter as _, QueryOrder as _, QuerySelect as _, TransactionTrait as _,
};
use serde::Serialize;
use tracing::debug;

use crate::{
    entity::{activity, bonus_record, fixed_pay, pay_period, prelude::*, sea_orm_active_enums::BonusType},
    error::Result,
    payroll::{ledger, period},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoursKind {
    Vacation,
    Holiday,
}

/// One entry of an employee's pay for a period. Amounts are in cents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItem {
    #[serde(rename_all = "camelCase")]
    Commission {
        activity_id: String,
        facility_id: String,
        date: chrono::NaiveDate,
        unit_name: String,
        tenant_name: String,
        has_insurance: bool,
        amount: i64,
    },
    #[serde(rename_all = "camelCase")]
    Bonus {
        facility_id: String,
        bonus_type: BonusType,
        label: String,
        month: chrono::NaiveDate,
        amount: i64,
    },
    #[serde(rename_all = "camelCase")]
    Mileage {
        facility_id: String,
        amount: i64,
    },
    #[serde(rename_all = "camelCase")]
    Hours {
        facility_id: String,
        hours_kind: HoursKind,
        hours: f64,
        /// Cents per hour, hours are reported but not paid without it
        hourly_rate: Option<i64>,
    },
}

impl LineItem {
    pub fn facility_id(&self) -> &str {
        match self {
            LineItem::Commission { facility_id, .. }
            | LineItem::Bonus { facility_id, .. }
            | LineItem::Mileage { facility_id, .. }
            | LineItem::Hours { facility_id, .. } => facility_id,
        }
    }

    /// What this line adds to the total pay
    pub fn pay(&self) -> i64 {
        match self {
            LineItem::Commission { amount, .. }
            | LineItem::Bonus { amount, .. }
            | LineItem::Mileage { amount, .. } => *amount,
            LineItem::Hours { hours, hourly_rate, .. } => hourly_rate
                .map(|rate| (hours * rate as f64).round() as i64)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollRecord {
    pub employee_id: String,
    pub pay_period_id: String,
    pub commission: i64,
    pub commission_count: u64,
    pub monthly_bonus: i64,
    pub christmas_bonus: i64,
    pub vacation_hours: f64,
    pub holiday_hours: f64,
    pub mileage: i64,
    /// Dollarized hours, zero unless an hourly rate was supplied
    pub hours_pay: i64,
    pub total_pay: i64,
    /// Live count of the employee's unassigned activities, whatever the period
    pub unpaid_commission_count: u64,
    pub line_items: Vec<LineItem>,
}

impl PayrollRecord {
    pub fn from_line_items(employee_id: &str, pay_period_id: &str, line_items: Vec<LineItem>, unpaid_commission_count: u64) -> Self {
        let mut record = PayrollRecord {
            employee_id: employee_id.to_string(),
            pay_period_id: pay_period_id.to_string(),
            commission: 0,
            commission_count: 0,
            monthly_bonus: 0,
            christmas_bonus: 0,
            vacation_hours: 0.0,
            holiday_hours: 0.0,
            mileage: 0,
            hours_pay: 0,
            total_pay: 0,
            unpaid_commission_count,
            line_items: Vec::new(),
        };

        for item in &line_items {
            match item {
                LineItem::Commission { amount, .. } => {
                    record.commission += amount;
                    record.commission_count += 1;
                },
                LineItem::Bonus { bonus_type: BonusType::Monthly, amount, .. } => record.monthly_bonus += amount,
                LineItem::Bonus { bonus_type: BonusType::Christmas, amount, .. } => record.christmas_bonus += amount,
                LineItem::Mileage { amount, .. } => record.mileage += amount,
                LineItem::Hours { hours_kind, hours, .. } => {
                    match hours_kind {
                        HoursKind::Vacation => record.vacation_hours += hours,
                        HoursKind::Holiday => record.holiday_hours += hours,
                    }
                    record.hours_pay += item.pay();
                },
            }
        }

        record.total_pay = record.commission + record.monthly_bonus + record.christmas_bonus + record.mileage + record.hours_pay;
        record.line_items = line_items;

        record
    }

    pub fn commission_breakdown(&self) -> impl Iterator<Item = &LineItem> {
        self.line_items.iter().filter(|item| matches!(item, LineItem::Commission { .. }))
    }

    pub fn bonus_breakdown(&self) -> impl Iterator<Item = &LineItem> {
        self.line_items.iter().filter(|item| matches!(item, LineItem::Bonus { .. }))
    }
}

/// `getEmployeePayrollData` result. An empty period is `NoData`, failures
/// stay in the `Err` branch.
#[derive(Debug, Clone, PartialEq)]
pub enum PayrollData {
    NoData,
    Records(Vec<PayrollRecord>),
}

/// Read-only, point-in-time transaction
pub(crate) async fn snapshot(db: &DatabaseConnection) -> Result<DatabaseTransaction> {
    let txn = match db.get_database_backend() {
        DatabaseBackend::Postgres | DatabaseBackend::MySql => {
            db.begin_with_config(Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadOnly)).await?
        },
        // SQLite transactions are already serializable
        DatabaseBackend::Sqlite => db.begin().await?,
    };

    Ok(txn)
}

pub async fn aggregate(db: &DatabaseConnection, employee_id: &str, period: &pay_period::Model) -> Result<PayrollRecord> {
    let txn = snapshot(db).await?;
    let record = aggregate_in(&txn, employee_id, period).await?;
    txn.commit().await?;

    Ok(record)
}

pub async fn get_employee_payroll_data(db: &DatabaseConnection, period_id: &str) -> Result<PayrollData> {
    let txn = snapshot(db).await?;
    let period = period::find(&txn, period_id).await?;

    let employee_ids = employees_with_pay(&txn, &period).await?;
    if employee_ids.is_empty() {
        debug!(period_id, "No payroll data for period");
        txn.commit().await?;

        return Ok(PayrollData::NoData);
    }

    let mut records = Vec::with_capacity(employee_ids.len());
    for employee_id in &employee_ids {
        records.push(aggregate_in(&txn, employee_id, &period).await?);
    }

    txn.commit().await?;

    Ok(PayrollData::Records(records))
}

pub(crate) async fn aggregate_in(db: &impl ConnectionTrait, employee_id: &str, period: &pay_period::Model) -> Result<PayrollRecord> {
    let mut line_items = Vec::new();

    let activities = Activity::find()
        .filter(activity::Column::EmployeeId.eq(employee_id))
        .filter(activity::Column::PayPeriodId.eq(period.id.as_str()))
        .order_by_asc(activity::Column::Date)
        .order_by_asc(activity::Column::Id)
        .all(db).await?;

    line_items.extend(activities.into_iter().map(|a| LineItem::Commission {
        activity_id: a.id,
        facility_id: a.facility_id,
        date: a.date,
        unit_name: a.unit_name,
        tenant_name: a.tenant_name,
        has_insurance: a.has_insurance,
        amount: a.commission_amount,
    }));

    line_items.extend(latest_bonuses(db, employee_id, period).await?.into_iter().map(|b| LineItem::Bonus {
        facility_id: b.facility_id,
        bonus_type: b.bonus_type,
        label: b.label,
        month: b.month,
        amount: b.amount,
    }));

    let fixed = FixedPay::find()
        .filter(fixed_pay::Column::EmployeeId.eq(employee_id))
        .filter(fixed_pay::Column::PayPeriodId.eq(period.id.as_str()))
        .order_by_asc(fixed_pay::Column::FacilityId)
        .all(db).await?;

    for input in fixed {
        if input.mileage_amount != 0 {
            line_items.push(LineItem::Mileage { facility_id: input.facility_id.clone(), amount: input.mileage_amount });
        }

        for (hours_kind, hours) in [(HoursKind::Vacation, input.vacation_hours), (HoursKind::Holiday, input.holiday_hours)] {
            if hours != 0.0 {
                line_items.push(LineItem::Hours {
                    facility_id: input.facility_id.clone(),
                    hours_kind,
                    hours,
                    hourly_rate: input.hourly_rate,
                });
            }
        }
    }

    let unpaid = ledger::count_unassigned(db, employee_id).await?;

    Ok(PayrollRecord::from_line_items(employee_id, &period.id, line_items, unpaid))
}

/// Bonus rows dated inside the period, latest revision only. A month's
/// bonus is dated at month end, so it lands in exactly one period.
async fn latest_bonuses(db: &impl ConnectionTrait, employee_id: &str, period: &pay_period::Model) -> Result<Vec<bonus_record::Model>> {
    let rows = BonusRecord::find()
        .filter(bonus_record::Column::EmployeeId.eq(employee_id))
        .filter(bonus_record::Column::Date.between(period.start_date, period.end_date))
        .order_by_asc(bonus_record::Column::Month)
        .order_by_asc(bonus_record::Column::FacilityId)
        .order_by_asc(bonus_record::Column::Label)
        .all(db).await?;

    let mut latest = HashMap::new();
    for row in &rows {
        let revision = latest.entry((row.facility_id.clone(), row.month)).or_insert(row.revision);
        *revision = (*revision).max(row.revision);
    }

    Ok(rows.into_iter()
        .filter(|row| latest.get(&(row.facility_id.clone(), row.month)) == Some(&row.revision))
        .collect())
}

async fn employees_with_pay(db: &impl ConnectionTrait, period: &pay_period::Model) -> Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();

    ids.extend(Activity::find()
        .select_only()
        .column(activity::Column::EmployeeId)
        .distinct()
        .filter(activity::Column::PayPeriodId.eq(period.id.as_str()))
        .into_tuple::<String>()
        .all(db).await?);

    ids.extend(BonusRecord::find()
        .select_only()
        .column(bonus_record::Column::EmployeeId)
        .distinct()
        .filter(bonus_record::Column::Date.between(period.start_date, period.end_date))
        .into_tuple::<String>()
        .all(db).await?);

    ids.extend(FixedPay::find()
        .select_only()
        .column(fixed_pay::Column::EmployeeId)
        .distinct()
        .filter(fixed_pay::Column::PayPeriodId.eq(period.id.as_str()))
        .into_tuple::<String>()
        .all(db).await?);

    Ok(ids)
}
