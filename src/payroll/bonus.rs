//! Monthly and Christmas bonuses.
//!
//! [`calculate`] is pure, the same snapshot always yields the same breakdown.
//! [`record_bonuses`] appends that breakdown as a new revision, or does
//! nothing when the latest revision already matches, so recalculation can
//! be re-run freely.

use chrono::{Datelike as _, Local, NaiveDate};
use sea_orm::{
    ActiveModelTrait as _, ActiveValue::Set, ColumnTrait as _, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait as _, PaginatorTrait as _, QueryFilter as _, QueryOrder as _, QuerySelect as _, SqlErr,
    TransactionTrait as _,
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    consts,
    entity::{activity, bonus_record, pay_period, prelude::*, sea_orm_active_enums::{BonusType, PayPeriodStatus}},
    error::{PayrollError, Result},
    utils,
};

/// What an employee achieved at one facility during one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceSnapshot {
    /// First day of the month
    pub month: NaiveDate,
    pub rentals: u32,
    pub rental_goal: u32,
    pub insurance_sales: u32,
    pub hire_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusComponent {
    pub bonus_type: BonusType,
    pub label: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusCalculation {
    pub employee_id: String,
    pub facility_id: String,
    pub month: NaiveDate,
    pub monthly_bonus: i64,
    pub christmas_bonus: i64,
    pub breakdown: Vec<BonusComponent>,
}

pub fn calculate(employee_id: &str, facility_id: &str, snapshot: &PerformanceSnapshot) -> BonusCalculation {
    let month = utils::month_of(snapshot.month);
    let mut breakdown = Vec::new();

    if snapshot.rental_goal > 0 && snapshot.rentals >= snapshot.rental_goal {
        breakdown.push(BonusComponent {
            bonus_type: BonusType::Monthly,
            label: format!("Rental goal met ({}/{})", snapshot.rentals, snapshot.rental_goal),
            amount: consts::RENTAL_GOAL_BONUS,
        });

        let over = snapshot.rentals - snapshot.rental_goal;
        if over > 0 {
            breakdown.push(BonusComponent {
                bonus_type: BonusType::Monthly,
                label: format!("{over} rental(s) over goal"),
                amount: consts::RENTAL_OVER_GOAL_BONUS * i64::from(over),
            });
        }
    }

    if snapshot.insurance_sales > 0 {
        breakdown.push(BonusComponent {
            bonus_type: BonusType::Monthly,
            label: format!("{} insurance sale(s)", snapshot.insurance_sales),
            amount: consts::INSURANCE_BONUS * i64::from(snapshot.insurance_sales),
        });
    }

    let month_end = utils::end_of_month(month);
    if month.month() == 12 && snapshot.hire_date <= month_end {
        let years = utils::whole_years(snapshot.hire_date, month_end);
        let amount = (consts::CHRISTMAS_BONUS_BASE + consts::CHRISTMAS_BONUS_PER_YEAR * i64::from(years))
            .min(consts::CHRISTMAS_BONUS_CAP);

        breakdown.push(BonusComponent {
            bonus_type: BonusType::Christmas,
            label: format!("Christmas bonus ({years} year(s) of service)"),
            amount,
        });
    }

    let total = |bonus_type| breakdown.iter()
        .filter(|c| c.bonus_type == bonus_type)
        .map(|c| c.amount)
        .sum::<i64>();

    BonusCalculation {
        employee_id: employee_id.to_string(),
        facility_id: facility_id.to_string(),
        month,
        monthly_bonus: total(BonusType::Monthly),
        christmas_bonus: total(BonusType::Christmas),
        breakdown,
    }
}

/// Builds the snapshot from the activity ledger and the facility's goal.
pub async fn performance_snapshot(db: &impl ConnectionTrait, employee_id: &str, facility_id: &str, month: NaiveDate) -> Result<PerformanceSnapshot> {
    let month = utils::month_of(month);

    let employee = Employee::find_by_id(employee_id)
        .one(db).await?
        .ok_or_else(|| PayrollError::not_found("employee", employee_id))?;

    let facility = Facility::find_by_id(facility_id)
        .one(db).await?
        .ok_or_else(|| PayrollError::not_found("facility", facility_id))?;

    let in_month = Activity::find()
        .filter(activity::Column::EmployeeId.eq(employee_id))
        .filter(activity::Column::FacilityId.eq(facility_id))
        .filter(activity::Column::Date.between(month, utils::end_of_month(month)));

    let rentals = in_month.clone().count(db).await?;
    let insurance_sales = in_month
        .filter(activity::Column::HasInsurance.eq(true))
        .count(db).await?;

    Ok(PerformanceSnapshot {
        month,
        rentals: u32::try_from(rentals).unwrap_or(u32::MAX),
        rental_goal: u32::try_from(facility.monthly_rental_goal).unwrap_or(0),
        insurance_sales: u32::try_from(insurance_sales).unwrap_or(u32::MAX),
        hire_date: employee.hire_date,
    })
}

/// Latest revision of the bonus rows for one employee, facility and month
pub async fn latest_revision(db: &impl ConnectionTrait, employee_id: &str, facility_id: &str, month: NaiveDate) -> Result<Vec<bonus_record::Model>> {
    let Some(latest) = BonusRecord::find()
        .filter(bonus_record::Column::EmployeeId.eq(employee_id))
        .filter(bonus_record::Column::FacilityId.eq(facility_id))
        .filter(bonus_record::Column::Month.eq(month))
        .order_by_desc(bonus_record::Column::Revision)
        .one(db).await?
    else {
        return Ok(Vec::new());
    };

    Ok(BonusRecord::find()
        .filter(bonus_record::Column::EmployeeId.eq(employee_id))
        .filter(bonus_record::Column::FacilityId.eq(facility_id))
        .filter(bonus_record::Column::Month.eq(month))
        .filter(bonus_record::Column::Revision.eq(latest.revision))
        .order_by_asc(bonus_record::Column::Label)
        .all(db).await?)
}

/// Appends `calculation` as the next revision. The revision is dated at
/// month end and belongs to the pay period covering that day, which has to
/// be open unless nothing changed.
pub async fn record_bonuses(db: &DatabaseConnection, calculation: &BonusCalculation) -> Result<Vec<bonus_record::Model>> {
    let BonusCalculation { employee_id, facility_id, month, .. } = calculation;

    let txn = db.begin().await?;

    // Writers of the same employee's revisions queue up here
    Employee::find_by_id(employee_id.as_str())
        .lock_exclusive()
        .one(&txn).await?
        .ok_or_else(|| PayrollError::not_found("employee", employee_id.as_str()))?;

    let latest = latest_revision(&txn, employee_id, facility_id, *month).await?;

    let mut breakdown = calculation.breakdown.clone();
    if breakdown.is_empty() && !latest.is_empty() {
        // An empty revision would be invisible, supersede with an explicit zero
        breakdown.push(BonusComponent {
            bonus_type: BonusType::Monthly,
            label: "No bonus earned".to_string(),
            amount: 0,
        });
    }

    if same_breakdown(&latest, &breakdown) {
        debug!(%employee_id, %facility_id, %month, "Bonus breakdown unchanged");
        return Ok(latest);
    }

    let date = utils::end_of_month(*month);
    if let Some(period) = PayPeriod::find()
        .filter(pay_period::Column::StartDate.lte(date))
        .filter(pay_period::Column::EndDate.gte(date))
        .lock_shared()
        .one(&txn).await?
    {
        let open = match period.status {
            PayPeriodStatus::Draft => true,
            PayPeriodStatus::Processing => period.resume_status == Some(PayPeriodStatus::Draft),
            PayPeriodStatus::Committed | PayPeriodStatus::Paid => false,
        };

        if !open {
            return Err(PayrollError::State { period_id: period.id, actual: period.status, expected: "draft" });
        }
    }

    let revision = latest.first().map_or(1, |r| r.revision + 1);
    let now = Local::now().fixed_offset();

    let mut records = Vec::with_capacity(breakdown.len());
    for component in breakdown {
        let record = bonus_record::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            employee_id: Set(employee_id.clone()),
            facility_id: Set(facility_id.clone()),
            bonus_type: Set(component.bonus_type),
            label: Set(component.label),
            amount: Set(component.amount),
            month: Set(*month),
            date: Set(date),
            revision: Set(revision),
        }
        .insert(&txn).await
        .map_err(|err| revision_conflict(err, calculation))?;

        records.push(record);
    }

    txn.commit().await?;

    info!(%employee_id, %facility_id, %month, revision, "Bonus breakdown recorded");

    records.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(records)
}

/// Another writer took the same revision number first
fn revision_conflict(err: DbErr, calculation: &BonusCalculation) -> PayrollError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => PayrollError::ConcurrencyConflict {
            entity: "bonus revision",
            id: format!("{}/{}/{}", calculation.employee_id, calculation.facility_id, calculation.month),
        },
        _ => err.into(),
    }
}

fn same_breakdown(records: &[bonus_record::Model], breakdown: &[BonusComponent]) -> bool {
    let mut recorded = records.iter()
        .map(|r| (r.bonus_type, r.label.as_str(), r.amount))
        .collect::<Vec<_>>();
    let mut computed = breakdown.iter()
        .map(|c| (c.bonus_type, c.label.as_str(), c.amount))
        .collect::<Vec<_>>();

    recorded.sort();
    computed.sort();

    recorded == computed
}
