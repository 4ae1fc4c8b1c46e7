//! Splits payroll by facility, for one employee or a manager's team.

use std::collections::{BTreeMap, HashMap};

use sea_orm::{ColumnTrait as _, ConnectionTrait, DatabaseConnection, EntityTrait as _, QueryFilter as _, QueryOrder as _};
use serde::Serialize;

use crate::{
    entity::{employee, facility, pay_period, prelude::*},
    error::Result,
    payroll::aggregate::{self, LineItem, PayrollRecord},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayTotals {
    pub commission: i64,
    pub commission_count: u64,
    pub monthly_bonus: i64,
    pub christmas_bonus: i64,
    pub vacation_hours: f64,
    pub holiday_hours: f64,
    pub mileage: i64,
    pub hours_pay: i64,
    pub total_pay: i64,
}

impl From<&PayrollRecord> for PayTotals {
    fn from(record: &PayrollRecord) -> Self {
        Self {
            commission: record.commission,
            commission_count: record.commission_count,
            monthly_bonus: record.monthly_bonus,
            christmas_bonus: record.christmas_bonus,
            vacation_hours: record.vacation_hours,
            holiday_hours: record.holiday_hours,
            mileage: record.mileage,
            hours_pay: record.hours_pay,
            total_pay: record.total_pay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityShare {
    pub facility_id: String,
    pub abbreviation: String,
    pub name: String,
    #[serde(flatten)]
    pub totals: PayTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRollup {
    pub employee_id: String,
    pub pay_period_id: String,
    pub unpaid_commission_count: u64,
    #[serde(flatten)]
    pub totals: PayTotals,
    pub facilities: Vec<FacilityShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRollup {
    pub manager_id: String,
    pub pay_period_id: String,
    #[serde(flatten)]
    pub totals: PayTotals,
    pub employees: Vec<EmployeeRollup>,
    /// Whole team, per facility
    pub facilities: Vec<FacilityShare>,
}

pub async fn rollup_employee(db: &DatabaseConnection, employee_id: &str, period: &pay_period::Model) -> Result<EmployeeRollup> {
    let txn = aggregate::snapshot(db).await?;

    let record = aggregate::aggregate_in(&txn, employee_id, period).await?;
    let facilities = facilities(&txn).await?;

    txn.commit().await?;

    Ok(rollup(&record, &facilities))
}

/// Rollup of every direct report of `manager_id`
pub async fn rollup_team(db: &DatabaseConnection, manager_id: &str, period: &pay_period::Model) -> Result<TeamRollup> {
    let txn = aggregate::snapshot(db).await?;

    let team = Employee::find()
        .filter(employee::Column::ManagerId.eq(manager_id))
        .order_by_asc(employee::Column::Id)
        .all(&txn).await?;

    let mut records = Vec::with_capacity(team.len());
    for member in &team {
        records.push(aggregate::aggregate_in(&txn, &member.id, period).await?);
    }

    let facilities = facilities(&txn).await?;

    txn.commit().await?;

    let line_items = records.iter()
        .flat_map(|record| record.line_items.iter().cloned())
        .collect::<Vec<_>>();
    let team_record = PayrollRecord::from_line_items(manager_id, &period.id, line_items, 0);

    Ok(TeamRollup {
        manager_id: manager_id.to_string(),
        pay_period_id: period.id.clone(),
        totals: PayTotals::from(&team_record),
        employees: records.iter().map(|record| rollup(record, &facilities)).collect(),
        facilities: split_by_facility(&team_record, &facilities),
    })
}

pub fn rollup(record: &PayrollRecord, facilities: &HashMap<String, facility::Model>) -> EmployeeRollup {
    EmployeeRollup {
        employee_id: record.employee_id.clone(),
        pay_period_id: record.pay_period_id.clone(),
        unpaid_commission_count: record.unpaid_commission_count,
        totals: PayTotals::from(record),
        facilities: split_by_facility(record, facilities),
    }
}

/// Per-facility totals, ordered by facility id. They sum to the record's totals.
pub fn split_by_facility(record: &PayrollRecord, facilities: &HashMap<String, facility::Model>) -> Vec<FacilityShare> {
    let mut grouped = BTreeMap::<&str, Vec<LineItem>>::new();
    for item in &record.line_items {
        grouped.entry(item.facility_id()).or_default().push(item.clone());
    }

    grouped.into_iter()
        .map(|(facility_id, items)| {
            let share = PayrollRecord::from_line_items(&record.employee_id, &record.pay_period_id, items, 0);
            let (abbreviation, name) = facilities.get(facility_id)
                .map(|f| (f.abbreviation.clone(), f.name.clone()))
                .unwrap_or_else(|| (facility_id.to_string(), facility_id.to_string()));

            FacilityShare {
                facility_id: facility_id.to_string(),
                abbreviation,
                name,
                totals: PayTotals::from(&share),
            }
        })
        .collect()
}

async fn facilities(db: &impl ConnectionTrait) -> Result<HashMap<String, facility::Model>> {
    Ok(Facility::find()
        .all(db).await?
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect())
}

#[cfg(test)]
mod tests {
    use crate::{
        entity::sea_orm_active_enums::BonusType,
        payroll::{assignment, period},
        testing::{self, date, setup_db},
    };

    use super::*;

    fn commission(activity_id: &str, facility_id: &str, amount: i64) -> LineItem {
        LineItem::Commission {
            activity_id: activity_id.into(),
            facility_id: facility_id.into(),
            date: date(2024, 3, 1),
            unit_name: "A-1".into(),
            tenant_name: "Jane Tenant".into(),
            has_insurance: true,
            amount,
        }
    }

    #[test]
    fn test_split_sums_to_total() {
        let record = PayrollRecord::from_line_items("E101", "PP-2024-03-01", vec![
            commission("a1", "whb", 25_00),
            commission("a2", "nrt", 40_00),
            commission("a3", "whb", 10_00),
            LineItem::Bonus { facility_id: "nrt".into(), bonus_type: BonusType::Monthly, label: "goal".into(), month: date(2024, 3, 1), amount: 50_00 },
            LineItem::Mileage { facility_id: "gone".into(), amount: 3_00 },
        ], 0);

        let shares = split_by_facility(&record, &HashMap::new());

        assert_eq!(shares.iter().map(|s| s.facility_id.as_str()).collect::<Vec<_>>(), ["gone", "nrt", "whb"]);
        assert_eq!(shares.iter().map(|s| s.totals.total_pay).sum::<i64>(), record.total_pay);
        assert_eq!(shares[1].totals.monthly_bonus, 50_00);
        assert_eq!(shares[2].totals.commission_count, 2);

        // Unknown facilities fall back to their id for display
        assert_eq!(shares[0].abbreviation, "gone");
    }

    #[actix_web::test]
    async fn test_team_rollup() {
        let db = setup_db().await;
        testing::facility(&db, "whb", 10).await;
        testing::facility(&db, "nrt", 10).await;
        testing::employee(&db, "M1", Some("whb"), None).await;
        testing::employee(&db, "E101", Some("whb"), Some("M1")).await;
        testing::employee(&db, "E102", Some("nrt"), Some("M1")).await;
        testing::employee(&db, "E103", Some("nrt"), None).await;

        testing::activity(&db, "a1", "E101", "whb", date(2024, 3, 2), 25_00).await;
        testing::activity(&db, "a2", "E101", "nrt", date(2024, 3, 3), 30_00).await;
        testing::activity(&db, "a3", "E102", "nrt", date(2024, 3, 4), 40_00).await;
        testing::activity(&db, "a4", "E103", "nrt", date(2024, 3, 4), 99_00).await;

        let march = period::create_period(&db, date(2024, 3, 1), date(2024, 3, 31)).await.unwrap();
        let ids = ["a1", "a2", "a3", "a4"].map(String::from);
        assignment::assign(&db, &ids, &march.id).await.unwrap();

        let mine = rollup_employee(&db, "E101", &march).await.unwrap();
        assert_eq!(mine.totals.total_pay, 55_00);
        assert_eq!(mine.facilities.len(), 2);
        assert_eq!(mine.facilities[0].abbreviation, "NRT");
        assert_eq!(mine.facilities[0].name, "nrt Self Storage");

        let team = rollup_team(&db, "M1", &march).await.unwrap();
        assert_eq!(team.employees.iter().map(|e| e.employee_id.as_str()).collect::<Vec<_>>(), ["E101", "E102"]);
        assert_eq!(team.totals.total_pay, 95_00);
        assert_eq!(team.facilities.iter().map(|f| (f.facility_id.as_str(), f.totals.total_pay)).collect::<Vec<_>>(), [
            ("nrt", 70_00),
            ("whb", 25_00),
        ]);
    }
}
