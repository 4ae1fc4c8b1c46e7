//! Move-in funnel totals for management reporting.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use sea_orm::{ColumnTrait as _, DatabaseConnection, EntityTrait as _, QueryFilter as _};
use serde::Serialize;
use serde_json::Value;

use crate::{
    entity::{prelude::*, rental_stat},
    error::{PayrollError, Result},
    export::Tabular,
};

pub const RENTAL_REPORT_HEADER: [&str; 7] = [
    "Facility",
    "SitelinkId",
    "Month",
    "Discount Plan",
    "Inquiries",
    "Rentals",
    "Cancellations",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalTotals {
    pub facility: String,
    pub sitelink_id: String,
    /// `YYYY-MM`
    pub month: String,
    pub discount_plan: String,
    pub inquiries: i64,
    pub rentals: i64,
    pub cancellations: i64,
}

impl Tabular for RentalTotals {
    fn header() -> &'static [&'static str] {
        &RENTAL_REPORT_HEADER
    }

    fn row(&self) -> Vec<Value> {
        vec![
            self.facility.clone().into(),
            self.sitelink_id.clone().into(),
            self.month.clone().into(),
            self.discount_plan.clone().into(),
            self.inquiries.into(),
            self.rentals.into(),
            self.cancellations.into(),
        ]
    }
}

/// Totals per facility, month and discount plan over `[start, end]`.
/// Missing figures count as zero.
pub async fn rental_report(db: &DatabaseConnection, start: NaiveDate, end: NaiveDate) -> Result<Vec<RentalTotals>> {
    if end < start {
        return Err(PayrollError::Validation(format!("report ends ({end}) before it starts ({start})")));
    }

    let stats = RentalStat::find()
        .filter(rental_stat::Column::Date.between(start, end))
        .all(db).await?;

    let facilities = Facility::find()
        .all(db).await?
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect::<HashMap<_, _>>();

    let mut grouped = BTreeMap::<(String, String, String), RentalTotals>::new();
    for stat in stats {
        let month = stat.date.format("%Y-%m").to_string();
        let key = (stat.facility_id.clone(), month.clone(), stat.discount_plan.clone());

        let totals = grouped.entry(key).or_insert_with(|| {
            let facility = facilities.get(&stat.facility_id);

            RentalTotals {
                facility: facility.map_or_else(|| stat.facility_id.clone(), |f| f.name.clone()),
                sitelink_id: facility.map(|f| f.sitelink_id.clone()).unwrap_or_default(),
                month,
                discount_plan: stat.discount_plan.clone(),
                inquiries: 0,
                rentals: 0,
                cancellations: 0,
            }
        });

        totals.inquiries += i64::from(stat.inquiries.unwrap_or(0));
        totals.rentals += i64::from(stat.rentals.unwrap_or(0));
        totals.cancellations += i64::from(stat.cancellations.unwrap_or(0));
    }

    Ok(grouped.into_values().collect())
}

#[cfg(test)]
mod tests {
    use chrono::Local;
    use sea_orm::{ActiveModelTrait as _, ActiveValue::Set};
    use serde_json::json;

    use crate::{
        export,
        testing::{self, date, setup_db},
    };

    use super::*;

    async fn stat(db: &DatabaseConnection, id: &str, on: NaiveDate, plan: &str, figures: (Option<i32>, Option<i32>, Option<i32>)) {
        rental_stat::ActiveModel {
            id: Set(id.to_string()),
            created_at: Set(Local::now().fixed_offset()),
            updated_at: Set(Local::now().fixed_offset()),
            facility_id: Set("whb".to_string()),
            date: Set(on),
            discount_plan: Set(plan.to_string()),
            inquiries: Set(figures.0),
            rentals: Set(figures.1),
            cancellations: Set(figures.2),
        }
        .insert(db).await.unwrap();
    }

    #[actix_web::test]
    async fn test_rental_report_groups_and_defaults() {
        let db = setup_db().await;
        testing::facility(&db, "whb", 10).await;

        stat(&db, "s1", date(2024, 3, 2), "First month free", (Some(4), Some(2), None)).await;
        stat(&db, "s2", date(2024, 3, 9), "First month free", (Some(1), None, Some(1))).await;
        stat(&db, "s3", date(2024, 3, 9), "None", (None, Some(1), None)).await;
        stat(&db, "s4", date(2024, 4, 1), "None", (Some(7), Some(7), Some(7))).await;
        stat(&db, "s5", date(2024, 5, 1), "None", (Some(9), Some(9), Some(9))).await;

        let report = rental_report(&db, date(2024, 3, 1), date(2024, 4, 30)).await.unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report[0], RentalTotals {
            facility: "whb Self Storage".into(),
            sitelink_id: "SL-whb".into(),
            month: "2024-03".into(),
            discount_plan: "First month free".into(),
            inquiries: 5,
            rentals: 2,
            cancellations: 1,
        });
        assert_eq!((report[1].month.as_str(), report[1].rentals), ("2024-03", 1));
        assert_eq!(report[2].month, "2024-04");

        let rows = export::rows(&report);
        assert_eq!(rows[0], RENTAL_REPORT_HEADER.map(Value::from).to_vec());
        assert_eq!(rows[2], vec![
            json!("whb Self Storage"), json!("SL-whb"), json!("2024-03"), json!("None"), json!(0), json!(1), json!(0),
        ]);
    }

    #[actix_web::test]
    async fn test_rental_report_rejects_inverted_range() {
        let db = setup_db().await;

        let err = rental_report(&db, date(2024, 4, 1), date(2024, 3, 1)).await.unwrap_err();
        assert!(matches!(err, PayrollError::Validation(_)));
    }
}
