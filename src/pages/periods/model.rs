use chrono::NaiveDate;

use crate::export::ExportFormat;

use super::*;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreatePeriod {
    pub(super) start_date: NaiveDate,
    pub(super) end_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddCommissions {
    pub(super) activity_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FixedPayRequest {
    pub(super) employee_id: String,
    pub(super) facility_id: String,
    #[serde(default)]
    pub(super) vacation_hours: f64,
    #[serde(default)]
    pub(super) holiday_hours: f64,
    /// Cents
    #[serde(default)]
    pub(super) mileage_amount: i64,
    /// Cents per hour
    pub(super) hourly_rate: Option<i64>,
}

/// `NoData` is an answer, not an error, so it is spelled out
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PayrollResponse {
    pub(super) final_result: Vec<PayrollRecord>,
    pub(super) no_data: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ExportQuery {
    #[serde(default)]
    pub(super) format: ExportFormat,
}
