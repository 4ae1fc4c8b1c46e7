//! CSV, JSON and clipboard renderings of tabular data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::Result, payroll::aggregate::PayrollRecord, utils};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    #[default]
    Json,
    /// Tab-delimited, pastes straight into a spreadsheet
    Clipboard,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Clipboard => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Clipboard => "txt",
        }
    }
}

/// Something that renders as one row under a fixed header.
pub trait Tabular {
    fn header() -> &'static [&'static str];

    fn row(&self) -> Vec<Value>;
}

/// Header first, then one row per item
pub fn rows<T: Tabular>(items: &[T]) -> Vec<Vec<Value>> {
    let header = T::header().iter().map(|h| Value::from(*h)).collect();

    std::iter::once(header)
        .chain(items.iter().map(T::row))
        .collect()
}

pub fn render<T: Tabular + Serialize>(format: ExportFormat, items: &[T]) -> Result<String> {
    Ok(match format {
        ExportFormat::Csv => to_csv(items),
        ExportFormat::Json => serde_json::to_string_pretty(items)?,
        ExportFormat::Clipboard => to_clipboard(items),
    })
}

pub fn to_csv<T: Tabular>(items: &[T]) -> String {
    rows(items).iter()
        .map(|row| row.iter().map(|cell| csv_field(&cell_text(cell))).collect::<Vec<_>>().join(","))
        .map(|line| line + "\r\n")
        .collect()
}

pub fn to_clipboard<T: Tabular>(items: &[T]) -> String {
    rows(items).iter()
        .map(|row| row.iter()
            .map(|cell| cell_text(cell).replace(['\t', '\r', '\n'], " "))
            .collect::<Vec<_>>()
            .join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

impl Tabular for PayrollRecord {
    fn header() -> &'static [&'static str] {
        &[
            "Employee",
            "Pay Period",
            "Commission",
            "Commission Count",
            "Monthly Bonus",
            "Christmas Bonus",
            "Vacation Hours",
            "Holiday Hours",
            "Mileage",
            "Hours Pay",
            "Total Pay",
            "Unpaid Commissions",
        ]
    }

    fn row(&self) -> Vec<Value> {
        vec![
            self.employee_id.clone().into(),
            self.pay_period_id.clone().into(),
            utils::format_cents(self.commission).into(),
            self.commission_count.into(),
            utils::format_cents(self.monthly_bonus).into(),
            utils::format_cents(self.christmas_bonus).into(),
            self.vacation_hours.into(),
            self.holiday_hours.into(),
            utils::format_cents(self.mileage).into(),
            utils::format_cents(self.hours_pay).into(),
            utils::format_cents(self.total_pay).into(),
            self.unpaid_commission_count.into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Unit {
        name: String,
        rent: i64,
    }

    impl Tabular for Unit {
        fn header() -> &'static [&'static str] {
            &["Unit", "Rent"]
        }

        fn row(&self) -> Vec<Value> {
            vec![self.name.clone().into(), self.rent.into()]
        }
    }

    fn units() -> Vec<Unit> {
        vec![
            Unit { name: "A-1".into(), rent: 95 },
            Unit { name: "Drive-up, \"large\"".into(), rent: 180 },
        ]
    }

    #[test]
    fn test_csv_quotes_when_needed() {
        assert_eq!(to_csv(&units()), "Unit,Rent\r\nA-1,95\r\n\"Drive-up, \"\"large\"\"\",180\r\n");
    }

    #[test]
    fn test_clipboard_is_tab_delimited() {
        let units = vec![Unit { name: "A\t1".into(), rent: 95 }];

        assert_eq!(to_clipboard(&units), "Unit\tRent\nA 1\t95");
    }

    #[test]
    fn test_json_is_an_array() {
        let rendered = render(ExportFormat::Json, &units()).unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed[1], json!({ "name": "Drive-up, \"large\"", "rent": 180 }));
        assert!(rendered.contains('\n'));
    }

    #[test]
    fn test_rows_start_with_header() {
        let rows = rows(&units());

        assert_eq!(rows[0], vec![json!("Unit"), json!("Rent")]);
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_payroll_record_row() {
        let record = PayrollRecord::from_line_items("E101", "PP-2024-03-01", Vec::new(), 2);
        let row = record.row();

        assert_eq!(row.len(), PayrollRecord::header().len());
        assert_eq!(row[2], json!("0.00"));
        assert_eq!(row[11], json!(2));
    }
}
