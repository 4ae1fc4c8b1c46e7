use actix_web::{get, http::header, web, HttpResponse, Responder};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::{
    entity::user,
    export::{self, ExportFormat},
    policy::{self, Operation, Relation},
    report,
};

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(rental_report);
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    start: NaiveDate,
    end: NaiveDate,
    /// Header-first rows when absent
    format: Option<ExportFormat>,
}

#[derive(Debug, Serialize)]
struct TabularReport {
    rows: Vec<Vec<serde_json::Value>>,
}

#[get("/rentals")]
async fn rental_report(db: web::Data<DatabaseConnection>, user: user::Model, query: web::Query<ReportQuery>) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::ViewReports)?;

    let totals = report::rental_report(db.get_ref(), query.start, query.end).await?;

    let Some(format) = query.format else {
        return Ok(HttpResponse::Ok().json(TabularReport { rows: export::rows(&totals) }));
    };

    policy::require(&user, Relation::Organization, Operation::ExportReports)?;

    let filename = format!("rentals-{}-{}.{}", query.start, query.end, format.extension());

    Ok(
        HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, format.content_type()))
            .insert_header((header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")))
            .body(export::render(format, &totals)?)
    )
}
