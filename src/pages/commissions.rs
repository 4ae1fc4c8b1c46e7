use actix_web::{get, post, web, HttpResponse, Responder};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::{
    entity::user,
    payroll::{assignment, ledger::{self, NewActivity, UnassignedFilter}},
    policy::{self, Operation, Relation},
};

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(list_unassigned)
        .service(record_activity)
        .service(reassign_activity);
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reassign {
    pay_period_id: String,
}

/// Unpaid commissions. Filtering by employee narrows the check to that employee.
#[get("/unassigned")]
async fn list_unassigned(db: web::Data<DatabaseConnection>, user: user::Model, filter: web::Query<UnassignedFilter>) -> actix_web::Result<impl Responder> {
    match &filter.employee_id {
        Some(employee_id) => policy::require_for(db.get_ref(), &user, employee_id, Operation::ViewPayroll).await?,
        None => policy::require(&user, Relation::Organization, Operation::AssignCommissions)?,
    }

    Ok(web::Json(ledger::list_unassigned(db.get_ref(), &filter).await?))
}

#[post("")]
async fn record_activity(db: web::Data<DatabaseConnection>, user: user::Model, payload: web::Json<NewActivity>) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::ManagePeriods)?;

    let activity = ledger::record_activity(db.get_ref(), payload.into_inner()).await?;

    Ok(
        HttpResponse::Created()
            .json(web::Json(activity))
    )
}

#[post("/{activity_id}/reassign")]
async fn reassign_activity(
    db: web::Data<DatabaseConnection>,
    user: user::Model,
    activity_id: web::Path<String>,
    payload: web::Json<Reassign>,
) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::ManagePeriods)?;

    Ok(web::Json(assignment::reassign(db.get_ref(), &activity_id, &payload.pay_period_id).await?))
}
