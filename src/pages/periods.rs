use actix_web::{dev, get, http::header, post, put, web, FromRequest, HttpRequest, HttpResponse, Responder};
use chrono::Local;
use futures_util::future::LocalBoxFuture;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::{
    entity::{activity, pay_period, prelude::*, sea_orm_active_enums::RoleType, user},
    error::PayrollError,
    export,
    payroll::{
        aggregate::{self, PayrollData, PayrollRecord},
        assignment,
        fixed_pay::{self, FixedPayInput},
        period::{self, PeriodFilter},
        rollup,
    },
    policy::{self, Operation, Relation},
};

use extractor::CurrentPeriod;
use model::*;

mod extractor;
mod model;

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(list_periods)
        .service(create_period)
        .service(current_period)
        .service(get_period)
        .service(commit_period)
        .service(mark_period_paid)
        .service(release_period)
        .service(get_payroll)
        .service(export_payroll)
        .service(add_commissions)
        .service(put_fixed_pay)
        .service(get_rollup)
        .service(get_team);
}

#[get("")]
async fn list_periods(db: web::Data<DatabaseConnection>, _user: user::Model, filter: web::Query<PeriodFilter>) -> actix_web::Result<impl Responder> {
    Ok(web::Json(period::list(db.get_ref(), &filter).await?))
}

#[post("")]
async fn create_period(db: web::Data<DatabaseConnection>, user: user::Model, payload: web::Json<CreatePeriod>) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::ManagePeriods)?;

    let period = period::create_period(db.get_ref(), payload.start_date, payload.end_date).await?;

    Ok(
        HttpResponse::Created()
            .json(web::Json(period))
    )
}

#[get("/current")]
async fn current_period(_user: user::Model, period: CurrentPeriod) -> impl Responder {
    web::Json(period.0)
}

#[get("/{period_id}")]
async fn get_period(_user: user::Model, period: pay_period::Model) -> impl Responder {
    web::Json(period)
}

#[post("/{period_id}/commit")]
async fn commit_period(db: web::Data<DatabaseConnection>, user: user::Model, period_id: web::Path<String>) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::ManagePeriods)?;

    Ok(web::Json(period::commit(db.get_ref(), &period_id).await?))
}

#[post("/{period_id}/paid")]
async fn mark_period_paid(db: web::Data<DatabaseConnection>, user: user::Model, period_id: web::Path<String>) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::ManagePeriods)?;

    Ok(web::Json(period::mark_paid(db.get_ref(), &period_id).await?))
}

/// Returns a period stuck in `processing` to where it was before the batch
#[post("/{period_id}/release")]
async fn release_period(db: web::Data<DatabaseConnection>, user: user::Model, period_id: web::Path<String>) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::ManagePeriods)?;

    Ok(web::Json(period::finish_processing(db.get_ref(), &period_id).await?))
}

/// Everyone's payroll for the period, narrowed to what the caller may see
#[get("/{period_id}/payroll")]
async fn get_payroll(db: web::Data<DatabaseConnection>, user: user::Model, period_id: web::Path<String>) -> actix_web::Result<impl Responder> {
    let records = match aggregate::get_employee_payroll_data(db.get_ref(), &period_id).await? {
        PayrollData::NoData => return Ok(web::Json(PayrollResponse { final_result: Vec::new(), no_data: true })),
        PayrollData::Records(records) => records,
    };

    let mut visible = Vec::with_capacity(records.len());
    for record in records {
        if can_view(db.get_ref(), &user, &record).await? {
            visible.push(record);
        }
    }

    Ok(web::Json(PayrollResponse { final_result: visible, no_data: false }))
}

/// The visible slice of the payroll as a download
#[get("/{period_id}/payroll/export")]
async fn export_payroll(
    db: web::Data<DatabaseConnection>,
    user: user::Model,
    period_id: web::Path<String>,
    query: web::Query<ExportQuery>,
) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::ExportReports)?;

    let records = match aggregate::get_employee_payroll_data(db.get_ref(), &period_id).await? {
        PayrollData::NoData => Vec::new(),
        PayrollData::Records(records) => records,
    };

    let mut visible = Vec::with_capacity(records.len());
    for record in records {
        if can_view(db.get_ref(), &user, &record).await? {
            visible.push(record);
        }
    }

    Ok(
        HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, query.format.content_type()))
            .insert_header((header::CONTENT_DISPOSITION, format!("attachment; filename=\"payroll-{period_id}.{}\"", query.format.extension())))
            .body(export::render(query.format, &visible)?)
    )
}

async fn can_view(db: &DatabaseConnection, user: &user::Model, record: &PayrollRecord) -> Result<bool, PayrollError> {
    let relation = match user.role {
        RoleType::Admin => Relation::Other,
        _ => policy::relation_to(db, user, &record.employee_id).await?,
    };

    Ok(policy::can_perform(user.role, relation).contains(&Operation::ViewPayroll))
}

/// Always answers with an outcome, failures included
#[post("/{period_id}/commissions")]
async fn add_commissions(
    db: web::Data<DatabaseConnection>,
    user: user::Model,
    period_id: web::Path<String>,
    payload: web::Json<AddCommissions>,
) -> actix_web::Result<impl Responder> {
    if user.role != RoleType::Admin {
        let owners = Activity::find()
            .select_only()
            .column(activity::Column::EmployeeId)
            .distinct()
            .filter(activity::Column::Id.is_in(payload.activity_ids.iter().map(String::as_str)))
            .into_tuple::<String>()
            .all(db.get_ref()).await
            .map_err(PayrollError::from)?;

        for employee_id in &owners {
            policy::require_for(db.get_ref(), &user, employee_id, Operation::AssignCommissions).await?;
        }
    }

    let outcome = assignment::add_unpaid_commissions_to_payroll(db.get_ref(), &payload.activity_ids, &period_id).await;

    Ok(web::Json(outcome))
}

#[put("/{period_id}/fixed-pay")]
async fn put_fixed_pay(
    db: web::Data<DatabaseConnection>,
    user: user::Model,
    period_id: web::Path<String>,
    payload: web::Json<FixedPayRequest>,
) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::ManagePeriods)?;

    let payload = payload.into_inner();
    let model = fixed_pay::record_fixed_pay(db.get_ref(), FixedPayInput {
        employee_id: payload.employee_id,
        pay_period_id: period_id.into_inner(),
        facility_id: payload.facility_id,
        vacation_hours: payload.vacation_hours,
        holiday_hours: payload.holiday_hours,
        mileage_amount: payload.mileage_amount,
        hourly_rate: payload.hourly_rate,
    }).await?;

    Ok(web::Json(model))
}

#[get("/{period_id}/rollup/{employee_id}")]
async fn get_rollup(
    db: web::Data<DatabaseConnection>,
    user: user::Model,
    period: pay_period::Model,
    path: web::Path<(String, String)>,
) -> actix_web::Result<impl Responder> {
    let (_, employee_id) = path.into_inner();
    policy::require_for(db.get_ref(), &user, &employee_id, Operation::ViewPayroll).await?;

    Ok(web::Json(rollup::rollup_employee(db.get_ref(), &employee_id, &period).await?))
}

#[get("/{period_id}/team/{manager_id}")]
async fn get_team(
    db: web::Data<DatabaseConnection>,
    user: user::Model,
    period: pay_period::Model,
    path: web::Path<(String, String)>,
) -> actix_web::Result<impl Responder> {
    let (_, manager_id) = path.into_inner();

    // A manager looks at their team through their direct reports
    let relation = match user.employee_id.as_deref() {
        Some(own_id) if own_id == manager_id => Relation::DirectReport,
        _ => Relation::Other,
    };
    policy::require(&user, relation, Operation::ViewPayroll)?;

    Ok(web::Json(rollup::rollup_team(db.get_ref(), &manager_id, &period).await?))
}

#[cfg(test)]
mod tests {
    use actix_web::{http::{Method, StatusCode}, test, App};
    use serde_json::{json, Value};

    use crate::{
        auth::Authority,
        entity::sea_orm_active_enums::PayPeriodStatus,
        testing::{self, bearer, date, setup_db},
    };

    use super::*;

    async fn seeded() -> (web::Data<DatabaseConnection>, user::Model, user::Model, user::Model) {
        let db = web::Data::new(setup_db().await);
        testing::facility(&db, "whb", 10).await;
        testing::employee(&db, "M1", Some("whb"), None).await;
        testing::employee(&db, "E101", Some("whb"), Some("M1")).await;
        testing::employee(&db, "E102", Some("whb"), None).await;
        for id in ["id1", "id2", "id3"] {
            testing::activity(&db, id, "E101", "whb", date(2024, 3, 4), 25_00).await;
        }
        testing::activity(&db, "other", "E102", "whb", date(2024, 3, 4), 40_00).await;

        let admin = testing::seeded_admin(&db).await;
        let manager = testing::user(&db, "manager", RoleType::Manager, Some("M1")).await;
        let employee = testing::user(&db, "e101", RoleType::Employee, Some("E101")).await;

        (db, admin, manager, employee)
    }

    macro_rules! app {
        ($db:expr) => {
            test::init_service(
                App::new()
                    .app_data($db.clone())
                    .app_data(web::Data::new(Authority::new(testing::SECRET)))
                    .service(web::scope("/periods").configure(config))
            ).await
        };
    }

    #[actix_web::test]
    async fn test_period_lifecycle() {
        let (db, admin, _, employee) = seeded().await;
        let app = app!(db);

        let req = test::TestRequest::default()
            .uri("/periods")
            .method(Method::POST)
            .insert_header(bearer(&employee))
            .set_json(json!({ "startDate": "2024-03-01", "endDate": "2024-03-31" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::default()
            .uri("/periods")
            .method(Method::POST)
            .insert_header(bearer(&admin))
            .set_json(json!({ "startDate": "2024-03-01", "endDate": "2024-03-31" }))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let req = test::TestRequest::default()
            .uri("/periods")
            .method(Method::POST)
            .insert_header(bearer(&admin))
            .set_json(json!({ "startDate": "2024-03-15", "endDate": "2024-04-15" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/paid")
            .method(Method::POST)
            .insert_header(bearer(&admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/commit")
            .method(Method::POST)
            .insert_header(bearer(&admin))
            .to_request();
        let committed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(committed["status"], "committed");

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01")
            .insert_header(bearer(&employee))
            .to_request();
        let fetched: pay_period::Model = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched.version, 1);

        let req = test::TestRequest::default()
            .uri("/periods/PP-1999-01-01")
            .insert_header(bearer(&employee))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_release_stuck_period() {
        let (db, admin, manager, _) = seeded().await;
        let march = period::create_period(&db, date(2024, 3, 1), date(2024, 3, 31)).await.unwrap();
        period::begin_processing(&db, &march.id).await.unwrap();
        let app = app!(db);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/release")
            .method(Method::POST)
            .insert_header(bearer(&manager))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/release")
            .method(Method::POST)
            .insert_header(bearer(&admin))
            .to_request();
        let released: pay_period::Model = test::call_and_read_body_json(&app, req).await;
        assert_eq!(released.status, PayPeriodStatus::Draft);
        assert_eq!(released.resume_status, None);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/release")
            .method(Method::POST)
            .insert_header(bearer(&admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn test_add_commissions_reports_outcome() {
        let (db, admin, manager, employee) = seeded().await;
        period::create_period(&db, date(2024, 3, 1), date(2024, 3, 31)).await.unwrap();
        let app = app!(db);

        // Employees cannot assign, not even their own
        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/commissions")
            .method(Method::POST)
            .insert_header(bearer(&employee))
            .set_json(json!({ "activityIds": ["id1"] }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        // Managers only for their direct reports
        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/commissions")
            .method(Method::POST)
            .insert_header(bearer(&manager))
            .set_json(json!({ "activityIds": ["other"] }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/commissions")
            .method(Method::POST)
            .insert_header(bearer(&manager))
            .set_json(json!({ "activityIds": ["id1", "id2"] }))
            .to_request();
        let outcome: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome["success"], true);

        // A failure is still a 200 with the reason in the body
        let req = test::TestRequest::default()
            .uri("/periods/PP-1999-01-01/commissions")
            .method(Method::POST)
            .insert_header(bearer(&admin))
            .set_json(json!({ "activityIds": ["id3"] }))
            .to_request();
        let outcome: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(outcome["success"], false);
        assert!(outcome["message"].as_str().unwrap().contains("not found"));
    }

    #[actix_web::test]
    async fn test_payroll_visibility() {
        let (db, admin, manager, employee) = seeded().await;
        let march = period::create_period(&db, date(2024, 3, 1), date(2024, 3, 31)).await.unwrap();
        let app = app!(db);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/payroll")
            .insert_header(bearer(&admin))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "finalResult": [], "noData": true }));

        assignment::assign(&db, &["id1".into(), "id2".into(), "other".into()], &march.id).await.unwrap();

        let ids = |body: &Value| body["finalResult"].as_array().unwrap().iter()
            .map(|r| r["employeeId"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();

        for (user, expected) in [(&admin, vec!["E101", "E102"]), (&manager, vec!["E101"]), (&employee, vec!["E101"])] {
            let req = test::TestRequest::default()
                .uri("/periods/PP-2024-03-01/payroll")
                .insert_header(bearer(user))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(ids(&body), expected);
        }

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/payroll")
            .insert_header(bearer(&employee))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["finalResult"][0]["commissionCount"], 2);
        assert_eq!(body["finalResult"][0]["unpaidCommissionCount"], 1);
    }

    #[actix_web::test]
    async fn test_payroll_export() {
        let (db, _, manager, employee) = seeded().await;
        let march = period::create_period(&db, date(2024, 3, 1), date(2024, 3, 31)).await.unwrap();
        assignment::assign(&db, &["id1".into(), "id2".into(), "other".into()], &march.id).await.unwrap();
        let app = app!(db);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/payroll/export?format=csv")
            .insert_header(bearer(&employee))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/payroll/export?format=csv")
            .insert_header(bearer(&manager))
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-disposition").unwrap(),
            "attachment; filename=\"payroll-PP-2024-03-01.csv\"",
        );

        let body = test::read_body(response).await;
        let lines = String::from_utf8_lossy(&body).split("\r\n").map(str::to_string).collect::<Vec<_>>();
        assert!(lines[0].starts_with("Employee,Pay Period,Commission,"));
        assert!(lines[1].starts_with("E101,PP-2024-03-01,50.00,2,"));
        // Header, E101, trailing empty
        assert_eq!(lines.len(), 3);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/payroll/export")
            .insert_header(bearer(&manager))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["employeeId"], "E101");
    }

    #[actix_web::test]
    async fn test_rollup_and_team_access() {
        let (db, admin, manager, employee) = seeded().await;
        let march = period::create_period(&db, date(2024, 3, 1), date(2024, 3, 31)).await.unwrap();
        assignment::assign(&db, &["id1".into()], &march.id).await.unwrap();
        let app = app!(db);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/rollup/E101")
            .insert_header(bearer(&employee))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["totalPay"], 25_00);
        assert_eq!(body["facilities"][0]["abbreviation"], "WHB");

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/rollup/E102")
            .insert_header(bearer(&employee))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/team/M1")
            .insert_header(bearer(&manager))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["employees"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/team/M1")
            .insert_header(bearer(&employee))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/fixed-pay")
            .method(Method::PUT)
            .insert_header(bearer(&admin))
            .set_json(json!({ "employeeId": "E101", "facilityId": "whb", "mileageAmount": 12_00 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::default()
            .uri("/periods/PP-2024-03-01/rollup/E101")
            .insert_header(bearer(&admin))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["totalPay"], 37_00);
    }
}
