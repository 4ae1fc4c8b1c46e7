use actix_web::{get, post, web, HttpResponse, Responder};
use uuid::Uuid;

use crate::{
    entity::user,
    payroll::batch::{BatchOrchestrator, BatchRequest},
    policy::{self, Operation, Relation},
};

pub(super) fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(start_batch)
        .service(get_batch)
        .service(cancel_batch);
}

#[post("")]
async fn start_batch(orchestrator: web::Data<BatchOrchestrator>, user: user::Model, payload: web::Json<BatchRequest>) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::RunBatch)?;

    let operation = orchestrator.start(payload.into_inner()).await?;

    Ok(
        HttpResponse::Accepted()
            .json(web::Json(operation))
    )
}

#[get("/{operation_id}")]
async fn get_batch(orchestrator: web::Data<BatchOrchestrator>, user: user::Model, operation_id: web::Path<Uuid>) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::RunBatch)?;

    Ok(web::Json(orchestrator.get(*operation_id)?))
}

#[post("/{operation_id}/cancel")]
async fn cancel_batch(orchestrator: web::Data<BatchOrchestrator>, user: user::Model, operation_id: web::Path<Uuid>) -> actix_web::Result<impl Responder> {
    policy::require(&user, Relation::Organization, Operation::RunBatch)?;

    Ok(web::Json(orchestrator.cancel(*operation_id)?))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::{http::{Method, StatusCode}, test, App};
    use serde_json::{json, Value};

    use crate::{
        auth::Authority,
        entity::sea_orm_active_enums::RoleType,
        payroll::{batch::BatchSettings, period},
        testing::{self, bearer, date, setup_db},
    };

    use super::*;

    #[actix_web::test]
    async fn test_batch_round_trip() {
        let db = web::Data::new(setup_db().await);
        testing::facility(&db, "whb", 10).await;
        testing::employee(&db, "E101", Some("whb"), None).await;
        let admin = testing::seeded_admin(&db).await;
        let manager = testing::user(&db, "manager", RoleType::Manager, Some("E101")).await;
        period::create_period(&db, date(2024, 3, 1), date(2024, 3, 31)).await.unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(BatchOrchestrator::new(db.clone(), BatchSettings::default())))
                .app_data(web::Data::new(Authority::new(testing::SECRET)))
                .service(web::scope("/batch").configure(config))
        ).await;

        let request = json!({ "type": "export", "payPeriodId": "PP-2024-03-01" });

        let req = test::TestRequest::default()
            .uri("/batch")
            .method(Method::POST)
            .insert_header(bearer(&manager))
            .set_json(&request)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::default()
            .uri("/batch")
            .method(Method::POST)
            .insert_header(bearer(&admin))
            .set_json(&request)
            .to_request();
        let response = test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let queued: Value = test::read_body_json(response).await;
        assert_eq!(queued["employeeCount"], 1);

        let operation_id = queued["operationId"].as_str().unwrap().to_string();
        let mut finished = Value::Null;
        for _ in 0..500 {
            let req = test::TestRequest::default()
                .uri(&format!("/batch/{operation_id}"))
                .insert_header(bearer(&admin))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            if body["status"] == "completed" {
                finished = body;
                break;
            }

            actix_web::rt::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(finished["progress"], 100);
        assert_eq!(finished["records"][0]["employeeId"], "E101");

        let req = test::TestRequest::default()
            .uri(&format!("/batch/{operation_id}/cancel"))
            .method(Method::POST)
            .insert_header(bearer(&admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::default()
            .uri(&format!("/batch/{}", Uuid::new_v4()))
            .insert_header(bearer(&admin))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
