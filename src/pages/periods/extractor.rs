use super::*;

impl FromRequest for pay_period::Model {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let Some(period_id) = req.match_info().get("period_id") else {
                return Err(actix_web::error::ErrorInternalServerError("route has no `period_id`"))
            };

            let Some(db) = req.app_data::<web::Data<DatabaseConnection>>() else {
                return Err(actix_web::error::ErrorInternalServerError("database missing"))
            };

            Ok(period::find(db.get_ref(), period_id).await?)
        })
    }
}

/// The period covering today, resolved once for the request
pub(super) struct CurrentPeriod(pub(super) pay_period::Model);

impl FromRequest for CurrentPeriod {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let Some(db) = req.app_data::<web::Data<DatabaseConnection>>() else {
                return Err(actix_web::error::ErrorInternalServerError("database missing"))
            };

            let today = Local::now().date_naive();
            let Some(period) = period::resolve_current(db.get_ref(), today).await? else {
                return Err(actix_web::error::ErrorNotFound("no pay period covers today"))
            };

            Ok(Self(period))
        })
    }
}
