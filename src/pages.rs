use actix_web::web;

mod auth;
mod batch;
mod commissions;
mod periods;
mod reports;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg
        .service(web::scope("/auth")
            .configure(auth::config))
        .service(web::scope("/periods")
            .configure(periods::config))
        .service(web::scope("/commissions")
            .configure(commissions::config))
        .service(web::scope("/batch")
            .configure(batch::config))
        .service(web::scope("/reports")
            .configure(reports::config));
}
