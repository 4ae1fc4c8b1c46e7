//! Fixtures shared by the service and handler tests.

use chrono::{Local, NaiveDate};
use migration::{Migrator, MigratorTrait as _};
use sea_orm::{
    ActiveModelTrait as _, ActiveValue::Set, ColumnTrait as _, ConnectOptions, Database, DatabaseConnection,
    EntityTrait as _, QueryFilter as _,
};

use crate::{
    auth::Authority,
    entity::{employee, facility, prelude::*, sea_orm_active_enums::RoleType, user},
    payroll::ledger::{self, NewActivity},
};

pub const SECRET: &[u8] = b"secret";

/// `Authorization` header for `user`, signed with [`SECRET`]
pub fn bearer(user: &user::Model) -> (&'static str, String) {
    let token = Authority::new(SECRET).issue_for(user).unwrap();

    ("Authorization", format!("Bearer {token}"))
}

/// Fresh in-memory database with the production migrations applied.
///
/// A single pooled connection keeps every query on the same in-memory
/// database.
pub async fn setup_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opt).await.expect("Unable to open in-memory database");
    Migrator::up(&db, None).await.expect("Unable to run migrations");

    db
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn facility(db: &DatabaseConnection, id: &str, rental_goal: i32) -> facility::Model {
    facility::ActiveModel {
        id: Set(id.to_string()),
        created_at: Set(Local::now().fixed_offset()),
        updated_at: Set(Local::now().fixed_offset()),
        abbreviation: Set(id.to_uppercase()),
        name: Set(format!("{id} Self Storage")),
        sitelink_id: Set(format!("SL-{id}")),
        monthly_rental_goal: Set(rental_goal),
    }
    .insert(db).await.unwrap()
}

pub async fn employee(db: &DatabaseConnection, id: &str, facility_id: Option<&str>, manager_id: Option<&str>) -> employee::Model {
    employee::ActiveModel {
        id: Set(id.to_string()),
        created_at: Set(Local::now().fixed_offset()),
        updated_at: Set(Local::now().fixed_offset()),
        name: Set(format!("Employee {id}")),
        facility_id: Set(facility_id.map(str::to_string)),
        manager_id: Set(manager_id.map(str::to_string)),
        hire_date: Set(date(2020, 6, 1)),
    }
    .insert(db).await.unwrap()
}

pub async fn user(db: &DatabaseConnection, username: &str, role: RoleType, employee_id: Option<&str>) -> user::Model {
    user::ActiveModel {
        id: Set(format!("user-{username}")),
        created_at: Set(Local::now().fixed_offset()),
        updated_at: Set(Local::now().fixed_offset()),
        username: Set(username.to_string()),
        password: Set(Vec::new()),
        role: Set(role),
        employee_id: Set(employee_id.map(str::to_string)),
    }
    .insert(db).await.unwrap()
}

/// The administrator the seed migration creates
pub async fn seeded_admin(db: &DatabaseConnection) -> user::Model {
    User::find()
        .filter(user::Column::Username.eq("admin"))
        .one(db).await.unwrap()
        .expect("seed migration creates `admin`")
}

/// Unassigned rental worth `amount` cents
pub async fn activity(db: &DatabaseConnection, id: &str, employee_id: &str, facility_id: &str, on: NaiveDate, amount: i64) {
    ledger::record_activity(db, NewActivity {
        id: id.to_string(),
        employee_id: employee_id.to_string(),
        facility_id: facility_id.to_string(),
        date: on,
        unit_name: format!("Unit {id}"),
        tenant_name: "Jane Tenant".to_string(),
        has_insurance: false,
        commission_amount: amount,
    }).await.unwrap();
}
