use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Hours and mileage supplied from outside the ledger, one row per
/// employee, period and facility.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fixed_pay")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub employee_id: String,
    pub pay_period_id: String,
    pub facility_id: String,
    pub vacation_hours: f64,
    pub holiday_hours: f64,
    /// Cents
    pub mileage_amount: i64,
    /// Cents per hour, hours stay undollarized without it
    pub hourly_rate: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pay_period::Entity",
        from = "Column::PayPeriodId",
        to = "super::pay_period::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    PayPeriod,
}

impl Related<super::pay_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PayPeriod.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
