use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PayPeriodStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pay_period")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub start_date: Date,
    pub end_date: Date,
    pub status: PayPeriodStatus,
    /// Status to return to when a `processing` run ends
    pub resume_status: Option<PayPeriodStatus>,
    /// Bumped on every transition, guards against lost updates
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::activity::Entity")]
    Activity,
    #[sea_orm(has_many = "super::fixed_pay::Entity")]
    FixedPay,
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl Related<super::fixed_pay::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FixedPay.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
