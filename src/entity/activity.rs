use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A rental (or insurance sale) that earns its employee a commission.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub employee_id: String,
    pub facility_id: String,
    pub date: Date,
    pub unit_name: String,
    pub tenant_name: String,
    pub has_insurance: bool,
    /// Cents
    pub commission_amount: i64,
    /// `None` while the commission is unpaid
    pub pay_period_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::employee::Entity",
        from = "Column::EmployeeId",
        to = "super::employee::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Employee,
    #[sea_orm(
        belongs_to = "super::facility::Entity",
        from = "Column::FacilityId",
        to = "super::facility::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Facility,
    #[sea_orm(
        belongs_to = "super::pay_period::Entity",
        from = "Column::PayPeriodId",
        to = "super::pay_period::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    PayPeriod,
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

impl Related<super::facility::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Facility.def()
    }
}

impl Related<super::pay_period::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PayPeriod.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
