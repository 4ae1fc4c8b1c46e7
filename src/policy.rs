//! Who may do what to whom.
//!
//! [`can_perform`] is pure so the matrix is testable on its own; handlers
//! resolve the caller's [`Relation`] to the target and ask it.

use std::collections::HashSet;

use actix_web::error::ErrorForbidden;
use sea_orm::{ConnectionTrait, EntityTrait as _};

use crate::{
    entity::{prelude::*, sea_orm_active_enums::RoleType, user},
    error::{PayrollError, Result},
};

/// How the caller stands to the target of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Oneself,
    DirectReport,
    Other,
    /// Operations without a single employee as target
    Organization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ViewPayroll,
    AssignCommissions,
    ManagePeriods,
    RunBatch,
    ViewReports,
    ExportReports,
}

const ALL: [Operation; 6] = [
    Operation::ViewPayroll,
    Operation::AssignCommissions,
    Operation::ManagePeriods,
    Operation::RunBatch,
    Operation::ViewReports,
    Operation::ExportReports,
];

pub fn can_perform(role: RoleType, relation: Relation) -> HashSet<Operation> {
    use Operation::*;

    let allowed: &[Operation] = match (role, relation) {
        (RoleType::Admin, _) => &ALL,
        (RoleType::Manager, Relation::Oneself) => &[ViewPayroll],
        (RoleType::Manager, Relation::DirectReport) => &[ViewPayroll, AssignCommissions, ExportReports],
        (RoleType::Manager, Relation::Organization) => &[ViewReports, ExportReports],
        (RoleType::Employee, Relation::Oneself) => &[ViewPayroll],
        (RoleType::Manager | RoleType::Employee, _) => &[],
    };

    allowed.iter().copied().collect()
}

/// Resolves how `user` stands to the employee `employee_id`
pub async fn relation_to(db: &impl ConnectionTrait, user: &user::Model, employee_id: &str) -> Result<Relation> {
    let Some(own_id) = user.employee_id.as_deref() else {
        return Ok(Relation::Other);
    };

    if own_id == employee_id {
        return Ok(Relation::Oneself);
    }

    let target = Employee::find_by_id(employee_id)
        .one(db).await?
        .ok_or_else(|| PayrollError::not_found("employee", employee_id))?;

    Ok(match target.manager_id.as_deref() {
        Some(manager_id) if manager_id == own_id => Relation::DirectReport,
        _ => Relation::Other,
    })
}

pub fn require(user: &user::Model, relation: Relation, operation: Operation) -> actix_web::Result<()> {
    if can_perform(user.role, relation).contains(&operation) {
        Ok(())
    } else {
        Err(ErrorForbidden("forbidden"))
    }
}

/// Checks `operation` against the employee `employee_id`
pub async fn require_for(db: &impl ConnectionTrait, user: &user::Model, employee_id: &str, operation: Operation) -> actix_web::Result<()> {
    // Admins reach every employee, skip the lookup
    let relation = match user.role {
        RoleType::Admin => Relation::Other,
        _ => relation_to(db, user, employee_id).await?,
    };

    require(user, relation, operation)
}
