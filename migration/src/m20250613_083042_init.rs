use sea_orm_migration::prelude::*;

use crate::util::{default_table_statement, reference};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(default_table_statement()
                .table(Facility::Table)
                .col(ColumnDef::new(Facility::Abbreviation)
                    .string()
                    .not_null())
                .col(ColumnDef::new(Facility::Name)
                    .string()
                    .not_null())
                .col(ColumnDef::new(Facility::SitelinkId)
                    .string()
                    .not_null())
                .col(ColumnDef::new(Facility::MonthlyRentalGoal)
                    .integer()
                    .not_null()
                    .default(0))
                .take()
            ).await?;

        manager
            .create_table(default_table_statement()
                .table(Employee::Table)
                .col(ColumnDef::new(Employee::Name)
                    .string()
                    .not_null())
                .col(ColumnDef::new(Employee::FacilityId)
                    .string()) // Current facility only, history is not modelled
                .col(ColumnDef::new(Employee::ManagerId)
                    .string())
                .col(ColumnDef::new(Employee::HireDate)
                    .date()
                    .not_null())
                .foreign_key(&mut reference(Employee::Table, Employee::FacilityId, Facility::Table))
                .take()
            ).await?;

        manager
            .create_table(default_table_statement()
                .table(User::Table)
                .col(ColumnDef::new(User::Username)
                    .string()
                    .unique_key()
                    .not_null())
                .col(ColumnDef::new(User::Password)
                    .binary()
                    .not_null()) // Password should be in a hashed format
                .col(ColumnDef::new(User::Role)
                    .string_len(16)
                    .not_null())
                .col(ColumnDef::new(User::EmployeeId)
                    .string())
                .foreign_key(&mut reference(User::Table, User::EmployeeId, Employee::Table))
                .take()
            ).await?;

        manager
            .create_table(default_table_statement()
                .table(PayPeriod::Table)
                .col(ColumnDef::new(PayPeriod::StartDate)
                    .date()
                    .not_null())
                .col(ColumnDef::new(PayPeriod::EndDate)
                    .date()
                    .not_null())
                .col(ColumnDef::new(PayPeriod::Status)
                    .string_len(16)
                    .not_null()
                    .default("draft"))
                .col(ColumnDef::new(PayPeriod::ResumeStatus)
                    .string_len(16))
                .col(ColumnDef::new(PayPeriod::Version)
                    .integer()
                    .not_null()
                    .default(0))
                .take()
            ).await?;

        manager
            .create_table(default_table_statement()
                .table(Activity::Table)
                .col(ColumnDef::new(Activity::EmployeeId)
                    .string()
                    .not_null())
                .col(ColumnDef::new(Activity::FacilityId)
                    .string()
                    .not_null())
                .col(ColumnDef::new(Activity::Date)
                    .date()
                    .not_null())
                .col(ColumnDef::new(Activity::UnitName)
                    .string()
                    .not_null())
                .col(ColumnDef::new(Activity::TenantName)
                    .string()
                    .not_null())
                .col(ColumnDef::new(Activity::HasInsurance)
                    .boolean()
                    .not_null()
                    .default(false))
                .col(ColumnDef::new(Activity::CommissionAmount)
                    .big_integer()
                    .not_null()) // Cents
                .col(ColumnDef::new(Activity::PayPeriodId)
                    .string()) // NULL while the commission is unpaid
                .foreign_key(&mut reference(Activity::Table, Activity::EmployeeId, Employee::Table))
                .foreign_key(&mut reference(Activity::Table, Activity::FacilityId, Facility::Table))
                .foreign_key(&mut reference(Activity::Table, Activity::PayPeriodId, PayPeriod::Table))
                .take()
            ).await?;

        manager.create_index(Index::create()
            .if_not_exists()
            .name("idx-activity-employee-period")
            .table(Activity::Table)
            .col(Activity::EmployeeId)
            .col(Activity::PayPeriodId)
            .take()
        ).await?;

        manager
            .create_table(default_table_statement()
                .table(BonusRecord::Table)
                .col(ColumnDef::new(BonusRecord::EmployeeId)
                    .string()
                    .not_null())
                .col(ColumnDef::new(BonusRecord::FacilityId)
                    .string()
                    .not_null())
                .col(ColumnDef::new(BonusRecord::BonusType)
                    .string_len(16)
                    .not_null())
                .col(ColumnDef::new(BonusRecord::Label)
                    .string()
                    .not_null())
                .col(ColumnDef::new(BonusRecord::Amount)
                    .big_integer()
                    .not_null())
                .col(ColumnDef::new(BonusRecord::Month)
                    .date()
                    .not_null()) // Always the first day of the month
                .col(ColumnDef::new(BonusRecord::Date)
                    .date()
                    .not_null())
                .col(ColumnDef::new(BonusRecord::Revision)
                    .integer()
                    .not_null())
                .foreign_key(&mut reference(BonusRecord::Table, BonusRecord::EmployeeId, Employee::Table))
                .foreign_key(&mut reference(BonusRecord::Table, BonusRecord::FacilityId, Facility::Table))
                .take()
            ).await?;

        // One row per component within a revision, a second writer of the same revision fails
        manager.create_index(Index::create()
            .if_not_exists()
            .name("idx-bonus_record-revision")
            .table(BonusRecord::Table)
            .col(BonusRecord::EmployeeId)
            .col(BonusRecord::FacilityId)
            .col(BonusRecord::Month)
            .col(BonusRecord::Revision)
            .col(BonusRecord::Label)
            .unique()
            .take()
        ).await?;

        manager
            .create_table(default_table_statement()
                .table(FixedPay::Table)
                .col(ColumnDef::new(FixedPay::EmployeeId)
                    .string()
                    .not_null())
                .col(ColumnDef::new(FixedPay::PayPeriodId)
                    .string()
                    .not_null())
                .col(ColumnDef::new(FixedPay::FacilityId)
                    .string()
                    .not_null())
                .col(ColumnDef::new(FixedPay::VacationHours)
                    .double()
                    .not_null()
                    .default(0.0))
                .col(ColumnDef::new(FixedPay::HolidayHours)
                    .double()
                    .not_null()
                    .default(0.0))
                .col(ColumnDef::new(FixedPay::MileageAmount)
                    .big_integer()
                    .not_null()
                    .default(0))
                .col(ColumnDef::new(FixedPay::HourlyRate)
                    .big_integer())
                .foreign_key(&mut reference(FixedPay::Table, FixedPay::EmployeeId, Employee::Table))
                .foreign_key(&mut reference(FixedPay::Table, FixedPay::PayPeriodId, PayPeriod::Table))
                .foreign_key(&mut reference(FixedPay::Table, FixedPay::FacilityId, Facility::Table))
                .take()
            ).await?;

        manager.create_index(Index::create()
            .if_not_exists()
            .unique()
            .name("idx-fixed-pay-scope")
            .table(FixedPay::Table)
            .col(FixedPay::EmployeeId)
            .col(FixedPay::PayPeriodId)
            .col(FixedPay::FacilityId)
            .take()
        ).await?;

        manager
            .create_table(default_table_statement()
                .table(RentalStat::Table)
                .col(ColumnDef::new(RentalStat::FacilityId)
                    .string()
                    .not_null())
                .col(ColumnDef::new(RentalStat::Date)
                    .date()
                    .not_null())
                .col(ColumnDef::new(RentalStat::DiscountPlan)
                    .string()
                    .not_null())
                .col(ColumnDef::new(RentalStat::Inquiries)
                    .integer())
                .col(ColumnDef::new(RentalStat::Rentals)
                    .integer())
                .col(ColumnDef::new(RentalStat::Cancellations)
                    .integer())
                .foreign_key(&mut reference(RentalStat::Table, RentalStat::FacilityId, Facility::Table))
                .take()
            ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Children first so the inline foreign keys never dangle
        manager.drop_table(Table::drop().table(RentalStat::Table).take()).await?;
        manager.drop_table(Table::drop().table(FixedPay::Table).take()).await?;
        manager.drop_table(Table::drop().table(BonusRecord::Table).take()).await?;
        manager.drop_table(Table::drop().table(Activity::Table).take()).await?;
        manager.drop_table(Table::drop().table(PayPeriod::Table).take()).await?;
        manager.drop_table(Table::drop().table(User::Table).take()).await?;
        manager.drop_table(Table::drop().table(Employee::Table).take()).await?;
        manager.drop_table(Table::drop().table(Facility::Table).take()).await?;

        Ok(())
    }
}

#[derive(Iden)]
pub(crate) enum User {
    Table,
    Username,
    Password,
    Role,
    EmployeeId,
}

#[derive(Iden)]
enum Facility {
    Table,
    Abbreviation,
    Name,
    SitelinkId,
    MonthlyRentalGoal,
}

#[derive(Iden)]
enum Employee {
    Table,
    Name,
    FacilityId,
    ManagerId,
    HireDate,
}

#[derive(Iden)]
enum PayPeriod {
    Table,
    StartDate,
    EndDate,
    Status,
    ResumeStatus,
    Version,
}

#[derive(Iden)]
enum Activity {
    Table,
    EmployeeId,
    FacilityId,
    Date,
    UnitName,
    TenantName,
    HasInsurance,
    CommissionAmount,
    PayPeriodId,
}

#[derive(Iden)]
enum BonusRecord {
    Table,
    EmployeeId,
    FacilityId,
    BonusType,
    Label,
    Amount,
    Month,
    Date,
    Revision,
}

#[derive(Iden)]
enum FixedPay {
    Table,
    EmployeeId,
    PayPeriodId,
    FacilityId,
    VacationHours,
    HolidayHours,
    MileageAmount,
    HourlyRate,
}

#[derive(Iden)]
enum RentalStat {
    Table,
    FacilityId,
    Date,
    DiscountPlan,
    Inquiries,
    Rentals,
    Cancellations,
}
