use sea_orm_migration::prelude::*;

/// Every table carries a text `id` primary key plus audit timestamps.
///
/// Identifiers are produced by the application (facility codes, employee
/// numbers, UUIDs), so there is no database-side default.
pub(crate) fn default_table_statement() -> TableCreateStatement {
    TableCreateStatement::new()
        .if_not_exists()
        .col(ColumnDef::new(DefaultColumn::Id)
            .string()
            .not_null()
            .primary_key()
            .take())
        .col(ColumnDef::new(DefaultColumn::CreatedAt)
            .timestamp_with_time_zone()
            .not_null()
            .take())
        .col(ColumnDef::new(DefaultColumn::UpdatedAt)
            .timestamp_with_time_zone()
            .not_null()
            .take())
        .take()
}

#[derive(DeriveIden)]
pub(crate) enum DefaultColumn {
    Id,
    CreatedAt,
    UpdatedAt,
}

/// Inline foreign key, SQLite cannot add one to an existing table.
///
/// # Example
///
/// ```rs
/// manager
///     .create_table(default_table_statement()
///         .table(Activity::Table)
///         .col(ColumnDef::new(Activity::PayPeriodId)
///             .string())
///         .foreign_key(&mut reference(Activity::Table, Activity::PayPeriodId, PayPeriod::Table))
///         .take()
///     ).await?;
/// ```
pub(crate) fn reference<T, C, R>(table: T, column: C, referenced: R) -> ForeignKeyCreateStatement
where
    T: IntoTableRef,
    C: IdenList,
    R: IntoTableRef,
{
    ForeignKey::create()
        .from(table, column)
        .to(referenced, DefaultColumn::Id)
        .on_delete(ForeignKeyAction::Restrict)
        .on_update(ForeignKeyAction::Cascade)
        .take()
}
