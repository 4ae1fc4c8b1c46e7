use sea_orm_migration::{prelude::*, sea_orm::DbBackend};
use sha2::Digest as _;

use crate::m20250613_083042_init::User;

const ADMIN_ID: &str = "admin";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let time: SimpleExpr = match manager.get_database_backend() {
            DbBackend::Postgres => Expr::val("2025-06-15T06:58:41.474Z").cast_as("timestamptz"),
            _ => Expr::val("2025-06-15 06:58:41.474+00:00").into(),
        };

        // Password is hashed as `password:username`, same as the login route
        let hashed_password = &sha2::Sha256::digest("admin:admin")[..];

        manager
            .exec_stmt(Query::insert()
                .into_table(User::Table)
                .columns(["id", "created_at", "updated_at", "username", "password", "role"])
                .values_panic([ADMIN_ID.into(), time.clone(), time, "admin".into(), hashed_password.into(), "admin".into()])
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .exec_stmt(Query::delete()
                .from_table(User::Table)
                .and_where(Expr::col("id").eq(ADMIN_ID))
                .to_owned()
        ).await?;

        Ok(())
    }
}
