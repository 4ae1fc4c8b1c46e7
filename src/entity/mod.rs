//! `SeaORM` entities, kept in step with the `migration` crate.

pub mod prelude;

pub mod activity;
pub mod bonus_record;
pub mod employee;
pub mod facility;
pub mod fixed_pay;
pub mod pay_period;
pub mod rental_stat;
pub mod sea_orm_active_enums;
pub mod user;
