pub use super::activity::Entity as Activity;
pub use super::bonus_record::Entity as BonusRecord;
pub use super::employee::Entity as Employee;
pub use super::facility::Entity as Facility;
pub use super::fixed_pay::Entity as FixedPay;
pub use super::pay_period::Entity as PayPeriod;
pub use super::rental_stat::Entity as RentalStat;
pub use super::user::Entity as User;
