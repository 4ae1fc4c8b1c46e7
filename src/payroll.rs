//! Pay periods, commission assignment and the payroll they add up to.

pub mod aggregate;
pub mod assignment;
pub mod batch;
pub mod bonus;
pub mod fixed_pay;
pub mod ledger;
pub mod period;
pub mod rollup;
