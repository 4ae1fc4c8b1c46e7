//! Commission plan figures. All amounts are in cents.

/// Paid once the facility's monthly rental goal is met
pub const RENTAL_GOAL_BONUS: i64 = 50_00;

/// Paid for each rental beyond the goal
pub const RENTAL_OVER_GOAL_BONUS: i64 = 10_00;

/// Paid for every rental that also sold tenant insurance
pub const INSURANCE_BONUS: i64 = 5_00;

pub const CHRISTMAS_BONUS_BASE: i64 = 100_00;

/// Added per completed year of service
pub const CHRISTMAS_BONUS_PER_YEAR: i64 = 25_00;

pub const CHRISTMAS_BONUS_CAP: i64 = 300_00;

pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

pub const DEFAULT_BATCH_FAILURE_THRESHOLD: f64 = 0.5;

/// How long a finished batch operation stays pollable
pub const DEFAULT_BATCH_RETENTION_SECS: i64 = 24 * 60 * 60;

pub const DEFAULT_BATCH_MAX_FINISHED: usize = 100;
