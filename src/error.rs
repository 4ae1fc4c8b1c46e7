use actix_web::{body, http::{header::ContentType, StatusCode}, HttpResponse};
use thiserror::Error;

use crate::entity::sea_orm_active_enums::PayPeriodStatus;

#[derive(Debug, Error)]
pub enum PayrollError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{start} to {end} overlaps pay period `{existing}`")]
    Overlap {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        existing: String,
    },

    #[error("cannot assign commissions: {0}")]
    Assignment(String),

    #[error("pay period `{period_id}` is {actual:?}, expected {expected}")]
    State {
        period_id: String,
        actual: PayPeriodStatus,
        expected: &'static str,
    },

    #[error("{entity} `{id}` was modified concurrently, retry the operation")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
    },

    #[error("{failed} of {total} items failed")]
    PartialBatchFailure {
        failed: usize,
        total: usize,
    },

    #[error("batch operation `{operation_id}` is {status}, only running operations can be cancelled")]
    NotCancellable {
        operation_id: uuid::Uuid,
        status: &'static str,
    },

    #[error("{entity} `{id}` not found")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("unable to encode export")]
    Export(#[from] serde_json::Error),

    #[error("storage error")]
    Database(#[from] sea_orm::DbErr),
}

impl PayrollError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, PayrollError>;

impl actix_web::error::ResponseError for PayrollError {
    fn error_response(&self) -> HttpResponse<body::BoxBody> {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PayrollError::Validation(_)
            | PayrollError::Overlap { .. }
            | PayrollError::Assignment(_) => StatusCode::BAD_REQUEST,
            PayrollError::State { .. }
            | PayrollError::ConcurrencyConflict { .. }
            | PayrollError::NotCancellable { .. } => StatusCode::CONFLICT,
            PayrollError::NotFound { .. } => StatusCode::NOT_FOUND,
            PayrollError::PartialBatchFailure { .. }
            | PayrollError::Export(_)
            | PayrollError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
