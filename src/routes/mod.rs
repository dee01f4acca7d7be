pub mod account;
pub mod files;
pub mod orders;

use crate::{
    errors::{AppError, AppResult},
    logging::Audit,
};
use axum::response::{IntoResponse, Response};

/// Close the audit record for a handler result and render it.
pub(crate) fn respond<T: IntoResponse>(audit: Audit, result: AppResult<T>) -> Response {
    match result {
        Ok(ok) => {
            audit.allow();
            ok.into_response()
        }
        Err(e @ AppError::Internal(_)) => {
            audit.error(e.code());
            e.into_response()
        }
        Err(e) => {
            audit.deny(e.code());
            e.into_response()
        }
    }
}
