//! API handlers module

pub mod cache;
pub mod graph;
pub mod health;
pub mod works;

use citeforge_common::errors::AppError;
use validator::Validate;

/// Run `validator` rules, mapping failures to a 400
pub(crate) fn validate<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })
}
