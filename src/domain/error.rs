use thiserror::Error;

use crate::domain::forms::FieldErrors;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("submitted form is invalid: {0}")]
    Validation(FieldErrors),
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}
