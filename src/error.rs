use chrono::{NaiveDate, NaiveDateTime};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// Input rejected before anything is persisted. Always recoverable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("exactly one nutrient source must be set (catalog food, custom food, recipe or manual entry), found {found}")]
    InvalidSourceCount { found: usize },

    #[error("a manual entry needs a name, proteins, fats and carbohydrates")]
    IncompleteManualEntry,

    #[error("proteins, fats and carbohydrates add up to {sum}g, which exceeds 100g per 100g of food")]
    MacroSumExceeded { sum: f64 },

    #[error("{field} must be between 0 and 100g per 100g of food, got {value}")]
    MacroOutOfRange { field: &'static str, value: f64 },

    #[error("mass must be between 1 and 10000 grams, got {0}")]
    InvalidMass(i32),

    #[error("eaten_at {eaten_at} is {reason}")]
    InvalidDate {
        eaten_at: NaiveDateTime,
        reason: String,
    },

    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("name must be 1 to 255 characters")]
    InvalidName,

    #[error("recipe {0} has no ingredients")]
    EmptyRecipe(i64),

    #[error("ingredients can only be added by the owner of recipe {recipe_id}")]
    OwnerMismatch { recipe_id: i64 },
}

/// Crate-wide error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A store constraint rejected the write; nothing was persisted.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(DieselError),

    #[error("database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),

    #[error("cached value codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Stable, machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidSourceCount,
    IncompleteManualEntry,
    MacroSumExceeded,
    MacroOutOfRange,
    InvalidMass,
    InvalidDate,
    InvalidRange,
    InvalidName,
    EmptyRecipe,
    OwnerMismatch,
    Integrity,
    NotFound,
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSourceCount => "INVALID_SOURCE_COUNT",
            ErrorKind::IncompleteManualEntry => "INCOMPLETE_MANUAL_ENTRY",
            ErrorKind::MacroSumExceeded => "MACRO_SUM_EXCEEDED",
            ErrorKind::MacroOutOfRange => "MACRO_OUT_OF_RANGE",
            ErrorKind::InvalidMass => "INVALID_MASS",
            ErrorKind::InvalidDate => "INVALID_DATE",
            ErrorKind::InvalidRange => "INVALID_RANGE",
            ErrorKind::InvalidName => "INVALID_NAME",
            ErrorKind::EmptyRecipe => "EMPTY_RECIPE",
            ErrorKind::OwnerMismatch => "OWNER_MISMATCH",
            ErrorKind::Integrity => "INTEGRITY",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Infrastructure => "INFRASTRUCTURE",
        }
    }
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::InvalidSourceCount { .. } => ErrorKind::InvalidSourceCount,
            ValidationError::IncompleteManualEntry => ErrorKind::IncompleteManualEntry,
            ValidationError::MacroSumExceeded { .. } => ErrorKind::MacroSumExceeded,
            ValidationError::MacroOutOfRange { .. } => ErrorKind::MacroOutOfRange,
            ValidationError::InvalidMass(_) => ErrorKind::InvalidMass,
            ValidationError::InvalidDate { .. } => ErrorKind::InvalidDate,
            ValidationError::InvalidRange { .. } => ErrorKind::InvalidRange,
            ValidationError::InvalidName => ErrorKind::InvalidName,
            ValidationError::EmptyRecipe(_) => ErrorKind::EmptyRecipe,
            ValidationError::OwnerMismatch { .. } => ErrorKind::OwnerMismatch,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(err) => err.kind(),
            Error::Integrity(_) => ErrorKind::Integrity,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Database(_) | Error::Pool(_) | Error::Cache(_) | Error::Codec(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Validation, integrity and not-found errors are the caller's to fix;
    /// everything else aborts the operation.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Infrastructure
    }

    pub(crate) fn not_found(what: &str, id: i64) -> Self {
        Error::NotFound(format!("{} {}", what, id))
    }
}

impl From<DieselError> for Error {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::ForeignKeyViolation => {
                    Error::Integrity(info.message().to_string())
                }
                _ if info.message().contains("constraint failed") => {
                    Error::Integrity(info.message().to_string())
                }
                kind => Error::Database(DieselError::DatabaseError(kind, info)),
            },
            other => Error::Database(other),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_kinds() {
        let err: Error = ValidationError::InvalidSourceCount { found: 2 }.into();
        assert_eq!(err.kind(), ErrorKind::InvalidSourceCount);
        assert_eq!(err.kind().as_str(), "INVALID_SOURCE_COUNT");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_not_found_is_recoverable() {
        let err = Error::not_found("recipe", 7);
        assert_eq!(err.to_string(), "recipe 7 not found");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_query_errors_are_infrastructure() {
        let err: Error = DieselError::NotFound.into();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(!err.is_recoverable());
    }
}
