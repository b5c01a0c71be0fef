use strum_macros::Display;
use thiserror::Error;

pub type BasaltResult<T> = Result<T, BasaltError>;

/// What a failed catalog or registry lookup was searching for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum LookupKind {
    Namespace,
    Table,
    Column,
    Operator,
}

#[derive(Error, Debug)]
pub enum BasaltError {
    /// Operand count or type mismatch detected while validating a call.
    #[error("Cannot apply '{operator}' to arguments: {message}. Supported form(s): {signature}")]
    Validation {
        operator: String,
        message: String,
        signature: String,
    },
    #[error("Unknown {kind} '{name}'")]
    Unknown { kind: LookupKind, name: String },
    /// A deliberately unimplemented construct was used.
    #[error("Not supported: {0}")]
    Unsupported(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// `root` is the top of the first subtree missing the required traits.
    #[error("No plan satisfies required traits {required} for root {root}")]
    CannotPlan { required: String, root: String },
    /// Invariant violation inside the engine.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BasaltError {
    pub fn unknown<S: Into<String>>(kind: LookupKind, name: S) -> Self {
        BasaltError::Unknown {
            kind,
            name: name.into(),
        }
    }

    /// Errors caused by the query itself rather than by the engine.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            BasaltError::Validation { .. }
                | BasaltError::Unknown { .. }
                | BasaltError::Unsupported(_)
                | BasaltError::Config(_)
        )
    }
}

#[doc(hidden)]
pub use anyhow;

/// Builds a [`BasaltError::Internal`] from a format string.
#[macro_export]
macro_rules! internal_err {
    ($($arg:tt)*) => {
        $crate::error::BasaltError::Internal($crate::error::anyhow::anyhow!($($arg)*))
    };
}

/// Returns early with a [`BasaltError::Internal`].
#[macro_export]
macro_rules! bail_internal {
    ($($arg:tt)*) => {
        return Err($crate::internal_err!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use crate::error::{BasaltError, LookupKind};

    #[test]
    fn test_user_error_classification() {
        assert!(BasaltError::unknown(LookupKind::Table, "orders").is_user_error());
        assert!(BasaltError::Unsupported("PROX".to_string()).is_user_error());
        assert!(!internal_err!("geo near expects 8 operands").is_user_error());
    }

    #[test]
    fn test_error_message() {
        let err = BasaltError::unknown(LookupKind::Column, "amount");
        assert_eq!("Unknown column 'amount'", err.to_string());
    }
}
