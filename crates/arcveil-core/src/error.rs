//! Error types for the arcveil-core pipeline stages

/// All errors a pipeline stage can report across its boundary.
///
/// Stages never panic past their boundary: every failure is converted to a
/// `StageError`, and the orchestrator short-circuits on the first `Err`.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Privacy budget is zero, negative, or not a number
    #[error("Epsilon must be positive")]
    InvalidBudget,
    /// Any other stage failure (bad rule, bad timestamp, type mismatch)
    #[error("{0}")]
    Internal(String),
}

impl StageError {
    /// Build an internal error from any displayable message.
    pub fn internal(msg: impl Into<String>) -> Self {
        StageError::Internal(msg.into())
    }

    /// Wire status for this error: 400 for a rejected privacy budget,
    /// 500 for everything else.
    pub fn status(&self) -> u16 {
        match self {
            StageError::InvalidBudget => 400,
            StageError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_budget_message_and_status() {
        let err = StageError::InvalidBudget;
        assert_eq!(err.to_string(), "Epsilon must be positive");
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn internal_error_status() {
        let err = StageError::internal("range rule requires a numeric value");
        assert_eq!(err.status(), 500);
        assert_eq!(err.to_string(), "range rule requires a numeric value");
    }
}
