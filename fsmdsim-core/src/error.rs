//! Core error types.

use thiserror::Error;

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error at offset {pos}: {reason}")]
    Syntax { pos: usize, reason: String },

    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("type mismatch: '{op}' expects {expected}, got {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("integer overflow in '{op}'")]
    Overflow { op: &'static str },
}

impl ExprError {
    pub(crate) fn syntax(pos: usize, reason: impl Into<String>) -> Self {
        ExprError::Syntax {
            pos,
            reason: reason.into(),
        }
    }
}

/// Errors from loading a description or running a simulation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid description: {reason}")]
    InvalidDefinition { reason: String },

    #[error("invalid stimulus: {reason}")]
    InvalidStimulus { reason: String },

    #[error("expression error in '{expr}': {source}")]
    Expression {
        expr: String,
        #[source]
        source: ExprError,
    },

    #[error("invalid assignment '{expr}': {reason}")]
    InvalidAssignment { expr: String, reason: String },

    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("unknown condition or identifier '{name}' in condition '{condition}'")]
    UnknownCondition { name: String, condition: String },

    #[error("cyclic condition reference: {chain}")]
    CyclicCondition { chain: String },

    #[error("unknown input: {name}")]
    UnknownInput { name: String },

    #[error("unknown state: {name}")]
    UnknownState { name: String },

    #[error("simulation is not running ({status})")]
    NotRunning { status: String },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::de::DeError),
}

impl CoreError {
    pub(crate) fn definition(reason: impl Into<String>) -> Self {
        CoreError::InvalidDefinition {
            reason: reason.into(),
        }
    }

    pub(crate) fn expression(expr: impl Into<String>, source: ExprError) -> Self {
        CoreError::Expression {
            expr: expr.into(),
            source,
        }
    }

    /// Returns true if the error was detected before the simulation started.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidDefinition { .. }
                | CoreError::InvalidStimulus { .. }
                | CoreError::Io { .. }
                | CoreError::Json(_)
                | CoreError::Yaml(_)
                | CoreError::Xml(_)
        )
    }

    /// Returns a stable error code suitable for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidDefinition { .. } => "LOAD_ERROR",
            CoreError::InvalidStimulus { .. } => "LOAD_ERROR",
            CoreError::Expression { .. } => "EXPRESSION_ERROR",
            CoreError::InvalidAssignment { .. } => "EXPRESSION_ERROR",
            CoreError::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            CoreError::UnknownCondition { .. } => "UNKNOWN_CONDITION",
            CoreError::CyclicCondition { .. } => "CYCLIC_CONDITION",
            CoreError::UnknownInput { .. } => "UNKNOWN_INPUT",
            CoreError::UnknownState { .. } => "UNKNOWN_STATE",
            CoreError::NotRunning { .. } => "NOT_RUNNING",
            CoreError::Io { .. } => "IO_ERROR",
            CoreError::Json(_) => "LOAD_ERROR",
            CoreError::Yaml(_) => "LOAD_ERROR",
            CoreError::Xml(_) => "LOAD_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::definition("x").error_code(), "LOAD_ERROR");
        assert_eq!(
            CoreError::expression("1/0", ExprError::DivisionByZero).error_code(),
            "EXPRESSION_ERROR"
        );
        assert_eq!(
            CoreError::UnknownOperation {
                name: "inc".to_string()
            }
            .error_code(),
            "UNKNOWN_OPERATION"
        );
    }

    #[test]
    fn test_load_error_classification() {
        assert!(CoreError::definition("dup").is_load_error());
        assert!(!CoreError::UnknownState {
            name: "S".to_string()
        }
        .is_load_error());
    }

    #[test]
    fn test_display_includes_expression() {
        let err = CoreError::expression("x / 0", ExprError::DivisionByZero);
        assert_eq!(err.to_string(), "expression error in 'x / 0': division by zero");
    }
}
