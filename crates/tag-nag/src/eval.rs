//! expression evaluation
//!
//! Evaluation itself is done by [hcl::eval]. This module narrows its error model down to the three
//! failure kinds the rest of the crate cares about and converts results into [Value].
use crate::value::Value;
use hcl::eval::{ErrorKind, Evaluate};

/// Evaluate `expression` against `ctx`
///
/// Evaluation is pure: the same expression evaluated against the same context always yields the
/// same result.
#[tracing::instrument(level = "trace", skip_all)]
pub fn evaluate(expression: &hcl::Expression, ctx: &hcl::eval::Context) -> Result<Value, EvalError> {
    match expression.evaluate(ctx) {
        Ok(value) => Ok(value.into()),
        Err(error) => {
            let error = EvalError::from(&error);
            tracing::trace!(%error, "evaluation failed");
            Err(error)
        }
    }
}

/// Evaluate an expression that must not depend on anything (e.g. a provider `alias`)
pub fn evaluate_literal(expression: &hcl::Expression) -> Result<Value, EvalError> {
    evaluate(expression, &hcl::eval::Context::new())
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// A variable, attribute or index that does not exist (yet)
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    /// An operation or function received a value of the wrong type
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// An expression form or function that is not supported
    #[error("unsupported expression: {0}")]
    UnsupportedForm(String),
}

impl From<&hcl::eval::Error> for EvalError {
    fn from(error: &hcl::eval::Error) -> Self {
        let message = error.to_string();
        match error.kind() {
            ErrorKind::UndefinedVar(_) | ErrorKind::NoSuchKey(_) | ErrorKind::Index(_) => {
                EvalError::UnresolvedReference(message)
            }
            ErrorKind::Unexpected(..)
            | ErrorKind::UnaryOp(..)
            | ErrorKind::BinaryOp(..)
            | ErrorKind::FuncCall(..) => EvalError::TypeMismatch(message),
            _ => EvalError::UnsupportedForm(message),
        }
    }
}
