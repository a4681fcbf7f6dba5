use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::token::Token;

/// An error raised while evaluating a program. `Display` is the exact message
/// shown to the user; the line is reported separately.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Operand must be a number.")]
    OperandNotNumber { line: usize },

    #[error("Operands must be numbers.")]
    OperandsNotNumbers { line: usize },

    #[error("Operands must be two numbers or two strings.")]
    InvalidAddition { line: usize },

    #[error("Undefined variable '{name}'.")]
    UndefinedVariable { name: String, line: usize },

    #[error("Undefined property '{name}'.")]
    UndefinedProperty { name: String, line: usize },

    #[error("Only instances have properties.")]
    PropertyOnNonInstance { line: usize },

    #[error("Only instances have fields.")]
    FieldOnNonInstance { line: usize },

    #[error("Can only call functions and classes.")]
    NotCallable { line: usize },

    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch {
        expected: usize,
        got: usize,
        line: usize,
    },

    #[error("Superclass must be a class.")]
    SuperclassNotClass { line: usize },

    #[error("Stack overflow.")]
    StackOverflow { line: usize },

    #[error("{message}")]
    Native { message: String, line: usize },

    #[error("Could not write output: {source}")]
    Output {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    pub fn operand_not_number(operator: &Token) -> Self {
        Self::OperandNotNumber {
            line: operator.line,
        }
    }

    pub fn operands_not_numbers(operator: &Token) -> Self {
        Self::OperandsNotNumbers {
            line: operator.line,
        }
    }

    pub fn invalid_addition(operator: &Token) -> Self {
        Self::InvalidAddition {
            line: operator.line,
        }
    }

    pub fn undefined_variable(name: &Token) -> Self {
        Self::UndefinedVariable {
            name: name.lexeme.clone(),
            line: name.line,
        }
    }

    pub fn undefined_property(name: &Token) -> Self {
        Self::UndefinedProperty {
            name: name.lexeme.clone(),
            line: name.line,
        }
    }

    pub fn property_on_non_instance(name: &Token) -> Self {
        Self::PropertyOnNonInstance { line: name.line }
    }

    pub fn field_on_non_instance(name: &Token) -> Self {
        Self::FieldOnNonInstance { line: name.line }
    }

    pub fn not_callable(paren: &Token) -> Self {
        Self::NotCallable { line: paren.line }
    }

    pub fn arity_mismatch(paren: &Token, expected: usize, got: usize) -> Self {
        Self::ArityMismatch {
            expected,
            got,
            line: paren.line,
        }
    }

    pub fn superclass_not_class(name: &Token) -> Self {
        Self::SuperclassNotClass { line: name.line }
    }

    pub fn stack_overflow(paren: &Token) -> Self {
        Self::StackOverflow { line: paren.line }
    }

    pub fn native(paren: &Token, message: impl Into<String>) -> Self {
        Self::Native {
            message: message.into(),
            line: paren.line,
        }
    }

    pub fn output(line: usize, source: std::io::Error) -> Self {
        Self::Output { line, source }
    }

    /// Source line of the token the error is attributed to.
    pub fn line(&self) -> usize {
        match self {
            Self::OperandNotNumber { line }
            | Self::OperandsNotNumbers { line }
            | Self::InvalidAddition { line }
            | Self::UndefinedVariable { line, .. }
            | Self::UndefinedProperty { line, .. }
            | Self::PropertyOnNonInstance { line }
            | Self::FieldOnNonInstance { line }
            | Self::NotCallable { line }
            | Self::ArityMismatch { line, .. }
            | Self::SuperclassNotClass { line }
            | Self::StackOverflow { line }
            | Self::Native { line, .. }
            | Self::Output { line, .. } => *line,
        }
    }

    /// Convert to a diagnostic for reporting
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::runtime(self.line(), self.to_string())
    }
}
