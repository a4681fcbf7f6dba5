use crate::value::Value;

/// Outcome of executing a statement that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Next,
    Return(Value),
}
