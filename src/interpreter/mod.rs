pub mod parser;
pub mod environment;
pub mod error;
pub mod control_flow;
pub mod builtins;
pub mod evaluator;
mod stack;

pub use error::RuntimeError;
pub use control_flow::ControlFlow;
pub use environment::{Environment, ScopeId};
pub use parser::{Parser, ParseError, ParseResult};
pub use evaluator::Interpreter;
