//! The stack-machine VM that executes compiled chunks.

pub mod error;
pub mod vm;

pub use error::{InterpretResult, RuntimeError};
pub use vm::Vm;
