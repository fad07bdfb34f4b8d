// alla - A compact stack VM for a small expression language

pub mod bytecode;
pub mod vm;
pub mod runtime;
pub mod utils;

pub use bytecode::{disassemble, Constant, Instruction, OpCode, Program};
pub use vm::{VM, ExecutionContext, Value, VMError};
pub use runtime::{Runtime, RuntimeConfig, RuntimeError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
