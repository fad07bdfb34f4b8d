use std::sync::Arc;
use tracing::trace;
use crate::bytecode::{Instruction, Program};
use crate::vm::{Value, VMError, VMResult};

/// The execution context for one run of a program.
///
/// Holds the instruction pointer, the operand stack and the variable slots.
/// A context is never reused: every execution starts from a fresh one.
pub struct ExecutionContext {
    program: Arc<Program>,
    ip: usize,
    stack: Vec<Value>,
    /// Indexed like the program's variable table; `None` until first stored
    slots: Vec<Option<Value>>,
    stack_trace_enabled: bool,
    /// Offsets of executed instructions, when recording is enabled
    history: Option<Vec<usize>>,
}

impl ExecutionContext {
    pub fn new(program: Arc<Program>) -> Self {
        let slot_capacity = program.variables.len();
        Self {
            program,
            ip: 0,
            stack: Vec::with_capacity(64),
            slots: Vec::with_capacity(slot_capacity),
            stack_trace_enabled: false,
            history: None,
        }
    }

    /// Get the program being executed
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Get the current instruction pointer
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Set the instruction pointer
    pub fn set_ip(&mut self, ip: usize) {
        self.ip = ip;
    }

    /// Check if there are more instructions to execute
    pub fn has_more_instructions(&self) -> bool {
        self.ip < self.program.code.len()
    }

    /// Decode the instruction at the current instruction pointer
    pub fn fetch(&self) -> VMResult<Instruction> {
        Ok(Instruction::decode(&self.program.code, self.ip)?)
    }

    /// Enable or disable logging of the operand stack after each instruction
    pub fn set_stack_trace(&mut self, enabled: bool) {
        self.stack_trace_enabled = enabled;
    }

    pub fn stack_trace_enabled(&self) -> bool {
        self.stack_trace_enabled
    }

    /// Start recording the offset of every executed instruction
    pub fn record_history(&mut self, enabled: bool) {
        self.history = if enabled { Some(Vec::new()) } else { None };
    }

    pub(crate) fn record(&mut self, offset: usize) {
        if let Some(history) = self.history.as_mut() {
            history.push(offset);
        }
    }

    /// Offsets of the instructions executed so far, if recording
    pub fn history(&self) -> Option<&[usize]> {
        self.history.as_deref()
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> VMResult<Value> {
        self.stack.pop().ok_or(VMError::StackUnderflow)
    }

    /// Peek at the top value on the stack without removing it
    pub fn peek(&self) -> VMResult<&Value> {
        self.stack.last().ok_or(VMError::StackUnderflow)
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Get a constant from the program's pool as a runtime value
    pub fn get_constant(&self, idx: u8) -> VMResult<Value> {
        self.program
            .constant(idx)
            .map(Value::from)
            .ok_or(VMError::InvalidConstantIndex(idx))
    }

    /// Read a variable slot; slots that were never stored are undefined
    pub fn load_var(&self, idx: u8) -> VMResult<Value> {
        match self.slots.get(idx as usize) {
            Some(Some(value)) => Ok(value.clone()),
            _ => Err(VMError::UndefinedVariable {
                index: idx,
                name: self
                    .program
                    .variable_name(idx)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("#{}", idx)),
            }),
        }
    }

    /// Write a variable slot, growing the slot list when `idx` is new
    pub fn store_var(&mut self, idx: u8, value: Value) {
        let idx = idx as usize;
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, None);
        }
        trace!(slot = idx, %value, "store");
        self.slots[idx] = Some(value);
    }

    /// Number of slots created so far
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The reported result: the value in the last defined slot
    pub fn result(&self) -> VMResult<Value> {
        self.slots
            .iter()
            .rev()
            .find_map(|slot| slot.clone())
            .ok_or(VMError::NoResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Constant, OpCode};

    fn context_for(constants: Vec<Constant>, variables: &[&str]) -> ExecutionContext {
        let program = Program::new(
            vec![OpCode::LoadConst.to_byte(), 0],
            constants,
            variables.iter().map(|s| s.to_string()).collect(),
        );
        ExecutionContext::new(Arc::new(program))
    }

    #[test]
    fn test_push_pop_peek() {
        let mut ctx = context_for(vec![], &[]);
        assert_eq!(ctx.pop(), Err(VMError::StackUnderflow));
        assert_eq!(ctx.peek(), Err(VMError::StackUnderflow));

        ctx.push(Value::Integer(1));
        ctx.push(Value::Integer(2));
        assert_eq!(ctx.peek(), Ok(&Value::Integer(2)));
        assert_eq!(ctx.stack_depth(), 2);
        assert_eq!(ctx.pop(), Ok(Value::Integer(2)));
        assert_eq!(ctx.stack(), &[Value::Integer(1)]);
    }

    #[test]
    fn test_get_constant() {
        let ctx = context_for(vec![Constant::String("c".into())], &[]);
        assert_eq!(ctx.get_constant(0), Ok(Value::String("c".into())));
        assert_eq!(ctx.get_constant(1), Err(VMError::InvalidConstantIndex(1)));
    }

    #[test]
    fn test_store_and_load_var() {
        let mut ctx = context_for(vec![], &["a", "b"]);
        assert_eq!(
            ctx.load_var(0),
            Err(VMError::UndefinedVariable { index: 0, name: "a".into() })
        );

        ctx.store_var(0, Value::Integer(1));
        ctx.store_var(0, Value::Integer(2));
        assert_eq!(ctx.slot_count(), 1);
        assert_eq!(ctx.load_var(0), Ok(Value::Integer(2)));
    }

    #[test]
    fn test_store_past_gap_keeps_indices() {
        let mut ctx = context_for(vec![], &["a", "b", "c"]);
        ctx.store_var(2, Value::Boolean(true));
        assert_eq!(ctx.slot_count(), 3);
        assert_eq!(ctx.load_var(2), Ok(Value::Boolean(true)));
        assert!(matches!(ctx.load_var(1), Err(VMError::UndefinedVariable { index: 1, .. })));
    }

    #[test]
    fn test_undefined_name_outside_table() {
        let ctx = context_for(vec![], &[]);
        assert_eq!(
            ctx.load_var(7),
            Err(VMError::UndefinedVariable { index: 7, name: "#7".into() })
        );
    }

    #[test]
    fn test_result_is_last_defined_slot() {
        let mut ctx = context_for(vec![], &["x", "y", "z"]);
        assert_eq!(ctx.result(), Err(VMError::NoResult));

        ctx.store_var(0, Value::Integer(1));
        ctx.store_var(1, Value::Integer(2));
        ctx.store_var(0, Value::Integer(5));
        assert_eq!(ctx.result(), Ok(Value::Integer(2)));
    }

    #[test]
    fn test_history_recording() {
        let mut ctx = context_for(vec![], &[]);
        ctx.record(0);
        assert_eq!(ctx.history(), None);

        ctx.record_history(true);
        ctx.record(0);
        ctx.record(4);
        assert_eq!(ctx.history(), Some(&[0usize, 4][..]));
    }

    #[test]
    fn test_fetch_and_ip() {
        let mut ctx = context_for(vec![Constant::Integer(1)], &[]);
        assert!(ctx.has_more_instructions());
        assert_eq!(ctx.fetch().unwrap().opcode, OpCode::LoadConst);
        ctx.set_ip(2);
        assert_eq!(ctx.ip(), 2);
        assert!(!ctx.has_more_instructions());
    }
}
