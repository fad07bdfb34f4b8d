use std::sync::Arc;
use tracing::{debug, trace};
use crate::bytecode::{BinaryOp, CompareOp, Instruction, OpCode, Program, INSTRUCTION_WIDTH};
use crate::vm::{ExecutionContext, Value, VMError, VMResult};

/// The Virtual Machine that executes bytecode instructions
#[derive(Clone, Debug, Default)]
pub struct VM {
    stack_trace_enabled: bool,
    record_history: bool,
}

impl VM {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable stack tracing
    pub fn set_stack_trace(&mut self, enabled: bool) {
        self.stack_trace_enabled = enabled;
    }

    /// Enable or disable recording of executed instruction offsets
    pub fn set_record_history(&mut self, enabled: bool) {
        self.record_history = enabled;
    }

    /// Build a fresh context for `program` with this VM's settings applied
    pub fn create_context(&self, program: Arc<Program>) -> ExecutionContext {
        let mut context = ExecutionContext::new(program);
        context.set_stack_trace(self.stack_trace_enabled);
        context.record_history(self.record_history);
        context
    }

    /// Execute `program` in a fresh context and return its reported value
    pub fn run(&self, program: Arc<Program>) -> VMResult<Value> {
        let mut context = self.create_context(program);
        self.execute(&mut context)
    }

    /// Execute all remaining instructions in a context, then report the
    /// value of the last variable slot
    pub fn execute(&self, context: &mut ExecutionContext) -> VMResult<Value> {
        debug!(
            bytes = context.program().code.len(),
            constants = context.program().constants.len(),
            variables = context.program().variables.len(),
            "executing program"
        );

        while context.has_more_instructions() {
            let ip = context.ip();
            let instruction = context.fetch()?;
            context.record(ip);

            trace!(
                ip,
                op = instruction.opcode.mnemonic(),
                operand = instruction.operand,
                depth = context.stack_depth(),
                "execute"
            );

            let skip = self.step(context, instruction)?;

            let next = ip + INSTRUCTION_WIDTH + skip;
            let len = context.program().code.len();
            if next > len {
                return Err(VMError::InvalidJump { target: next, len });
            }
            context.set_ip(next);

            if context.stack_trace_enabled() {
                trace!(stack = ?context.stack(), "stack");
            }
        }

        context.result()
    }

    /// Run one instruction. Returns the number of extra bytes to skip
    /// (non-zero only when a jump is taken).
    fn step(&self, context: &mut ExecutionContext, instruction: Instruction) -> VMResult<usize> {
        let operand = instruction.operand;
        match instruction.opcode {
            OpCode::LoadConst => {
                let value = context.get_constant(operand)?;
                context.push(value);
            }

            OpCode::LoadVar => {
                let value = context.load_var(operand)?;
                context.push(value);
            }

            OpCode::StoreVar => {
                let value = context.pop()?;
                context.store_var(operand, value);
            }

            OpCode::CompareOp => {
                let rhs = context.pop()?;
                let lhs = context.pop()?;
                let equal = lhs.equals(&rhs);
                let result = match CompareOp::from_code(operand) {
                    CompareOp::Equal => equal,
                    CompareOp::NotEqual => !equal,
                };
                context.push(Value::Boolean(result));
            }

            OpCode::BinaryOp => {
                let rhs = context.pop()?;
                let lhs = context.pop()?;
                context.push(binary_op(BinaryOp::from_code(operand), lhs, rhs)?);
            }

            OpCode::UnaryNegate => {
                let value = context.pop()?;
                context.push(negate(value)?);
            }

            OpCode::JumpIfTrueOrPop => return jump_or_pop(context, true, operand),

            OpCode::JumpIfFalseOrPop => return jump_or_pop(context, false, operand),

            OpCode::PopJumpForwardIfFalse => return pop_jump(context, false, operand),

            OpCode::PopJumpForwardIfTrue => return pop_jump(context, true, operand),
        }
        Ok(0)
    }
}

/// Arithmetic promotes both operands to doubles; otherwise a string on
/// either side turns the operation into concatenation.
fn binary_op(op: BinaryOp, lhs: Value, rhs: Value) -> VMResult<Value> {
    if let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) {
        return Ok(Value::Float(op.apply(a, b)));
    }
    if lhs.is_string() || rhs.is_string() {
        return Ok(Value::String(format!("{}{}", lhs, rhs)));
    }
    Err(VMError::TypeMismatch {
        left: lhs.type_name(),
        right: rhs.type_name(),
    })
}

fn negate(value: Value) -> VMResult<Value> {
    match value {
        Value::Integer(i) => i.checked_neg().map(Value::Integer).ok_or(VMError::ArithmeticOverflow),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(VMError::InvalidNegation {
            type_name: other.type_name(),
        }),
    }
}

fn condition(value: &Value) -> VMResult<bool> {
    value.as_bool().ok_or(VMError::ExpectedBoolean {
        type_name: value.type_name(),
    })
}

/// Short-circuit jump: keep the value and skip when it equals `when`,
/// otherwise pop it and fall through.
fn jump_or_pop(context: &mut ExecutionContext, when: bool, offset: u8) -> VMResult<usize> {
    if condition(context.peek()?)? == when {
        return Ok(offset as usize);
    }
    context.pop()?;
    Ok(0)
}

fn pop_jump(context: &mut ExecutionContext, when: bool, offset: u8) -> VMResult<usize> {
    let value = context.pop()?;
    if condition(&value)? == when {
        Ok(offset as usize)
    } else {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Constant;

    const ADD: u8 = 0x20;
    const SUB: u8 = 0x21;
    const MUL: u8 = 0x22;
    const DIV: u8 = 0x23;

    /// Helper function to assemble a program from (opcode, operand) pairs
    fn program(instructions: &[(OpCode, u8)], constants: Vec<Constant>, variables: &[&str]) -> Arc<Program> {
        let mut code = Vec::new();
        for (opcode, operand) in instructions {
            Instruction::new(*opcode, *operand).encode_into(&mut code);
        }
        Arc::new(Program::new(
            code,
            constants,
            variables.iter().map(|s| s.to_string()).collect(),
        ))
    }

    fn run(instructions: &[(OpCode, u8)], constants: Vec<Constant>, variables: &[&str]) -> VMResult<Value> {
        VM::new().run(program(instructions, constants, variables))
    }

    /// Evaluate `c0 <op> c1` and store it into slot 0
    fn eval_binary(lhs: Constant, rhs: Constant, op: OpCode, code: u8) -> VMResult<Value> {
        run(
            &[
                (OpCode::LoadConst, 0),
                (OpCode::LoadConst, 1),
                (op, code),
                (OpCode::StoreVar, 0),
            ],
            vec![lhs, rhs],
            &["r"],
        )
    }

    #[test]
    fn test_store_and_report() {
        let result = run(
            &[(OpCode::LoadConst, 0), (OpCode::StoreVar, 0)],
            vec![Constant::Integer(42)],
            &["x"],
        );
        assert_eq!(result, Ok(Value::Integer(42)));
    }

    #[test]
    fn test_integer_arithmetic_promotes_to_double() {
        let r = eval_binary(Constant::Integer(1), Constant::Integer(2), OpCode::BinaryOp, ADD);
        assert_eq!(r, Ok(Value::Float(3.0)));
        let r = eval_binary(Constant::Integer(10), Constant::Integer(4), OpCode::BinaryOp, SUB);
        assert_eq!(r, Ok(Value::Float(6.0)));
        let r = eval_binary(Constant::Integer(3), Constant::Float(0.5), OpCode::BinaryOp, MUL);
        assert_eq!(r, Ok(Value::Float(1.5)));
        let r = eval_binary(Constant::Integer(9), Constant::Integer(10), OpCode::BinaryOp, DIV);
        assert_eq!(r, Ok(Value::Float(0.9)));
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        let r = eval_binary(Constant::Integer(1), Constant::Integer(0), OpCode::BinaryOp, DIV);
        assert_eq!(r, Ok(Value::Float(f64::INFINITY)));
    }

    #[test]
    fn test_string_concatenation_coerces() {
        let r = eval_binary(Constant::String("n".into()), Constant::Integer(5), OpCode::BinaryOp, ADD);
        assert_eq!(r, Ok(Value::String("n5".into())));
        let r = eval_binary(Constant::Float(2.5), Constant::String("!".into()), OpCode::BinaryOp, ADD);
        assert_eq!(r, Ok(Value::String("2.5!".into())));
        let r = eval_binary(Constant::String("b".into()), Constant::Boolean(true), OpCode::BinaryOp, ADD);
        assert_eq!(r, Ok(Value::String("bTrue".into())));
    }

    #[test]
    fn test_binary_type_mismatch() {
        let r = eval_binary(Constant::Boolean(true), Constant::Integer(1), OpCode::BinaryOp, ADD);
        assert_eq!(r, Err(VMError::TypeMismatch { left: "Boolean", right: "Int64" }));
    }

    #[test]
    fn test_compare_promotes_numbers() {
        let r = eval_binary(Constant::Integer(1), Constant::Float(1.0), OpCode::CompareOp, 0x10);
        assert_eq!(r, Ok(Value::Boolean(true)));
        let r = eval_binary(Constant::Integer(1), Constant::Float(1.0), OpCode::CompareOp, 0x11);
        assert_eq!(r, Ok(Value::Boolean(false)));
    }

    #[test]
    fn test_compare_structural() {
        let r = eval_binary(Constant::String("a".into()), Constant::String("a".into()), OpCode::CompareOp, 0x10);
        assert_eq!(r, Ok(Value::Boolean(true)));
        let r = eval_binary(Constant::Integer(1), Constant::String("1".into()), OpCode::CompareOp, 0x10);
        assert_eq!(r, Ok(Value::Boolean(false)));
        // Unrecognized comparison codes test inequality
        let r = eval_binary(Constant::Boolean(true), Constant::Boolean(false), OpCode::CompareOp, 0x42);
        assert_eq!(r, Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_negate_preserves_subtype() {
        let r = run(
            &[(OpCode::LoadConst, 0), (OpCode::UnaryNegate, 0), (OpCode::StoreVar, 0)],
            vec![Constant::Integer(42)],
            &["x"],
        );
        assert_eq!(r, Ok(Value::Integer(-42)));

        let r = run(
            &[(OpCode::LoadConst, 0), (OpCode::UnaryNegate, 0), (OpCode::StoreVar, 0)],
            vec![Constant::Float(0.5)],
            &["x"],
        );
        assert_eq!(r, Ok(Value::Float(-0.5)));
    }

    #[test]
    fn test_negate_errors() {
        let r = run(
            &[(OpCode::LoadConst, 0), (OpCode::UnaryNegate, 0), (OpCode::StoreVar, 0)],
            vec![Constant::String("s".into())],
            &["x"],
        );
        assert_eq!(r, Err(VMError::InvalidNegation { type_name: "String" }));

        let r = run(
            &[(OpCode::LoadConst, 0), (OpCode::UnaryNegate, 0), (OpCode::StoreVar, 0)],
            vec![Constant::Integer(i64::MIN)],
            &["x"],
        );
        assert_eq!(r, Err(VMError::ArithmeticOverflow));
    }

    #[test]
    fn test_jump_if_false_or_pop_short_circuits() {
        // t = false and true
        let prog = program(
            &[
                (OpCode::LoadConst, 0),        // 0
                (OpCode::JumpIfFalseOrPop, 2), // 2
                (OpCode::LoadConst, 1),        // 4 (skipped)
                (OpCode::StoreVar, 0),         // 6
            ],
            vec![Constant::Boolean(false), Constant::Boolean(true)],
            &["t"],
        );
        let mut vm = VM::new();
        vm.set_record_history(true);
        let mut ctx = vm.create_context(prog);
        assert_eq!(vm.execute(&mut ctx), Ok(Value::Boolean(false)));
        assert_eq!(ctx.history(), Some(&[0usize, 2, 6][..]));
        assert_eq!(ctx.stack_depth(), 0);
    }

    #[test]
    fn test_jump_if_true_or_pop_falls_through() {
        // t = false or true
        let prog = program(
            &[
                (OpCode::LoadConst, 0),
                (OpCode::JumpIfTrueOrPop, 2),
                (OpCode::LoadConst, 1),
                (OpCode::StoreVar, 0),
            ],
            vec![Constant::Boolean(false), Constant::Boolean(true)],
            &["t"],
        );
        let mut vm = VM::new();
        vm.set_record_history(true);
        let mut ctx = vm.create_context(prog);
        assert_eq!(vm.execute(&mut ctx), Ok(Value::Boolean(true)));
        assert_eq!(ctx.history(), Some(&[0usize, 2, 4, 6][..]));
    }

    #[test]
    fn test_short_circuit_requires_boolean() {
        let r = run(
            &[(OpCode::LoadConst, 0), (OpCode::JumpIfTrueOrPop, 2), (OpCode::LoadConst, 0)],
            vec![Constant::Integer(1)],
            &[],
        );
        assert_eq!(r, Err(VMError::ExpectedBoolean { type_name: "Int64" }));
    }

    #[test]
    fn test_pop_jump_forward() {
        // Pops the condition and jumps over the store of 1
        let instructions = |op| {
            [
                (OpCode::LoadConst, 2),
                (OpCode::StoreVar, 0), // x = 0
                (OpCode::LoadConst, 0),
                (op, 4),
                (OpCode::LoadConst, 1),
                (OpCode::StoreVar, 0), // x = 1 (skipped when jumping)
            ]
        };
        let constants = || vec![Constant::Boolean(true), Constant::Integer(1), Constant::Integer(0)];

        let r = run(&instructions(OpCode::PopJumpForwardIfTrue), constants(), &["x"]);
        assert_eq!(r, Ok(Value::Integer(0)));
        let r = run(&instructions(OpCode::PopJumpForwardIfFalse), constants(), &["x"]);
        assert_eq!(r, Ok(Value::Integer(1)));
    }

    #[test]
    fn test_jump_past_end_is_rejected() {
        let r = run(
            &[(OpCode::LoadConst, 0), (OpCode::JumpIfTrueOrPop, 10)],
            vec![Constant::Boolean(true)],
            &[],
        );
        assert_eq!(r, Err(VMError::InvalidJump { target: 14, len: 4 }));
    }

    #[test]
    fn test_undefined_variable() {
        let r = run(
            &[(OpCode::LoadVar, 0), (OpCode::StoreVar, 1)],
            vec![],
            &["ghost", "y"],
        );
        assert_eq!(r, Err(VMError::UndefinedVariable { index: 0, name: "ghost".into() }));
    }

    #[test]
    fn test_unknown_opcode() {
        let prog = Arc::new(Program::new(vec![0x01, 0x00, 0xFE, 0x00], vec![Constant::Integer(1)], vec![]));
        assert_eq!(
            VM::new().run(prog),
            Err(VMError::UnknownOpcode { byte: 0xFE, offset: 2 })
        );
    }

    #[test]
    fn test_truncated_instruction() {
        let prog = Arc::new(Program::new(vec![0x01], vec![], vec![]));
        assert_eq!(VM::new().run(prog), Err(VMError::TruncatedInstruction { offset: 0 }));
    }

    #[test]
    fn test_invalid_constant_index() {
        let r = run(&[(OpCode::LoadConst, 3)], vec![], &[]);
        assert_eq!(r, Err(VMError::InvalidConstantIndex(3)));
    }

    #[test]
    fn test_store_on_empty_stack() {
        let r = run(&[(OpCode::StoreVar, 0)], vec![], &["x"]);
        assert_eq!(r, Err(VMError::StackUnderflow));
    }

    #[test]
    fn test_no_result_without_stores() {
        let r = run(&[(OpCode::LoadConst, 0)], vec![Constant::Integer(1)], &[]);
        assert_eq!(r, Err(VMError::NoResult));
    }

    #[test]
    fn test_expression_values_accumulate() {
        let prog = program(
            &[(OpCode::LoadConst, 0), (OpCode::LoadConst, 1), (OpCode::LoadConst, 0), (OpCode::StoreVar, 0)],
            vec![Constant::Integer(1), Constant::Integer(2)],
            &["x"],
        );
        let vm = VM::new();
        let mut ctx = vm.create_context(prog);
        assert_eq!(vm.execute(&mut ctx), Ok(Value::Integer(1)));
        assert_eq!(ctx.stack(), &[Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn test_fresh_context_per_run() {
        let prog = program(
            &[(OpCode::LoadConst, 0), (OpCode::StoreVar, 0)],
            vec![Constant::Integer(7)],
            &["x"],
        );
        let vm = VM::new();
        assert_eq!(vm.run(prog.clone()), Ok(Value::Integer(7)));
        assert_eq!(vm.run(prog), Ok(Value::Integer(7)));
    }
}
