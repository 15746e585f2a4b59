//! The stack-based bytecode interpreter: fetch/decode/execute loop, value
//! stack, globals table, and the heap/intern-set pair the compiler also
//! writes into.

use std::io::Write;

use lox_core::{take_string, Chunk, Heap, OpCode, Table, Value};
use lox_compiler::disassembler;

use crate::error::{InterpretResult, RuntimeError};

/// Matches the reference implementation's fixed-depth value stack.
const STACK_MAX: usize = 256;

/// Owns every piece of process-wide interpreter state: the heap, the
/// string intern set, globals, and the value stack. Generic over its
/// print sink so tests can capture `PRINT` output without spawning a
/// subprocess; the CLI instantiates this with real stdout.
pub struct Vm<W: Write> {
    heap: Heap,
    strings: Table,
    globals: Table,
    stack: Vec<Value>,
    stdout: W,
    trace: bool,
    current_line: usize,
}

impl<W: Write> Vm<W> {
    pub fn new(stdout: W) -> Self {
        Vm {
            heap: Heap::new(),
            strings: Table::new(),
            globals: Table::new(),
            stack: Vec::with_capacity(STACK_MAX),
            stdout,
            trace: false,
            current_line: 0,
        }
    }

    /// Enables per-instruction disassembly to stderr before each run.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Compiles and executes `source`. Compile diagnostics and runtime
    /// faults are printed to stderr as they're discovered; this only
    /// reports which of the two outcomes (if either) occurred.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let chunk = match lox_compiler::compile(source, &mut self.heap, &mut self.strings) {
            Ok(chunk) => chunk,
            Err(err) => {
                for message in err.messages() {
                    eprintln!("{message}");
                }
                return InterpretResult::CompileError;
            }
        };

        if self.trace {
            eprint!("{}", disassembler::disassemble_chunk(&chunk, "code", &self.heap));
        }

        match self.run(&chunk) {
            Ok(()) => InterpretResult::Ok,
            Err(_) => InterpretResult::RuntimeError,
        }
    }

    fn run(&mut self, chunk: &Chunk) -> Result<(), RuntimeError> {
        let mut ip = 0usize;

        loop {
            let opcode_offset = ip;
            let byte = chunk.byte(ip);
            ip += 1;
            self.current_line = chunk.line(opcode_offset);

            let op = OpCode::try_from(byte).expect("compiler never emits an unknown opcode");

            match op {
                OpCode::Constant => {
                    let index = chunk.byte(ip);
                    ip += 1;
                    let value = chunk.constant(index);
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = chunk.byte(ip) as usize;
                    ip += 1;
                    let value = self.stack[slot];
                    self.push(value)?;
                }
                OpCode::SetLocal => {
                    let slot = chunk.byte(ip) as usize;
                    ip += 1;
                    self.stack[slot] = self.peek(0);
                }
                OpCode::DefineGlobal => {
                    let index = chunk.byte(ip);
                    ip += 1;
                    let name = self.constant_name(chunk, index);
                    let value = self.pop();
                    self.globals.set(name, value, &self.heap);
                }
                OpCode::GetGlobal => {
                    let index = chunk.byte(ip);
                    ip += 1;
                    let name = self.constant_name(chunk, index);
                    match self.globals.get(name, &self.heap) {
                        Some(value) => self.push(value)?,
                        None => {
                            let message = format!("Undefined variable '{}'.", self.heap.as_str(name));
                            return Err(self.runtime_error(&message));
                        }
                    }
                }
                OpCode::SetGlobal => {
                    let index = chunk.byte(ip);
                    ip += 1;
                    let name = self.constant_name(chunk, index);
                    if self.globals.get(name, &self.heap).is_none() {
                        let message = format!("Undefined variable '{}'.", self.heap.as_str(name));
                        return Err(self.runtime_error(&message));
                    }
                    let value = self.peek(0);
                    self.globals.set(name, value, &self.heap);
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b))?;
                }
                OpCode::Greater => self.numeric_binary(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.numeric_binary(|a, b| Value::Bool(a < b))?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.numeric_binary(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.numeric_binary(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.numeric_binary(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()))?;
                }
                OpCode::Negate => {
                    match self.peek(0).as_number() {
                        Some(n) => {
                            self.pop();
                            self.push(Value::Number(-n))?;
                        }
                        None => return Err(self.runtime_error("Operand must be a number.")),
                    }
                }
                OpCode::Print => {
                    let value = self.pop();
                    let _ = writeln!(self.stdout, "{}", value.display(&self.heap));
                }
                OpCode::Return => return Ok(()),
            }
        }
    }

    fn constant_name(&self, chunk: &Chunk, index: u8) -> lox_core::ObjHandle {
        chunk
            .constant(index)
            .as_object()
            .expect("name-constant operands are always interned strings")
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        let b = self.peek(0);
        let a = self.peek(1);

        if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
            self.pop();
            self.pop();
            self.push(Value::Number(x + y))?;
            return Ok(());
        }

        if let (Some(ha), Some(hb)) = (a.as_object(), b.as_object()) {
            self.pop();
            self.pop();
            let mut combined = String::with_capacity(self.heap.as_str(ha).len() + self.heap.as_str(hb).len());
            combined.push_str(self.heap.as_str(ha));
            combined.push_str(self.heap.as_str(hb));
            let handle = take_string(combined, &mut self.heap, &mut self.strings);
            self.push(Value::Object(handle))?;
            return Ok(());
        }

        Err(self.runtime_error("Operands must be two numbers or two strings."))
    }

    fn numeric_binary(&mut self, op: impl Fn(f64, f64) -> Value) -> Result<(), RuntimeError> {
        let b = self.peek(0);
        let a = self.peek(1);
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => {
                self.pop();
                self.pop();
                self.push(op(x, y))?;
                Ok(())
            }
            _ => Err(self.runtime_error("Operands must be numbers.")),
        }
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(self.runtime_error("Stack overflow."));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("compiler-emitted bytecode never pops an empty stack")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn runtime_error(&mut self, message: &str) -> RuntimeError {
        eprintln!("{message}");
        eprintln!("[line {}] in script", self.current_line);
        self.stack.clear();
        RuntimeError::new(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_source(source: &str) -> (InterpretResult, String) {
        let mut out = Vec::new();
        let mut vm = Vm::new(&mut out);
        let result = vm.interpret(source);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn arithmetic_precedence() {
        let (result, out) = run_source("print 1 + 2 * 3;");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(out, "7\n");
    }

    #[test]
    fn grouping_overrides_precedence() {
        let (result, out) = run_source("print (1 + 2) * 3;");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(out, "9\n");
    }

    #[test]
    fn string_concatenation() {
        let (result, out) = run_source("print \"foo\" + \"bar\";");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(out, "foobar\n");
    }

    #[test]
    fn truthiness_of_not() {
        let (result, out) = run_source("print !nil; print !true; print !0;");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(out, "true\nfalse\nfalse\n");
    }

    #[test]
    fn globals_roundtrip() {
        let (result, out) = run_source("var a = 1; var b = 2; print a + b;");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(out, "3\n");
    }

    #[test]
    fn self_reference_in_initializer_is_compile_error() {
        let source = "{ var a = 10; { var a = a + 1; print a; } print a; }";
        let (result, _) = run_source(source);
        assert_eq!(result, InterpretResult::CompileError);
    }

    #[test]
    fn adding_number_and_string_is_runtime_error() {
        let (result, _) = run_source("print 1 + \"x\";");
        assert_eq!(result, InterpretResult::RuntimeError);
    }

    #[test]
    fn negating_bool_is_runtime_error() {
        let (result, _) = run_source("print -true;");
        assert_eq!(result, InterpretResult::RuntimeError);
    }

    #[test]
    fn reading_undefined_name_is_runtime_error() {
        let (result, _) = run_source("print undefined_name;");
        assert_eq!(result, InterpretResult::RuntimeError);
    }

    #[test]
    fn block_scopes_pop_their_locals() {
        let (result, out) = run_source("{ var a = 1; { var b = a + 1; print b; } print a; }");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(out, "2\n1\n");
    }

    #[test]
    fn assignment_to_undefined_global_is_runtime_error() {
        let (result, _) = run_source("x = 1;");
        assert_eq!(result, InterpretResult::RuntimeError);
    }

    #[test]
    fn assignment_is_an_expression() {
        let (result, out) = run_source("var a = 1; print a = 2;");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(out, "2\n");
    }
}
