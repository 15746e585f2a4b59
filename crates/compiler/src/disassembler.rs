//! Instruction-level tracing: formats a chunk's bytecode as human-readable
//! text, one instruction per line.

use lox_core::{Chunk, Heap, OpCode};

/// Disassembles every instruction in `chunk`, prefixed with `name` as a
/// header line.
pub fn disassemble_chunk(chunk: &Chunk, name: &str, heap: &Heap) -> String {
    let mut out = format!("== {name} ==\n");
    let mut offset = 0;
    while offset < chunk.len() {
        let (line, next) = disassemble_instruction(chunk, offset, heap);
        out.push_str(&line);
        out.push('\n');
        offset = next;
    }
    out
}

/// Formats the single instruction at `offset` and returns it alongside the
/// offset of the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, heap: &Heap) -> (String, usize) {
    let mut out = format!("{offset:04} ");

    if offset > 0 && chunk.line(offset) == chunk.line(offset - 1) {
        out.push_str("   | ");
    } else {
        out.push_str(&format!("{:4} ", chunk.line(offset)));
    }

    let byte = chunk.byte(offset);
    match OpCode::try_from(byte) {
        Ok(op) => match op {
            OpCode::Constant => constant_instruction("OP_CONSTANT", chunk, offset, heap, &mut out),
            OpCode::Nil => simple_instruction("OP_NIL", offset, &mut out),
            OpCode::True => simple_instruction("OP_TRUE", offset, &mut out),
            OpCode::False => simple_instruction("OP_FALSE", offset, &mut out),
            OpCode::Pop => simple_instruction("OP_POP", offset, &mut out),
            OpCode::GetLocal => byte_instruction("OP_GET_LOCAL", chunk, offset, &mut out),
            OpCode::SetLocal => byte_instruction("OP_SET_LOCAL", chunk, offset, &mut out),
            OpCode::DefineGlobal => {
                constant_instruction("OP_DEFINE_GLOBAL", chunk, offset, heap, &mut out)
            }
            OpCode::GetGlobal => constant_instruction("OP_GET_GLOBAL", chunk, offset, heap, &mut out),
            OpCode::SetGlobal => constant_instruction("OP_SET_GLOBAL", chunk, offset, heap, &mut out),
            OpCode::Equal => simple_instruction("OP_EQUAL", offset, &mut out),
            OpCode::Greater => simple_instruction("OP_GREATER", offset, &mut out),
            OpCode::Less => simple_instruction("OP_LESS", offset, &mut out),
            OpCode::Add => simple_instruction("OP_ADD", offset, &mut out),
            OpCode::Subtract => simple_instruction("OP_SUBTRACT", offset, &mut out),
            OpCode::Multiply => simple_instruction("OP_MULTIPLY", offset, &mut out),
            OpCode::Divide => simple_instruction("OP_DIVIDE", offset, &mut out),
            OpCode::Not => simple_instruction("OP_NOT", offset, &mut out),
            OpCode::Negate => simple_instruction("OP_NEGATE", offset, &mut out),
            OpCode::Print => simple_instruction("OP_PRINT", offset, &mut out),
            OpCode::Return => simple_instruction("OP_RETURN", offset, &mut out),
        },
        Err(unknown) => {
            out.push_str(&format!("Unknown opcode {unknown}"));
            return (out, offset + 1);
        }
    }
}

fn simple_instruction(name: &str, offset: usize, out: &mut String) -> (String, usize) {
    out.push_str(name);
    (std::mem::take(out), offset + 1)
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize, out: &mut String) -> (String, usize) {
    let slot = chunk.byte(offset + 1);
    out.push_str(&format!("{name:-16} {slot:4}"));
    (std::mem::take(out), offset + 2)
}

fn constant_instruction(
    name: &str,
    chunk: &Chunk,
    offset: usize,
    heap: &Heap,
    out: &mut String,
) -> (String, usize) {
    let index = chunk.byte(offset + 1);
    let value = chunk.constant(index);
    out.push_str(&format!("{name:-16} {index:4} '{}'", value.display(heap)));
    (std::mem::take(out), offset + 2)
}
