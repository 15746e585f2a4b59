//! Single-pass Pratt compiler: walks tokens once, emitting bytecode
//! directly into a [`Chunk`] as it parses, with local-slot resolution and
//! panic-mode error recovery.

use lox_core::{copy_string, Chunk, Heap, OpCode, Table, Value};

use crate::error::CompileError;
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};

/// Operator-precedence ladder, lowest to highest. Derived ordering relies
/// on declaration order matching this ladder exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn one_higher(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

type ParseFn<'src, 'h> = fn(&mut Compiler<'src, 'h>, bool);

struct ParseRule<'src, 'h> {
    prefix: Option<ParseFn<'src, 'h>>,
    infix: Option<ParseFn<'src, 'h>>,
    precedence: Precedence,
}

#[derive(Clone, Copy)]
struct Local<'src> {
    name: &'src str,
    /// `None` is the sentinel "declared but not yet initialized" state.
    depth: Option<usize>,
}

struct Parser<'src> {
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    errors: Vec<String>,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str) -> Self {
        let placeholder = Token::new(TokenKind::Eof, "", 0);
        Parser {
            scanner: Scanner::new(source),
            current: placeholder,
            previous: placeholder,
            had_error: false,
            panic_mode: false,
            errors: Vec::new(),
        }
    }
}

/// Maximum number of local-variable slots, bounded by the one-byte operand
/// that addresses them.
const MAX_LOCALS: usize = 256;

struct Compiler<'src, 'h> {
    parser: Parser<'src>,
    chunk: Chunk,
    heap: &'h mut Heap,
    strings: &'h mut Table,
    locals: Vec<Local<'src>>,
    scope_depth: usize,
}

/// Compiles `source` into a finished [`Chunk`], interning string constants
/// through `heap`/`strings` as it goes.
pub fn compile(source: &str, heap: &mut Heap, strings: &mut Table) -> Result<Chunk, CompileError> {
    let mut compiler = Compiler {
        parser: Parser::new(source),
        chunk: Chunk::new(),
        heap,
        strings,
        locals: Vec::new(),
        scope_depth: 0,
    };
    compiler.run();

    if compiler.parser.had_error {
        Err(CompileError::new(compiler.parser.errors))
    } else {
        Ok(compiler.chunk)
    }
}

impl<'src, 'h> Compiler<'src, 'h> {
    fn run(&mut self) {
        self.advance();
        while !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.emit_op(OpCode::Return);
    }

    // ---- token stream plumbing ----

    fn advance(&mut self) {
        self.parser.previous = self.parser.current;
        loop {
            self.parser.current = self.parser.scanner.scan_token();
            if self.parser.current.kind != TokenKind::Error {
                break;
            }
            let message = self.parser.current.lexeme.to_string();
            self.error_at_current(&message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.parser.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.parser.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.parser.current;
        self.error_at(token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.parser.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.parser.panic_mode {
            return;
        }
        self.parser.panic_mode = true;

        let mut text = format!("[line {}] Error", token.line);
        match token.kind {
            TokenKind::Eof => text.push_str(" at end"),
            TokenKind::Error => {}
            _ => text.push_str(&format!(" at '{}'", token.lexeme)),
        }
        text.push_str(&format!(": {message}"));

        self.parser.errors.push(text);
        self.parser.had_error = true;
    }

    fn synchronize(&mut self) {
        self.parser.panic_mode = false;
        while self.parser.current.kind != TokenKind::Eof {
            if self.parser.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.parser.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // ---- bytecode emission ----

    fn emit_byte(&mut self, byte: u8) {
        let line = self.parser.previous.line;
        self.chunk.write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_bytes(&mut self, a: u8, b: u8) {
        self.emit_byte(a);
        self.emit_byte(b);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        match self.chunk.add_constant(value) {
            Ok(index) => index,
            Err(_) => {
                self.error("Too many constants in one chunk.");
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_bytes(OpCode::Constant as u8, index);
    }

    // ---- declarations and statements ----

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.parser.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");

        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");

        self.define_variable(global);
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.scope_depth -= 1;
        while let Some(local) = self.locals.last() {
            if local.depth.is_some_and(|d| d > self.scope_depth) {
                self.emit_op(OpCode::Pop);
                self.locals.pop();
            } else {
                break;
            }
        }
    }

    // ---- expressions ----

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix_rule = Self::get_rule(self.parser.previous.kind).prefix;
        let Some(prefix_rule) = prefix_rule else {
            self.error("Expect expression.");
            return;
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix_rule(self, can_assign);

        while precedence <= Self::get_rule(self.parser.current.kind).precedence {
            self.advance();
            let infix_rule = Self::get_rule(self.parser.previous.kind)
                .infix
                .expect("infix rule must exist for any token reached via the precedence table");
            infix_rule(self, can_assign);
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn get_rule(kind: TokenKind) -> ParseRule<'src, 'h> {
        use TokenKind::*;
        match kind {
            LeftParen => ParseRule { prefix: Some(Self::grouping), infix: None, precedence: Precedence::None },
            Minus => ParseRule {
                prefix: Some(Self::unary),
                infix: Some(Self::binary),
                precedence: Precedence::Term,
            },
            Plus => ParseRule { prefix: None, infix: Some(Self::binary), precedence: Precedence::Term },
            Slash | Star => {
                ParseRule { prefix: None, infix: Some(Self::binary), precedence: Precedence::Factor }
            }
            Bang => ParseRule { prefix: Some(Self::unary), infix: None, precedence: Precedence::None },
            BangEqual | EqualEqual => {
                ParseRule { prefix: None, infix: Some(Self::binary), precedence: Precedence::Equality }
            }
            Greater | GreaterEqual | Less | LessEqual => {
                ParseRule { prefix: None, infix: Some(Self::binary), precedence: Precedence::Comparison }
            }
            Number => ParseRule { prefix: Some(Self::number), infix: None, precedence: Precedence::None },
            String => ParseRule { prefix: Some(Self::string), infix: None, precedence: Precedence::None },
            Identifier => {
                ParseRule { prefix: Some(Self::variable), infix: None, precedence: Precedence::None }
            }
            False | True | Nil => {
                ParseRule { prefix: Some(Self::literal), infix: None, precedence: Precedence::None }
            }
            _ => ParseRule { prefix: None, infix: None, precedence: Precedence::None },
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.parser.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!("unary() called with a non-unary operator"),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.parser.previous.kind;
        let rule = Self::get_rule(operator);
        self.parse_precedence(rule.precedence.one_higher());
        match operator {
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            _ => unreachable!("binary() called with a non-binary operator"),
        }
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.parser.previous.lexeme.parse().expect("scanner only emits valid number lexemes");
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = self.parser.previous.lexeme;
        let contents = &lexeme[1..lexeme.len() - 1];
        let handle = copy_string(contents, self.heap, self.strings);
        self.emit_constant(Value::Object(handle));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.parser.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => unreachable!("literal() called with a non-literal token"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.parser.previous;
        self.named_variable(name, can_assign);
    }

    fn named_variable(&mut self, name: Token<'src>, can_assign: bool) {
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(name) {
            if self.locals[slot].depth.is_none() {
                self.error("Can't read local variable in its own initializer.");
            }
            (OpCode::GetLocal, OpCode::SetLocal, slot as u8)
        } else {
            let constant = self.identifier_constant(name);
            (OpCode::GetGlobal, OpCode::SetGlobal, constant)
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_bytes(set_op as u8, arg);
        } else {
            self.emit_bytes(get_op as u8, arg);
        }
    }

    fn identifier_constant(&mut self, name: Token<'src>) -> u8 {
        let handle = copy_string(name.lexeme, self.heap, self.strings);
        self.make_constant(Value::Object(handle))
    }

    fn resolve_local(&mut self, name: Token<'src>) -> Option<usize> {
        for (i, local) in self.locals.iter().enumerate().rev() {
            if local.name == name.lexeme {
                return Some(i);
            }
        }
        None
    }

    fn add_local(&mut self, name: &'src str) {
        if self.locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.locals.push(Local { name, depth: None });
    }

    fn declare_variable(&mut self) {
        if self.scope_depth == 0 {
            return;
        }
        let name = self.parser.previous;
        for local in self.locals.iter().rev() {
            if let Some(depth) = local.depth {
                if depth < self.scope_depth {
                    break;
                }
            }
            if local.name == name.lexeme {
                self.error("Already a variable with this name in this scope.");
            }
        }
        self.add_local(name.lexeme);
    }

    fn parse_variable(&mut self, error_message: &str) -> u8 {
        self.consume(TokenKind::Identifier, error_message);
        self.declare_variable();
        if self.scope_depth > 0 {
            return 0;
        }
        let name = self.parser.previous;
        self.identifier_constant(name)
    }

    fn mark_initialized(&mut self) {
        if self.scope_depth == 0 {
            return;
        }
        if let Some(local) = self.locals.last_mut() {
            local.depth = Some(self.scope_depth);
        }
    }

    fn define_variable(&mut self, global: u8) {
        if self.scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_bytes(OpCode::DefineGlobal as u8, global);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_arithmetic_expression_statement() {
        let mut heap = Heap::new();
        let mut strings = Table::new();
        let chunk = compile("1 + 2 * 3;", &mut heap, &mut strings).unwrap();
        assert!(!chunk.is_empty());
    }

    #[test]
    fn reports_expect_expression_on_bare_operator() {
        let mut heap = Heap::new();
        let mut strings = Table::new();
        let err = compile("+ 1;", &mut heap, &mut strings).unwrap_err();
        assert!(err.messages().iter().any(|m| m.contains("Expect expression.")));
    }

    #[test]
    fn reports_self_reference_in_own_initializer() {
        let mut heap = Heap::new();
        let mut strings = Table::new();
        let source = "{ var a = 10; { var a = a + 1; print a; } print a; }";
        let err = compile(source, &mut heap, &mut strings).unwrap_err();
        assert!(err
            .messages()
            .iter()
            .any(|m| m.contains("Can't read local variable in its own initializer.")));
    }

    #[test]
    fn accumulates_multiple_errors_across_synchronize() {
        let mut heap = Heap::new();
        let mut strings = Table::new();
        let err = compile("var = 1; var = 2;", &mut heap, &mut strings).unwrap_err();
        assert!(err.messages().len() >= 2);
    }

    #[test]
    fn duplicate_local_in_same_scope_is_rejected() {
        let mut heap = Heap::new();
        let mut strings = Table::new();
        let err = compile("{ var a = 1; var a = 2; }", &mut heap, &mut strings).unwrap_err();
        assert!(err
            .messages()
            .iter()
            .any(|m| m.contains("Already a variable with this name in this scope.")));
    }

    #[test]
    fn shadowing_in_nested_scope_is_allowed() {
        let mut heap = Heap::new();
        let mut strings = Table::new();
        let source = "{ var a = 1; { var a = 2; print a; } print a; }";
        assert!(compile(source, &mut heap, &mut strings).is_ok());
    }
}
