// Code generation for expressions
//
// Walks a (possibly folded) expression tree and emits stack-machine code.
// Leaves push values, operators pop their operands, and assignments are
// encoded through the composed ASI opcodes.

use crate::tads_compiler::arena::{Node, NodeRef, Op};
use crate::tads_compiler::compiler::Compiler;
use crate::tads_compiler::error::CompilerError;
use crate::tads_compiler::lexer::{ListElement, Token, TokenKind, TokenValue};
use crate::tads_compiler::opcodes::{asi, dat, op};
use crate::tads_compiler::symbols::SymbolKind;

/// Encodes a folded list: int2 total length (including itself), then a
/// type byte and value per element
pub fn list_image(elements: &[ListElement]) -> Vec<u8> {
    let mut image = vec![0, 0];
    for element in elements {
        match element {
            ListElement::Number(n) => {
                image.push(dat::NUMBER);
                image.extend_from_slice(&n.to_le_bytes());
            }
            ListElement::SString(text) => {
                image.push(dat::SSTRING);
                image.extend_from_slice(&((text.len() + 2) as u16).to_le_bytes());
                image.extend_from_slice(text.as_bytes());
            }
            ListElement::List(inner) => {
                image.push(dat::LIST);
                image.extend_from_slice(&list_image(inner));
            }
            ListElement::Object(id) => {
                image.push(dat::OBJECT);
                image.extend_from_slice(&id.to_le_bytes());
            }
            ListElement::Function(id) => {
                image.push(dat::FNADDR);
                image.extend_from_slice(&id.to_le_bytes());
            }
            ListElement::Property(id) => {
                image.push(dat::PROPNUM);
                image.extend_from_slice(&id.to_le_bytes());
            }
            ListElement::Nil => image.push(dat::NIL),
            ListElement::True => image.push(dat::TRUE),
        }
    }
    let length = image.len() as u16;
    image[..2].copy_from_slice(&length.to_le_bytes());
    image
}

/// Operation and optional extended byte for an assignment operator
fn assignment_code(operation: Op) -> Option<(u8, u8)> {
    let code = match operation {
        Op::PreInc => (asi::INC | asi::PRE, 0),
        Op::PostInc => (asi::INC | asi::POST, 0),
        Op::PreDec => (asi::DEC | asi::PRE, 0),
        Op::PostDec => (asi::DEC | asi::POST, 0),
        Op::AddAssign => (asi::ADD, 0),
        Op::SubAssign => (asi::SUB, 0),
        Op::DivAssign => (asi::DIV, 0),
        Op::MulAssign => (asi::MUL, 0),
        Op::Assign => (asi::DIRECT, 0),
        Op::ModAssign => (asi::EXT, asi::EXT_MOD),
        Op::AndAssign => (asi::EXT, asi::EXT_BAND),
        Op::OrAssign => (asi::EXT, asi::EXT_BOR),
        Op::XorAssign => (asi::EXT, asi::EXT_XOR),
        Op::ShlAssign => (asi::EXT, asi::EXT_SHL),
        Op::ShrAssign => (asi::EXT, asi::EXT_SHR),
        _ => return None,
    };
    Some(code)
}

fn binary_opcode(operation: Op) -> Option<u8> {
    let opcode = match operation {
        Op::Add => op::ADD,
        Op::Sub => op::SUB,
        Op::Mul => op::MUL,
        Op::Div => op::DIV,
        Op::Mod => op::MOD,
        Op::Eq => op::EQ,
        Op::Ne => op::NE,
        Op::Gt => op::GT,
        Op::Ge => op::GE,
        Op::Lt => op::LT,
        Op::Le => op::LE,
        Op::BitAnd => op::BAND,
        Op::BitOr => op::BOR,
        Op::BitXor => op::XOR,
        Op::Shl => op::SHL,
        Op::Shr => op::SHR,
        _ => return None,
    };
    Some(opcode)
}

/// Opcodes and operands selected by the left side of `.`
struct DotTarget {
    direct: u8,
    pointer: u8,
    /// Evaluate the left side onto the stack first
    push_object: bool,
    object: Option<u16>,
    superclass: Option<u16>,
}

impl Compiler {
    /// Pushes the value of a leaf token
    pub(crate) fn emit_value(&mut self, token: &Token) -> Result<(), CompilerError> {
        match token.kind {
            TokenKind::Number => {
                self.emitter.emit_op(op::PUSHNUM);
                self.emitter.emit_int4(token.number());
            }
            TokenKind::SString => {
                self.emitter.emit_op(op::PUSHSTR);
                self.emitter.emit_counted_str(token.string());
            }
            TokenKind::DString => {
                self.emitter.emit_op(op::SAY);
                self.emitter.emit_counted_str(token.string());
            }
            TokenKind::List => {
                self.emitter.emit_op(op::PUSHLST);
                let image = match &token.value {
                    TokenValue::List(elements) => list_image(elements),
                    _ => list_image(&[]),
                };
                self.emitter.emit_bytes(&image);
            }
            TokenKind::Nil => self.emitter.emit_op(op::PUSHNIL),
            TokenKind::True => self.emitter.emit_op(op::PUSHTRUE),
            TokenKind::Pound => {
                self.emitter.emit_op(op::PUSHPN);
                self.emitter.emit_int2(token.property());
            }
            TokenKind::New => {
                self.emitter.emit_op(op::PUSHNIL);
                self.emitter.emit_op(op::NEW);
            }
            TokenKind::Symbol => self.emit_symbol(token)?,
            _ => {
                return Err(CompilerError::InternalError(format!(
                    "no value for {} token",
                    token.kind
                )))
            }
        }
        Ok(())
    }

    fn emit_symbol(&mut self, token: &Token) -> Result<(), CompilerError> {
        let value = token.symbol.value;
        match token.symbol.kind {
            SymbolKind::Local => {
                self.emitter.emit_op(op::GETLCL);
                self.emitter.emit_int2(value as i16 as u16);
            }
            SymbolKind::Object | SymbolKind::ForwardObject => {
                self.emitter.emit_op(op::PUSHOBJ);
                self.emitter.emit_int2(value as u16);
            }
            SymbolKind::Function | SymbolKind::ForwardFunction => {
                self.emitter.emit_op(op::PUSHFN);
                self.emitter.emit_int2(value as u16);
            }
            SymbolKind::Property => {
                if self.in_function {
                    self.log_error(CompilerError::SemanticError(
                        format!("\"self\" is not valid in a function (property \"{}\")", token.text),
                        token.line,
                    ));
                }
                self.emitter.emit_op(op::GETPSELF);
                self.emitter.emit_byte(0);
                self.emitter.emit_int2(value as u16);
            }
            SymbolKind::SelfRef => {
                if self.in_function {
                    self.log_error(CompilerError::SemanticError(
                        "\"self\" is not valid in a function".to_string(),
                        token.line,
                    ));
                }
                self.emitter.emit_op(op::PUSHSELF);
            }
            SymbolKind::Builtin => {
                self.emitter.emit_op(op::BUILTIN);
                self.emitter.emit_byte(0);
                self.emitter.emit_int2(value as u16);
            }
            SymbolKind::External => {
                self.emitter.emit_op(op::CALLEXT);
                self.emitter.emit_byte(0);
                self.emitter.emit_int2(value as u16);
            }
            SymbolKind::ArgCount => self.emitter.emit_op(op::ARGC),
            SymbolKind::Inherited => {
                return Err(CompilerError::SemanticError(
                    "\"inherited\" must be followed by a property".to_string(),
                    token.line,
                ))
            }
            SymbolKind::Label | SymbolKind::Unknown => {
                return Err(CompilerError::SemanticError(
                    format!("\"{}\" has no value", token.text),
                    token.line,
                ))
            }
        }
        Ok(())
    }

    pub(crate) fn gen_expression(&mut self, node: NodeRef) -> Result<(), CompilerError> {
        match self.arena.get(node).clone() {
            Node::Leaf(_) => {
                self.define_leaf(node, SymbolKind::ForwardObject)?;
                let token = match self.arena.token(node) {
                    Some(token) => token.clone(),
                    None => return Err(CompilerError::InternalError("leaf without token".to_string())),
                };
                self.emit_value(&token)
            }
            Node::Unary { op, operand } => self.gen_unary(op, operand),
            Node::Binary { op, left, right } => self.gen_binary(node, op, left, right),
            Node::Ternary {
                op: Op::Conditional,
                first,
                second,
                third,
            } => {
                let if_false = self.emitter.new_label()?;
                let done = self.emitter.new_label()?;
                self.gen_expression(first)?;
                self.emitter.jump(op::JF, if_false)?;
                self.gen_expression(second)?;
                self.emitter.jump(op::JMP, done)?;
                self.emitter.bind_and_release(if_false)?;
                self.gen_expression(third)?;
                self.emitter.bind_and_release(done)
            }
            Node::Ternary {
                op: Op::Dot,
                first,
                second,
                third,
            } => {
                let argc = self.gen_arguments(third)?;
                self.gen_dot(first, second, argc)
            }
            Node::Ternary { op, .. } => Err(CompilerError::InternalError(format!(
                "unexpected ternary operator {:?}",
                op
            ))),
            Node::NAry {
                op: Op::LocalInit,
                ..
            } => self.gen_local_init(node),
            Node::NAry { op, .. } => Err(CompilerError::InternalError(format!(
                "unexpected operator {:?}",
                op
            ))),
        }
    }

    fn gen_unary(&mut self, operation: Op, operand: NodeRef) -> Result<(), CompilerError> {
        let opcode = match operation {
            Op::PreInc | Op::PreDec | Op::PostInc | Op::PostDec => {
                return self.gen_lvalue(operation, operand)
            }
            Op::UnaryPlus => return self.gen_expression(operand),
            Op::Call => return self.gen_call(operand, 0),
            Op::Negate => op::NEG,
            Op::BitNot => op::BNOT,
            Op::Not => op::NOT,
            Op::New => op::NEW,
            Op::Delete => op::DELETE,
            Op::ExplicitInherit => {
                return Err(CompilerError::SemanticError(
                    "\"inherited\" must be followed by a property".to_string(),
                    self.node_line(operand),
                ))
            }
            _ => {
                return Err(CompilerError::InternalError(format!(
                    "unexpected unary operator {:?}",
                    operation
                )))
            }
        };
        self.gen_expression(operand)?;
        self.emitter.emit_op(opcode);
        Ok(())
    }

    fn gen_binary(
        &mut self,
        node: NodeRef,
        operation: Op,
        left: NodeRef,
        right: NodeRef,
    ) -> Result<(), CompilerError> {
        if let Some(opcode) = binary_opcode(operation) {
            self.gen_expression(left)?;
            self.gen_expression(right)?;
            self.emitter.emit_op(opcode);
            return Ok(());
        }
        if operation.is_assignment() {
            self.gen_expression(right)?;
            return self.gen_lvalue(operation, left);
        }

        match operation {
            Op::LogicalAnd | Op::LogicalOr => {
                let done = self.emitter.new_label()?;
                self.gen_expression(left)?;
                let jump = if operation == Op::LogicalAnd {
                    op::JSF
                } else {
                    op::JST
                };
                self.emitter.jump(jump, done)?;
                self.gen_expression(right)?;
                self.emitter.bind_and_release(done)
            }
            Op::Comma => {
                // a comma leaves one value on the stack, the right one
                self.gen_expression(left)?;
                self.emitter.emit_op(op::DISCARD);
                self.gen_expression(right)
            }
            Op::Call => {
                let argc = self.gen_arguments(right)?;
                self.gen_call(left, argc)
            }
            Op::Dot => self.gen_dot(left, right, 0),
            Op::Index => {
                self.gen_expression(left)?;
                self.gen_expression(right)?;
                self.emitter.emit_op(op::INDEX);
                Ok(())
            }
            Op::ListCons => {
                let mut count: u16 = 0;
                let mut cursor = node;
                while let Node::Binary {
                    op: Op::ListCons,
                    left,
                    right,
                } = *self.arena.get(cursor)
                {
                    self.gen_expression(left)?;
                    count += 1;
                    cursor = right;
                }
                self.emitter.emit_op(op::CONS);
                self.emitter.emit_int2(count);
                Ok(())
            }
            Op::ArgList => Err(CompilerError::SyntaxError(
                "argument list outside of a call".to_string(),
                self.node_line(node),
            )),
            _ => Err(CompilerError::InternalError(format!(
                "unexpected binary operator {:?}",
                operation
            ))),
        }
    }

    /// Pushes call arguments last to first and returns how many
    pub(crate) fn gen_arguments(&mut self, node: NodeRef) -> Result<u8, CompilerError> {
        if let Node::Binary {
            op: Op::ArgList,
            left,
            right,
        } = *self.arena.get(node)
        {
            let count = self.gen_arguments(right)?;
            self.gen_expression(left)?;
            return Ok(count.wrapping_add(1));
        }
        self.gen_expression(node)?;
        Ok(1)
    }

    /// Calls a function symbol directly, or anything else through a
    /// function pointer
    pub(crate) fn gen_call(&mut self, callee: NodeRef, argc: u8) -> Result<(), CompilerError> {
        let direct = matches!(
            self.arena.token(callee),
            Some(token) if token.kind == TokenKind::Symbol && token.symbol.kind != SymbolKind::Local
        );
        if !direct {
            self.gen_expression(callee)?;
            self.emitter.emit_op(op::PTRCALL);
            self.emitter.emit_byte(argc);
            return Ok(());
        }

        self.define_leaf(callee, SymbolKind::ForwardFunction)?;
        let token = match self.arena.token(callee) {
            Some(token) => token.clone(),
            None => return Ok(()),
        };
        let opcode = match token.symbol.kind {
            SymbolKind::Function | SymbolKind::ForwardFunction => op::CALL,
            SymbolKind::External => op::CALLEXT,
            SymbolKind::Builtin => op::BUILTIN,
            _ => {
                self.log_error(CompilerError::SemanticError(
                    format!("\"{}\" is not a function", token.text),
                    token.line,
                ));
                return Ok(());
            }
        };
        self.emitter.emit_op(opcode);
        self.emitter.emit_byte(argc);
        self.emitter.emit_int2(token.symbol.value as u16);
        Ok(())
    }

    fn dot_target(&mut self, object: NodeRef) -> Result<DotTarget, CompilerError> {
        let mut target = DotTarget {
            direct: op::GETP,
            pointer: op::PTRGETP,
            push_object: true,
            object: None,
            superclass: None,
        };

        match self.arena.get(object).clone() {
            Node::Leaf(token) if token.kind == TokenKind::Symbol => {
                self.define_leaf(object, SymbolKind::ForwardObject)?;
                let binding = self.arena.token(object).map_or(token.symbol, |t| t.symbol);
                match binding.kind {
                    SymbolKind::Inherited => {
                        target.direct = op::INHERIT;
                        target.pointer = op::PTRINH;
                        target.push_object = false;
                    }
                    SymbolKind::SelfRef => {
                        if self.in_function {
                            self.log_error(CompilerError::SemanticError(
                                "\"self\" is not valid in a function".to_string(),
                                token.line,
                            ));
                        }
                        target.direct = op::GETPSELF;
                        target.pointer = op::GETPPTRSELF;
                        target.push_object = false;
                    }
                    SymbolKind::Object | SymbolKind::ForwardObject => {
                        target.direct = op::GETPOBJ;
                        target.push_object = false;
                        target.object = Some(binding.value as u16);
                    }
                    _ => {}
                }
            }
            Node::Unary {
                op: Op::ExplicitInherit,
                operand,
            } => {
                self.define_leaf(operand, SymbolKind::ForwardObject)?;
                let superclass = self.arena.token(operand).map(|t| t.symbol);
                match superclass {
                    Some(binding) if binding.kind.is_object() => {
                        target.superclass = Some(binding.value as u16);
                    }
                    _ => {
                        return Err(CompilerError::SemanticError(
                            "\"inherited\" superclass must be an object".to_string(),
                            self.node_line(operand),
                        ))
                    }
                }
                target.direct = op::EXPINH;
                target.pointer = op::EXPINHPTR;
                target.push_object = false;
            }
            _ => {}
        }
        Ok(target)
    }

    /// Property evaluation `object.property(args)`; the arguments are
    /// already on the stack
    pub(crate) fn gen_dot(&mut self, object: NodeRef, property: NodeRef, argc: u8) -> Result<(), CompilerError> {
        let target = self.dot_target(object)?;
        let literal = self
            .arena
            .token(property)
            .filter(|t| t.kind == TokenKind::Pound)
            .map(|t| t.property());

        match literal {
            Some(prop) => {
                if target.push_object {
                    self.gen_expression(object)?;
                }
                self.emitter.emit_op(target.direct);
                self.emitter.emit_byte(argc);
                if let Some(id) = target.object {
                    self.emitter.emit_int2(id);
                }
                self.emitter.emit_int2(prop);
            }
            None => {
                if target.push_object || target.object.is_some() {
                    self.gen_expression(object)?;
                }
                self.gen_expression(property)?;
                self.emitter.emit_op(target.pointer);
                self.emitter.emit_byte(argc);
            }
        }
        if let Some(superclass) = target.superclass {
            self.emitter.emit_int2(superclass);
        }
        Ok(())
    }

    /// Stores into an assignable expression. For ordinary assignments the
    /// new value is already on the stack.
    pub(crate) fn gen_lvalue(&mut self, operation: Op, target: NodeRef) -> Result<(), CompilerError> {
        let (operation_bits, extended) = match assignment_code(operation) {
            Some(code) => code,
            None => {
                return Err(CompilerError::InternalError(format!(
                    "{:?} is not an assignment",
                    operation
                )))
            }
        };
        let opcode = asi::MASK | operation_bits;

        match self.arena.get(target).clone() {
            Node::Leaf(token) if token.kind == TokenKind::Symbol => match token.symbol.kind {
                SymbolKind::Local => {
                    self.emit_assignment(opcode | asi::LOCAL, extended);
                    self.emitter.emit_int2(token.symbol.value as i16 as u16);
                }
                SymbolKind::Property => {
                    if self.in_function {
                        self.log_error(CompilerError::SemanticError(
                            "\"self\" is not valid in a function".to_string(),
                            token.line,
                        ));
                    }
                    self.emitter.emit_op(op::PUSHSELF);
                    self.emit_assignment(opcode | asi::PROP, extended);
                    self.emitter.emit_int2(token.symbol.value as u16);
                }
                _ => self.log_error(CompilerError::InvalidAssignment(token.line)),
            },
            Node::Binary {
                op: Op::Dot,
                left,
                right,
            } => {
                self.gen_expression(left)?;
                let literal = self
                    .arena
                    .token(right)
                    .filter(|t| t.kind == TokenKind::Pound)
                    .map(|t| t.property());
                match literal {
                    Some(prop) => {
                        self.emit_assignment(opcode | asi::PROP, extended);
                        self.emitter.emit_int2(prop);
                    }
                    None => {
                        self.gen_expression(right)?;
                        self.emit_assignment(opcode | asi::PROP_PTR, extended);
                    }
                }
            }
            Node::Binary {
                op: Op::Index,
                left,
                right,
            } => {
                self.gen_expression(left)?;
                self.gen_expression(right)?;
                self.emit_assignment(opcode | asi::INDEX, extended);
                // the updated list is stored back wherever it came from
                self.gen_lvalue(Op::Assign, left)?;
            }
            _ => {
                let line = self.node_line(target);
                self.log_error(CompilerError::InvalidAssignment(line));
            }
        }
        Ok(())
    }

    fn emit_assignment(&mut self, opcode: u8, extended: u8) {
        self.emitter.emit_op(opcode);
        if extended != 0 {
            self.emitter.emit_byte(extended);
        }
    }

    /// Local initializers: (initializer, local, line, previous), emitted in
    /// declaration order. The first declaration's `previous` is a plain
    /// leaf.
    pub(crate) fn gen_local_init(&mut self, node: NodeRef) -> Result<(), CompilerError> {
        let [initializer, local, line, previous] = match *self.arena.get(node) {
            Node::NAry {
                op: Op::LocalInit,
                children,
            } => children,
            _ => return self.gen_expression(node),
        };

        if matches!(
            self.arena.get(previous),
            Node::NAry {
                op: Op::LocalInit,
                ..
            }
        ) {
            self.gen_local_init(previous)?;
        }

        if let Some(line_token) = self.arena.token(line) {
            if line_token.kind == TokenKind::Number && line_token.number() > 0 {
                let source_line = line_token.number() as usize;
                self.emit_line_record(source_line);
            }
        }

        self.gen_expression(initializer)?;
        let slot = self.arena.token(local).map_or(0, |t| t.symbol.value);
        self.emitter.emit_op(op::SETLCL);
        self.emitter.emit_int2(slot as i16 as u16);
        Ok(())
    }

    /// LINE debug record: length 6, enclosing frame, source id, line
    pub(crate) fn emit_line_record(&mut self, line: usize) {
        self.emitter.emit_op(op::LINE);
        self.emitter.emit_byte(6);
        self.emitter.emit_int2(self.frame);
        self.emitter.emit_byte(0);
        self.emitter.emit_int2(line as u16);
    }
}

#[cfg(test)]
#[path = "codegen_tests.rs"]
mod tests;
