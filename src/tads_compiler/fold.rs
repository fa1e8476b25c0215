// Constant folding
//
// Post-order rewrite of an expression tree. A node becomes a literal leaf
// only when all of its children already are; everything else is returned
// with whatever of its subtrees did fold.

use crate::tads_compiler::arena::{Node, NodeRef, Op};
use crate::tads_compiler::compiler::Compiler;
use crate::tads_compiler::error::CompilerError;
use crate::tads_compiler::lexer::{ListElement, Token, TokenKind, TokenValue};
use crate::tads_compiler::symbols::SymbolKind;

fn is_constant(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number
            | TokenKind::SString
            | TokenKind::List
            | TokenKind::Nil
            | TokenKind::True
            | TokenKind::Pound
    )
}

/// Truth value of a number, nil or true literal
fn logical(token: &Token) -> Option<bool> {
    match token.kind {
        TokenKind::Number => Some(token.number() != 0),
        TokenKind::Nil => Some(false),
        TokenKind::True => Some(true),
        _ => None,
    }
}

fn boolean_token(value: bool, line: usize) -> Token {
    if value {
        Token::synthetic(TokenKind::True, TokenValue::None, line)
    } else {
        Token::synthetic(TokenKind::Nil, TokenValue::None, line)
    }
}

fn number_token(value: i32, line: usize) -> Token {
    Token::synthetic(TokenKind::Number, TokenValue::Number(value), line)
}

impl Compiler {
    /// Source line of the first leaf under `node`
    pub(crate) fn node_line(&self, node: NodeRef) -> usize {
        match self.arena.get(node) {
            Node::Leaf(token) => token.line,
            Node::Unary { operand, .. } => self.node_line(*operand),
            Node::Binary { left, .. } => self.node_line(*left),
            Node::Ternary { first, .. } => self.node_line(*first),
            Node::NAry { children, .. } => self.node_line(children[0]),
        }
    }

    /// Token of a leaf whose value is already a compile-time constant
    fn constant(&self, node: NodeRef) -> Option<Token> {
        self.arena
            .token(node)
            .filter(|token| is_constant(token.kind))
            .cloned()
    }

    pub(crate) fn fold(&mut self, node: NodeRef) -> Result<NodeRef, CompilerError> {
        match self.arena.get(node).clone() {
            Node::Leaf(_) | Node::NAry { .. } => Ok(node),
            Node::Binary {
                op: Op::ListCons, ..
            } => self.fold_list(node),
            Node::Unary { op, operand } => self.fold_unary(node, op, operand),
            Node::Binary { op, left, right } => self.fold_binary(node, op, left, right),
            Node::Ternary {
                op,
                first,
                second,
                third,
            } => self.fold_ternary(node, op, first, second, third),
        }
    }

    fn fold_unary(&mut self, node: NodeRef, op: Op, operand: NodeRef) -> Result<NodeRef, CompilerError> {
        let operand = self.fold(operand)?;
        self.arena.replace(node, Node::Unary { op, operand });

        let value = match self.constant(operand) {
            Some(value) => value,
            None => return Ok(node),
        };
        let line = value.line;

        let folded = match op {
            Op::UnaryPlus => return Ok(operand),
            Op::Negate => match value.kind {
                TokenKind::Number => number_token(value.number().wrapping_neg(), line),
                _ => return Err(invalid_operand("unary '-'", line)),
            },
            Op::BitNot => match value.kind {
                TokenKind::Number => number_token(!value.number(), line),
                _ => return Err(invalid_operand("'~'", line)),
            },
            Op::Not => match logical(&value) {
                Some(truth) => boolean_token(!truth, line),
                None => return Err(invalid_operand("'not'", line)),
            },
            _ => return Ok(node),
        };

        self.arena.replace(node, Node::Leaf(folded));
        Ok(node)
    }

    fn fold_binary(
        &mut self,
        node: NodeRef,
        op: Op,
        left: NodeRef,
        right: NodeRef,
    ) -> Result<NodeRef, CompilerError> {
        let left = self.fold(left)?;
        let right = self.fold(right)?;
        self.arena.replace(node, Node::Binary { op, left, right });

        let (a, b) = match (self.constant(left), self.constant(right)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(node),
        };
        let line = a.line;

        let folded = match op {
            Op::LogicalAnd | Op::LogicalOr => match (logical(&a), logical(&b)) {
                (Some(x), Some(y)) => {
                    let value = if op == Op::LogicalAnd { x && y } else { x || y };
                    boolean_token(value, line)
                }
                _ => return Err(invalid_operand("logical operator", line)),
            },
            Op::Eq | Op::Ne | Op::Gt | Op::Ge | Op::Lt | Op::Le => {
                if a.kind != TokenKind::Number || b.kind != TokenKind::Number {
                    return Ok(node);
                }
                let (x, y) = (a.number(), b.number());
                let value = match op {
                    Op::Eq => x == y,
                    Op::Ne => x != y,
                    Op::Gt => x > y,
                    Op::Ge => x >= y,
                    Op::Lt => x < y,
                    _ => x <= y,
                };
                boolean_token(value, line)
            }
            Op::BitXor
                if matches!(a.kind, TokenKind::Nil | TokenKind::True)
                    && matches!(b.kind, TokenKind::Nil | TokenKind::True) =>
            {
                boolean_token((a.kind == TokenKind::True) != (b.kind == TokenKind::True), line)
            }
            Op::Add | Op::Sub
                if a.kind != TokenKind::Number || b.kind != TokenKind::Number =>
            {
                // anything but number arithmetic happens at run time
                return Ok(node);
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Shl | Op::Shr | Op::BitXor => {
                if a.kind != TokenKind::Number || b.kind != TokenKind::Number {
                    return Err(invalid_operand("arithmetic operator", line));
                }
                number_token(arithmetic(op, a.number(), b.number(), line)?, line)
            }
            _ => return Ok(node),
        };

        self.arena.replace(node, Node::Leaf(folded));
        Ok(node)
    }

    fn fold_ternary(
        &mut self,
        node: NodeRef,
        op: Op,
        first: NodeRef,
        second: NodeRef,
        third: NodeRef,
    ) -> Result<NodeRef, CompilerError> {
        let first = self.fold(first)?;

        if op == Op::Conditional {
            if let Some(condition) = self.constant(first) {
                // only the branch taken is ever looked at
                return match logical(&condition) {
                    Some(true) => self.fold(second),
                    Some(false) => self.fold(third),
                    None => Err(invalid_operand("'?' condition", condition.line)),
                };
            }
        }

        let second = self.fold(second)?;
        let third = self.fold(third)?;
        self.arena.replace(
            node,
            Node::Ternary {
                op,
                first,
                second,
                third,
            },
        );
        Ok(node)
    }

    /// Folds a list literal into a single list leaf when every element is
    /// a constant. Symbols in the list are declared as forward objects
    /// whether or not the list folds.
    fn fold_list(&mut self, head: NodeRef) -> Result<NodeRef, CompilerError> {
        let mut cells = Vec::new();
        let mut cursor = head;
        while let Node::Binary {
            op: Op::ListCons,
            left,
            right,
        } = *self.arena.get(cursor)
        {
            cells.push((cursor, left, right));
            cursor = right;
        }

        let mut foldable = true;
        let mut elements = Vec::with_capacity(cells.len());
        for (cell, element, rest) in cells {
            let element = self.fold(element)?;
            self.arena.replace(
                cell,
                Node::Binary {
                    op: Op::ListCons,
                    left: element,
                    right: rest,
                },
            );

            match self.arena.token(element).map(|t| (t.kind, t.symbol.kind)) {
                Some((kind, _)) if is_constant(kind) => {}
                Some((TokenKind::Symbol, SymbolKind::Local | SymbolKind::SelfRef)) => foldable = false,
                Some((TokenKind::Symbol, _)) => self.define_leaf(element, SymbolKind::ForwardObject)?,
                _ => foldable = false,
            }
            elements.push(element);
        }

        if !foldable {
            return Ok(head);
        }

        let line = self.node_line(head);
        let mut values = Vec::with_capacity(elements.len());
        for element in elements.into_iter().rev() {
            let token = match self.arena.token(element) {
                Some(token) => token,
                None => return Ok(head),
            };
            let value = match token.kind {
                TokenKind::Number => ListElement::Number(token.number()),
                TokenKind::SString => ListElement::SString(token.string().to_string()),
                TokenKind::List => match &token.value {
                    TokenValue::List(inner) => ListElement::List(inner.clone()),
                    _ => ListElement::List(Vec::new()),
                },
                TokenKind::Nil => ListElement::Nil,
                TokenKind::True => ListElement::True,
                TokenKind::Pound => ListElement::Property(token.property()),
                _ => {
                    let id = token.symbol.value as u16;
                    match token.symbol.kind {
                        SymbolKind::Function | SymbolKind::ForwardFunction => ListElement::Function(id),
                        SymbolKind::Object | SymbolKind::ForwardObject => ListElement::Object(id),
                        SymbolKind::Property => ListElement::Property(id),
                        _ => {
                            return Err(CompilerError::SemanticError(
                                format!("invalid datatype for list element \"{}\"", token.text),
                                token.line,
                            ))
                        }
                    }
                }
            };
            values.push(value);
        }

        let list = Token::synthetic(TokenKind::List, TokenValue::List(values), line);
        self.arena.leaf(list)
    }
}

fn invalid_operand(what: &str, line: usize) -> CompilerError {
    CompilerError::InvalidOperand(format!("invalid operand for {}", what), line)
}

fn arithmetic(op: Op, x: i32, y: i32, line: usize) -> Result<i32, CompilerError> {
    let value = match op {
        Op::Add => x.wrapping_add(y),
        Op::Sub => x.wrapping_sub(y),
        Op::Mul => x.wrapping_mul(y),
        Op::Div | Op::Mod if y == 0 => return Err(CompilerError::DivideByZero(line)),
        Op::Div => x.wrapping_div(y),
        Op::Mod => x.wrapping_rem(y),
        Op::Shl => x.wrapping_shl(y as u32),
        Op::Shr => x.wrapping_shr(y as u32),
        Op::BitXor => x ^ y,
        _ => {
            return Err(CompilerError::InternalError(format!(
                "{:?} is not an arithmetic operator",
                op
            )))
        }
    };
    Ok(value)
}

#[cfg(test)]
#[path = "fold_tests.rs"]
mod tests;
