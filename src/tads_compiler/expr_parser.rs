// Expression parser
//
// Walks the precedence chain for the current operator mode, building nodes
// in the arena. Atoms, prefix operators and the postfix forms (`.prop`,
// `[index]`, calls, `++`/`--`) sit below the chain in `parse_unary`.

use crate::tads_compiler::arena::{NodeRef, Op};
use crate::tads_compiler::compiler::Compiler;
use crate::tads_compiler::error::{CompilerError, Warning};
use crate::tads_compiler::lexer::{Token, TokenKind, TokenValue};
use crate::tads_compiler::precedence::{self, Operand, PrecedenceLevel};
use crate::tads_compiler::symbols::SymbolKind;

impl Compiler {
    /// Parses a complete expression. Inside a list literal parsing starts
    /// at the assignment level so commas separate elements.
    pub(crate) fn parse_expression(&mut self, in_list: bool) -> Result<NodeRef, CompilerError> {
        let saved = self.in_list;
        self.in_list = in_list;
        let chain = precedence::chain(self.c_mode);
        let level = if in_list { chain.assignment } else { chain.comma };
        let result = self.parse_level(level);
        self.in_list = saved;
        result
    }

    /// Parses and folds a full expression
    pub(crate) fn parse_folded(&mut self) -> Result<NodeRef, CompilerError> {
        let node = self.parse_expression(false)?;
        self.fold(node)
    }

    /// Parses and folds a single assignment-level expression, as used for
    /// local variable initializers
    pub(crate) fn parse_initializer(&mut self) -> Result<NodeRef, CompilerError> {
        let level = precedence::chain(self.c_mode).assignment;
        let node = self.parse_level(level)?;
        self.fold(node)
    }

    fn parse_operand(&mut self, operand: Operand) -> Result<NodeRef, CompilerError> {
        match operand {
            Operand::Level(level) => self.parse_level(level),
            Operand::Conditional(level) => self.parse_conditional(level),
            Operand::Unary => self.parse_unary(),
        }
    }

    pub(crate) fn parse_level(&mut self, level: &'static PrecedenceLevel) -> Result<NodeRef, CompilerError> {
        let mut left = self.parse_operand(level.left)?;

        while let Some(op) = level.operator(self.kind()) {
            if self.in_list
                && matches!(
                    self.kind(),
                    TokenKind::Ampersand | TokenKind::Plus | TokenKind::Minus
                )
            {
                let warning = Warning::AmbiguousListOperator(self.kind().to_string(), self.line());
                self.warn(warning);
                break;
            }

            self.advance();
            let right = self.parse_operand(level.right)?;
            left = self.arena.binary(op, left, right)?;

            if !level.repeat {
                break;
            }
        }

        Ok(left)
    }

    fn parse_conditional(&mut self, level: &'static PrecedenceLevel) -> Result<NodeRef, CompilerError> {
        let mut condition = self.parse_level(level)?;

        while self.check(TokenKind::Question) {
            self.advance();
            let if_true = self.parse_expression(false)?;
            self.require(TokenKind::Colon)?;
            let assignment = precedence::chain(self.c_mode).assignment;
            let if_false = self.parse_level(assignment)?;
            condition = self
                .arena
                .ternary(Op::Conditional, condition, if_true, if_false)?;
        }

        Ok(condition)
    }

    /// Argument list after `(`, through the closing `)`. Arguments chain
    /// as (argument, rest).
    fn parse_arguments(&mut self) -> Result<NodeRef, CompilerError> {
        let saved = self.in_list;
        self.in_list = false;
        let result = self.parse_argument_chain();
        self.in_list = saved;
        result
    }

    fn parse_argument_chain(&mut self) -> Result<NodeRef, CompilerError> {
        let assignment = precedence::chain(self.c_mode).assignment;
        let argument = self.parse_level(assignment)?;

        match self.kind() {
            TokenKind::RightParen => {
                self.advance();
                Ok(argument)
            }
            TokenKind::Comma => {
                self.advance();
                let rest = self.parse_argument_chain()?;
                self.arena.binary(Op::ArgList, argument, rest)
            }
            _ => Err(self.expected(") or ,")),
        }
    }

    fn parse_unary(&mut self) -> Result<NodeRef, CompilerError> {
        let op = match self.kind() {
            TokenKind::Plus => Op::UnaryPlus,
            TokenKind::Minus => Op::Negate,
            TokenKind::Not => Op::Not,
            TokenKind::Tilde => Op::BitNot,
            TokenKind::Increment => Op::PreInc,
            TokenKind::Decrement => Op::PreDec,
            TokenKind::Delete => Op::Delete,
            TokenKind::New => {
                let token = self.current.clone();
                self.advance();
                if self.eat(TokenKind::Object) {
                    return self.arena.leaf(token);
                }
                let operand = self.parse_unary()?;
                return self.arena.unary(Op::New, operand);
            }
            _ => return self.parse_postfix(),
        };

        self.advance();
        let operand = self.parse_unary()?;
        self.arena.unary(op, operand)
    }

    fn parse_postfix(&mut self) -> Result<NodeRef, CompilerError> {
        let mut node = self.parse_atom()?;

        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_property_operand()?;
                    if self.eat(TokenKind::LeftParen) {
                        node = if self.eat(TokenKind::RightParen) {
                            self.arena.binary(Op::Dot, node, property)?
                        } else {
                            let arguments = self.parse_arguments()?;
                            self.arena.ternary(Op::Dot, node, property, arguments)?
                        };
                    } else {
                        node = self.arena.binary(Op::Dot, node, property)?;
                    }
                }
                TokenKind::LeftBracket => {
                    // inside a list literal `[` starts the next element
                    if self.in_list {
                        return Ok(node);
                    }
                    self.advance();
                    let index = self.parse_expression(false)?;
                    self.require(TokenKind::RightBracket)?;
                    node = self.arena.binary(Op::Index, node, index)?;
                }
                TokenKind::LeftParen => {
                    self.advance();
                    node = if self.eat(TokenKind::RightParen) {
                        self.arena.unary(Op::Call, node)?
                    } else {
                        let arguments = self.parse_arguments()?;
                        self.arena.binary(Op::Call, node, arguments)?
                    };
                }
                TokenKind::Increment => {
                    self.advance();
                    return self.arena.unary(Op::PostInc, node);
                }
                TokenKind::Decrement => {
                    self.advance();
                    return self.arena.unary(Op::PostDec, node);
                }
                _ => return Ok(node),
            }
        }
    }

    /// The right side of `.`: `(expr)`, a local holding a property pointer,
    /// or a property name
    fn parse_property_operand(&mut self) -> Result<NodeRef, CompilerError> {
        if self.eat(TokenKind::LeftParen) {
            let expression = self.parse_expression(false)?;
            self.require(TokenKind::RightParen)?;
            return Ok(expression);
        }
        if self.check(TokenKind::Symbol) && self.current.symbol.kind == SymbolKind::Local {
            let token = self.current.clone();
            self.advance();
            return self.arena.leaf(token);
        }
        self.property_literal()
    }

    /// Builds a `#prop` leaf from a required property name
    fn property_literal(&mut self) -> Result<NodeRef, CompilerError> {
        let line = self.line();
        let prop = self.require_property()?;
        let token = Token::synthetic(TokenKind::Pound, TokenValue::Property(prop), line);
        self.arena.leaf(token)
    }

    fn parse_atom(&mut self) -> Result<NodeRef, CompilerError> {
        match self.kind() {
            TokenKind::Pound | TokenKind::Ampersand => {
                self.advance();
                if self.check(TokenKind::Symbol) && self.current.symbol.kind.is_function() {
                    let token = self.current.clone();
                    self.advance();
                    return self.arena.leaf(token);
                }
                self.property_literal()
            }
            TokenKind::LeftParen => {
                self.advance();
                let expression = self.parse_expression(false)?;
                self.require(TokenKind::RightParen)?;
                Ok(expression)
            }
            TokenKind::LeftBracket => self.parse_list(),
            TokenKind::Number
            | TokenKind::Nil
            | TokenKind::True
            | TokenKind::SString
            | TokenKind::DString => {
                let token = self.current.clone();
                self.advance();
                self.arena.leaf(token)
            }
            TokenKind::Symbol => {
                let token = self.current.clone();
                self.advance();
                if token.symbol.kind == SymbolKind::Inherited && self.check(TokenKind::Symbol) {
                    let superclass = self.current.clone();
                    self.advance();
                    let leaf = self.arena.leaf(superclass)?;
                    return self.arena.unary(Op::ExplicitInherit, leaf);
                }
                self.arena.leaf(token)
            }
            TokenKind::EOF => Err(CompilerError::UnexpectedEof(self.line())),
            _ => Err(self.expected("operand")),
        }
    }

    /// `[a b c]`: elements chain newest first as (element, previous), ending
    /// in an empty list leaf
    fn parse_list(&mut self) -> Result<NodeRef, CompilerError> {
        let line = self.line();
        self.advance();

        let empty = Token::synthetic(TokenKind::List, TokenValue::List(Vec::new()), line);
        let mut list = self.arena.leaf(empty)?;

        while !self.check(TokenKind::RightBracket) {
            if self.check(TokenKind::EOF) {
                return Err(CompilerError::UnexpectedEof(self.line()));
            }
            let element = self.parse_expression(true)?;
            list = self.arena.binary(Op::ListCons, element, list)?;
            self.eat(TokenKind::Comma);
        }
        self.advance();

        Ok(list)
    }
}

#[cfg(test)]
#[path = "expr_parser_tests.rs"]
mod tests;
