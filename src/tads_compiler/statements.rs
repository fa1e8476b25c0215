// Statement compiler
//
// Recursive descent over the statement grammar. Every statement allocates
// its parse nodes above an arena mark and gives them back when it is done;
// control flow is emitted through labels so forward jumps are backpatched
// as their targets are reached.

use crate::tads_compiler::arena::{NodeRef, Op};
use crate::tads_compiler::case_table::CaseTable;
use crate::tads_compiler::compiler::Compiler;
use crate::tads_compiler::error::{CompilerError, Warning};
use crate::tads_compiler::labels::Label;
use crate::tads_compiler::lexer::{Token, TokenKind, TokenValue};
use crate::tads_compiler::opcodes::op;
use crate::tads_compiler::symbols::{SymbolBinding, SymbolKind};

/// Where `break` and `continue` go, and whether `case` is allowed
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct JumpTargets {
    pub brk: Option<Label>,
    pub cont: Option<Label>,
    pub in_switch: bool,
}

impl Compiler {
    /// Compiles one statement, which may be a `{ ... }` block. The first
    /// statement of a code body also emits its ENTER.
    pub(crate) fn compile_statement(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        if self.enter_offset.is_none() {
            self.emitter.emit_op(op::ENTER);
            self.enter_offset = Some(self.emitter.offset());
            self.emitter.emit_int2(0);
        }

        if self.eat(TokenKind::LeftBrace) {
            self.compile_compound(targets)
        } else {
            self.compile_single(targets)
        }
    }

    /// Body of a `{ ... }` block; the brace has been consumed
    fn compile_compound(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        let mark = self.arena.mark();
        let saved_frame = self.frame;
        self.symbols.push_scope();

        let result = self.compile_compound_body(targets);

        self.symbols.pop_scope();
        self.frame = saved_frame;
        self.arena.reset(mark);
        result
    }

    fn compile_compound_body(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        let initializers = self.compile_local_declarations()?;

        if self.options.debug_locals {
            self.emit_frame_record();
        }
        if let Some(at) = self.enter_offset {
            let count = self.symbols.local_count();
            if count > self.emitter.read_int2_at(at) as i32 {
                self.emitter.write_int2_at(at, count as u16);
            }
        }
        if let Some(chain) = initializers {
            self.gen_local_init(chain)?;
        }

        loop {
            match self.kind() {
                TokenKind::RightBrace => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::EOF => return Err(CompilerError::UnexpectedEof(self.line())),
                _ => {}
            }

            let labels_before = self.emitter.labels.allocated_labels();
            match self.compile_single(targets) {
                Ok(()) => {}
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    self.log_error(error);
                    self.abandon_statement_labels(&labels_before);
                    self.skip_statement();
                }
            }
        }
    }

    /// Leading `local` declarations of a block. Returns the chain of
    /// initializers, newest first.
    fn compile_local_declarations(&mut self) -> Result<Option<NodeRef>, CompilerError> {
        let mut chain: Option<NodeRef> = None;

        while self.eat(TokenKind::Local) {
            loop {
                if !self.check(TokenKind::Symbol) {
                    return Err(self.expected("local variable name"));
                }
                let line = self.line();
                let name = self.current.text.clone();
                let slot = self.symbols.add_local(&name);
                log::trace!("local '{}' -> slot {}", name, slot);
                self.advance();

                if self.eat(TokenKind::Assign) || self.eat(TokenKind::Equal) {
                    let initializer = self.parse_initializer()?;

                    let mut local = Token::new(TokenKind::Symbol, &name, line, 0);
                    local.symbol = SymbolBinding::new(SymbolKind::Local, slot);
                    let local = self.arena.leaf(local)?;

                    let recorded_line = if self.options.debug_lines { line as i32 } else { 0 };
                    let line_leaf = self.arena.leaf(Token::synthetic(
                        TokenKind::Number,
                        TokenValue::Number(recorded_line),
                        line,
                    ))?;

                    let previous = match chain {
                        Some(previous) => previous,
                        None => self.arena.leaf(Token::synthetic(TokenKind::Nil, TokenValue::None, line))?,
                    };
                    chain = Some(
                        self.arena
                            .nary(Op::LocalInit, [initializer, local, line_leaf, previous])?,
                    );
                }

                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.require(TokenKind::Semicolon)?;
        }

        Ok(chain)
    }

    /// FRAME debug record naming the locals of the innermost scope
    pub(crate) fn emit_frame_record(&mut self) {
        let locals = self.symbols.innermost_locals();
        if locals.is_empty() {
            return;
        }

        self.emitter.emit_op(op::FRAME);
        let length_at = self.emitter.offset();
        self.emitter.emit_int2(0);
        self.emitter.emit_int2(self.frame);
        for (name, slot) in &locals {
            self.emitter.emit_int2(*slot as i16 as u16);
            self.emitter.emit_byte(name.len() as u8);
            self.emitter.emit_bytes(name.as_bytes());
        }
        let length = self.emitter.offset() - length_at;
        self.emitter.write_int2_at(length_at, length as u16);
        self.frame = length_at as u16;
    }

    /// Drops labels created by a statement that failed to compile. Goto
    /// labels stay; they are settled at the end of the function.
    fn abandon_statement_labels(&mut self, before: &[Label]) {
        let goto_labels = self.symbols.goto_label_ids();
        for label in self.emitter.labels.allocated_labels() {
            if !before.contains(&label) && !goto_labels.contains(&label.0) {
                self.emitter.clear(label);
            }
        }
    }

    /// Skips to the end of the failed statement: a `;` or a `{ ... }`
    /// block at the starting depth, or the `}` closing the current block
    pub(crate) fn skip_statement(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::EOF => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::RightBrace if depth == 0 => return,
                TokenKind::RightBrace if depth == 1 => {
                    self.advance();
                    return;
                }
                TokenKind::LeftBrace | TokenKind::LeftParen | TokenKind::LeftBracket => depth += 1,
                TokenKind::RightBrace | TokenKind::RightParen | TokenKind::RightBracket => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// One statement other than a block. Parse nodes are released when it
    /// completes, successfully or not.
    fn compile_single(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        let mark = self.arena.mark();
        let result = self.compile_single_statement(targets);
        self.arena.reset(mark);
        result
    }

    fn compile_single_statement(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        loop {
            if self.options.debug_lines
                && self.line() != self.last_line
                && !matches!(self.kind(), TokenKind::Semicolon | TokenKind::LeftBrace)
            {
                self.last_line = self.line();
                self.emit_line_record(self.last_line);
            }

            match self.kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::LeftBrace => {
                    self.advance();
                    return self.compile_compound(targets);
                }
                TokenKind::DString => {
                    let token = self.current.clone();
                    self.advance();
                    self.emit_value(&token)?;
                    return self.require(TokenKind::Semicolon);
                }
                TokenKind::If => return self.compile_if(targets),
                TokenKind::While => return self.compile_while(targets),
                TokenKind::Do => return self.compile_do(targets),
                TokenKind::For => return self.compile_for(targets),
                TokenKind::Switch => return self.compile_switch(targets),
                TokenKind::Break => {
                    self.advance();
                    return self.compile_jump_to(targets.brk, "break");
                }
                TokenKind::Continue => {
                    self.advance();
                    return self.compile_jump_to(targets.cont, "continue");
                }
                TokenKind::Goto => return self.compile_goto(),
                TokenKind::Case => {
                    self.compile_case(targets)?;
                    if self.check(TokenKind::RightBrace) {
                        return Ok(());
                    }
                }
                TokenKind::Default => {
                    self.compile_default(targets)?;
                    if self.check(TokenKind::RightBrace) {
                        return Ok(());
                    }
                }
                TokenKind::Return => return self.compile_return(),
                TokenKind::Pass => {
                    self.advance();
                    let prop = self.require_property()?;
                    self.emitter.emit_op(op::PASS);
                    self.emitter.emit_int2(prop);
                    return self.require(TokenKind::Semicolon);
                }
                TokenKind::Exit | TokenKind::Abort | TokenKind::AskDo => {
                    let opcode = match self.kind() {
                        TokenKind::Exit => op::EXIT,
                        TokenKind::Abort => op::ABORT,
                        _ => op::ASKDO,
                    };
                    self.advance();
                    self.emitter.emit_op(opcode);
                    return self.require(TokenKind::Semicolon);
                }
                TokenKind::AskIo => return self.compile_askio(),
                TokenKind::Else => {
                    return Err(self.syntax_error("\"else\" without \"if\""));
                }
                TokenKind::Local => {
                    return Err(self.semantic_error(
                        "local declarations must come before other statements in a block",
                    ));
                }
                TokenKind::EOF => return Err(CompilerError::UnexpectedEof(self.line())),
                TokenKind::Symbol
                | TokenKind::LeftParen
                | TokenKind::Number
                | TokenKind::Increment
                | TokenKind::Decrement
                | TokenKind::Delete
                | TokenKind::New => {
                    if !self.compile_expression_statement()? {
                        return Ok(());
                    }
                    if self.check(TokenKind::RightBrace) {
                        return Ok(());
                    }
                }
                _ => return Err(self.expected("statement")),
            }
        }
    }

    /// Parses a condition or return value, warning about `=` used as a
    /// test in C mode
    fn parse_condition(&mut self) -> Result<NodeRef, CompilerError> {
        let line = self.line();
        let condition = self.parse_folded()?;
        if self.c_mode && self.arena.get(condition).op() == Some(Op::Assign) {
            self.warn(Warning::PossibleIncorrectAssignment(line));
        }
        Ok(condition)
    }

    fn compile_if(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        self.advance();
        self.require(TokenKind::LeftParen)?;
        let condition = self.parse_condition()?;
        self.gen_expression(condition)?;
        let if_false = self.emitter.new_label()?;
        self.emitter.jump(op::JF, if_false)?;
        self.require(TokenKind::RightParen)?;

        self.compile_statement(targets)?;

        if self.eat(TokenKind::Else) {
            let done = self.emitter.new_label()?;
            self.emitter.jump(op::JMP, done)?;
            self.emitter.bind_and_release(if_false)?;
            self.compile_statement(targets)?;
            self.emitter.bind_and_release(done)
        } else {
            self.emitter.bind_and_release(if_false)
        }
    }

    fn compile_while(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        self.advance();
        self.require(TokenKind::LeftParen)?;
        let done = self.emitter.new_label()?;
        let top = self.emitter.new_label_here()?;

        let condition = self.parse_condition()?;
        self.gen_expression(condition)?;
        self.require(TokenKind::RightParen)?;
        self.emitter.jump(op::JF, done)?;

        self.compile_statement(JumpTargets {
            brk: Some(done),
            cont: Some(top),
            ..targets
        })?;

        self.emitter.jump(op::JMP, top)?;
        self.emitter.bind_and_release(done)?;
        self.emitter.release(top)
    }

    fn compile_do(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        self.advance();
        let done = self.emitter.new_label()?;
        let top = self.emitter.new_label_here()?;
        let next = self.emitter.new_label()?;

        self.compile_statement(JumpTargets {
            brk: Some(done),
            cont: Some(next),
            ..targets
        })?;

        self.emitter.bind_and_release(next)?;
        self.require(TokenKind::While)?;
        let condition = self.parse_condition()?;
        self.gen_expression(condition)?;
        self.emitter.jump(op::JT, top)?;
        self.emitter.release(top)?;
        self.require(TokenKind::Semicolon)?;
        self.emitter.bind_and_release(done)
    }

    fn compile_for(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        self.advance();
        self.require(TokenKind::LeftParen)?;
        let next = self.emitter.new_label()?;
        let top = self.emitter.new_label()?;
        let exit = self.emitter.new_label()?;

        if !self.check(TokenKind::Semicolon) {
            let init = self.parse_folded()?;
            self.gen_expression(init)?;
            self.emitter.emit_op(op::DISCARD);
        }
        self.require(TokenKind::Semicolon)?;

        self.emitter.bind(top)?;
        if !self.check(TokenKind::Semicolon) {
            let condition = self.parse_condition()?;
            self.gen_expression(condition)?;
            self.emitter.jump(op::JF, exit)?;
        }
        self.require(TokenKind::Semicolon)?;

        // generated after the body; its nodes stay above the body's mark
        let reinit = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_folded()?)
        };
        self.require(TokenKind::RightParen)?;

        self.compile_statement(JumpTargets {
            brk: Some(exit),
            cont: Some(next),
            ..targets
        })?;

        self.emitter.bind(next)?;
        if let Some(reinit) = reinit {
            self.gen_expression(reinit)?;
            self.emitter.emit_op(op::DISCARD);
        }
        self.emitter.jump(op::JMP, top)?;
        self.emitter.bind_and_release(exit)?;
        self.emitter.release(top)?;
        self.emitter.release(next)
    }

    fn compile_jump_to(&mut self, target: Option<Label>, keyword: &str) -> Result<(), CompilerError> {
        if !self.check(TokenKind::Semicolon) {
            return Err(self.expected(";"));
        }
        match target {
            Some(label) => self.emitter.jump(op::JMP, label)?,
            None => {
                let error = self.semantic_error(&format!("\"{}\" is not valid here", keyword));
                self.log_error(error);
            }
        }
        self.advance();
        Ok(())
    }

    fn compile_goto(&mut self) -> Result<(), CompilerError> {
        self.advance();
        if !self.check(TokenKind::Symbol) {
            return Err(self.expected("label"));
        }
        let binding = self.define_current(SymbolKind::Label)?;
        if binding.kind != SymbolKind::Label {
            return Err(self.semantic_error(&format!(
                "\"{}\" is not a label",
                self.current.text
            )));
        }
        self.emitter.jump(op::JMP, Label(binding.value as u16))?;
        self.advance();
        self.require(TokenKind::Semicolon)
    }

    fn compile_switch(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        self.advance();
        self.require(TokenKind::LeftParen)?;
        let selector = self.parse_folded()?;
        self.require(TokenKind::RightParen)?;
        self.gen_expression(selector)?;

        let done = self.emitter.new_label()?;
        let table_label = self.emitter.new_label()?;
        self.emitter.jump(op::SWITCH, table_label)?;

        self.switches.push(CaseTable::new());
        let body = self.compile_statement(JumpTargets {
            brk: Some(done),
            in_switch: true,
            ..targets
        });
        let table = self.switches.pop().unwrap_or_default();
        body?;

        self.emitter.jump(op::JMP, done)?;
        self.emitter.bind_and_release(table_label)?;

        log::debug!(
            "switch table: {} cases over {} pages",
            table.len(),
            table.page_count()
        );
        self.emitter.emit_int2(table.len() as u16);
        for entry in table.entries() {
            self.emit_value(&entry.value)?;
            self.emitter.emit_offset_to(entry.offset)?;
        }
        match table.default {
            Some(offset) => self.emitter.emit_offset_to(offset)?,
            // falls through to the end of the switch
            None => self.emitter.emit_int2(2),
        }

        self.emitter.bind_and_release(done)
    }

    fn compile_case(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        self.advance();
        if !targets.in_switch || self.switches.is_empty() {
            return Err(self.syntax_error("\"case\" outside of a switch"));
        }

        let value = self.parse_folded()?;
        self.require(TokenKind::Colon)?;
        let line = self.node_line(value);

        self.define_leaf(value, SymbolKind::ForwardObject)?;
        let token = match self.arena.token(value) {
            Some(token) => token.clone(),
            None => {
                return Err(CompilerError::SemanticError(
                    "case value must be a constant".to_string(),
                    line,
                ))
            }
        };
        let allowed = match token.kind {
            TokenKind::DString => false,
            TokenKind::Symbol => matches!(
                token.symbol.kind,
                SymbolKind::Object
                    | SymbolKind::ForwardObject
                    | SymbolKind::Function
                    | SymbolKind::ForwardFunction
            ),
            _ => true,
        };
        if !allowed {
            return Err(CompilerError::SemanticError(
                "case value must be a constant".to_string(),
                line,
            ));
        }

        let offset = self.emitter.offset();
        if let Some(table) = self.switches.last_mut() {
            table.add(token, offset);
        }
        Ok(())
    }

    fn compile_default(&mut self, targets: JumpTargets) -> Result<(), CompilerError> {
        self.advance();
        self.require(TokenKind::Colon)?;
        if !targets.in_switch {
            return Err(self.syntax_error("\"default\" outside of a switch"));
        }
        let offset = self.emitter.offset();
        match self.switches.last_mut() {
            Some(table) => {
                table.default = Some(offset);
                Ok(())
            }
            None => Err(self.syntax_error("\"default\" outside of a switch")),
        }
    }

    fn compile_return(&mut self) -> Result<(), CompilerError> {
        self.advance();
        let parameters = self.symbols.parameter_count() as u16;
        if self.eat(TokenKind::Semicolon) {
            self.emitter.emit_op(op::RETURN);
            self.emitter.emit_int2(parameters);
            return Ok(());
        }

        let value = self.parse_condition()?;
        self.gen_expression(value)?;
        self.emitter.emit_op(op::RETVAL);
        self.emitter.emit_int2(parameters);
        self.require(TokenKind::Semicolon)
    }

    fn compile_askio(&mut self) -> Result<(), CompilerError> {
        self.advance();
        self.require(TokenKind::LeftParen)?;
        if !self.check(TokenKind::Symbol) {
            return Err(self.expected("object"));
        }
        let binding = self.define_current(SymbolKind::ForwardObject)?;
        if !binding.kind.is_object() {
            return Err(self.semantic_error(&format!(
                "\"{}\" is not an object",
                self.current.text
            )));
        }
        self.emitter.emit_op(op::ASKIO);
        self.emitter.emit_int2(binding.value as u16);
        self.advance();
        self.require(TokenKind::RightParen)?;
        self.require(TokenKind::Semicolon)
    }

    /// Compiles `expr;`. A leading `name:` instead defines a goto label;
    /// returns true when that happened and the statement continues.
    fn compile_expression_statement(&mut self) -> Result<bool, CompilerError> {
        let line = self.line();
        let expression = self.parse_folded()?;

        if self.check(TokenKind::Colon) {
            let candidate = self
                .arena
                .token(expression)
                .filter(|t| t.kind == TokenKind::Symbol)
                .map(|t| t.symbol.kind);
            if matches!(candidate, Some(SymbolKind::Label | SymbolKind::Unknown)) {
                self.define_leaf(expression, SymbolKind::Label)?;
                let binding = self.arena.token(expression).map(|t| t.symbol);
                if let Some(binding) = binding.filter(|b| b.kind == SymbolKind::Label) {
                    let label = Label(binding.value as u16);
                    if self.emitter.labels.is_bound(label) {
                        return Err(CompilerError::SemanticError(
                            "label defined more than once".to_string(),
                            line,
                        ));
                    }
                    self.emitter.bind(label)?;
                    self.advance();
                    return Ok(true);
                }
            }
        }

        if self.arena.get(expression).op() == Some(Op::Eq) {
            self.warn(Warning::EqualsAsStatement(line));
        }

        self.gen_expression(expression)?;
        self.require(TokenKind::Semicolon)?;
        self.emitter.emit_op(op::DISCARD);
        Ok(false)
    }

    /// Settles the goto labels of a finished function or method
    pub(crate) fn finish_goto_labels(&mut self) -> Result<(), CompilerError> {
        let line = self.line();
        for (name, id) in self.symbols.take_goto_labels() {
            let label = Label(id);
            if self.emitter.labels.is_bound(label) {
                self.emitter.release(label)?;
            } else {
                self.warn(Warning::UndefinedGotoLabel(name, line));
                self.emitter.clear(label);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "statements_tests.rs"]
mod tests;
