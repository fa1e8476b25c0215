// Top-level declarations
//
// A program is a sequence of declarations: objects and classes, functions
// (defined, forward or external), `modify`/`replace` of earlier objects and
// the game-wide word tables. Errors inside a declaration are recorded and
// the declaration is skipped; fatal errors stop the whole compilation.

use crate::tads_compiler::compiler::Compiler;
use crate::tads_compiler::error::{CompilerError, Warning};
use crate::tads_compiler::lexer::TokenKind;
use crate::tads_compiler::object_store::ObjectId;
use crate::tads_compiler::opcodes::{limits, op};
use crate::tads_compiler::statements::JumpTargets;
use crate::tads_compiler::symbols::{SymbolBinding, SymbolKind};
use crate::tads_compiler::vocabulary::SPECIAL_WORD_SLOTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Modifier {
    Replace,
    Modify,
}

/// Words supplied for special-word slots a declaration leaves off the end
fn special_word_defaults(slot: usize) -> &'static [&'static str] {
    match slot {
        12 => &["any", "either"],
        _ => &[],
    }
}

/// Drops the backslash of each escape; `\'` becomes `'`
fn unescape_format(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(ch);
        }
    }
    result
}

impl Compiler {
    /// Compiles every declaration up to end of file
    pub(crate) fn compile_program(&mut self) -> Result<(), CompilerError> {
        while !self.check(TokenKind::EOF) {
            let mark = self.arena.mark();
            let result = self.compile_declaration();
            self.arena.reset(mark);

            match result {
                Ok(()) => {}
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    let in_function = self.in_function;
                    self.log_error(error);
                    self.abandon_code_body();
                    self.skip_declaration(in_function);
                }
            }
        }
        log::info!(
            "compiled {} objects with {} error(s), {} warning(s)",
            self.store.object_count(),
            self.diagnostics.errors.len(),
            self.diagnostics.warnings.len()
        );
        Ok(())
    }

    /// Skips to the `;` ending a failed declaration, or past the block that
    /// ends a function body
    fn skip_declaration(&mut self, in_function: bool) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::EOF => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::RightBrace if depth == 1 && in_function => {
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

    fn compile_declaration(&mut self) -> Result<(), CompilerError> {
        match self.kind() {
            TokenKind::Semicolon => {
                self.advance();
                return Ok(());
            }
            TokenKind::CompoundWord => return self.compile_compound_word(),
            TokenKind::FormatString => return self.compile_format_string(),
            _ => {}
        }

        let modifier = match self.kind() {
            TokenKind::Replace => Some(Modifier::Replace),
            TokenKind::Modify => Some(Modifier::Modify),
            _ => None,
        };
        if modifier.is_some() {
            self.advance();
        }

        if self.check(TokenKind::SpecialWords) {
            return self.compile_special_words(modifier);
        }

        let mut is_class = self.eat(TokenKind::Class);

        if !self.check(TokenKind::Symbol) {
            return Err(self.expected("symbol"));
        }
        let name = self.current.text.clone();
        let binding = self.current.symbol;
        self.advance();

        if modifier == Some(Modifier::Modify) {
            let (copy, was_class) = self.duplicate_for_modify(&name, binding)?;
            is_class |= was_class;
            return self.compile_object_declaration(&name, modifier, &[copy], is_class);
        }

        self.require(TokenKind::Colon)?;
        match self.kind() {
            TokenKind::External => self.compile_external(&name, modifier),
            TokenKind::Function => self.compile_function(&name, modifier),
            TokenKind::Object => {
                self.advance();
                self.compile_object_declaration(&name, modifier, &[], is_class)
            }
            TokenKind::Symbol => {
                let superclasses = self.parse_superclasses()?;
                self.compile_object_declaration(&name, modifier, &superclasses, is_class)
            }
            _ => Err(self.expected("object, function or superclass")),
        }
    }

    fn parse_superclasses(&mut self) -> Result<Vec<ObjectId>, CompilerError> {
        let mut superclasses = Vec::new();
        loop {
            if superclasses.len() >= limits::MAX_SUPERCLASSES {
                return Err(self.semantic_error("too many superclasses"));
            }
            if !self.check(TokenKind::Symbol) {
                return Err(self.expected("superclass"));
            }
            let binding = self.define_current(SymbolKind::ForwardObject)?;
            if !binding.kind.is_object() {
                return Err(self.semantic_error(&format!(
                    "\"{}\" is not an object",
                    self.current.text
                )));
            }
            superclasses.push(Compiler::object_of(binding));
            self.advance();
            if !self.eat(TokenKind::Comma) {
                return Ok(superclasses);
            }
        }
    }

    fn compile_object_declaration(
        &mut self,
        name: &str,
        modifier: Option<Modifier>,
        superclasses: &[ObjectId],
        is_class: bool,
    ) -> Result<(), CompilerError> {
        let current = self.symbols.lookup(name);
        let mut binding = self.define_binding(name, current, SymbolKind::ForwardObject)?;
        let redefinable = binding.kind == SymbolKind::ForwardObject
            || (binding.kind == SymbolKind::Object && modifier.is_some());
        if !redefinable {
            let error = self.semantic_error(&format!("\"{}\" redefined as an object", name));
            self.log_error(error);
            binding = SymbolBinding::new(SymbolKind::ForwardObject, self.store.allocate().0 as i32);
        }

        let id = Compiler::object_of(binding);
        if modifier == Some(Modifier::Replace) && binding.kind == SymbolKind::Object {
            self.vocab.delete_inheritance(id);
            self.vocab.delete_words(id);
        }
        self.symbols
            .add_global(name, SymbolBinding::new(SymbolKind::Object, binding.value));

        self.compile_object(name, id, superclasses, is_class)?;
        self.require(TokenKind::Semicolon)
    }

    /// Copies the object being modified under `name@N`. The copy becomes
    /// the only superclass of the new version; returns whether the
    /// original was a class.
    fn duplicate_for_modify(
        &mut self,
        name: &str,
        binding: SymbolBinding,
    ) -> Result<(ObjectId, bool), CompilerError> {
        let original = Compiler::object_of(binding);
        if binding.kind != SymbolKind::Object || !self.vocab.has_inheritance(original) {
            return Err(self.semantic_error(&format!(
                "\"{}\" is not a previously defined object",
                name
            )));
        }

        let copy = self.store.duplicate(original)?;
        let mut flags = self.store.flags(copy);
        let was_class = flags.class;
        flags.superseded = true;
        flags.class = true;
        self.store.set_flags(copy, flags);
        self.store.mark_dirty(copy);

        let prefix: String = name.chars().take(limits::TOKNAMMAX - 5).collect();
        let alias = format!("{}@{}", prefix, copy.0);
        log::info!("modify '{}': original kept as '{}'", name, alias);
        self.symbols
            .add_global(&alias, SymbolBinding::new(SymbolKind::Object, copy.0 as i32));
        self.vocab.rename_inheritance(original, copy);

        Ok((copy, was_class))
    }

    fn compile_external(&mut self, name: &str, modifier: Option<Modifier>) -> Result<(), CompilerError> {
        if modifier.is_some() {
            let error = self.semantic_error("cannot modify or replace an external function");
            self.log_error(error);
        }
        self.advance();
        self.require(TokenKind::Function)?;
        self.require(TokenKind::Semicolon)?;

        let current = self.symbols.lookup(name);
        let binding = self.define_binding(name, current, SymbolKind::External)?;
        if binding.kind != SymbolKind::External {
            return Err(self.semantic_error(&format!("\"{}\" is not an external function", name)));
        }
        Ok(())
    }

    fn compile_function(&mut self, name: &str, modifier: Option<Modifier>) -> Result<(), CompilerError> {
        if modifier == Some(Modifier::Modify) {
            let error = self.semantic_error("cannot modify a function; use replace");
            self.log_error(error);
        }

        let current = self.symbols.lookup(name);
        let mut binding = self.define_binding(name, current, SymbolKind::ForwardFunction)?;
        self.advance();

        if self.eat(TokenKind::Semicolon) {
            if modifier.is_some() {
                let error = self.semantic_error("cannot modify or replace a forward declaration");
                self.log_error(error);
            }
            if !binding.kind.is_function() {
                return Err(self.semantic_error(&format!("\"{}\" is not a function", name)));
            }
            return Ok(());
        }

        let definable = binding.kind == SymbolKind::ForwardFunction
            || (binding.kind == SymbolKind::Function && modifier == Some(Modifier::Replace));
        if !definable {
            let error = self.semantic_error(&format!("function \"{}\" redefined", name));
            self.log_error(error);
            binding = SymbolBinding::new(SymbolKind::ForwardFunction, self.store.allocate().0 as i32);
        }
        let id = Compiler::object_of(binding);
        self.symbols
            .add_global(name, SymbolBinding::new(SymbolKind::Function, binding.value));
        log::info!("compiling function '{}' (#{})", name, id.0);

        self.begin_code_body();
        self.in_function = true;
        let result = self.with_object_locked(id, |c| {
            let varargs = if c.eat(TokenKind::LeftParen) {
                c.parse_parameters()?
            } else {
                false
            };
            if !c.check(TokenKind::LeftBrace) {
                return Err(c.expected("{"));
            }
            let code = c.compile_code_body(varargs)?;
            log::debug!("function '{}': {} bytes", name, code.len());
            c.store.write_function(id, code)
        });
        // left set on failure so recovery skips the whole body
        if result.is_ok() {
            self.in_function = false;
        }
        self.symbols.truncate_scopes(0);
        result
    }

    /// Resets per-body state before a function or method
    pub(crate) fn begin_code_body(&mut self) {
        self.emitter.take_code();
        self.enter_offset = None;
        self.frame = 0;
        self.last_line = 0;
        self.switches.clear();
        self.symbols.begin_function();
        self.symbols.push_scope();
    }

    /// Throws away a partly compiled body after an error
    pub(crate) fn abandon_code_body(&mut self) {
        let abandoned = self.symbols.take_goto_labels();
        if !abandoned.is_empty() {
            log::debug!("dropping {} goto label(s)", abandoned.len());
        }
        self.emitter.labels.abandon_all();
        self.emitter.take_code();
        self.switches.clear();
        self.enter_offset = None;
        self.in_function = false;
        self.symbols.truncate_scopes(0);
    }

    /// Parameter names after `(`, through `)`. Returns whether the list
    /// ends in `...`.
    pub(crate) fn parse_parameters(&mut self) -> Result<bool, CompilerError> {
        let mut varargs = false;
        loop {
            match self.kind() {
                TokenKind::Symbol => {
                    let name = self.current.text.clone();
                    let slot = self.symbols.add_parameter(&name);
                    log::trace!("parameter '{}' -> slot {}", name, slot);
                    self.advance();
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                TokenKind::Ellipsis => {
                    self.advance();
                    varargs = true;
                    break;
                }
                _ => break,
            }
        }
        self.require(TokenKind::RightParen)?;
        Ok(varargs)
    }

    /// CHKARGC with the parameter count, high bit set for varargs
    pub(crate) fn emit_argument_check(&mut self, varargs: bool) {
        if self.options.check_arg_count {
            let count = self.symbols.parameter_count() as u8;
            self.emitter.emit_op(op::CHKARGC);
            self.emitter.emit_byte(if varargs { count | 0x80 } else { count });
        }
    }

    /// Code of a `{ ... }` function or method body, ending in RETURN 0
    pub(crate) fn compile_code_body(&mut self, varargs: bool) -> Result<Vec<u8>, CompilerError> {
        self.emit_argument_check(varargs);
        if self.options.debug_locals {
            self.emit_frame_record();
        }
        self.compile_statement(JumpTargets::default())?;
        self.emitter.emit_op(op::RETURN);
        self.emitter.emit_int2(0);
        self.finish_goto_labels()?;
        Ok(self.emitter.take_code())
    }

    /// `compoundWord 'out' 'of' 'outof';`
    fn compile_compound_word(&mut self) -> Result<(), CompilerError> {
        self.advance();
        let mut words = Vec::with_capacity(3);
        for _ in 0..3 {
            if !self.check(TokenKind::SString) {
                return Err(self.expected("single-quoted word"));
            }
            words.push(self.current.string().to_string());
            self.advance();
        }
        self.require(TokenKind::Semicolon)?;

        let combined = words.pop().unwrap_or_default();
        let second = words.pop().unwrap_or_default();
        let first = words.pop().unwrap_or_default();
        log::debug!("compound word '{} {}' -> '{}'", first, second, combined);
        self.words.compound_words.push((first, second, combined));
        Ok(())
    }

    /// `formatstring 'you' fmtYou;`
    fn compile_format_string(&mut self) -> Result<(), CompilerError> {
        self.advance();
        if !self.check(TokenKind::SString) {
            return Err(self.expected("format string"));
        }
        let text = unescape_format(self.current.string());
        self.advance();
        let property = self.require_property()?;
        self.require(TokenKind::Semicolon)?;
        self.words.format_strings.push((text, property));
        Ok(())
    }

    /// `specialWords 'of', 'and', ... ;` with `=` between synonyms in one
    /// slot. Under `modify`, `nil` leaves a slot's existing words alone.
    fn compile_special_words(&mut self, modifier: Option<Modifier>) -> Result<(), CompilerError> {
        let line = self.line();
        match modifier {
            None if !self.words.special_words.is_empty() => {
                self.warn(Warning::ReplacedSpecialWords(line));
                self.words.special_words.clear();
            }
            Some(Modifier::Replace) => self.words.special_words.clear(),
            _ => {}
        }
        self.advance();

        let mut end_of_list = false;
        for slot in 0..SPECIAL_WORD_SLOTS {
            if end_of_list {
                let defaults = special_word_defaults(slot);
                if defaults.is_empty() {
                    return Err(self.syntax_error("specialWords list is incomplete"));
                }
                for word in defaults {
                    self.words.special_words.push((slot as u8, word.to_string()));
                }
                continue;
            }

            loop {
                match self.kind() {
                    TokenKind::SString => {
                        let word = self.current.string().to_string();
                        self.words.special_words.push((slot as u8, word));
                        self.advance();
                        if !self.eat(TokenKind::Equal) {
                            break;
                        }
                    }
                    TokenKind::Nil => {
                        if modifier != Some(Modifier::Modify) {
                            return Err(self.semantic_error("nil is only allowed in \"modify specialWords\""));
                        }
                        self.advance();
                        break;
                    }
                    _ => return Err(self.expected("single-quoted word")),
                }
            }

            if self.check(TokenKind::Semicolon) {
                end_of_list = true;
            } else if slot + 1 < SPECIAL_WORD_SLOTS {
                self.require(TokenKind::Comma)?;
            }
        }

        self.require(TokenKind::Semicolon)
    }
}

#[cfg(test)]
#[path = "declarations_tests.rs"]
mod tests;
