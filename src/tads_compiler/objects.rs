// Object body compiler
//
// Compiles the property list of one object: verb templates, synonyms,
// redirections, vocabulary words, literal values and code. The object stays
// locked for the whole body; templates, the `contents` default and the
// inheritance record are written when the closing `;` is reached.

use crate::tads_compiler::arena::{Node, NodeRef};
use crate::tads_compiler::codegen::list_image;
use crate::tads_compiler::compiler::Compiler;
use crate::tads_compiler::error::{CompilerError, Warning};
use crate::tads_compiler::lexer::{Token, TokenKind, TokenValue};
use crate::tads_compiler::object_store::ObjectId;
use crate::tads_compiler::opcodes::{dat, limits, op, prop, vocab};
use crate::tads_compiler::symbols::SymbolKind;
use crate::tads_compiler::vocabulary::InheritanceRecord;

/// One verb template: the handler properties derived from a `doAction`
/// or `ioAction` root name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateEntry {
    pub preposition: u16,
    pub ver_io: u16,
    pub io: u16,
    pub ver_do: u16,
    pub do_action: u16,
    pub flags: u8,
}

impl TemplateEntry {
    fn encode(&self, with_flags: bool, out: &mut Vec<u8>) {
        for value in [
            self.preposition,
            self.ver_io,
            self.io,
            self.ver_do,
            self.do_action,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        if with_flags {
            out.push(self.flags);
        }
    }
}

/// Count byte followed by the entries
pub fn template_image(templates: &[TemplateEntry], with_flags: bool) -> Vec<u8> {
    let size = if with_flags {
        vocab::TPL2_SIZE
    } else {
        vocab::TPL_SIZE
    };
    let mut image = Vec::with_capacity(1 + templates.len() * size);
    image.push(templates.len() as u8);
    for entry in templates {
        entry.encode(with_flags, &mut image);
    }
    image
}

/// What the special properties of an object body said
#[derive(Debug, Default)]
struct ObjectFacts {
    templates: Vec<TemplateEntry>,
    contents_set: bool,
    location: Option<ObjectId>,
    location_nil: bool,
    location_ok: bool,
    location_not_object: bool,
    has_vocabulary: bool,
}

impl Compiler {
    /// Compiles an object body up to (not including) its closing `;`
    pub(crate) fn compile_object(
        &mut self,
        name: &str,
        id: ObjectId,
        superclasses: &[ObjectId],
        is_class: bool,
    ) -> Result<(), CompilerError> {
        log::info!(
            "compiling {} '{}' (#{}), {} superclass(es)",
            if is_class { "class" } else { "object" },
            name,
            id.0,
            superclasses.len()
        );
        let line = self.line();

        let facts = self.with_object_locked(id, |c| {
            c.store.init_object(id, superclasses, is_class)?;
            let mut facts = ObjectFacts::default();
            while !c.check(TokenKind::Semicolon) {
                if c.check(TokenKind::EOF) {
                    return Err(CompilerError::UnexpectedEof(c.line()));
                }
                c.compile_property(id, superclasses, is_class, &mut facts)?;
            }
            c.close_object(id, is_class, &facts)?;
            Ok(facts)
        })?;

        let mut flags = 0;
        if is_class {
            flags |= vocab::INH_CLASS;
        }
        if facts.has_vocabulary {
            flags |= vocab::INH_HAS_VOCAB;
        }
        if facts.location_nil {
            flags |= vocab::INH_LOCATION_NIL;
        }
        self.vocab.add_inheritance(InheritanceRecord {
            object: id,
            location: facts.location,
            superclasses: superclasses.to_vec(),
            flags,
        });

        if facts.location_not_object && !facts.location_ok {
            self.warn(Warning::LocationNotObject(name.to_string(), line));
        }
        Ok(())
    }

    /// Writes the accumulated templates and defaults, then trims the object
    fn close_object(&mut self, id: ObjectId, is_class: bool, facts: &ObjectFacts) -> Result<(), CompilerError> {
        if !facts.templates.is_empty() {
            let with_flags = !self.options.old_templates;
            let (property, data_type) = if with_flags {
                (prop::TEMPLATE2, dat::TPL2)
            } else {
                (prop::TEMPLATE, dat::TPL)
            };
            let image = template_image(&facts.templates, with_flags);
            self.store.set_property(id, property, data_type, &image)?;
        }

        if !facts.contents_set {
            self.store.set_property(id, prop::CONTENTS, dat::DEMAND, &[])?;
        }

        let extra = if is_class { 0 } else { limits::OBJ_EXTRA };
        let size = self.store.size(id) + extra;
        self.store.extend(id, size)?;
        self.store.mark_dirty(id);
        Ok(())
    }

    fn compile_property(
        &mut self,
        id: ObjectId,
        superclasses: &[ObjectId],
        is_class: bool,
        facts: &mut ObjectFacts,
    ) -> Result<(), CompilerError> {
        if matches!(self.kind(), TokenKind::DoSynonym | TokenKind::IoSynonym) {
            return self.compile_synonyms(id);
        }

        let property;
        let name;
        if self.check(TokenKind::Replace) && !superclasses.is_empty() {
            self.advance();
            name = self.current.text.clone();
            property = self.require_property()?;
            self.delete_superseded(superclasses[0], property);
        } else {
            name = self.current.text.clone();
            property = self.require_property()?;
        }

        if property == prop::DO_ACTION || property == prop::IO_ACTION {
            return self.compile_template(property, facts);
        }

        if self.store.get_property(id, property).is_some() {
            let error = self.semantic_error(&format!("property \"{}\" redefined", name));
            self.log_error(error);
        }

        self.begin_code_body();
        let result = self.compile_property_value(id, &name, property, is_class, facts);

        if result.is_err() {
            self.abandon_code_body();
        }
        self.symbols.truncate_scopes(0);
        result
    }

    fn compile_property_value(
        &mut self,
        id: ObjectId,
        name: &str,
        property: u16,
        is_class: bool,
        facts: &mut ObjectFacts,
    ) -> Result<(), CompilerError> {
        let varargs = if self.eat(TokenKind::LeftParen) {
            self.parse_parameters()?
        } else {
            false
        };

        if self.eat(TokenKind::Arrow) {
            return self.compile_redirection(id, name, property);
        }

        self.require(TokenKind::Equal)?;

        if self.check(TokenKind::LeftBrace) {
            if prop::is_vocabulary(property) {
                return Err(self.semantic_error("vocabulary property cannot be code"));
            }
            let code = self.compile_code_body(varargs)?;
            log::debug!("method '{}': {} bytes", name, code.len());
            return self.store.set_property(id, property, dat::CODE, &code);
        }

        if prop::is_vocabulary(property) && self.check(TokenKind::LeftBracket) {
            self.advance();
        }

        let mark = self.arena.mark();
        let result = self.compile_value_expression(id, property, varargs, is_class, facts);
        self.arena.reset(mark);
        result
    }

    fn compile_value_expression(
        &mut self,
        id: ObjectId,
        property: u16,
        varargs: bool,
        is_class: bool,
        facts: &mut ObjectFacts,
    ) -> Result<(), CompilerError> {
        let line = self.line();
        let expression = self.parse_folded()?;

        if !self.arena.get(expression).is_leaf() {
            if prop::is_vocabulary(property) {
                return Err(CompilerError::SemanticError(
                    "vocabulary property requires single-quoted words".to_string(),
                    line,
                ));
            }
            if self.options.debug_locals {
                self.emit_frame_record();
            }
            self.emit_argument_check(varargs);
            self.emitter.emit_op(op::ENTER);
            self.emitter.emit_int2(0);
            if self.options.debug_lines {
                self.emit_line_record(line);
            }
            self.gen_expression(expression)?;
            self.emitter.emit_op(op::RETVAL);
            self.emitter.emit_int2(0);
            self.finish_goto_labels()?;
            let code = self.emitter.take_code();
            return self.store.set_property(id, property, dat::CODE, &code);
        }

        if prop::is_vocabulary(property) {
            return self.compile_vocabulary(id, property, expression, is_class, facts);
        }

        self.define_leaf(expression, SymbolKind::ForwardObject)?;
        let token = match self.arena.get(expression) {
            Node::Leaf(token) => token.clone(),
            _ => return Err(CompilerError::InternalError("folded value is not a leaf".to_string())),
        };
        let (data_type, bytes) = property_value(&token)?;
        self.store.set_property(id, property, data_type, &bytes)?;

        match property {
            prop::LOCATION => match data_type {
                dat::OBJECT => facts.location = Some(ObjectId(token.symbol.value as u16)),
                dat::NIL => facts.location_nil = true,
                _ => facts.location_not_object = true,
            },
            prop::CONTENTS => facts.contents_set = true,
            prop::LOCATION_OK => {
                if data_type == dat::TRUE {
                    facts.location_ok = true;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// `noun = 'lamp' 'lantern'`: the first word was parsed as the value
    fn compile_vocabulary(
        &mut self,
        id: ObjectId,
        property: u16,
        first: NodeRef,
        is_class: bool,
        facts: &mut ObjectFacts,
    ) -> Result<(), CompilerError> {
        let first = match self.arena.token(first) {
            Some(token) if token.kind == TokenKind::SString => token.string().to_string(),
            Some(token) => {
                return Err(CompilerError::SemanticError(
                    "vocabulary property requires single-quoted words".to_string(),
                    token.line,
                ))
            }
            None => return Err(self.semantic_error("vocabulary property requires single-quoted words")),
        };

        facts.has_vocabulary = true;
        let flags = if is_class { vocab::WORD_CLASS } else { 0 };
        self.vocab.add_word(property, id, flags, &first);
        while self.check(TokenKind::SString) {
            let word = self.current.string().to_string();
            self.vocab.add_word(property, id, flags, &word);
            self.advance();
        }
        self.eat(TokenKind::RightBracket);
        Ok(())
    }

    /// `doAction = 'Take'` and `ioAction(withPrep) = [flags] 'PutIn'`
    fn compile_template(&mut self, property: u16, facts: &mut ObjectFacts) -> Result<(), CompilerError> {
        let preposition = if property == prop::IO_ACTION {
            self.require(TokenKind::LeftParen)?;
            if !self.check(TokenKind::Symbol) {
                return Err(self.expected("preposition object"));
            }
            let binding = self.define_current(SymbolKind::ForwardObject)?;
            if !binding.kind.is_object() {
                return Err(self.semantic_error(&format!(
                    "\"{}\" is not an object",
                    self.current.text
                )));
            }
            self.advance();
            self.require(TokenKind::RightParen)?;
            binding.value as u16
        } else {
            vocab::NO_PREPOSITION
        };

        if facts.templates.len() >= limits::MAX_TEMPLATES {
            return Err(self.semantic_error("too many verb templates for one object"));
        }
        self.require(TokenKind::Equal)?;

        let mut flags = 0;
        if self.eat(TokenKind::LeftBracket) {
            if self.options.old_templates {
                let error = self.semantic_error("template flags need the new template format");
                self.log_error(error);
            }
            while !self.eat(TokenKind::RightBracket) {
                if !self.check(TokenKind::Symbol) {
                    return Err(self.expected("template flag"));
                }
                match self.current.text.as_str() {
                    "disambigDobjFirst" => flags |= vocab::TPL_DOBJ_FIRST,
                    "disambigIobjFirst" => {}
                    other => {
                        return Err(self.semantic_error(&format!("unknown template flag \"{}\"", other)))
                    }
                }
                self.advance();
            }
        }

        if !self.check(TokenKind::SString) {
            return Err(self.syntax_error("verb template requires a single-quoted root name"));
        }
        let root = self.current.string().to_string();
        if root.len() + 5 > limits::TOKNAMMAX {
            return Err(self.semantic_error("verb template root name too long"));
        }

        let (ver_io, io) = if property == prop::IO_ACTION {
            (
                self.derived_property("verIo", &root)?,
                self.derived_property("io", &root)?,
            )
        } else {
            (0, 0)
        };
        let entry = TemplateEntry {
            preposition,
            ver_io,
            io,
            ver_do: self.derived_property("verDo", &root)?,
            do_action: self.derived_property("do", &root)?,
            flags,
        };
        log::debug!("template '{}': {:?}", root, entry);
        facts.templates.push(entry);
        self.advance();
        Ok(())
    }

    /// Property named `prefix` + `root`, created if it does not exist yet
    fn derived_property(&mut self, prefix: &str, root: &str) -> Result<u16, CompilerError> {
        let name = format!("{}{}", prefix, root);
        let binding = self.symbols.lookup(&name);
        let binding = self.define_binding(&name, binding, SymbolKind::Property)?;
        if binding.kind != SymbolKind::Property {
            return Err(self.semantic_error(&format!("\"{}\" is not a property", name)));
        }
        Ok(binding.value as u16)
    }

    /// `doSynonym('Take') = 'Get' 'Grab'`: each listed verb's handlers
    /// point at the target verb's
    fn compile_synonyms(&mut self, id: ObjectId) -> Result<(), CompilerError> {
        let prefixes = if self.check(TokenKind::DoSynonym) {
            ["verDo", "do"]
        } else {
            ["verIo", "io"]
        };
        self.advance();
        self.require(TokenKind::LeftParen)?;
        if !self.check(TokenKind::SString) {
            return Err(self.expected("single-quoted verb name"));
        }
        let target = self.current.string().to_string();
        self.advance();
        self.require(TokenKind::RightParen)?;
        self.require(TokenKind::Equal)?;

        while self.check(TokenKind::SString) {
            let synonym = self.current.string().to_string();
            for prefix in prefixes {
                let to = self.derived_property(prefix, &target)?;
                let from = self.derived_property(prefix, &synonym)?;
                self.store.set_property(id, from, dat::SYN, &to.to_le_bytes())?;
            }
            self.advance();
        }
        Ok(())
    }

    /// `xoVerb -> obj` sends both `xoVerb` and `verXoVerb` to `obj`
    fn compile_redirection(&mut self, id: ObjectId, name: &str, property: u16) -> Result<(), CompilerError> {
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
        let target = (binding.value as u16).to_le_bytes();
        self.store.set_property(id, property, dat::REDIR, &target)?;

        let mut chars = name.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        let verify = self.derived_property("ver", &capitalized)?;
        self.store.set_property(id, verify, dat::REDIR, &target)?;

        self.advance();
        Ok(())
    }

    /// `replace prop` removes the property from every superseded version
    /// of the object being modified
    fn delete_superseded(&mut self, first: ObjectId, property: u16) {
        let soft = self.options.debug_info();
        let mut cursor = Some(first);
        while let Some(object) = cursor {
            let superseded = self.store.flags(object).superseded;
            let superclasses = self.store.superclasses(object);
            cursor = match (superseded, superclasses.as_slice()) {
                (true, [only]) => Some(*only),
                _ => None,
            };
            if superseded && self.store.delete_property(object, property, soft) {
                log::debug!(
                    "deleted property {} from object {}{}",
                    property,
                    object.0,
                    if soft { " (soft)" } else { "" }
                );
            }
        }
    }
}

/// Data type and stored bytes for a constant property value
fn property_value(token: &Token) -> Result<(u8, Vec<u8>), CompilerError> {
    let value = match token.kind {
        TokenKind::Number => (dat::NUMBER, token.number().to_le_bytes().to_vec()),
        TokenKind::SString => (dat::SSTRING, counted(token.string())),
        TokenKind::DString => (dat::DSTRING, counted(token.string())),
        TokenKind::List => match &token.value {
            TokenValue::List(elements) => (dat::LIST, list_image(elements)),
            _ => (dat::LIST, list_image(&[])),
        },
        TokenKind::Nil => (dat::NIL, Vec::new()),
        TokenKind::True => (dat::TRUE, Vec::new()),
        TokenKind::Pound => (dat::PROPNUM, token.property().to_le_bytes().to_vec()),
        TokenKind::Symbol => {
            let id = (token.symbol.value as u16).to_le_bytes().to_vec();
            match token.symbol.kind {
                SymbolKind::Object | SymbolKind::ForwardObject => (dat::OBJECT, id),
                SymbolKind::Function | SymbolKind::ForwardFunction => (dat::FNADDR, id),
                SymbolKind::Property => (dat::PROPNUM, id),
                _ => return Err(invalid_value(token)),
            }
        }
        _ => return Err(invalid_value(token)),
    };
    Ok(value)
}

fn counted(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 2);
    bytes.extend_from_slice(&((text.len() + 2) as u16).to_le_bytes());
    bytes.extend_from_slice(text.as_bytes());
    bytes
}

fn invalid_value(token: &Token) -> CompilerError {
    let what = if token.text.is_empty() {
        token.kind.to_string()
    } else {
        token.text.clone()
    };
    CompilerError::SemanticError(format!("invalid property value \"{}\"", what), token.line)
}

#[cfg(test)]
#[path = "objects_tests.rs"]
mod tests;
