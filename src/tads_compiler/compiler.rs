// Compiler context
//
// One `Compiler` value carries everything the parser, folder, code
// generator and declaration compiler share: the token cursor, the node
// arena, the emitter, the symbol table and the external object store and
// vocabulary. The phases are `impl Compiler` blocks in their own files.

use crate::tads_compiler::arena::{NodeArena, NodeRef};
use crate::tads_compiler::case_table::CaseTable;
use crate::tads_compiler::config::CompilerOptions;
use crate::tads_compiler::emitter::Emitter;
use crate::tads_compiler::error::{CompilerError, Diagnostics, Warning};
use crate::tads_compiler::lexer::{Token, TokenKind};
use crate::tads_compiler::object_store::{ObjectId, ObjectStore};
use crate::tads_compiler::symbols::{SymbolBinding, SymbolKind, SymbolTable};
use crate::tads_compiler::vocabulary::{Vocabulary, WordTables};

pub struct Compiler {
    tokens: Vec<Token>,
    position: usize,
    /// Current token, with its symbol binding resolved
    pub(crate) current: Token,

    pub(crate) options: CompilerOptions,
    /// `==` compares and `=` assigns
    pub(crate) c_mode: bool,
    /// Parsing the elements of a list literal
    pub(crate) in_list: bool,
    /// Compiling a function body rather than a method
    pub(crate) in_function: bool,

    pub(crate) arena: NodeArena,
    pub(crate) emitter: Emitter,
    pub(crate) symbols: SymbolTable,
    pub(crate) store: Box<dyn ObjectStore>,
    pub(crate) vocab: Box<dyn Vocabulary>,
    pub(crate) words: WordTables,
    pub(crate) diagnostics: Diagnostics,

    /// Offset of the ENTER operand for the code body being compiled
    pub(crate) enter_offset: Option<usize>,
    /// Offset of the length field of the innermost FRAME record, 0 if none
    pub(crate) frame: u16,
    /// Last source line a LINE record was emitted for
    pub(crate) last_line: usize,
    /// Case tables of the enclosing switch statements, innermost last
    pub(crate) switches: Vec<CaseTable>,
}

impl Compiler {
    pub fn new(
        tokens: Vec<Token>,
        options: CompilerOptions,
        store: Box<dyn ObjectStore>,
        vocab: Box<dyn Vocabulary>,
    ) -> Self {
        let eof = Token::new(TokenKind::EOF, "", 1, 1);
        let mut compiler = Compiler {
            tokens,
            position: 0,
            current: eof,
            c_mode: options.c_mode,
            in_list: false,
            in_function: false,
            arena: NodeArena::new(options.node_pool_size),
            emitter: Emitter::new(options.label_pool_size),
            symbols: SymbolTable::new(options.case_insensitive),
            store,
            vocab,
            words: WordTables::new(),
            diagnostics: Diagnostics::new(),
            enter_offset: None,
            frame: 0,
            last_line: 0,
            switches: Vec::new(),
            options,
        };
        compiler.load_current();
        compiler
    }

    /// Makes the token at `position` current, consuming pragmas
    fn load_current(&mut self) {
        loop {
            let token = match self.tokens.get(self.position) {
                Some(token) => token.clone(),
                None => {
                    let line = self.tokens.last().map_or(1, |t| t.line);
                    Token::new(TokenKind::EOF, "", line, 1)
                }
            };
            if token.kind == TokenKind::Pragma {
                self.c_mode = token.number() != 0;
                log::debug!("line {}: C operator mode {}", token.line, self.c_mode);
                self.position += 1;
                continue;
            }
            self.current = token;
            self.resolve_current();
            return;
        }
    }

    fn resolve_current(&mut self) {
        if self.current.kind == TokenKind::Symbol {
            self.current.symbol = self.symbols.lookup(&self.current.text);
        }
    }

    pub(crate) fn advance(&mut self) {
        if self.current.kind != TokenKind::EOF {
            self.position += 1;
        }
        self.load_current();
    }

    pub(crate) fn kind(&self) -> TokenKind {
        self.current.kind
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    pub(crate) fn line(&self) -> usize {
        self.current.line
    }

    /// Skips the current token if it is `kind`
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expected(&self, what: &str) -> CompilerError {
        if self.check(TokenKind::EOF) {
            return CompilerError::UnexpectedEof(self.line());
        }
        let found = if self.current.text.is_empty() {
            self.current.kind.to_string()
        } else {
            self.current.text.clone()
        };
        CompilerError::ExpectedToken(what.to_string(), found, self.line())
    }

    /// Checks for and skips a required token
    pub(crate) fn require(&mut self, kind: TokenKind) -> Result<(), CompilerError> {
        if !self.check(kind) {
            return Err(self.expected(&kind.to_string()));
        }
        self.advance();
        Ok(())
    }

    /// Advances, then requires `kind`
    pub(crate) fn require_next(&mut self, kind: TokenKind) -> Result<(), CompilerError> {
        self.advance();
        self.require(kind)
    }

    pub(crate) fn syntax_error(&self, message: &str) -> CompilerError {
        CompilerError::SyntaxError(message.to_string(), self.line())
    }

    pub(crate) fn semantic_error(&self, message: &str) -> CompilerError {
        CompilerError::SemanticError(message.to_string(), self.line())
    }

    /// Records a recoverable error and carries on
    pub(crate) fn log_error(&mut self, error: CompilerError) {
        self.diagnostics.error(error);
    }

    pub(crate) fn warn(&mut self, warning: Warning) {
        self.diagnostics.warn(warning);
    }

    /// Gives an unknown symbol the requested kind and a fresh value.
    ///
    /// Symbols that already have a meaning keep it; callers check the
    /// returned kind when they need something specific.
    pub(crate) fn define_binding(
        &mut self,
        name: &str,
        binding: SymbolBinding,
        kind: SymbolKind,
    ) -> Result<SymbolBinding, CompilerError> {
        if binding.kind != SymbolKind::Unknown {
            return Ok(binding);
        }

        let existing = self.symbols.lookup(name);
        if existing.kind != SymbolKind::Unknown {
            return Ok(existing);
        }

        let value = match kind {
            SymbolKind::Property => self.symbols.allocate_property() as i32,
            SymbolKind::ForwardObject | SymbolKind::ForwardFunction => {
                let id = self.store.allocate();
                log::debug!("'{}' -> object {}", name, id.0);
                id.0 as i32
            }
            SymbolKind::External => self.symbols.allocate_external() as i32,
            SymbolKind::Label => {
                let label = self.emitter.new_label()?;
                self.symbols.add_goto_label(name, label.0);
                return Ok(SymbolBinding::new(SymbolKind::Label, label.0 as i32));
            }
            _ => 0,
        };

        let defined = SymbolBinding::new(kind, value);
        self.symbols.add_global(name, defined);
        Ok(defined)
    }

    /// `define_binding` for the current token
    pub(crate) fn define_current(&mut self, kind: SymbolKind) -> Result<SymbolBinding, CompilerError> {
        if self.current.kind != TokenKind::Symbol {
            return Ok(self.current.symbol);
        }
        let name = self.current.text.clone();
        let binding = self.define_binding(&name, self.current.symbol, kind)?;
        self.current.symbol = binding;
        Ok(binding)
    }

    /// `define_binding` for the token of a leaf node
    pub(crate) fn define_leaf(&mut self, node: NodeRef, kind: SymbolKind) -> Result<(), CompilerError> {
        let (name, binding) = match self.arena.token(node) {
            Some(token) if token.kind == TokenKind::Symbol => (token.text.clone(), token.symbol),
            _ => return Ok(()),
        };
        let defined = self.define_binding(&name, binding, kind)?;
        if let Some(token) = self.arena.token_mut(node) {
            token.symbol = defined;
        }
        Ok(())
    }

    /// Rebinds the current symbol, replacing whatever it meant before
    pub(crate) fn set_current_binding(&mut self, binding: SymbolBinding) {
        let name = self.current.text.clone();
        self.symbols.add_global(&name, binding);
        self.current.symbol = binding;
    }

    /// Requires a property name; unknown symbols become new properties
    pub(crate) fn require_property(&mut self) -> Result<u16, CompilerError> {
        if !self.check(TokenKind::Symbol) {
            return Err(self.expected("symbol"));
        }
        let binding = self.define_current(SymbolKind::Property)?;
        if binding.kind != SymbolKind::Property {
            return Err(self.semantic_error(&format!(
                "\"{}\" is not a property",
                self.current.text
            )));
        }
        self.advance();
        Ok(binding.value as u16)
    }

    /// Runs `body` with `object` locked, unlocking on every exit path
    pub(crate) fn with_object_locked<T>(
        &mut self,
        object: ObjectId,
        body: impl FnOnce(&mut Self) -> Result<T, CompilerError>,
    ) -> Result<T, CompilerError> {
        self.store.lock(object)?;
        let result = body(self);
        self.store.unlock(object);
        result
    }

    /// Object id named by a symbol binding
    pub(crate) fn object_of(binding: SymbolBinding) -> ObjectId {
        ObjectId(binding.value as u16)
    }

    /// Hands back the pieces that outlive the compilation
    pub(crate) fn finish(
        self,
    ) -> (
        Box<dyn ObjectStore>,
        Box<dyn Vocabulary>,
        WordTables,
        SymbolTable,
        Diagnostics,
    ) {
        (
            self.store,
            self.vocab,
            self.words,
            self.symbols,
            self.diagnostics,
        )
    }
}

#[cfg(test)]
impl Compiler {
    /// Compiler over `source` with default options and in-memory storage
    pub(crate) fn for_source(source: &str) -> Self {
        Compiler::for_source_with(source, CompilerOptions::default())
    }

    pub(crate) fn for_source_with(source: &str, options: CompilerOptions) -> Self {
        use crate::tads_compiler::lexer::Lexer;
        use crate::tads_compiler::object_store::MemoryObjectStore;
        use crate::tads_compiler::vocabulary::MemoryVocabulary;

        let tokens = Lexer::new(source).tokenize().unwrap();
        Compiler::new(
            tokens,
            options,
            Box::new(MemoryObjectStore::new()),
            Box::new(MemoryVocabulary::new()),
        )
    }
}
