// TADS Compiler Module
// Compiles TADS 2 game source into objects, functions and vocabulary

pub mod arena;
pub mod case_table;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod declarations;
pub mod disassembler;
pub mod emitter;
pub mod error;
pub mod expr_parser;
pub mod fold;
pub mod labels;
pub mod lexer;
pub mod object_store;
pub mod objects;
pub mod opcodes;
pub mod precedence;
pub mod statements;
pub mod symbols;
pub mod vocabulary;

use std::fmt::Write;

pub use config::CompilerOptions;
pub use error::{CompilerError, Warning};

use compiler::Compiler;
use object_store::{MemoryObjectStore, ObjectId, ObjectStore};
use symbols::{SymbolKind, SymbolTable};
use vocabulary::{MemoryVocabulary, Vocabulary, WordTables};

/// Everything a compilation produced, including the errors it recovered
/// from
pub struct CompilationOutput {
    pub errors: Vec<CompilerError>,
    pub warnings: Vec<Warning>,
    pub store: Box<dyn ObjectStore>,
    pub vocabulary: Box<dyn Vocabulary>,
    pub words: WordTables,
    pub symbols: SymbolTable,
}

impl CompilationOutput {
    /// Id of a defined object, class or function
    pub fn object_id(&self, name: &str) -> Option<ObjectId> {
        let binding = self.symbols.lookup_global(name)?;
        match binding.kind {
            SymbolKind::Object | SymbolKind::Function => Some(ObjectId(binding.value as u16)),
            _ => None,
        }
    }

    /// Names referenced as objects or functions but never defined
    pub fn undefined_symbols(&self) -> Vec<String> {
        self.symbols
            .globals()
            .filter(|(_, binding)| {
                matches!(
                    binding.kind,
                    SymbolKind::ForwardObject | SymbolKind::ForwardFunction
                )
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn summary(&self) -> String {
        let mut objects = 0;
        let mut functions = 0;
        for (_, binding) in self.symbols.globals() {
            match binding.kind {
                SymbolKind::Object => objects += 1,
                SymbolKind::Function => functions += 1,
                _ => {}
            }
        }

        let mut text = String::new();
        let _ = write!(
            &mut text,
            "{} object(s), {} function(s), {} compound word(s), {} format string(s), {} error(s), {} warning(s)",
            objects,
            functions,
            self.words.compound_words.len(),
            self.words.format_strings.len(),
            self.errors.len(),
            self.warnings.len()
        );
        text
    }
}

/// Main compiler structure
pub struct TadsCompiler {
    options: CompilerOptions,
}

impl Default for TadsCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TadsCompiler {
    /// Create a compiler with default options
    pub fn new() -> Self {
        TadsCompiler {
            options: CompilerOptions::default(),
        }
    }

    pub fn with_options(options: CompilerOptions) -> Self {
        TadsCompiler { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile into a fresh in-memory object store and vocabulary
    pub fn compile(&self, source: &str) -> Result<CompilationOutput, CompilerError> {
        self.compile_into(
            source,
            Box::new(MemoryObjectStore::new()),
            Box::new(MemoryVocabulary::new()),
        )
    }

    /// Compile into the given object store and vocabulary.
    ///
    /// Recoverable errors are collected in the output; only a lexical
    /// failure or a fatal error (pool exhaustion, label table overflow,
    /// jump range, internal errors) is returned as `Err`.
    pub fn compile_into(
        &self,
        source: &str,
        store: Box<dyn ObjectStore>,
        vocabulary: Box<dyn Vocabulary>,
    ) -> Result<CompilationOutput, CompilerError> {
        // Phase 1: Lexical Analysis
        let mut lexer = lexer::Lexer::new(source).case_insensitive(self.options.case_insensitive);
        let tokens = lexer.tokenize()?;
        log::debug!("{} tokens", tokens.len());

        // Phase 2: Parsing and code generation, one declaration at a time
        let mut compiler = Compiler::new(tokens, self.options.clone(), store, vocabulary);
        compiler.compile_program()?;

        let (store, vocabulary, words, symbols, diagnostics) = compiler.finish();
        Ok(CompilationOutput {
            errors: diagnostics.errors,
            warnings: diagnostics.warnings,
            store,
            vocabulary,
            words,
            symbols,
        })
    }
}
