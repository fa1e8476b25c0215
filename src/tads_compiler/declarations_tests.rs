#[cfg(test)]
mod tests {
    use crate::tads_compiler::compiler::Compiler;
    use crate::tads_compiler::config::CompilerOptions;
    use crate::tads_compiler::declarations::unescape_format;
    use crate::tads_compiler::disassembler::disassemble;
    use crate::tads_compiler::error::{CompilerError, Warning};
    use crate::tads_compiler::object_store::ObjectId;
    use crate::tads_compiler::opcodes::prop;
    use crate::tads_compiler::symbols::SymbolKind;

    use test_log::test;

    fn compile(source: &str) -> Compiler {
        let mut compiler = Compiler::for_source(source);
        compiler.compile_program().unwrap();
        compiler
    }

    fn id(compiler: &Compiler, name: &str) -> ObjectId {
        Compiler::object_of(compiler.symbols.lookup(name))
    }

    fn error_messages(compiler: &Compiler) -> Vec<String> {
        compiler
            .diagnostics
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    /// A specialWords declaration naming every slot, starting with `first`
    fn special_words(first: &str) -> String {
        format!(
            "specialWords '{}', 'and', 'then', 'all' = 'everything', 'both', 'but' = 'except', \
             'one', 'ones', 'it', 'them', 'him', 'her', 'any' = 'either';",
            first
        )
    }

    #[test]
    fn test_function_definition() {
        let compiler = compile("helper: function(x) { return x; }");
        let binding = compiler.symbols.lookup("helper");
        assert_eq!(binding.kind, SymbolKind::Function);

        let helper = id(&compiler, "helper");
        assert!(compiler.store.flags(helper).function);
        let code = compiler.store.function_code(helper).unwrap();
        let names: Vec<String> = disassemble(code)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["CHKARGC", "ENTER", "GETLCL", "RETVAL", "RETURN"]);
        assert!(!compiler.in_function);
    }

    #[test]
    fn test_forward_declaration_then_definition() {
        let compiler = compile(
            "helper: function;
             main: function { helper(); }
             helper: function { }",
        );
        assert!(compiler.diagnostics.errors.is_empty());
        assert_eq!(compiler.symbols.lookup("helper").kind, SymbolKind::Function);
        assert!(compiler.store.function_code(id(&compiler, "helper")).is_some());
    }

    #[test]
    fn test_function_redefinition_is_reported() {
        let compiler = compile("f: function { } f: function { }");
        let messages = error_messages(&compiler);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("redefined"));
    }

    #[test]
    fn test_replace_function() {
        let compiler = compile("f: function { } replace f: function { \"new\"; }");
        assert!(compiler.diagnostics.errors.is_empty());
        let code = compiler.store.function_code(id(&compiler, "f")).unwrap();
        let instructions = disassemble(code).unwrap();
        assert!(instructions.iter().any(|i| i.name == "SAY"));
    }

    #[test]
    fn test_modify_function_is_an_error() {
        let compiler = compile("f: function { } modify f: function { }");
        assert!(!compiler.diagnostics.errors.is_empty());
    }

    #[test]
    fn test_external_function() {
        let compiler = compile("hook: external function;");
        assert!(compiler.diagnostics.errors.is_empty());
        assert_eq!(compiler.symbols.lookup("hook").kind, SymbolKind::External);
    }

    #[test]
    fn test_superclass_must_be_an_object() {
        let compiler = compile("f: function { } lamp: f ;");
        let messages = error_messages(&compiler);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("is not an object"));
    }

    #[test]
    fn test_object_redefinition_is_reported() {
        let compiler = compile("lamp: object ; lamp: object ;");
        let messages = error_messages(&compiler);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("redefined as an object"));
    }

    #[test]
    fn test_modify_keeps_original_as_superclass() {
        let compiler = compile(
            "class thing: object ;
             lamp: thing sdesc = \"lamp\" ;
             modify lamp ldesc = \"lit\" ;",
        );
        assert!(compiler.diagnostics.errors.is_empty());
        let thing = id(&compiler, "thing");
        let lamp = id(&compiler, "lamp");
        let original = compiler.store.superclasses(lamp)[0];
        assert_ne!(original, lamp);

        let alias = compiler.symbols.lookup(&format!("lamp@{}", original.0));
        assert_eq!(alias.kind, SymbolKind::Object);
        assert_eq!(alias.value, original.0 as i32);

        let flags = compiler.store.flags(original);
        assert!(flags.superseded);
        assert!(flags.class);
        assert!(!compiler.store.flags(lamp).class);

        assert_eq!(compiler.store.superclasses(original), vec![thing]);
        assert!(compiler.store.get_property(original, prop::SDESC).is_some());
        assert!(compiler.store.get_property(lamp, prop::SDESC).is_none());

        assert_eq!(
            compiler.vocab.inheritance(original).unwrap().superclasses,
            vec![thing]
        );
        assert_eq!(compiler.vocab.inheritance(lamp).unwrap().superclasses, vec![original]);
    }

    #[test]
    fn test_modified_class_stays_a_class() {
        let compiler = compile("class thing: object ; modify thing ;");
        assert!(compiler.diagnostics.errors.is_empty());
        assert!(compiler.store.flags(id(&compiler, "thing")).class);
    }

    #[test]
    fn test_modify_unknown_object_is_an_error() {
        let compiler = compile("modify ghost sdesc = 1 ; lamp: object ;");
        assert_eq!(compiler.diagnostics.errors.len(), 1);
        assert_eq!(compiler.symbols.lookup("lamp").kind, SymbolKind::Object);
    }

    #[test]
    fn test_replace_object_drops_old_vocabulary() {
        let compiler = compile(
            "lamp: object noun = 'lamp' ;
             replace lamp: object noun = 'torch' ;",
        );
        assert!(compiler.diagnostics.errors.is_empty());
        let words: Vec<String> = compiler
            .vocab
            .words_for(id(&compiler, "lamp"))
            .into_iter()
            .map(|w| w.text.clone())
            .collect();
        assert_eq!(words, vec!["torch".to_string()]);
    }

    #[test]
    fn test_compound_word() {
        let compiler = compile("compoundWord 'out' 'of' 'outof';");
        assert_eq!(
            compiler.words.compound_words,
            vec![("out".to_string(), "of".to_string(), "outof".to_string())]
        );
    }

    #[test]
    fn test_format_string() {
        let compiler = compile("formatstring 'you' fmtYou;");
        let property = compiler.symbols.lookup("fmtYou");
        assert_eq!(property.kind, SymbolKind::Property);
        assert_eq!(
            compiler.words.format_strings,
            vec![("you".to_string(), property.value as u16)]
        );
    }

    #[test]
    fn test_unescape_format() {
        assert_eq!(unescape_format("you\\'re"), "you're");
        assert_eq!(unescape_format("a\\\\b"), "a\\b");
        assert_eq!(unescape_format("plain"), "plain");
    }

    #[test]
    fn test_full_special_words_list() {
        let compiler = compile(&special_words("of"));
        assert!(compiler.diagnostics.errors.is_empty());
        assert_eq!(compiler.words.special_slot(0), vec!["of"]);
        assert_eq!(compiler.words.special_slot(3), vec!["all", "everything"]);
        assert_eq!(compiler.words.special_slot(12), vec!["any", "either"]);
        assert_eq!(compiler.words.special_words.len(), 16);
    }

    #[test]
    fn test_special_words_may_stop_before_the_any_slot() {
        let compiler = compile(
            "specialWords 'of', 'and', 'then', 'all', 'both', 'but', 'one', 'ones', 'it', \
             'them', 'him', 'her';",
        );
        assert!(compiler.diagnostics.errors.is_empty());
        assert_eq!(compiler.words.special_slot(12), vec!["any", "either"]);
    }

    #[test]
    fn test_incomplete_special_words() {
        let compiler = compile("specialWords 'of', 'and'; lamp: object ;");
        assert_eq!(compiler.diagnostics.errors.len(), 1);
        assert!(matches!(
            compiler.diagnostics.errors[0],
            CompilerError::SyntaxError(_, 1)
        ));
        assert_eq!(compiler.symbols.lookup("lamp").kind, SymbolKind::Object);
    }

    #[test]
    fn test_nil_special_word_needs_modify() {
        let compiler = compile("specialWords nil;");
        assert_eq!(compiler.diagnostics.errors.len(), 1);
    }

    #[test]
    fn test_second_special_words_replaces_with_warning() {
        let source = format!("{}\n{}", special_words("of"), special_words("from"));
        let compiler = compile(&source);
        assert_eq!(
            compiler.diagnostics.warnings,
            vec![Warning::ReplacedSpecialWords(2)]
        );
        assert_eq!(compiler.words.special_slot(0), vec!["from"]);
    }

    #[test]
    fn test_replace_special_words_is_silent() {
        let source = format!("{}\nreplace {}", special_words("of"), special_words("from"));
        let compiler = compile(&source);
        assert!(compiler.diagnostics.warnings.is_empty());
        assert_eq!(compiler.words.special_slot(0), vec!["from"]);
    }

    #[test]
    fn test_modify_special_words_adds_to_slots() {
        let source = format!(
            "{}\nmodify specialWords 'out of', nil, nil, nil, nil, nil, nil, nil, nil, nil, nil, nil;",
            special_words("of")
        );
        let compiler = compile(&source);
        assert!(compiler.diagnostics.errors.is_empty());
        assert!(compiler.diagnostics.warnings.is_empty());
        assert_eq!(compiler.words.special_slot(0), vec!["of", "out of"]);
        assert_eq!(compiler.words.special_slot(1), vec!["and"]);
    }

    #[test]
    fn test_error_in_function_skips_its_body() {
        let compiler = compile(
            "f: function(1) { if (x) { \"a\"; } }
             g: function { \"b\"; }",
        );
        assert_eq!(compiler.diagnostics.errors.len(), 1);
        assert!(!compiler.in_function);
        assert_eq!(compiler.symbols.lookup("g").kind, SymbolKind::Function);
        assert!(compiler.store.function_code(id(&compiler, "g")).is_some());
    }

    #[test]
    fn test_fatal_error_stops_compilation() {
        let options = CompilerOptions {
            node_pool_size: 16,
            ..CompilerOptions::default()
        };
        let mut compiler = Compiler::for_source_with("f: function { return 1 + 2; }", options);
        assert_eq!(
            compiler.compile_program(),
            Err(CompilerError::PoolExhausted(16))
        );
    }
}
