/// End-to-end compilation of small games through the public compiler API
use tadsc::tads_compiler::disassembler::disassemble;
use tadsc::tads_compiler::opcodes::{dat, prop};
use tadsc::tads_compiler::{CompilerError, CompilerOptions, TadsCompiler, Warning};

const GAME: &str = r#"
compoundWord 'out' 'of' 'outof';
formatstring 'you' fmtYou;
specialWords 'of', 'and', 'then', 'all', 'both', 'but', 'one', 'ones', 'it', 'them', 'him', 'her';

class room: object
    isLit = true
;

class item: object
    weight = 1
    verDoTake(actor) =
    {
        if (self.location = actor)
            "You already have that.";
    }
    doTake(actor) =
    {
        self.moveInto(actor);
        "Taken.";
    }
;

startroom: room
    sdesc = "Start"
    ldesc =
    {
        "You are standing at the start. ";
        listcont(self);
    }
;

lamp: item
    location = startroom
    noun = 'lamp' 'lantern'
    adjective = 'brass'
    sdesc = "brass lamp"
    weight = 2 * 3
;

takeVerb: object
    verb = 'take' 'get'
    doAction = 'Take'
;

init: function
{
    local i;
    local total := 0;

    for (i := 1; i <= 10; i++)
        total += i;

    switch (total)
    {
        case 55:
            "Arithmetic works.\n";
            break;
        default:
            "Something is wrong.\n";
    }
}
"#;

#[test]
fn test_game_compiles_cleanly() {
    let output = TadsCompiler::new().compile(GAME).unwrap();
    assert!(output.errors.is_empty(), "errors: {:?}", output.errors);
    assert!(output.warnings.is_empty(), "warnings: {:?}", output.warnings);

    for name in ["room", "item", "startroom", "lamp", "takeVerb", "init"] {
        assert!(output.object_id(name).is_some(), "{} was not defined", name);
    }
    assert_eq!(output.undefined_symbols(), vec!["listcont".to_string()]);
    assert_eq!(output.words.compound_words.len(), 1);
    assert_eq!(output.words.format_strings.len(), 1);
    assert_eq!(output.words.special_slot(12), vec!["any", "either"]);
}

#[test]
fn test_game_objects() {
    let output = TadsCompiler::new().compile(GAME).unwrap();
    let lamp = output.object_id("lamp").unwrap();
    let item = output.object_id("item").unwrap();
    let startroom = output.object_id("startroom").unwrap();

    assert_eq!(output.store.superclasses(lamp), vec![item]);
    assert!(output.store.flags(item).class);
    assert!(!output.store.flags(lamp).class);

    let location = output.store.get_property(lamp, prop::LOCATION).unwrap();
    assert_eq!(location.data_type, dat::OBJECT);
    assert_eq!(location.bytes, startroom.0.to_le_bytes().to_vec());

    let words: Vec<String> = output
        .vocabulary
        .words_for(lamp)
        .into_iter()
        .map(|w| w.text.clone())
        .collect();
    assert_eq!(words, vec!["lamp", "lantern", "brass"]);

    let record = output.vocabulary.inheritance(lamp).unwrap();
    assert_eq!(record.location, Some(startroom));

    let take = output.object_id("takeVerb").unwrap();
    let templates = output.store.get_property(take, prop::TEMPLATE2).unwrap();
    assert_eq!(templates.data_type, dat::TPL2);
    assert_eq!(templates.bytes[0], 1);
}

#[test]
fn test_game_function_code() {
    let output = TadsCompiler::new().compile(GAME).unwrap();
    let init = output.object_id("init").unwrap();
    let code = output.store.function_code(init).unwrap();
    let instructions = disassemble(code).unwrap();

    let names: Vec<&str> = instructions.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names[0], "CHKARGC");
    assert_eq!(names[1], "ENTER");
    assert!(names.contains(&"ADD_LCL"));
    assert!(names.contains(&"SWITCH"));
    assert_eq!(names.last(), Some(&"RETURN"));

    let switch = instructions.iter().find(|i| i.name == "SWITCH").unwrap();
    assert_eq!(switch.cases.len(), 1);
    assert!(switch.default.is_some());
}

#[test]
fn test_errors_are_collected_and_compilation_continues() {
    let source = r#"
        broken: object
            sdesc = ;
        ;
        fine: object
            sdesc = "fine"
        ;
    "#;
    let output = TadsCompiler::new().compile(source).unwrap();
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].line(), Some(3));
    assert!(output.object_id("fine").is_some());
}

#[test]
fn test_c_mode_option() {
    let options = CompilerOptions {
        c_mode: true,
        ..CompilerOptions::default()
    };
    let source = r#"
        f: function
        {
            local a;
            a = 1;
            if (a == 1) "one";
        }
    "#;
    let output = TadsCompiler::with_options(options).compile(source).unwrap();
    assert!(output.errors.is_empty());
    assert!(output.warnings.is_empty());

    let f = output.object_id("f").unwrap();
    let instructions = disassemble(output.store.function_code(f).unwrap()).unwrap();
    let names: Vec<&str> = instructions.iter().map(|i| i.name.as_str()).collect();
    assert!(names.contains(&"ASI_LCL"));
    assert!(names.contains(&"EQ"));
}

#[test]
fn test_normal_mode_equals_statement_warns() {
    let source = "f: function { local a; a = 1; }";
    let output = TadsCompiler::new().compile(source).unwrap();
    assert_eq!(output.warnings, vec![Warning::EqualsAsStatement(1)]);
}

#[test]
fn test_fatal_error_is_returned() {
    let options = CompilerOptions {
        node_pool_size: 16,
        ..CompilerOptions::default()
    };
    let result = TadsCompiler::with_options(options).compile("f: function { return 1 + 2; }");
    assert!(matches!(result, Err(CompilerError::PoolExhausted(16))));
}

#[test]
fn test_options_from_toml() {
    let options = CompilerOptions::from_toml_str("c_mode = true\ndebug_lines = true\n").unwrap();
    assert!(options.c_mode);
    assert!(options.debug_lines);
    assert!(options.check_arg_count);

    let result = CompilerOptions::from_toml_str("node_pool_size = 8\n");
    assert!(matches!(result, Err(CompilerError::ConfigError(_))));
}
