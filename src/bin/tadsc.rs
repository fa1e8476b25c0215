// tadsc - TADS 2 compiler front end
// Compiles a TADS 2 source file and reports errors, warnings and, on
// request, a disassembly of the generated code

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::process;

use tadsc::tads_compiler::disassembler::listing;
use tadsc::tads_compiler::object_store::ObjectId;
use tadsc::tads_compiler::opcodes::dat;
use tadsc::tads_compiler::symbols::SymbolKind;
use tadsc::tads_compiler::{CompilationOutput, CompilerOptions, TadsCompiler};

fn main() {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut input_file = "";
    let mut config_file = "";
    let mut c_mode = false;
    let mut debug = false;
    let mut old_templates = false;
    let mut dump = false;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --config requires a filename");
                    process::exit(1);
                }
                config_file = &args[i + 1];
                i += 2;
            }
            "--c-mode" => {
                c_mode = true;
                i += 1;
            }
            "-g" | "--debug" => {
                debug = true;
                i += 1;
            }
            "--old-templates" => {
                old_templates = true;
                i += 1;
            }
            "-d" | "--dump" => {
                dump = true;
                i += 1;
            }
            "-v" | "--verbose" => {
                verbose = true;
                i += 1;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option '{}'", arg);
                print_usage(&args[0]);
                process::exit(1);
            }
            _ => {
                if input_file.is_empty() {
                    input_file = &args[i];
                } else {
                    eprintln!("Error: Multiple input files specified");
                    process::exit(1);
                }
                i += 1;
            }
        }
    }

    if input_file.is_empty() {
        eprintln!("Error: No input file specified");
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut options = if config_file.is_empty() {
        CompilerOptions::default()
    } else {
        match CompilerOptions::from_file(Path::new(config_file)) {
            Ok(options) => options,
            Err(err) => {
                eprintln!("Error: {}", err);
                process::exit(1);
            }
        }
    };
    // command-line switches override the config file
    options.c_mode |= c_mode;
    options.old_templates |= old_templates;
    if debug {
        options.debug_lines = true;
        options.debug_locals = true;
    }

    let source = match fs::read_to_string(input_file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading '{}': {}", input_file, err);
            process::exit(1);
        }
    };

    if verbose {
        println!("Compiling {} with {:?}", input_file, options);
    }

    let compiler = TadsCompiler::with_options(options);
    let output = match compiler.compile(&source) {
        Ok(output) => output,
        Err(err) => {
            eprintln!("{}: fatal: {}", input_file, err);
            process::exit(1);
        }
    };

    for warning in &output.warnings {
        eprintln!("{}:{}: {}", input_file, warning.line(), warning);
    }
    for error in &output.errors {
        match error.line() {
            Some(line) => eprintln!("{}:{}: {}", input_file, line, error),
            None => eprintln!("{}: {}", input_file, error),
        }
    }

    if dump {
        dump_code(&output);
    }

    println!("{}: {}", input_file, output.summary());
    if verbose {
        for name in output.undefined_symbols() {
            println!("undefined: {}", name);
        }
    }

    if !output.errors.is_empty() {
        process::exit(1);
    }
}

/// Prints a listing of every function and every method
fn dump_code(output: &CompilationOutput) {
    let property_names: HashMap<u16, &str> = output
        .symbols
        .globals()
        .filter(|(_, binding)| binding.kind == SymbolKind::Property)
        .map(|(name, binding)| (binding.value as u16, name.as_str()))
        .collect();

    let mut globals: Vec<(&String, ObjectId, SymbolKind)> = output
        .symbols
        .globals()
        .filter(|(_, binding)| {
            matches!(binding.kind, SymbolKind::Function | SymbolKind::Object)
        })
        .map(|(name, binding)| (name, ObjectId(binding.value as u16), binding.kind))
        .collect();
    globals.sort_by_key(|(_, id, _)| id.0);

    for (name, id, kind) in globals {
        if kind == SymbolKind::Function {
            if let Some(code) = output.store.function_code(id) {
                print_listing(name, code);
            }
            continue;
        }
        for (property, value) in output.store.properties(id) {
            if value.data_type != dat::CODE || value.deleted {
                continue;
            }
            let method = match property_names.get(&property) {
                Some(property_name) => format!("{}.{}", name, property_name),
                None => format!("{}.#{}", name, property),
            };
            print_listing(&method, &value.bytes);
        }
    }
}

fn print_listing(name: &str, code: &[u8]) {
    println!("{}:", name);
    match listing(code) {
        Ok(text) => print!("{}", text),
        Err(err) => println!("  <{}>", err),
    }
    println!();
}

fn print_usage(program_name: &str) {
    println!("Usage: {} [options] <input.t>", program_name);
    println!();
    println!("Options:");
    println!("  -c, --config <file>    Read compiler options from a TOML file");
    println!("  --c-mode               Start in C operator mode (== compares, = assigns)");
    println!("  -g, --debug            Emit LINE and FRAME debug records");
    println!("  --old-templates        Write verb templates without flags");
    println!("  -d, --dump             Print a disassembly of every function and method");
    println!("  -v, --verbose          Verbose output");
    println!("  -h, --help             Show this help message");
    println!();
    println!("Examples:");
    println!("  {} game.t                  # Check game.t for errors", program_name);
    println!("  {} -g --dump game.t       # Show generated code with debug records", program_name);
}
