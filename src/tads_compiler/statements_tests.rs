#[cfg(test)]
mod tests {
    use crate::tads_compiler::compiler::Compiler;
    use crate::tads_compiler::config::CompilerOptions;
    use crate::tads_compiler::disassembler::{disassemble, Instruction, Operand};
    use crate::tads_compiler::error::Warning;
    use crate::tads_compiler::object_store::ObjectId;

    use test_log::test;

    fn compile_with(source: &str, options: CompilerOptions) -> (Compiler, Vec<Instruction>) {
        let mut compiler = Compiler::for_source_with(source, options);
        compiler.compile_program().unwrap();
        let id = ObjectId(compiler.symbols.lookup("f").value as u16);
        let code = compiler.store.function_code(id).unwrap().to_vec();
        let instructions = disassemble(&code).unwrap();
        (compiler, instructions)
    }

    /// Compiles `f: function { body }` and disassembles f
    fn compile_body(body: &str) -> (Compiler, Vec<Instruction>) {
        compile_with(&format!("f: function {{ {} }}", body), CompilerOptions::default())
    }

    fn names(instructions: &[Instruction]) -> Vec<&str> {
        instructions.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_locals_and_return() {
        let (compiler, code) = compile_body("local a := 1; return a;");
        assert_eq!(
            names(&code),
            vec!["CHKARGC", "ENTER", "PUSHNUM", "SETLCL", "GETLCL", "RETVAL", "RETURN"]
        );
        assert_eq!(code[0].operands, vec![Operand::Byte(0)]);
        assert_eq!(code[1].operands, vec![Operand::Int2(1)]);
        assert_eq!(code[3].operands, vec![Operand::Slot(1)]);
        assert!(compiler.diagnostics.errors.is_empty());
    }

    #[test]
    fn test_enter_counts_locals_of_nested_blocks() {
        let (_, code) = compile_body("local a; { local b, c; } { local d; }");
        assert_eq!(code[1].name, "ENTER");
        assert_eq!(code[1].operands, vec![Operand::Int2(3)]);
    }

    #[test]
    fn test_parameters_and_argument_check() {
        let source = "f: function(a, b) { return a + b; }";
        let (_, code) = compile_with(source, CompilerOptions::default());
        assert_eq!(code[0].operands, vec![Operand::Byte(2)]);
        assert_eq!(code[2].operands, vec![Operand::Slot(-1)]);
        assert_eq!(code[3].operands, vec![Operand::Slot(-2)]);
        assert_eq!(code[5].name, "RETVAL");
        assert_eq!(code[5].operands, vec![Operand::Int2(2)]);

        let source = "f: function(a, ...) { }";
        let (_, code) = compile_with(source, CompilerOptions::default());
        assert_eq!(code[0].operands, vec![Operand::Byte(0x81)]);
    }

    #[test]
    fn test_argument_check_can_be_disabled() {
        let options = CompilerOptions {
            check_arg_count: false,
            ..CompilerOptions::default()
        };
        let (_, code) = compile_with("f: function { }", options);
        assert_eq!(names(&code), vec!["ENTER", "RETURN"]);
    }

    #[test]
    fn test_if_else_jumps() {
        let (_, code) = compile_body("local a; if (a) \"yes\"; else \"no\";");
        assert_eq!(
            names(&code),
            vec!["CHKARGC", "ENTER", "GETLCL", "JF", "SAY", "JMP", "SAY", "RETURN"]
        );
        assert_eq!(code[3].target(), Some(code[6].offset));
        assert_eq!(code[5].target(), Some(code[7].offset));
    }

    #[test]
    fn test_while_with_break_and_continue() {
        let (_, code) =
            compile_body("local i; while (i < 3) { i++; if (i = 2) continue; break; }");
        assert_eq!(
            names(&code),
            vec![
                "CHKARGC", "ENTER", "GETLCL", "PUSHNUM", "LT", "JF", "INC_POST_LCL", "DISCARD",
                "GETLCL", "PUSHNUM", "EQ", "JF", "JMP", "JMP", "JMP", "RETURN"
            ]
        );
        let top = code[2].offset;
        let exit = code[15].offset;
        assert_eq!(code[5].target(), Some(exit));
        assert_eq!(code[11].target(), Some(code[13].offset));
        assert_eq!(code[12].target(), Some(top)); // continue
        assert_eq!(code[13].target(), Some(exit)); // break
        assert_eq!(code[14].target(), Some(top));
    }

    #[test]
    fn test_do_while_jumps_back_to_top() {
        let (_, code) = compile_body("local i; do i++; while (i < 3);");
        assert_eq!(
            names(&code),
            vec!["CHKARGC", "ENTER", "INC_POST_LCL", "DISCARD", "GETLCL", "PUSHNUM", "LT", "JT", "RETURN"]
        );
        assert_eq!(code[7].target(), Some(code[2].offset));
    }

    #[test]
    fn test_for_loop_layout() {
        let (_, code) = compile_body("local i; for (i := 0; i < 3; i++) \"x\";");
        assert_eq!(
            names(&code),
            vec![
                "CHKARGC", "ENTER", "PUSHNUM", "ASI_LCL", "DISCARD", "GETLCL", "PUSHNUM", "LT",
                "JF", "SAY", "INC_POST_LCL", "DISCARD", "JMP", "RETURN"
            ]
        );
        assert_eq!(code[8].target(), Some(code[13].offset));
        assert_eq!(code[12].target(), Some(code[5].offset));
    }

    #[test]
    fn test_switch_table() {
        let (_, code) = compile_body(
            "local v; switch (v) { case 1: \"one\"; break; case 'two': \"two\"; default: \"other\"; }",
        );
        let switch = code.iter().find(|i| i.name == "SWITCH").unwrap();
        assert_eq!(switch.cases.len(), 2);
        assert_eq!(switch.cases[0].value.operands, vec![Operand::Number(1)]);
        assert_eq!(
            switch.cases[1].value.operands,
            vec![Operand::Str("two".to_string())]
        );

        let says: Vec<&Instruction> = code.iter().filter(|i| i.name == "SAY").collect();
        assert_eq!(switch.cases[0].target, says[0].offset);
        assert_eq!(switch.cases[1].target, says[1].offset);
        assert_eq!(switch.default, Some(says[2].offset));

        // break and the jump over the table both land after the switch
        let end = code.last().unwrap().offset;
        let jumps: Vec<usize> = code
            .iter()
            .filter(|i| i.name == "JMP")
            .filter_map(|i| i.target())
            .collect();
        assert_eq!(jumps, vec![end, end]);
    }

    #[test]
    fn test_switch_without_default_falls_out() {
        let (_, code) = compile_body("local v; switch (v) { case 1: \"one\"; }");
        let switch = code.iter().find(|i| i.name == "SWITCH").unwrap();
        let end = code.last().unwrap().offset;
        assert_eq!(switch.default, Some(end));
    }

    #[test]
    fn test_large_switch_spans_case_pages() {
        let mut body = String::from("local v; switch (v) {");
        for value in 0..60 {
            body.push_str(&format!(" case {}: v := {};", value, value + 100));
        }
        body.push_str(" default: v := 0; }");

        let (compiler, code) = compile_body(&body);
        assert!(compiler.diagnostics.errors.is_empty());
        let switch = code.iter().find(|i| i.name == "SWITCH").unwrap();
        assert_eq!(switch.cases.len(), 60);
        for (value, case) in switch.cases.iter().enumerate() {
            assert_eq!(case.value.operands, vec![Operand::Number(value as i32)]);
            let body = code.iter().find(|i| i.offset == case.target).unwrap();
            assert_eq!(body.operands, vec![Operand::Number(value as i32 + 100)]);
        }
        assert!(switch.default.is_some());
    }

    #[test]
    fn test_goto_forward_label() {
        let (compiler, code) = compile_body("goto done; \"skipped\"; done: return;");
        assert_eq!(
            names(&code),
            vec!["CHKARGC", "ENTER", "JMP", "SAY", "RETURN", "RETURN"]
        );
        assert_eq!(code[2].target(), Some(code[4].offset));
        assert!(compiler.diagnostics.warnings.is_empty());
        assert_eq!(compiler.emitter.labels.live_count(), 0);
    }

    #[test]
    fn test_undefined_goto_label_warns() {
        let (compiler, _) = compile_body("goto nowhere;");
        assert!(matches!(
            compiler.diagnostics.warnings.as_slice(),
            [Warning::UndefinedGotoLabel(name, _)] if name == "nowhere"
        ));
        assert_eq!(compiler.emitter.labels.live_count(), 0);
    }

    #[test]
    fn test_statement_errors_are_recovered() {
        let (compiler, code) = compile_body("local a; a := ; \"after\";");
        assert_eq!(compiler.diagnostics.errors.len(), 1);
        assert!(names(&code).contains(&"SAY"));
        assert_eq!(compiler.arena.len(), 0);
        assert_eq!(compiler.arena.used(), 0);
    }

    #[test]
    fn test_break_outside_loop_is_an_error() {
        let (compiler, _) = compile_body("break; \"still compiled\";");
        assert_eq!(compiler.diagnostics.errors.len(), 1);
    }

    #[test]
    fn test_late_local_is_an_error() {
        let (compiler, code) = compile_body("local a; \"x\"; local b; \"y\";");
        assert_eq!(compiler.diagnostics.errors.len(), 1);
        assert!(compiler.diagnostics.errors[0]
            .to_string()
            .contains("local declarations"));
        assert_eq!(names(&code).iter().filter(|n| **n == "SAY").count(), 2);
    }

    #[test]
    fn test_else_without_if_is_an_error() {
        let (compiler, _) = compile_body("else \"x\"; \"y\";");
        assert_eq!(compiler.diagnostics.errors.len(), 1);
    }

    #[test]
    fn test_case_outside_switch_is_an_error() {
        let (compiler, _) = compile_body("case 1: \"x\";");
        assert!(!compiler.diagnostics.errors.is_empty());
    }

    #[test]
    fn test_equals_as_statement_warns() {
        let (compiler, _) = compile_body("local a; a = 1;");
        assert_eq!(compiler.diagnostics.warnings, vec![Warning::EqualsAsStatement(1)]);
    }

    #[test]
    fn test_assignment_in_c_mode_condition_warns() {
        let source = "#pragma C+\nf: function { local a; if (a = 1) \"x\"; }";
        let (compiler, _) = compile_with(source, CompilerOptions::default());
        assert_eq!(
            compiler.diagnostics.warnings,
            vec![Warning::PossibleIncorrectAssignment(2)]
        );
    }

    #[test]
    fn test_assignment_in_c_mode_return_warns() {
        let source = "#pragma C+\nf: function { local a; return a = 1; }";
        let (compiler, code) = compile_with(source, CompilerOptions::default());
        assert_eq!(
            compiler.diagnostics.warnings,
            vec![Warning::PossibleIncorrectAssignment(2)]
        );
        assert!(names(&code).contains(&"RETVAL"));
    }

    #[test]
    fn test_comparison_statement_warns_in_c_mode() {
        let source = "#pragma C+\nf: function { local a; a == 1; }";
        let (compiler, _) = compile_with(source, CompilerOptions::default());
        assert_eq!(
            compiler.diagnostics.warnings,
            vec![Warning::EqualsAsStatement(2)]
        );
    }

    #[test]
    fn test_line_records() {
        let options = CompilerOptions {
            debug_lines: true,
            ..CompilerOptions::default()
        };
        let (_, code) = compile_with("f: function\n{\n  \"a\";\n  \"b\";\n}", options);
        assert_eq!(
            names(&code),
            vec!["CHKARGC", "ENTER", "LINE", "SAY", "LINE", "SAY", "RETURN"]
        );
        assert_eq!(code[2].operands, vec![Operand::Int2(3)]);
        assert_eq!(code[4].operands, vec![Operand::Int2(4)]);
    }

    #[test]
    fn test_frame_record_names_locals() {
        let options = CompilerOptions {
            debug_locals: true,
            ..CompilerOptions::default()
        };
        let (_, code) = compile_with("f: function { local a, b; }", options);
        assert_eq!(names(&code), vec!["CHKARGC", "ENTER", "FRAME", "RETURN"]);
        // outermost frame has no enclosing frame
        assert_eq!(code[2].operands, vec![Operand::Int2(0)]);
        // opcode, length, enclosing frame, then (slot, name length, name) per local
        assert_eq!(code[2].length, 1 + 2 + 2 + 2 * (2 + 1 + 1));
    }
}
