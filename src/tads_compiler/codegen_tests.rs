#[cfg(test)]
mod tests {
    use crate::tads_compiler::codegen::list_image;
    use crate::tads_compiler::compiler::Compiler;
    use crate::tads_compiler::disassembler::{disassemble, Instruction, Operand};
    use crate::tads_compiler::error::CompilerError;
    use crate::tads_compiler::lexer::ListElement;
    use crate::tads_compiler::opcodes::{dat, prop};
    use crate::tads_compiler::symbols::SymbolKind;

    use test_log::test;

    /// Compiler with locals `x` and `p` in scope
    fn compiler_with_locals(source: &str) -> (Compiler, i32, i32) {
        let mut compiler = Compiler::for_source(source);
        compiler.symbols.begin_function();
        compiler.symbols.push_scope();
        let x = compiler.symbols.add_local("x");
        let p = compiler.symbols.add_local("p");
        (compiler, x, p)
    }

    fn generate(compiler: &mut Compiler) -> Vec<Instruction> {
        let node = compiler.parse_folded().unwrap();
        compiler.gen_expression(node).unwrap();
        let code = compiler.emitter.take_code();
        disassemble(&code).unwrap()
    }

    fn names(instructions: &[Instruction]) -> Vec<&str> {
        instructions.iter().map(|i| i.name.as_str()).collect()
    }

    fn object_id(compiler: &Compiler, name: &str) -> u16 {
        let binding = compiler.symbols.lookup(name);
        assert!(binding.kind.is_object(), "{} is not an object", name);
        binding.value as u16
    }

    #[test]
    fn test_constant_object_property() {
        let mut compiler = Compiler::for_source("lamp.sdesc");
        let code = generate(&mut compiler);
        let lamp = object_id(&compiler, "lamp");
        assert_eq!(names(&code), vec!["GETPOBJ"]);
        assert_eq!(
            code[0].operands,
            vec![Operand::Byte(0), Operand::Int2(lamp), Operand::Int2(prop::SDESC)]
        );
    }

    #[test]
    fn test_self_property() {
        let mut compiler = Compiler::for_source("self.sdesc");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["GETPSELF"]);
        assert_eq!(code[0].operands, vec![Operand::Byte(0), Operand::Int2(prop::SDESC)]);
        assert!(compiler.diagnostics.errors.is_empty());
    }

    #[test]
    fn test_self_in_function_is_an_error() {
        let mut compiler = Compiler::for_source("self.sdesc");
        compiler.in_function = true;
        generate(&mut compiler);
        assert_eq!(compiler.diagnostics.errors.len(), 1);
    }

    #[test]
    fn test_inherited_property() {
        let mut compiler = Compiler::for_source("inherited.sdesc");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["INHERIT"]);
        assert_eq!(code[0].operands, vec![Operand::Byte(0), Operand::Int2(prop::SDESC)]);
    }

    #[test]
    fn test_inherited_from_named_superclass() {
        let mut compiler = Compiler::for_source("inherited Room.sdesc(1)");
        let code = generate(&mut compiler);
        let room = object_id(&compiler, "Room");
        assert_eq!(names(&code), vec!["PUSHNUM", "EXPINH"]);
        assert_eq!(
            code[1].operands,
            vec![Operand::Byte(1), Operand::Int2(prop::SDESC), Operand::Int2(room)]
        );
    }

    #[test]
    fn test_property_of_computed_object() {
        let (mut compiler, x, _) = compiler_with_locals("(x).sdesc");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["GETLCL", "GETP"]);
        assert_eq!(code[0].operands, vec![Operand::Slot(x as i16)]);
        assert_eq!(code[1].operands, vec![Operand::Byte(0), Operand::Int2(prop::SDESC)]);
    }

    #[test]
    fn test_property_pointer_forms() {
        let (mut compiler, _, p) = compiler_with_locals("(lamp).p");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["PUSHOBJ", "GETLCL", "PTRGETP"]);
        assert_eq!(code[1].operands, vec![Operand::Slot(p as i16)]);

        let (mut compiler, _, _) = compiler_with_locals("(self).p");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["GETLCL", "GETPPTRSELF"]);
    }

    #[test]
    fn test_method_call_pushes_arguments_last_first() {
        let mut compiler = Compiler::for_source("lamp.sdesc(1, 2)");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["PUSHNUM", "PUSHNUM", "GETPOBJ"]);
        assert_eq!(code[0].operands, vec![Operand::Number(2)]);
        assert_eq!(code[1].operands, vec![Operand::Number(1)]);
        assert_eq!(code[2].operands[0], Operand::Byte(2));
    }

    #[test]
    fn test_empty_argument_list_is_plain_property() {
        let mut compiler = Compiler::for_source("lamp.sdesc()");
        let code = generate(&mut compiler);
        assert_eq!(code[0].operands[0], Operand::Byte(0));
    }

    #[test]
    fn test_function_and_builtin_calls() {
        let mut compiler = Compiler::for_source("helper(1)");
        let code = generate(&mut compiler);
        let helper = compiler.symbols.lookup("helper");
        assert_eq!(helper.kind, SymbolKind::ForwardFunction);
        assert_eq!(names(&code), vec!["PUSHNUM", "CALL"]);
        assert_eq!(
            code[1].operands,
            vec![Operand::Byte(1), Operand::Int2(helper.value as u16)]
        );

        let mut compiler = Compiler::for_source("say('hello')");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["PUSHSTR", "BUILTIN"]);
        assert_eq!(code[1].operands, vec![Operand::Byte(1), Operand::Int2(0)]);
    }

    #[test]
    fn test_call_through_local_pointer() {
        let (mut compiler, _, _) = compiler_with_locals("x()");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["GETLCL", "PTRCALL"]);
        assert_eq!(code[1].operands, vec![Operand::Byte(0)]);
    }

    #[test]
    fn test_local_assignments() {
        let (mut compiler, x, _) = compiler_with_locals("x := 5");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["PUSHNUM", "ASI_LCL"]);
        assert_eq!(code[1].operands, vec![Operand::Slot(x as i16)]);

        let (mut compiler, _, _) = compiler_with_locals("x += 1");
        assert_eq!(names(&generate(&mut compiler)), vec!["PUSHNUM", "ADD_LCL"]);

        let (mut compiler, _, _) = compiler_with_locals("x %= 3");
        assert_eq!(names(&generate(&mut compiler)), vec!["PUSHNUM", "MOD_LCL"]);

        let (mut compiler, _, _) = compiler_with_locals("x++");
        assert_eq!(names(&generate(&mut compiler)), vec!["INC_POST_LCL"]);

        let (mut compiler, _, _) = compiler_with_locals("--x");
        assert_eq!(names(&generate(&mut compiler)), vec!["DEC_LCL"]);
    }

    #[test]
    fn test_property_assignment() {
        let mut compiler = Compiler::for_source("lamp.sdesc := 'brass lamp'");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["PUSHSTR", "PUSHOBJ", "ASI_PRP"]);
        assert_eq!(code[2].operands, vec![Operand::Int2(prop::SDESC)]);
    }

    #[test]
    fn test_indexed_assignment_stores_list_back() {
        let (mut compiler, x, _) = compiler_with_locals("x[2] := 7");
        let code = generate(&mut compiler);
        assert_eq!(
            names(&code),
            vec!["PUSHNUM", "GETLCL", "PUSHNUM", "ASI_IND", "ASI_LCL"]
        );
        assert_eq!(code[4].operands, vec![Operand::Slot(x as i16)]);
    }

    #[test]
    fn test_assignment_to_constant_is_reported() {
        let mut compiler = Compiler::for_source("3 := 4");
        generate(&mut compiler);
        assert_eq!(compiler.diagnostics.errors, vec![CompilerError::InvalidAssignment(1)]);
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let (mut compiler, _, _) = compiler_with_locals("x and p");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["GETLCL", "JSF", "GETLCL"]);
        assert_eq!(code[1].target(), Some(code[2].offset + code[2].length));

        let (mut compiler, _, _) = compiler_with_locals("x or p");
        let code = generate(&mut compiler);
        assert_eq!(code[1].name, "JST");
    }

    #[test]
    fn test_conditional_jumps() {
        let (mut compiler, _, _) = compiler_with_locals("x ? 1 : 2");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["GETLCL", "JF", "PUSHNUM", "JMP", "PUSHNUM"]);
        assert_eq!(code[1].target(), Some(code[4].offset));
        assert_eq!(code[3].target(), Some(code[4].offset + code[4].length));
    }

    #[test]
    fn test_comma_discards_left_value() {
        let (mut compiler, _, _) = compiler_with_locals("x, p");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["GETLCL", "DISCARD", "GETLCL"]);
    }

    #[test]
    fn test_new_object() {
        let mut compiler = Compiler::for_source("new object");
        assert_eq!(names(&generate(&mut compiler)), vec!["PUSHNIL", "NEW"]);
    }

    #[test]
    fn test_constant_list_is_pushed_whole() {
        let mut compiler = Compiler::for_source("[1 'ab' nil]");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["PUSHLST"]);
        let image = list_image(&[
            ListElement::Number(1),
            ListElement::SString("ab".to_string()),
            ListElement::Nil,
        ]);
        assert_eq!(code[0].operands, vec![Operand::List(image)]);
    }

    #[test]
    fn test_list_with_variables_is_built_at_run_time() {
        let (mut compiler, _, _) = compiler_with_locals("[x 1]");
        let code = generate(&mut compiler);
        assert_eq!(names(&code), vec!["PUSHNUM", "GETLCL", "CONS"]);
        assert_eq!(code[2].operands, vec![Operand::Int2(2)]);
    }

    #[test]
    fn test_list_image_layout() {
        let image = list_image(&[
            ListElement::Number(1),
            ListElement::SString("ab".to_string()),
            ListElement::Nil,
        ]);
        assert_eq!(
            image,
            vec![
                13,
                0,
                dat::NUMBER,
                1,
                0,
                0,
                0,
                dat::SSTRING,
                4,
                0,
                b'a',
                b'b',
                dat::NIL
            ]
        );
    }
}
