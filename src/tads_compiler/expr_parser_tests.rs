#[cfg(test)]
mod tests {
    use crate::tads_compiler::arena::{Node, NodeRef, Op};
    use crate::tads_compiler::compiler::Compiler;
    use crate::tads_compiler::config::CompilerOptions;
    use crate::tads_compiler::error::{CompilerError, Warning};
    use crate::tads_compiler::lexer::{ListElement, TokenKind, TokenValue};

    use test_log::test;

    fn parse(source: &str) -> (Compiler, NodeRef) {
        let mut compiler = Compiler::for_source(source);
        let node = compiler.parse_expression(false).unwrap();
        (compiler, node)
    }

    fn parse_c(source: &str) -> (Compiler, NodeRef) {
        let options = CompilerOptions {
            c_mode: true,
            ..CompilerOptions::default()
        };
        let mut compiler = Compiler::for_source_with(source, options);
        let node = compiler.parse_expression(false).unwrap();
        (compiler, node)
    }

    fn binary(compiler: &Compiler, node: NodeRef) -> (Op, NodeRef, NodeRef) {
        match compiler.arena.get(node) {
            Node::Binary { op, left, right } => (*op, *left, *right),
            other => panic!("expected binary node, got {:?}", other),
        }
    }

    fn number(compiler: &Compiler, node: NodeRef) -> i32 {
        match compiler.arena.token(node) {
            Some(token) if token.kind == TokenKind::Number => token.number(),
            other => panic!("expected number leaf, got {:?}", other),
        }
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        let (compiler, node) = parse("1 + 2 * 3");
        let (op, left, right) = binary(&compiler, node);
        assert_eq!(op, Op::Add);
        assert_eq!(number(&compiler, left), 1);

        let (op, left, right) = binary(&compiler, right);
        assert_eq!(op, Op::Mul);
        assert_eq!(number(&compiler, left), 2);
        assert_eq!(number(&compiler, right), 3);
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let (compiler, node) = parse("10 - 4 - 3");
        let (op, left, right) = binary(&compiler, node);
        assert_eq!(op, Op::Sub);
        assert_eq!(number(&compiler, right), 3);
        let (op, _, _) = binary(&compiler, left);
        assert_eq!(op, Op::Sub);
    }

    #[test]
    fn test_equals_compares_in_normal_mode() {
        let (compiler, node) = parse("a = b");
        assert_eq!(compiler.arena.get(node).op(), Some(Op::Eq));

        let (compiler, node) = parse("a := b");
        assert_eq!(compiler.arena.get(node).op(), Some(Op::Assign));
    }

    #[test]
    fn test_equals_assigns_in_c_mode() {
        let (compiler, node) = parse_c("a = b");
        assert_eq!(compiler.arena.get(node).op(), Some(Op::Assign));

        let (compiler, node) = parse_c("a == b");
        assert_eq!(compiler.arena.get(node).op(), Some(Op::Eq));
    }

    #[test]
    fn test_pragma_switches_operator_mode() {
        let mut compiler = Compiler::for_source("#pragma C+\na = b");
        let node = compiler.parse_expression(false).unwrap();
        assert!(compiler.c_mode);
        assert_eq!(compiler.arena.get(node).op(), Some(Op::Assign));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let (compiler, node) = parse("x := y := 3");
        let (op, _, right) = binary(&compiler, node);
        assert_eq!(op, Op::Assign);
        let (op, _, right) = binary(&compiler, right);
        assert_eq!(op, Op::Assign);
        assert_eq!(number(&compiler, right), 3);
    }

    #[test]
    fn test_relational_operators_do_not_chain() {
        let (compiler, node) = parse("a < b < c");
        assert_eq!(compiler.arena.get(node).op(), Some(Op::Lt));
        assert_eq!(compiler.kind(), TokenKind::Less);
    }

    #[test]
    fn test_conditional_expression() {
        let (compiler, node) = parse("a ? 1 : 2");
        match compiler.arena.get(node) {
            Node::Ternary {
                op: Op::Conditional,
                second,
                third,
                ..
            } => {
                assert_eq!(number(&compiler, *second), 1);
                assert_eq!(number(&compiler, *third), 2);
            }
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_comma_operator() {
        let (compiler, node) = parse("a, b, c");
        let (op, left, _) = binary(&compiler, node);
        assert_eq!(op, Op::Comma);
        assert_eq!(compiler.arena.get(left).op(), Some(Op::Comma));
    }

    #[test]
    fn test_dot_forms() {
        let (compiler, node) = parse("obj.prop");
        assert!(matches!(compiler.arena.get(node), Node::Binary { op: Op::Dot, .. }));

        // empty argument list is the plain property form
        let (compiler, node) = parse("obj.prop()");
        assert!(matches!(compiler.arena.get(node), Node::Binary { op: Op::Dot, .. }));

        let (compiler, node) = parse("obj.prop(1, 2)");
        match compiler.arena.get(node) {
            Node::Ternary {
                op: Op::Dot, third, ..
            } => {
                let (op, _, _) = binary(&compiler, *third);
                assert_eq!(op, Op::ArgList);
            }
            other => panic!("expected dot with arguments, got {:?}", other),
        }
    }

    #[test]
    fn test_property_name_becomes_property_literal() {
        let (compiler, node) = parse("obj.sdesc");
        let (_, _, right) = binary(&compiler, node);
        let token = compiler.arena.token(right).unwrap();
        assert_eq!(token.kind, TokenKind::Pound);
        assert_eq!(token.value, TokenValue::Property(8));
    }

    #[test]
    fn test_postfix_and_prefix_increment() {
        let (compiler, node) = parse("x++");
        assert_eq!(compiler.arena.get(node).op(), Some(Op::PostInc));

        let (compiler, node) = parse("--x");
        assert_eq!(compiler.arena.get(node).op(), Some(Op::PreDec));
    }

    #[test]
    fn test_new_object_is_a_leaf() {
        let (compiler, node) = parse("new object");
        let token = compiler.arena.token(node).unwrap();
        assert_eq!(token.kind, TokenKind::New);

        let (compiler, node) = parse("new thing");
        assert_eq!(compiler.arena.get(node).op(), Some(Op::New));
    }

    #[test]
    fn test_inherited_with_superclass() {
        let (compiler, node) = parse("inherited Room.ldesc");
        let (op, left, _) = binary(&compiler, node);
        assert_eq!(op, Op::Dot);
        assert_eq!(compiler.arena.get(left).op(), Some(Op::ExplicitInherit));
    }

    #[test]
    fn test_folded_list_keeps_source_order() {
        let mut compiler = Compiler::for_source("[1 'two' 3]");
        let node = compiler.parse_folded().unwrap();
        let token = compiler.arena.token(node).unwrap();
        assert_eq!(token.kind, TokenKind::List);
        assert_eq!(
            token.value,
            TokenValue::List(vec![
                ListElement::Number(1),
                ListElement::SString("two".to_string()),
                ListElement::Number(3),
            ])
        );
    }

    #[test]
    fn test_minus_in_list_starts_a_new_element() {
        let mut compiler = Compiler::for_source("[1 -2]");
        let node = compiler.parse_folded().unwrap();
        let token = compiler.arena.token(node).unwrap();
        assert_eq!(
            token.value,
            TokenValue::List(vec![ListElement::Number(1), ListElement::Number(-2)])
        );
        assert_eq!(
            compiler.diagnostics.warnings,
            vec![Warning::AmbiguousListOperator("-".to_string(), 1)]
        );
    }

    #[test]
    fn test_arguments_inside_list_are_not_list_elements() {
        let mut compiler = Compiler::for_source("[f(1 - 2)]");
        compiler.parse_folded().unwrap();
        assert!(compiler.diagnostics.warnings.is_empty());
    }

    #[test]
    fn test_missing_operand() {
        let mut compiler = Compiler::for_source("1 + ;");
        let error = compiler.parse_expression(false).unwrap_err();
        assert!(matches!(error, CompilerError::ExpectedToken(_, _, 1)));
    }

    #[test]
    fn test_tiny_pool_is_exhausted() {
        let options = CompilerOptions {
            node_pool_size: 16,
            ..CompilerOptions::default()
        };
        let mut compiler = Compiler::for_source_with("1 + 2", options);
        let error = compiler.parse_expression(false).unwrap_err();
        assert_eq!(error, CompilerError::PoolExhausted(16));
        assert!(error.is_fatal());
    }
}
