// Lexer tests

#[cfg(test)]
mod tests {
    use crate::tads_compiler::error::CompilerError;
    use crate::tads_compiler::lexer::{Lexer, TokenKind, TokenValue};

    fn tokenize_input(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        lexer
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(tokenize_input(""), vec![TokenKind::EOF]);
    }

    #[test]
    fn test_compound_operators() {
        let tokens = tokenize_input(":= == <> != <= >= << >> <<= >>= ++ -- += -> ...");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Assign,
                TokenKind::EqualEqual,
                TokenKind::NotEqual,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::ShiftLeft,
                TokenKind::ShiftRight,
                TokenKind::ShiftLeftAssign,
                TokenKind::ShiftRightAssign,
                TokenKind::Increment,
                TokenKind::Decrement,
                TokenKind::PlusAssign,
                TokenKind::Arrow,
                TokenKind::Ellipsis,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_word_operators() {
        let tokens = tokenize_input("a and b or not c && d || !e");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Symbol,
                TokenKind::And,
                TokenKind::Symbol,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Symbol,
                TokenKind::And,
                TokenKind::Symbol,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Symbol,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize_input("local switch case default compoundWord specialWords doSynonym");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Local,
                TokenKind::Switch,
                TokenKind::Case,
                TokenKind::Default,
                TokenKind::CompoundWord,
                TokenKind::SpecialWords,
                TokenKind::DoSynonym,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive_by_default() {
        assert_eq!(
            tokenize_input("Local"),
            vec![TokenKind::Symbol, TokenKind::EOF]
        );
    }

    #[test]
    fn test_case_insensitive_folding() {
        let mut lexer = Lexer::new("LOCAL Foo compoundword").case_insensitive(true);
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Local);
        assert_eq!(tokens[1].kind, TokenKind::Symbol);
        assert_eq!(tokens[1].text, "foo");
        assert_eq!(tokens[2].kind, TokenKind::CompoundWord);
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("42 0x1F 017 0");
        let tokens = lexer.tokenize().unwrap();
        let values: Vec<i32> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Number)
            .map(|t| t.number())
            .collect();
        assert_eq!(values, vec![42, 31, 15, 0]);
    }

    #[test]
    fn test_number_wraps_to_32_bits() {
        let mut lexer = Lexer::new("0xFFFFFFFF");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0].value, TokenValue::Number(-1));
    }

    #[test]
    fn test_invalid_octal_digit() {
        let mut lexer = Lexer::new("09");
        assert!(matches!(
            lexer.tokenize(),
            Err(CompilerError::LexicalError(_, 1))
        ));
    }

    #[test]
    fn test_strings_keep_escapes() {
        let mut lexer = Lexer::new(r#"'it\'s' "say \"hi\"\n""#);
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::SString);
        assert_eq!(tokens[0].string(), r"it\'s");
        assert_eq!(tokens[1].kind, TokenKind::DString);
        assert_eq!(tokens[1].string(), r#"say \"hi\"\n"#);
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("x = 'abc");
        assert_eq!(lexer.tokenize(), Err(CompilerError::UnterminatedString(1)));
    }

    #[test]
    fn test_comments_and_lines() {
        let mut lexer = Lexer::new("a // comment\n/* block\ncomment */ b");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].text, "b");
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_pragma_tokens() {
        let mut lexer = Lexer::new("#pragma C+\nx\n#pragma C-\n");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Pragma);
        assert_eq!(tokens[0].number(), 1);
        assert_eq!(tokens[1].kind, TokenKind::Symbol);
        assert_eq!(tokens[2].kind, TokenKind::Pragma);
        assert_eq!(tokens[2].number(), 0);
    }

    #[test]
    fn test_other_pragmas_are_skipped() {
        assert_eq!(
            tokenize_input("#pragma once\nx"),
            vec![TokenKind::Symbol, TokenKind::EOF]
        );
    }

    #[test]
    fn test_pound_is_not_pragma() {
        assert_eq!(
            tokenize_input("#sdesc"),
            vec![TokenKind::Pound, TokenKind::Symbol, TokenKind::EOF]
        );
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("a $ b");
        assert_eq!(
            lexer.tokenize(),
            Err(CompilerError::UnexpectedCharacter('$', 1))
        );
    }
}
