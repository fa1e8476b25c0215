// TADS Lexer
// Tokenizes TADS source text into a stream of tokens

use std::collections::HashMap;
use std::fmt;

use crate::tads_compiler::error::CompilerError;
use crate::tads_compiler::symbols::SymbolBinding;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Symbol name, operator spelling, or string contents
    pub text: String,
    pub value: TokenValue,
    /// Resolved when the token becomes current in the parser
    pub symbol: SymbolBinding,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Number,
    SString, // 'single-quoted'
    DString, // "double-quoted"
    Symbol,
    /// A folded list literal; never produced by the lexer
    List,

    // Keywords
    Local,
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    Goto,
    Switch,
    Case,
    Default,
    Return,
    Pass,
    Exit,
    Abort,
    AskDo,
    AskIo,
    Nil,
    True,
    Class,
    Object,
    Function,
    External,
    Replace,
    Modify,
    CompoundWord,
    FormatString,
    SpecialWords,
    DoSynonym,
    IoSynonym,
    New,
    Delete,

    // Punctuation
    LeftBrace,    // {
    RightBrace,   // }
    LeftBracket,  // [
    RightBracket, // ]
    LeftParen,    // (
    RightParen,   // )
    Semicolon,    // ;
    Colon,        // :
    Comma,        // ,
    Dot,          // .
    Question,     // ?
    Pound,        // #
    Arrow,        // ->
    Ellipsis,     // ...
    At,           // @

    // Operators
    Plus,             // +
    Minus,            // -
    Star,             // *
    Slash,            // /
    Percent,          // %
    Ampersand,        // &
    Pipe,             // |
    Caret,            // ^
    Tilde,            // ~
    Not,              // ! not
    And,              // && and
    Or,               // || or
    Equal,            // =
    EqualEqual,       // ==
    NotEqual,         // <> !=
    Less,             // <
    LessEqual,        // <=
    Greater,          // >
    GreaterEqual,     // >=
    ShiftLeft,        // <<
    ShiftRight,       // >>
    Assign,           // :=
    PlusAssign,       // +=
    MinusAssign,      // -=
    StarAssign,       // *=
    SlashAssign,      // /=
    PercentAssign,    // %=
    AmpersandAssign,  // &=
    PipeAssign,       // |=
    CaretAssign,      // ^=
    ShiftLeftAssign,  // <<=
    ShiftRightAssign, // >>=
    Increment,        // ++
    Decrement,        // --

    /// `#pragma C+` / `#pragma C-`; value is 1 or 0
    Pragma,
    EOF,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            TokenKind::Number => "number",
            TokenKind::SString => "single-quoted string",
            TokenKind::DString => "double-quoted string",
            TokenKind::Symbol => "symbol",
            TokenKind::List => "list",
            TokenKind::Local => "local",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Goto => "goto",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Return => "return",
            TokenKind::Pass => "pass",
            TokenKind::Exit => "exit",
            TokenKind::Abort => "abort",
            TokenKind::AskDo => "askdo",
            TokenKind::AskIo => "askio",
            TokenKind::Nil => "nil",
            TokenKind::True => "true",
            TokenKind::Class => "class",
            TokenKind::Object => "object",
            TokenKind::Function => "function",
            TokenKind::External => "external",
            TokenKind::Replace => "replace",
            TokenKind::Modify => "modify",
            TokenKind::CompoundWord => "compoundWord",
            TokenKind::FormatString => "formatstring",
            TokenKind::SpecialWords => "specialWords",
            TokenKind::DoSynonym => "doSynonym",
            TokenKind::IoSynonym => "ioSynonym",
            TokenKind::New => "new",
            TokenKind::Delete => "delete",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Question => "?",
            TokenKind::Pound => "#",
            TokenKind::Arrow => "->",
            TokenKind::Ellipsis => "...",
            TokenKind::At => "@",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Ampersand => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Not => "not",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::NotEqual => "<>",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::ShiftLeft => "<<",
            TokenKind::ShiftRight => ">>",
            TokenKind::Assign => ":=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::AmpersandAssign => "&=",
            TokenKind::PipeAssign => "|=",
            TokenKind::CaretAssign => "^=",
            TokenKind::ShiftLeftAssign => "<<=",
            TokenKind::ShiftRightAssign => ">>=",
            TokenKind::Increment => "++",
            TokenKind::Decrement => "--",
            TokenKind::Pragma => "#pragma",
            TokenKind::EOF => "end of file",
        };
        write!(f, "{}", text)
    }
}

/// Literal payload carried by a token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Number(i32),
    Text(String),
    /// Folded list literal, elements in source order
    List(Vec<ListElement>),
    /// `#prop` property-number literal
    Property(u16),
}

/// One element of a folded list literal
#[derive(Debug, Clone, PartialEq)]
pub enum ListElement {
    Number(i32),
    SString(String),
    List(Vec<ListElement>),
    Object(u16),
    Function(u16),
    Property(u16),
    Nil,
    True,
}

impl Token {
    pub fn new(kind: TokenKind, text: &str, line: usize, column: usize) -> Self {
        Token {
            kind,
            text: text.to_string(),
            value: TokenValue::None,
            symbol: SymbolBinding::default(),
            line,
            column,
        }
    }

    /// A synthesized token that did not come from source text
    pub fn synthetic(kind: TokenKind, value: TokenValue, line: usize) -> Self {
        Token {
            kind,
            text: String::new(),
            value,
            symbol: SymbolBinding::default(),
            line,
            column: 0,
        }
    }

    pub fn number(&self) -> i32 {
        match self.value {
            TokenValue::Number(n) => n,
            _ => 0,
        }
    }

    pub fn string(&self) -> &str {
        match &self.value {
            TokenValue::Text(s) => s,
            _ => "",
        }
    }

    pub fn property(&self) -> u16 {
        match self.value {
            TokenValue::Property(p) => p,
            _ => 0,
        }
    }
}

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = {
        let mut m = HashMap::new();
        m.insert("and", TokenKind::And);
        m.insert("or", TokenKind::Or);
        m.insert("not", TokenKind::Not);
        m.insert("local", TokenKind::Local);
        m.insert("if", TokenKind::If);
        m.insert("else", TokenKind::Else);
        m.insert("while", TokenKind::While);
        m.insert("do", TokenKind::Do);
        m.insert("for", TokenKind::For);
        m.insert("break", TokenKind::Break);
        m.insert("continue", TokenKind::Continue);
        m.insert("goto", TokenKind::Goto);
        m.insert("switch", TokenKind::Switch);
        m.insert("case", TokenKind::Case);
        m.insert("default", TokenKind::Default);
        m.insert("return", TokenKind::Return);
        m.insert("pass", TokenKind::Pass);
        m.insert("exit", TokenKind::Exit);
        m.insert("abort", TokenKind::Abort);
        m.insert("askdo", TokenKind::AskDo);
        m.insert("askio", TokenKind::AskIo);
        m.insert("nil", TokenKind::Nil);
        m.insert("true", TokenKind::True);
        m.insert("class", TokenKind::Class);
        m.insert("object", TokenKind::Object);
        m.insert("function", TokenKind::Function);
        m.insert("external", TokenKind::External);
        m.insert("replace", TokenKind::Replace);
        m.insert("modify", TokenKind::Modify);
        m.insert("compoundWord", TokenKind::CompoundWord);
        m.insert("formatstring", TokenKind::FormatString);
        m.insert("specialWords", TokenKind::SpecialWords);
        m.insert("doSynonym", TokenKind::DoSynonym);
        m.insert("ioSynonym", TokenKind::IoSynonym);
        m.insert("new", TokenKind::New);
        m.insert("delete", TokenKind::Delete);
        m
    };
    static ref FOLDED_KEYWORDS: HashMap<String, TokenKind> = KEYWORDS
        .iter()
        .map(|(name, kind)| (name.to_lowercase(), *kind))
        .collect();
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    current_char: Option<char>,
    fold_case: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Lexer {
            input: chars,
            position: 0,
            line: 1,
            column: 1,
            current_char,
            fold_case: false,
        }
    }

    /// Fold identifiers and keywords to lower case
    pub fn case_insensitive(mut self, fold: bool) -> Self {
        self.fold_case = fold;
        self
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompilerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::EOF;
            tokens.push(token);
            if done {
                break;
            }
        }

        log::debug!("tokenized {} tokens over {} lines", tokens.len(), self.line);
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, CompilerError> {
        self.skip_whitespace_and_comments()?;

        let start_line = self.line;
        let start_column = self.column;

        let ch = match self.current_char {
            None => return Ok(Token::new(TokenKind::EOF, "", start_line, start_column)),
            Some(ch) => ch,
        };

        if ch == '#' && self.lookahead_is("#pragma") {
            return self.read_pragma(start_line, start_column);
        }

        let token = match ch {
            '\'' => {
                self.advance();
                let text = self.read_string('\'', start_line)?;
                let mut token = Token::new(TokenKind::SString, &text, start_line, start_column);
                token.value = TokenValue::Text(text);
                token
            }
            '"' => {
                self.advance();
                let text = self.read_string('"', start_line)?;
                let mut token = Token::new(TokenKind::DString, &text, start_line, start_column);
                token.value = TokenValue::Text(text);
                token
            }
            ch if ch.is_ascii_digit() => {
                let (text, value) = self.read_number()?;
                let mut token = Token::new(TokenKind::Number, &text, start_line, start_column);
                token.value = TokenValue::Number(value);
                token
            }
            ch if ch.is_alphabetic() || ch == '_' => {
                let identifier = self.read_identifier();
                self.keyword_or_symbol(identifier, start_line, start_column)
            }
            _ => {
                let kind = self.read_operator(start_line)?;
                Token::new(kind, &kind.to_string(), start_line, start_column)
            }
        };

        Ok(token)
    }

    fn read_operator(&mut self, line: usize) -> Result<TokenKind, CompilerError> {
        let ch = match self.current_char {
            Some(ch) => ch,
            None => return Ok(TokenKind::EOF),
        };
        self.advance();

        let kind = match ch {
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '?' => TokenKind::Question,
            '#' => TokenKind::Pound,
            '@' => TokenKind::At,
            '~' => TokenKind::Tilde,
            ':' => {
                if self.eat('=') {
                    TokenKind::Assign
                } else {
                    TokenKind::Colon
                }
            }
            '.' => {
                if self.current_char == Some('.') && self.peek_char(1) == Some('.') {
                    self.advance();
                    self.advance();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LessEqual
                } else if self.eat('>') {
                    TokenKind::NotEqual
                } else if self.eat('<') {
                    if self.eat('=') {
                        TokenKind::ShiftLeftAssign
                    } else {
                        TokenKind::ShiftLeft
                    }
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GreaterEqual
                } else if self.eat('>') {
                    if self.eat('=') {
                        TokenKind::ShiftRightAssign
                    } else {
                        TokenKind::ShiftRight
                    }
                } else {
                    TokenKind::Greater
                }
            }
            '&' => {
                if self.eat('&') {
                    TokenKind::And
                } else if self.eat('=') {
                    TokenKind::AmpersandAssign
                } else {
                    TokenKind::Ampersand
                }
            }
            '|' => {
                if self.eat('|') {
                    TokenKind::Or
                } else if self.eat('=') {
                    TokenKind::PipeAssign
                } else {
                    TokenKind::Pipe
                }
            }
            '^' => {
                if self.eat('=') {
                    TokenKind::CaretAssign
                } else {
                    TokenKind::Caret
                }
            }
            '+' => {
                if self.eat('+') {
                    TokenKind::Increment
                } else if self.eat('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    TokenKind::Decrement
                } else if self.eat('=') {
                    TokenKind::MinusAssign
                } else if self.eat('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.eat('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            ch => return Err(CompilerError::UnexpectedCharacter(ch, line)),
        };
        Ok(kind)
    }

    fn advance(&mut self) {
        if let Some('\n') = self.current_char {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.current_char == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn lookahead_is(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, ch)| self.peek_char(i) == Some(ch))
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), CompilerError> {
        loop {
            match self.current_char {
                Some(ch) if ch.is_whitespace() => self.advance(),
                Some('/') if self.peek_char(1) == Some('/') => {
                    while let Some(ch) = self.current_char {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_char(1) == Some('*') => {
                    let start_line = self.line;
                    self.advance();
                    self.advance();
                    loop {
                        match self.current_char {
                            None => {
                                return Err(CompilerError::LexicalError(
                                    "unterminated comment".to_string(),
                                    start_line,
                                ))
                            }
                            Some('*') if self.peek_char(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => self.advance(),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Reads string contents up to the closing quote. Backslash sequences
    /// are kept verbatim for the run-time formatter; an escaped quote does
    /// not terminate the string.
    fn read_string(&mut self, quote: char, start_line: usize) -> Result<String, CompilerError> {
        let mut value = String::new();

        while let Some(ch) = self.current_char {
            if ch == quote {
                self.advance();
                return Ok(value);
            }
            if ch == '\\' {
                value.push(ch);
                self.advance();
                match self.current_char {
                    Some(next) => {
                        value.push(next);
                        self.advance();
                    }
                    None => return Err(CompilerError::UnterminatedString(start_line)),
                }
                continue;
            }
            value.push(ch);
            self.advance();
        }

        Err(CompilerError::UnterminatedString(start_line))
    }

    /// Decimal, `0x` hex, or leading-zero octal; 32-bit wraparound
    fn read_number(&mut self) -> Result<(String, i32), CompilerError> {
        let mut text = String::new();
        let radix = if self.current_char == Some('0')
            && matches!(self.peek_char(1), Some('x') | Some('X'))
        {
            text.push('0');
            self.advance();
            if let Some(x) = self.current_char {
                text.push(x);
            }
            self.advance();
            16
        } else if self.current_char == Some('0') {
            8
        } else {
            10
        };

        let mut value: u32 = 0;
        let mut digits = 0;
        while let Some(ch) = self.current_char {
            let digit = match ch.to_digit(radix) {
                Some(d) => d,
                None if ch.is_ascii_alphanumeric() => {
                    return Err(CompilerError::LexicalError(
                        format!("invalid digit '{}' in number", ch),
                        self.line,
                    ))
                }
                None => break,
            };
            value = value.wrapping_mul(radix).wrapping_add(digit);
            text.push(ch);
            digits += 1;
            self.advance();
        }

        if digits == 0 {
            return Err(CompilerError::LexicalError(
                "hex number has no digits".to_string(),
                self.line,
            ));
        }
        Ok((text, value as i32))
    }

    fn read_identifier(&mut self) -> String {
        let mut value = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        value
    }

    fn read_pragma(&mut self, line: usize, column: usize) -> Result<Token, CompilerError> {
        let mut text = String::new();
        while let Some(ch) = self.current_char {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.advance();
        }

        let setting = text["#pragma".len()..].trim();
        let value = match setting {
            "C+" | "c+" => 1,
            "C-" | "c-" => 0,
            other => {
                log::debug!("line {}: ignoring pragma '{}'", line, other);
                return self.next_token();
            }
        };

        let mut token = Token::new(TokenKind::Pragma, text.trim(), line, column);
        token.value = TokenValue::Number(value);
        Ok(token)
    }

    fn keyword_or_symbol(&self, identifier: String, line: usize, column: usize) -> Token {
        let keyword = if self.fold_case {
            FOLDED_KEYWORDS.get(&identifier.to_lowercase()).copied()
        } else {
            KEYWORDS.get(identifier.as_str()).copied()
        };

        match keyword {
            Some(kind) => Token::new(kind, &identifier, line, column),
            None => {
                let name = if self.fold_case {
                    identifier.to_lowercase()
                } else {
                    identifier
                };
                Token::new(TokenKind::Symbol, &name, line, column)
            }
        }
    }
}

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod tests;
