// Compiler Error Handling

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CompilerError {
    // Lexical errors
    LexicalError(String, usize), // message, line
    UnexpectedCharacter(char, usize),
    UnterminatedString(usize),

    // Syntax errors
    SyntaxError(String, usize),
    ExpectedToken(String, String, usize), // expected, found, line
    UnexpectedEof(usize),

    // Semantic errors
    SemanticError(String, usize),
    InvalidAssignment(usize),

    // Constant-evaluation errors
    DivideByZero(usize),
    InvalidOperand(String, usize),

    // Resource exhaustion (fatal)
    PoolExhausted(usize),  // pool capacity in bytes
    LabelTableFull(usize), // slot count
    JumpOutOfRange(i64),

    // Internal invariant violations (fatal)
    UnresolvedLabel(u16),
    InternalError(String),

    // Driver errors
    ConfigError(String),
    IOError(String),
}

impl CompilerError {
    /// Fatal errors abort the whole compilation unit; everything else is
    /// reported and recovered at statement or declaration granularity.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CompilerError::PoolExhausted(_)
                | CompilerError::LabelTableFull(_)
                | CompilerError::JumpOutOfRange(_)
                | CompilerError::UnresolvedLabel(_)
                | CompilerError::InternalError(_)
                | CompilerError::IOError(_)
        )
    }

    /// Source line the error refers to, when it has one
    pub fn line(&self) -> Option<usize> {
        match self {
            CompilerError::LexicalError(_, line)
            | CompilerError::UnexpectedCharacter(_, line)
            | CompilerError::UnterminatedString(line)
            | CompilerError::SyntaxError(_, line)
            | CompilerError::ExpectedToken(_, _, line)
            | CompilerError::UnexpectedEof(line)
            | CompilerError::SemanticError(_, line)
            | CompilerError::InvalidAssignment(line)
            | CompilerError::DivideByZero(line)
            | CompilerError::InvalidOperand(_, line) => Some(*line),
            _ => None,
        }
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilerError::LexicalError(msg, line) => {
                write!(f, "Lexical error at line {}: {}", line, msg)
            }
            CompilerError::UnexpectedCharacter(ch, line) => {
                write!(f, "Unexpected character '{}' at line {}", ch, line)
            }
            CompilerError::UnterminatedString(line) => {
                write!(f, "Unterminated string starting at line {}", line)
            }
            CompilerError::SyntaxError(msg, line) => {
                write!(f, "Syntax error at line {}: {}", line, msg)
            }
            CompilerError::ExpectedToken(expected, found, line) => {
                write!(
                    f,
                    "Expected '{}' but found '{}' at line {}",
                    expected, found, line
                )
            }
            CompilerError::UnexpectedEof(line) => {
                write!(f, "Unexpected end of file at line {}", line)
            }
            CompilerError::SemanticError(msg, line) => {
                write!(f, "Error at line {}: {}", line, msg)
            }
            CompilerError::InvalidAssignment(line) => {
                write!(f, "Invalid assignment at line {}", line)
            }
            CompilerError::DivideByZero(line) => {
                write!(f, "Divide by zero in constant expression at line {}", line)
            }
            CompilerError::InvalidOperand(msg, line) => {
                write!(f, "Invalid operand type at line {}: {}", line, msg)
            }
            CompilerError::PoolExhausted(capacity) => {
                write!(
                    f,
                    "Expression too complex: parse node pool of {} bytes exhausted",
                    capacity
                )
            }
            CompilerError::LabelTableFull(slots) => {
                write!(f, "Too many labels: all {} label slots in use", slots)
            }
            CompilerError::JumpOutOfRange(distance) => {
                write!(f, "Jump distance {} does not fit in 16 bits", distance)
            }
            CompilerError::UnresolvedLabel(label) => {
                write!(
                    f,
                    "Internal compiler error: label {} released with pending forward references",
                    label
                )
            }
            CompilerError::InternalError(msg) => {
                write!(f, "Internal compiler error: {}", msg)
            }
            CompilerError::ConfigError(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            CompilerError::IOError(msg) => {
                write!(f, "IO error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CompilerError {}

/// Non-fatal diagnostics; compilation continues after each of these
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    AmbiguousListOperator(String, usize), // operator, line
    PossibleIncorrectAssignment(usize),
    EqualsAsStatement(usize),
    UndefinedGotoLabel(String, usize),
    LocationNotObject(String, usize),
    ReplacedSpecialWords(usize),
}

impl Warning {
    pub fn line(&self) -> usize {
        match self {
            Warning::AmbiguousListOperator(_, line)
            | Warning::PossibleIncorrectAssignment(line)
            | Warning::EqualsAsStatement(line)
            | Warning::UndefinedGotoLabel(_, line)
            | Warning::LocationNotObject(_, line)
            | Warning::ReplacedSpecialWords(line) => *line,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::AmbiguousListOperator(op, _) => {
                write!(f, "warning: operator '{}' interpreted as unary in list", op)
            }
            Warning::PossibleIncorrectAssignment(_) => {
                write!(f, "warning: possibly incorrect assignment")
            }
            Warning::EqualsAsStatement(_) => {
                write!(f, "warning: possible use of '=' where ':=' intended")
            }
            Warning::UndefinedGotoLabel(name, _) => {
                write!(f, "warning: 'goto' label '{}' never defined", name)
            }
            Warning::LocationNotObject(name, _) => {
                write!(
                    f,
                    "warning: location of object \"{}\" is not an object",
                    name
                )
            }
            Warning::ReplacedSpecialWords(_) => {
                write!(f, "warning: replacing specialWords (please use 'replace')")
            }
        }
    }
}

/// Collects warnings and recovered errors for one compilation
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    pub warnings: Vec<Warning>,
    pub errors: Vec<CompilerError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, warning: Warning) {
        log::warn!("line {}: {}", warning.line(), warning);
        self.warnings.push(warning);
    }

    pub fn error(&mut self, error: CompilerError) {
        log::error!("{}", error);
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
