// Operator precedence chains
//
// Each binary level names its operators, how to parse its operands and
// whether it repeats (left-associative) or applies once. Levels link to the
// next tighter level through their operand descriptors, so the whole
// grammar is a static chain walked by `Compiler::parse_level`. C operator
// mode differs only in which tokens compare and which assign; it gets its
// own copies of the levels from the comparison level outward.

use crate::tads_compiler::arena::Op;
use crate::tads_compiler::lexer::TokenKind;

/// How one side of a binary level is parsed
#[derive(Debug, Clone, Copy)]
pub enum Operand {
    Level(&'static PrecedenceLevel),
    /// `cond ? a : b` built over the given level
    Conditional(&'static PrecedenceLevel),
    /// Prefix operators, atoms and postfix forms
    Unary,
}

#[derive(Debug)]
pub struct PrecedenceLevel {
    pub name: &'static str,
    pub operators: &'static [(TokenKind, Op)],
    pub left: Operand,
    pub right: Operand,
    /// Keep applying operators left to right
    pub repeat: bool,
}

impl PrecedenceLevel {
    pub fn operator(&self, kind: TokenKind) -> Option<Op> {
        self.operators
            .iter()
            .find(|(token, _)| *token == kind)
            .map(|(_, op)| *op)
    }
}

/// The loosest level and the assignment level of one operator mode
#[derive(Debug, Clone, Copy)]
pub struct PrecedenceChain {
    pub comma: &'static PrecedenceLevel,
    pub assignment: &'static PrecedenceLevel,
}

const ASSIGNMENT_OPS: [(TokenKind, Op); 11] = [
    (TokenKind::Assign, Op::Assign),
    (TokenKind::PlusAssign, Op::AddAssign),
    (TokenKind::MinusAssign, Op::SubAssign),
    (TokenKind::SlashAssign, Op::DivAssign),
    (TokenKind::StarAssign, Op::MulAssign),
    (TokenKind::PercentAssign, Op::ModAssign),
    (TokenKind::AmpersandAssign, Op::AndAssign),
    (TokenKind::PipeAssign, Op::OrAssign),
    (TokenKind::CaretAssign, Op::XorAssign),
    (TokenKind::ShiftLeftAssign, Op::ShlAssign),
    (TokenKind::ShiftRightAssign, Op::ShrAssign),
];

const C_ASSIGNMENT_OPS: [(TokenKind, Op); 11] = [
    (TokenKind::Equal, Op::Assign),
    (TokenKind::PlusAssign, Op::AddAssign),
    (TokenKind::MinusAssign, Op::SubAssign),
    (TokenKind::SlashAssign, Op::DivAssign),
    (TokenKind::StarAssign, Op::MulAssign),
    (TokenKind::PercentAssign, Op::ModAssign),
    (TokenKind::AmpersandAssign, Op::AndAssign),
    (TokenKind::PipeAssign, Op::OrAssign),
    (TokenKind::CaretAssign, Op::XorAssign),
    (TokenKind::ShiftLeftAssign, Op::ShlAssign),
    (TokenKind::ShiftRightAssign, Op::ShrAssign),
];

// Levels shared by both modes, tightest first

static FACTOR: PrecedenceLevel = PrecedenceLevel {
    name: "factor",
    operators: &[
        (TokenKind::Star, Op::Mul),
        (TokenKind::Slash, Op::Div),
        (TokenKind::Percent, Op::Mod),
    ],
    left: Operand::Unary,
    right: Operand::Unary,
    repeat: true,
};

static TERM: PrecedenceLevel = PrecedenceLevel {
    name: "term",
    operators: &[(TokenKind::Plus, Op::Add), (TokenKind::Minus, Op::Sub)],
    left: Operand::Level(&FACTOR),
    right: Operand::Level(&FACTOR),
    repeat: true,
};

static SHIFT: PrecedenceLevel = PrecedenceLevel {
    name: "shift",
    operators: &[
        (TokenKind::ShiftLeft, Op::Shl),
        (TokenKind::ShiftRight, Op::Shr),
    ],
    left: Operand::Level(&TERM),
    right: Operand::Level(&TERM),
    repeat: true,
};

static RELATIONAL: PrecedenceLevel = PrecedenceLevel {
    name: "relational",
    operators: &[
        (TokenKind::Greater, Op::Gt),
        (TokenKind::GreaterEqual, Op::Ge),
        (TokenKind::Less, Op::Lt),
        (TokenKind::LessEqual, Op::Le),
    ],
    left: Operand::Level(&SHIFT),
    right: Operand::Level(&SHIFT),
    repeat: false,
};

// Normal mode: `=` compares, `:=` assigns

static COMPARE: PrecedenceLevel = PrecedenceLevel {
    name: "compare",
    operators: &[(TokenKind::Equal, Op::Eq), (TokenKind::NotEqual, Op::Ne)],
    left: Operand::Level(&RELATIONAL),
    right: Operand::Level(&RELATIONAL),
    repeat: false,
};

static BIT_OR: PrecedenceLevel = PrecedenceLevel {
    name: "bitor",
    operators: &[(TokenKind::Pipe, Op::BitOr)],
    left: Operand::Level(&COMPARE),
    right: Operand::Level(&COMPARE),
    repeat: true,
};

static BIT_XOR: PrecedenceLevel = PrecedenceLevel {
    name: "bitxor",
    operators: &[(TokenKind::Caret, Op::BitXor)],
    left: Operand::Level(&BIT_OR),
    right: Operand::Level(&BIT_OR),
    repeat: true,
};

static BIT_AND: PrecedenceLevel = PrecedenceLevel {
    name: "bitand",
    operators: &[(TokenKind::Ampersand, Op::BitAnd)],
    left: Operand::Level(&BIT_XOR),
    right: Operand::Level(&BIT_XOR),
    repeat: true,
};

static AND: PrecedenceLevel = PrecedenceLevel {
    name: "and",
    operators: &[(TokenKind::And, Op::LogicalAnd)],
    left: Operand::Level(&BIT_AND),
    right: Operand::Level(&BIT_AND),
    repeat: true,
};

static OR: PrecedenceLevel = PrecedenceLevel {
    name: "or",
    operators: &[(TokenKind::Or, Op::LogicalOr)],
    left: Operand::Level(&AND),
    right: Operand::Level(&AND),
    repeat: true,
};

static ASSIGNMENT: PrecedenceLevel = PrecedenceLevel {
    name: "assignment",
    operators: &ASSIGNMENT_OPS,
    left: Operand::Conditional(&OR),
    right: Operand::Level(&ASSIGNMENT),
    repeat: false,
};

static COMMA: PrecedenceLevel = PrecedenceLevel {
    name: "comma",
    operators: &[(TokenKind::Comma, Op::Comma)],
    left: Operand::Level(&ASSIGNMENT),
    right: Operand::Level(&ASSIGNMENT),
    repeat: true,
};

// C mode: `==` compares, `=` assigns

static C_COMPARE: PrecedenceLevel = PrecedenceLevel {
    name: "compare",
    operators: &[
        (TokenKind::EqualEqual, Op::Eq),
        (TokenKind::NotEqual, Op::Ne),
    ],
    left: Operand::Level(&RELATIONAL),
    right: Operand::Level(&RELATIONAL),
    repeat: false,
};

static C_BIT_OR: PrecedenceLevel = PrecedenceLevel {
    name: "bitor",
    operators: &[(TokenKind::Pipe, Op::BitOr)],
    left: Operand::Level(&C_COMPARE),
    right: Operand::Level(&C_COMPARE),
    repeat: true,
};

static C_BIT_XOR: PrecedenceLevel = PrecedenceLevel {
    name: "bitxor",
    operators: &[(TokenKind::Caret, Op::BitXor)],
    left: Operand::Level(&C_BIT_OR),
    right: Operand::Level(&C_BIT_OR),
    repeat: true,
};

static C_BIT_AND: PrecedenceLevel = PrecedenceLevel {
    name: "bitand",
    operators: &[(TokenKind::Ampersand, Op::BitAnd)],
    left: Operand::Level(&C_BIT_XOR),
    right: Operand::Level(&C_BIT_XOR),
    repeat: true,
};

static C_AND: PrecedenceLevel = PrecedenceLevel {
    name: "and",
    operators: &[(TokenKind::And, Op::LogicalAnd)],
    left: Operand::Level(&C_BIT_AND),
    right: Operand::Level(&C_BIT_AND),
    repeat: true,
};

static C_OR: PrecedenceLevel = PrecedenceLevel {
    name: "or",
    operators: &[(TokenKind::Or, Op::LogicalOr)],
    left: Operand::Level(&C_AND),
    right: Operand::Level(&C_AND),
    repeat: true,
};

static C_ASSIGNMENT: PrecedenceLevel = PrecedenceLevel {
    name: "assignment",
    operators: &C_ASSIGNMENT_OPS,
    left: Operand::Conditional(&C_OR),
    right: Operand::Level(&C_ASSIGNMENT),
    repeat: false,
};

static C_COMMA: PrecedenceLevel = PrecedenceLevel {
    name: "comma",
    operators: &[(TokenKind::Comma, Op::Comma)],
    left: Operand::Level(&C_ASSIGNMENT),
    right: Operand::Level(&C_ASSIGNMENT),
    repeat: true,
};

pub static NORMAL_CHAIN: PrecedenceChain = PrecedenceChain {
    comma: &COMMA,
    assignment: &ASSIGNMENT,
};

pub static C_CHAIN: PrecedenceChain = PrecedenceChain {
    comma: &C_COMMA,
    assignment: &C_ASSIGNMENT,
};

pub fn chain(c_mode: bool) -> &'static PrecedenceChain {
    if c_mode {
        &C_CHAIN
    } else {
        &NORMAL_CHAIN
    }
}
