// Parse node arena
//
// Nodes live in one Vec and are addressed by NodeRef handles. The arena
// charges every node (and any string or list payload it carries) against a
// fixed byte capacity so runaway expressions fail with PoolExhausted rather
// than growing without bound. mark()/reset() discard everything built after
// the mark in O(1) amortized time.

use crate::tads_compiler::error::CompilerError;
use crate::tads_compiler::lexer::{ListElement, Token, TokenValue};

const ALIGN: usize = 8;

/// Handle to a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(u32);

impl NodeRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interior node operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Comma,

    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,

    Conditional,
    LogicalOr,
    LogicalAnd,
    BitAnd,
    BitXor,
    BitOr,

    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    UnaryPlus,
    Negate,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    New,
    Delete,

    /// `obj.prop` or `obj.prop(args)`
    Dot,
    /// `list[index]`
    Index,
    /// `fn(args)`; unary form has no arguments
    Call,
    /// Argument chain: (argument, rest)
    ArgList,
    /// List literal element: (element, previous elements)
    ListCons,
    /// `inherited Superclass`
    ExplicitInherit,
    /// `local x := init`: (initializer, local, line, next)
    LocalInit,
}

impl Op {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Op::Assign
                | Op::AddAssign
                | Op::SubAssign
                | Op::MulAssign
                | Op::DivAssign
                | Op::ModAssign
                | Op::AndAssign
                | Op::OrAssign
                | Op::XorAssign
                | Op::ShlAssign
                | Op::ShrAssign
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(Token),
    Unary {
        op: Op,
        operand: NodeRef,
    },
    Binary {
        op: Op,
        left: NodeRef,
        right: NodeRef,
    },
    Ternary {
        op: Op,
        first: NodeRef,
        second: NodeRef,
        third: NodeRef,
    },
    NAry {
        op: Op,
        children: [NodeRef; 4],
    },
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn op(&self) -> Option<Op> {
        match self {
            Node::Leaf(_) => None,
            Node::Unary { op, .. }
            | Node::Binary { op, .. }
            | Node::Ternary { op, .. }
            | Node::NAry { op, .. } => Some(*op),
        }
    }
}

/// Saved arena position for bulk rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaMark {
    nodes: usize,
    used: usize,
}

pub struct NodeArena {
    nodes: Vec<Node>,
    used: usize,
    capacity: usize,
}

fn round_up(size: usize) -> usize {
    (size + ALIGN - 1) & !(ALIGN - 1)
}

fn list_payload(elements: &[ListElement]) -> usize {
    elements
        .iter()
        .map(|element| match element {
            ListElement::Number(_) => 5,
            ListElement::SString(s) => 3 + s.len(),
            ListElement::List(inner) => 3 + list_payload(inner),
            ListElement::Object(_) | ListElement::Function(_) | ListElement::Property(_) => 3,
            ListElement::Nil | ListElement::True => 1,
        })
        .sum()
}

fn charge(node: &Node) -> usize {
    let base = round_up(std::mem::size_of::<Node>());
    let payload = match node {
        Node::Leaf(token) => match &token.value {
            TokenValue::Text(s) => s.len(),
            TokenValue::List(elements) => list_payload(elements),
            _ => 0,
        },
        _ => 0,
    };
    base + round_up(payload)
}

impl NodeArena {
    pub fn new(capacity: usize) -> Self {
        NodeArena {
            nodes: Vec::new(),
            used: 0,
            capacity,
        }
    }

    pub fn alloc(&mut self, node: Node) -> Result<NodeRef, CompilerError> {
        let size = charge(&node);
        if self.used + size > self.capacity {
            return Err(CompilerError::PoolExhausted(self.capacity));
        }
        self.used += size;
        self.nodes.push(node);
        Ok(NodeRef((self.nodes.len() - 1) as u32))
    }

    pub fn leaf(&mut self, token: Token) -> Result<NodeRef, CompilerError> {
        self.alloc(Node::Leaf(token))
    }

    pub fn unary(&mut self, op: Op, operand: NodeRef) -> Result<NodeRef, CompilerError> {
        self.alloc(Node::Unary { op, operand })
    }

    pub fn binary(&mut self, op: Op, left: NodeRef, right: NodeRef) -> Result<NodeRef, CompilerError> {
        self.alloc(Node::Binary { op, left, right })
    }

    pub fn ternary(
        &mut self,
        op: Op,
        first: NodeRef,
        second: NodeRef,
        third: NodeRef,
    ) -> Result<NodeRef, CompilerError> {
        self.alloc(Node::Ternary {
            op,
            first,
            second,
            third,
        })
    }

    pub fn nary(&mut self, op: Op, children: [NodeRef; 4]) -> Result<NodeRef, CompilerError> {
        self.alloc(Node::NAry { op, children })
    }

    pub fn get(&self, node: NodeRef) -> &Node {
        &self.nodes[node.index()]
    }

    /// Overwrites a node in place; used by the folder to turn an interior
    /// node into a literal leaf
    pub fn replace(&mut self, node: NodeRef, value: Node) {
        self.nodes[node.index()] = value;
    }

    /// The token of a leaf node
    pub fn token(&self, node: NodeRef) -> Option<&Token> {
        match self.get(node) {
            Node::Leaf(token) => Some(token),
            _ => None,
        }
    }

    pub fn token_mut(&mut self, node: NodeRef) -> Option<&mut Token> {
        match &mut self.nodes[node.index()] {
            Node::Leaf(token) => Some(token),
            _ => None,
        }
    }

    pub fn mark(&self) -> ArenaMark {
        ArenaMark {
            nodes: self.nodes.len(),
            used: self.used,
        }
    }

    pub fn reset(&mut self, mark: ArenaMark) {
        self.nodes.truncate(mark.nodes);
        self.used = mark.used;
    }

    /// Bytes currently charged against the capacity
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
