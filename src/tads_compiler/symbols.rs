// Symbol tables: globals, block-scoped locals and function goto labels

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::tads_compiler::opcodes::prop;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolKind {
    #[default]
    Unknown,
    Local,
    Property,
    Function,
    ForwardFunction,
    External,
    Builtin,
    Object,
    ForwardObject,
    Label,
    SelfRef,
    Inherited,
    ArgCount,
}

impl SymbolKind {
    pub fn is_object(self) -> bool {
        matches!(self, SymbolKind::Object | SymbolKind::ForwardObject)
    }

    pub fn is_function(self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::ForwardFunction)
    }
}

/// What a symbol currently means, and its number (slot, object id,
/// property id, builtin index or label) within that kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolBinding {
    pub kind: SymbolKind,
    pub value: i32,
}

impl SymbolBinding {
    pub fn new(kind: SymbolKind, value: i32) -> Self {
        SymbolBinding { kind, value }
    }
}

lazy_static! {
    /// Builtin functions, numbered in run-time dispatch order
    pub static ref BUILTINS: IndexMap<&'static str, u16> = {
        let names = [
            "say", "car", "cdr", "length", "randomize", "rand", "find", "setit",
            "upper", "lower", "caps", "yorn", "input", "quit", "restart",
            "firstobj", "nextobj", "isclass", "notify", "unnotify", "datatype",
            "proptype", "getarg", "cvtstr", "cvtnum", "substr", "incturn",
            "remdaemon", "setdaemon", "remfuse", "setfuse",
        ];
        names
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, i as u16))
            .collect()
    };
    static ref RESERVED_PROPERTIES: Vec<(&'static str, u16)> = vec![
        ("doAction", prop::DO_ACTION),
        ("verb", prop::VERB),
        ("noun", prop::NOUN),
        ("adjective", prop::ADJECTIVE),
        ("preposition", prop::PREPOSITION),
        ("article", prop::ARTICLE),
        ("plural", prop::PLURAL),
        ("sdesc", prop::SDESC),
        ("thedesc", prop::THEDESC),
        ("ioAction", prop::IO_ACTION),
        ("location", prop::LOCATION),
        ("contents", prop::CONTENTS),
        ("locationOK", prop::LOCATION_OK),
    ];
}

#[derive(Debug, Default)]
struct Scope {
    names: IndexMap<String, i32>,
    /// Local count when the scope was opened
    saved_locals: i32,
}

#[derive(Debug)]
pub struct SymbolTable {
    globals: IndexMap<String, SymbolBinding>,
    scopes: Vec<Scope>,
    goto_labels: HashMap<String, u16>,
    locals: i32,
    parameters: i32,
    next_property: u16,
    next_external: u16,
    case_insensitive: bool,
}

impl SymbolTable {
    pub fn new(case_insensitive: bool) -> Self {
        let mut table = SymbolTable {
            globals: IndexMap::new(),
            scopes: Vec::new(),
            goto_labels: HashMap::new(),
            locals: 0,
            parameters: 0,
            next_property: prop::FIRST_USER,
            next_external: 0,
            case_insensitive,
        };

        table.add_global("self", SymbolBinding::new(SymbolKind::SelfRef, 0));
        table.add_global("inherited", SymbolBinding::new(SymbolKind::Inherited, 0));
        table.add_global("argcount", SymbolBinding::new(SymbolKind::ArgCount, 0));
        for (name, id) in RESERVED_PROPERTIES.iter() {
            table.add_global(name, SymbolBinding::new(SymbolKind::Property, *id as i32));
        }
        for (name, index) in BUILTINS.iter() {
            table.add_global(name, SymbolBinding::new(SymbolKind::Builtin, *index as i32));
        }
        table
    }

    fn key(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    /// Resolves a name: innermost local scope outward, then globals, then
    /// the current function's goto labels
    pub fn lookup(&self, name: &str) -> SymbolBinding {
        let key = self.key(name);
        for scope in self.scopes.iter().rev() {
            if let Some(slot) = scope.names.get(&key) {
                return SymbolBinding::new(SymbolKind::Local, *slot);
            }
        }
        match self.globals.get(&key) {
            Some(binding) => *binding,
            None => match self.goto_labels.get(&key) {
                Some(label) => SymbolBinding::new(SymbolKind::Label, *label as i32),
                None => SymbolBinding::default(),
            },
        }
    }

    pub fn lookup_global(&self, name: &str) -> Option<SymbolBinding> {
        self.globals.get(&self.key(name)).copied()
    }

    pub fn add_global(&mut self, name: &str, binding: SymbolBinding) {
        let key = self.key(name);
        self.globals.insert(key, binding);
    }

    pub fn add_goto_label(&mut self, name: &str, label: u16) {
        let key = self.key(name);
        self.goto_labels.insert(key, label);
    }

    /// Label numbers of the current function's goto labels
    pub fn goto_label_ids(&self) -> Vec<u16> {
        self.goto_labels.values().copied().collect()
    }

    /// Drains the goto table, returning (name, label) pairs
    pub fn take_goto_labels(&mut self) -> Vec<(String, u16)> {
        let mut labels: Vec<(String, u16)> = self.goto_labels.drain().collect();
        labels.sort();
        labels
    }

    pub fn allocate_property(&mut self) -> u16 {
        let id = self.next_property;
        self.next_property += 1;
        id
    }

    pub fn allocate_external(&mut self) -> u16 {
        let index = self.next_external;
        self.next_external += 1;
        index
    }

    /// Resets local numbering at the start of a function or method
    pub fn begin_function(&mut self) {
        self.scopes.clear();
        self.locals = 0;
        self.parameters = 0;
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope {
            names: IndexMap::new(),
            saved_locals: self.locals,
        });
    }

    pub fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            self.locals = scope.saved_locals;
        }
    }

    /// Number of open local scopes
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Drops every local scope above `depth`
    pub fn truncate_scopes(&mut self, depth: usize) {
        while self.scopes.len() > depth {
            self.pop_scope();
        }
    }

    /// Adds a local variable to the innermost scope and returns its slot
    pub fn add_local(&mut self, name: &str) -> i32 {
        self.locals += 1;
        let slot = self.locals;
        self.insert_local(name, slot);
        slot
    }

    /// Adds a parameter; parameters take negative slots
    pub fn add_parameter(&mut self, name: &str) -> i32 {
        self.parameters += 1;
        let slot = -self.parameters;
        self.insert_local(name, slot);
        slot
    }

    fn insert_local(&mut self, name: &str, slot: i32) {
        let key = self.key(name);
        if self.scopes.is_empty() {
            self.push_scope();
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(key, slot);
        }
    }

    /// Slots currently allocated, counting enclosing scopes
    pub fn local_count(&self) -> i32 {
        self.locals
    }

    pub fn parameter_count(&self) -> i32 {
        self.parameters
    }

    /// Names and slots of the innermost scope, in declaration order
    pub fn innermost_locals(&self) -> Vec<(String, i32)> {
        match self.scopes.last() {
            Some(scope) => scope
                .names
                .iter()
                .map(|(name, slot)| (name.clone(), *slot))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Global symbols in definition order
    pub fn globals(&self) -> impl Iterator<Item = (&String, &SymbolBinding)> {
        self.globals.iter()
    }
}
