//! Bytecode constants
//!
//! Every instruction starts with a one-byte opcode. Operands follow inline:
//! object, property and offset operands are 2-byte little-endian, numeric
//! literals are 4-byte little-endian, argument counts are a single byte.
//!
//! # Jump displacements
//!
//! Jump operands are signed 2-byte values measured from the offset of the
//! displacement field itself, so a jump whose field sits at offset `f` and
//! targets offset `t` stores `t - f`. Switch tables use the same convention
//! for their per-case offsets.

/// Instruction opcodes
pub mod op {
    /// Push a 4-byte number
    pub const PUSHNUM: u8 = 1;
    /// Push an object reference (int2 object)
    pub const PUSHOBJ: u8 = 2;
    pub const NEG: u8 = 3;
    pub const NOT: u8 = 4;
    pub const ADD: u8 = 5;
    pub const SUB: u8 = 6;
    pub const MUL: u8 = 7;
    pub const DIV: u8 = 8;
    pub const AND: u8 = 9;
    pub const OR: u8 = 10;
    pub const EQ: u8 = 11;
    pub const NE: u8 = 12;
    pub const GT: u8 = 13;
    pub const GE: u8 = 14;
    pub const LT: u8 = 15;
    pub const LE: u8 = 16;
    /// Call a function: argc byte, int2 function object
    pub const CALL: u8 = 17;
    /// Evaluate a property of the object on the stack: argc byte, int2 prop
    pub const GETP: u8 = 18;
    pub const GETPDATA: u8 = 19;
    /// Push a local variable (int2 slot, negative for parameters)
    pub const GETLCL: u8 = 20;
    pub const PTRGETPDATA: u8 = 21;
    /// Return without a value (int2 parameter count)
    pub const RETURN: u8 = 22;
    /// Return the value on top of the stack (int2 parameter count)
    pub const RETVAL: u8 = 23;
    /// Reserve local variable slots (int2 count)
    pub const ENTER: u8 = 24;
    pub const DISCARD: u8 = 25;
    pub const JMP: u8 = 26;
    /// Jump if false (pops the condition)
    pub const JF: u8 = 27;
    pub const PUSHSELF: u8 = 28;
    /// Display a double-quoted string (counted string operand)
    pub const SAY: u8 = 29;
    /// Call a builtin: argc byte, int2 builtin number
    pub const BUILTIN: u8 = 30;
    pub const PUSHSTR: u8 = 31;
    pub const PUSHLST: u8 = 32;
    pub const PUSHNIL: u8 = 33;
    pub const PUSHTRUE: u8 = 34;
    /// Push a function address (int2 function object)
    pub const PUSHFN: u8 = 35;
    /// Call through a function pointer on the stack: argc byte
    pub const PTRCALL: u8 = 38;
    pub const PTRINH: u8 = 39;
    pub const PTRGETP: u8 = 40;
    /// Pass the current message to the superclass (int2 prop)
    pub const PASS: u8 = 41;
    pub const EXIT: u8 = 42;
    pub const ABORT: u8 = 43;
    pub const ASKDO: u8 = 44;
    pub const ASKIO: u8 = 45;
    /// Inherit from an explicit superclass: argc, int2 prop, int2 superclass
    pub const EXPINH: u8 = 46;
    pub const EXPINHPTR: u8 = 47;
    /// Jump if true (pops the condition)
    pub const JT: u8 = 59;
    pub const GETPSELF: u8 = 60;
    /// Property of a constant object: argc, int2 object, int2 prop
    pub const GETPOBJ: u8 = 62;
    pub const INDEX: u8 = 64;
    /// Push a property number (int2 prop)
    pub const PUSHPN: u8 = 67;
    /// Jump if true, leaving the value on the stack; pop otherwise
    pub const JST: u8 = 68;
    /// Jump if false, leaving the value on the stack; pop otherwise
    pub const JSF: u8 = 69;
    pub const INHERIT: u8 = 71;
    pub const CALLEXT: u8 = 72;
    /// Build a list from the top n stack elements (int2 n)
    pub const CONS: u8 = 74;
    /// Jump to a case table (int2 displacement)
    pub const SWITCH: u8 = 75;
    pub const ARGC: u8 = 76;
    /// Check the caller's argument count (byte: count | 0x80 for varargs)
    pub const CHKARGC: u8 = 77;
    /// Debug line record
    pub const LINE: u8 = 78;
    /// Debug local-variable frame record
    pub const FRAME: u8 = 79;
    pub const GETPPTRSELF: u8 = 82;
    pub const MOD: u8 = 83;
    pub const BAND: u8 = 84;
    pub const BOR: u8 = 85;
    pub const XOR: u8 = 86;
    pub const BNOT: u8 = 87;
    pub const SHL: u8 = 88;
    pub const SHR: u8 = 89;
    pub const NEW: u8 = 90;
    pub const DELETE: u8 = 91;
    /// Store the top of stack into a local (int2 slot)
    pub const SETLCL: u8 = 92;
}

/// Assignment opcodes are composed from bit fields:
/// `MASK | operation | prefix/postfix | target`.
pub mod asi {
    pub const MASK: u8 = 0xC0;

    // target
    pub const LOCAL: u8 = 0x00;
    pub const PROP: u8 = 0x01;
    pub const INDEX: u8 = 0x02;
    pub const PROP_PTR: u8 = 0x03;

    // operation
    pub const DIRECT: u8 = 0x00;
    pub const ADD: u8 = 0x04;
    pub const SUB: u8 = 0x08;
    pub const MUL: u8 = 0x0C;
    pub const DIV: u8 = 0x10;
    pub const INC: u8 = 0x14;
    pub const DEC: u8 = 0x18;
    /// Extended operation; the real operation follows in a second byte
    pub const EXT: u8 = 0x1C;

    pub const PRE: u8 = 0x00;
    pub const POST: u8 = 0x20;

    // extended operation byte
    pub const EXT_MOD: u8 = 1;
    pub const EXT_BAND: u8 = 2;
    pub const EXT_BOR: u8 = 3;
    pub const EXT_XOR: u8 = 4;
    pub const EXT_SHL: u8 = 5;
    pub const EXT_SHR: u8 = 6;

    pub const TARGET_BITS: u8 = 0x03;
    pub const OPERATION_BITS: u8 = 0x1C;
}

/// Property and list element data types
pub mod dat {
    pub const NUMBER: u8 = 1;
    pub const OBJECT: u8 = 2;
    pub const SSTRING: u8 = 3;
    pub const BASEPTR: u8 = 4;
    pub const NIL: u8 = 5;
    pub const CODE: u8 = 6;
    pub const LIST: u8 = 7;
    pub const TRUE: u8 = 8;
    pub const DSTRING: u8 = 9;
    pub const FNADDR: u8 = 10;
    /// Old-format verb templates (no flags byte)
    pub const TPL: u8 = 11;
    pub const PROPNUM: u8 = 13;
    /// Computed on demand at run time
    pub const DEMAND: u8 = 14;
    /// Verb synonym (int2 target property)
    pub const SYN: u8 = 15;
    /// Redirection to another object (int2 object)
    pub const REDIR: u8 = 16;
    /// Verb templates with flags byte
    pub const TPL2: u8 = 17;

    pub fn name(data_type: u8) -> &'static str {
        match data_type {
            NUMBER => "number",
            OBJECT => "object",
            SSTRING => "sstring",
            BASEPTR => "baseptr",
            NIL => "nil",
            CODE => "code",
            LIST => "list",
            TRUE => "true",
            DSTRING => "dstring",
            FNADDR => "fnaddr",
            TPL => "tpl",
            PROPNUM => "propnum",
            DEMAND => "demand",
            SYN => "syn",
            REDIR => "redir",
            TPL2 => "tpl2",
            _ => "unknown",
        }
    }
}

/// Reserved property numbers
pub mod prop {
    pub const DO_ACTION: u16 = 1;
    pub const VERB: u16 = 2;
    pub const NOUN: u16 = 3;
    pub const ADJECTIVE: u16 = 4;
    pub const PREPOSITION: u16 = 5;
    pub const ARTICLE: u16 = 6;
    pub const PLURAL: u16 = 7;
    pub const SDESC: u16 = 8;
    pub const THEDESC: u16 = 9;
    pub const IO_ACTION: u16 = 12;
    pub const LOCATION: u16 = 13;
    pub const CONTENTS: u16 = 17;
    pub const TEMPLATE: u16 = 18;
    pub const LOCATION_OK: u16 = 26;
    pub const TEMPLATE2: u16 = 41;

    /// First number handed out to user-defined properties
    pub const FIRST_USER: u16 = 42;

    /// Vocabulary properties take word lists rather than values
    pub fn is_vocabulary(prop: u16) -> bool {
        (VERB..=PLURAL).contains(&prop)
    }
}

/// Compiler limits
pub mod limits {
    /// Longest identifier, including synthesized template names
    pub const TOKNAMMAX: usize = 39;
    /// Verb templates per object
    pub const MAX_TEMPLATES: usize = 30;
    /// Entries in one switch case-table page
    pub const CASE_PAGE_SIZE: usize = 50;
    pub const MAX_SUPERCLASSES: usize = 64;
    /// Growth room left on non-class objects at close
    pub const OBJ_EXTRA: usize = 64;
    /// Fixed size of an object header in the store
    pub const OBJ_HEADER_SIZE: usize = 14;
}

/// Verb template and vocabulary flags
pub mod vocab {
    /// Template flag: disambiguate the direct object first
    pub const TPL_DOBJ_FIRST: u8 = 0x01;
    /// Size of a new-format template entry
    pub const TPL2_SIZE: usize = 11;
    /// Size of an old-format template entry
    pub const TPL_SIZE: usize = 10;
    /// Preposition slot value for doAction templates
    pub const NO_PREPOSITION: u16 = 0xFFFF;

    /// Word flag: the word belongs to a class
    pub const WORD_CLASS: u8 = 0x01;

    /// Inheritance record flags
    pub const INH_CLASS: u8 = 0x01;
    pub const INH_HAS_VOCAB: u8 = 0x02;
    pub const INH_LOCATION_NIL: u8 = 0x04;
}
