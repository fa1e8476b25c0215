// Bytecode disassembler
//
// Decodes compiled method and function bodies back into instructions, with
// jump displacements resolved to absolute offsets and switch tables decoded
// in place. Used by `tadsc --dump` and by the code generator tests.

use std::fmt::{self, Write};

use crate::tads_compiler::opcodes::{asi, op};

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Byte(u8),
    Int2(u16),
    /// Local slot; negative for parameters
    Slot(i16),
    Number(i32),
    Str(String),
    /// Raw list image, including its length field
    List(Vec<u8>),
    /// Absolute offset a jump goes to
    Target(usize),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Byte(value) => write!(f, "{}", value),
            Operand::Int2(value) => write!(f, "#{}", value),
            Operand::Slot(slot) => write!(f, "L{}", slot),
            Operand::Number(value) => write!(f, "{}", value),
            Operand::Str(text) => write!(f, "{:?}", text),
            Operand::List(image) => write!(f, "[list {} bytes]", image.len()),
            Operand::Target(offset) => write!(f, "-> {:04x}", offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: Instruction,
    pub target: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: u8,
    pub name: String,
    pub operands: Vec<Operand>,
    /// Decoded case table, for SWITCH
    pub cases: Vec<SwitchCase>,
    pub default: Option<usize>,
    /// Bytes the instruction occupies, not counting a switch table
    pub length: usize,
}

impl Instruction {
    /// Target of a jump instruction
    pub fn target(&self) -> Option<usize> {
        self.operands.iter().find_map(|operand| match operand {
            Operand::Target(offset) => Some(*offset),
            _ => None,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04x}: {}", self.offset, self.name)?;
        for operand in &self.operands {
            write!(f, " {}", operand)?;
        }
        for case in &self.cases {
            write!(f, "\n        case {} -> {:04x}", case.value, case.target)?;
        }
        if let Some(default) = self.default {
            write!(f, "\n        default -> {:04x}", default)?;
        }
        Ok(())
    }
}

/// How the bytes after an opcode are laid out
#[derive(Debug, Clone, Copy)]
enum Layout {
    None,
    Byte,
    Int2,
    Slot,
    Number,
    Str,
    List,
    Jump,
    /// argc byte, int2
    ArgcInt2,
    /// argc byte, int2, int2
    ArgcInt2Int2,
    /// Debug record whose first byte is its own length
    LineRecord,
    /// Debug record whose first int2 is its own length
    FrameRecord,
}

fn opcode_info(opcode: u8) -> Option<(&'static str, Layout)> {
    let info = match opcode {
        op::PUSHNUM => ("PUSHNUM", Layout::Number),
        op::PUSHOBJ => ("PUSHOBJ", Layout::Int2),
        op::NEG => ("NEG", Layout::None),
        op::NOT => ("NOT", Layout::None),
        op::ADD => ("ADD", Layout::None),
        op::SUB => ("SUB", Layout::None),
        op::MUL => ("MUL", Layout::None),
        op::DIV => ("DIV", Layout::None),
        op::AND => ("AND", Layout::None),
        op::OR => ("OR", Layout::None),
        op::EQ => ("EQ", Layout::None),
        op::NE => ("NE", Layout::None),
        op::GT => ("GT", Layout::None),
        op::GE => ("GE", Layout::None),
        op::LT => ("LT", Layout::None),
        op::LE => ("LE", Layout::None),
        op::CALL => ("CALL", Layout::ArgcInt2),
        op::GETP => ("GETP", Layout::ArgcInt2),
        op::GETPDATA => ("GETPDATA", Layout::ArgcInt2),
        op::GETLCL => ("GETLCL", Layout::Slot),
        op::PTRGETPDATA => ("PTRGETPDATA", Layout::Byte),
        op::RETURN => ("RETURN", Layout::Int2),
        op::RETVAL => ("RETVAL", Layout::Int2),
        op::ENTER => ("ENTER", Layout::Int2),
        op::DISCARD => ("DISCARD", Layout::None),
        op::JMP => ("JMP", Layout::Jump),
        op::JF => ("JF", Layout::Jump),
        op::PUSHSELF => ("PUSHSELF", Layout::None),
        op::SAY => ("SAY", Layout::Str),
        op::BUILTIN => ("BUILTIN", Layout::ArgcInt2),
        op::PUSHSTR => ("PUSHSTR", Layout::Str),
        op::PUSHLST => ("PUSHLST", Layout::List),
        op::PUSHNIL => ("PUSHNIL", Layout::None),
        op::PUSHTRUE => ("PUSHTRUE", Layout::None),
        op::PUSHFN => ("PUSHFN", Layout::Int2),
        op::PTRCALL => ("PTRCALL", Layout::Byte),
        op::PTRINH => ("PTRINH", Layout::Byte),
        op::PTRGETP => ("PTRGETP", Layout::Byte),
        op::PASS => ("PASS", Layout::Int2),
        op::EXIT => ("EXIT", Layout::None),
        op::ABORT => ("ABORT", Layout::None),
        op::ASKDO => ("ASKDO", Layout::None),
        op::ASKIO => ("ASKIO", Layout::Int2),
        op::EXPINH => ("EXPINH", Layout::ArgcInt2Int2),
        op::EXPINHPTR => ("EXPINHPTR", Layout::ArgcInt2),
        op::JT => ("JT", Layout::Jump),
        op::GETPSELF => ("GETPSELF", Layout::ArgcInt2),
        op::GETPOBJ => ("GETPOBJ", Layout::ArgcInt2Int2),
        op::INDEX => ("INDEX", Layout::None),
        op::PUSHPN => ("PUSHPN", Layout::Int2),
        op::JST => ("JST", Layout::Jump),
        op::JSF => ("JSF", Layout::Jump),
        op::INHERIT => ("INHERIT", Layout::ArgcInt2),
        op::CALLEXT => ("CALLEXT", Layout::ArgcInt2),
        op::CONS => ("CONS", Layout::Int2),
        op::SWITCH => ("SWITCH", Layout::Jump),
        op::ARGC => ("ARGC", Layout::None),
        op::CHKARGC => ("CHKARGC", Layout::Byte),
        op::LINE => ("LINE", Layout::LineRecord),
        op::FRAME => ("FRAME", Layout::FrameRecord),
        op::GETPPTRSELF => ("GETPPTRSELF", Layout::Byte),
        op::MOD => ("MOD", Layout::None),
        op::BAND => ("BAND", Layout::None),
        op::BOR => ("BOR", Layout::None),
        op::XOR => ("XOR", Layout::None),
        op::BNOT => ("BNOT", Layout::None),
        op::SHL => ("SHL", Layout::None),
        op::SHR => ("SHR", Layout::None),
        op::NEW => ("NEW", Layout::None),
        op::DELETE => ("DELETE", Layout::None),
        op::SETLCL => ("SETLCL", Layout::Slot),
        _ => return None,
    };
    Some(info)
}

/// Mnemonic for a composed assignment opcode, e.g. `ASI_ADD_LCL`
fn assignment_name(opcode: u8, extended: Option<u8>) -> String {
    let operation = match opcode & asi::OPERATION_BITS {
        asi::DIRECT => "ASI",
        asi::ADD => "ADD",
        asi::SUB => "SUB",
        asi::MUL => "MUL",
        asi::DIV => "DIV",
        asi::INC => "INC",
        asi::DEC => "DEC",
        _ => match extended {
            Some(asi::EXT_MOD) => "MOD",
            Some(asi::EXT_BAND) => "BAND",
            Some(asi::EXT_BOR) => "BOR",
            Some(asi::EXT_XOR) => "XOR",
            Some(asi::EXT_SHL) => "SHL",
            Some(asi::EXT_SHR) => "SHR",
            _ => "EXT?",
        },
    };
    let target = match opcode & asi::TARGET_BITS {
        asi::LOCAL => "LCL",
        asi::PROP => "PRP",
        asi::INDEX => "IND",
        _ => "PPTR",
    };
    let fix = if opcode & asi::POST != 0 { "POST" } else { "" };
    if fix.is_empty() {
        format!("{}_{}", operation, target)
    } else {
        format!("{}_{}_{}", operation, fix, target)
    }
}

pub struct Disassembler<'a> {
    code: &'a [u8],
}

impl<'a> Disassembler<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Disassembler { code }
    }

    fn byte(&self, offset: usize) -> Result<u8, String> {
        self.code
            .get(offset)
            .copied()
            .ok_or_else(|| format!("code ends inside instruction at {:04x}", offset))
    }

    fn int2(&self, offset: usize) -> Result<u16, String> {
        Ok(u16::from_le_bytes([self.byte(offset)?, self.byte(offset + 1)?]))
    }

    fn int4(&self, offset: usize) -> Result<i32, String> {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.byte(offset + i)?;
        }
        Ok(i32::from_le_bytes(bytes))
    }

    fn bytes(&self, offset: usize, length: usize) -> Result<&'a [u8], String> {
        self.code
            .get(offset..offset + length)
            .ok_or_else(|| format!("code ends inside instruction at {:04x}", offset))
    }

    /// Absolute target of the displacement field at `field`
    fn jump_target(&self, field: usize) -> Result<usize, String> {
        let displacement = self.int2(field)? as i16 as i64;
        let target = field as i64 + displacement;
        if target < 0 {
            return Err(format!("jump at {:04x} leaves the code", field));
        }
        Ok(target as usize)
    }

    /// Decodes the single instruction at `offset`
    pub fn decode(&self, offset: usize) -> Result<Instruction, String> {
        let opcode = self.byte(offset)?;
        let mut pc = offset + 1;
        let mut operands = Vec::new();

        if opcode & asi::MASK == asi::MASK {
            let extended = if opcode & asi::OPERATION_BITS == asi::EXT {
                let ext = self.byte(pc)?;
                pc += 1;
                Some(ext)
            } else {
                None
            };
            if matches!(opcode & asi::TARGET_BITS, asi::LOCAL | asi::PROP) {
                let value = self.int2(pc)?;
                pc += 2;
                operands.push(if opcode & asi::TARGET_BITS == asi::LOCAL {
                    Operand::Slot(value as i16)
                } else {
                    Operand::Int2(value)
                });
            }
            return Ok(Instruction {
                offset,
                opcode,
                name: assignment_name(opcode, extended),
                operands,
                cases: Vec::new(),
                default: None,
                length: pc - offset,
            });
        }

        let (name, layout) =
            opcode_info(opcode).ok_or_else(|| format!("unknown opcode {} at {:04x}", opcode, offset))?;

        match layout {
            Layout::None => {}
            Layout::Byte => {
                operands.push(Operand::Byte(self.byte(pc)?));
                pc += 1;
            }
            Layout::Int2 => {
                operands.push(Operand::Int2(self.int2(pc)?));
                pc += 2;
            }
            Layout::Slot => {
                operands.push(Operand::Slot(self.int2(pc)? as i16));
                pc += 2;
            }
            Layout::Number => {
                operands.push(Operand::Number(self.int4(pc)?));
                pc += 4;
            }
            Layout::Str => {
                let length = self.int2(pc)? as usize;
                if length < 2 {
                    return Err(format!("bad string length at {:04x}", pc));
                }
                let text = self.bytes(pc + 2, length - 2)?;
                operands.push(Operand::Str(String::from_utf8_lossy(text).into_owned()));
                pc += length;
            }
            Layout::List => {
                let length = self.int2(pc)? as usize;
                operands.push(Operand::List(self.bytes(pc, length)?.to_vec()));
                pc += length.max(2);
            }
            Layout::Jump => {
                operands.push(Operand::Target(self.jump_target(pc)?));
                pc += 2;
            }
            Layout::ArgcInt2 => {
                operands.push(Operand::Byte(self.byte(pc)?));
                operands.push(Operand::Int2(self.int2(pc + 1)?));
                pc += 3;
            }
            Layout::ArgcInt2Int2 => {
                operands.push(Operand::Byte(self.byte(pc)?));
                operands.push(Operand::Int2(self.int2(pc + 1)?));
                operands.push(Operand::Int2(self.int2(pc + 3)?));
                pc += 5;
            }
            Layout::LineRecord => {
                let length = self.byte(pc)? as usize;
                let record = self.bytes(pc, length.max(1))?;
                if length >= 6 {
                    let line = u16::from_le_bytes([record[4], record[5]]);
                    operands.push(Operand::Int2(line));
                }
                pc += length.max(1);
            }
            Layout::FrameRecord => {
                let length = self.int2(pc)? as usize;
                self.bytes(pc, length.max(2))?;
                operands.push(Operand::Int2(self.int2(pc + 2)?));
                pc += length.max(2);
            }
        }

        Ok(Instruction {
            offset,
            opcode,
            name: name.to_string(),
            operands,
            cases: Vec::new(),
            default: None,
            length: pc - offset,
        })
    }

    /// Reads the case table at `offset`; returns the cases, the default
    /// target and the offset just past the table
    fn decode_switch_table(&self, offset: usize) -> Result<(Vec<SwitchCase>, usize, usize), String> {
        let count = self.int2(offset)? as usize;
        let mut pc = offset + 2;
        let mut cases = Vec::with_capacity(count);
        for _ in 0..count {
            let value = self.decode(pc)?;
            pc += value.length;
            let target = self.jump_target(pc)?;
            pc += 2;
            cases.push(SwitchCase { value, target });
        }
        let default = self.jump_target(pc)?;
        Ok((cases, default, pc + 2))
    }

    /// Decodes the whole body. Switch tables are attached to the SWITCH
    /// instruction that uses them and skipped in the instruction stream.
    pub fn disassemble(&self) -> Result<Vec<Instruction>, String> {
        let mut instructions: Vec<Instruction> = Vec::new();
        // (table offset, index of the SWITCH instruction)
        let mut tables: Vec<(usize, usize)> = Vec::new();
        let mut pc = 0;

        while pc < self.code.len() {
            if let Some(position) = tables.iter().position(|(table, _)| *table == pc) {
                let (_, index) = tables.remove(position);
                let (cases, default, end) = self.decode_switch_table(pc)?;
                instructions[index].cases = cases;
                instructions[index].default = Some(default);
                pc = end;
                continue;
            }

            let instruction = self.decode(pc)?;
            pc += instruction.length;
            if instruction.opcode == op::SWITCH {
                if let Some(table) = instruction.target() {
                    tables.push((table, instructions.len()));
                }
            }
            instructions.push(instruction);
        }

        if let Some((table, _)) = tables.first() {
            return Err(format!("switch table at {:04x} is outside the code", table));
        }
        Ok(instructions)
    }
}

/// Decodes a complete method or function body
pub fn disassemble(code: &[u8]) -> Result<Vec<Instruction>, String> {
    Disassembler::new(code).disassemble()
}

/// Printable listing, one instruction per line
pub fn listing(code: &[u8]) -> Result<String, String> {
    let mut output = String::new();
    for instruction in disassemble(code)? {
        writeln!(&mut output, "{}", instruction).map_err(|e| e.to_string())?;
    }
    Ok(output)
}

#[cfg(test)]
#[path = "disassembler_tests.rs"]
mod tests;
