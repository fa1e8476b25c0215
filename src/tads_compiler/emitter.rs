// Bytecode emitter
//
// Appends opcodes and little-endian operands to the code buffer of the
// function or method being compiled, and resolves jumps through the label
// table.

use crate::tads_compiler::error::CompilerError;
use crate::tads_compiler::labels::{Label, LabelTable};

pub struct Emitter {
    code: Vec<u8>,
    pub labels: LabelTable,
}

/// Signed displacement from a jump's operand field to its target
fn displacement(target: usize, field: usize) -> Result<i16, CompilerError> {
    let distance = target as i64 - field as i64;
    i16::try_from(distance).map_err(|_| CompilerError::JumpOutOfRange(distance))
}

impl Emitter {
    pub fn new(label_pool_size: usize) -> Self {
        Emitter {
            code: Vec::new(),
            labels: LabelTable::new(label_pool_size),
        }
    }

    /// Current emit offset
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Hands back the finished code and starts a fresh buffer
    pub fn take_code(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.code)
    }

    /// Discards everything emitted after `offset`
    pub fn truncate(&mut self, offset: usize) {
        self.code.truncate(offset);
    }

    pub fn emit_op(&mut self, opcode: u8) {
        log::trace!("{:04x}: op {}", self.code.len(), opcode);
        self.code.push(opcode);
    }

    pub fn emit_byte(&mut self, byte: u8) {
        self.code.push(byte);
    }

    pub fn emit_int2(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_int2_signed(&mut self, value: i16) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_int4(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    /// Emits a string prefixed by its int2 length, the prefix included
    pub fn emit_counted_str(&mut self, text: &str) {
        self.emit_int2((text.len() + 2) as u16);
        self.emit_bytes(text.as_bytes());
    }

    /// Emits a signed int2 offset from this field to `target`, as used in
    /// switch tables
    pub fn emit_offset_to(&mut self, target: usize) -> Result<(), CompilerError> {
        let field = self.offset();
        let disp = displacement(target, field)?;
        self.emit_int2_signed(disp);
        Ok(())
    }

    pub fn write_int2_at(&mut self, offset: usize, value: u16) {
        self.code[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn read_int2_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.code[offset], self.code[offset + 1]])
    }

    pub fn new_label(&mut self) -> Result<Label, CompilerError> {
        self.labels.new_label()
    }

    /// A label bound to the current offset
    pub fn new_label_here(&mut self) -> Result<Label, CompilerError> {
        let here = self.offset();
        self.labels.new_label_at(here)
    }

    /// Emits a jump-family opcode with a displacement to `label`; unbound
    /// labels get a zero placeholder patched by `bind`
    pub fn jump(&mut self, opcode: u8, label: Label) -> Result<(), CompilerError> {
        self.emit_op(opcode);
        let field = self.offset();
        match self.labels.reference(label, field)? {
            Some(target) => {
                let disp = displacement(target, field)?;
                self.emit_int2_signed(disp);
            }
            None => {
                log::trace!("forward reference to label {} at {:04x}", label.0, field);
                self.emit_int2(0);
            }
        }
        Ok(())
    }

    /// Binds `label` to the current offset and patches pending jumps
    pub fn bind(&mut self, label: Label) -> Result<(), CompilerError> {
        let here = self.offset();
        for field in self.labels.bind(label, here)? {
            let disp = displacement(here, field)?;
            self.write_int2_at(field, disp as u16);
        }
        log::trace!("label {} bound at {:04x}", label.0, here);
        Ok(())
    }

    pub fn bind_and_release(&mut self, label: Label) -> Result<(), CompilerError> {
        self.bind(label)?;
        self.labels.release(label)
    }

    pub fn release(&mut self, label: Label) -> Result<(), CompilerError> {
        self.labels.release(label)
    }

    pub fn clear(&mut self, label: Label) {
        self.labels.clear(label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tads_compiler::opcodes::op;

    fn decode_target(code: &[u8], field: usize) -> usize {
        let disp = i16::from_le_bytes([code[field], code[field + 1]]);
        (field as i64 + disp as i64) as usize
    }

    #[test]
    fn test_forward_jumps_patched_to_bind_offset() {
        let mut emitter = Emitter::new(32);
        let label = emitter.new_label().unwrap();
        emitter.jump(op::JF, label).unwrap();
        emitter.emit_op(op::PUSHNIL);
        emitter.jump(op::JMP, label).unwrap();
        emitter.emit_op(op::DISCARD);
        let target = emitter.offset();
        emitter.bind_and_release(label).unwrap();

        let code = emitter.take_code();
        assert_eq!(decode_target(&code, 1), target);
        assert_eq!(decode_target(&code, 5), target);
        assert_eq!(emitter.labels.live_count(), 0);
    }

    #[test]
    fn test_backward_jump_is_negative() {
        let mut emitter = Emitter::new(32);
        emitter.emit_op(op::PUSHNIL);
        let top = emitter.new_label_here().unwrap();
        emitter.emit_op(op::DISCARD);
        emitter.jump(op::JMP, top).unwrap();
        emitter.release(top).unwrap();

        let code = emitter.code().to_vec();
        assert_eq!(code[2], op::JMP);
        let disp = i16::from_le_bytes([code[3], code[4]]);
        assert_eq!(disp, -2);
        assert_eq!(decode_target(&code, 3), 1);
    }

    #[test]
    fn test_counted_string_includes_prefix() {
        let mut emitter = Emitter::new(32);
        emitter.emit_counted_str("abc");
        assert_eq!(emitter.code(), &[5, 0, b'a', b'b', b'c']);
    }

    #[test]
    fn test_write_and_read_int2() {
        let mut emitter = Emitter::new(32);
        emitter.emit_int2(0);
        emitter.emit_int4(-2);
        emitter.write_int2_at(0, 0x1234);
        assert_eq!(emitter.read_int2_at(0), 0x1234);
        assert_eq!(&emitter.code()[2..], &[0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_release_unbound_referenced_label_fails() {
        let mut emitter = Emitter::new(32);
        let label = emitter.new_label().unwrap();
        emitter.jump(op::JMP, label).unwrap();
        assert!(matches!(
            emitter.release(label),
            Err(CompilerError::UnresolvedLabel(_))
        ));
    }
}
