//! Code generation buffer
//!
//! Holds the bytecode of one method while it is generated: the byte buffer,
//! the operand-stack depth and its maximum, local slot allocation, forward
//! branches waiting for their label, and the line number table.

use super::error::{CodegenError, CodegenResult};
use super::opcodes::*;
use crate::descriptor::Descriptor;

/// Maximum size of a method's code array
const MAX_CODE_LENGTH: usize = 65535;

/// A branch target inside the current method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone, Default)]
struct LabelState {
    position: Option<usize>,
    /// Stack depth carried by the jumps to this label
    stack: Option<u16>,
    jumped: bool,
}

#[derive(Debug, Clone)]
struct Fixup {
    /// Position of the branch opcode
    op_pc: usize,
    label: Label,
}

/// Local variable slot type, as load/store opcodes see it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl SlotKind {
    pub fn of(d: &Descriptor) -> Self {
        match d.as_str() {
            "J" => SlotKind::Long,
            "F" => SlotKind::Float,
            "D" => SlotKind::Double,
            "B" | "C" | "I" | "S" | "Z" => SlotKind::Int,
            _ => SlotKind::Reference,
        }
    }

    /// Distance of the typed variant from the `int` opcode (`ILOAD`, `IRETURN`, ...)
    pub fn offset(self) -> u8 {
        match self {
            SlotKind::Int => 0,
            SlotKind::Long => 1,
            SlotKind::Float => 2,
            SlotKind::Double => 3,
            SlotKind::Reference => 4,
        }
    }

    pub fn width(self) -> u16 {
        match self {
            SlotKind::Long | SlotKind::Double => 2,
            _ => 1,
        }
    }
}

/// Main code generation buffer
#[derive(Debug)]
pub struct Code {
    bytes: Vec<u8>,
    stack: u16,
    max_stack: u16,
    next_local: u16,
    max_locals: u16,
    /// Code generation enabled: false after an unconditional transfer
    alive: bool,
    labels: Vec<LabelState>,
    fixups: Vec<Fixup>,
    line_numbers: Vec<(u16, u16)>,
    line_debug_info: bool,
}

impl Code {
    /// `reserved` slots are taken by `this` and the parameters
    pub fn new(reserved: u16, line_debug_info: bool) -> Self {
        Self {
            bytes: Vec::new(),
            stack: 0,
            max_stack: 0,
            next_local: reserved,
            max_locals: reserved,
            alive: true,
            labels: Vec::new(),
            fixups: Vec::new(),
            line_numbers: Vec::new(),
            line_debug_info,
        }
    }

    /// Current code pointer
    pub fn cp(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// Apply the stack effect of the instruction just emitted
    pub fn adjust_stack(&mut self, delta: i32) {
        let depth = (self.stack as i32 + delta).max(0);
        self.stack = depth.min(u16::MAX as i32) as u16;
        self.max_stack = self.max_stack.max(self.stack);
    }

    pub fn emit_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn emit_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    /// An opcode with no operands
    pub fn emit_op(&mut self, op: u8, delta: i32) {
        self.emit_u8(op);
        self.adjust_stack(delta);
        if matches!(op, IRETURN | LRETURN | FRETURN | DRETURN | ARETURN | RETURN | ATHROW) {
            self.alive = false;
        }
    }

    /// An opcode with a two-byte constant pool index
    pub fn emit_op_u16(&mut self, op: u8, operand: u16, delta: i32) {
        self.emit_u8(op);
        self.emit_u16(operand);
        self.adjust_stack(delta);
    }

    pub fn emit_op_u8(&mut self, op: u8, operand: u8, delta: i32) {
        self.emit_u8(op);
        self.emit_u8(operand);
        self.adjust_stack(delta);
    }

    pub fn emit_int(&mut self, value: i32, pool_index: impl FnOnce(i32) -> CodegenResult<u16>) -> CodegenResult<()> {
        match value {
            -1..=5 => self.emit_op((ICONST_0 as i32 + value) as u8, 1),
            -128..=127 => self.emit_op_u8(BIPUSH, value as i8 as u8, 1),
            -32768..=32767 => self.emit_op_u16(SIPUSH, value as i16 as u16, 1),
            _ => self.emit_ldc(pool_index(value)?),
        }
        Ok(())
    }

    /// `ldc` or `ldc_w` for a one-slot constant
    pub fn emit_ldc(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.emit_op_u8(LDC, index as u8, 1);
        } else {
            self.emit_op_u16(LDC_W, index, 1);
        }
    }

    /// Reserve a local slot for a value of type `d`
    pub fn new_local(&mut self, d: &Descriptor) -> CodegenResult<u16> {
        let slot = self.next_local;
        let width = SlotKind::of(d).width();
        let next = slot.checked_add(width).ok_or(CodegenError::TooManyLocals)?;
        self.next_local = next;
        self.max_locals = self.max_locals.max(next);
        Ok(slot)
    }

    /// Slots allocated after `mark` become free again at scope exit
    pub fn local_mark(&self) -> u16 {
        self.next_local
    }

    pub fn release_locals(&mut self, mark: u16) {
        self.next_local = mark;
    }

    pub fn emit_load(&mut self, slot: u16, kind: SlotKind) {
        self.emit_local(ILOAD, ILOAD_0, slot, kind);
        self.adjust_stack(kind.width() as i32);
    }

    pub fn emit_store(&mut self, slot: u16, kind: SlotKind) {
        self.emit_local(ISTORE, ISTORE_0, slot, kind);
        self.adjust_stack(-(kind.width() as i32));
    }

    fn emit_local(&mut self, base: u8, short_base: u8, slot: u16, kind: SlotKind) {
        let offset = kind.offset();
        if slot <= 3 {
            self.emit_u8(short_base + offset * 4 + slot as u8);
        } else if slot <= u8::MAX as u16 {
            self.emit_u8(base + offset);
            self.emit_u8(slot as u8);
        } else {
            self.emit_u8(WIDE);
            self.emit_u8(base + offset);
            self.emit_u16(slot);
        }
    }

    pub fn emit_iinc(&mut self, slot: u16, delta: i16) {
        if slot <= u8::MAX as u16 && (i8::MIN as i16..=i8::MAX as i16).contains(&delta) {
            self.emit_u8(IINC);
            self.emit_u8(slot as u8);
            self.emit_u8(delta as i8 as u8);
        } else {
            self.emit_u8(WIDE);
            self.emit_u8(IINC);
            self.emit_u16(slot);
            self.emit_u16(delta as u16);
        }
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(LabelState::default());
        Label(self.labels.len() - 1)
    }

    /// Conditional or unconditional branch; `delta` is the branch's own stack effect
    pub fn branch(&mut self, op: u8, label: Label, delta: i32) {
        let op_pc = self.cp();
        self.emit_u8(op);
        self.emit_u16(0);
        self.adjust_stack(delta);
        self.fixups.push(Fixup { op_pc, label });
        let state = &mut self.labels[label.0];
        state.jumped = true;
        state.stack.get_or_insert(self.stack);
        if op == GOTO {
            self.alive = false;
        }
    }

    /// Bind `label` to the current position; code after it is reachable when
    /// the preceding code falls through or anything jumps here
    pub fn place_label(&mut self, label: Label) {
        let position = self.cp();
        let state = &mut self.labels[label.0];
        state.position = Some(position);
        if state.jumped {
            if !self.alive {
                if let Some(stack) = state.stack {
                    self.stack = stack;
                }
            }
            self.alive = true;
        }
    }

    /// Record that the statement at `line` starts here
    pub fn mark_line(&mut self, line: usize) {
        if !self.line_debug_info {
            return;
        }
        let pc = self.cp() as u16;
        let line = line.min(u16::MAX as usize) as u16;
        match self.line_numbers.last_mut() {
            Some((last_pc, last_line)) if *last_pc == pc => *last_line = line,
            Some((_, last_line)) if *last_line == line => {}
            _ => self.line_numbers.push((pc, line)),
        }
    }

    /// Patch branches and hand out the finished method body
    pub fn finish(mut self) -> CodegenResult<FinishedCode> {
        if self.bytes.len() > MAX_CODE_LENGTH {
            return Err(CodegenError::CodeTooLarge);
        }
        for fixup in &self.fixups {
            let target = self.labels[fixup.label.0].position.ok_or(CodegenError::UnplacedLabel)?;
            let offset = target as i64 - fixup.op_pc as i64;
            if offset < i16::MIN as i64 || offset > i16::MAX as i64 {
                return Err(CodegenError::BranchTooFar { offset });
            }
            let bytes = (offset as i16).to_be_bytes();
            self.bytes[fixup.op_pc + 1] = bytes[0];
            self.bytes[fixup.op_pc + 2] = bytes[1];
        }
        Ok(FinishedCode {
            bytes: self.bytes,
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            line_numbers: self.line_numbers,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FinishedCode {
    pub bytes: Vec<u8>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub line_numbers: Vec<(u16, u16)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_branch_is_patched() {
        let mut code = Code::new(1, false);
        let end = code.new_label();
        code.emit_load(0, SlotKind::Int);
        code.branch(IFEQ, end, -1);
        code.emit_op(ICONST_1, 1);
        code.emit_op(IRETURN, -1);
        code.place_label(end);
        code.emit_op(ICONST_0, 1);
        code.emit_op(IRETURN, -1);
        let finished = code.finish().unwrap();
        assert_eq!(finished.bytes, vec![ILOAD_0, IFEQ, 0, 5, ICONST_1, IRETURN, ICONST_0, IRETURN]);
        assert_eq!(finished.max_stack, 1);
        assert_eq!(finished.max_locals, 1);
    }

    #[test]
    fn test_alive_tracking() {
        let mut code = Code::new(0, false);
        let never = code.new_label();
        code.emit_op(RETURN, 0);
        assert!(!code.is_alive());
        code.place_label(never);
        assert!(!code.is_alive());
        let target = code.new_label();
        code.branch(GOTO, target, 0);
        code.place_label(target);
        assert!(code.is_alive());
    }

    #[test]
    fn test_local_slot_encodings() {
        let mut code = Code::new(0, false);
        code.emit_load(2, SlotKind::Reference);
        code.emit_store(7, SlotKind::Double);
        code.emit_load(300, SlotKind::Long);
        code.emit_iinc(1, 1);
        code.emit_iinc(1, 1000);
        let bytes = code.finish().unwrap().bytes;
        assert_eq!(
            bytes,
            vec![ALOAD_0 + 2, DSTORE, 7, WIDE, LLOAD, 1, 44, IINC, 1, 1, WIDE, IINC, 0, 1, 0x03, 0xE8]
        );
    }

    #[test]
    fn test_wide_locals_and_unplaced_labels() {
        let mut code = Code::new(0, false);
        assert_eq!(code.new_local(&Descriptor::long()).unwrap(), 0);
        assert_eq!(code.new_local(&Descriptor::int()).unwrap(), 2);
        assert_eq!(code.max_locals(), 3);
        let dangling = code.new_label();
        code.branch(GOTO, dangling, 0);
        assert_eq!(code.finish().unwrap_err(), CodegenError::UnplacedLabel);
    }

    #[test]
    fn test_line_numbers() {
        let mut code = Code::new(0, true);
        code.mark_line(3);
        code.emit_op(ICONST_0, 1);
        code.mark_line(3);
        code.emit_op(POP, -1);
        code.mark_line(4);
        code.emit_op(RETURN, 0);
        assert_eq!(code.finish().unwrap().line_numbers, vec![(0, 3), (2, 4)]);
    }
}
