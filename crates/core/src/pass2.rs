use a65_isa6502::{Encoding, Instruction, OpMode, OpcodeMap};

use crate::ast::{
    DataElement, DataSize, IndexRegister, InsnAttrs, Operand, Statement, StmtKind,
};
use crate::diag::Diagnostic;
use crate::error::AsmError;
use crate::eval::eval_defined;
use crate::image::Image;
use crate::span::Span;
use crate::symtab::SymbolTable;

/// Pass 2 re-walks the statement list with every symbol now required to be
/// defined, selects concrete encodings, and writes bytes into the image.
/// Pass 1's size decisions constrain the encodings chosen here.
pub struct Pass2<'a> {
    symtab: &'a mut SymbolTable,
    opcodes: &'a OpcodeMap,
    image: &'a mut Image,
    loc: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Pass2<'a> {
    pub fn new(symtab: &'a mut SymbolTable, opcodes: &'a OpcodeMap, image: &'a mut Image) -> Self {
        Self {
            symtab,
            opcodes,
            image,
            loc: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn run(mut self, statements: &mut [Statement]) -> Vec<Diagnostic> {
        self.loc = 0;
        self.image.clear();

        for statement in statements {
            if let Err(error) = self.statement(statement) {
                self.diagnostics
                    .push(Diagnostic::error(statement.span, error.to_string()));
            }
            statement.next_loc = self.loc;
        }
        self.diagnostics
    }

    fn statement(&mut self, statement: &mut Statement) -> Result<(), AsmError> {
        let span = statement.span;
        match &mut statement.kind {
            StmtKind::Org { expr, resolved } => {
                let value = eval_defined(expr, self.symtab, self.loc)?;
                if *resolved != Some(value) {
                    return Err(AsmError::OrgChanged);
                }
                self.set_loc(value)?;
            }
            StmtKind::Set { name, expr } => {
                // The symbol table rejects a value that changed between
                // the passes.
                let value = eval_defined(expr, self.symtab, self.loc)?;
                self.symtab.set_value(name, value)?;
            }
            StmtKind::Instruction {
                mnemonic,
                operand,
                operand_size,
                attrs,
            } => {
                let opcodes = self.opcodes;
                let instruction = opcodes.lookup(mnemonic)?;
                let encoding =
                    self.instruction(span, mnemonic, instruction, operand, operand_size)?;
                *attrs = Some(InsnAttrs {
                    clocks: encoding.clocks,
                    extra_clocks: encoding.extra_clocks,
                    undocumented: encoding.undocumented,
                    unstable: encoding.unstable,
                });
            }
            StmtKind::Data { size, elements } => {
                let size = *size;
                for element in elements {
                    let (count, value_expr) = match element {
                        DataElement::Single(expr) => (1, &*expr),
                        DataElement::Rep { count, value } => {
                            (eval_defined(count, self.symtab, self.loc)?.max(0), &*value)
                        }
                    };
                    let value = eval_defined(value_expr, self.symtab, self.loc)?;
                    for _ in 0..count {
                        self.emit(value)?;
                        if size == DataSize::Word {
                            self.emit(value >> 8)?;
                        }
                    }
                    if size == DataSize::Byte {
                        self.check_byte(span, value);
                    }
                }
            }
            StmtKind::Space { size, count } => {
                let count = eval_defined(count, self.symtab, self.loc)?;
                if count < 0 {
                    return Err(AsmError::SpaceCountNegative { count });
                }
                // Reserved cells stay unwritten; only the counter moves.
                self.set_loc(i64::from(self.loc) + count * i64::from(size.bytes()))?;
            }
            StmtKind::Ascii {
                text,
                nul_terminated,
            } => {
                for byte in text.bytes() {
                    self.emit(i64::from(byte))?;
                }
                if *nul_terminated {
                    self.emit(0)?;
                }
            }
            StmtKind::Noop => {}
        }

        Ok(())
    }

    fn instruction(
        &mut self,
        span: Span,
        mnemonic: &str,
        instruction: &Instruction,
        operand: &Operand,
        operand_size: &mut Option<DataSize>,
    ) -> Result<Encoding, AsmError> {
        let require = |mode: OpMode| -> Result<Encoding, AsmError> {
            instruction
                .encoding(mode)
                .copied()
                .ok_or_else(|| AsmError::NoSuchAddressingMode {
                    mnemonic: mnemonic.to_ascii_uppercase(),
                    mode: mode.describe(),
                })
        };

        match operand {
            Operand::Implied => {
                let encoding = require(OpMode::Implied)?;
                self.emit(i64::from(encoding.opcode))?;
                Ok(encoding)
            }
            Operand::Accumulator => {
                let encoding = require(OpMode::Accumulator)?;
                self.emit(i64::from(encoding.opcode))?;
                Ok(encoding)
            }
            Operand::Immediate(expr) => {
                let encoding = require(OpMode::Immediate)?;
                let value = eval_defined(expr, self.symtab, self.loc)?;
                self.emit(i64::from(encoding.opcode))?;
                self.emit(value)?;
                self.check_byte(span, value);
                Ok(encoding)
            }
            Operand::Direct { expr, index: None } => {
                let value = eval_defined(expr, self.symtab, self.loc)?;

                if let Some(encoding) = instruction.encoding(OpMode::Relative).copied() {
                    let delta = value - (i64::from(self.loc) + 2);
                    if !(-128..=127).contains(&delta) {
                        return Err(AsmError::RelativeBranchOutOfRange { delta });
                    }
                    self.emit(i64::from(encoding.opcode))?;
                    self.emit(delta)?;
                    return Ok(encoding);
                }

                if *operand_size == Some(DataSize::Byte) {
                    let encoding = require(OpMode::ZeroPage)?;
                    debug_assert!(
                        (0..=0xFF).contains(&value),
                        "pass 1 byte sizing must still hold in pass 2"
                    );
                    self.emit(i64::from(encoding.opcode))?;
                    self.emit(value)?;
                    return Ok(encoding);
                }

                let encoding = require(OpMode::Absolute)?;
                self.emit(i64::from(encoding.opcode))?;
                self.emit(value)?;
                self.emit(value >> 8)?;
                Ok(encoding)
            }
            Operand::Direct {
                expr,
                index: Some(index),
            } => {
                let value = eval_defined(expr, self.symtab, self.loc)?;
                let (zero_page_mode, absolute_mode) = match index {
                    IndexRegister::X => (OpMode::ZeroPageX, OpMode::AbsoluteX),
                    IndexRegister::Y => (OpMode::ZeroPageY, OpMode::AbsoluteY),
                };

                let mut size = operand_size.unwrap_or(DataSize::Word);
                let encoding = if size == DataSize::Byte {
                    let encoding = require(zero_page_mode)?;
                    debug_assert!(
                        (0..=0xFF).contains(&value),
                        "pass 1 byte sizing must still hold in pass 2"
                    );
                    encoding
                } else if let Some(encoding) = instruction.encoding(absolute_mode).copied() {
                    encoding
                } else {
                    // A few opcodes have a zero-page-indexed form with no
                    // absolute-indexed counterpart (STX zp,Y; STY zp,X).
                    let encoding = require(zero_page_mode)?;
                    if !(-127..=255).contains(&value) {
                        return Err(AsmError::NoAbsoluteIndexedMode {
                            mnemonic: mnemonic.to_ascii_uppercase(),
                            mode: absolute_mode.describe(),
                        });
                    }
                    size = DataSize::Byte;
                    *operand_size = Some(DataSize::Byte);
                    encoding
                };

                self.emit(i64::from(encoding.opcode))?;
                self.emit(value)?;
                if size == DataSize::Word {
                    self.emit(value >> 8)?;
                }
                Ok(encoding)
            }
            Operand::Indirect { expr, index: None } => {
                let encoding = require(OpMode::Indirect)?;
                let value = eval_defined(expr, self.symtab, self.loc)?;
                self.emit(i64::from(encoding.opcode))?;
                self.emit(value)?;
                self.emit(value >> 8)?;
                Ok(encoding)
            }
            Operand::Indirect {
                expr,
                index: Some(index),
            } => {
                let mode = match index {
                    IndexRegister::X => OpMode::IndirectX,
                    IndexRegister::Y => OpMode::IndirectY,
                };
                let encoding = require(mode)?;
                let value = eval_defined(expr, self.symtab, self.loc)?;
                self.emit(i64::from(encoding.opcode))?;
                self.emit(value)?;
                if !(0..=0xFF).contains(&value) {
                    return Err(AsmError::AddressNotZeroPage { value });
                }
                Ok(encoding)
            }
        }
    }

    /// Write the low byte of `value` at the location counter and advance.
    /// A write may land on $FFFF and leave the counter at $10000; anything
    /// past that is an overflow.
    fn emit(&mut self, value: i64) -> Result<(), AsmError> {
        if self.loc > 0xFFFF {
            return Err(AsmError::AddressOverflow);
        }
        self.image.set(self.loc, (value & 0xFF) as u8);
        self.loc += 1;
        Ok(())
    }

    fn check_byte(&mut self, span: Span, value: i64) {
        if !(-128..=255).contains(&value) {
            self.diagnostics.push(Diagnostic::warning(
                span,
                format!("operand value {value} should fit in one byte; truncated"),
            ));
        }
    }

    fn set_loc(&mut self, value: i64) -> Result<(), AsmError> {
        if !(0..=0x10000).contains(&value) {
            return Err(AsmError::LocOutOfRange { value });
        }
        self.loc = value as u32;
        Ok(())
    }
}
