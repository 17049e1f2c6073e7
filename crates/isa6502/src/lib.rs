use rustc_hash::FxHashMap;
use thiserror::Error;

/// Concrete addressing modes of the 6502 encoding table. Finer-grained
/// than the operand shapes the parser produces: zero-page and absolute
/// variants are distinct entries here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpMode {
    Accumulator,
    Immediate,
    Implied,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

const OP_MODE_COUNT: usize = 13;

impl OpMode {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Accumulator => "accumulator",
            Self::Immediate => "immediate",
            Self::Implied => "implied",
            Self::ZeroPage => "zero page",
            Self::ZeroPageX => "zero page,x",
            Self::ZeroPageY => "zero page,y",
            Self::Absolute => "absolute",
            Self::AbsoluteX => "absolute,x",
            Self::AbsoluteY => "absolute,y",
            Self::Indirect => "indirect",
            Self::IndirectX => "indirect,x",
            Self::IndirectY => "indirect,y",
            Self::Relative => "relative",
        }
    }
}

/// Operand bytes that follow the opcode byte for a given mode.
pub fn operand_width(mode: OpMode) -> usize {
    match mode {
        OpMode::Accumulator | OpMode::Implied => 0,
        OpMode::Immediate
        | OpMode::ZeroPage
        | OpMode::ZeroPageX
        | OpMode::ZeroPageY
        | OpMode::IndirectX
        | OpMode::IndirectY
        | OpMode::Relative => 1,
        OpMode::Absolute | OpMode::AbsoluteX | OpMode::AbsoluteY | OpMode::Indirect => 2,
    }
}

/// One (mnemonic, mode) encoding. `clocks` is the base cycle count;
/// `extra_clocks` marks encodings whose real cost depends on runtime
/// behavior (page crossings, branch taken), so the count is a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub opcode: u8,
    pub clocks: u32,
    pub extra_clocks: bool,
    pub undocumented: bool,
    pub unstable: bool,
}

#[derive(Debug, Clone)]
pub struct Instruction {
    mnemonic: &'static str,
    encodings: [Option<Encoding>; OP_MODE_COUNT],
}

impl Instruction {
    fn new(mnemonic: &'static str) -> Self {
        Self {
            mnemonic,
            encodings: [None; OP_MODE_COUNT],
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub fn encoding(&self, mode: OpMode) -> Option<&Encoding> {
        self.encodings[mode as usize].as_ref()
    }

    pub fn has_encoding(&self, mode: OpMode) -> bool {
        self.encodings[mode as usize].is_some()
    }
}

#[derive(Debug, Error)]
#[error("unknown opcode '{mnemonic}'")]
pub struct UnknownOpcode {
    pub mnemonic: String,
}

struct TableRow {
    mnemonic: &'static str,
    mode: OpMode,
    encoding: Encoding,
}

macro_rules! row {
    ($mnemonic:literal, $mode:ident, $opcode:literal, $clocks:literal) => {
        TableRow {
            mnemonic: $mnemonic,
            mode: OpMode::$mode,
            encoding: Encoding {
                opcode: $opcode,
                clocks: $clocks,
                extra_clocks: false,
                undocumented: false,
                unstable: false,
            },
        }
    };
    ($mnemonic:literal, $mode:ident, $opcode:literal, $clocks:literal, extra) => {
        TableRow {
            mnemonic: $mnemonic,
            mode: OpMode::$mode,
            encoding: Encoding {
                opcode: $opcode,
                clocks: $clocks,
                extra_clocks: true,
                undocumented: false,
                unstable: false,
            },
        }
    };
    ($mnemonic:literal, $mode:ident, $opcode:literal, $clocks:literal, undoc) => {
        TableRow {
            mnemonic: $mnemonic,
            mode: OpMode::$mode,
            encoding: Encoding {
                opcode: $opcode,
                clocks: $clocks,
                extra_clocks: false,
                undocumented: true,
                unstable: false,
            },
        }
    };
    ($mnemonic:literal, $mode:ident, $opcode:literal, $clocks:literal, undoc, extra) => {
        TableRow {
            mnemonic: $mnemonic,
            mode: OpMode::$mode,
            encoding: Encoding {
                opcode: $opcode,
                clocks: $clocks,
                extra_clocks: true,
                undocumented: true,
                unstable: false,
            },
        }
    };
    ($mnemonic:literal, $mode:ident, $opcode:literal, $clocks:literal, unstable) => {
        TableRow {
            mnemonic: $mnemonic,
            mode: OpMode::$mode,
            encoding: Encoding {
                opcode: $opcode,
                clocks: $clocks,
                extra_clocks: false,
                undocumented: true,
                unstable: true,
            },
        }
    };
}

const TABLE: &[TableRow] = &[
    row!("ADC", Immediate, 0x69, 2),
    row!("ADC", ZeroPage, 0x65, 3),
    row!("ADC", ZeroPageX, 0x75, 4),
    row!("ADC", Absolute, 0x6D, 4),
    row!("ADC", AbsoluteX, 0x7D, 4, extra),
    row!("ADC", AbsoluteY, 0x79, 4, extra),
    row!("ADC", IndirectX, 0x61, 6),
    row!("ADC", IndirectY, 0x71, 5, extra),
    row!("AND", Immediate, 0x29, 2),
    row!("AND", ZeroPage, 0x25, 3),
    row!("AND", ZeroPageX, 0x35, 4),
    row!("AND", Absolute, 0x2D, 4),
    row!("AND", AbsoluteX, 0x3D, 4, extra),
    row!("AND", AbsoluteY, 0x39, 4, extra),
    row!("AND", IndirectX, 0x21, 6),
    row!("AND", IndirectY, 0x31, 5, extra),
    row!("ASL", Accumulator, 0x0A, 2),
    row!("ASL", ZeroPage, 0x06, 5),
    row!("ASL", ZeroPageX, 0x16, 6),
    row!("ASL", Absolute, 0x0E, 6),
    row!("ASL", AbsoluteX, 0x1E, 7),
    row!("BCC", Relative, 0x90, 2, extra),
    row!("BCS", Relative, 0xB0, 2, extra),
    row!("BEQ", Relative, 0xF0, 2, extra),
    row!("BIT", ZeroPage, 0x24, 3),
    row!("BIT", Absolute, 0x2C, 4),
    row!("BMI", Relative, 0x30, 2, extra),
    row!("BNE", Relative, 0xD0, 2, extra),
    row!("BPL", Relative, 0x10, 2, extra),
    row!("BRK", Implied, 0x00, 7),
    row!("BVC", Relative, 0x50, 2, extra),
    row!("BVS", Relative, 0x70, 2, extra),
    row!("CLC", Implied, 0x18, 2),
    row!("CLD", Implied, 0xD8, 2),
    row!("CLI", Implied, 0x58, 2),
    row!("CLV", Implied, 0xB8, 2),
    row!("CMP", Immediate, 0xC9, 2),
    row!("CMP", ZeroPage, 0xC5, 3),
    row!("CMP", ZeroPageX, 0xD5, 4),
    row!("CMP", Absolute, 0xCD, 4),
    row!("CMP", AbsoluteX, 0xDD, 4, extra),
    row!("CMP", AbsoluteY, 0xD9, 4, extra),
    row!("CMP", IndirectX, 0xC1, 6),
    row!("CMP", IndirectY, 0xD1, 5, extra),
    row!("CPX", Immediate, 0xE0, 2),
    row!("CPX", ZeroPage, 0xE4, 3),
    row!("CPX", Absolute, 0xEC, 4),
    row!("CPY", Immediate, 0xC0, 2),
    row!("CPY", ZeroPage, 0xC4, 3),
    row!("CPY", Absolute, 0xCC, 4),
    row!("DEC", ZeroPage, 0xC6, 5),
    row!("DEC", ZeroPageX, 0xD6, 6),
    row!("DEC", Absolute, 0xCE, 6),
    row!("DEC", AbsoluteX, 0xDE, 7),
    row!("DEX", Implied, 0xCA, 2),
    row!("DEY", Implied, 0x88, 2),
    row!("EOR", Immediate, 0x49, 2),
    row!("EOR", ZeroPage, 0x45, 3),
    row!("EOR", ZeroPageX, 0x55, 4),
    row!("EOR", Absolute, 0x4D, 4),
    row!("EOR", AbsoluteX, 0x5D, 4, extra),
    row!("EOR", AbsoluteY, 0x59, 4, extra),
    row!("EOR", IndirectX, 0x41, 6),
    row!("EOR", IndirectY, 0x51, 5, extra),
    row!("INC", ZeroPage, 0xE6, 5),
    row!("INC", ZeroPageX, 0xF6, 6),
    row!("INC", Absolute, 0xEE, 6),
    row!("INC", AbsoluteX, 0xFE, 7),
    row!("INX", Implied, 0xE8, 2),
    row!("INY", Implied, 0xC8, 2),
    row!("JMP", Absolute, 0x4C, 3),
    row!("JMP", Indirect, 0x6C, 5),
    row!("JSR", Absolute, 0x20, 6),
    row!("LDA", Immediate, 0xA9, 2),
    row!("LDA", ZeroPage, 0xA5, 3),
    row!("LDA", ZeroPageX, 0xB5, 4),
    row!("LDA", Absolute, 0xAD, 4),
    row!("LDA", AbsoluteX, 0xBD, 4, extra),
    row!("LDA", AbsoluteY, 0xB9, 4, extra),
    row!("LDA", IndirectX, 0xA1, 6),
    row!("LDA", IndirectY, 0xB1, 5, extra),
    row!("LDX", Immediate, 0xA2, 2),
    row!("LDX", ZeroPage, 0xA6, 3),
    row!("LDX", ZeroPageY, 0xB6, 4),
    row!("LDX", Absolute, 0xAE, 4),
    row!("LDX", AbsoluteY, 0xBE, 4, extra),
    row!("LDY", Immediate, 0xA0, 2),
    row!("LDY", ZeroPage, 0xA4, 3),
    row!("LDY", ZeroPageX, 0xB4, 4),
    row!("LDY", Absolute, 0xAC, 4),
    row!("LDY", AbsoluteX, 0xBC, 4, extra),
    row!("LSR", Accumulator, 0x4A, 2),
    row!("LSR", ZeroPage, 0x46, 5),
    row!("LSR", ZeroPageX, 0x56, 6),
    row!("LSR", Absolute, 0x4E, 6),
    row!("LSR", AbsoluteX, 0x5E, 7),
    row!("NOP", Implied, 0xEA, 2),
    row!("NOP", Immediate, 0x80, 2, undoc),
    row!("NOP", ZeroPage, 0x04, 3, undoc),
    row!("NOP", ZeroPageX, 0x14, 4, undoc),
    row!("NOP", Absolute, 0x0C, 4, undoc),
    row!("NOP", AbsoluteX, 0x1C, 4, undoc, extra),
    row!("ORA", Immediate, 0x09, 2),
    row!("ORA", ZeroPage, 0x05, 3),
    row!("ORA", ZeroPageX, 0x15, 4),
    row!("ORA", Absolute, 0x0D, 4),
    row!("ORA", AbsoluteX, 0x1D, 4, extra),
    row!("ORA", AbsoluteY, 0x19, 4, extra),
    row!("ORA", IndirectX, 0x01, 6),
    row!("ORA", IndirectY, 0x11, 5, extra),
    row!("PHA", Implied, 0x48, 3),
    row!("PHP", Implied, 0x08, 3),
    row!("PLA", Implied, 0x68, 4),
    row!("PLP", Implied, 0x28, 4),
    row!("ROL", Accumulator, 0x2A, 2),
    row!("ROL", ZeroPage, 0x26, 5),
    row!("ROL", ZeroPageX, 0x36, 6),
    row!("ROL", Absolute, 0x2E, 6),
    row!("ROL", AbsoluteX, 0x3E, 7),
    row!("ROR", Accumulator, 0x6A, 2),
    row!("ROR", ZeroPage, 0x66, 5),
    row!("ROR", ZeroPageX, 0x76, 6),
    row!("ROR", Absolute, 0x6E, 6),
    row!("ROR", AbsoluteX, 0x7E, 7),
    row!("RTI", Implied, 0x40, 6),
    row!("RTS", Implied, 0x60, 6),
    row!("SBC", Immediate, 0xE9, 2),
    row!("SBC", ZeroPage, 0xE5, 3),
    row!("SBC", ZeroPageX, 0xF5, 4),
    row!("SBC", Absolute, 0xED, 4),
    row!("SBC", AbsoluteX, 0xFD, 4, extra),
    row!("SBC", AbsoluteY, 0xF9, 4, extra),
    row!("SBC", IndirectX, 0xE1, 6),
    row!("SBC", IndirectY, 0xF1, 5, extra),
    row!("SEC", Implied, 0x38, 2),
    row!("SED", Implied, 0xF8, 2),
    row!("SEI", Implied, 0x78, 2),
    row!("STA", ZeroPage, 0x85, 3),
    row!("STA", ZeroPageX, 0x95, 4),
    row!("STA", Absolute, 0x8D, 4),
    row!("STA", AbsoluteX, 0x9D, 5),
    row!("STA", AbsoluteY, 0x99, 5),
    row!("STA", IndirectX, 0x81, 6),
    row!("STA", IndirectY, 0x91, 6),
    row!("STX", ZeroPage, 0x86, 3),
    row!("STX", ZeroPageY, 0x96, 4),
    row!("STX", Absolute, 0x8E, 4),
    row!("STY", ZeroPage, 0x84, 3),
    row!("STY", ZeroPageX, 0x94, 4),
    row!("STY", Absolute, 0x8C, 4),
    row!("TAX", Implied, 0xAA, 2),
    row!("TAY", Implied, 0xA8, 2),
    row!("TSX", Implied, 0xBA, 2),
    row!("TXA", Implied, 0x8A, 2),
    row!("TXS", Implied, 0x9A, 2),
    row!("TYA", Implied, 0x98, 2),
    // Undocumented opcodes. Consistently executed by NMOS silicon even
    // though they never appeared in the official manual.
    row!("SLO", ZeroPage, 0x07, 5, undoc),
    row!("SLO", ZeroPageX, 0x17, 6, undoc),
    row!("SLO", Absolute, 0x0F, 6, undoc),
    row!("SLO", AbsoluteX, 0x1F, 7, undoc),
    row!("SLO", AbsoluteY, 0x1B, 7, undoc),
    row!("SLO", IndirectX, 0x03, 8, undoc),
    row!("SLO", IndirectY, 0x13, 8, undoc),
    row!("RLA", ZeroPage, 0x27, 5, undoc),
    row!("RLA", ZeroPageX, 0x37, 6, undoc),
    row!("RLA", Absolute, 0x2F, 6, undoc),
    row!("RLA", AbsoluteX, 0x3F, 7, undoc),
    row!("RLA", AbsoluteY, 0x3B, 7, undoc),
    row!("RLA", IndirectX, 0x23, 8, undoc),
    row!("RLA", IndirectY, 0x33, 8, undoc),
    row!("SRE", ZeroPage, 0x47, 5, undoc),
    row!("SRE", ZeroPageX, 0x57, 6, undoc),
    row!("SRE", Absolute, 0x4F, 6, undoc),
    row!("SRE", AbsoluteX, 0x5F, 7, undoc),
    row!("SRE", AbsoluteY, 0x5B, 7, undoc),
    row!("SRE", IndirectX, 0x43, 8, undoc),
    row!("SRE", IndirectY, 0x53, 8, undoc),
    row!("RRA", ZeroPage, 0x67, 5, undoc),
    row!("RRA", ZeroPageX, 0x77, 6, undoc),
    row!("RRA", Absolute, 0x6F, 6, undoc),
    row!("RRA", AbsoluteX, 0x7F, 7, undoc),
    row!("RRA", AbsoluteY, 0x7B, 7, undoc),
    row!("RRA", IndirectX, 0x63, 8, undoc),
    row!("RRA", IndirectY, 0x73, 8, undoc),
    row!("SAX", ZeroPage, 0x87, 3, undoc),
    row!("SAX", ZeroPageY, 0x97, 4, undoc),
    row!("SAX", Absolute, 0x8F, 4, undoc),
    row!("SAX", IndirectX, 0x83, 6, undoc),
    row!("LAX", Immediate, 0xAB, 2, unstable),
    row!("LAX", ZeroPage, 0xA7, 3, undoc),
    row!("LAX", ZeroPageY, 0xB7, 4, undoc),
    row!("LAX", Absolute, 0xAF, 4, undoc),
    row!("LAX", AbsoluteY, 0xBF, 4, undoc, extra),
    row!("LAX", IndirectX, 0xA3, 6, undoc),
    row!("LAX", IndirectY, 0xB3, 5, undoc, extra),
    row!("DCP", ZeroPage, 0xC7, 5, undoc),
    row!("DCP", ZeroPageX, 0xD7, 6, undoc),
    row!("DCP", Absolute, 0xCF, 6, undoc),
    row!("DCP", AbsoluteX, 0xDF, 7, undoc),
    row!("DCP", AbsoluteY, 0xDB, 7, undoc),
    row!("DCP", IndirectX, 0xC3, 8, undoc),
    row!("DCP", IndirectY, 0xD3, 8, undoc),
    row!("ISC", ZeroPage, 0xE7, 5, undoc),
    row!("ISC", ZeroPageX, 0xF7, 6, undoc),
    row!("ISC", Absolute, 0xEF, 6, undoc),
    row!("ISC", AbsoluteX, 0xFF, 7, undoc),
    row!("ISC", AbsoluteY, 0xFB, 7, undoc),
    row!("ISC", IndirectX, 0xE3, 8, undoc),
    row!("ISC", IndirectY, 0xF3, 8, undoc),
    row!("ANC", Immediate, 0x0B, 2, undoc),
    row!("ALR", Immediate, 0x4B, 2, undoc),
    row!("ARR", Immediate, 0x6B, 2, undoc),
    row!("XAA", Immediate, 0x8B, 2, unstable),
    row!("AXS", Immediate, 0xCB, 2, undoc),
    row!("AHX", AbsoluteY, 0x9F, 5, unstable),
    row!("AHX", IndirectY, 0x93, 6, unstable),
    row!("SHX", AbsoluteY, 0x9E, 5, unstable),
    row!("SHY", AbsoluteX, 0x9C, 5, unstable),
    row!("TAS", AbsoluteY, 0x9B, 5, unstable),
    row!("LAS", AbsoluteY, 0xBB, 4, undoc, extra),
];

/// The assembled mnemonic table. Built once per assembler and read-only
/// afterwards.
#[derive(Debug)]
pub struct OpcodeMap {
    instructions: FxHashMap<&'static str, Instruction>,
}

impl OpcodeMap {
    pub fn new() -> Self {
        let mut instructions: FxHashMap<&'static str, Instruction> = FxHashMap::default();
        for table_row in TABLE {
            let instruction = instructions
                .entry(table_row.mnemonic)
                .or_insert_with(|| Instruction::new(table_row.mnemonic));
            let slot = &mut instruction.encodings[table_row.mode as usize];
            assert!(
                slot.is_none(),
                "duplicate table row for {} {:?}",
                table_row.mnemonic,
                table_row.mode
            );
            *slot = Some(table_row.encoding);
        }

        // Every instruction with a zero-page form must also have an
        // absolute form; pass 1's sizing decision depends on it.
        for instruction in instructions.values() {
            if instruction.has_encoding(OpMode::ZeroPage) {
                assert!(
                    instruction.has_encoding(OpMode::Absolute),
                    "{} has a zero-page form but no absolute form",
                    instruction.mnemonic
                );
            }
        }

        Self { instructions }
    }

    pub fn lookup(&self, mnemonic: &str) -> Result<&Instruction, UnknownOpcode> {
        let upper = mnemonic.to_ascii_uppercase();
        self.instructions
            .get(upper.as_str())
            .ok_or_else(|| UnknownOpcode {
                mnemonic: mnemonic.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl Default for OpcodeMap {
    fn default() -> Self {
        Self::new()
    }
}
