use a65_isa6502::{OpMode, OpcodeMap};

use crate::ast::{DataElement, DataSize, Expr, IndexRegister, Operand, Statement, StmtKind};
use crate::diag::Diagnostic;
use crate::error::AsmError;
use crate::eval::{ExprResult, eval};
use crate::symtab::SymbolTable;

/// Pass 1 walks the statement list once: it assigns each statement its
/// location, defines labels, decides operand sizes, and advances the
/// location counter. No bytes are emitted.
pub struct Pass1<'a> {
    symtab: &'a mut SymbolTable,
    opcodes: &'a OpcodeMap,
    loc: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Pass1<'a> {
    pub fn new(symtab: &'a mut SymbolTable, opcodes: &'a OpcodeMap) -> Self {
        Self {
            symtab,
            opcodes,
            loc: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn run(mut self, statements: &mut [Statement]) -> Vec<Diagnostic> {
        for statement in statements {
            statement.loc = self.loc;
            if let Err(error) = self.statement(statement) {
                self.diagnostics
                    .push(Diagnostic::error(statement.span, error.to_string()));
            }
        }
        self.diagnostics
    }

    fn statement(&mut self, statement: &mut Statement) -> Result<(), AsmError> {
        if let Some(label) = &statement.label {
            self.symtab.set_value(label, i64::from(self.loc))?;
        }

        let span = statement.span;
        match &mut statement.kind {
            StmtKind::Org { expr, resolved } => {
                match eval(expr, self.symtab, self.loc)? {
                    ExprResult::Defined(value) => {
                        *resolved = Some(value);
                        self.set_loc(value)?;
                    }
                    ExprResult::Undefined(symbols) => {
                        return Err(AsmError::OrgUndefined(symbols));
                    }
                }
            }
            StmtKind::Set { name, expr } => {
                // Undefined here is fine; the symbol may resolve later.
                if let ExprResult::Defined(value) = eval(expr, self.symtab, self.loc)? {
                    self.symtab.set_value(name, value)?;
                }
            }
            StmtKind::Instruction {
                mnemonic,
                operand,
                operand_size,
                ..
            } => {
                if let Some(Expr::Group(_)) = operand.expr() {
                    self.diagnostics.push(Diagnostic::warning(
                        span,
                        "operand expression is parenthesized; \
                         did you mean brackets for indirect addressing?",
                    ));
                }

                let opcodes = self.opcodes;
                let instruction = opcodes.lookup(mnemonic)?;

                let length = match operand {
                    Operand::Implied | Operand::Accumulator => 1,
                    Operand::Immediate(_) => 2,
                    Operand::Indirect { index: None, .. } => 3,
                    Operand::Indirect { index: Some(_), .. } => 2,
                    Operand::Direct { expr, index } => {
                        if index.is_none() && instruction.has_encoding(OpMode::Relative) {
                            // Relative branch: always a one-byte operand.
                            *operand_size = Some(DataSize::Byte);
                            2
                        } else {
                            let zero_page_mode = match index {
                                None => OpMode::ZeroPage,
                                Some(IndexRegister::X) => OpMode::ZeroPageX,
                                Some(IndexRegister::Y) => OpMode::ZeroPageY,
                            };

                            // Zero page needs an encoding and an operand
                            // already known to fit in one byte. A forward
                            // reference therefore gets the absolute form.
                            let mut size = DataSize::Word;
                            if instruction.has_encoding(zero_page_mode) {
                                if let ExprResult::Defined(value) =
                                    eval(expr, self.symtab, self.loc)?
                                {
                                    if (0..=0xFF).contains(&value) {
                                        size = DataSize::Byte;
                                    }
                                }
                            }
                            *operand_size = Some(size);
                            1 + size.bytes()
                        }
                    }
                };
                self.advance(length)?;
            }
            StmtKind::Data { size, elements } => {
                let mut count: i64 = 0;
                for element in elements {
                    match element {
                        DataElement::Single(_) => count += 1,
                        DataElement::Rep {
                            count: count_expr, ..
                        } => match eval(count_expr, self.symtab, self.loc)? {
                            ExprResult::Defined(n) if n >= 1 => count += n,
                            ExprResult::Defined(n) => self.diagnostics.push(Diagnostic::error(
                                span,
                                AsmError::RepCountNonPositive { count: n }.to_string(),
                            )),
                            ExprResult::Undefined(symbols) => {
                                self.diagnostics.push(Diagnostic::error(
                                    span,
                                    AsmError::RepCountUndefined(symbols).to_string(),
                                ));
                            }
                        },
                    }
                }
                self.set_loc(i64::from(self.loc) + count * i64::from(size.bytes()))?;
            }
            StmtKind::Space { size, count } => {
                let count = match eval(count, self.symtab, self.loc)? {
                    ExprResult::Defined(value) => value,
                    ExprResult::Undefined(symbols) => {
                        return Err(AsmError::SpaceUndefined(symbols));
                    }
                };
                if count < 0 {
                    return Err(AsmError::SpaceCountNegative { count });
                }
                self.set_loc(i64::from(self.loc) + count * i64::from(size.bytes()))?;
            }
            StmtKind::Ascii {
                text,
                nul_terminated,
            } => {
                let length = text.len() as u32 + u32::from(*nul_terminated);
                self.advance(length)?;
            }
            StmtKind::Noop => {}
        }

        Ok(())
    }

    fn advance(&mut self, bytes: u32) -> Result<(), AsmError> {
        self.set_loc(i64::from(self.loc) + i64::from(bytes))
    }

    // The counter may sit one past the end of memory: that is where it
    // lands after a byte is placed at $FFFF.
    fn set_loc(&mut self, value: i64) -> Result<(), AsmError> {
        if !(0..=0x10000).contains(&value) {
            return Err(AsmError::LocOutOfRange { value });
        }
        self.loc = value as u32;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::span::SourceFile;

    fn run_pass1(source_text: &str) -> (Vec<Statement>, SymbolTable, Vec<Diagnostic>) {
        let source = SourceFile::new("test.asm", source_text);
        let (mut statements, diagnostics) = parse(&source);
        assert!(diagnostics.is_empty(), "parse problems: {diagnostics:?}");
        let mut symtab = SymbolTable::new();
        let opcodes = OpcodeMap::new();
        let diagnostics = Pass1::new(&mut symtab, &opcodes).run(&mut statements);
        (statements, symtab, diagnostics)
    }

    fn operand_size_of(statement: &Statement) -> Option<DataSize> {
        match &statement.kind {
            StmtKind::Instruction { operand_size, .. } => *operand_size,
            other => panic!("expected instruction, got {other:?}"),
        }
    }

    #[test]
    fn org_moves_the_location_counter() {
        let (statements, _, diagnostics) = run_pass1("      ORG $F000\n      SEI\n      CLD\n");
        assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
        assert_eq!(statements[1].loc, 0xF000);
        assert_eq!(statements[2].loc, 0xF001);
    }

    #[test]
    fn org_must_be_defined_in_pass1() {
        let (_, _, diagnostics) = run_pass1("      ORG BASE\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("'BASE'"));
    }

    #[test]
    fn labels_take_the_statement_location() {
        let (_, symtab, diagnostics) =
            run_pass1("      ORG $2000\nTOP:  NOP\nNEXT: NOP\n");
        assert!(diagnostics.is_empty());
        assert_eq!(symtab.lookup("TOP").value, 0x2000);
        assert_eq!(symtab.lookup("NEXT").value, 0x2001);
    }

    #[test]
    fn zero_page_operand_sizes_to_one_byte() {
        let (statements, _, diagnostics) = run_pass1("      LDA $42\n      LDA $1234\n");
        assert!(diagnostics.is_empty());
        assert_eq!(operand_size_of(&statements[0]), Some(DataSize::Byte));
        assert_eq!(operand_size_of(&statements[1]), Some(DataSize::Word));
        assert_eq!(statements[0].loc, 0);
        assert_eq!(statements[1].loc, 2);
    }

    #[test]
    fn forward_reference_forces_absolute() {
        let (statements, _, diagnostics) = run_pass1("      LDA FOO\n      SET FOO = $42\n");
        assert!(diagnostics.is_empty());
        assert_eq!(operand_size_of(&statements[0]), Some(DataSize::Word));
    }

    #[test]
    fn branch_instructions_always_size_one_byte_operand() {
        let (statements, _, diagnostics) = run_pass1("      BNE FAR\n      SET FAR = $1234\n");
        assert!(diagnostics.is_empty());
        assert_eq!(operand_size_of(&statements[0]), Some(DataSize::Byte));
        assert_eq!(statements[1].loc, 2);
    }

    #[test]
    fn store_without_zero_page_indexed_form_stays_absolute() {
        // STX has no absolute,y form but does have zero page,y; a value in
        // zero page still sizes to one byte.
        let (statements, _, diagnostics) = run_pass1("      STX $42,Y\n      STX $300,Y\n");
        assert!(diagnostics.is_empty());
        assert_eq!(operand_size_of(&statements[0]), Some(DataSize::Byte));
        assert_eq!(operand_size_of(&statements[1]), Some(DataSize::Word));
    }

    #[test]
    fn instruction_lengths_cover_every_mode() {
        let (statements, _, diagnostics) = run_pass1(concat!(
            "      NOP\n",
            "      LSR A\n",
            "      LDA #1\n",
            "      LDA $42\n",
            "      LDA $1234\n",
            "      JMP [$1234]\n",
            "      LDA [$10,X]\n",
            "      LDA [$10],Y\n",
            "      NOP\n",
        ));
        assert!(diagnostics.is_empty());
        let locs: Vec<u32> = statements.iter().map(|stmt| stmt.loc).collect();
        assert_eq!(locs, vec![0, 1, 2, 4, 6, 9, 12, 14, 16]);
    }

    #[test]
    fn set_with_undefined_expression_is_skipped_silently() {
        let (_, symtab, diagnostics) = run_pass1("      SET A1 = B1 + 1\n      SET B1 = 2\n");
        assert!(diagnostics.is_empty());
        assert!(!symtab.lookup("A1").defined);
        assert_eq!(symtab.lookup("B1").value, 2);
    }

    #[test]
    fn unknown_opcode_is_reported_and_assembly_continues() {
        let (statements, _, diagnostics) = run_pass1("      FROB\n      NOP\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("FROB"));
        assert_eq!(statements[1].loc, 0);
    }

    #[test]
    fn parenthesized_operand_warns() {
        let (_, _, diagnostics) = run_pass1("      LDA ($42)\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
        assert!(diagnostics[0].message.contains("brackets"));
    }

    #[test]
    fn data_sizing_counts_rep_elements() {
        let (statements, _, diagnostics) =
            run_pass1("      BYTE $01, REP(3) $FF, $02\n      WORD $ABCD\n      NOP\n");
        assert!(diagnostics.is_empty());
        assert_eq!(statements[1].loc, 5);
        assert_eq!(statements[2].loc, 7);
    }

    #[test]
    fn rep_count_must_be_defined_and_positive() {
        let (statements, _, diagnostics) =
            run_pass1("      BYTE REP(N) 1, 7\n      BYTE REP(0) 1\n      NOP\n");
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].message.contains("rep count"));
        assert!(diagnostics[1].message.contains("at least 1"));
        // The bad elements contribute nothing; the good one still counts.
        assert_eq!(statements[1].loc, 1);
        assert_eq!(statements[2].loc, 1);
    }

    #[test]
    fn space_reserves_without_emitting() {
        let (statements, symtab, diagnostics) =
            run_pass1("      ORG $5000\nBUF:  BYTES 16\n      WORDS 4\n      NOP\n");
        assert!(diagnostics.is_empty());
        assert_eq!(symtab.lookup("BUF").value, 0x5000);
        assert_eq!(statements[2].loc, 0x5010);
        assert_eq!(statements[3].loc, 0x5018);
    }

    #[test]
    fn space_count_must_be_defined() {
        let (_, _, diagnostics) = run_pass1("      BYTES N\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("space count"));
    }

    #[test]
    fn ascii_advances_by_text_length() {
        let (statements, _, diagnostics) =
            run_pass1("      ASCII \"hi\"\n      ASCIIZ \"hi\"\n      NOP\n");
        assert!(diagnostics.is_empty());
        assert_eq!(statements[1].loc, 2);
        assert_eq!(statements[2].loc, 5);
    }

    #[test]
    fn location_counter_cannot_leave_the_address_space() {
        let (_, _, diagnostics) = run_pass1("      ORG $FFFF\n      WORD 0, 0\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("location counter"));
    }
}
