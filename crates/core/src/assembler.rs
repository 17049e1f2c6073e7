use a65_isa6502::OpcodeMap;

use crate::ast::Statement;
use crate::diag::Diagnostic;
use crate::image::Image;
use crate::parser::parse;
use crate::pass1::Pass1;
use crate::pass2::Pass2;
use crate::span::SourceFile;
use crate::symtab::SymbolTable;

/// Everything one assembly run produces. Diagnostics are always present;
/// callers gate the object file on `errors() == 0` and may still write the
/// listing when errors occurred.
#[derive(Debug)]
pub struct Assembly {
    pub source: SourceFile,
    pub statements: Vec<Statement>,
    pub symbols: SymbolTable,
    pub image: Image,
    diagnostics: Vec<Diagnostic>,
}

impl Assembly {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics re-sorted stably by source line for human display:
    /// entries from earlier stages stay first on equal lines.
    pub fn messages(&self) -> Vec<&Diagnostic> {
        let mut messages: Vec<&Diagnostic> = self.diagnostics.iter().collect();
        messages.sort_by_key(|diag| self.source.line_of(diag.span));
        messages
    }

    pub fn errors(&self) -> usize {
        self.diagnostics.iter().filter(|diag| diag.is_error()).count()
    }

    pub fn warnings(&self) -> usize {
        self.diagnostics.iter().filter(|diag| !diag.is_error()).count()
    }
}

/// The assembler itself: the opcode table is built once and shared by
/// every run; all per-run state lives in the returned `Assembly`.
#[derive(Debug, Default)]
pub struct Assembler {
    opcodes: OpcodeMap,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            opcodes: OpcodeMap::new(),
        }
    }

    pub fn opcodes(&self) -> &OpcodeMap {
        &self.opcodes
    }

    pub fn assemble(&self, source_name: &str, source_text: &str) -> Assembly {
        let source = SourceFile::new(source_name, source_text);
        let (mut statements, mut diagnostics) = parse(&source);

        let mut symbols = SymbolTable::new();
        let mut image = Image::new();

        diagnostics.extend(Pass1::new(&mut symbols, &self.opcodes).run(&mut statements));

        // Pass 2 only runs on a clean pass 1: its encodings trust the
        // sizes and symbol values pass 1 established.
        if diagnostics.iter().all(|diag| !diag.is_error()) {
            diagnostics
                .extend(Pass2::new(&mut symbols, &self.opcodes, &mut image).run(&mut statements));
        }

        Assembly {
            source,
            statements,
            symbols,
            image,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_source_assembles_with_no_diagnostics() {
        let assembler = Assembler::new();
        let assembly = assembler.assemble("s1.asm", "      ORG $F000\n      SEI\n      CLD\n");
        assert_eq!(assembly.errors(), 0);
        assert_eq!(assembly.warnings(), 0);
        assert_eq!(assembly.image.get(0xF000), Some(0x78));
        assert_eq!(assembly.image.get(0xF001), Some(0xD8));
    }

    #[test]
    fn pass1_errors_suppress_pass2_and_leave_image_empty() {
        let assembler = Assembler::new();
        let assembly = assembler.assemble("bad.asm", "      ORG MISSING\n      SEI\n");
        assert_eq!(assembly.errors(), 1);
        assert_eq!(assembly.image.written_len(), 0);
    }

    #[test]
    fn emitted_lengths_match_written_cells_plus_space() {
        let assembler = Assembler::new();
        let assembly = assembler.assemble(
            "p1.asm",
            "      ORG $1000\n      LDA #1\nBUF:  BYTES 3\n      BYTE 5, 6\n",
        );
        assert_eq!(assembly.errors(), 0);
        let total: u32 = assembly
            .statements
            .iter()
            .map(Statement::length)
            .sum();
        let space = 3;
        assert_eq!(total as usize, assembly.image.written_len() + space);
    }

    #[test]
    fn labels_and_sets_agree_with_the_symbol_table() {
        let assembler = Assembler::new();
        let assembly = assembler.assemble(
            "p2.asm",
            "      ORG $1000\nTOP:  NOP\n      SET SIZE = 3 * 4\n",
        );
        assert_eq!(assembly.errors(), 0);
        assert_eq!(assembly.symbols.lookup("TOP").value, 0x1000);
        assert_eq!(assembly.symbols.lookup("SIZE").value, 12);
    }

    #[test]
    fn reordering_independent_sets_keeps_the_image() {
        let assembler = Assembler::new();
        let first = assembler.assemble(
            "a.asm",
            "      SET A1 = 1\n      SET B1 = 2\n      BYTE A1, B1\n",
        );
        let second = assembler.assemble(
            "b.asm",
            "      SET B1 = 2\n      SET A1 = 1\n      BYTE A1, B1\n",
        );
        assert_eq!(first.errors(), 0);
        assert_eq!(second.errors(), 0);
        assert_eq!(first.image, second.image);
    }

    #[test]
    fn forward_and_backward_absolute_references_assemble_identically() {
        let assembler = Assembler::new();
        let forward = assembler.assemble(
            "fwd.asm",
            "      ORG $1000\n      LDA TARGET\n      SET TARGET = $1234\n",
        );
        let backward = assembler.assemble(
            "bwd.asm",
            "      SET TARGET = $1234\n      ORG $1000\n      LDA TARGET\n",
        );
        assert_eq!(forward.errors(), 0);
        assert_eq!(backward.errors(), 0);
        assert_eq!(forward.image, backward.image);
    }

    #[test]
    fn messages_sort_stably_by_line() {
        let assembler = Assembler::new();
        let assembly = assembler.assemble(
            "m.asm",
            "      FROB\n      NOP\n      GLORP\n",
        );
        let lines: Vec<usize> = assembly
            .messages()
            .iter()
            .map(|diag| assembly.source.line_of(diag.span))
            .collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn instruction_bytes_start_with_the_selected_opcode() {
        let assembler = Assembler::new();
        let assembly = assembler.assemble(
            "p3.asm",
            "      ORG $1000\n      LDA #1\n      STA $0200\n      JMP [$1234]\n",
        );
        assert_eq!(assembly.errors(), 0);
        let expected = [0xA9, 0x8D, 0x6C];
        let instructions: Vec<&Statement> = assembly
            .statements
            .iter()
            .filter(|stmt| stmt.length() > 0 && stmt.loc >= 0x1000)
            .collect();
        for (statement, opcode) in instructions.iter().zip(expected) {
            assert_eq!(assembly.image.get(statement.loc), Some(opcode));
        }
    }
}
