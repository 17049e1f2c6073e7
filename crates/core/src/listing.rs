use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use crate::assembler::Assembly;
use crate::ast::{
    BinaryOp, DataElement, DataSize, Expr, IndexRegister, NumFmt, Operand, Statement, StmtKind,
    UnaryOp,
};
use crate::diag::Severity;
use crate::image::Image;

/// Listing layout width; symbol-table columns are packed to fit.
const COLUMNS: usize = 132;

/// Encoded bytes shown on one listing line before continuation lines.
const MAX_BYTES: usize = 5;

pub fn write_listing(path: &Path, assembly: &Assembly) -> io::Result<()> {
    fs::write(path, format_listing(assembly))
}

/// The annotated program, then the errors-and-warnings block, then the
/// symbol table dumped twice: by name and by value.
pub fn format_listing(assembly: &Assembly) -> String {
    let mut out = String::new();

    let mut last = 0;
    for statement in &assembly.statements {
        // Blank source lines carry no statement; restore them from the
        // line-number gaps.
        for missing in last + 1..statement.line {
            let _ = writeln!(out, "{missing:5}");
        }
        for line in statement_lines(statement, &assembly.image) {
            let _ = writeln!(out, "{line}");
        }
        last = statement.line;
    }

    let messages = assembly.messages();
    if !messages.is_empty() {
        let _ = writeln!(out, "\nErrors and Warnings");
        for diag in messages {
            let line = assembly.source.line_of(diag.span);
            let severity = match diag.severity {
                Severity::Error => "Error  ",
                Severity::Warning => "Warning",
            };
            let _ = writeln!(out, "{line:5}  {severity}  {}", diag.message);
        }
    }

    let mut symbols: Vec<(String, i64)> = assembly
        .symbols
        .iter()
        .map(|(name, symbol)| (name.to_string(), symbol.value))
        .collect();

    symbols.sort_by(|left, right| left.0.cmp(&right.0));
    let _ = writeln!(out, "\nSymbol table by name\n");
    write_symbols(&mut out, &symbols);

    symbols.sort_by_key(|(_, value)| *value);
    let _ = writeln!(out, "\n\nSymbol table by value\n");
    write_symbols(&mut out, &symbols);

    out
}

fn write_symbols(out: &mut String, symbols: &[(String, i64)]) {
    let max_len = symbols.iter().map(|(name, _)| name.len()).max().unwrap_or(1);
    let per_line = (COLUMNS / (max_len + 8)).max(1);

    let mut column = 0;
    for (name, value) in symbols {
        let _ = write!(out, "{name:>max_len$} {}", format_value(*value));
        column += 1;
        if column == per_line {
            out.push('\n');
            column = 0;
        } else {
            out.push_str("  ");
        }
    }
    if column != 0 {
        out.push('\n');
    }
}

fn format_value(value: i64) -> String {
    if (0..=0xFFFF).contains(&value) {
        format!("${value:04X}")
    } else {
        format!("{value}")
    }
}

fn statement_lines(statement: &Statement, image: &Image) -> Vec<String> {
    let mut lines = Vec::new();
    let length = statement.length() as usize;

    let mut line = String::new();
    let _ = write!(line, "{:5} {:04X}  ", statement.line, statement.loc);
    for i in 0..MAX_BYTES {
        if i < length {
            match image.get(statement.loc + i as u32) {
                Some(byte) => {
                    let _ = write!(line, "{byte:02X} ");
                }
                None => line.push_str("   "),
            }
        } else {
            line.push_str("   ");
        }
    }

    let _ = write!(line, "{:>8} ", attributes(statement));
    match &statement.label {
        Some(label) => {
            let _ = write!(line, "{:<9}", format!("{label}:"));
        }
        None => line.push_str("         "),
    }
    let _ = write!(line, "  {:<20}", render_statement(&statement.kind));
    if let Some(comment) = &statement.comment {
        line.push_str(comment);
    }
    lines.push(line.trim_end().to_string());

    // Statements longer than one row continue with just line number,
    // address, and bytes. Reserved (unwritten) spans get no rows.
    let mut addr = statement.loc as usize + MAX_BYTES;
    let end = statement.next_loc as usize;
    while addr < end {
        let chunk_end = (addr + MAX_BYTES).min(end);
        if (addr..chunk_end).all(|cell| image.get(cell as u32).is_none()) {
            break;
        }

        let mut line = String::new();
        let _ = write!(line, "{:5} {:04X}  ", statement.line, addr);
        for cell in addr..chunk_end {
            match image.get(cell as u32) {
                Some(byte) => {
                    let _ = write!(line, "{byte:02X} ");
                }
                None => line.push_str("   "),
            }
        }
        lines.push(line.trim_end().to_string());
        addr = chunk_end;
    }

    lines
}

/// The attribute column: base clock count, `+` when the cost is a lower
/// bound, `U` for undocumented, `S` for unstable.
fn attributes(statement: &Statement) -> String {
    match &statement.kind {
        StmtKind::Instruction {
            attrs: Some(attrs), ..
        } => format!(
            "{}{} {}{}",
            attrs.clocks,
            if attrs.extra_clocks { '+' } else { ' ' },
            if attrs.undocumented { 'U' } else { ' ' },
            if attrs.unstable { 'S' } else { ' ' },
        ),
        _ => String::new(),
    }
}

pub fn render_statement(kind: &StmtKind) -> String {
    match kind {
        StmtKind::Org { expr, .. } => format!("ORG {}", render_expr(expr)),
        StmtKind::Set { name, expr } => format!("SET {name} = {}", render_expr(expr)),
        StmtKind::Instruction {
            mnemonic, operand, ..
        } => {
            let operand = render_operand(operand);
            if operand.is_empty() {
                mnemonic.clone()
            } else {
                format!("{mnemonic} {operand}")
            }
        }
        StmtKind::Data { size, elements } => {
            let keyword = match size {
                DataSize::Byte => "BYTE",
                DataSize::Word => "WORD",
            };
            let elements = elements
                .iter()
                .map(|element| match element {
                    DataElement::Single(expr) => render_expr(expr),
                    DataElement::Rep { count, value } => {
                        format!("REP({}) {}", render_expr(count), render_expr(value))
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{keyword} {elements}")
        }
        StmtKind::Space { size, count } => {
            let keyword = match size {
                DataSize::Byte => "BYTES",
                DataSize::Word => "WORDS",
            };
            format!("{keyword} {}", render_expr(count))
        }
        StmtKind::Ascii {
            text,
            nul_terminated,
        } => {
            let keyword = if *nul_terminated { "ASCIIZ" } else { "ASCII" };
            format!("{keyword} \"{}\"", escape_text(text))
        }
        StmtKind::Noop => String::new(),
    }
}

pub fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Implied => String::new(),
        Operand::Accumulator => "A".to_string(),
        Operand::Immediate(expr) => format!("#{}", render_expr(expr)),
        Operand::Direct { expr, index: None } => render_expr(expr),
        Operand::Direct {
            expr,
            index: Some(IndexRegister::X),
        } => format!("{},X", render_expr(expr)),
        Operand::Direct {
            expr,
            index: Some(IndexRegister::Y),
        } => format!("{},Y", render_expr(expr)),
        Operand::Indirect { expr, index: None } => format!("[{}]", render_expr(expr)),
        Operand::Indirect {
            expr,
            index: Some(IndexRegister::X),
        } => format!("[{},X]", render_expr(expr)),
        Operand::Indirect {
            expr,
            index: Some(IndexRegister::Y),
        } => format!("[{}],Y", render_expr(expr)),
    }
}

pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Constant(value, fmt) => render_number(*value, *fmt),
        Expr::Symbol(name) => name.clone(),
        Expr::Location => ".".to_string(),
        Expr::Unary { op, expr } => {
            let op = match op {
                UnaryOp::Neg => "-",
                UnaryOp::BitNot => "~",
            };
            format!("{op}{}", render_expr(expr))
        }
        Expr::Binary { op, lhs, rhs } => {
            let op = match op {
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "/",
                BinaryOp::Mod => "%",
                BinaryOp::Shl => "<<",
                BinaryOp::Shr => ">>",
                BinaryOp::And => "&",
                BinaryOp::Or => "|",
                BinaryOp::Xor => "^",
            };
            format!("{}{op}{}", render_expr(lhs), render_expr(rhs))
        }
        Expr::Group(inner) => format!("({})", render_expr(inner)),
    }
}

fn render_number(value: i64, fmt: NumFmt) -> String {
    match fmt {
        NumFmt::Dec => value.to_string(),
        NumFmt::Dollar(width) => format!("${value:0width$X}", width = usize::from(width)),
        NumFmt::Hex(width) => format!("0x{value:0width$X}", width = usize::from(width)),
        NumFmt::Bin(width) => format!("0b{value:0width$b}", width = usize::from(width)),
        NumFmt::Char => match value {
            10 => "'\\n'".to_string(),
            13 => "'\\r'".to_string(),
            9 => "'\\t'".to_string(),
            _ => format!("'{}'", (value as u8) as char),
        },
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}
