use logos::Logos;

use crate::ast::NumFmt;
use crate::diag::Diagnostic;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumLit {
    pub value: i64,
    pub fmt: NumFmt,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
pub enum TokenKind {
    #[regex(r";[^\n]*", |lex| lex.slice().to_string())]
    Comment(String),

    #[regex(r"\n+")]
    Newline,

    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("#")]
    Hash,
    #[token("=")]
    Eq,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(".")]
    Dot,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,

    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    Str(String),

    #[regex(r"\$[0-9a-fA-F]+|0x[0-9a-fA-F]+|0b[01]+|[0-9]+", parse_number)]
    #[regex(r"'([^'\\\n]|\\.)'", parse_char)]
    Number(NumLit),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Tokenize the whole source. Unrecognized characters become diagnostics
/// and are skipped so the parser still sees the rest of the file.
pub fn lex_lenient(input: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();

    while let Some(next) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start, range.end);
        match next {
            Ok(kind) => tokens.push(Token { kind, span }),
            Err(_) => {
                let escaped: String = lexer.slice().chars().flat_map(char::escape_default).collect();
                diagnostics.push(Diagnostic::error(
                    span,
                    format!("unexpected token '{escaped}'"),
                ));
            }
        }
    }

    (tokens, diagnostics)
}

#[cfg(test)]
pub(crate) fn lex(input: &str) -> Result<Vec<Token>, Vec<Diagnostic>> {
    let (tokens, diagnostics) = lex_lenient(input);
    if diagnostics.is_empty() {
        Ok(tokens)
    } else {
        Err(diagnostics)
    }
}

fn parse_number(lex: &mut logos::Lexer<TokenKind>) -> Option<NumLit> {
    let slice = lex.slice();
    if let Some(hex) = slice.strip_prefix('$') {
        let width = hex.len() as u8;
        return i64::from_str_radix(hex, 16).ok().map(|value| NumLit {
            value,
            fmt: NumFmt::Dollar(width),
        });
    }
    if let Some(hex) = slice.strip_prefix("0x") {
        let width = hex.len() as u8;
        return i64::from_str_radix(hex, 16).ok().map(|value| NumLit {
            value,
            fmt: NumFmt::Hex(width),
        });
    }
    if let Some(bin) = slice.strip_prefix("0b") {
        let width = bin.len() as u8;
        return i64::from_str_radix(bin, 2).ok().map(|value| NumLit {
            value,
            fmt: NumFmt::Bin(width),
        });
    }
    slice.parse::<i64>().ok().map(|value| NumLit {
        value,
        fmt: NumFmt::Dec,
    })
}

fn parse_char(lex: &mut logos::Lexer<TokenKind>) -> Option<NumLit> {
    let slice = lex.slice();
    let content = &slice[1..slice.len() - 1];
    let mut chars = content.chars();
    let ch = match chars.next()? {
        '\\' => unescape(chars.next()?),
        ch => ch,
    };
    Some(NumLit {
        value: ch as i64,
        fmt: NumFmt::Char,
    })
}

fn parse_string(lex: &mut logos::Lexer<TokenKind>) -> String {
    let slice = lex.slice();
    let content = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(unescape(escaped));
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn unescape(ch: char) -> char {
    match ch {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        other => other,
    }
}
