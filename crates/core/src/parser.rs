use chumsky::{
    IterParser, Parser as _,
    error::RichReason,
    extra,
    input::{Input as _, Stream, ValueInput},
    prelude::{Rich, SimpleSpan, any, end, just, via_parser},
    recursive::recursive,
};

use crate::ast::{
    BinaryOp, DataElement, DataSize, Expr, IndexRegister, Operand, Statement, StmtKind, UnaryOp,
};
use crate::diag::Diagnostic;
use crate::lexer::{TokenKind, lex_lenient};
use crate::span::{SourceFile, Span, Spanned};

type ParseError<'src> = Rich<'src, TokenKind>;
type ParseExtra<'src> = extra::Err<ParseError<'src>>;

/// Case-insensitive directive keyword. Keywords are ordinary identifier
/// tokens; the distinction is made here so symbols and mnemonics can reuse
/// the same lexer rule.
macro_rules! kw {
    ($word:literal) => {
        chumsky::select! {
            TokenKind::Ident(name) if name.eq_ignore_ascii_case($word) => ()
        }
    };
}

#[derive(Debug, Clone)]
struct RawLine {
    label: Option<String>,
    kind: Option<StmtKind>,
    comment: Option<String>,
}

/// Parse the source into the statement list. Lex and parse problems are
/// returned as diagnostics; lines that fail to parse are skipped with a
/// placeholder statement so later lines still assemble.
pub fn parse(source: &SourceFile) -> (Vec<Statement>, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = lex_lenient(&source.text);

    let end_offset = tokens.last().map(|token| token.span.end).unwrap_or(0);
    let token_stream = Stream::from_iter(tokens.into_iter().map(|token| {
        let span: SimpleSpan = (token.span.start..token.span.end).into();
        (token.kind, span)
    }))
    .map((end_offset..end_offset).into(), |(kind, span): (_, _)| {
        (kind, span)
    });

    let (output, errors) = file_parser().parse(token_stream).into_output_errors();
    diagnostics.extend(errors.into_iter().map(rich_error_to_diagnostic));

    let statements = output
        .unwrap_or_default()
        .into_iter()
        .map(|line| to_statement(line, source))
        .collect();

    (statements, diagnostics)
}

fn to_statement(line: Spanned<RawLine>, source: &SourceFile) -> Statement {
    let Spanned { node, span } = line;
    let mut statement = Statement::new(
        source.line_of(span),
        span,
        node.kind.unwrap_or(StmtKind::Noop),
    );
    statement.label = node.label;
    statement.comment = node.comment;
    statement
}

fn rich_error_to_diagnostic(error: Rich<'_, TokenKind>) -> Diagnostic {
    let range = error.span().into_range();
    let span = Span::new(range.start, range.end);
    let message = match error.reason() {
        RichReason::Custom(custom) => format!("invalid syntax: {custom}"),
        RichReason::ExpectedFound { found, .. } => {
            let found = found
                .as_deref()
                .map(token_kind_message)
                .unwrap_or_else(|| "end of input".to_string());
            format!("invalid syntax: unexpected {found}")
        }
    };
    Diagnostic::error(span, message)
}

fn token_kind_message(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Comment(_) => "comment".to_string(),
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Str(_) => "string literal".to_string(),
        TokenKind::Number(_) => "number".to_string(),
        TokenKind::Ident(name) => format!("'{name}'"),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Hash => "'#'".to_string(),
        TokenKind::Eq => "'='".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::LBracket => "'['".to_string(),
        TokenKind::RBracket => "']'".to_string(),
        TokenKind::Dot => "'.'".to_string(),
        TokenKind::Plus => "'+'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::Star => "'*'".to_string(),
        TokenKind::Slash => "'/'".to_string(),
        TokenKind::Percent => "'%'".to_string(),
        TokenKind::Amp => "'&'".to_string(),
        TokenKind::Pipe => "'|'".to_string(),
        TokenKind::Caret => "'^'".to_string(),
        TokenKind::Tilde => "'~'".to_string(),
        TokenKind::Shl => "'<<'".to_string(),
        TokenKind::Shr => "'>>'".to_string(),
    }
}

fn spanned<'src, I, T, P>(parser: P) -> impl chumsky::Parser<'src, I, Spanned<T>, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
    P: chumsky::Parser<'src, I, T, ParseExtra<'src>> + Clone,
{
    parser.map_with(|node, extra| {
        let range = extra.span().into_range();
        Spanned::new(node, Span::new(range.start, range.end))
    })
}

fn ident_parser<'src, I>() -> impl chumsky::Parser<'src, I, String, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    chumsky::select! { TokenKind::Ident(name) => name }
}

fn file_parser<'src, I>()
-> impl chumsky::Parser<'src, I, Vec<Spanned<RawLine>>, ParseExtra<'src>>
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    let blank = just(TokenKind::Newline).repeated();
    let terminator = just(TokenKind::Newline).ignored().or(end());

    let junk = any()
        .filter(|token: &TokenKind| !matches!(token, TokenKind::Newline))
        .repeated()
        .at_least(1)
        .to(RawLine {
            label: None,
            kind: Some(StmtKind::Noop),
            comment: None,
        });

    let item = spanned(line_parser())
        .then_ignore(terminator.clone())
        .recover_with(via_parser(spanned(junk).then_ignore(terminator)));

    blank
        .clone()
        .ignore_then(item.then_ignore(blank).repeated().collect::<Vec<_>>())
        .then_ignore(end())
}

fn line_parser<'src, I>() -> impl chumsky::Parser<'src, I, RawLine, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    let label = ident_parser().then_ignore(just(TokenKind::Colon));
    let comment = chumsky::select! { TokenKind::Comment(text) => text };

    label
        .or_not()
        .then(stmt_kind_parser().or_not())
        .then(comment.or_not())
        .try_map(|((label, kind), comment), span| {
            if label.is_none() && kind.is_none() && comment.is_none() {
                return Err(Rich::custom(span, "expected a statement"));
            }
            Ok(RawLine {
                label,
                kind,
                comment,
            })
        })
}

fn stmt_kind_parser<'src, I>() -> impl chumsky::Parser<'src, I, StmtKind, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    let expr = expr_parser();
    let string = chumsky::select! { TokenKind::Str(text) => text };

    let org = kw!("org").ignore_then(expr.clone()).map(|expr| StmtKind::Org {
        expr,
        resolved: None,
    });

    let set = kw!("set")
        .ignore_then(ident_parser())
        .then_ignore(just(TokenKind::Eq))
        .then(expr.clone())
        .map(|(name, expr)| StmtKind::Set { name, expr });

    let data_element = kw!("rep")
        .ignore_then(
            expr.clone()
                .delimited_by(just(TokenKind::LParen), just(TokenKind::RParen)),
        )
        .then(expr.clone())
        .map(|(count, value)| DataElement::Rep { count, value })
        .or(expr.clone().map(DataElement::Single));

    let data_list = data_element
        .separated_by(just(TokenKind::Comma))
        .at_least(1)
        .collect::<Vec<_>>();

    let byte = kw!("byte")
        .ignore_then(data_list.clone())
        .map(|elements| StmtKind::Data {
            size: DataSize::Byte,
            elements,
        });

    let word = kw!("word").ignore_then(data_list).map(|elements| StmtKind::Data {
        size: DataSize::Word,
        elements,
    });

    let bytes = kw!("bytes").ignore_then(expr.clone()).map(|count| StmtKind::Space {
        size: DataSize::Byte,
        count,
    });

    let words = kw!("words").ignore_then(expr.clone()).map(|count| StmtKind::Space {
        size: DataSize::Word,
        count,
    });

    let ascii = kw!("ascii").ignore_then(string.clone()).map(|text| StmtKind::Ascii {
        text,
        nul_terminated: false,
    });

    let asciiz = kw!("asciiz").ignore_then(string).map(|text| StmtKind::Ascii {
        text,
        nul_terminated: true,
    });

    let end_marker = kw!("end").to(StmtKind::Noop);

    let instruction = ident_parser()
        .then(operand_parser(expr))
        .map(|(mnemonic, operand)| StmtKind::Instruction {
            mnemonic,
            operand,
            operand_size: None,
            attrs: None,
        });

    org.or(set)
        .or(byte)
        .or(word)
        .or(bytes)
        .or(words)
        .or(ascii)
        .or(asciiz)
        .or(end_marker)
        .or(instruction)
        .boxed()
}

fn operand_parser<'src, I, P>(
    expr: P,
) -> impl chumsky::Parser<'src, I, Operand, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
    P: chumsky::Parser<'src, I, Expr, ParseExtra<'src>> + Clone + 'src,
{
    let reg_x = chumsky::select! {
        TokenKind::Ident(name) if name.eq_ignore_ascii_case("x") => ()
    };
    let reg_y = chumsky::select! {
        TokenKind::Ident(name) if name.eq_ignore_ascii_case("y") => ()
    };

    let line_boundary = chumsky::select! { TokenKind::Comment(_) => () }
        .or(just(TokenKind::Newline).ignored())
        .or(end())
        .rewind();

    // A bare `A` (in any case) at the end of the operand field selects
    // accumulator mode; anywhere else it is an ordinary symbol.
    let accumulator = chumsky::select! {
        TokenKind::Ident(name) if name.eq_ignore_ascii_case("a") => ()
    }
    .then_ignore(line_boundary)
    .to(Operand::Accumulator);

    let immediate = just(TokenKind::Hash)
        .ignore_then(expr.clone())
        .map(Operand::Immediate);

    let indirect = just(TokenKind::LBracket)
        .ignore_then(expr.clone())
        .then(
            just(TokenKind::Comma)
                .ignore_then(reg_x.clone())
                .then_ignore(just(TokenKind::RBracket))
                .to(Some(IndexRegister::X))
                .or(just(TokenKind::RBracket).ignore_then(
                    just(TokenKind::Comma)
                        .ignore_then(reg_y.clone())
                        .to(IndexRegister::Y)
                        .or_not(),
                )),
        )
        .map(|(expr, index)| Operand::Indirect { expr, index });

    let direct = expr
        .then(
            just(TokenKind::Comma)
                .ignore_then(reg_x.to(IndexRegister::X).or(reg_y.to(IndexRegister::Y)))
                .or_not(),
        )
        .map(|(expr, index)| Operand::Direct { expr, index });

    immediate
        .or(accumulator)
        .or(indirect)
        .or(direct)
        .or_not()
        .map(|operand| operand.unwrap_or(Operand::Implied))
        .boxed()
}

fn binary_level<'src, I, P, O>(
    operand: P,
    op: O,
) -> impl chumsky::Parser<'src, I, Expr, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
    P: chumsky::Parser<'src, I, Expr, ParseExtra<'src>> + Clone,
    O: chumsky::Parser<'src, I, BinaryOp, ParseExtra<'src>> + Clone,
{
    operand
        .clone()
        .then(op.then(operand).repeated().collect::<Vec<_>>())
        .map(|(lhs, chain)| {
            chain.into_iter().fold(lhs, |lhs, (op, rhs)| Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            })
        })
}

fn expr_parser<'src, I>() -> impl chumsky::Parser<'src, I, Expr, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = TokenKind, Span = SimpleSpan>,
{
    recursive(|expr| {
        let atom = chumsky::select! {
            TokenKind::Number(literal) => Expr::Constant(literal.value, literal.fmt),
        }
        .or(chumsky::select! { TokenKind::Ident(name) => Expr::Symbol(name) })
        .or(just(TokenKind::Dot).to(Expr::Location))
        .or(expr
            .delimited_by(just(TokenKind::LParen), just(TokenKind::RParen))
            .map(|inner| Expr::Group(Box::new(inner))));

        let unary = just(TokenKind::Minus)
            .to(UnaryOp::Neg)
            .or(just(TokenKind::Tilde).to(UnaryOp::BitNot))
            .repeated()
            .collect::<Vec<_>>()
            .then(atom)
            .map(|(ops, mut inner)| {
                for op in ops.into_iter().rev() {
                    inner = Expr::Unary {
                        op,
                        expr: Box::new(inner),
                    };
                }
                inner
            });

        let product = binary_level(
            unary,
            just(TokenKind::Star)
                .to(BinaryOp::Mul)
                .or(just(TokenKind::Slash).to(BinaryOp::Div))
                .or(just(TokenKind::Percent).to(BinaryOp::Mod)),
        );
        let sum = binary_level(
            product,
            just(TokenKind::Plus)
                .to(BinaryOp::Add)
                .or(just(TokenKind::Minus).to(BinaryOp::Sub)),
        );
        let shift = binary_level(
            sum,
            just(TokenKind::Shl)
                .to(BinaryOp::Shl)
                .or(just(TokenKind::Shr).to(BinaryOp::Shr)),
        );
        let bit_and = binary_level(shift, just(TokenKind::Amp).to(BinaryOp::And));
        let bit_xor = binary_level(bit_and, just(TokenKind::Caret).to(BinaryOp::Xor));
        binary_level(bit_xor, just(TokenKind::Pipe).to(BinaryOp::Or))
    })
    .boxed()
}
