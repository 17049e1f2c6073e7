use std::fmt;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::span::{SourceFile, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One assembly message. The span anchors the message in the source; the
/// listing and the sort order use the line the span starts on.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            message: message.into(),
        }
    }

    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            span,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub fn render_diagnostic(source: &SourceFile, diagnostic: &Diagnostic, color: bool) -> String {
    let (kind, highlight) = match diagnostic.severity {
        Severity::Error => (ReportKind::Error, Color::Red),
        Severity::Warning => (ReportKind::Warning, Color::Yellow),
    };

    let mut output = Vec::new();
    let report = Report::build(kind, source.name.clone(), diagnostic.span.start)
        .with_config(Config::default().with_color(color))
        .with_message(diagnostic.message.clone())
        .with_label(
            Label::new((source.name.clone(), diagnostic.span.as_range()))
                .with_color(highlight)
                .with_message("here"),
        );

    let _ = report.finish().write(
        (source.name.clone(), Source::from(source.text.clone())),
        &mut output,
    );

    String::from_utf8_lossy(&output).into_owned()
}

pub fn render_diagnostics(source: &SourceFile, diagnostics: &[&Diagnostic], color: bool) -> String {
    diagnostics
        .iter()
        .map(|diag| render_diagnostic(source, diag, color))
        .collect::<Vec<_>>()
        .join("\n")
}
