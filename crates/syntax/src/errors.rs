//! Source-located diagnostics, formatted with ariadne.

use ariadne::{Color, ColorGenerator, Label, Report, ReportKind, Source};
use std::fmt;
use std::io::Write;

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Tokenizer error
    Lex,
    /// Syntax error from either parser
    Parse,
    /// Semantic checker error
    Check,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Lex => write!(f, "lex error"),
            ErrorKind::Parse => write!(f, "parse error"),
            ErrorKind::Check => write!(f, "check error"),
        }
    }
}

/// An error tied to a span of source text, with optional hint, notes,
/// and secondary labels.
#[derive(Debug, Clone)]
pub struct SourceError {
    pub message: String,
    pub span: Span,
    pub kind: ErrorKind,
    pub hint: Option<String>,
    pub notes: Vec<String>,
    pub labels: Vec<(Span, String)>,
}

impl SourceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind,
            hint: None,
            notes: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Lex, message, span)
    }

    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Parse, message, span)
    }

    pub fn check(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Check, message, span)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push((span, message.into()));
        self
    }

    /// Render the diagnostic to a string.
    pub fn format(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        if self.write_formatted(&mut output, filename, source).is_err() {
            return self.message.clone();
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    pub fn write_formatted<W: Write>(
        &self,
        writer: &mut W,
        filename: &str,
        source: &str,
    ) -> std::io::Result<()> {
        let primary_color = match self.kind {
            ErrorKind::Lex => Color::Red,
            ErrorKind::Parse => Color::Red,
            ErrorKind::Check => Color::Magenta,
        };

        let mut colors = ColorGenerator::new();

        let mut builder = Report::build(ReportKind::Error, filename, self.span.start)
            .with_message(format!("{}: {}", self.kind, self.message))
            .with_label(
                Label::new((filename, self.span.start..self.span.end))
                    .with_message(&self.message)
                    .with_color(primary_color),
            );

        for (span, msg) in &self.labels {
            let color = colors.next();
            builder = builder.with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(msg)
                    .with_color(color),
            );
        }

        if let Some(hint) = &self.hint {
            builder = builder.with_help(hint);
        }

        for note in &self.notes {
            builder = builder.with_note(note);
        }

        builder
            .finish()
            .write((filename, Source::from(source)), writer)
    }

    pub fn eprint(&self, filename: &str, source: &str) {
        let _ = self.write_formatted(&mut std::io::stderr(), filename, source);
    }
}

/// Convert a byte offset into a 1-based line and column.
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

// Named constructors for the checker's recurring shapes.

impl SourceError {
    pub fn unknown_variable(name: &str, span: Span) -> Self {
        Self::check(format!("unknown variable `{}`", name), span)
            .with_hint("variables must be declared before use")
    }

    pub fn unknown_function(name: &str, span: Span) -> Self {
        Self::check(format!("unknown function `{}`", name), span)
    }

    pub fn unknown_struct(name: &str, span: Span) -> Self {
        Self::check(format!("unknown struct type `{}`", name), span)
    }

    pub fn unknown_field(field: &str, struct_name: &str, span: Span) -> Self {
        Self::check(
            format!("struct `{}` has no field `{}`", struct_name, field),
            span,
        )
    }

    pub fn duplicate_definition(name: &str, span: Span, original: Option<Span>) -> Self {
        let mut err = Self::check(format!("`{}` is defined more than once", name), span);
        if let Some(orig) = original {
            err = err.with_label(orig, "first defined here");
        }
        err
    }

    pub fn type_mismatch(expected: &str, found: &str, span: Span) -> Self {
        Self::check(
            format!("type mismatch: expected `{}`, found `{}`", expected, found),
            span,
        )
    }

    pub fn arity_mismatch(name: &str, expected: usize, found: usize, span: Span) -> Self {
        Self::check(
            format!(
                "function `{}` expects {} argument{}, but {} {} provided",
                name,
                expected,
                if expected == 1 { "" } else { "s" },
                found,
                if found == 1 { "was" } else { "were" }
            ),
            span,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_includes_message_and_location() {
        let source = "int x = y";
        let err = SourceError::unknown_variable("y", Span::new(8, 9));
        let output = err.format("test.ql", source);
        assert!(output.contains("unknown variable"));
        assert!(output.contains("y"));
    }

    #[test]
    fn offsets_to_line_col() {
        let source = "one\ntwo\nthree";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 3), (1, 4));
        assert_eq!(offset_to_line_col(source, 4), (2, 1));
        assert_eq!(offset_to_line_col(source, 8), (3, 1));
    }

    #[test]
    fn arity_message_pluralizes() {
        let err = SourceError::arity_mismatch("f", 1, 3, Span::new(0, 1));
        assert!(err.message.contains("expects 1 argument"));
        assert!(err.message.contains("3 were provided"));
    }
}
