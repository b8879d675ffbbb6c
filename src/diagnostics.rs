use crate::runtime::error::EvalError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct RuntimeDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl RuntimeDiagnostic {
    /// Points at the innermost node the error unwound through; the rest
    /// of the trace becomes the help text.
    pub fn from_error(src: NamedSource, err: &EvalError) -> Self {
        let span = err
            .innermost()
            .map_or_else(|| SourceSpan::from(0..0), |entry| entry.span.to_source_span());
        let label = err
            .innermost()
            .map_or_else(|| "here".to_string(), |entry| entry.kind.to_string());
        let help = render_trace(err);
        Self {
            src,
            span,
            help,
            message: err.error.to_string(),
            label,
        }
    }
}

fn render_trace(err: &EvalError) -> Option<String> {
    if err.trace.len() < 2 {
        return None;
    }
    let chain = err
        .trace
        .iter()
        .map(|entry| entry.kind)
        .collect::<Vec<_>>()
        .join(" <- ");
    Some(format!("raised while evaluating: {chain}"))
}

pub fn emit_runtime_error(name: &str, source: &str, err: &EvalError) {
    let src = NamedSource::new(name, source.to_string());
    let diagnostic = RuntimeDiagnostic::from_error(src, err);
    eprintln!("{:?}", Report::new(diagnostic));
}
