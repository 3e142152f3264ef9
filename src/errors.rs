//! Unified error type for every failure mode of the engine.
//!
//! All stages — pattern evaluation, the rewrite loop, pattern-language
//! compilation, grammar compilation, and reduction — report through
//! [`TesseraError`]. Errors surface synchronously to the direct caller;
//! nothing is retried or downgraded.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TesseraError {
    /// The pattern-language source did not reduce to a single expression.
    #[error("unexpected token `{found}` in pattern source")]
    #[diagnostic(
        code(tessera::lang::unexpected_token),
        help("the pattern source could not be parsed past this point; check the surface syntax table")
    )]
    PatternSyntax {
        found: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("could not be parsed")]
        span: SourceSpan,
    },

    /// A compiled pattern accepts the empty token sequence.
    #[error("pattern `{pattern}` matches the empty token sequence")]
    #[diagnostic(
        code(tessera::lang::empty_pattern),
        help("a rule whose pattern consumes no tokens would rewrite forever; require at least one token")
    )]
    EmptyPattern { pattern: String },

    /// A regex literal failed to compile.
    #[error("invalid regular expression `{pattern}`")]
    #[diagnostic(code(tessera::lang::invalid_regex))]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Negation was applied to a pattern that is not single-token shaped.
    #[error("negation applied to a pattern that consumed {consumed} tokens")]
    #[diagnostic(
        code(tessera::pattern::negation_arity),
        help("only patterns that examine a single token can be negated")
    )]
    NegationArity { consumed: usize },

    /// An internal repetition exceeded the iteration ceiling.
    #[error("iteration ceiling exceeded in {context}")]
    #[diagnostic(
        code(tessera::tokenizer::runaway_loop),
        help("a rule set that never converges usually contains a rule that re-matches its own output")
    )]
    RunawayLoop { context: &'static str },

    /// Two grammar rules share a name.
    #[error("grammar rule `{name}` is defined twice")]
    #[diagnostic(code(tessera::grammar::duplicate_rule))]
    DuplicateRule { name: String },

    /// A grammar rule was registered without a reduction function.
    #[error("grammar rule `{name}` has no reducer")]
    #[diagnostic(code(tessera::grammar::missing_reducer))]
    MissingReducer { name: String },

    /// A grammar rule failed to compile.
    #[error("in grammar rule `{rule}`")]
    #[diagnostic(code(tessera::grammar::rule))]
    Rule {
        rule: String,
        #[source]
        source: Box<TesseraError>,
    },

    /// The rewrite loop produced no reducible node.
    #[error("input produced no parse node")]
    #[diagnostic(
        code(tessera::grammar::parse_shape),
        help("no grammar rule matched the input")
    )]
    ParseShape {
        #[source_code]
        src: NamedSource<String>,
        #[label("nothing here reduced to a grammar rule")]
        span: SourceSpan,
    },

    /// An error raised inside a rule's reduction function.
    #[error("{message}")]
    #[diagnostic(code(tessera::grammar::reduction))]
    Reduction { message: String },
}

impl TesseraError {
    /// Construct a reduction-time error. Reducer failures propagate to the
    /// `parse` caller unmodified.
    pub fn reduction(message: impl Into<String>) -> Self {
        TesseraError::Reduction {
            message: message.into(),
        }
    }

    pub(crate) fn in_rule(rule: &str, source: TesseraError) -> Self {
        TesseraError::Rule {
            rule: rule.to_string(),
            source: Box::new(source),
        }
    }
}
