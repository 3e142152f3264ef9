//! Tessera: a composable tokenization and parsing engine.
//!
//! Three layers, each built on the one below:
//!
//! - the **pattern engine** ([`pattern`]): combinators that match a prefix
//!   of a token stream, and the **rewrite loop** ([`tokenizer`]) that
//!   applies (pattern, builder) rules to a mutable token buffer until it
//!   converges;
//! - the **pattern language** ([`lang`]): a textual mini-language compiled
//!   into combinators by the same rewrite loop running a fixed bootstrap
//!   rule set over its own source;
//! - the **grammar compiler** ([`grammar`]): named, tagged,
//!   pattern-annotated rules with reduction functions, compiled into a
//!   [`grammar::Parser`] whose `parse(text, state)` rewrites the input to a
//!   node tree and reduces it into a caller-defined result.
//!
//! ```
//! use tessera::{GrammarBuilder, RuleDef};
//!
//! let parser = GrammarBuilder::<f64, ()>::new()
//!     .rule(RuleDef::new("int", "$..").tag("expr").reduce(|node, _| {
//!         node.raw_value()
//!             .parse::<f64>()
//!             .map_err(|e| tessera::TesseraError::reduction(e.to_string()))
//!     }))
//!     .compile()
//!     .unwrap();
//!
//! assert_eq!(parser.parse("42", &mut ()).unwrap(), 42.0);
//! ```

pub mod errors;
pub mod grammar;
pub mod lang;
pub mod pattern;
pub mod token;
pub mod tokenizer;
pub mod util;

pub use errors::TesseraError;
pub use grammar::{GrammarBuilder, Parser, RuleDef, RuleNode};
pub use lang::compile_pattern;
pub use pattern::{
    matchers, Capture, Captures, MatchOutcome, Pattern, PatternRef, SingleOutcome,
    SingleTokenPattern,
};
pub use token::{PropValue, Span, Token, TokenArgs};
pub use tokenizer::{seed_codepoints, seed_graphemes, tokenize, tokenize_seeded, Rule};
