//! Calculator REPL built on the grammar compiler.
//!
//! Demonstrates the full pipeline: pattern-language rule sources, tag-driven
//! precedence by rule ordering, and reduction with a threaded variable map.
//! Multiplicative operators bind across whitespace; additive operators bind
//! only when adjacent, so a spaced-out additive tail stays unattached and
//! the parser reduces the leading expression.

use std::collections::HashMap;
use std::io::{self, Write};

use tessera::{GrammarBuilder, Parser, RuleDef, TesseraError};

type State = HashMap<String, f64>;

fn number(text: &str) -> Result<f64, TesseraError> {
    text.parse::<f64>()
        .map_err(|e| TesseraError::reduction(format!("bad numeric literal `{text}`: {e}")))
}

fn calculator() -> Result<Parser<f64, State>, TesseraError> {
    GrammarBuilder::new()
        .rule(
            RuleDef::new("variable", r"/[a-z_]+/i")
                .tag("expr")
                .tag("negatable")
                .reduce(|node, state: &mut State| {
                    let name = node.raw_value().to_lowercase();
                    state.get(&name).copied().ok_or_else(|| {
                        TesseraError::reduction(format!("undefined variable `{name}`"))
                    })
                }),
        )
        .rule(
            RuleDef::new("decimal", r"$..\.$..")
                .tag("expr")
                .tag("negatable")
                .reduce(|node, _| number(&node.raw_value())),
        )
        .rule(
            RuleDef::new("int", r"$..")
                .tag("expr")
                .tag("negatable")
                .reduce(|node, _| number(&node.raw_value())),
        )
        .rule(
            RuleDef::new("negative", r"<<(~0.. !#expr) \- ~0.. (value: #negatable)")
                .tag("expr")
                .recursive()
                .reduce(|node: &tessera::RuleNode<'_, f64, State>, state| {
                    Ok(-node.captured_one("value")?.reduce(state)?)
                }),
        )
        .rule(
            RuleDef::new("group", r"\( ~0.. (value: #expr) ~0.. \)")
                .tag("expr")
                .tag("negatable")
                .recursive()
                .reduce(|node, state| node.captured_one("value")?.reduce(state)),
        )
        .rule(
            RuleDef::new("abs", r"\| ~0.. (value: #expr) ~0.. \|")
                .tag("expr")
                .tag("negatable")
                .recursive()
                .reduce(|node: &tessera::RuleNode<'_, f64, State>, state| {
                    Ok(node.captured_one("value")?.reduce(state)?.abs())
                }),
        )
        .rule(
            RuleDef::new("pow", r"(lhs: #expr) ~0.. \^ ~0.. (rhs: #expr)")
                .tag("expr")
                .recursive()
                .reduce(|node: &tessera::RuleNode<'_, f64, State>, state| {
                    let lhs = node.captured_one("lhs")?.reduce(state)?;
                    let rhs = node.captured_one("rhs")?.reduce(state)?;
                    Ok(lhs.powf(rhs))
                }),
        )
        .rule(
            RuleDef::new("muldiv", r"(lhs: #expr) ~0.. (op: (\* || \/)) ~0.. (rhs: #expr)")
                .tag("expr")
                .recursive()
                .reduce(|node: &tessera::RuleNode<'_, f64, State>, state| {
                    let lhs = node.captured_one("lhs")?.reduce(state)?;
                    let rhs = node.captured_one("rhs")?.reduce(state)?;
                    Ok(if node.captured_raw("op") == "/" {
                        lhs / rhs
                    } else {
                        lhs * rhs
                    })
                }),
        )
        .rule(
            RuleDef::new("addsub", r"(lhs: #expr)(op: (\+ || \-))(rhs: #expr)")
                .tag("expr")
                .recursive()
                .reduce(|node: &tessera::RuleNode<'_, f64, State>, state| {
                    let lhs = node.captured_one("lhs")?.reduce(state)?;
                    let rhs = node.captured_one("rhs")?.reduce(state)?;
                    Ok(if node.captured_raw("op") == "-" {
                        lhs - rhs
                    } else {
                        lhs + rhs
                    })
                }),
        )
        .compile()
}

fn main() {
    let parser = match calculator() {
        Ok(parser) => parser,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
    };

    let mut state: State = HashMap::new();
    state.insert("pi".to_string(), std::f64::consts::PI);
    state.insert("e".to_string(), std::f64::consts::E);

    println!("Tessera calculator");
    println!("Enter an expression, or :quit to exit.");

    loop {
        print!("calc> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == ":quit" || line == ":q" || line == "q" {
                    break;
                }
                match parser.parse(line, &mut state) {
                    Ok(value) => println!("{value}"),
                    Err(e) => eprintln!("{:?}", miette::Report::new(e)),
                }
            }
            Err(e) => {
                eprintln!("error reading input: {e}");
                break;
            }
        }
    }
}
