//! Reader for pre-matched listings.
//!
//! One instruction per line. `name:` defines a label for the next
//! instruction and may share its line. Lines whose mnemonic is a configured
//! branch mnemonic become branches to their last operand. `;` and `//` start
//! comments.

use crate::config::Config;
use crate::error::Error;
use crate::line::{Line, Program};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stmt<'a> {
    Label(&'a str),
    Code(&'a str),
}

fn strip_comment(raw: &str) -> &str {
    let cut = [raw.find(';'), raw.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(raw.len());
    raw[..cut].trim()
}

fn split(code: &str) -> Vec<Stmt<'_>> {
    let mut stmts = vec![];
    let mut rest = code;
    while let Some(head) = rest.split_whitespace().next() {
        match head.strip_suffix(':') {
            Some(label) if !label.is_empty() => {
                stmts.push(Stmt::Label(label));
                let at = rest.find(head).unwrap_or(0) + head.len();
                rest = rest[at..].trim_start();
            }
            _ => {
                stmts.push(Stmt::Code(rest));
                break;
            }
        }
    }
    stmts
}

pub fn parse(text: &str, config: &Config) -> Result<Program, Error> {
    let mut program = Program::new();

    for (idx, raw) in text.lines().enumerate() {
        for stmt in split(strip_comment(raw)) {
            match stmt {
                Stmt::Label(label) => {
                    if program.label(label).is_some() {
                        return Err(Error::RedefinedLabel(label.to_string(), idx));
                    }
                }
                Stmt::Code(code) => {
                    let words: Vec<&str> = code.split_whitespace().collect();
                    let line = match words.first() {
                        Some(head) if config.is_branch(head) => match words.get(1..) {
                            Some([.., target]) => Line::branch(idx, code, target),
                            _ => return Err(Error::MissingBranchTarget(idx)),
                        },
                        _ => Line::body(idx, code),
                    };
                    program.push(line);
                }
            }
        }
    }

    Ok(program)
}
