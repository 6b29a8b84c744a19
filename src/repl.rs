//! Rustyline helper for the statement REPL.
//!
//! Highlights keywords and string literals, and keeps reading lines while a
//! statement has unbalanced parentheses or an open string.

use std::borrow::Cow;

use rustyline::completion::Completer;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Helper, Result};

const RESET: &str = "\x1b[0m";
const PROMPT_COLOR: &str = "\x1b[1;32m"; // bold green
const KEYWORD_COLOR: &str = "\x1b[1;34m"; // bold blue
const STRING_COLOR: &str = "\x1b[33m"; // yellow

const KEYWORDS: &[&str] = &[
    "ADD", "AND", "CONSTRUCT", "CREATE", "DELETE", "DROP", "EDGE", "FROM", "GRAPH", "GRAPHS", "HYBRID",
    "IMPORT", "INDEX", "INSERT", "MAP", "MATCH", "MATERIALIZED", "NODE", "NOT", "ON", "PROGRAM", "RETURN",
    "SCHEMA", "SET", "SHOW", "SK", "SSR", "TO", "USE", "VIEW", "VIEWS", "VIRTUAL", "WHERE",
];

/// Nesting depth and open-string state after scanning `text`
fn scan(text: &str) -> (i64, bool) {
    let mut depth = 0i64;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    (depth, in_string)
}

/// Rustyline helper for pgview statements
#[derive(Default)]
pub struct StatementHelper;

impl StatementHelper {
    pub fn new() -> Self {
        Self
    }
}

impl Helper for StatementHelper {}

impl Completer for StatementHelper {
    type Candidate = String;

    fn complete(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<Self::Candidate>)> {
        Ok((0, Vec::new()))
    }
}

impl Hinter for StatementHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl Validator for StatementHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> Result<ValidationResult> {
        let (depth, in_string) = scan(ctx.input());
        if depth > 0 || in_string {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

impl Highlighter for StatementHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.is_empty() {
            return Cow::Borrowed(line);
        }

        let mut out = String::with_capacity(line.len() * 2);
        let mut chars = line.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if c == '"' {
                let mut end = line.len();
                let mut escaped = false;
                for (i, d) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if d == '\\' {
                        escaped = true;
                    } else if d == '"' {
                        end = i + 1;
                        break;
                    }
                }
                out.push_str(STRING_COLOR);
                out.push_str(&line[start..end]);
                out.push_str(RESET);
            } else if c.is_ascii_alphabetic() || c == '_' {
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_ascii_alphanumeric() || d == '_') {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let word = &line[start..end];
                if KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word)) {
                    out.push_str(KEYWORD_COLOR);
                    out.push_str(word);
                    out.push_str(RESET);
                } else {
                    out.push_str(word);
                }
            } else {
                out.push(c);
            }
        }
        Cow::Owned(out)
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _default: bool) -> Cow<'b, str> {
        // Color the workspace name (everything before "> ")
        if let Some(pos) = prompt.rfind("> ") {
            let name = &prompt[..pos];
            Cow::Owned(format!("{PROMPT_COLOR}{name}{RESET}> "))
        } else {
            Cow::Borrowed(prompt)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}
