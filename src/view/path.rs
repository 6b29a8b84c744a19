//! Path patterns: regular expressions over edge labels.
//!
//! Syntax: labels are identifiers, `.` concatenates, `|` alternates, postfix
//! `*`, `+` and `?` repeat, parentheses group. `(Knows)*`, `(Knows.WorksFor)*`
//! and `Knows|Likes+` are all valid. An expression is compiled to a Thompson
//! NFA whose labelled transitions become one inductive step each.

use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Parsed path regex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathRegex {
    Label(String),
    Concat(Vec<PathRegex>),
    Alt(Vec<PathRegex>),
    Star(Box<PathRegex>),
    Plus(Box<PathRegex>),
    Optional(Box<PathRegex>),
}

impl PathRegex {
    /// Parse a path expression
    pub fn parse(pattern: &str) -> Result<Self, CompileError> {
        let tokens = tokenize(pattern)?;
        let mut parser = RegexParser {
            pattern,
            tokens: &tokens,
            pos: 0,
        };
        let regex = parser.alternation()?;
        if parser.pos != tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(regex)
    }

    /// Labels the expression can traverse
    pub fn alphabet(&self) -> BTreeSet<String> {
        let mut labels = BTreeSet::new();
        self.collect_labels(&mut labels);
        labels
    }

    fn collect_labels(&self, out: &mut BTreeSet<String>) {
        match self {
            PathRegex::Label(l) => {
                out.insert(l.clone());
            }
            PathRegex::Concat(parts) | PathRegex::Alt(parts) => {
                parts.iter().for_each(|p| p.collect_labels(out));
            }
            PathRegex::Star(inner) | PathRegex::Plus(inner) | PathRegex::Optional(inner) => {
                inner.collect_labels(out);
            }
        }
    }

    /// Build the Thompson automaton
    pub fn to_nfa(&self) -> Nfa {
        let mut nfa = Nfa {
            states: 0,
            start: 0,
            accept: 0,
            transitions: Vec::new(),
        };
        let (start, accept) = nfa.fragment(self);
        nfa.start = start;
        nfa.accept = accept;
        nfa
    }
}

impl fmt::Display for PathRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, parts: &[PathRegex], sep: &str| -> fmt::Result {
            write!(f, "(")?;
            for (i, p) in parts.iter().enumerate() {
                if i > 0 {
                    write!(f, "{sep}")?;
                }
                write!(f, "{p}")?;
            }
            write!(f, ")")
        };
        match self {
            PathRegex::Label(l) => write!(f, "{l}"),
            PathRegex::Concat(parts) => join(f, parts, "."),
            PathRegex::Alt(parts) => join(f, parts, "|"),
            PathRegex::Star(inner) => write!(f, "({inner})*"),
            PathRegex::Plus(inner) => write!(f, "({inner})+"),
            PathRegex::Optional(inner) => write!(f, "({inner})?"),
        }
    }
}

/// NFA transition; `label == None` is an epsilon move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub label: Option<String>,
}

/// Thompson NFA with a single start and a single accepting state
#[derive(Debug, Clone)]
pub struct Nfa {
    pub states: usize,
    pub start: usize,
    pub accept: usize,
    pub transitions: Vec<Transition>,
}

impl Nfa {
    fn new_state(&mut self) -> usize {
        self.states += 1;
        self.states - 1
    }

    fn link(&mut self, from: usize, to: usize, label: Option<&str>) {
        self.transitions.push(Transition {
            from,
            to,
            label: label.map(str::to_string),
        });
    }

    fn fragment(&mut self, regex: &PathRegex) -> (usize, usize) {
        match regex {
            PathRegex::Label(l) => {
                let s = self.new_state();
                let t = self.new_state();
                self.link(s, t, Some(l));
                (s, t)
            }
            PathRegex::Concat(parts) => {
                let mut ends: Option<(usize, usize)> = None;
                for part in parts {
                    let (s, t) = self.fragment(part);
                    ends = Some(match ends {
                        None => (s, t),
                        Some((first, last)) => {
                            self.link(last, s, None);
                            (first, t)
                        }
                    });
                }
                ends.unwrap_or_else(|| {
                    let s = self.new_state();
                    (s, s)
                })
            }
            PathRegex::Alt(parts) => {
                let s = self.new_state();
                let t = self.new_state();
                for part in parts {
                    let (ps, pt) = self.fragment(part);
                    self.link(s, ps, None);
                    self.link(pt, t, None);
                }
                (s, t)
            }
            PathRegex::Star(inner) => {
                let s = self.new_state();
                let t = self.new_state();
                let (is, it) = self.fragment(inner);
                self.link(s, is, None);
                self.link(s, t, None);
                self.link(it, is, None);
                self.link(it, t, None);
                (s, t)
            }
            PathRegex::Plus(inner) => {
                let s = self.new_state();
                let t = self.new_state();
                let (is, it) = self.fragment(inner);
                self.link(s, is, None);
                self.link(it, is, None);
                self.link(it, t, None);
                (s, t)
            }
            PathRegex::Optional(inner) => {
                let s = self.new_state();
                let t = self.new_state();
                let (is, it) = self.fragment(inner);
                self.link(s, is, None);
                self.link(s, t, None);
                self.link(it, t, None);
                (s, t)
            }
        }
    }

    /// Whether the automaton accepts the label sequence
    pub fn accepts(&self, labels: &[&str]) -> bool {
        let mut current = self.epsilon_closure(BTreeSet::from([self.start]));
        for label in labels {
            let step: BTreeSet<usize> = self
                .transitions
                .iter()
                .filter(|t| current.contains(&t.from) && t.label.as_deref() == Some(*label))
                .map(|t| t.to)
                .collect();
            current = self.epsilon_closure(step);
        }
        current.contains(&self.accept)
    }

    fn epsilon_closure(&self, mut states: BTreeSet<usize>) -> BTreeSet<usize> {
        let mut stack: Vec<usize> = states.iter().copied().collect();
        while let Some(q) = stack.pop() {
            for t in self.transitions.iter().filter(|t| t.from == q && t.label.is_none()) {
                if states.insert(t.to) {
                    stack.push(t.to);
                }
            }
        }
        states
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Open,
    Close,
    Star,
    Plus,
    Question,
    Bar,
    Dot,
}

fn tokenize(pattern: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | '*' | '+' | '?' | '|' | '.' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::Open,
                    ')' => Token::Close,
                    '*' => Token::Star,
                    '+' => Token::Plus,
                    '?' => Token::Question,
                    '|' => Token::Bar,
                    _ => Token::Dot,
                });
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(CompileError::InvalidPathRegex {
                    pattern: pattern.to_string(),
                    reason: format!("unexpected character '{other}'"),
                })
            }
        }
    }
    if tokens.is_empty() {
        return Err(CompileError::InvalidPathRegex {
            pattern: pattern.to_string(),
            reason: "empty expression".to_string(),
        });
    }
    Ok(tokens)
}

/// Recursive descent: alternation > concatenation > postfix > atom
struct RegexParser<'a> {
    pattern: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl RegexParser<'_> {
    fn error(&self, reason: &str) -> CompileError {
        CompileError::InvalidPathRegex {
            pattern: self.pattern.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn alternation(&mut self) -> Result<PathRegex, CompileError> {
        let mut branches = vec![self.concatenation()?];
        while self.peek() == Some(&Token::Bar) {
            self.pos += 1;
            branches.push(self.concatenation()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            PathRegex::Alt(branches)
        })
    }

    fn concatenation(&mut self) -> Result<PathRegex, CompileError> {
        let mut parts = vec![self.postfix()?];
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            parts.push(self.postfix()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            PathRegex::Concat(parts)
        })
    }

    fn postfix(&mut self) -> Result<PathRegex, CompileError> {
        let mut regex = self.atom()?;
        loop {
            regex = match self.peek() {
                Some(Token::Star) => PathRegex::Star(Box::new(regex)),
                Some(Token::Plus) => PathRegex::Plus(Box::new(regex)),
                Some(Token::Question) => PathRegex::Optional(Box::new(regex)),
                _ => return Ok(regex),
            };
            self.pos += 1;
        }
    }

    fn atom(&mut self) -> Result<PathRegex, CompileError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Ident(label)) => {
                self.pos += 1;
                Ok(PathRegex::Label(label))
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.alternation()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(_) => Err(self.error("expected a label or '('")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_star() {
        let regex = PathRegex::parse("(Knows)*").unwrap();
        assert_eq!(regex, PathRegex::Star(Box::new(PathRegex::Label("Knows".into()))));
    }

    #[test]
    fn test_precedence() {
        // Alternation binds loosest, postfix tightest
        let regex = PathRegex::parse("A|B+").unwrap();
        assert_eq!(
            regex,
            PathRegex::Alt(vec![
                PathRegex::Label("A".into()),
                PathRegex::Plus(Box::new(PathRegex::Label("B".into()))),
            ])
        );
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(PathRegex::parse("(Knows").is_err());
        assert!(PathRegex::parse("").is_err());
        assert!(PathRegex::parse("A|").is_err());
        assert!(PathRegex::parse("A$").is_err());
    }

    #[test]
    fn test_nfa_language() {
        let nfa = PathRegex::parse("(A.B)*").unwrap().to_nfa();
        assert!(nfa.accepts(&[]));
        assert!(nfa.accepts(&["A", "B", "A", "B"]));
        assert!(!nfa.accepts(&["A"]));
        assert!(!nfa.accepts(&["B", "A"]));

        let plus = PathRegex::parse("Knows+").unwrap().to_nfa();
        assert!(!plus.accepts(&[]));
        assert!(plus.accepts(&["Knows", "Knows"]));
    }

    #[test]
    fn test_alphabet() {
        let regex = PathRegex::parse("(A.B)*|C?").unwrap();
        let labels: Vec<String> = regex.alphabet().into_iter().collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
    }
}
