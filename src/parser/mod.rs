//! # Statement Parser
//!
//! Parses the pgview statement language with a PEG grammar (`grammar.pest`):
//!
//! ```text
//! CREATE GRAPH g;
//! CREATE NODE Person;
//! CREATE EDGE Knows(Person -> Person);
//! INSERT N_g(1, "Person");
//! CREATE VIRTUAL VIEW v ON g (
//!     MATCH (a:Person)-[k:Knows]->(b:Person)
//!     SET f = SK("friendship", a, b)
//!     CONSTRUCT (f:Friendship), (a)-[m:Member]->(f)
//! );
//! CREATE INDEX ON v NODE Person;
//! CREATE SSR INDEX ON v;
//! MATCH (a:Person)-[:(Knows)*]->(b:Person) FROM g WHERE a.age > 30 RETURN (a), (b);
//! DROP VIEW v;
//! IMPORT E_g FROM "edges.csv";
//! SHOW SCHEMA g;
//! USE GRAPH h;
//! DROP GRAPH g;
//! ```
//!
//! Integer literals are 64-bit. An edge label that is not a plain identifier
//! is read as a path expression over labels.

use crate::compiler::GraphQuery;
use crate::error::{ParseError, Result};
use crate::view::{
    EdgeLabel, MapPair, MatchAtom, Operand, PathRegex, PatternAtom, PropertyAtom, SkolemBinding,
    TransRule, TransRuleList, ViewKind, WhereCond,
};
use crate::ast::{ComparisonOp, Term};
use crate::value::Value;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct StatementParser;

/// Label kind targeted by `CREATE INDEX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexTarget {
    #[serde(rename = "N")]
    Node,
    #[serde(rename = "E")]
    Edge,
}

/// What `SHOW` lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowTarget {
    Graphs,
    Views,
    /// Schema of a graph or view, the current graph when `None`
    Schema(Option<String>),
    Program,
}

/// A parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateGraph(String),
    CreateNode {
        label: String,
        graph: Option<String>,
    },
    CreateEdge {
        label: String,
        from: String,
        to: String,
        graph: Option<String>,
    },
    CreateView(TransRuleList),
    DropView(String),
    DropGraph(String),
    UseGraph(String),
    Show(ShowTarget),
    /// Load the rows of a CSV file into a stored relation
    ImportCsv {
        relation: String,
        path: PathBuf,
    },
    Insert {
        relation: String,
        values: Vec<Value>,
    },
    CreateIndex {
        view: String,
        target: IndexTarget,
        label: String,
    },
    CreateSsrIndex(String),
    Query(GraphQuery),
}

/// Parse a script of zero or more statements
pub fn parse_statements(input: &str) -> Result<Vec<Statement>> {
    let mut pairs = StatementParser::parse(Rule::statements, input)
        .map_err(|e| ParseError::Syntax(e.to_string()))?;
    let Some(root) = pairs.next() else {
        return Ok(Vec::new());
    };
    root.into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(statement)
        .collect()
}

/// Parse exactly one statement
pub fn parse_statement(input: &str) -> Result<Statement> {
    let mut statements = parse_statements(input)?;
    match statements.len() {
        1 => Ok(statements.remove(0)),
        n => Err(ParseError::Invalid(format!("expected one statement, found {n}")).into()),
    }
}

fn statement(pair: Pair<'_, Rule>) -> Result<Statement> {
    let text = pair.as_str().trim();
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();
    let statement = match rule {
        Rule::create_graph => Statement::CreateGraph(ident(&mut inner)?),
        Rule::create_node => Statement::CreateNode {
            label: ident(&mut inner)?,
            graph: on_graph(inner),
        },
        Rule::create_edge => Statement::CreateEdge {
            label: ident(&mut inner)?,
            from: ident(&mut inner)?,
            to: ident(&mut inner)?,
            graph: on_graph(inner),
        },
        Rule::create_view => create_view(inner, text)?,
        Rule::drop_view => Statement::DropView(ident(&mut inner)?),
        Rule::drop_graph => Statement::DropGraph(ident(&mut inner)?),
        Rule::use_graph => Statement::UseGraph(ident(&mut inner)?),
        Rule::show_graphs => Statement::Show(ShowTarget::Graphs),
        Rule::show_views => Statement::Show(ShowTarget::Views),
        Rule::show_schema => Statement::Show(ShowTarget::Schema(inner.next().map(|p| p.as_str().to_string()))),
        Rule::show_program => Statement::Show(ShowTarget::Program),
        Rule::import_csv => {
            let relation = ident(&mut inner)?;
            let path = inner
                .next()
                .map(string_value)
                .ok_or_else(|| ParseError::Invalid(format!("IMPORT {relation} has no file")))?;
            Statement::ImportCsv {
                relation,
                path: PathBuf::from(path),
            }
        }
        Rule::insert => {
            let relation = ident(&mut inner)?;
            let values = inner.map(constant).collect::<Result<Vec<_>>>()?;
            Statement::Insert { relation, values }
        }
        Rule::create_index => {
            let view = ident(&mut inner)?;
            let target = match inner.next() {
                Some(p) if p.as_str().eq_ignore_ascii_case("edge") => IndexTarget::Edge,
                _ => IndexTarget::Node,
            };
            Statement::CreateIndex {
                view,
                target,
                label: ident(&mut inner)?,
            }
        }
        Rule::create_ssr_index => Statement::CreateSsrIndex(ident(&mut inner)?),
        Rule::query => Statement::Query(query(inner)?),
        other => return Err(ParseError::Invalid(format!("unexpected {other:?}")).into()),
    };
    Ok(statement)
}

fn ident(pairs: &mut Pairs<'_, Rule>) -> Result<String> {
    match pairs.next() {
        Some(p) if p.as_rule() == Rule::ident => Ok(p.as_str().to_string()),
        Some(p) => Err(ParseError::Invalid(format!("expected identifier, found '{}'", p.as_str())).into()),
        None => Err(ParseError::Invalid("expected identifier".to_string()).into()),
    }
}

fn on_graph(mut pairs: Pairs<'_, Rule>) -> Option<String> {
    pairs
        .next()
        .and_then(|p| p.into_inner().next())
        .map(|p| p.as_str().to_string())
}

fn create_view(pairs: Pairs<'_, Rule>, text: &str) -> Result<Statement> {
    let mut kind = ViewKind::default();
    let mut names = Vec::new();
    let mut rules = Vec::new();
    for pair in pairs {
        match pair.as_rule() {
            Rule::view_kind => kind = ViewKind::parse(pair.as_str()).unwrap_or_default(),
            Rule::ident => names.push(pair.as_str().to_string()),
            Rule::trans_rule => rules.push(trans_rule(pair)?),
            _ => {}
        }
    }
    let [name, base] = names.as_slice() else {
        return Err(ParseError::Invalid("CREATE VIEW needs a name and a base graph".to_string()).into());
    };
    Ok(Statement::CreateView(
        TransRuleList::new(name, base, kind, rules).with_query_text(text),
    ))
}

fn trans_rule(pair: Pair<'_, Rule>) -> Result<TransRule> {
    let mut rule = TransRule::default();
    for clause in pair.into_inner() {
        match clause.as_rule() {
            Rule::match_clause => rule.pattern = match_clause(clause)?,
            Rule::where_clause => rule.conditions = where_clause(clause)?,
            Rule::set_clause => rule.skolems.push(set_clause(clause)?),
            Rule::construct_clause => rule.construct.extend(patterns(clause)?),
            Rule::add_clause => rule.add.extend(patterns(clause)?),
            Rule::map_clause => {
                let mut inner = clause.into_inner();
                rule.maps.push(MapPair {
                    from: ident(&mut inner)?,
                    to: ident(&mut inner)?,
                });
            }
            Rule::delete_clause => rule
                .delete
                .extend(clause.into_inner().map(|p| p.as_str().to_string())),
            _ => {}
        }
    }
    Ok(rule)
}

fn query(pairs: Pairs<'_, Rule>) -> Result<GraphQuery> {
    let mut query = GraphQuery::default();
    for pair in pairs {
        match pair.as_rule() {
            Rule::match_clause => query.pattern = match_clause(pair)?,
            Rule::ident => query.graph = pair.as_str().to_string(),
            Rule::where_clause => query.conditions = where_clause(pair)?,
            Rule::return_clause => {
                query.returns = pair.into_inner().map(|p| p.as_str().to_string()).collect();
            }
            _ => {}
        }
    }
    Ok(query)
}

fn match_clause(pair: Pair<'_, Rule>) -> Result<Vec<MatchAtom>> {
    let mut atoms = Vec::new();
    for item in pair.into_inner() {
        let mut negated = false;
        for part in item.into_inner() {
            match part.as_rule() {
                Rule::negation => negated = true,
                Rule::path_pattern => {
                    atoms.extend(
                        path_pattern(part)?
                            .into_iter()
                            .map(|atom| MatchAtom { atom, negated }),
                    );
                }
                _ => {}
            }
        }
    }
    Ok(atoms)
}

/// Atoms of every path pattern under `pair`
fn patterns(pair: Pair<'_, Rule>) -> Result<Vec<PatternAtom>> {
    let mut atoms = Vec::new();
    for p in pair.into_inner() {
        atoms.extend(path_pattern(p)?);
    }
    Ok(atoms)
}

/// `(a:L {k: v})-[e:R]->(b)...` as node, edge and property atoms
fn path_pattern(pair: Pair<'_, Rule>) -> Result<Vec<PatternAtom>> {
    let parts: Vec<Pair<'_, Rule>> = pair.into_inner().collect();
    let node_vars: Vec<String> = parts
        .iter()
        .filter(|p| p.as_rule() == Rule::node_pattern)
        .filter_map(|p| p.clone().into_inner().next())
        .map(|p| p.as_str().to_string())
        .collect();

    let mut atoms = Vec::new();
    let mut node_index: usize = 0;
    for part in parts {
        match part.as_rule() {
            Rule::node_pattern => {
                let mut inner = part.into_inner();
                let var = ident(&mut inner)?;
                let mut label = None;
                let mut props = Vec::new();
                for p in inner {
                    match p.as_rule() {
                        Rule::ident => label = Some(p.as_str().to_string()),
                        Rule::property_map => props = property_map(p)?,
                        _ => {}
                    }
                }
                atoms.push(PatternAtom::node(&var, label.as_deref()));
                atoms.extend(props.into_iter().map(|(key, value)| {
                    PatternAtom::NodeProperty(PropertyAtom {
                        owner: var.clone(),
                        key,
                        value,
                    })
                }));
                node_index += 1;
            }
            Rule::edge_pattern => {
                let from = node_index.checked_sub(1).and_then(|i| node_vars.get(i));
                let (Some(from), Some(to)) = (from, node_vars.get(node_index)) else {
                    return Err(ParseError::Invalid("edge without endpoints".to_string()).into());
                };
                let mut var = None;
                let mut label = EdgeLabel::Any;
                let mut props = Vec::new();
                for p in part.into_inner() {
                    match p.as_rule() {
                        Rule::ident => var = Some(p.as_str().to_string()),
                        Rule::edge_label => label = edge_label(p.as_str())?,
                        Rule::property_map => props = property_map(p)?,
                        _ => {}
                    }
                }
                if !props.is_empty() && var.is_none() {
                    return Err(ParseError::Invalid(format!("edge {from}->{to} has properties but no variable")).into());
                }
                atoms.push(PatternAtom::edge(var.as_deref(), from, to, label));
                if let Some(owner) = var {
                    atoms.extend(props.into_iter().map(|(key, value)| {
                        PatternAtom::EdgeProperty(PropertyAtom {
                            owner: owner.clone(),
                            key,
                            value,
                        })
                    }));
                }
            }
            _ => {}
        }
    }
    Ok(atoms)
}

fn edge_label(text: &str) -> Result<EdgeLabel> {
    let text = text.trim();
    let plain = text.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        Ok(EdgeLabel::Label(text.to_string()))
    } else {
        Ok(EdgeLabel::Path(PathRegex::parse(text)?))
    }
}

fn property_map(pair: Pair<'_, Rule>) -> Result<Vec<(String, Term)>> {
    pair.into_inner()
        .map(|entry| {
            let mut inner = entry.into_inner();
            let key = ident(&mut inner)?;
            let value = inner
                .next()
                .ok_or_else(|| ParseError::Invalid(format!("property '{key}' has no value")))?;
            Ok((key, term(value)?))
        })
        .collect()
}

fn where_clause(pair: Pair<'_, Rule>) -> Result<Vec<WhereCond>> {
    pair.into_inner()
        .map(|condition| {
            let mut inner = condition.into_inner();
            let (Some(left), Some(op), Some(right)) = (inner.next(), inner.next(), inner.next()) else {
                return Err(ParseError::Invalid("incomplete condition".to_string()).into());
            };
            let op = ComparisonOp::parse(op.as_str())
                .ok_or_else(|| ParseError::Invalid(format!("unknown operator '{}'", op.as_str())))?;
            Ok(WhereCond {
                left: operand(left)?,
                op,
                right: operand(right)?,
            })
        })
        .collect()
}

fn operand(pair: Pair<'_, Rule>) -> Result<Operand> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ParseError::Invalid("empty operand".to_string()))?;
    match inner.as_rule() {
        Rule::property_access => {
            let mut parts = inner.into_inner();
            Ok(Operand::Property {
                var: ident(&mut parts)?,
                key: ident(&mut parts)?,
            })
        }
        _ => Ok(Operand::Term(term(inner)?)),
    }
}

fn set_clause(pair: Pair<'_, Rule>) -> Result<SkolemBinding> {
    let mut inner = pair.into_inner();
    let var = ident(&mut inner)?;
    let function = match inner.next() {
        Some(p) if p.as_rule() == Rule::string => string_value(p),
        Some(p) => p.as_str().to_string(),
        None => return Err(ParseError::Invalid(format!("SET {var} has no function")).into()),
    };
    Ok(SkolemBinding {
        var,
        function,
        args: inner.map(|p| p.as_str().to_string()).collect(),
    })
}

/// A `term` pair: string, number or variable (`_` is the placeholder)
fn term(pair: Pair<'_, Rule>) -> Result<Term> {
    let inner = match pair.as_rule() {
        Rule::term => pair
            .into_inner()
            .next()
            .ok_or_else(|| ParseError::Invalid("empty term".to_string()))?,
        _ => pair,
    };
    match inner.as_rule() {
        Rule::ident if inner.as_str() == "_" => Ok(Term::Placeholder),
        Rule::ident => Ok(Term::var(inner.as_str())),
        _ => Ok(Term::Constant(constant(inner)?)),
    }
}

fn constant(pair: Pair<'_, Rule>) -> Result<Value> {
    match pair.as_rule() {
        Rule::string => Ok(Value::String(string_value(pair))),
        Rule::number => pair
            .as_str()
            .parse::<i64>()
            .map(Value::Long)
            .map_err(|e| ParseError::Invalid(format!("bad number '{}': {e}", pair.as_str())).into()),
        _ => Err(ParseError::Invalid(format!("expected a constant, found '{}'", pair.as_str())).into()),
    }
}

fn string_value(pair: Pair<'_, Rule>) -> String {
    let raw = pair.into_inner().next().map_or("", |p| p.as_str());
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}
