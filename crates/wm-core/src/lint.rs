//! Static checks over a migration set.
//!
//! Two kinds of findings:
//!
//! - **Overlap**: the same structural change (a table, a column, an index or
//!   a policy) is introduced by more than one migration. Guards keep this
//!   from failing at apply time, but it usually means two scripts were
//!   written for the same fix and one of them should be retired.
//! - **Unguarded**: a structural change without an `IF NOT EXISTS` guard and
//!   without a catalog probe anywhere in the unit, so re-running the unit
//!   after a partial application would fail.
//!
//! Detection reads sqlparser tokens, so literals, quoted identifiers and
//! comments never count as DDL. It never changes what the runner does.

use crate::discovery::MigrationSet;
use crate::sql_utils::{is_word, significant_tokens};
use crate::version::MigrationVersion;
use serde::Serialize;
use sqlparser::tokenizer::Token;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of structural change found in a migration body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    CreateTable,
    AddColumn,
    CreateIndex,
    CreatePolicy,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::CreateTable => write!(f, "create table"),
            ChangeKind::AddColumn => write!(f, "add column"),
            ChangeKind::CreateIndex => write!(f, "create index"),
            ChangeKind::CreatePolicy => write!(f, "create policy"),
        }
    }
}

/// One structural change extracted from a migration body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralChange {
    pub kind: ChangeKind,
    /// Lowercased, unquoted target (`bookings.camera_id` for columns)
    pub target: String,
    /// Whether the statement carries an inline `IF NOT EXISTS`
    pub guarded: bool,
}

/// A lint finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum LintFinding {
    Overlap {
        kind: ChangeKind,
        target: String,
        versions: Vec<MigrationVersion>,
    },
    Unguarded {
        version: MigrationVersion,
        kind: ChangeKind,
        target: String,
    },
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintFinding::Overlap {
                kind,
                target,
                versions,
            } => {
                let versions: Vec<&str> = versions.iter().map(|v| v.as_str()).collect();
                write!(
                    f,
                    "overlap: {} {} appears in migrations {}",
                    kind,
                    target,
                    versions.join(", ")
                )
            }
            LintFinding::Unguarded {
                version,
                kind,
                target,
            } => write!(
                f,
                "unguarded: migration {} runs {} {} without an existence check",
                version, kind, target
            ),
        }
    }
}

const IF_NOT_EXISTS: &[&str] = &["if", "not", "exists"];

/// Words that follow `ADD` but do not introduce a column
const NON_COLUMN_ADDS: &[&str] = &["constraint", "primary", "foreign", "unique", "check"];

/// Catalog names whose presence marks a unit as probing before it alters
const CATALOG_PROBES: &[&str] = &[
    "information_schema",
    "pg_catalog",
    "pg_policies",
    "pg_indexes",
    "duckdb_columns",
    "duckdb_tables",
    "duckdb_indexes",
];

/// Forward-only reader over the tokens of one statement.
struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn peek_word(&self, word: &str) -> bool {
        self.tokens.get(self.pos).is_some_and(|t| is_word(t, word))
    }

    fn eat(&mut self, word: &str) -> bool {
        let found = self.peek_word(word);
        if found {
            self.pos += 1;
        }
        found
    }

    /// Consume `words` only if all of them follow in order.
    fn eat_all(&mut self, words: &[&str]) -> bool {
        let found = words.iter().enumerate().all(|(offset, word)| {
            self.tokens
                .get(self.pos + offset)
                .is_some_and(|t| is_word(t, word))
        });
        if found {
            self.pos += words.len();
        }
        found
    }

    /// A single identifier, lowercased, quoted or not.
    fn ident(&mut self) -> Option<String> {
        match self.tokens.get(self.pos) {
            Some(Token::Word(w)) => {
                self.pos += 1;
                Some(w.value.to_lowercase())
            }
            _ => None,
        }
    }

    /// A possibly qualified name such as `public.bookings`.
    fn object_name(&mut self) -> Option<String> {
        let mut parts = vec![self.ident()?];
        while matches!(self.tokens.get(self.pos), Some(Token::Period)) {
            self.pos += 1;
            parts.push(self.ident()?);
        }
        Some(parts.join("."))
    }
}

/// Extract the structural changes a migration body makes.
///
/// A body that does not tokenize yields no changes.
pub fn structural_changes(body: &str) -> Vec<StructuralChange> {
    significant_tokens(body)
        .map(|tokens| changes_in(&tokens))
        .unwrap_or_default()
}

fn changes_in(tokens: &[Token]) -> Vec<StructuralChange> {
    let mut changes = Vec::new();
    for statement in tokens.split(|t| matches!(t, Token::SemiColon)) {
        for (i, token) in statement.iter().enumerate() {
            if is_word(token, "create") {
                changes.extend(create_change(&mut Cursor::new(&statement[i + 1..])));
            } else if is_word(token, "alter")
                && statement.get(i + 1).is_some_and(|t| is_word(t, "table"))
            {
                add_column_changes(&mut Cursor::new(&statement[i + 2..]), &mut changes);
                break;
            }
        }
    }
    changes
}

/// Everything after `CREATE`.
fn create_change(c: &mut Cursor<'_>) -> Option<StructuralChange> {
    c.eat_all(&["or", "replace"]);
    let _ = c.eat("temp") || c.eat("temporary");
    let unique = c.eat("unique");

    if !unique && c.eat("table") {
        let guarded = c.eat_all(IF_NOT_EXISTS);
        return Some(StructuralChange {
            kind: ChangeKind::CreateTable,
            target: c.object_name()?,
            guarded,
        });
    }

    if c.eat("index") {
        c.eat("concurrently");
        let guarded = c.eat_all(IF_NOT_EXISTS);
        // Unnamed indexes cannot collide by name
        if c.peek_word("on") {
            return None;
        }
        return Some(StructuralChange {
            kind: ChangeKind::CreateIndex,
            target: c.object_name()?,
            guarded,
        });
    }

    if !unique && c.eat("policy") {
        let policy = c.ident()?;
        if !c.eat("on") {
            return None;
        }
        let table = c.object_name()?;
        return Some(StructuralChange {
            kind: ChangeKind::CreatePolicy,
            target: format!("{table}.{policy}"),
            guarded: false,
        });
    }
    None
}

/// Everything after `ALTER TABLE`, up to the end of the statement.
fn add_column_changes(c: &mut Cursor<'_>, changes: &mut Vec<StructuralChange>) {
    c.eat_all(&["if", "exists"]);
    c.eat("only");
    let Some(table) = c.object_name() else {
        return;
    };

    let mut depth = 0usize;
    while let Some(token) = c.advance() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            t if depth == 0 && is_word(t, "add") => {
                let column_keyword = c.eat("column");
                let guarded = c.eat_all(IF_NOT_EXISTS);
                if !column_keyword && NON_COLUMN_ADDS.iter().any(|w| c.peek_word(w)) {
                    continue;
                }
                if let Some(column) = c.ident() {
                    changes.push(StructuralChange {
                        kind: ChangeKind::AddColumn,
                        target: format!("{table}.{column}"),
                        guarded,
                    });
                }
            }
            _ => {}
        }
    }
}

/// Whether a unit checks the catalog before changing it.
fn probes_catalog(tokens: &[Token]) -> bool {
    const DROP_POLICY_GUARD: [&str; 4] = ["drop", "policy", "if", "exists"];
    tokens
        .iter()
        .any(|t| CATALOG_PROBES.iter().any(|probe| is_word(t, probe)))
        || tokens.windows(DROP_POLICY_GUARD.len()).any(|window| {
            window
                .iter()
                .zip(DROP_POLICY_GUARD)
                .all(|(t, word)| is_word(t, word))
        })
}

/// Run all checks over a migration set.
///
/// Overlaps are reported first, ordered by kind then target; unguarded
/// statements follow in version order.
pub fn lint(set: &MigrationSet) -> Vec<LintFinding> {
    let mut touched: BTreeMap<(ChangeKind, String), Vec<MigrationVersion>> = BTreeMap::new();
    let mut unguarded = Vec::new();

    for unit in set {
        let Some(tokens) = significant_tokens(&unit.body) else {
            log::warn!("Skipping lint of {}: body does not tokenize", unit.label());
            continue;
        };
        let probed = probes_catalog(&tokens);
        for change in changes_in(&tokens) {
            if !change.guarded && !probed {
                unguarded.push(LintFinding::Unguarded {
                    version: unit.version.clone(),
                    kind: change.kind,
                    target: change.target.clone(),
                });
            }
            let versions = touched.entry((change.kind, change.target)).or_default();
            if versions.last() != Some(&unit.version) {
                versions.push(unit.version.clone());
            }
        }
    }

    let mut findings: Vec<LintFinding> = touched
        .into_iter()
        .filter(|(_, versions)| versions.len() > 1)
        .map(|((kind, target), versions)| LintFinding::Overlap {
            kind,
            target,
            versions,
        })
        .collect();
    findings.extend(unguarded);
    findings
}

#[cfg(test)]
#[path = "lint_test.rs"]
mod tests;
