//! Splits a SQL script into individually executable statements.
//!
//! The splitter is a heuristic, not a SQL parser: comments are stripped, the
//! script is flattened to a single line and cut at every `;`. Trigger and
//! procedure bodies, which contain their own semicolons, are re-joined until
//! their closing `END` so they reach the server as one statement.
//!
//! Known limits: a `;` or `--` inside a string literal is treated as syntax,
//! `/* */` block comments are kept as-is, and the alternative terminators
//! `//` and `&&` are removed wherever they appear.

use super::types::Statement;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use tracing::{debug, warn};

static COMPOUND_OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(?:/\*.*?\*/\s*)*CREATE\s+(DEFINER\s*=\s*\S+\s+)?(TRIGGER|PROCEDURE)\b")
        .expect("compound opener pattern is valid")
});

static END_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bEND\s*\$\$").expect("end marker pattern is valid"));

// Client directive, only recognised in upper case at the start of a line.
static DELIMITER_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*DELIMITER\s+(\$\$)?").expect("delimiter pattern is valid"));

/// Turns raw SQL text into an ordered list of statements.
pub trait StatementSplitter: Send + Sync {
    fn split(&self, raw_sql: &str) -> Vec<Statement>;
}

/// The default line-oriented splitter.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicSplitter;

impl HeuristicSplitter {
    pub fn new() -> Self {
        Self
    }
}

impl StatementSplitter for HeuristicSplitter {
    fn split(&self, raw_sql: &str) -> Vec<Statement> {
        split_statements(raw_sql)
    }
}

/// Splits `raw_sql` with the [`HeuristicSplitter`] rules.
pub fn split_statements(raw_sql: &str) -> Vec<Statement> {
    let text = normalize(raw_sql);
    let mut pending: VecDeque<String> = text
        .split(';')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .collect();

    let mut statements = Vec::new();
    let mut block: Vec<String> = Vec::new();
    let mut in_block = false;

    while let Some(candidate) = pending.pop_front() {
        if !in_block && COMPOUND_OPENER.is_match(&candidate) {
            in_block = true;
        }

        if !in_block {
            statements.push(Statement::new(format!("{candidate};")));
            continue;
        }

        if let Some(marker) = END_MARKER.find(&candidate) {
            // `END$$` closes the block; anything after the marker starts over.
            let head = candidate[..marker.start()].trim();
            block.push(if head.is_empty() {
                "END".to_string()
            } else {
                format!("{head} END")
            });
            let rest = candidate[marker.end()..].trim();
            if !rest.is_empty() {
                pending.push_front(rest.to_string());
            }
            statements.push(close_block(&mut block));
            in_block = false;
        } else if candidate.eq_ignore_ascii_case("END") {
            block.push(candidate);
            statements.push(close_block(&mut block));
            in_block = false;
        } else {
            block.push(candidate);
        }
    }

    if !block.is_empty() {
        warn!(
            parts = block.len(),
            "dropping compound statement without a closing END: {}",
            preview(&block[0])
        );
    }

    debug!(count = statements.len(), "split SQL into statements");
    statements
}

fn close_block(block: &mut Vec<String>) -> Statement {
    let statement = Statement::new(format!("{};", block.join("; ")));
    block.clear();
    statement
}

/// Strips line comments, drops blank lines, collapses whitespace and removes
/// client-side `DELIMITER` directives and their alternative terminators.
fn normalize(raw_sql: &str) -> String {
    let joined = raw_sql
        .lines()
        .map(|line| DELIMITER_DIRECTIVE.replace(strip_line_comment(line), ""))
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let cleaned = joined.replace("//", "").replace("&&", "");

    collapse_whitespace(&cleaned)
}

fn strip_line_comment(line: &str) -> &str {
    match line.find("--") {
        Some(start) => &line[..start],
        None => line,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn preview(text: &str) -> String {
    const MAX: usize = 60;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    }
}
