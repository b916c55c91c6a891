//! Free-text request parsing. Pure and synchronous: identical input
//! always yields identical output, and unparsable text is a normal
//! branch, never an error.

use std::sync::OnceLock;

use regex::Regex;

use gugudan_core::problem::TableWalkRequest;

/// `"5단"` — digits followed by the table unit marker.
fn table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*단").expect("valid table regex"))
}

/// `"정답이 30에 도달하면"` — the stop-threshold phrase.
fn stop_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"정답이\s*(\d+)에\s*도달하면").expect("valid stop regex"))
}

/// Result of parsing a user message. `table == None` means the command
/// was not understood.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedRequest {
    pub table: Option<u32>,
    pub stop_value: Option<i64>,
}

impl ParsedRequest {
    /// Promote to a walk request if a table number was recognized.
    pub fn into_request(self) -> Option<TableWalkRequest> {
        self.table.map(|table| TableWalkRequest {
            table,
            stop_value: self.stop_value,
        })
    }
}

/// Extract the table number and optional stop threshold from free-form
/// text. First match wins for each.
pub fn parse(text: &str) -> ParsedRequest {
    let table = table_pattern()
        .captures(text)
        .and_then(|c| c[1].parse().ok());
    let stop_value = stop_pattern()
        .captures(text)
        .and_then(|c| c[1].parse().ok());
    ParsedRequest { table, stop_value }
}
