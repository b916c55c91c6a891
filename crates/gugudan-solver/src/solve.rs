//! Pure computation: parse a `"N×i="` problem and produce the answer.

use std::sync::OnceLock;

use regex::Regex;

/// Problem text must lead with this shape; anything else is rejected.
fn problem_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)×(\d+)=").expect("valid problem regex"))
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("올바르지 않은 문제 형식입니다: {0}")]
    Malformed(String),
    #[error("계산 범위를 벗어났습니다: {0}")]
    Overflow(String),
}

/// A solved problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solved {
    pub multiplier: u64,
    pub multiplicand: u64,
    pub answer: i64,
    pub calculation: String,
}

/// Solve a `"N×i="` problem. Fails on any text that does not lead with
/// the digits-×-digits-= shape.
pub fn solve(problem: &str) -> Result<Solved, SolveError> {
    let caps = problem_pattern()
        .captures(problem)
        .ok_or_else(|| SolveError::Malformed(problem.to_string()))?;

    let multiplier: u64 = caps[1]
        .parse()
        .map_err(|_| SolveError::Overflow(problem.to_string()))?;
    let multiplicand: u64 = caps[2]
        .parse()
        .map_err(|_| SolveError::Overflow(problem.to_string()))?;

    let answer = multiplier
        .checked_mul(multiplicand)
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| SolveError::Overflow(problem.to_string()))?;

    Ok(Solved {
        multiplier,
        multiplicand,
        answer,
        calculation: format!("{multiplier}×{multiplicand}={answer}"),
    })
}
