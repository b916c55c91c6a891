//! Best-effort explanation generation. The explainer is a pluggable
//! seam: the default renders a repeated-addition walkthrough locally,
//! but the trait leaves room for an external text-generation backend.
//! Whatever happens here, the solve outcome itself never fails.

use async_trait::async_trait;

use crate::solve::Solved;

/// Substituted when the explainer errors out or exceeds its timeout.
pub const EXPLANATION_PLACEHOLDER: &str = "설명을 생성하지 못했습니다.";

/// How many addition terms to spell out before eliding.
const MAX_SPELLED_TERMS: u64 = 9;

#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, solved: &Solved) -> anyhow::Result<String>;
}

/// Deterministic local explainer: describes the product as repeated
/// addition.
pub struct TemplateExplainer;

#[async_trait]
impl Explainer for TemplateExplainer {
    async fn explain(&self, solved: &Solved) -> anyhow::Result<String> {
        let Solved {
            multiplier,
            multiplicand,
            answer,
            ..
        } = *solved;

        if multiplicand == 0 || multiplier == 0 {
            return Ok(format!(
                "{multiplier}×{multiplicand}는 0을 곱한 것이므로 결과는 0입니다."
            ));
        }

        let text = if multiplicand <= MAX_SPELLED_TERMS {
            let terms = vec![multiplier.to_string(); multiplicand as usize].join("+");
            format!("{multiplier}×{multiplicand}는 {terms}={answer}와 같습니다.")
        } else {
            format!("{multiplier}×{multiplicand}는 {multiplier}을 {multiplicand}번 더한 값인 {answer}입니다.")
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solve::solve;

    #[tokio::test]
    async fn explains_as_repeated_addition() {
        let solved = solve("7×3=").unwrap();
        let text = TemplateExplainer.explain(&solved).await.unwrap();
        assert!(text.contains("7+7+7=21"), "got: {text}");
    }

    #[tokio::test]
    async fn elides_long_addition_chains() {
        let solved = solve("3×100=").unwrap();
        let text = TemplateExplainer.explain(&solved).await.unwrap();
        assert!(text.contains("100번"), "got: {text}");
        assert!(!text.contains("3+3+3+3+3+3+3+3+3+3"), "got: {text}");
    }

    #[tokio::test]
    async fn explains_multiplication_by_zero() {
        let solved = solve("0×100=").unwrap();
        let text = TemplateExplainer.explain(&solved).await.unwrap();
        assert!(text.contains('0'), "got: {text}");
    }
}
