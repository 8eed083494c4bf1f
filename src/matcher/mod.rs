//! 条件照合
//!
//! 1. 完全一致（部分一致を含む）ルールで即決
//! 2. 決まらなければAIオラクルへ委譲し、ユーザー閾値を適用

use crate::error::Result;
use crate::oracle::Oracle;
use sheet_matcher_common::{exact_match, AiConfig, MatchResult};

pub struct Matcher<'a> {
    /// AI無効時は None
    oracle: Option<&'a dyn Oracle>,
    ai: &'a AiConfig,
}

impl<'a> Matcher<'a> {
    pub fn new(oracle: &'a dyn Oracle, ai: &'a AiConfig) -> Self {
        Self {
            oracle: ai.enabled.then_some(oracle),
            ai,
        }
    }

    /// 完全一致のみで判定するマッチャー
    pub fn exact_only(ai: &'a AiConfig) -> Self {
        Self { oracle: None, ai }
    }

    pub fn uses_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    /// 1値を条件値リストに対して評価
    ///
    /// AIの信頼度が閾値未満の場合も、信頼度と種別は診断用に保持して返す
    pub async fn evaluate(
        &self,
        target: &str,
        criteria: &[String],
        threshold: u8,
        case_sensitive: bool,
    ) -> Result<MatchResult> {
        if exact_match(target, criteria, case_sensitive) {
            return Ok(MatchResult::exact());
        }

        let oracle = match self.oracle {
            Some(oracle) if !criteria.is_empty() => oracle,
            Some(_) => return Ok(MatchResult::none("criterion has no values")),
            None => return Ok(MatchResult::none("no exact match found")),
        };

        let result = oracle.classify(target, criteria, self.ai).await?;
        if result.confidence >= threshold {
            Ok(result)
        } else {
            Ok(result.below_threshold(threshold))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatcherError;
    use async_trait::async_trait;
    use sheet_matcher_common::MatchType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 固定の信頼度を返すオラクル
    struct FixedOracle {
        confidence: u8,
        calls: AtomicUsize,
    }

    impl FixedOracle {
        fn new(confidence: u8) -> Self {
            Self { confidence, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Oracle for FixedOracle {
        async fn classify(&self, _: &str, _: &[String], _: &AiConfig) -> Result<MatchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MatchResult {
                is_match: true,
                confidence: self.confidence,
                match_type: MatchType::Ai,
                details: "YES".into(),
            })
        }
    }

    struct MissingKeyOracle;

    #[async_trait]
    impl Oracle for MissingKeyOracle {
        async fn classify(&self, _: &str, _: &[String], _: &AiConfig) -> Result<MatchResult> {
            Err(MatcherError::MissingApiKey)
        }
    }

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_exact_match_short_circuits_oracle() {
        let oracle = FixedOracle::new(10);
        let ai = AiConfig::default();
        let matcher = Matcher::new(&oracle, &ai);

        for (target, list) in [("Apple Inc.", "Apple"), ("Apple", "Apple Inc.")] {
            let result = matcher.evaluate(target, &values(&[list]), 70, false).await.unwrap();
            assert!(result.is_match);
            assert_eq!(result.confidence, 95);
            assert_eq!(result.match_type, MatchType::Exact);
        }
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_threshold_boundary_is_inclusive() {
        let ai = AiConfig::default();

        let at = FixedOracle::new(70);
        let result = Matcher::new(&at, &ai)
            .evaluate("Alphabet", &values(&["Google"]), 70, false)
            .await
            .unwrap();
        assert!(result.is_match);
        assert_eq!(result.confidence, 70);

        let below = FixedOracle::new(69);
        let result = Matcher::new(&below, &ai)
            .evaluate("Alphabet", &values(&["Google"]), 70, false)
            .await
            .unwrap();
        assert!(!result.is_match);
        assert_eq!(result.confidence, 69);
        assert_eq!(result.match_type, MatchType::Ai);
    }

    #[tokio::test]
    async fn test_disabled_oracle_yields_none() {
        let oracle = FixedOracle::new(100);
        let ai = AiConfig { enabled: false, ..AiConfig::default() };
        let matcher = Matcher::new(&oracle, &ai);
        assert!(!matcher.uses_oracle());

        let result = matcher.evaluate("Amazon", &values(&["Microsoft"]), 70, false).await.unwrap();
        assert!(!result.is_match);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.match_type, MatchType::None);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_criteria_skips_oracle() {
        let oracle = FixedOracle::new(100);
        let ai = AiConfig::default();
        let result = Matcher::new(&oracle, &ai)
            .evaluate("Amazon", &[], 70, false)
            .await
            .unwrap();
        assert_eq!(result.match_type, MatchType::None);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fatal_oracle_error_propagates() {
        let ai = AiConfig::default();
        let result = Matcher::new(&MissingKeyOracle, &ai)
            .evaluate("Amazon", &values(&["Microsoft"]), 70, false)
            .await;
        assert!(matches!(result, Err(MatcherError::MissingApiKey)));
    }
}
