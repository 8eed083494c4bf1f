//! AI応答テキストの解釈
//!
//! 明示的なパーセンテージを優先し、無ければ定性的な表現を信頼度帯に割り当てる

use lazy_static::lazy_static;
use regex::Regex;
use sheet_matcher_common::{MatchResult, MatchType};

/// どの表現にも当てはまらない場合の信頼度
pub const DEFAULT_CONFIDENCE: u8 = 50;

lazy_static! {
    static ref PERCENT: Regex = Regex::new(r"(\d+)\s*%").unwrap();

    // 否定・限定つきの表現は、それを含む肯定語より先に判定する
    static ref BANDS: Vec<(u8, Regex)> = vec![
        (90, Regex::new(r"\b(very likely|très probable|certain|certainly|definitely)\b").unwrap()),
        (25, Regex::new(r"\b(unlikely|peu probable|doubtful)\b").unwrap()),
        (10, Regex::new(r"\b(impossible|non|no|not)\b").unwrap()),
        (75, Regex::new(r"\b(likely|probable|oui|yes)\b").unwrap()),
        (50, Regex::new(r"\b(possible|maybe|perhaps)\b").unwrap()),
    ];

    static ref AFFIRMATIVE: Regex = Regex::new(r"\b(oui|yes|match)\b").unwrap();
}

/// 応答から信頼度（0..=100）を取り出す
pub fn extract_confidence(response: &str) -> u8 {
    let lowered = response.to_lowercase();

    if let Some(caps) = PERCENT.captures(&lowered) {
        if let Ok(value) = caps[1].parse::<u64>() {
            return value.min(100) as u8;
        }
    }

    BANDS
        .iter()
        .find(|(_, pattern)| pattern.is_match(&lowered))
        .map(|(confidence, _)| *confidence)
        .unwrap_or(DEFAULT_CONFIDENCE)
}

/// 肯定語（oui / yes / match）を含む
pub fn is_affirmative(response: &str) -> bool {
    AFFIRMATIVE.is_match(&response.to_lowercase())
}

/// 応答テキスト → MatchResult（matchType = ai）
pub fn interpret_response(response: &str, threshold: u8) -> MatchResult {
    let text = response.trim();
    let confidence = extract_confidence(text);
    MatchResult {
        is_match: confidence >= threshold || is_affirmative(text),
        confidence,
        match_type: MatchType::Ai,
        details: text.to_string(),
    }
}
