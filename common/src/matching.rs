//! 完全一致（部分一致）ルール
//!
//! AIに問い合わせる前の高速判定。大文字小文字の扱いは設定に従う。

/// 照合用に正規化（前後空白除去、必要なら小文字化）
pub fn normalize(value: &str, case_sensitive: bool) -> String {
    let trimmed = value.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// 一致・包含・被包含のいずれかで一致とみなす
///
/// 空文字はどの文字列にも包含されるため、正規化後に空になる値は比較しない
fn contains_either(target: &str, candidate: &str) -> bool {
    if target.is_empty() || candidate.is_empty() {
        return false;
    }
    target == candidate || target.contains(candidate) || candidate.contains(target)
}

/// 完全一致ルール（最初にヒットした時点で打ち切り）
///
/// # Examples
/// ```
/// use sheet_matcher_common::exact_match;
///
/// assert!(exact_match("Apple Inc.", &["Apple".to_string()], false));
/// assert!(exact_match("Apple", &["Apple Inc.".to_string()], false));
/// assert!(!exact_match("Amazon", &["Microsoft".to_string()], false));
/// ```
pub fn exact_match(target: &str, criteria: &[String], case_sensitive: bool) -> bool {
    let target = normalize(target, case_sensitive);
    criteria
        .iter()
        .any(|value| contains_either(&target, &normalize(value, case_sensitive)))
}

/// AI不通時のフォールバック照合（常に大文字小文字を無視）
pub fn basic_match(target: &str, criteria: &[String]) -> bool {
    exact_match(target, criteria, false)
}
