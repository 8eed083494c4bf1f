//! プロンプト生成モジュール
//!
//! AI照合で使うプロンプト:
//! - DEFAULT_MATCH_PROMPT: systemメッセージの既定値
//! - build_user_message: 照合値と条件リストを埋め込んだuserメッセージ

/// 既定のsystemプロンプト
pub const DEFAULT_MATCH_PROMPT: &str = r#"You are an assistant specialised in matching spreadsheet values. Decide whether a value corresponds to one of the values in a list, allowing for common variations.

Matching rules:
1. Ignore differences in case
2. Ignore extra whitespace at the start and end
3. Accept minor spelling variations (1-2 characters)
4. Accept translations between French and English for common terms
5. Accept common abbreviations (e.g. "Dev" for "Developer")

Valid matches:
- "Google" and "google" -> YES
- "Développeur" and "Developer" -> YES
- "Chef de projet" and "Project Manager" -> YES
- "Apple Inc." and "Apple" -> YES
- "Microsoft Corp" and "Microsoft" -> YES

Non-matches:
- "Microsoft" and "Amazon" -> NO
- "Developer" and "Accountant" -> NO
- "Paris" and "London" -> NO

Answer only "YES" if the values match according to these rules, or "NO" if they do not."#;

/// 条件値リストを上限件数で切り詰める
pub fn truncate_criteria(criteria: &[String], max: usize) -> &[String] {
    &criteria[..criteria.len().min(max)]
}

/// userメッセージ生成
///
/// # Arguments
/// * `target` - 照合対象の値
/// * `criteria` - 条件値（`max_criteria` 件まで使用）
/// * `max_criteria` - プロンプトに含める条件値の上限
pub fn build_user_message(target: &str, criteria: &[String], max_criteria: usize) -> String {
    let list = truncate_criteria(criteria, max_criteria).join(", ");
    format!(
        "Value to check: \"{}\"\nCriteria list: {}\n\nDoes the value correspond to one of the criteria in the list?",
        target, list
    )
}
