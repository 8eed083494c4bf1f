//! 逐次絞り込みエンジンのテスト
//!
//! 条件の順序を入れ替えても一致する行の集合と順序が変わらないことを
//! プロパティテストで確認する

mod common;

use common::{strings, ScriptedOracle};
use proptest::prelude::*;
use sheet_matcher::engine::filter_batch;
use sheet_matcher::matcher::Matcher;
use sheet_matcher::CancelFlag;
use sheet_matcher_common::{AiConfig, Criterion, MatchType, TargetRow};

const WORDS: [&str; 5] = ["red", "green", "blue", "", "Red Planet"];

fn criterion(target_column: usize, values: &[&str]) -> Criterion {
    Criterion {
        id: target_column as u32,
        name: format!("col{}", target_column),
        target_column_index: target_column,
        values: strings(values),
        ..Criterion::default()
    }
}

fn target_rows(cells: &[Vec<usize>]) -> Vec<TargetRow> {
    cells
        .iter()
        .enumerate()
        .map(|(i, row)| TargetRow::new(row.iter().map(|w| WORDS[*w].to_string()).collect(), i))
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn matched_names(
    rows: &[TargetRow],
    criteria: &[Criterion],
    ai: &AiConfig,
    oracle: &ScriptedOracle,
) -> Vec<Vec<String>> {
    let matcher = Matcher::new(oracle, ai);
    filter_batch(rows, criteria, ai, &matcher, &CancelFlag::new())
        .await
        .unwrap()
        .matched
        .into_iter()
        .map(|r| r.data)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_criteria_order_does_not_change_matches(
        cells in prop::collection::vec(prop::collection::vec(0usize..WORDS.len(), 3), 0..12),
        rotation in 0usize..3,
    ) {
        let rows = target_rows(&cells);
        let criteria = vec![
            criterion(0, &["red"]),
            criterion(1, &["green", "blue"]),
            criterion(2, &["planet", "blue"]),
        ];
        let mut reordered = criteria.clone();
        reordered.rotate_left(rotation);
        reordered.swap(0, 1);

        let ai = AiConfig::default();
        let oracle = ScriptedOracle::new().answer("green", 80);

        let rt = runtime();
        let original = rt.block_on(matched_names(&rows, &criteria, &ai, &oracle));
        let shuffled = rt.block_on(matched_names(&rows, &reordered, &ai, &oracle));
        prop_assert_eq!(original, shuffled);
    }
}

#[tokio::test]
async fn test_short_circuit_skips_remaining_criteria() {
    let ai = AiConfig::default();
    let oracle = ScriptedOracle::new();
    let matcher = Matcher::new(&oracle, &ai);
    let rows = target_rows(&[vec![1, 1, 1], vec![2, 2, 2]]);
    let criteria = vec![criterion(0, &["red"]), criterion(1, &["red"])];

    let outcome = filter_batch(&rows, &criteria, &ai, &matcher, &CancelFlag::new())
        .await
        .unwrap();

    assert!(outcome.matched.is_empty());
    // 1件目の条件で2行とも脱落するので、2件目の条件ではオラクルを呼ばない
    assert_eq!(oracle.calls(), 2);
    assert_eq!(outcome.oracle_calls, 2);
}

#[tokio::test]
async fn test_threshold_boundary_keeps_match_type() {
    let ai = AiConfig::default();
    let oracle = ScriptedOracle::new()
        .answer("Alphabet", 70)
        .answer("Meta", 69);
    let matcher = Matcher::new(&oracle, &ai);
    let rows = vec![
        TargetRow::new(strings(&["Alphabet"]), 0),
        TargetRow::new(strings(&["Meta"]), 1),
    ];
    let criteria = vec![criterion(0, &["Google"])];

    let outcome = filter_batch(&rows, &criteria, &ai, &matcher, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(outcome.matched.len(), 1);
    let row = &outcome.matched[0];
    assert_eq!(row.data, strings(&["Alphabet"]));
    assert_eq!(row.average_confidence, 70);
    assert_eq!(row.match_types, vec![MatchType::Ai]);
    assert_eq!(row.match_details[0].criterion_name, "col0");
    assert_eq!(row.match_details[0].target_value, "Alphabet");

    let below = matcher.evaluate("Meta", &strings(&["Google"]), 70, false).await.unwrap();
    assert!(!below.is_match);
    assert_eq!(below.confidence, 69);
    assert_eq!(below.match_type, MatchType::Ai);
}

#[tokio::test]
async fn test_average_confidence_and_distinct_types() {
    let ai = AiConfig::default();
    let oracle = ScriptedOracle::new().answer("Alphabet", 80);
    let matcher = Matcher::new(&oracle, &ai);
    let rows = vec![TargetRow::new(strings(&["Alphabet", "Paris", "Dev"]), 0)];
    let criteria = vec![
        criterion(0, &["Google"]),
        criterion(1, &["paris"]),
        criterion(2, &["Dev"]),
    ];

    let outcome = filter_batch(&rows, &criteria, &ai, &matcher, &CancelFlag::new())
        .await
        .unwrap();

    let row = &outcome.matched[0];
    // round((80 + 95 + 95) / 3) = 90
    assert_eq!(row.average_confidence, 90);
    assert_eq!(row.match_types, vec![MatchType::Ai, MatchType::Exact]);
    assert_eq!(outcome.oracle_calls, 1);
}

#[tokio::test]
async fn test_case_sensitive_exact_match() {
    let ai = AiConfig {
        enabled: false,
        case_sensitive: true,
        ..AiConfig::default()
    };
    let matcher = Matcher::exact_only(&ai);
    let rows = vec![
        TargetRow::new(strings(&["google"]), 0),
        TargetRow::new(strings(&["Google LLC"]), 1),
    ];
    let criteria = vec![criterion(0, &["Google"])];

    let outcome = filter_batch(&rows, &criteria, &ai, &matcher, &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(outcome.matched.len(), 1);
    assert_eq!(outcome.matched[0].data, strings(&["Google LLC"]));
}
