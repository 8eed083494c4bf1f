use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheet-matcher")]
#[command(about = "スプレッドシート行の多条件照合ツール（完全一致 + AI判定）", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// ジョブファイルに従って照合し、結果をエクスポート
    Run {
        /// ジョブファイル（JSON）
        #[arg(required = true)]
        job: PathBuf,

        /// 処理する対象行数の上限
        #[arg(long)]
        rows_limit: Option<usize>,

        /// 信頼度の閾値（0-100）
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,

        /// AI判定を使わず完全一致のみで照合
        #[arg(long)]
        no_ai: bool,

        /// 段階的エクスポートを無効化（最後に一括で書き出す）
        #[arg(long)]
        no_export_progressive: bool,
    },

    /// 対象データと条件を読み込み、バッチ計画を表示（AIは呼ばない）
    Plan {
        /// ジョブファイル（JSON）
        #[arg(required = true)]
        job: PathBuf,

        /// 処理する対象行数の上限
        #[arg(long)]
        rows_limit: Option<usize>,
    },

    /// 1つの値を条件値リストに対して判定
    Check {
        /// 判定する値
        value: String,

        /// 条件値
        #[arg(required = true)]
        criteria: Vec<String>,

        /// 信頼度の閾値（0-100）
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,

        /// AI判定を使わず完全一致のみで照合
        #[arg(long)]
        no_ai: bool,
    },

    /// 設定を管理
    Config {
        /// OpenAI APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}
