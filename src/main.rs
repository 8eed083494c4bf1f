use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use sheet_matcher::cli::{Cli, Commands};
use sheet_matcher::config::{Config, RunConfig};
use sheet_matcher::job::{Backend, JobFile};
use sheet_matcher::matcher::Matcher;
use sheet_matcher::oracle::{AiOracle, HttpChatBackend, Oracle};
use sheet_matcher::progress::ConsoleProgress;
use sheet_matcher::sheets::{
    GoogleSheetsClient, RefreshTokenProvider, RowSource, SheetSink, StaticToken, TokenProvider,
    XlsxBackend,
};
use sheet_matcher::{CancelFlag, MatchJob, MatchRun, MatcherError, RunPhase};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let mut config = Config::load()?;

    match cli.command {
        Commands::Run {
            job,
            rows_limit,
            threshold,
            no_ai,
            no_export_progressive,
        } => {
            println!("🔎 sheet-matcher - 照合実行\n");

            if rows_limit.is_some() {
                config.processing.rows_limit = rows_limit;
            }
            if let Some(threshold) = threshold {
                config.ai.threshold = threshold;
            }
            if no_ai {
                config.ai.enabled = false;
            }
            if no_export_progressive {
                config.export.enabled = false;
            }
            let run_config = config.run_config()?;

            let (backend, job) = load_job(&job)?;
            let oracle = build_oracle(&config, &run_config);
            match backend {
                Backend::Xlsx => execute(&XlsxBackend::new(), &run_config, &oracle, job).await?,
                Backend::Google => {
                    execute(&google_client(&config)?, &run_config, &oracle, job).await?
                }
            }
        }

        Commands::Plan { job, rows_limit } => {
            println!("📋 sheet-matcher - バッチ計画\n");

            if rows_limit.is_some() {
                config.processing.rows_limit = rows_limit;
            }
            let run_config = config.run_config()?;
            let (backend, job) = load_job(&job)?;
            let oracle = build_oracle(&config, &run_config);
            match backend {
                Backend::Xlsx => plan(&XlsxBackend::new(), &run_config, &oracle, job).await?,
                Backend::Google => {
                    plan(&google_client(&config)?, &run_config, &oracle, job).await?
                }
            }
        }

        Commands::Check {
            value,
            criteria,
            threshold,
            no_ai,
        } => {
            if let Some(threshold) = threshold {
                config.ai.threshold = threshold;
            }
            if no_ai {
                config.ai.enabled = false;
            }
            let run_config = config.run_config()?;
            let oracle = build_oracle(&config, &run_config);
            let matcher = Matcher::new(&oracle, &run_config.ai);

            let result = matcher
                .evaluate(
                    &value,
                    &criteria,
                    run_config.ai.threshold,
                    run_config.ai.case_sensitive,
                )
                .await?;

            println!("値: {}", value);
            println!("  判定: {}", if result.is_match { "一致" } else { "不一致" });
            println!("  信頼度: {}%", result.confidence);
            println!("  種別: {}", result.match_type);
            println!("  詳細: {}", result.details);
        }

        Commands::Config { set_api_key, show } => {
            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定: {}", Config::config_path()?.display());
                println!("  モデル: {}", config.ai.model);
                println!("  閾値: {}%", config.ai.threshold);
                println!("  再試行: {}回 / {}ms", config.ai.retry_attempts, config.ai.batch_delay_ms);
                println!("  フォールバック照合: {}", on_off(config.ai.fallback_matching));
                println!("  大文字小文字の区別: {}", on_off(config.ai.case_sensitive));
                println!(
                    "  段階的エクスポート: {} ({}行ごと, {}ms間隔)",
                    on_off(config.export.enabled),
                    config.export.chunk_size,
                    config.export.batch_delay_ms
                );
                println!("  基準バッチサイズ: {}", config.processing.base_batch_size);
                println!(
                    "  APIキー: {}",
                    if config.get_api_key().is_ok() { "設定済み" } else { "未設定" }
                );
                println!(
                    "  Google認証: {}",
                    if config.google_oauth.is_some() || config.google_token().is_some() {
                        "設定済み"
                    } else {
                        "未設定"
                    }
                );
            }
        }
    }

    Ok(())
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "有効"
    } else {
        "無効"
    }
}

fn load_job(path: &Path) -> anyhow::Result<(Backend, MatchJob)> {
    let file = JobFile::load(path)?;
    let backend = file.backend;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let job = file
        .into_job(&base_dir)
        .with_context(|| format!("ジョブファイルが不正です: {}", path.display()))?;
    Ok((backend, job))
}

fn build_oracle(config: &Config, run_config: &RunConfig) -> AiOracle<HttpChatBackend> {
    let backend = HttpChatBackend::new(config.api_url.clone(), config.get_api_key().ok());
    AiOracle::new(backend, run_config.processing.max_criteria_per_request)
}

fn google_client(config: &Config) -> anyhow::Result<GoogleSheetsClient> {
    let tokens: Box<dyn TokenProvider> = if let Some(oauth) = config.google_oauth.clone() {
        Box::new(RefreshTokenProvider::new(oauth))
    } else if let Some(token) = config.google_token() {
        Box::new(StaticToken(token))
    } else {
        return Err(MatcherError::Config(
            "Googleの認証情報がありません（GOOGLE_ACCESS_TOKEN または googleOauth を設定してください）"
                .into(),
        )
        .into());
    };
    Ok(GoogleSheetsClient::new(tokens)?)
}

async fn execute<B: RowSource + SheetSink>(
    backend: &B,
    run_config: &RunConfig,
    oracle: &dyn Oracle,
    job: MatchJob,
) -> anyhow::Result<()> {
    let output = job.output.clone();
    let progress = ConsoleProgress::new();
    let cancel = CancelFlag::new();

    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n停止要求を受け付けました（処理中の判定が終わり次第停止します）");
            flag.cancel();
        }
    });

    let mut run = MatchRun::new(run_config, oracle, backend, backend)
        .with_observer(&progress)
        .with_cancel_flag(cancel);
    let report = run.run(job).await?;

    println!();
    println!("対象行: {} / 処理済み: {}", report.total_rows, report.processed_rows);
    println!("一致: {}行 / エクスポート: {}行", report.matched_rows, report.exported_rows);
    println!("API呼び出し: {}回 / {:.1}秒", report.api_calls, report.elapsed.as_secs_f64());
    if report.unexported_rows > 0 {
        println!("⚠ {}行をエクスポートできませんでした", report.unexported_rows);
    }
    println!("出力先: {} / {}", output.resource_id, output.sheet_name);

    match report.phase {
        RunPhase::Cancelled => println!("\n⏹ 停止しました"),
        _ => println!("\n✅ 完了"),
    }
    Ok(())
}

async fn plan<B: RowSource + SheetSink>(
    backend: &B,
    run_config: &RunConfig,
    oracle: &dyn Oracle,
    mut job: MatchJob,
) -> anyhow::Result<()> {
    let run = MatchRun::new(run_config, oracle, backend, backend);
    run.load_criteria(&mut job.criteria).await?;
    let data = run.load_target(&job.target).await?;
    let plan = run.plan_run(data.rows.len(), job.criteria.len());

    println!("対象: {} / {}", job.target.resource_id, job.target.sheet_name);
    println!("  列: {}", data.header.join(", "));
    println!("  データ行: {}", plan.total_rows);
    println!("条件: {}件", job.criteria.len());
    for criterion in &job.criteria {
        println!(
            "  [{}] {} → 列{} ({}件の値)",
            criterion.id,
            criterion.name,
            criterion.target_column_index,
            criterion.values.len()
        );
    }
    println!("バッチサイズ: {} / バッチ数: {}", plan.batch_size, plan.total_batches);
    println!("出力先: {} / {}", job.output.resource_id, job.output.sheet_name);
    Ok(())
}
