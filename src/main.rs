use clap::Parser;
use gws_source::config::toml_config::TomlConfig;
use gws_source::resources;
use gws_source::utils::error::ErrorSeverity;
use gws_source::utils::{logger, validation::Validate};
use gws_source::{
    CliConfig, Client, FetchContext, LocalStorage, RowWriter, SyncEngine, SyncError, SyncReport,
    SyncSettings, TableRegistry,
};

fn exit_code(e: &SyncError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 已取消，部分結果已輸出
        ErrorSeverity::Medium => 2,   // 可重試
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 設定或授權錯誤
    }
}

fn fail(e: &SyncError) -> ! {
    tracing::error!(
        "❌ Sync failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e).max(1));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting gws-source");

    // 載入設定：設定檔 -> 命令列 -> 環境變數
    let file = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            TomlConfig::from_file(path).unwrap_or_else(|e| fail(&e))
        }
        None => TomlConfig::default(),
    };
    let settings = SyncSettings::from_toml(&file).apply_cli(&cli).with_env_token();
    if cli.verbose {
        tracing::debug!(
            "Settings: customer={} base_url={} page_size={} formats={:?}",
            settings.customer_id,
            settings.base_url,
            settings.page_size,
            settings.formats
        );
    }

    if let Err(e) = settings.validate() {
        fail(&e);
    }
    if settings.access_token.is_none() {
        tracing::warn!("No access token configured; requests will be unauthenticated");
    }

    let registry = TableRegistry::with_tables(resources::tables()).unwrap_or_else(|e| fail(&e));
    let client = Client::from_config(&settings).unwrap_or_else(|e| fail(&e));
    let engine = SyncEngine::new(client, registry).with_channel_capacity(settings.channel_capacity);
    let writer = RowWriter::from_config(LocalStorage::new(settings.output_path.clone()), &settings)
        .unwrap_or_else(|e| fail(&e));

    let ctx = FetchContext::new();
    let token = ctx.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling sync");
            token.cancel();
        }
    });

    let mut report = SyncReport::new(engine.registry().tables());
    let outcome = engine.sync_into(&ctx, &mut report).await;

    // 已取得的資料一律寫出
    let written = writer.write(&report).await.unwrap_or_else(|e| fail(&e));
    for path in &written {
        tracing::info!("📁 Wrote {}/{}", settings.output_path, path);
    }

    if !report.resolution_issues.is_empty() || !report.fetch_issues.is_empty() {
        tracing::warn!(
            "{} column issues, {} child fetch issues (see manifest.json)",
            report.resolution_issues.len(),
            report.fetch_issues.len()
        );
    }

    match outcome {
        Ok(()) => {
            tracing::info!("✅ Sync completed: {} rows", report.total_rows());
            println!("✅ Sync completed: {} rows", report.total_rows());
        }
        Err(SyncError::Cancelled) => {
            tracing::warn!("Sync cancelled after {} rows", report.total_rows());
            eprintln!("⚠️ {}", SyncError::Cancelled.user_friendly_message());
            std::process::exit(130);
        }
        Err(e) => fail(&e),
    }

    Ok(())
}
