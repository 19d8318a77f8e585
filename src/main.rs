use clap::Parser;
use deputes_etl::core::ConfigProvider;
use deputes_etl::domain::source::NOSDEPUTES_BASE_URL;
use deputes_etl::utils::encoding::PayloadDecoder;
use deputes_etl::utils::error::ErrorSeverity;
use deputes_etl::utils::{logger, validation::Validate};
use deputes_etl::{AppConfig, CliArgs, EtlEngine, Fetcher, LocalStorage, Orchestrator, RunOutcome};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🏛️  French deputies downloader");

    // 載入配置
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            match AppConfig::from_file(path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load config file '{}': {}", path, e);
                    eprintln!("💡 Make sure the file exists and is valid TOML format");
                    std::process::exit(1);
                }
            }
        }
        None => AppConfig::default(),
    };
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir.clone());
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    if args.dry_run {
        print_plan(&config);
        return Ok(());
    }

    if let Some(slug) = &args.depute {
        let fetcher = Fetcher::new(config.request_timeout(), config.user_agent())?;
        let record = fetcher.fetch_deputy(NOSDEPUTES_BASE_URL, slug).await?;
        println!("📄 {}", record.get("nom").unwrap_or(slug));
        for key in ["nom_circo", "parti_ratt_financier", "profession", "sexe", "date_naissance"] {
            if let Some(value) = record.get(key) {
                println!("   {}: {}", key, value);
            }
        }
        return Ok(());
    }

    let storage = LocalStorage::new(config.output_path());
    let output_dir = config.output_path().to_string();
    let orchestrator = Orchestrator::new(storage, config)?;
    let engine = EtlEngine::new(orchestrator);

    match engine.run().await {
        Ok(RunOutcome::Completed(report)) => {
            println!("✅ Download complete!");
            println!("📁 Files saved in: {}", output_dir);
            println!("📋 Unified roster: {} deputies", report.unified_count);
            if report.statistics_count > 0 {
                println!("📊 Statistics: {} deputies", report.statistics_count);
            }
            for file in &report.written_files {
                println!("   - {}", file);
            }
        }
        Ok(RunOutcome::NoDataCollected { comparison, .. }) => {
            eprintln!("❌ No data collected from any source");
            for summary in comparison {
                eprintln!(
                    "   {}: {}",
                    summary.name,
                    summary.error.as_deref().unwrap_or("no records")
                );
            }
            std::process::exit(2);
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn print_plan(config: &AppConfig) {
    println!("🔍 DRY RUN - sources that would be fetched, in order:");
    for (index, source) in config.sources().iter().enumerate() {
        println!("{}. {} ({:?})", index + 1, source.name, source.kind);
        for endpoint in &source.endpoints {
            let fallback = endpoint
                .json_fallback_url()
                .map(|url| format!(" → json fallback {}", url))
                .unwrap_or_default();
            println!("   {} [{}]{}", endpoint.url, endpoint.format, fallback);
        }
        if let Some(file) = &source.output_file {
            println!("   writes {}", file);
        }
    }
    println!(
        "Payload encodings tried: {}",
        PayloadDecoder::default().candidate_names().join(" → ")
    );
    println!("Unified roster → {}", config.unified_file());
    println!("Output directory: {}", config.output_path());
}
