use clap::Parser;
use std::sync::Arc;
use tariff_engine::config::Command;
use tariff_engine::server::{run_server, AppState};
use tariff_engine::utils::{logger, validation::Validate};
use tariff_engine::{
    CliConfig, MessageMetadata, TariffConfig, TariffEngine, TariffError, TariffTables,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 載入 TOML 配置
    let config = match TariffConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(e.exit_code());
        }
    };

    match &cli.command {
        Command::Serve { json_logs, .. } => {
            logger::init_server_logger(*json_logs || config.json_logs())
        }
        _ => logger::init_cli_logger(cli.verbose),
    }

    tracing::debug!("CLI config: {:?}", cli);

    // 驗證配置
    if let Err(e) = config.validate() {
        fail(&e);
    }

    let source = config.reference_source();
    let tables = match TariffTables::load_from(&source).await {
        Ok(tables) => tables,
        Err(e) => fail(&e),
    };
    let engine = TariffEngine::new(tables, config.engine_settings());
    tracing::info!(
        "✅ Loaded {} HTS records and {} overrides",
        engine.stats().hts_records,
        engine.stats().overrides
    );

    let outcome = match cli.command {
        Command::Lookup { code } => engine.lookup(&code).map(MessageMetadata::ProductInfo),
        Command::Search {
            query,
            chapter,
            limit,
        } => Ok(MessageMetadata::SearchResults(engine.search(
            &query,
            chapter.as_deref(),
            limit,
        ))),
        Command::Calculate(args) => engine
            .calculate(&args.to_request())
            .map(MessageMetadata::DutyResult),
        Command::Compare(args) => engine
            .compare_sourcing_parallel(
                &args.baseline,
                &args.targets,
                &args.shipment.to_spec(),
                args.sort_by,
            )
            .await
            .map(MessageMetadata::SourcingResult),
        Command::Serve { bind, .. } => {
            let bind = bind.unwrap_or_else(|| config.server_bind());
            let state = AppState::new(engine, Arc::new(source));
            return run_server(state, &bind).await;
        }
    };

    match outcome {
        Ok(message) => {
            println!("{}", serde_json::to_string_pretty(&message)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&MessageMetadata::from(&e))?);
            fail(&e)
        }
    }
}

fn fail(e: &TariffError) -> ! {
    tracing::error!("❌ {} (Category: {:?})", e, e.category());
    eprintln!("❌ {}", e);
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}
