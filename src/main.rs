use clap::Parser;
use coinbot::app::{App, Config};
use coinbot::cli::{Cli, Commands};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::CheckConfig => {
            config.logging.init(None);
            check_config(&config);
        }
        Commands::Run(args) => {
            config.logging.init(args.log_level.as_deref());
            info!(source_wallet = %config.copy.source_wallet, "coinbot starting");

            let mut config = config;
            if args.dry_run {
                config.order_client.dry_run = true;
                config.credentials = None;
            }

            if let Err(err) = App::run(config).await {
                error!(error = %err, "fatal error");
                std::process::exit(1);
            }
            info!("coinbot stopped");
        }
    }
}

fn check_config(config: &Config) {
    println!("configuration OK");
    println!("  source wallet:        {}", config.copy.source_wallet);
    println!("  dry run:              {}", config.order_client.dry_run);
    println!("  coalesce window:      {} ms", config.copy.coalesce_ms);
    println!("  max slippage:         {} bps", config.max_slippage_bps);
    println!("  database:             {}", config.database_url);
    println!("  telemetry dir:        {}", config.telemetry_dir.display());
    println!(
        "  snapshot interval:    {}s",
        config.snapshot_interval.as_secs()
    );
    if config.credentials.is_none() && !config.order_client.dry_run {
        println!("  warning: live mode with no Polymarket credentials configured");
    }
}
