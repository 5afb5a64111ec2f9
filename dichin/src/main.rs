mod config;
mod logging;
mod statsd;

use catalog::HttpCatalog;
use clap::{Args, Parser};
use config::Config;
use gateway::resolver::{Resolution, Resolver};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dichin", about = "Drama catalog gateway")]
enum CliCommand {
    /// Serve the HTTP API
    Gateway(ConfigArgs),
    /// Resolve one record by id and print it as JSON
    Resolve {
        #[command(flatten)]
        config: ConfigArgs,
        book_id: String,
    },
    /// Print the first name-search result for a title as JSON
    Search {
        #[command(flatten)]
        config: ConfigArgs,
        title: String,
    },
}

impl CliCommand {
    fn config_args(&self) -> &ConfigArgs {
        match self {
            CliCommand::Gateway(args) => args,
            CliCommand::Resolve { config, .. } | CliCommand::Search { config, .. } => config,
        }
    }
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    let config = match Config::from_file(&cli.config_args().config_file_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry has to be initialized before the runtime starts
    let _sentry = logging::init(&config.logging);

    if let Some(metrics) = &config.metrics
        && let Err(e) = statsd::init(metrics)
    {
        tracing::error!(error = %e, "Failed to initialize metrics");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(cli, config))
}

async fn run(cli: CliCommand, config: Config) -> ExitCode {
    match cli {
        CliCommand::Gateway(_) => {
            tracing::info!("Starting gateway");
            match gateway::run(config.gateway).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "Gateway stopped");
                    ExitCode::FAILURE
                }
            }
        }
        CliCommand::Resolve { book_id, .. } => {
            let Some(resolver) = build_resolver(&config) else {
                return ExitCode::FAILURE;
            };
            match resolver.resolve_by_id(&book_id).await {
                Resolution::Found(record) => print_json(&record),
                Resolution::NotFound => {
                    eprintln!("{book_id} not found in any list");
                    ExitCode::FAILURE
                }
            }
        }
        CliCommand::Search { title, .. } => {
            let Some(resolver) = build_resolver(&config) else {
                return ExitCode::FAILURE;
            };
            match resolver.search_by_title(&title).await {
                Ok(Some(record)) => print_json(&record),
                Ok(None) => {
                    eprintln!("no results for {title:?}");
                    ExitCode::FAILURE
                }
                Err(e) => {
                    tracing::error!(error = %e, "Search failed");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn build_resolver(config: &Config) -> Option<Resolver> {
    let catalog = match HttpCatalog::new(&config.gateway.catalog) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream client");
            return None;
        }
    };

    let resolver = Resolver::new(Arc::new(catalog));
    Some(match config.gateway.fanout_deadline() {
        Some(deadline) => resolver.with_fanout_deadline(deadline),
        None => resolver,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize output");
            ExitCode::FAILURE
        }
    }
}
