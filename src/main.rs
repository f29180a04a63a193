//! esdump - Elasticsearch scroll exporter
//!
//! Pages through every document matching a query and writes each
//! document's `_source` as one JSON line.
//!
//! # Usage
//!
//! ```bash
//! # Export an index to ./es.export.log
//! esdump -u http://localhost:9200 -i logs-2024
//!
//! # Lucene query, selected fields, to stdout
//! esdump -i logs-* -q 'level:error' -f message,host -p
//! ```

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use esdump::cli::CliInterface;
use esdump::cli::interrupt::forward_interrupts;
use esdump::cluster::EsClient;
use esdump::error::Result;
use esdump::export::{ExportDriver, RecordWriter, Sink, open_file_sink, stdout_sink};

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands or run the export
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    run_export(&cli).await
}

/// Preflight the cluster, then stream the export to the configured sink
async fn run_export(cli: &CliInterface) -> Result<()> {
    let query = cli.query_descriptor()?;
    let client = EsClient::new(&cli.config().cluster)?;

    let server_version = client.server_version().await?;
    info!(
        "Client: esdump {}, Server: {} ({})",
        esdump::VERSION,
        server_version,
        cli.sanitized_addresses()
    );
    client.check_indices(&query.indices).await?;

    let writer = RecordWriter::new(open_sink(cli).await?).with_strict(cli.config().export.strict);

    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        if forward_interrupts(cancel_token_clone, tokio::signal::ctrl_c).await {
            eprintln!("Aborted");
            std::process::exit(130);
        }
    });

    let mut driver = ExportDriver::new(Box::new(client), writer)
        .with_progress(cli.show_progress())
        .with_cancellation(cancel_token);
    let outcome = driver.run(&query).await;
    ctrl_c_handle.abort();

    let summary = outcome?;
    info!("All done");
    info!("queryResult: {}", summary.total_matched);
    info!("numResult: {}", summary.written);
    cli.print_summary(&summary);
    Ok(())
}

async fn open_sink(cli: &CliInterface) -> Result<Box<dyn Sink>> {
    if cli.args().print {
        debug!("Writing records to stdout");
        return Ok(Box::new(stdout_sink()));
    }
    let export = &cli.config().export;
    debug!(
        "Writing records to {} (append: {})",
        export.output_file.display(),
        export.append
    );
    Ok(Box::new(
        open_file_sink(&export.output_file, export.append).await?,
    ))
}

/// Initialize logging system based on verbosity level
///
/// `RUST_LOG` takes precedence over the configured level. All log output
/// goes to stderr so stdout stays clean for `--print`.
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
