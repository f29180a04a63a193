//! Command-line interface for esdump
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and merging with arguments
//! - Building the query descriptor for the export run
//! - Subcommands (version, completion, config)

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::{Config, LogLevel, split_addresses};
use crate::error::{ConfigError, Result};
use crate::export::ExportSummary;
use crate::query::{QueryDescriptor, parse_keepalive};

pub mod completion;
pub mod interrupt;

/// Export every document matching a query from an Elasticsearch cluster
#[derive(Parser, Debug)]
#[command(
    name = "esdump",
    version,
    about = "Scroll-based bulk exporter for Elasticsearch",
    long_about = "Pages through every document matching a query using the scroll API and
writes each document's _source as one JSON line to a file or stdout."
)]
pub struct CliArgs {
    /// Query string in Lucene syntax (Query DSL with -r)
    #[arg(short = 'q', long = "query", value_name = "QUERY", default_value = "")]
    pub query: String,

    /// Treat the query as a Query DSL JSON body
    #[arg(short = 'r', long = "raw")]
    pub raw_query: bool,

    /// Cluster URL(s), comma-separated
    #[arg(short = 'u', long = "url", value_name = "URLS")]
    pub url: Option<String>,

    /// Basic authentication in the form username:password
    #[arg(short = 'a', long = "auth", value_name = "USER:PASS")]
    pub auth: Option<String>,

    /// Index name prefix(es), comma-separated (default _all)
    #[arg(short = 'i', long = "index", value_name = "INDICES", default_value = "")]
    pub index: String,

    /// Document type(s)
    #[arg(short = 'd', long = "doc-type", value_name = "TYPE", default_value = "")]
    pub doc_type: String,

    /// Fields to include in the output, comma-separated
    #[arg(short = 'f', long = "fields", value_name = "FIELDS", default_value = "")]
    pub fields: String,

    /// Sort clauses, e.g. @timestamp:asc
    #[arg(long, value_name = "FIELD:DIR", value_delimiter = ',')]
    pub sort: Vec<String>,

    /// Print records to stdout instead of a file
    #[arg(short = 'p', long = "print")]
    pub print: bool,

    /// Path to the export file (default ./es.export.log)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Truncate the export file instead of appending
    #[arg(long)]
    pub overwrite: bool,

    /// Maximum number of results to export (0 = no limit)
    #[arg(short = 'm', long = "max", value_name = "N", default_value_t = 0)]
    pub max_results: u64,

    /// Number of hits per scroll page
    #[arg(short = 's', long = "size", value_name = "N")]
    pub size: Option<u32>,

    /// Scroll keep-alive between pages, e.g. 30m
    #[arg(long, value_name = "DURATION")]
    pub scroll: Option<String>,

    /// Fail on the first record that cannot be serialized
    #[arg(long)]
    pub strict: bool,

    /// Disable the progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Retries for transient fetch failures
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only, no progress bar)
    #[arg(long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for esdump
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Target shell
        #[arg(value_enum, value_name = "SHELL")]
        shell: Shell,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        config.apply_env()?;
        Self::apply_args_to_config(&mut config, &args)?;
        if args.command.is_none() {
            config.validate()?;
        }
        Ok(Self { args, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Build the query descriptor for this run
    pub fn query_descriptor(&self) -> Result<QueryDescriptor> {
        QueryDescriptor::builder()
            .query(self.args.query.clone(), self.args.raw_query)
            .indices(self.args.index.clone())
            .doc_type(self.args.doc_type.clone())
            .fields(self.args.fields.clone())
            .sort(self.args.sort.iter().cloned())
            .page_size(self.config.export.page_size)
            .result_limit(self.args.max_results)
            .scroll(self.config.scroll_keepalive()?)
            .build()
    }

    /// Whether to draw the progress bar
    pub fn show_progress(&self) -> bool {
        self.config.export.progress && !self.args.quiet
    }

    /// Addresses joined for display, credentials stripped
    pub fn sanitized_addresses(&self) -> String {
        self.config
            .cluster
            .addresses
            .iter()
            .map(|a| Self::sanitize_url(a))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Hide `user:pass@` in a URL
    fn sanitize_url(url: &str) -> String {
        if let (Some(proto_end), Some(at)) = (url.find("://"), url.rfind('@')) {
            if at > proto_end {
                return format!("{}***{}", &url[..proto_end + 3], &url[at..]);
            }
        }
        url.to_string()
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) -> Result<()> {
        Self::apply_cluster_args(config, args)?;
        Self::apply_export_args(config, args)?;
        Self::apply_logging_args(config, args);
        Ok(())
    }

    fn apply_cluster_args(config: &mut Config, args: &CliArgs) -> Result<()> {
        if let Some(url) = &args.url {
            config.cluster.addresses = split_addresses(url);
        }
        if let Some(auth) = &args.auth {
            let (username, password) = Self::parse_auth(auth)?;
            config.cluster.username = Some(username);
            config.cluster.password = Some(password);
        }
        if let Some(timeout) = args.timeout {
            config.cluster.timeout = timeout;
        }
        if let Some(retries) = args.retries {
            config.cluster.retry_attempts = retries;
        }
        Ok(())
    }

    fn apply_export_args(config: &mut Config, args: &CliArgs) -> Result<()> {
        if let Some(output) = &args.output {
            config.export.output_file = output.clone();
        }
        if args.overwrite {
            config.export.append = false;
        }
        if let Some(size) = args.size {
            config.export.page_size = size;
        }
        if let Some(scroll) = &args.scroll {
            parse_keepalive(scroll)?;
            config.export.scroll = scroll.clone();
        }
        if args.strict {
            config.export.strict = true;
        }
        if args.no_progress {
            config.export.progress = false;
        }
        Ok(())
    }

    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Split `username:password`
    fn parse_auth(auth: &str) -> Result<(String, String)> {
        match auth.split_once(':') {
            Some((user, pass)) if !user.is_empty() => Ok((user.to_string(), pass.to_string())),
            _ => Err(ConfigError::InvalidValue {
                field: "auth".to_string(),
                value: "expected username:password".to_string(),
            }
            .into()),
        }
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                println!("esdump version {}", env!("CARGO_PKG_VERSION"));
                println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                completion::write_completion(*shell, &mut std::io::stdout());
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                if *validate {
                    match self.config.validate() {
                        Ok(()) => println!("Configuration is valid"),
                        Err(e) => println!("Configuration validation failed: {}", e),
                    }
                }
                if *show {
                    println!("{}", self.redacted_config().to_toml()?);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn redacted_config(&self) -> Config {
        let mut config = self.config.clone();
        if config.cluster.password.is_some() {
            config.cluster.password = Some("***".to_string());
        }
        config
    }

    /// Print the end-of-run report to stderr
    pub fn print_summary(&self, summary: &ExportSummary) {
        if self.args.quiet {
            return;
        }
        for line in self.summary_lines(summary) {
            eprintln!("{}", line);
        }
    }

    fn summary_lines(&self, summary: &ExportSummary) -> Vec<String> {
        let destination = if self.args.print {
            "stdout".to_string()
        } else {
            self.config.export.output_file.display().to_string()
        };
        let mut lines = vec![format!(
            "Exported {} of {} documents to {} ({} bytes, {} ms)",
            summary.written,
            summary.total_matched,
            destination,
            summary.bytes_written,
            summary.elapsed_ms
        )];
        if summary.cap_hit {
            lines.push(format!(
                "Stopped at the result limit of {}",
                self.args.max_results
            ));
        }
        if summary.dropped > 0 {
            lines.push(format!(
                "Skipped {} of {} received record(s) that could not be serialized",
                summary.dropped, summary.emitted
            ));
        }
        if summary.cancelled {
            lines.push("Export was cancelled; output is incomplete".to_string());
        }
        lines
    }
}
