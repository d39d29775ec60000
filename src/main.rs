//! vo-tap - command-line front end for the TAP client
//!
//! Subcommands map one-to-one onto the client facade:
//! - `query`: run an ADQL query (optionally uploading a VOTable)
//! - `tables`: list the tables of a service
//! - `columns`: list the columns of one table
//! - `examples`: print the example queries a service publishes
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vo_tap::config::ClientConfig;
use vo_tap::tap::{ColumnListing, ServiceDescriptor, TapClient, Upload};

#[cfg(feature = "jemalloc")]
use tikv_jemallocator::Jemalloc;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Debug, Parser)]
#[command(name = "vo-tap", version, about = "Query Virtual-Observatory TAP services")]
struct Cli {
    #[command(flatten)]
    options: ClientOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ClientOptions {
    /// JSON configuration file (timeout_secs, retries, retry_delay_ms, maxrec, user_agent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Total number of attempts per request
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Maximum number of rows the service should return
    #[arg(long, global = true)]
    maxrec: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run an ADQL query on the synchronous endpoint
    Query {
        /// Service URL, or a JSON descriptor such as '{"access_url": "..."}'
        service: String,

        /// ADQL query text
        adql: String,

        /// Name the uploaded table is registered under (TAP_UPLOAD.<name>)
        #[arg(long, requires = "upload_file")]
        upload_name: Option<String>,

        /// VOTable file to upload
        #[arg(long, requires = "upload_name")]
        upload_file: Option<PathBuf>,
    },

    /// List the tables published by a service
    Tables {
        service: String,

        /// Only show tables whose name contains this text (case-sensitive)
        #[arg(long)]
        contains: Option<String>,
    },

    /// List the columns of a table
    Columns { service: String, table: String },

    /// Print the example queries published by a service
    Examples { service: String },
}

impl ClientOptions {
    /// Defaults, then the JSON file, then environment, then flags
    fn load(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)?,
            None => ClientConfig::default(),
        }
        .with_env_overrides()?;

        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(maxrec) = self.maxrec {
            config.maxrec = Some(maxrec);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.options.load().context("Failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");
    let client = TapClient::new(config)?;

    match cli.command {
        Command::Query {
            service,
            adql,
            upload_name,
            upload_file,
        } => {
            let service = ServiceDescriptor::parse_arg(&service)?;
            let upload = match (upload_name, upload_file) {
                (Some(name), Some(path)) => Some(Upload::from_path(name, path)),
                _ => None,
            };

            let result = client
                .query(service, &adql, upload)
                .await
                .context("Query failed")?;

            println!("{}", result.table.data);
            println!("{} row(s)", result.len());
        }
        Command::Tables { service, contains } => {
            let service = ServiceDescriptor::parse_arg(&service)?;
            let names = client
                .list_tables(service, contains.as_deref())
                .await
                .context("Failed to list tables")?;
            for name in names {
                println!("{}", name);
            }
        }
        Command::Columns { service, table } => {
            let service = ServiceDescriptor::parse_arg(&service)?;
            let listing = client
                .list_columns(service, &table)
                .await
                .with_context(|| format!("Failed to list columns of '{}'", table))?;
            print_columns(&listing);
        }
        Command::Examples { service } => {
            let service = ServiceDescriptor::parse_arg(&service)?;
            let examples = client.list_examples(service).await?;
            if examples.is_empty() {
                eprintln!("No example queries published");
            }
            for (i, example) in examples.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("-- Example {}", i + 1);
                println!("{}", example);
            }
        }
    }

    Ok(())
}

fn print_columns(listing: &ColumnListing) {
    match listing {
        ColumnListing::Columns(fields) => {
            for field in fields {
                let mut line = format!("{}\t{}", field.name, field.datatype);
                if let Some(arraysize) = &field.arraysize {
                    line.push_str(&format!("[{}]", arraysize));
                }
                if let Some(unit) = &field.unit {
                    line.push_str(&format!("\t{}", unit));
                }
                if let Some(description) = &field.description {
                    line.push_str(&format!("\t{}", description));
                }
                println!("{}", line);
            }
        }
        ColumnListing::Metadata(meta) => {
            println!("Table is empty; result metadata:");
            if let Some(name) = &meta.name {
                println!("  name: {}", name);
            }
            if let Some(description) = &meta.description {
                println!("  description: {}", description);
            }
            for info in &meta.infos {
                println!("  {} = {}", info.name, info.value);
            }
            for param in &meta.params {
                println!("  {} = {}", param.name, param.value);
            }
        }
    }
}
