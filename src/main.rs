use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use resource_store::gateway::{Params, RequestGateway};
use resource_store::notification::{Notifier, NotifyLevel};
use resource_store::resource::{
    AsyncValuable, EditOptions, EditResource, ListOptions, ListResource, MutationOptions,
    PaginationQuery, RemoveResource, Settled,
};
use resource_store::{Config, RequestError, VERSION};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Talk to an envelope-style REST backend through resource stores
#[derive(Parser, Debug)]
#[command(name = "resource-store", version, about, long_about = None)]
struct Args {
    /// Prefix for relative URLs (overrides config)
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in milliseconds (overrides config)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one page of a collection
    List {
        url: String,
        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: u32,
        /// Page size (defaults to config)
        #[arg(long)]
        size: Option<u32>,
        /// Search filter as key=value, repeatable
        #[arg(long = "search", value_parser = parse_key_val)]
        search: Vec<(String, Value)>,
    },
    /// Load a single record
    Show { url: String },
    /// POST a new record
    Create {
        url: String,
        /// Record as a JSON object
        #[arg(long)]
        data: String,
    },
    /// PUT an existing record
    Update {
        url: String,
        /// Record as a JSON object
        #[arg(long)]
        data: String,
    },
    /// DELETE a record
    Remove { url: String },
    /// Print the effective configuration
    Config {
        /// Persist the effective configuration
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Prints notifications to stderr
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        eprintln!("{} {}", level.icon(), message);
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("resource-store {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("resource-store").join("resource-store.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".resource-store").join("resource-store.log");
    }
    PathBuf::from("resource-store.log")
}

fn parse_key_val(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    // Numbers and booleans keep their JSON type; anything else is a string
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_object(data: &str) -> Result<Params> {
    match serde_json::from_str(data).context("--data is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("--data must be a JSON object, got {}", other),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Map a settled store call onto the process outcome
fn finish(settled: Settled, error: Option<RequestError>) -> ExitCode {
    match (settled, error) {
        (Settled::Applied, _) => ExitCode::SUCCESS,
        (_, Some(error)) => {
            tracing::error!("Command failed: {}", error);
            // Server and network failures were already printed by the notifier
            if matches!(error, RequestError::ClientError(_) | RequestError::Configuration(_)) {
                eprintln!("Error: {}", error);
            }
            ExitCode::FAILURE
        }
        (_, None) => ExitCode::FAILURE,
    }
}

async fn run(command: Command, config: Config, gateway: RequestGateway) -> Result<ExitCode> {
    match command {
        Command::List {
            url,
            page,
            size,
            search,
        } => {
            let pagination = PaginationQuery::new(page, size.unwrap_or(config.page_size));
            let search: Params = search.into_iter().collect();
            let list: ListResource<Value> = ListResource::new(
                gateway,
                ListOptions::new(url)
                    .pagination(pagination)
                    .default_search(AsyncValuable::Value(search)),
            );

            let settled = list
                .initialize()
                .await
                .ok_or_else(|| anyhow!("list did not fetch"))?;
            if settled.is_applied() {
                let data = list.data();
                print_json(&data)?;
                eprintln!(
                    "page {} of {} ({} total)",
                    data.page + 1,
                    data.page_count(),
                    data.total
                );
            }
            Ok(finish(settled, list.error()))
        }
        Command::Show { url } => {
            let edit: EditResource<Value> =
                EditResource::new(gateway, EditOptions::new().fetch_url(url));

            let settled = edit.begin_edit(Params::new()).await;
            if settled.is_applied() {
                print_json(&edit.data())?;
            }
            Ok(finish(settled, edit.error()))
        }
        Command::Create { url, data } => {
            let data = parse_object(&data)?;
            let edit: EditResource<Params> =
                EditResource::new(gateway, EditOptions::new().submit_url(url));

            edit.begin_add(None).await;
            edit.set_data(data);
            let settled = edit.submit().await?;
            if settled.is_applied() {
                print_json(&edit.submit_response())?;
            }
            Ok(finish(settled, edit.error()))
        }
        Command::Update { url, data } => {
            let data = parse_object(&data)?;
            let edit: EditResource<Params> =
                EditResource::new(gateway, EditOptions::new().submit_url(url));

            edit.begin_edit(data).await;
            let settled = edit.submit().await?;
            if settled.is_applied() {
                print_json(&edit.submit_response())?;
            }
            Ok(finish(settled, edit.error()))
        }
        Command::Remove { url } => {
            let remove: RemoveResource<()> = RemoveResource::new(gateway, MutationOptions::new(url));

            let settled = remove.remove(()).await;
            if settled.is_applied() {
                print_json(&remove.state().response.get())?;
            }
            Ok(finish(settled, remove.state().error.get()))
        }
        Command::Config { save } => {
            print_json(&config)?;
            if save {
                config.save()?;
                if let Some(path) = Config::config_path() {
                    eprintln!("Saved to {}", path.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    // CLI > config file > defaults
    let mut config = Config::load();
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    let gateway = RequestGateway::http(config.gateway_config())?
        .with_notifier(Arc::new(ConsoleNotifier));
    tracing::info!("Using base URL: {}", gateway.base().base_url);

    run(args.command, config, gateway).await
}
