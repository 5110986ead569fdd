//! CLI mode for zephyr - install, inspect and serve the offline cache.

mod progress;

use std::path::PathBuf;

use crate::{
    AppConfig, CacheStorage, CacheWorker, DiskStorage, Error, FetchSource, HttpFetcher,
    MemoryStorage, Result,
};

use progress::{BarProgress, print_install_report, print_keys};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Populate the bucket from the origin.
    Install,
    /// Install (or resume), activate, and serve the HTTP front.
    Serve,
    /// Run one request through the worker.
    Fetch(String),
    /// List URLs stored in the bucket.
    Keys,
    /// List bucket names present in storage.
    Buckets,
    /// Delete a bucket; defaults to the configured one.
    Clear(Option<String>),
    /// Print usage.
    Help,
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Subcommand.
    pub command: Command,
    /// Explicit config file.
    pub config_path: Option<PathBuf>,
    /// Override for `network.origin`.
    pub origin: Option<String>,
    /// Override for `server.host`.
    pub host: Option<String>,
    /// Override for `server.port`.
    pub port: Option<u16>,
    /// Override for `paths.storage_dir`.
    pub storage_dir: Option<PathBuf>,
    /// Keep buckets in memory instead of on disk.
    pub memory: bool,
}

impl CliArgs {
    /// Applies command-line overrides on top of a loaded config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(origin) = &self.origin {
            config.network.origin.clone_from(origin);
        }
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.storage_dir {
            config.paths.storage_dir.clone_from(dir);
        }
    }
}

/// Prints usage to stderr.
pub fn print_usage() {
    eprintln!("Usage: zephyr <COMMAND> [OPTIONS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  install             Fetch every asset and store it in the cache bucket");
    eprintln!("  serve               Install (or reuse an installed bucket) and serve cache-first");
    eprintln!("  fetch <url>         Run a single GET through the worker");
    eprintln!("  keys                List URLs stored in the cache bucket");
    eprintln!("  buckets             List cache buckets in storage");
    eprintln!("  clear [--bucket N]  Delete a cache bucket (default: the configured one)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <PATH>       Config file (default: {})", AppConfig::default_path().display());
    eprintln!("  --origin <URL>        Application origin");
    eprintln!("  --host <HOST>         Bind address for serve");
    eprintln!("  --port <PORT>         Bind port for serve");
    eprintln!("  --storage-dir <DIR>   Cache storage directory");
    eprintln!("  --memory              Keep buckets in memory only");
    eprintln!("  -h, --help            Show this help");
}

fn value(args: &[String], i: usize, flag: &str) -> Result<String> {
    args.get(i)
        .cloned()
        .ok_or_else(|| Error::Config(format!("{flag} requires a value")))
}

/// Parses arguments (without the program name).
///
/// # Errors
///
/// Returns [`Error::Config`] for unknown options, missing values or a
/// missing command.
pub fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut command = None;
    let mut positional = Vec::new();
    let mut bucket = None;
    let mut parsed = CliArgs {
        command: Command::Help,
        config_path: None,
        origin: None,
        host: None,
        port: None,
        storage_dir: None,
        memory: false,
    };

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-h" | "--help" => command = Some(Command::Help),
            "--memory" => parsed.memory = true,
            "--config" => {
                i += 1;
                parsed.config_path = Some(PathBuf::from(value(args, i, arg)?));
            }
            "--origin" => {
                i += 1;
                parsed.origin = Some(value(args, i, arg)?);
            }
            "--host" => {
                i += 1;
                parsed.host = Some(value(args, i, arg)?);
            }
            "--port" => {
                i += 1;
                let raw = value(args, i, arg)?;
                parsed.port = Some(
                    raw.parse()
                        .map_err(|_| Error::Config(format!("invalid port: {raw}")))?,
                );
            }
            "--storage-dir" => {
                i += 1;
                parsed.storage_dir = Some(PathBuf::from(value(args, i, arg)?));
            }
            "--bucket" => {
                i += 1;
                bucket = Some(value(args, i, arg)?);
            }
            _ if arg.starts_with('-') => {
                return Err(Error::Config(format!("unknown option: {arg}")));
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    if command == Some(Command::Help) {
        return Ok(parsed);
    }

    let mut positional = positional.into_iter();
    let name = positional
        .next()
        .ok_or_else(|| Error::Config("no command given".to_string()))?;
    parsed.command = match name.as_str() {
        "install" => Command::Install,
        "serve" => Command::Serve,
        "fetch" => Command::Fetch(
            positional
                .next()
                .ok_or_else(|| Error::Config("fetch requires a URL".to_string()))?,
        ),
        "keys" => Command::Keys,
        "buckets" => Command::Buckets,
        "clear" => Command::Clear(bucket.take()),
        other => return Err(Error::Config(format!("unknown command: {other}"))),
    };

    if let Some(extra) = positional.next() {
        return Err(Error::Config(format!("unexpected argument: {extra}")));
    }
    if bucket.is_some() {
        return Err(Error::Config("--bucket only applies to clear".to_string()));
    }

    Ok(parsed)
}

/// Runs the CLI with parsed arguments.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the command fails.
pub async fn run(args: CliArgs) -> Result<()> {
    if args.command == Command::Help {
        print_usage();
        return Ok(());
    }

    let config_path = args.config_path.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path)?;
    args.apply(&mut config);

    if args.memory {
        dispatch(MemoryStorage::new(), &config, args.command).await
    } else {
        log::debug!("Cache storage at {}", config.paths.storage_dir.display());
        dispatch(DiskStorage::new(&config.paths.storage_dir), &config, args.command).await
    }
}

async fn dispatch<S>(storage: S, config: &AppConfig, command: Command) -> Result<()>
where
    S: CacheStorage + 'static,
{
    let origin = config.network.origin_url()?;
    let fetcher = HttpFetcher::new(&config.network)?;
    let worker = CacheWorker::new(storage, fetcher, config.cache.clone(), origin);

    match command {
        Command::Install => {
            let progress = BarProgress::new();
            let report = worker.install(&progress).await;
            progress.finish();
            print_install_report(&report?);
            Ok(())
        }
        Command::Serve => serve(worker, config).await,
        Command::Fetch(url) => {
            start(&worker).await?;
            let outcome = worker.fetch_path(&url).await?;
            let tier = match outcome.source {
                FetchSource::Cache => "cache",
                FetchSource::Network => "network",
            };
            println!(
                "{tier} {} {} ({})",
                outcome.response.status,
                outcome.response.url,
                indicatif::HumanBytes(outcome.response.body.len() as u64)
            );
            Ok(())
        }
        Command::Keys => {
            print_keys(&config.cache.cache_name, &worker.cached_keys().await?);
            Ok(())
        }
        Command::Buckets => {
            for name in worker.storage().keys().await? {
                let marker = if name == config.cache.cache_name { "*" } else { " " };
                println!("{marker} {name}");
            }
            Ok(())
        }
        Command::Clear(bucket) => {
            let name = bucket.unwrap_or_else(|| config.cache.cache_name.clone());
            if worker.storage().delete(&name).await? {
                println!("Deleted cache bucket {name}");
            } else {
                println!("No cache bucket named {name}");
            }
            Ok(())
        }
        Command::Help => {
            print_usage();
            Ok(())
        }
    }
}

/// Resumes an installed bucket, or installs and activates a fresh one.
async fn start<S>(worker: &CacheWorker<S, HttpFetcher>) -> Result<()>
where
    S: CacheStorage + 'static,
{
    if worker.resume().await? {
        return Ok(());
    }
    let progress = BarProgress::new();
    let report = worker.install(&progress).await;
    progress.finish();
    print_install_report(&report?);
    worker.activate()
}

#[cfg(feature = "server")]
async fn serve<S>(worker: CacheWorker<S, HttpFetcher>, config: &AppConfig) -> Result<()>
where
    S: CacheStorage + 'static,
{
    start(&worker).await?;

    let shutdown = tokio_util::sync::CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received SIGINT");
        }
        on_signal.cancel();
    });

    crate::server::serve(std::sync::Arc::new(worker), &config.server, shutdown).await
}

#[cfg(not(feature = "server"))]
async fn serve<S>(_worker: CacheWorker<S, HttpFetcher>, _config: &AppConfig) -> Result<()>
where
    S: CacheStorage + 'static,
{
    Err(Error::Config(
        "serve requires the 'server' feature".to_string(),
    ))
}
