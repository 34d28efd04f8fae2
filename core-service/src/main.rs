use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use core_library::{InventoryRow, InventoryStats, QueryOptions, Source};
use core_runtime::events::{CoreEvent, SyncEvent};
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use core_runtime::AppConfig;
use core_service::{format_size, CoreService};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "orphanscan", author, version, about)]
struct Cli {
    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "warn")]
    log_level: LogLevel,
    /// Log format (pretty, json, compact)
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "compact")]
    log_format: LogFormat,
    /// Print query results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass. Ctrl-C cancels it.
    Sync,
    /// Remote totals plus local and orphan usage per category
    Stats,
    /// List local files the torrent client does not know about
    Orphans {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 50)]
        per_page: i64,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        order: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// File count and size per top-level folder
    Folders {
        #[arg(long, value_enum, default_value_t = SourceArg::Orphan)]
        source: SourceArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Remote,
    Local,
    Orphan,
}

impl From<SourceArg> for Source {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Remote => Source::Remote,
            SourceArg::Local => Source::Local,
            SourceArg::Orphan => Source::Orphan,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(
        LoggingConfig::default()
            .with_level(cli.log_level)
            .with_format(cli.log_format),
    )
    .context("failed to initialize logging")?;

    let config = AppConfig::load().context("failed to load configuration")?;
    let service = CoreService::bootstrap(config)
        .await
        .context("failed to start")?;

    let outcome = match cli.command {
        Commands::Sync => run_sync(&service).await,
        Commands::Stats => print_stats(&service, cli.json).await,
        Commands::Orphans {
            page,
            per_page,
            sort,
            order,
            search,
            category,
        } => {
            let mut options = QueryOptions::new().page(page).per_page(per_page);
            options.sort = sort;
            options.order = order;
            options.search = search;
            options.category = category;
            print_orphans(&service, &options, cli.json).await
        }
        Commands::Folders { source } => print_folders(&service, source.into(), cli.json).await,
    };

    service.shutdown().await;
    outcome
}

async fn run_sync(service: &CoreService) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            signal_cancel.cancel();
        }
    });

    let mut events = service.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(CoreEvent::Sync(event)) => {
                    let done = matches!(
                        event,
                        SyncEvent::Completed { .. }
                            | SyncEvent::Failed { .. }
                            | SyncEvent::Cancelled { .. }
                    );
                    print_event(&event);
                    if done {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = service.sync(cancel).await;
    if result.is_err() {
        printer.abort();
    }
    let _ = printer.await;

    match result {
        Ok(report) => {
            println!(
                "remote files: {}{}",
                report.remote_files,
                if report.remote_replaced { "" } else { " (kept from last pass)" }
            );
            println!("local files:  {}", report.local_files);
            for error in &report.collection_errors {
                println!(
                    "  failed: {} ({}): {}",
                    error.collection_name, error.collection_id, error.message
                );
            }
            for warning in &report.warnings {
                println!("  warning: {}", warning);
            }
            println!("took {:.1}s", report.duration.as_secs_f64());
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            println!("Sync cancelled");
            Ok(())
        }
        Err(e) => Err(e).context("sync failed"),
    }
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::PhaseChanged { phase, .. } => println!("[{}]", phase),
        SyncEvent::Progress {
            phase,
            items_processed,
            total_items: Some(total),
            ..
        } => println!("  {}: {}/{}", phase, items_processed, total),
        SyncEvent::Progress {
            phase,
            items_processed,
            total_items: None,
            ..
        } => println!("  {}: {}", phase, items_processed),
        SyncEvent::Warning { message, .. } => println!("  warning: {}", message),
        _ => {}
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn print_stats(service: &CoreService, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "remote": service.aggregate_stats(Source::Remote).await?,
            "local": service.aggregate_stats(Source::Local).await?,
            "orphan": service.aggregate_stats(Source::Orphan).await?,
        }));
    }

    if let InventoryStats::Remote(remote) = service.aggregate_stats(Source::Remote).await? {
        println!("Remote");
        println!("  torrents: {}", remote.total_collections);
        println!("  files:    {}", remote.total_files);
        println!("  size:     {}", format_size(remote.total_size.max(0) as u64));
    }

    for (title, source) in [("Local", Source::Local), ("Orphans", Source::Orphan)] {
        println!("{}", title);
        if let InventoryStats::ByCategory(categories) = service.aggregate_stats(source).await? {
            if categories.is_empty() {
                println!("  (none)");
            }
            for stats in categories {
                println!(
                    "  {:<8} {:>8} files  {:>12}",
                    stats.category,
                    stats.file_count,
                    format_size(stats.total_size.max(0) as u64)
                );
            }
        }
    }
    Ok(())
}

async fn print_orphans(
    service: &CoreService,
    options: &QueryOptions,
    json: bool,
) -> anyhow::Result<()> {
    let page = service.query(Source::Orphan, options).await?;
    if json {
        return print_json(&page);
    }

    for row in &page.items {
        let category = match row {
            InventoryRow::Local(local) => local.category.as_str(),
            InventoryRow::Remote(_) => "",
        };
        println!(
            "{:>12}  {:<8} {}",
            format_size(row.size().max(0) as u64),
            category,
            row.file_path()
        );
    }
    println!(
        "page {}/{} ({} orphans)",
        page.page,
        page.total_pages.max(1),
        page.total
    );
    Ok(())
}

async fn print_folders(service: &CoreService, source: Source, json: bool) -> anyhow::Result<()> {
    let folders = service.folder_stats(source).await?;
    if json {
        return print_json(&folders);
    }

    for folder in folders {
        println!(
            "{:<24} {:>8} files  {:>12}",
            folder.folder,
            folder.file_count,
            format_size(folder.total_size.max(0) as u64)
        );
    }
    Ok(())
}
