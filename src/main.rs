use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use jobfeed::config::FeedConfig;
use jobfeed::dashboard::{run_dashboard, DashboardState};
use jobfeed::feed::classify::ExperienceLevel;
use jobfeed::feed::record::{time_ago, JobId, JobStatus};
use jobfeed::feed::store::ReconciliationStore;
use jobfeed::feed::view::{project, ExperienceFilter, SortOrder, TabCounts, ViewConfig};
use jobfeed::launcher::{CommandOpener, LogOpener, UrlOpener};
use jobfeed::session::FeedSession;
use jobfeed::shutdown::install_shutdown_handler;
use jobfeed::upstream::{HttpBackend, JobBackend, RealtimeChannel};

#[derive(Parser, Debug)]
#[command(name = "jobfeed")]
#[command(version)]
#[command(about = "Live job-posting feed with apply tracking")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Follow the live feed and serve the dashboard
    Watch(WatchArgs),

    /// Fetch all jobs once and print one page of the view
    List(ListArgs),
}

// =============================================================================
// Watch Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct WatchArgs {
    /// Base URL of the job aggregator's REST API
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    backend: String,

    /// WebSocket endpoint of the aggregator's STOMP broker
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws/websocket")]
    channel: String,

    /// Port for the JSON dashboard
    #[arg(long, default_value = "3000")]
    dashboard_port: u16,

    /// Program used to open posting urls (defaults to the platform opener)
    #[arg(long, conflicts_with = "no_open")]
    open_command: Option<String>,

    /// Only log posting urls instead of opening them
    #[arg(long)]
    no_open: bool,

    /// Delay between push channel reconnect attempts
    #[arg(long, default_value = "5000")]
    reconnect_delay_ms: u64,
}

// =============================================================================
// List Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ListArgs {
    /// Base URL of the job aggregator's REST API
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    backend: String,

    /// Status tab: NEW, APPLIED or DRAFT
    #[arg(long, default_value = "NEW")]
    tab: JobStatus,

    /// Experience filter: ALL, FRESHER or EXPERIENCED
    #[arg(long, default_value = "ALL")]
    experience: ExperienceFilter,

    /// Case-insensitive match on title or company
    #[arg(long, default_value = "")]
    search: String,

    /// Only show jobs from this source (repeatable)
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Sort order: date-desc, date-asc or company
    #[arg(long, default_value = "date-desc")]
    sort: SortOrder,

    /// Page number, starting at 1
    #[arg(long, default_value = "1")]
    page: usize,

    /// Jobs per page (10, 20, 50 or 100)
    #[arg(long, default_value = "10")]
    page_size: usize,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct JobListItem {
    id: JobId,
    title: String,
    company: String,
    location: String,
    source: String,
    url: String,
    status: JobStatus,
    experience: ExperienceLevel,
    posted_ago: String,
}

#[derive(Serialize)]
struct JobListOutput {
    jobs: Vec<JobListItem>,
    total_matching: usize,
    total_records: usize,
    page: usize,
    page_count: usize,
    tab_counts: TabCounts,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_watch(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let dashboard_addr: SocketAddr = format!("0.0.0.0:{}", args.dashboard_port).parse()?;
    let open_command = if args.no_open {
        None
    } else {
        args.open_command.or(FeedConfig::default().open_command)
    };

    let config = FeedConfig::new(&args.backend)
        .with_channel_url(&args.channel)
        .with_dashboard(dashboard_addr)
        .with_open_command(open_command)
        .with_reconnect_delay_ms(args.reconnect_delay_ms);

    tracing::info!(
        backend = %config.backend_url,
        channel = %config.channel.url,
        dashboard_addr = ?config.dashboard_addr,
        opener = ?config.open_command,
        "Starting jobfeed"
    );

    let backend: Arc<dyn JobBackend> = Arc::new(HttpBackend::new(
        &config.backend_url,
        Duration::from_millis(config.request_timeout_ms),
    )?);
    let opener: Arc<dyn UrlOpener> = match &config.open_command {
        Some(program) => Arc::new(CommandOpener::new(program)),
        None => Arc::new(LogOpener),
    };

    let (session, events_rx) = FeedSession::new(backend, opener, config.event_buffer);
    let session = Arc::new(session);
    let shutdown = install_shutdown_handler();

    let dashboard_handle = config.dashboard_addr.map(|addr| {
        let state = DashboardState {
            session: session.clone(),
        };
        tokio::spawn(run_dashboard(addr, state, shutdown.clone()))
    });

    let channel = RealtimeChannel::new(config.channel.clone());
    session.run(events_rx, Some(channel), shutdown).await;

    if let Some(handle) = dashboard_handle {
        handle.await?;
    }

    tracing::info!("jobfeed stopped");
    Ok(())
}

async fn run_list(args: ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut view_config = ViewConfig::default()
        .with_page_size(args.page_size)?
        .with_tab(args.tab)
        .with_experience(args.experience)
        .with_search(&args.search)
        .with_sort(args.sort)
        .with_page(args.page);
    for source in &args.sources {
        view_config = view_config.with_source(source);
    }

    let backend = HttpBackend::new(
        &args.backend,
        Duration::from_millis(FeedConfig::default().request_timeout_ms),
    )?;
    let records = backend.fetch_all().await?;

    // A one-shot listing has no buffered pushes; the fetch is the whole collection.
    let mut store = ReconciliationStore::new();
    store.replace_all(records);
    let view = project(store.records(), &view_config);

    let now = Utc::now();
    match args.output {
        OutputFormat::Json => {
            let output = JobListOutput {
                jobs: view
                    .items
                    .iter()
                    .map(|job| JobListItem {
                        id: job.id,
                        title: job.title.clone(),
                        company: job.company.clone(),
                        location: job.location.clone(),
                        source: job.source.clone(),
                        url: job.url.clone(),
                        status: job.status,
                        experience: job.experience(),
                        posted_ago: time_ago(job.posted_at.as_deref(), now),
                    })
                    .collect(),
                total_matching: view.total_matching,
                total_records: view.total_records,
                page: view.page,
                page_count: view.page_count,
                tab_counts: view.tab_counts,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            if view.items.is_empty() {
                if view.past_end {
                    println!(
                        "Page {} is past the end ({} pages).",
                        view.page, view.page_count
                    );
                } else {
                    println!("No jobs found.");
                }
            } else {
                println!(
                    "{:<8} {:<36} {:<24} {:<12} {:<12} POSTED",
                    "ID", "TITLE", "COMPANY", "SOURCE", "LEVEL"
                );
                println!("{}", "-".repeat(110));
                for job in &view.items {
                    println!(
                        "{:<8} {:<36} {:<24} {:<12} {:<12} {}",
                        job.id,
                        truncate(&job.title, 36),
                        truncate(&job.company, 24),
                        truncate(&job.source, 12),
                        job.experience().to_string(),
                        time_ago(job.posted_at.as_deref(), now),
                    );
                }
                println!();
                println!(
                    "Page {} of {} ({} matching, {} total)",
                    view.page, view.page_count, view.total_matching, view.total_records
                );
            }
            let tabs: Vec<String> = JobStatus::ALL
                .iter()
                .map(|status| format!("{}: {}", status, view.tab_counts.get(*status)))
                .collect();
            println!("{}", tabs.join("  "));
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Watch(watch_args) => {
            run_watch(watch_args).await?;
        }
        Commands::List(list_args) => {
            run_list(list_args).await?;
        }
    }

    Ok(())
}
