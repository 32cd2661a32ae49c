//! Sitepulse - Web Analytics Pipeline
//!
//! Sitepulse tracks visitor sessions and page views for a marketing
//! site, stores them in a hosted backend, and serves an admin dashboard
//! with aggregated traffic metrics.

use clap::{Parser, Subcommand};
use sitepulse_core::{Result, SitepulseConfig, SitepulseError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "sitepulse")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sitepulse Web Analytics - visitor tracking and dashboard reporting")]
#[command(long_about = r#"
Sitepulse is a visitor analytics pipeline for a marketing website.

It records page views against sliding-window visitor sessions, stores
them in a hosted backend, and aggregates them into dashboard metrics:
daily trends, device distribution, top pages, and traffic sources.

The tool can operate in multiple modes:
- Serve: run the tracking endpoint and admin dashboard API
- Report: print an aggregated analytics report
- Track: record a single page view from the command line
"#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (json, yaml, pretty)
    #[arg(short, long, default_value = "pretty", global = true)]
    output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the tracking endpoint and dashboard API
    Serve {
        /// Server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Print an aggregated analytics report
    Report {
        /// Date range in days
        #[arg(short, long, default_value = "30")]
        days: i64,
    },

    /// Record a page view, or a stream of them with --follow
    Track {
        /// Page path
        #[arg(long, default_value = "/")]
        path: String,

        /// Page title
        #[arg(long, default_value = "")]
        title: String,

        /// Referrer URL
        #[arg(long, default_value = "")]
        referrer: String,

        /// User-agent string to classify
        #[arg(long, default_value = "sitepulse-cli")]
        user_agent: String,

        /// Read page paths from stdin, one per line, recording a view
        /// on every URL change until EOF
        #[arg(long)]
        follow: bool,
    },

    /// List site content from the backend
    Content {
        /// Collection to list (services, portfolio, blogs)
        kind: String,
    },

    /// Initialize Sitepulse configuration
    Init {
        /// Configuration file path
        #[arg(short, long, default_value = "sitepulse-config.yaml")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        config: PathBuf,
    },

    /// Show version information
    Version,

    /// Show health status
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let log_format = if cli.output == "json" {
        "json"
    } else {
        "pretty"
    };
    sitepulse_core::init_logging_with_config(log_level, log_format)?;

    // Handle commands
    match cli.command {
        Some(Commands::Serve { ref host, port }) => {
            handle_serve(host.clone(), port, &cli).await?;
        }

        Some(Commands::Report { days }) => {
            handle_report(days, &cli).await?;
        }

        Some(Commands::Track {
            ref path,
            ref title,
            ref referrer,
            ref user_agent,
            follow,
        }) => {
            if follow {
                handle_follow(referrer.clone(), user_agent.clone(), &cli).await?;
            } else {
                handle_track(
                    path.clone(),
                    title.clone(),
                    referrer.clone(),
                    user_agent.clone(),
                    &cli,
                )
                .await?;
            }
        }

        Some(Commands::Content { ref kind }) => {
            handle_content(kind.clone(), &cli).await?;
        }

        Some(Commands::Init { ref config }) => {
            handle_init(config.clone(), &cli).await?;
        }

        Some(Commands::Validate { ref config }) => {
            handle_validate(config.clone(), &cli).await?;
        }

        Some(Commands::Version) => {
            handle_version(&cli).await?;
        }

        Some(Commands::Health) => {
            handle_health(&cli).await?;
        }

        None => {
            handle_default(&cli).await?;
        }
    }

    Ok(())
}

/// Load the configuration named on the command line, or defaults
fn load_config(cli: &Cli) -> Result<SitepulseConfig> {
    let config = match &cli.config {
        Some(path) => SitepulseConfig::from_file(path)?,
        None => SitepulseConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Event store per the configuration: remote when an API key is set,
/// in-memory otherwise
fn build_store(config: &SitepulseConfig) -> Result<Arc<dyn sitepulse_core::EventStore>> {
    if config.backend.api_key.is_empty() {
        info!("No backend API key configured, using in-memory event store");
        Ok(Arc::new(sitepulse_core::MemoryStore::new()))
    } else {
        Ok(Arc::new(sitepulse_core::RestStore::new(
            config.rest_config(),
        )?))
    }
}

async fn handle_serve(host: String, port: u16, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let store = build_store(&config)?;

    let auth = if config.backend.api_key.is_empty() {
        None
    } else {
        Some(Arc::new(sitepulse_core::AuthClient::new(
            config.rest_config(),
        )?))
    };

    info!("Starting Sitepulse server on {}:{}", host, port);

    let mut builder = sitepulse_serve::ServerBuilder::new()
        .host(host)
        .port(port)
        .default_range_days(config.dashboard.default_range_days)
        .sign_in_path(config.dashboard.sign_in_path.clone());
    if let Some(auth) = auth {
        builder = builder.auth(auth);
    }

    builder.build(store).start().await
}

async fn handle_report(days: i64, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let store = build_store(&config)?;

    let aggregator = sitepulse_core::AnalyticsAggregator::with_defaults(store);
    let snapshot = aggregator.snapshot(days).await?;
    let active = aggregator.active_users().await?;

    match cli.output.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        "yaml" => {
            println!("{}", serde_yaml::to_string(&snapshot)?);
        }
        _ => {
            println!();
            println!("📊 Analytics Report - last {} days", days);
            println!("{:=<50}", "");
            println!("  Page views:       {}", snapshot.total_page_views);
            println!("  Unique visitors:  {}", snapshot.unique_visitors);
            println!("  Pages / visitor:  {:.2}", snapshot.avg_pages_per_visitor);
            println!("  Active users:     {}", active);

            if snapshot.top_pages.is_empty() {
                println!();
                println!("  No data available");
            } else {
                println!();
                println!("  Top pages:");
                for page in &snapshot.top_pages {
                    println!("    {:<30} {:>6} views", page.path, page.views);
                }
                println!();
                println!("  Traffic sources:");
                for referrer in &snapshot.top_referrers {
                    println!(
                        "    {:<30} {:>6} views ({:.1}%)",
                        referrer.label, referrer.views, referrer.percentage
                    );
                }
            }
        }
    }

    Ok(())
}

async fn handle_track(
    path: String,
    title: String,
    referrer: String,
    user_agent: String,
    cli: &Cli,
) -> Result<()> {
    let config = load_config(cli)?;
    let store = build_store(&config)?;

    // Session identity persists across invocations when a state
    // directory is configured
    let window = config.session.window()?;
    let session_id = match &config.session.state_dir {
        Some(dir) => {
            let kv = sitepulse_core::FileKv::new(dir.clone())?;
            sitepulse_core::SessionStore::with_window(kv, window).get_or_create()
        }
        None => sitepulse_core::SessionStore::with_window(sitepulse_core::MemoryKv::new(), window)
            .get_or_create(),
    };

    let ctx = sitepulse_core::PageContext {
        url: path.clone(),
        path,
        title,
        referrer,
        user_agent,
        screen: sitepulse_core::ScreenSize::default(),
    };
    let event = sitepulse_core::build_event(&ctx, session_id.clone());
    sitepulse_core::record_event(store.as_ref(), event).await?;

    println!("✅ Page view recorded for session {}", session_id);
    Ok(())
}

async fn handle_follow(referrer: String, user_agent: String, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let store = build_store(&config)?;
    let window = config.session.window()?;
    let buffer = config.tracker.channel_buffer;

    match &config.session.state_dir {
        Some(dir) => {
            let kv = sitepulse_core::FileKv::new(dir.clone())?;
            let sessions = sitepulse_core::SessionStore::with_window(kv, window);
            follow_stdin(store, sessions, buffer, referrer, user_agent).await
        }
        None => {
            let sessions =
                sitepulse_core::SessionStore::with_window(sitepulse_core::MemoryKv::new(), window);
            follow_stdin(store, sessions, buffer, referrer, user_agent).await
        }
    }
}

/// Feed stdin lines through the URL-change detector until EOF,
/// recording a page view for every line whose URL differs from the last
async fn follow_stdin<K: sitepulse_core::KeyValueStore>(
    store: Arc<dyn sitepulse_core::EventStore>,
    sessions: sitepulse_core::SessionStore<K>,
    buffer: usize,
    referrer: String,
    user_agent: String,
) -> Result<()> {
    use tokio::io::AsyncBufReadExt;

    let (signal, readiness) = sitepulse_core::readiness();
    signal.set_ready();

    let recorder = sitepulse_core::PageViewRecorder::new(store, sessions, readiness.clone());
    let tracker = sitepulse_core::Tracker::new(recorder, readiness);
    let (tx, detector) = sitepulse_core::UrlChangeDetector::new(buffer);

    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let path = line.trim().to_string();
            if path.is_empty() {
                continue;
            }
            let ctx = sitepulse_core::PageContext {
                url: path.clone(),
                path,
                title: String::new(),
                referrer: referrer.clone(),
                user_agent: user_agent.clone(),
                screen: sitepulse_core::ScreenSize::default(),
            };
            if tx.send(ctx).await.is_err() {
                break;
            }
        }
    });

    tracker.run(detector).await;
    Ok(())
}

async fn handle_content(kind: String, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let client = sitepulse_core::ContentClient::new(config.rest_config())?;

    let value = match kind.as_str() {
        "services" => serde_json::to_value(client.list_services().await?)?,
        "portfolio" => serde_json::to_value(client.list_portfolio().await?)?,
        "blogs" => serde_json::to_value(client.list_blogs().await?)?,
        other => {
            return Err(SitepulseError::validation(format!(
                "Unknown content kind: {} (expected services, portfolio, or blogs)",
                other
            )));
        }
    };

    match cli.output.as_str() {
        "yaml" => println!("{}", serde_yaml::to_string(&value)?),
        _ => println!("{}", serde_json::to_string_pretty(&value)?),
    }
    Ok(())
}

async fn handle_init(config_path: PathBuf, _cli: &Cli) -> Result<()> {
    info!("Initializing Sitepulse configuration at {:?}", config_path);

    if config_path.exists() {
        return Err(SitepulseError::validation(format!(
            "Configuration file already exists: {:?}. Remove it first or use a different path.",
            config_path
        )));
    }

    let config = SitepulseConfig::default();
    config.to_file(&config_path)?;

    println!("✅ Configuration initialized at {:?}", config_path);
    println!();
    println!("Next steps:");
    println!("1. Edit the configuration file to set your backend URL and API key");
    println!(
        "2. Run 'sitepulse validate {:?}' to check your configuration",
        config_path
    );
    println!(
        "3. Run 'sitepulse serve --config {:?}' to start the dashboard",
        config_path
    );

    Ok(())
}

async fn handle_validate(config_path: PathBuf, cli: &Cli) -> Result<()> {
    info!("Validating configuration at {:?}", config_path);

    if !config_path.exists() {
        return Err(SitepulseError::not_found(format!(
            "Configuration file not found: {:?}",
            config_path
        )));
    }

    let config = SitepulseConfig::from_file(&config_path)?;

    match config.validate() {
        Ok(()) => match cli.output.as_str() {
            "json" => {
                let result = serde_json::json!({
                    "valid": true,
                    "message": "Configuration is valid",
                    "backend": config.backend.url.as_str()
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            _ => {
                println!("✅ Configuration is valid");
                println!("🌐 Backend URL: {}", config.backend.url);
                println!("⏱️  Session window: {} minutes", config.session.window_minutes);
            }
        },
        Err(e) => {
            match cli.output.as_str() {
                "json" => {
                    let result = serde_json::json!({
                        "valid": false,
                        "error": e.to_string()
                    });
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                _ => {
                    println!("❌ Configuration is invalid: {}", e);
                }
            }
            return Err(e);
        }
    }

    Ok(())
}

async fn handle_version(_cli: &Cli) -> Result<()> {
    println!("{}", sitepulse_core::version_info());
    Ok(())
}

async fn handle_health(_cli: &Cli) -> Result<()> {
    info!("Running health check");

    match sitepulse_core::health_check() {
        Ok(()) => {
            println!("✅ Sitepulse is healthy");
            println!("  ✓ Environment checks passed");
            println!("  ✓ File system access OK");
            println!("  ✓ Core library loaded");
        }
        Err(e) => {
            println!("❌ Health check failed: {}", e);
            return Err(SitepulseError::validation(format!(
                "Health check failed: {}",
                e
            )));
        }
    }

    Ok(())
}

async fn handle_default(_cli: &Cli) -> Result<()> {
    println!("🚀 Welcome to Sitepulse - Web Analytics Pipeline");
    println!();
    println!("Sitepulse records visitor sessions and page views and serves");
    println!("an admin dashboard with aggregated traffic metrics.");
    println!();
    println!("Quick start:");
    println!("  sitepulse init                  # Create configuration file");
    println!("  sitepulse serve                 # Start tracking + dashboard API");
    println!("  sitepulse report --days 7       # Print a traffic report");
    println!("  sitepulse --help                # Show all options");

    Ok(())
}
