use std::net::SocketAddr;

use clap::Parser;
use tokio_cron_scheduler::JobScheduler;
use tracing_subscriber::{fmt, EnvFilter};

use processing_service::cli::{run_process, Cli, Command};
use processing_service::config::Config;
use processing_service::scheduler::start_cleanup_scheduler;
use processing_service::{router, ProcessingService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load this crate's .env regardless of current working directory, and override any pre-set envs
    let _ = dotenvy::from_filename_override(concat!(env!("CARGO_MANIFEST_DIR"), "/.env"));
    // Initialize logging
    let filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(true)
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg).await,
        Command::Process { out, files } => {
            let written = run_process(cfg, out, files).await?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    tracing::info!(
        upload_dir = %cfg.upload_dir.display(),
        max_files = cfg.max_files,
        stage_delay_ms = cfg.stage_delay_ms,
        cleanup_enabled = cfg.enable_cleanup,
        "Loaded configuration"
    );

    let service = ProcessingService::new(cfg.clone()).await?;

    let scheduler = JobScheduler::new().await?;
    if cfg.enable_cleanup {
        start_cleanup_scheduler(&scheduler, service.clone()).await?;
        scheduler.start().await?;
        tracing::info!("Cleanup scheduler started");
    }

    let app = router(service);

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.port).parse()?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                tracing::error!(port = cfg.port, "Port is already in use. Another processing-service might be running. Try changing PORT env var or stop the other process.");
            }
            return Err(e.into());
        }
    };
    tracing::info!(port = cfg.port, "Processing service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
