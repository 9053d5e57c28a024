/**
 * FieldSync Daemon Entry Point
 *
 * Runs the offline-first sync engine against the configured server, or
 * performs one-off maintenance on the local store.
 */
use clap::{Parser, Subcommand};
use fieldsync::engine::FieldSync;
use fieldsync::shared::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "fieldsync", version, about = "Offline-first sync engine for field inspections")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the engine and keep syncing until Ctrl-C
    Run,
    /// Run one sync pass and print its summary
    Sync,
    /// Print queue statistics and failed items
    Status,
    /// Remove finished queue items past the retention window
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let engine = FieldSync::open_http(config).await?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            engine.start().await;
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutdown requested");
        }
        Command::Sync => {
            engine.monitor().check_now().await;
            match engine.sync().sync_all().await? {
                Some(summary) => println!(
                    "synced {} of {} items ({} failed)",
                    summary.success_count, summary.total, summary.error_count
                ),
                None => println!("server unreachable, nothing synced"),
            }
        }
        Command::Status => {
            let queue = engine.sync().queue();
            let stats = queue.stats().await?;
            println!(
                "pending: {}  completed: {}  failed: {}",
                stats.pending, stats.completed, stats.failed
            );
            let failed = queue.failed_items().await?;
            for item in &failed.items {
                println!(
                    "  #{} {} entity={} retries={} error={}",
                    item.id,
                    item.item_type(),
                    item.payload.entity_id(),
                    item.retry_count,
                    item.last_error.as_deref().unwrap_or("-")
                );
            }
            for row in &failed.undecodable {
                println!(
                    "  #{} {} (undecodable) entity={} error={}",
                    row.id,
                    row.item_type,
                    row.related_entity_id.as_deref().unwrap_or("-"),
                    row.last_error.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Cleanup => {
            let removed = engine.sync().cleanup().await?;
            println!("removed {removed} finished queue items");
        }
    }

    engine.shutdown().await;
    Ok(())
}
