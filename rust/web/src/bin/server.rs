//! Standalone game service binary
//!
//! Usage: cargo run -p gotg_web --bin gotg-web-server

use gotg_web::{AppSettings, LogFormat, ServerConfig, WebServer};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    gotg_web::init_logging(LogFormat::from_env())?;

    let args: Vec<String> = std::env::args().collect();
    let mut host = "127.0.0.1".to_string();
    let mut port = 8080u16;
    let mut settings_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                if i + 1 < args.len() {
                    host = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --host requires a value");
                    std::process::exit(1);
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("Error: invalid port number");
                        std::process::exit(1);
                    });
                    i += 2;
                } else {
                    eprintln!("Error: --port requires a value");
                    std::process::exit(1);
                }
            }
            "--settings" | "-s" => {
                if i + 1 < args.len() {
                    settings_path = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("Error: --settings requires a value");
                    std::process::exit(1);
                }
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    let settings = match &settings_path {
        Some(path) => AppSettings::load(path)?,
        None => AppSettings::default(),
    };

    let config = ServerConfig::new(host, port);
    tracing::info!(
        host = %config.host(),
        port = config.port(),
        time_budget_minutes = settings.time_budget_minutes,
        retry_backoff_ms = ?settings.retry_backoff_ms,
        archive = ?settings.archive_path,
        "starting game service"
    );

    let server = WebServer::new(config, settings)?;
    let handle = server.start().await?;

    tracing::info!(address = %handle.address(), "server running");
    println!("Server running at http://{}", handle.address());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down server");
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}

fn print_help() {
    println!("Game of the Generals game service");
    println!();
    println!("Usage: gotg-web-server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --host, -h <HOST>           Host to bind to (default: 127.0.0.1)");
    println!("  --port, -p <PORT>           Port to bind to (default: 8080)");
    println!("  --settings, -s <FILE>       JSON settings file");
    println!("  --help                      Show this help message");
}
