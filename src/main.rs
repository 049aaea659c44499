//! OfficeBot - Entry Point
//!
//! Modes:
//! - Default: interactive console
//! - --server / -s: HTTP API for the web frontend

use officebot::{cli, server, App, Config};
use tokio::io::BufReader;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let server_mode = args.iter().any(|a| a == "--server" || a == "-s");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("OfficeBot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: officebot [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --server, -s   Run the HTTP API");
        println!("  --help, -h     Show this help");
        println!();
        println!("Default: interactive console");
        println!();
        println!("Environment variables:");
        println!("  GEMINI_API_KEY         Gemini API key");
        println!("  GEMINI_API_KEYS        Comma-separated keys, rotated on rate limits");
        println!("  GEMINI_MODEL           Model name (default: gemini-flash-latest)");
        println!("  GOOGLE_CLIENT_SECRETS  OAuth client secrets (default: credentials.json)");
        println!("  GOOGLE_TOKEN_PATH      Persisted OAuth token");
        println!("  ASSISTANT_NAME         Assistant persona (default: Friday)");
        println!("  HISTORY_LIMIT          Turns kept in memory (default: 50)");
        println!("  SERVER_PORT            HTTP port (default: 8000)");
        return Ok(());
    }

    // Setup logging based on mode
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if server_mode {
        // Server mode - log to stdout with colors
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        // Console mode - stdout is the conversation, logs go to stderr
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let config = Config::from_env()?;

    if server_mode {
        info!("OfficeBot HTTP server v{}", env!("CARGO_PKG_VERSION"));

        let app = App::connect(&config).await?;
        server::serve(app.into_server_state(), &config.server).await?;
    } else {
        println!("[BOT] Google Workspace Assistant Starting...");
        println!("{}", "=".repeat(50));

        let mut app = App::connect(&config).await?;
        let stdin = BufReader::new(tokio::io::stdin());
        cli::run_repl(&mut app.coordinator, stdin, tokio::io::stdout()).await?;
    }

    Ok(())
}
