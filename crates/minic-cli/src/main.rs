//! Mini C CLI
//!
//! Runs the compile-and-classify backend, or checks a single file.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use minic_server::{assistant, connect_or_null, create_router, AppState, Config, Feedback};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Mini C - compile, run and explain C programs
///
/// Serves an HTTP API that builds submitted C code with the system compiler,
/// runs it under a timeout, classifies the outcome and asks an assistant
/// for feedback.
#[derive(Parser, Debug)]
#[command(name = "minic")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: minic.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve(ServeArgs),

    /// Compile, run and classify one file, then exit
    Check {
        /// C source file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    /// Address to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not look for the indicator board
    #[arg(long)]
    no_indicator: bool,

    /// Serial port to try for the indicator board (repeatable)
    #[arg(long = "serial-port", value_name = "PORT")]
    serial_ports: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Some(Command::Check { file }) => check(&config, &file).await,
        Some(Command::Serve(serve_args)) => {
            apply_overrides(&mut config, &serve_args);
            serve(config).await.map(|()| ExitCode::SUCCESS)
        }
        None => {
            apply_overrides(&mut config, &ServeArgs::default());
            serve(config).await.map(|()| ExitCode::SUCCESS)
        }
    }
}

fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn apply_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(ref host) = args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.no_indicator {
        config.indicator.enabled = false;
    }
    if !args.serial_ports.is_empty() {
        config.indicator.candidates.clone_from(&args.serial_ports);
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    // Re-validate after overrides
    config.validate()?;
    print_config(&config);

    let pipeline = config.build_pipeline()?;
    let assistant = assistant::from_config(&config.assistant);

    // Connecting sleeps while the board resets.
    let indicator_config = config.indicator.clone();
    let indicator = tokio::task::spawn_blocking(move || connect_or_null(&indicator_config)).await?;
    match indicator.address() {
        Some(port) => println!("Arduino connected on {port}"),
        None => println!("Arduino not found, running in simulation mode"),
    }

    let router = create_router(AppState::new(pipeline, assistant, indicator));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("Mini C backend running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl+C, stop the process to exit");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}

async fn check(config: &Config, file: &Path) -> anyhow::Result<ExitCode> {
    let source = tokio::fs::read_to_string(file).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read '{}': {e}\n\nSuggestion: Check the path to the C source file",
            file.display()
        )
    })?;

    let pipeline = config.build_pipeline()?;
    let verdict = pipeline.compile_and_run(&source).await?;

    let assistant = assistant::from_config(&config.assistant);
    let feedback = Feedback::gather(assistant.as_ref(), &verdict, source.trim()).await;

    println!("Status: {}", verdict.status());
    println!();
    println!("Compiler output:");
    println!("{}", verdict.compiler_message());
    if !verdict.program_output().is_empty() {
        println!();
        println!("Program output:");
        println!("{}", verdict.program_output());
    }
    println!();
    println!("Feedback:");
    println!("{}", feedback.llm_feedback);
    if !feedback.corrected_code.is_empty() {
        println!();
        println!("Suggested fix:");
        println!("{}", feedback.corrected_code);
    }

    Ok(if verdict.status().is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Listen: {}:{}", config.host, config.port);
    println!(
        "  Compiler: {} {}",
        config.compiler.program,
        config.compiler.flags.join(" ")
    );
    println!("  Run timeout: {}s", config.compiler.run_timeout_secs);
    if config.assistant.enabled {
        println!(
            "  Assistant: {:?} ({})",
            config.assistant.provider, config.assistant.model
        );
    } else {
        println!("  Assistant: disabled");
    }
    if config.indicator.enabled {
        println!(
            "  Indicator ports: {}",
            config.indicator.candidates.join(", ")
        );
    } else {
        println!("  Indicator: disabled");
    }
}
