mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{load, with_context, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_RUNTIME_ERROR};
use containedenv_core::UpOptions;
use containedenv_schema::CONFIG_FILE_NAME;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "containedenv",
    version,
    about = "Reproducible per-project development containers"
)]
struct Cli {
    /// Path to the containedenv config file.
    #[arg(short, long, default_value = CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the image and start the container, reusing whatever exists.
    Up {
        /// Destroy and recreate an existing image and container.
        #[arg(long, default_value_t = false)]
        rebuild: bool,
        /// Do not run project setup in the container.
        #[arg(long, default_value_t = false)]
        no_setup: bool,
    },
    /// Print the provisioning script without building anything.
    Plan,
    /// Run project setup in the existing container.
    Setup,
    /// Remove the container and its image.
    Down,
    /// Show whether the image and container exist.
    Status,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CONTAINEDENV_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let json = cli.json;
    let config_path = cli.config;
    let result = match cli.command {
        Commands::Up { rebuild, no_setup } => with_context(&config_path, json, |ctx| {
            commands::up::run(
                ctx,
                UpOptions {
                    rebuild,
                    setup: !no_setup,
                },
            )
        }),
        Commands::Plan => load(&config_path).and_then(|config| commands::plan::run(&config, json)),
        Commands::Setup => with_context(&config_path, json, commands::setup::run),
        Commands::Down => with_context(&config_path, json, commands::down::run),
        Commands::Status => with_context(&config_path, json, commands::status::run),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("configuration error:")
                || msg.starts_with("failed to parse config")
                || msg.starts_with("failed to read config")
            {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("runtime error:") {
                EXIT_RUNTIME_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
