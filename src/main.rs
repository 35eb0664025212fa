use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use tasktimer::application::bootstrap::{resolve_workspace_root, WorkspaceLayout};
use tasktimer::Cli;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "tasktimer.log";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let workspace_root = match resolve_workspace_root(cli.root.clone(), |key| std::env::var(key).ok()) {
        Ok(root) => root,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&WorkspaceLayout::new(&workspace_root).logs_dir);

    match tasktimer::run(cli, workspace_root).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr and, when the logs directory is writable, to a file in it.
fn init_tracing(logs_dir: &Path) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tasktimer=info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let opened = fs::create_dir_all(logs_dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(logs_dir.join(LOG_FILE_NAME))
    });
    let (file_layer, file_error) = match opened {
        Ok(file) => (
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            None,
        ),
        Err(error) => (None, Some(error)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(error) = file_error {
        tracing::warn!(path = %logs_dir.display(), error = %error, "file logging disabled");
    }
}
