use clap::Parser;
use std::path::PathBuf;
use stec_cli::Runtime;
use tracing_subscriber::EnvFilter;

/// STEC: the sandboxed tool execution core, driven as a line-oriented JSON
/// protocol over stdin/stdout.
#[derive(Debug, Parser)]
#[clap(author, version)]
struct Cli {
    /// Workspace root the authorized filesystem and shell executor operate
    /// under. Defaults to the current directory.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Overrides `$STEC_HOME` (defaults to `~/.stec`).
    #[arg(long)]
    stec_home: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workspace_root = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let stec_home = cli.stec_home.unwrap_or_else(stec_core::config::default_stec_home);

    let runtime = Runtime::bootstrap(workspace_root, stec_home).await?;
    runtime.run_stdio().await
}
