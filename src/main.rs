//! clipkeep - command line entry point

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use clipkeep::clipboard::source::{ClipSelection, XClipSource};
use clipkeep::config::settings::{self, Settings};
use clipkeep::history::store::Tier;
use clipkeep::service::client::Client;
use clipkeep::service::protocol::Request;
use clipkeep::service::Service;

#[derive(Parser)]
#[command(
    name = "clipkeep",
    version,
    about = "Clipboard selection history for X11 desktops",
    long_about = "Clipboard selection history for X11 desktops.\n\n\
        The server watches the primary and clipboard selections and keeps a\n\
        deduplicated history; the other subcommands talk to it over a unix\n\
        socket and compose with tools such as fzf:\n\n\
        clipkeep list | fzf --read0 | clipkeep copy"
)]
struct Cli {
    /// Path of the daemon unix socket
    #[arg(short, long, global = true, default_value_os_t = settings::default_socket_path())]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the clipboard watching daemon
    Server(ServerArgs),
    /// List the history as NUL-terminated lines, most relevant first
    List,
    /// Copy a listed selection back to the clipboard; reads the line from stdin
    Copy(CopyArgs),
    /// Print a single selection, intended for previews; reads the line from stdin
    Print(PrintArgs),
    /// Clear selections matching the line read from stdin
    Clear(ClearArgs),
}

#[derive(Args)]
struct ServerArgs {
    /// Path of the history database
    #[arg(long, default_value_os_t = settings::default_history_path())]
    history: PathBuf,
    /// Polling interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
    /// Ephemeral tier capacity
    #[arg(long, default_value_t = 200)]
    max_ephemeral: usize,
    /// Important tier capacity
    #[arg(long, default_value_t = 100)]
    max_important: usize,
}

#[derive(Args)]
struct CopyArgs {
    /// X11 selection(s) to copy to; repeat to replicate the copy
    #[arg(
        short = 'c',
        long = "clipboard-selection",
        value_enum,
        default_values_t = vec![ClipSelection::Clipboard]
    )]
    selections: Vec<ClipSelection>,
}

#[derive(Args)]
struct PrintArgs {
    /// Strip the indentation detected on the first line
    #[arg(short, long)]
    unindent: bool,
}

#[derive(Args)]
struct ClearArgs {
    /// Tier of entries to clear
    #[arg(long = "type", value_enum, default_value = "all")]
    tier: Tier,
    /// Clear every entry of the tier instead of matching a line from stdin
    #[arg(long)]
    all: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => run_server(cli.socket, args).await,
        Command::List => run_client(&cli.socket, Request::List).await,
        Command::Copy(args) => {
            let line = read_stdin()?;
            run_client(
                &cli.socket,
                Request::Copy {
                    line,
                    selections: args.selections,
                },
            )
            .await
        }
        Command::Print(args) => {
            let line = read_stdin()?;
            run_client(
                &cli.socket,
                Request::Print {
                    line,
                    unindent: args.unindent,
                },
            )
            .await
        }
        Command::Clear(args) => {
            let request = if args.all {
                Request::ClearAll { tier: args.tier }
            } else {
                Request::Clear {
                    pattern: read_stdin()?,
                    tier: args.tier,
                }
            };
            run_client(&cli.socket, request).await
        }
    }
}

async fn run_server(socket: PathBuf, args: ServerArgs) -> anyhow::Result<()> {
    anyhow::ensure!(
        args.poll_interval_ms > 0,
        "poll interval must be greater than zero"
    );
    let settings = Settings {
        history_path: args.history,
        socket_path: socket,
        poll_interval_ms: args.poll_interval_ms,
        max_ephemeral: args.max_ephemeral,
        max_important: args.max_important,
    };

    let service = Arc::new(Service::new(settings, Arc::new(XClipSource))?);
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());
    service.run(cancel).await
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(err) => {
                    log::error!("failed to install SIGTERM handler: {}", err);
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        log::info!("shutting down");
        cancel.cancel();
    });
}

async fn run_client(socket: &Path, request: Request) -> anyhow::Result<()> {
    let client = Client::new(socket);
    let mut stdout = tokio::io::stdout();
    client
        .run_to(&request, &mut stdout)
        .await
        .context("request failed")?;
    Ok(())
}

/// The addressed line arrives on stdin, usually piped out of fzf
fn read_stdin() -> anyhow::Result<Vec<u8>> {
    let mut line = Vec::new();
    std::io::stdin()
        .read_to_end(&mut line)
        .context("failed to read stdin")?;
    Ok(line)
}
