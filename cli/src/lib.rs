mod cli;
mod terminal_view;

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub use cli::Cli;
use parlor_core::Identity;
use parlor_core::InputLine;
use parlor_core::MessageSender;
use parlor_core::Session;
use parlor_core::SessionController;
use parlor_core::WebSocketTransport;
use parlor_core::config::Config;
use parlor_core::config::ConfigOverrides;
use parlor_core::render::LogView;
pub use terminal_view::TerminalView;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::io::Stdin;
use tracing::info;
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

type InputLines = Lines<BufReader<Stdin>>;

pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        server_url,
        api_version,
        username,
        reconnect_delay_ms,
        debug,
    } = cli;

    let config = Config::load_with_overrides(ConfigOverrides {
        server_url,
        api_version,
        reconnect_delay_ms,
    })?;
    let _guard = init_logging(&parlor_core::config::log_dir(&config), debug)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let identity = match username.as_deref().and_then(Identity::parse) {
        Some(identity) => identity,
        None => prompt_for_identity(&mut lines).await?,
    };
    info!(identity = %identity, server = %config.server_url, "starting session");

    let mut controller = SessionController::new(
        Session::new(identity, config),
        stdout_view(),
        Arc::new(WebSocketTransport),
    )?;
    println!("Chatting as {}", controller.session().identity());
    if let Err(err) = controller.start().await {
        anyhow::bail!("failed to load message history: {err}");
    }

    let sender = controller.sender();
    loop {
        tokio::select! {
            event = controller.next_event() => {
                if event.is_none() {
                    break;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(text)) => spawn_send(sender.clone(), text),
                Ok(None) => break,
                Err(err) => {
                    eprintln!("error reading input: {err}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.shutdown().await;
    Ok(())
}

fn init_logging(log_dir: &Path, debug: bool) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let mut log_file_opts = OpenOptions::new();
    log_file_opts.create(true).append(true);

    // Only the current user may read the log.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        log_file_opts.mode(0o600);
    }

    let log_file = log_file_opts.open(log_dir.join("parlor.log"))?;
    let (non_blocking, guard) = non_blocking(log_file);

    let default_filter = if debug {
        "parlor_core=info,parlor_cli=info"
    } else {
        "parlor_core=warn,parlor_cli=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(file_layer).try_init();
    Ok(guard)
}

fn stdout_view() -> Box<dyn LogView> {
    let stdout = std::io::stdout();
    let with_ansi = stdout.is_terminal()
        && supports_color::on_cached(supports_color::Stream::Stdout).is_some();
    if with_ansi {
        Box::new(TerminalView::styled(stdout))
    } else {
        Box::new(TerminalView::plain(stdout))
    }
}

/// Ask for a display name until a non-blank one is entered.
async fn prompt_for_identity(lines: &mut InputLines) -> anyhow::Result<Identity> {
    loop {
        print!("Username: ");
        std::io::stdout().flush()?;
        match lines.next_line().await? {
            Some(raw) => {
                if let Some(identity) = Identity::parse(&raw) {
                    return Ok(identity);
                }
            }
            None => anyhow::bail!("no username entered"),
        }
    }
}

/// Post one typed line without holding up the event loop. A failed send is
/// reported along with the text so it can be retyped.
fn spawn_send(sender: MessageSender, text: String) {
    tokio::spawn(async move {
        let mut input = InputLine::new(text);
        if let Err(err) = input.submit(&sender).await {
            eprintln!("message not sent ({err}): {}", input.text());
        }
    });
}
