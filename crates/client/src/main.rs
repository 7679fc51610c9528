use std::process::ExitCode;

use parlor::{Command, Console, Flow, SettingsStore, TerminalRenderer};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PARLOR_LOG";

/// Line-oriented chat client.
///
/// Logs go to stderr so they never interleave with the rendered chat on stdout.
#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = SettingsStore::load();
    let settings = store.settings();
    let backend = match parlor_api::create_backend(settings.to_client_config()) {
        Ok(backend) => backend,
        Err(error) => {
            tracing::error!(error = %error, "failed to create chat server backend");
            return ExitCode::FAILURE;
        }
    };

    let mut console = Console::new(backend, settings.admin_config(), TerminalRenderer);
    console.start().await;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Err(error) = write_frame(&mut stdout, &console.render_safely()).await {
        tracing::error!(error = %error, "failed to write to stdout");
        return ExitCode::FAILURE;
    }

    loop {
        let frame = tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        console.finish_sends().await;
                        let _ = write_frame(&mut stdout, &console.render_safely()).await;
                        break;
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "failed to read from stdin");
                        break;
                    }
                };

                match Command::parse(&line) {
                    Ok(None) => continue,
                    Ok(Some(command)) => match console.handle(command).await {
                        Flow::Quit => break,
                        Flow::Continue => console.render_safely(),
                        Flow::Reconnect(base_url) => {
                            reconnect(&store, &mut console, &base_url).await;
                            console.render_safely()
                        }
                    },
                    Err(error) => error.to_string(),
                }
            }
            event = console.next_event() => {
                console.apply(event).await;
                console.render_safely()
            }
        };

        if let Err(error) = write_frame(&mut stdout, &frame).await {
            tracing::error!(error = %error, "failed to write to stdout");
            break;
        }
    }

    console.shutdown().await;
    ExitCode::SUCCESS
}

/// Swaps in a console bound to `base_url`; the old one stays if the URL is unusable.
async fn reconnect(store: &SettingsStore, console: &mut Console<TerminalRenderer>, base_url: &str) {
    let candidate = store.settings().with_base_url(base_url);
    let backend = match parlor_api::create_backend(candidate.to_client_config()) {
        Ok(backend) => backend,
        Err(error) => {
            tracing::warn!(base_url, error = %error, "rejected server address");
            console.notify(format!("Cannot use {base_url}: {error}"));
            return;
        }
    };

    let notice = match store.update(candidate.clone()) {
        Ok(saved) => format!(
            "Connected to {}, saved in {}.",
            saved.base_url,
            store.config_path().display()
        ),
        Err(error) => {
            tracing::warn!(error = %error, "server switch not saved");
            format!("Connected to {} for this session only: {error}", candidate.base_url)
        }
    };

    console.shutdown().await;
    *console = Console::new(backend, candidate.admin_config(), TerminalRenderer);
    console.start().await;
    console.notify(notice);
}

async fn write_frame(stdout: &mut tokio::io::Stdout, frame: &str) -> std::io::Result<()> {
    stdout.write_all(frame.as_bytes()).await?;
    stdout.write_all(b"\n> ").await?;
    stdout.flush().await
}
