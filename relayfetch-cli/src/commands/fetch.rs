//! `relayfetch fetch` - download one URL.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use relayfetch::{transforms, FetchRequest, Session, SessionState};

use super::common::{Engine, TICK_INTERVAL_MS};
use crate::error::CliError;

/// Arguments for the fetch command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// URL to download
    pub url: String,

    /// Send this form-encoded body with a POST instead of a GET
    #[arg(long)]
    pub post: Option<String>,

    /// Request timeout in milliseconds (0 or less uses the configured default)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub timeout_ms: i64,

    /// Gunzip the body once received
    #[arg(long)]
    pub gunzip: bool,

    /// Write the body to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl FetchArgs {
    fn to_request(&self) -> FetchRequest {
        let mut request = FetchRequest::new(&self.url).with_timeout_ms(self.timeout_ms);
        if let Some(body) = &self.post {
            request = request.with_post_body(body.as_bytes());
        }
        if self.gunzip {
            request = request.with_shared_transform(transforms::gunzip());
        }
        request
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} ({bytes_per_sec})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-");
    bar.set_style(style);
    bar
}

fn update_bar(bar: &ProgressBar, session: &Session) {
    if let Some(total) = session.total_length() {
        bar.set_length(total);
        bar.set_position((session.progress() as f64 * total as f64) as u64);
    }
}

/// Run the fetch command.
pub fn run(args: FetchArgs, engine: &mut Engine) -> Result<(), CliError> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Setup(format!("Failed to set signal handler: {}", e)))?;

    let (done_tx, done_rx) = mpsc::channel();
    let session = engine
        .fetcher
        .start_download(args.to_request(), move |_session| {
            let _ = done_tx.send(());
        });

    let bar = progress_bar(args.quiet);
    loop {
        engine.pump();
        if done_rx.try_recv().is_ok() {
            break;
        }
        if interrupted.load(Ordering::SeqCst) {
            session.dispose();
            bar.abandon_with_message("interrupted");
            return Err(CliError::Interrupted);
        }
        update_bar(&bar, &session);
        thread::sleep(Duration::from_millis(TICK_INTERVAL_MS));
    }
    bar.finish_and_clear();

    if session.state() != SessionState::Succeeded {
        let error = session.error();
        session.dispose();
        return Err(error.map(CliError::Fetch).unwrap_or(CliError::Interrupted));
    }
    if let Some(error) = session.error() {
        tracing::debug!(url = %session.url(), error = %error, "Succeeded after a failed attempt");
    }

    let body = session.bytes();
    session.dispose();

    match args.output {
        Some(path) => {
            fs::write(&path, &body).map_err(|source| CliError::Output {
                path: path.clone(),
                source,
            })?;
            eprintln!("Saved {} bytes to {}", body.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&body)
                .and_then(|_| stdout.flush())
                .map_err(|source| CliError::Output {
                    path: PathBuf::from("<stdout>"),
                    source,
                })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: &str) -> FetchArgs {
        FetchArgs {
            url: url.to_string(),
            post: None,
            timeout_ms: 0,
            gunzip: false,
            output: None,
            quiet: true,
        }
    }

    #[test]
    fn test_get_request_from_args() {
        let request = args("http://example.com/a").to_request();
        assert_eq!(request.url(), "http://example.com/a");
        assert!(request.post_body().is_none());
        assert!(request.transform().is_none());
    }

    #[test]
    fn test_post_and_gunzip_from_args() {
        let mut fetch = args("http://example.com/form");
        fetch.post = Some("a=1".to_string());
        fetch.gunzip = true;
        fetch.timeout_ms = 1500;

        let request = fetch.to_request();
        assert_eq!(request.post_body(), Some(&b"a=1"[..]));
        assert!(request.transform().is_some());
        assert_eq!(request.timeout_ms(), 1500);
    }

    #[test]
    fn test_empty_post_stays_get() {
        let mut fetch = args("http://example.com/form");
        fetch.post = Some(String::new());
        assert!(fetch.to_request().post_body().is_none());
    }
}
