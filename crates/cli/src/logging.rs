// Logging: tracing to stderr, plus the per-run process log file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use listmerge_engine::{LogLine, LogSink, TracingSink};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr subscriber. `RUST_LOG` overrides the default level.
pub fn init(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Ignore the error if a subscriber is already installed
    let _ = fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Open (truncating) the process log in `dir`.
pub fn open_log_file(dir: &Path, file_name: &str) -> std::io::Result<(PathBuf, File)> {
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    let path = dir.join(file_name);
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Forwards run log lines to tracing and the optional log file until `done`
/// fires, then flushes whatever is still queued.
pub struct LogDrain {
    done: CancellationToken,
    handle: JoinHandle<()>,
}

impl LogDrain {
    pub fn spawn(mut rx: UnboundedReceiver<LogLine>, file: Option<File>) -> Self {
        let done = CancellationToken::new();
        let handle = tokio::spawn({
            let done = done.clone();
            async move {
                let mut file = file.map(BufWriter::new);
                loop {
                    tokio::select! {
                        biased;
                        line = rx.recv() => match line {
                            Some(line) => forward(line, file.as_mut()),
                            None => break,
                        },
                        _ = done.cancelled() => {
                            while let Ok(line) = rx.try_recv() {
                                forward(line, file.as_mut());
                            }
                            break;
                        }
                    }
                }
                if let Some(mut f) = file {
                    let _ = f.flush();
                }
            }
        });
        Self { done, handle }
    }

    /// Stop draining. Sinks still held by abandoned workers are not waited for.
    pub async fn finish(self) {
        self.done.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("log drain failed: {e}");
        }
    }
}

fn forward(line: LogLine, file: Option<&mut BufWriter<File>>) {
    if let Some(f) = file {
        if let Err(e) = writeln!(f, "{line}") {
            tracing::warn!("cannot write process log: {e}");
        }
    }
    TracingSink.emit(line);
}
