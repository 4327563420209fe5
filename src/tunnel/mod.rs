//! Public tunnel management
//!
//! Wraps an external quick-tunnel binary (cloudflared by default) behind a
//! small open/close interface. At most one session exists per process, and
//! tunnel failures are reported to clients without ever touching the timer.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// How long to wait for the tunnel binary to publish its URL.
const URL_WAIT: Duration = Duration::from_secs(30);

/// An active tunnel: the public URL and the process serving it.
#[derive(Debug)]
pub struct TunnelSession {
    pub url: String,
    child: Child,
}

/// Owns the tunnel session and the command used to create one.
#[derive(Debug)]
pub struct TunnelManager {
    command: String,
    origin: String,
    session: Mutex<Option<TunnelSession>>,
}

impl TunnelManager {
    /// Create a manager that exposes `origin` via `command`.
    pub fn new(command: String, origin: String) -> Self {
        Self {
            command,
            origin,
            session: Mutex::new(None),
        }
    }

    /// URL of the active session, if any. Reaps a tunnel process that died
    /// behind our back.
    pub async fn current_url(&self) -> Option<String> {
        // While open() is still waiting for the URL there is no tunnel to
        // report; do not block behind it.
        let mut session = match self.session.try_lock() {
            Ok(session) => session,
            Err(_) => return None,
        };
        let exited = match session.as_mut() {
            Some(active) => match active.child.try_wait() {
                Ok(Some(status)) => {
                    warn!("Tunnel process exited unexpectedly: {}", status);
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    warn!("Failed to poll tunnel process: {}", e);
                    false
                }
            },
            None => return None,
        };
        if exited {
            *session = None;
        }
        session.as_ref().map(|active| active.url.clone())
    }

    /// Open a tunnel to the local server, reusing the active session if one
    /// exists. Returns the public URL.
    pub async fn open(&self) -> Result<String, String> {
        let mut session = self.session.lock().await;
        if let Some(active) = session.as_ref() {
            return Ok(active.url.clone());
        }

        info!("Opening tunnel: {} tunnel --url {}", self.command, self.origin);
        let mut child = Command::new(&self.command)
            .args(["tunnel", "--url", &self.origin])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to spawn {}: {}", self.command, e))?;

        let (url_tx, mut url_rx) = mpsc::channel(1);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(scan_stream(stdout, url_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(scan_stream(stderr, url_tx.clone()));
        }
        drop(url_tx);

        let url = match timeout(URL_WAIT, url_rx.recv()).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                let _ = child.kill().await;
                return Err("Tunnel process exited before publishing a URL".to_string());
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err("Timed out waiting for the tunnel URL".to_string());
            }
        };

        *session = Some(TunnelSession {
            url: url.clone(),
            child,
        });
        Ok(url)
    }

    /// Tear down the active session. Returns whether one was open.
    pub async fn close(&self) -> bool {
        let mut session = self.session.lock().await;
        match session.take() {
            Some(mut active) => {
                if let Err(e) = active.child.kill().await {
                    warn!("Failed to kill tunnel process: {}", e);
                }
                true
            }
            None => false,
        }
    }
}

/// Forward tunnel process output to the log, reporting the first public URL
/// seen. Keeps draining afterwards so the child never blocks on a full pipe.
async fn scan_stream<R>(stream: R, url_tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    let mut url_tx = Some(url_tx);
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("tunnel: {}", line);
        if let Some(url) = extract_tunnel_url(&line) {
            if let Some(tx) = url_tx.take() {
                let _ = tx.send(url).await;
            }
        }
    }
}

/// Pick the quick-tunnel URL out of a log line. cloudflared prints it inside
/// an ASCII banner box, surrounded by pipe characters.
fn extract_tunnel_url(line: &str) -> Option<String> {
    line.split_whitespace()
        .map(|token| token.trim_matches('|'))
        .find(|token| token.starts_with("https://") && token.contains(".trycloudflare.com"))
        .map(ToString::to_string)
}
