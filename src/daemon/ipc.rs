use anyhow::Result;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Commands that mutate or inspect the engine. They are forwarded to the
/// daemon loop over a channel so engine access stays single-threaded.
#[derive(Debug)]
pub enum CtlCommand {
    Status,
    Flush,
    List,
    Reload,
    Unfreeze(String),
}

pub struct CtlRequest {
    pub cmd: CtlCommand,
    pub reply: oneshot::Sender<String>,
}

pub type SetLogLevel = Arc<dyn Fn(&str) -> bool + Send + Sync>;

enum Parsed {
    Help,
    Ping,
    Quit,
    SetLog(String),
    Forward(CtlCommand),
}

impl FromStr for Parsed {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut it = s.split_whitespace();
        let cmd = it.next().ok_or("empty")?.to_ascii_uppercase();
        Ok(match cmd.as_str() {
            "HELP" | "?" => Self::Help,
            "PING" => Self::Ping,
            "QUIT" => Self::Quit,
            "STATUS" => Self::Forward(CtlCommand::Status),
            "FLUSH" => Self::Forward(CtlCommand::Flush),
            "LIST" => Self::Forward(CtlCommand::List),
            "RELOAD" => Self::Forward(CtlCommand::Reload),
            "UNFREEZE" => {
                let pkg = it.next().ok_or("usage: UNFREEZE <package>")?;
                Self::Forward(CtlCommand::Unfreeze(pkg.to_string()))
            }
            "SETLOG" | "SET_LOG" => {
                let lvl = it.next().ok_or("usage: SETLOG <debug|info|warn|error>")?;
                Self::SetLog(lvl.to_ascii_lowercase())
            }
            _ => return Err("unknown command (try HELP)"),
        })
    }
}

const HELP: &str = "CMDS:
        - HELP | ?
        - PING
        - STATUS
        - LIST
        - FLUSH
        - RELOAD
        - UNFREEZE <pkg>
        - SETLOG <debug|info|warn|error>
        - QUIT
";

pub async fn start<P: AsRef<Path>>(
    path: P,
    requests: mpsc::Sender<CtlRequest>,
    set_log_level: SetLogLevel,
) -> Result<()> {
    let path_ref = path.as_ref();
    let _ = std::fs::remove_file(path_ref);
    let listener = UnixListener::bind(path_ref)?;
    let _ = std::fs::set_permissions(path_ref, std::fs::Permissions::from_mode(0o660));
    info!(target: "scened::ipc", "Listening at {:?}", path_ref);

    loop {
        let (stream, _) = listener.accept().await?;
        let requests = requests.clone();
        let set_log_level = set_log_level.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, requests, set_log_level).await {
                debug!(target: "scened::ipc", "Client error: {:?}", e);
            }
        });
    }
}

async fn handle_client(
    stream: UnixStream,
    requests: mpsc::Sender<CtlRequest>,
    set_log_level: SetLogLevel,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match line.parse::<Parsed>() {
            Err(usage) => usage.to_string(),
            Ok(Parsed::Help) => HELP.to_string(),
            Ok(Parsed::Ping) => "PONG".to_string(),
            Ok(Parsed::Quit) => break,
            Ok(Parsed::SetLog(level)) => {
                if set_log_level(&level) {
                    format!("log level set to {}", level)
                } else {
                    "invalid log level".to_string()
                }
            }
            Ok(Parsed::Forward(cmd)) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                let sent = requests
                    .send(CtlRequest {
                        cmd,
                        reply: reply_tx,
                    })
                    .await;
                if sent.is_err() {
                    error!(target: "scened::ipc", "Daemon loop gone");
                    "daemon unavailable".to_string()
                } else {
                    reply_rx
                        .await
                        .unwrap_or_else(|_| "daemon unavailable".to_string())
                }
            }
        };

        write_half.write_all(response.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
    }
    Ok(())
}
