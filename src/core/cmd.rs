use anyhow::{Context, Result};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command as TokioCommand;

/// Run a privileged command asynchronously, bounded by a timeout.
pub async fn run_async(program: &str, args: &[&str], timeout_ms: u64) -> Result<Output> {
    let timeout = Duration::from_millis(timeout_ms);

    tokio::time::timeout(timeout, TokioCommand::new(program).args(args).output())
        .await
        .context("Command timeout")?
        .with_context(|| format!("Failed to execute: {}", program))
}

/// Synchronous variant for callers that cannot await (the settings accessor
/// is invoked inline from the transition sequence). The command runs on a
/// throwaway thread so a wedged binary cannot stall the caller past the
/// timeout.
pub fn run_sync(program: &str, args: &[&str], timeout_ms: u64) -> Result<Output> {
    use std::process::Command;
    use std::sync::mpsc;
    use std::thread;

    let program = program.to_string();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let result = Command::new(&program)
            .args(&args)
            .output()
            .with_context(|| format!("Failed to execute: {}", program));
        let _ = tx.send(result);
    });

    rx.recv_timeout(Duration::from_millis(timeout_ms))
        .context("Command timeout")?
}

/// Like [`run_sync`], but flattens the result to trimmed stdout and treats a
/// non-zero exit status as an error.
pub fn run_sync_stdout(program: &str, args: &[&str], timeout_ms: u64) -> Result<String> {
    let out = run_sync(program, args, timeout_ms)?;
    if !out.status.success() {
        anyhow::bail!(
            "{} exited with {}: {}",
            program,
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
