use crate::core::cmd::run_async;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const PM_BIN: &str = "/system/bin/pm";
const AM_BIN: &str = "/system/bin/am";
const PM_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeMethod {
    /// `pm suspend`: hides the app without removing its launcher icon.
    Suspend,
    /// `pm disable`: outright disables the package.
    Disable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeJob {
    pub package: String,
    pub method: FreezeMethod,
}

/// Packages whose component state must be toggled through the user-scoped
/// path; disabling them outright breaks dependent system services.
const VENDOR_PATH_PACKAGES: &[&str] = &["com.android.vending"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Generic,
    Vendor,
}

fn strategy_for(package: &str) -> Strategy {
    if VENDOR_PATH_PACKAGES.contains(&package) {
        Strategy::Vendor
    } else {
        Strategy::Generic
    }
}

async fn pm(args: &[&str]) -> bool {
    match run_async(PM_BIN, args, PM_TIMEOUT_MS).await {
        Ok(out) if out.status.success() => true,
        Ok(out) => {
            error!(
                target: "scened::freezer",
                "pm {:?} failed: {}",
                args,
                String::from_utf8_lossy(&out.stderr).trim()
            );
            false
        }
        Err(e) => {
            error!(target: "scened::freezer", "pm {:?} error: {:#}", args, e);
            false
        }
    }
}

pub async fn suspend_app(package: &str) {
    match strategy_for(package) {
        Strategy::Vendor => {
            pm(&["disable-user", "--user", "0", package]).await;
        }
        Strategy::Generic => {
            pm(&["suspend", package]).await;
            if let Err(e) = run_async(AM_BIN, &["force-stop", package], PM_TIMEOUT_MS).await {
                error!(target: "scened::freezer", "am force-stop {} error: {:#}", package, e);
            }
        }
    }
}

pub async fn disable_app(package: &str) {
    match strategy_for(package) {
        Strategy::Vendor => {
            pm(&["disable-user", "--user", "0", package]).await;
        }
        Strategy::Generic => {
            pm(&["disable", package]).await;
        }
    }
}

pub async fn unfreeze_app(package: &str) {
    match strategy_for(package) {
        Strategy::Vendor => {
            pm(&["enable", package]).await;
        }
        Strategy::Generic => {
            pm(&["unsuspend", package]).await;
            pm(&["enable", package]).await;
        }
    }
}

/// Spawn the freeze worker and return its job queue.
///
/// Cache bookkeeping stays on the caller's task; only the slow `pm`
/// invocation crosses the channel, so a wedged executor stalls its own
/// freeze action and nothing else.
pub fn spawn_worker() -> mpsc::UnboundedSender<FreezeJob> {
    let (tx, mut rx) = mpsc::unbounded_channel::<FreezeJob>();

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            info!(
                target: "scened::freezer",
                "Freezing {} ({:?})",
                job.package,
                job.method
            );
            match job.method {
                FreezeMethod::Suspend => suspend_app(&job.package).await,
                FreezeMethod::Disable => disable_app(&job.package).await,
            }
        }
        debug!(target: "scened::freezer", "Freeze worker stopped");
    });

    tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vending_uses_vendor_path() {
        assert_eq!(strategy_for("com.android.vending"), Strategy::Vendor);
        assert_eq!(strategy_for("com.example.game"), Strategy::Generic);
    }
}
