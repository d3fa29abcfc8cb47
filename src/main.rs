use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

mod core;
mod daemon;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let base_filter = EnvFilter::new("info");
    let (filter_layer, filter_handle) = reload::Layer::new(base_filter);
    let timer = tracing_subscriber::fmt::time::UtcTime::new(
        time::format_description::parse("[hour]:[minute]:[second]").unwrap(),
    );

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_level(false)
                .with_timer(timer)
                .with_writer(std::io::stderr),
        )
        .init();

    let (settings, scenes) = core::config::load_all()?;

    if settings.daemon.log_level != "info" {
        let _ = filter_handle.reload(EnvFilter::new(&settings.daemon.log_level));
    }

    tracing::info!(
        "scened v{} started (scenes={}, freeze_limit={}, ttl={}min, suspend={})",
        env!("CARGO_PKG_VERSION"),
        scenes.scene.len(),
        settings.freezer.item_limit,
        settings.freezer.time_limit_mins,
        settings.freezer.suspend_mode
    );

    daemon::run::run_with_config(settings, scenes, filter_handle).await
}
