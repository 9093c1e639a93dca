use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::{info, LevelFilter};
use tokio::net::TcpListener;

mod calendar;
mod config;
mod csv_export;
mod datetime;
mod error;
mod html;
mod report;
mod routes;
mod source;
mod time_entry;
mod toggl;

use calendar::GermanCalendar;
use config::Settings;
use routes::{router, AppState};

/// Toggl time entryから日毎のタイムシートを提供するHTTPサーバー。
///
/// # Examples
/// ```
/// $ cargo run -- --csv-file export.csv
/// $ curl 'http://127.0.0.1:8080/current?start=2024-03-01&end=2024-03-31&grouping=PROJECT'
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    setup_logger(settings.log_level).context("Failed to initialize logger")?;

    let source = settings
        .validate()
        .context("Failed to validate settings")?;
    info!("Reading time entries from {:?}", source);

    let state = Arc::new(AppState {
        settings: settings.clone(),
        calendar: Box::new(GermanCalendar),
        http: reqwest::Client::new(),
    });

    let listener = TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .await
        .context("Server terminated")?;

    Ok(())
}

/// ログ出力を設定する。
fn setup_logger(level: LevelFilter) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Blue);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {:5} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}
