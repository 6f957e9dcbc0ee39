//! vmsg: record voice messages from the terminal.

mod app;
mod attachments;
mod capture;
mod commands;
mod config;
mod logging;
mod widget;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("Fatal error: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
