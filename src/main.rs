//! portfolio-site: backend service for a personal portfolio site
//!
//! This service runs behind the static site and provides:
//! - Contact form relay to an email provider
//! - Voice assistant widget state machine, one per visitor, driven over HTTP
//! - Initial-load readiness signal that gates the widget's entrance
//!
//! Out of scope:
//! - Page rendering, styling and assets
//! - Audio transport (browser and voice provider talk directly)
//! - Any automatic retry or reconnection

mod config;
mod contact;
mod events;
mod http;
mod lifecycle;
mod voice;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::contact::{ContactService, EmailProvider, ResendMailer};
use crate::http::{AppState, Server};
use crate::lifecycle::{InitialLoader, ReadySignal, ShutdownSignal};
use crate::voice::{command_channel, ElevenLabsProvider, StatusChange, VoiceWidget, WidgetRegistry};

/// A visitor silent for this long is treated as gone and their widget dropped
const VOICE_CLIENT_IDLE: Duration = Duration::from_secs(30 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "portfolio-site starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(
        bind = %config.bind_address,
        email_to = %config.mail.to,
        agent_id = %config.voice.agent_id,
        "configuration loaded"
    );

    // Contact relay
    let mailer = ResendMailer::from_settings(&config.mail)
        .map(|m| Arc::new(m) as Arc<dyn EmailProvider>);
    let contact = Arc::new(ContactService::new(mailer, config.mail.clone()));

    // Voice widgets, one per visitor -> status observers
    let (status_tx, mut status_rx) = broadcast::channel::<StatusChange>(64);
    let voice = {
        let settings = config.voice.clone();
        Arc::new(WidgetRegistry::new(VOICE_CLIENT_IDLE, move |client: &str| {
            // each page load runs its own loader; the widget enters after it
            let ready = ReadySignal::new();
            let watcher = ready.watcher();
            tokio::spawn(
                InitialLoader::new(ready)
                    .run()
                    .instrument(info_span!("loader", %client)),
            );

            let widget = VoiceWidget::new(
                settings.agent_id.clone(),
                ElevenLabsProvider::new(settings.api_url.clone()),
                status_tx.clone(),
            );
            let (handle, commands) = command_channel(32);
            let task = tokio::spawn(
                widget
                    .run(commands, watcher)
                    .instrument(info_span!("voice", %client)),
            );
            (handle, task)
        }))
    };

    let server = Server::bind(
        config.bind_address,
        AppState {
            contact,
            voice: voice.clone(),
        },
    )
    .await?;
    info!(addr = %server.local_addr()?, "ready on http://{}", config.bind_address);

    let shutdown = ShutdownSignal::new();

    info!("service initialized, entering main loop");

    // Main event loop
    let result = tokio::select! {
        // Serve until a shutdown signal, then drain
        result = server.run(async move {
            shutdown.wait().await;
            info!("shutdown signal received");
        }) => {
            if let Err(e) = &result {
                error!(?e, "HTTP server stopped");
            }
            result
        }

        // Log voice session transitions
        _ = async {
            loop {
                match status_rx.recv().await {
                    Ok(change) => {
                        info!(%change, "voice status changed");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "voice status receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("voice status watcher exited");
            Ok(())
        }
    };

    // Cleanup
    info!("shutting down...");

    // Each widget ends its own session as it exits
    voice.shutdown().await;

    info!("portfolio-site stopped");

    result
}
