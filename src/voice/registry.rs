//! Per-visitor voice widgets
//!
//! Each browser drives its own widget, keyed by the id it sends in the
//! `x-voice-client` header. A request without a usable id gets a fresh
//! widget and learns its id from the response header. Widgets that have not
//! been touched for the idle TTL are dropped, which ends their session the
//! same way closing the page would.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

use super::machine::WidgetHandle;

/// Request and response header carrying the client id
pub const CLIENT_HEADER: &str = "x-voice-client";

const MAX_CLIENT_ID_LEN: usize = 64;

/// Builds and spawns the widget for a new client
type SpawnWidget = dyn Fn(&str) -> (WidgetHandle, JoinHandle<()>) + Send + Sync;

struct Entry {
    handle: WidgetHandle,
    task: JoinHandle<()>,
    last_seen: Instant,
}

pub struct WidgetRegistry {
    spawn: Box<SpawnWidget>,
    idle_ttl: Duration,
    widgets: Mutex<HashMap<String, Entry>>,
}

fn is_valid_client_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CLIENT_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn new_client_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

impl WidgetRegistry {
    pub fn new<F>(idle_ttl: Duration, spawn: F) -> Self
    where
        F: Fn(&str) -> (WidgetHandle, JoinHandle<()>) + Send + Sync + 'static,
    {
        Self {
            spawn: Box::new(spawn),
            idle_ttl,
            widgets: Mutex::new(HashMap::new()),
        }
    }

    /// The widget for `client`, spawning one on first contact
    ///
    /// Returns the id the widget is filed under, which differs from the
    /// requested one when that was missing or malformed.
    pub fn handle_for(&self, client: Option<&str>) -> (String, WidgetHandle) {
        let now = Instant::now();
        let mut widgets = self.widgets.lock().unwrap_or_else(PoisonError::into_inner);

        widgets.retain(|id, entry| {
            let live = now.duration_since(entry.last_seen) < self.idle_ttl;
            if !live {
                info!(client = %id, "dropping idle voice client");
            }
            live
        });

        let id = match client.filter(|id| is_valid_client_id(id)) {
            Some(id) => id.to_string(),
            None => new_client_id(),
        };

        let entry = widgets.entry(id.clone()).or_insert_with(|| {
            info!(client = %id, "new voice client");
            let (handle, task) = (self.spawn)(&id);
            Entry {
                handle,
                task,
                last_seen: now,
            }
        });
        entry.last_seen = now;

        (id, entry.handle.clone())
    }

    pub fn client_count(&self) -> usize {
        self.widgets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop every widget and wait for each to end its session
    pub async fn shutdown(&self) {
        let entries: Vec<Entry> = self
            .widgets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry)
            .collect();

        info!(clients = entries.len(), "stopping voice widgets");

        // release all handles before waiting so the widgets wind down together
        let tasks: Vec<_> = entries.into_iter().map(|entry| entry.task).collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!(?e, "voice widget task panicked");
            }
        }
    }
}
