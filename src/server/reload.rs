//! Live-reload notifications.
//!
//! Jobs that need to reach connected browsers hold a [`ReloadHandle`]; the
//! dev server subscribes to it and forwards events over SSE.

use crate::build::{BuildContext, Job, JobOutput, TaskError};
use async_trait::async_trait;
use std::path::{Component, Path};
use tokio::sync::broadcast;

/// Pending notifications kept for slow clients.
const CHANNEL_CAPACITY: usize = 64;

/// A notification for connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Reload the whole page
    Reload,
    /// Re-fetch the stylesheet at this URL path (relative to the site root)
    Css(String),
}

impl ReloadEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ReloadEvent::Reload => "reload",
            ReloadEvent::Css(_) => "css",
        }
    }

    /// SSE payload. Never empty: browsers drop events without data.
    pub fn data(&self) -> &str {
        match self {
            ReloadEvent::Reload => "reload",
            ReloadEvent::Css(path) => path,
        }
    }
}

/// Sending side of the live-reload channel.
///
/// Cloning is cheap. Sends never wait and are dropped when no browser is
/// connected.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<ReloadEvent>,
}

impl ReloadHandle {
    /// Create a handle with no subscribers.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Number of connected subscribers.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Ask browsers to reload the page.
    pub fn reload(&self) {
        self.send(ReloadEvent::Reload);
    }

    /// Ask browsers to swap one stylesheet, given its path under the output root.
    pub fn stylesheet(&self, relative: &Path) {
        self.send(ReloadEvent::Css(url_path(relative)));
    }

    fn send(&self, event: ReloadEvent) {
        match self.tx.send(event) {
            Ok(clients) => tracing::debug!(clients, "sent live reload"),
            Err(_) => tracing::trace!("no live reload clients"),
        }
    }
}

impl Default for ReloadHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn url_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Job that reloads every connected browser.
#[derive(Debug, Clone)]
pub struct Reload {
    handle: ReloadHandle,
}

impl Reload {
    /// Create the job.
    pub fn new(handle: ReloadHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Job for Reload {
    fn name(&self) -> &str {
        "reload"
    }

    async fn run(&self, _ctx: &BuildContext) -> Result<JobOutput, TaskError> {
        self.handle.reload();
        Ok(JobOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::path::PathBuf;

    #[test]
    fn test_send_without_clients_is_dropped() {
        let handle = ReloadHandle::new();
        assert_eq!(handle.client_count(), 0);
        handle.reload();
        handle.stylesheet(Path::new("css/style.min.css"));
    }

    #[test]
    fn test_stylesheet_event_uses_url_path() {
        let handle = ReloadHandle::new();
        let mut rx = handle.subscribe();
        handle.stylesheet(Path::new("./css/style.min.css"));

        let event = rx.try_recv().unwrap();
        assert_eq!(event, ReloadEvent::Css("css/style.min.css".to_string()));
        assert_eq!(event.name(), "css");
        assert_eq!(event.data(), "css/style.min.css");
    }

    #[tokio::test]
    async fn test_reload_job_notifies() {
        let handle = ReloadHandle::new();
        let mut rx = handle.subscribe();
        let ctx = BuildContext::new(default_config(), PathBuf::from("/project"));

        let output = Reload::new(handle.clone()).run(&ctx).await.unwrap();
        assert!(output.outputs.is_empty());
        assert_eq!(rx.recv().await.unwrap(), ReloadEvent::Reload);
    }

    #[test]
    fn test_every_event_has_data() {
        for event in [ReloadEvent::Reload, ReloadEvent::Css("css/a.css".to_string())] {
            assert!(!event.data().is_empty(), "{} has no payload", event.name());
        }
    }
}
