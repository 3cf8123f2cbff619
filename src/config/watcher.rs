//! Config file watcher for hot reload.
//!
//! # Responsibilities
//! - Watch the config file's directory, so saves that replace the file by
//!   rename are still seen
//! - Coalesce bursts of file events into a single reload
//! - Forward only configs that parse, validate and differ from the last one
//!
//! # Design Decisions
//! - The notify callback only signals; loading happens on a Tokio task
//! - A config that fails to load is logged and the current one is kept

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::schema::ScenarioConfig;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches the config file and sends reloaded configs.
pub struct ConfigWatcher {
    path: PathBuf,
    current: ScenarioConfig,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<ScenarioConfig>,
}

impl ConfigWatcher {
    /// `current` is the config the server started with; reloads equal to it
    /// are not forwarded.
    pub fn new(
        path: &Path,
        current: ScenarioConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ScenarioConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current,
                debounce: DEFAULT_DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    /// Quiet period that must follow the last file event before reloading.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called inside a Tokio runtime. The returned
    /// watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self.path.file_name().map(OsString::from);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches_file(&event, file_name.as_deref()) => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        self.spawn_reload_loop(event_rx);
        Ok(watcher)
    }

    /// Reload once per burst of events until the event source or the update
    /// receiver goes away.
    pub(crate) fn spawn_reload_loop(
        mut self,
        mut events: mpsc::UnboundedReceiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while events.recv().await.is_some() {
                while let Ok(Some(())) = tokio::time::timeout(self.debounce, events.recv()).await {}

                let Some(next) = self.reload() else {
                    continue;
                };
                if self.update_tx.send(next).is_err() {
                    break;
                }
            }
        })
    }

    /// Load the file; `None` if it fails or matches the current config.
    fn reload(&mut self) -> Option<ScenarioConfig> {
        match load_config(&self.path) {
            Ok(next) if next == self.current => {
                tracing::debug!(path = ?self.path, "Config file touched without changes");
                None
            }
            Ok(next) => {
                tracing::info!(path = ?self.path, "Config file changed");
                self.current = next.clone();
                Some(next)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to reload config, keeping current configuration"
                );
                None
            }
        }
    }
}

fn touches_file(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }
    match file_name {
        Some(name) => event.paths.iter().any(|p| p.file_name() == Some(name)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind};

    struct TempConfig(PathBuf);

    impl TempConfig {
        fn new(content: &str) -> Self {
            let path = std::env::temp_dir()
                .join(format!("scenarios-{}.toml", uuid::Uuid::new_v4()));
            std::fs::write(&path, content).unwrap();
            Self(path)
        }

        fn write(&self, content: &str) {
            std::fs::write(&self.0, content).unwrap();
        }
    }

    impl Drop for TempConfig {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn only_events_for_the_config_file_count() {
        let name = std::ffi::OsStr::new("scenarios.toml");
        assert!(touches_file(
            &event(EventKind::Modify(ModifyKind::Any), "/etc/app/scenarios.toml"),
            Some(name)
        ));
        assert!(touches_file(
            &event(EventKind::Create(CreateKind::File), "/etc/app/scenarios.toml"),
            Some(name)
        ));
        assert!(!touches_file(
            &event(EventKind::Modify(ModifyKind::Any), "/etc/app/.scenarios.toml.swp"),
            Some(name)
        ));
        assert!(!touches_file(
            &event(EventKind::Remove(RemoveKind::File), "/etc/app/scenarios.toml"),
            Some(name)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_reloads_once_and_skips_unchanged() {
        let file = TempConfig::new("[timeouts]\npublish_ms = 500\n");
        let current = load_config(&file.0).unwrap();
        let (watcher, mut updates) = ConfigWatcher::new(&file.0, current);
        let (events, event_rx) = mpsc::unbounded_channel();
        let _task = watcher
            .with_debounce(Duration::from_millis(50))
            .spawn_reload_loop(event_rx);

        // Touched without changes.
        events.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(updates.try_recv().is_err());

        file.write("[timeouts]\npublish_ms = 80\n");
        for _ in 0..3 {
            events.send(()).unwrap();
        }
        let next = tokio::time::timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.timeouts.publish_ms, 80);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(updates.try_recv().is_err(), "burst produced more than one reload");
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_edit_keeps_current_config() {
        let file = TempConfig::new("");
        let (watcher, mut updates) = ConfigWatcher::new(&file.0, ScenarioConfig::default());
        let (events, event_rx) = mpsc::unbounded_channel();
        let _task = watcher
            .with_debounce(Duration::from_millis(10))
            .spawn_reload_loop(event_rx);

        file.write("[timeouts]\npublish_ms = 0\n");
        events.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(updates.try_recv().is_err());

        file.write("[background]\nstart_delay_ms = 5\n");
        events.send(()).unwrap();
        let next = tokio::time::timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.background.start_delay_ms, 5);
    }
}
