//! Hot reload of the `surface` section
//!
//! Only policy, blink period and polarity can change on a live surface. The
//! watcher keeps the last applied config, diffs every reload against it and
//! forwards a [`SurfaceConfig`] only when one of those changed. Port and note
//! channel edits are reported and wait for a restart.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{AppConfig, SurfaceConfig};

/// Editors often write a file in several steps
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Record `next` as the applied config and return the surface settings to
/// push, if any live setting changed.
pub fn surface_update(applied: &mut AppConfig, next: AppConfig) -> Option<SurfaceConfig> {
    if applied.midi != next.midi {
        warn!(
            "MIDI ports changed ({} / {} -> {} / {}), restart to reconnect",
            applied.midi.input_port,
            applied.midi.output_port,
            next.midi.input_port,
            next.midi.output_port
        );
    }
    if applied.surface.note_channel != next.surface.note_channel {
        warn!(
            "note_channel changed ({} -> {}), restart to apply",
            applied.surface.note_channel, next.surface.note_channel
        );
    }

    let live_changed = applied.surface.policy != next.surface.policy
        || applied.surface.blink_period_ms != next.surface.blink_period_ms
        || applied.surface.polarity != next.surface.polarity;

    *applied = next;
    live_changed.then(|| applied.surface.clone())
}

async fn reload(path: String, applied: Arc<Mutex<AppConfig>>, tx: mpsc::Sender<SurfaceConfig>) {
    tokio::time::sleep(RELOAD_DEBOUNCE).await;

    let next = match AppConfig::load(&path).await {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to reload config (keeping old config): {:#}", e);
            return;
        }
    };

    let update = surface_update(&mut applied.lock(), next);
    match update {
        Some(surface) => {
            info!(
                "Surface settings reloaded (policy: {}, blink: {} ms, polarity: {:?})",
                surface.policy, surface.blink_period_ms, surface.polarity
            );
            if tx.send(surface).await.is_err() {
                debug!("Surface update dropped, receiver gone");
            }
        }
        None => debug!("Config reloaded, no live surface changes"),
    }
}

/// Watches the config file and yields surface setting changes
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<SurfaceConfig>,
}

impl ConfigWatcher {
    /// Load the config and start watching it
    pub async fn new(config_path: String) -> Result<(Self, AppConfig)> {
        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        let (tx, rx) = mpsc::channel(10);
        let applied = Arc::new(Mutex::new(initial_config.clone()));
        let path = config_path.clone();

        // notify calls back on its own thread
        let runtime = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) if matches!(event.kind, EventKind::Modify(_)) => {
                    debug!("Config file modified: {:?}", event.paths);
                    runtime.spawn(reload(path.clone(), applied.clone(), tx.clone()));
                }
                Ok(_) => {}
                Err(e) => error!("Watch error: {}", e),
            }
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        info!("Watching {} for surface changes", config_path);

        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            initial_config,
        ))
    }

    /// Next live surface change. None once the watcher is gone.
    pub async fn next_surface(&mut self) -> Option<SurfaceConfig> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::InputPolicy;
    use crate::ohm64::sysex::Polarity;
    use std::fs;
    use tempfile::TempDir;

    fn config(yaml: &str) -> AppConfig {
        AppConfig::parse(yaml).unwrap()
    }

    const PORTS: &str = "midi:\n  input_port: Ohm64\n  output_port: Ohm64\n";

    #[test]
    fn test_live_change_is_forwarded() {
        let mut applied = config(PORTS);
        let next = config(&format!("{PORTS}surface:\n  policy: blink\n  polarity: inverted\n"));

        let update = surface_update(&mut applied, next).unwrap();
        assert_eq!(update.policy, InputPolicy::Blink);
        assert_eq!(update.polarity, Polarity::Inverted);
        assert_eq!(applied.surface, update);
    }

    #[test]
    fn test_identical_reload_is_swallowed() {
        let mut applied = config(&format!("{PORTS}surface:\n  blink_period_ms: 250\n"));
        let next = applied.clone();
        assert_eq!(surface_update(&mut applied, next), None);
    }

    #[test]
    fn test_restart_only_changes_are_not_forwarded() {
        let mut applied = config(PORTS);
        let next = config(
            "midi:\n  input_port: Other\n  output_port: Other\nsurface:\n  note_channel: 4\n  sync_on_connect: false\n",
        );

        assert_eq!(surface_update(&mut applied.clone(), next.clone()), None);

        // still recorded, so the next diff starts from the new file
        surface_update(&mut applied, next);
        assert_eq!(applied.midi.input_port, "Other");
        assert_eq!(applied.surface.note_channel, 4);
    }

    #[tokio::test]
    async fn test_config_watcher_reloads_policy() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("ohm64.yaml");
        fs::write(&config_path, PORTS)?;

        let (mut watcher, config) =
            ConfigWatcher::new(config_path.to_string_lossy().to_string()).await?;
        assert_eq!(config.surface.policy, InputPolicy::Toggle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, format!("{PORTS}surface:\n  policy: blink\n"))?;

        let update = tokio::time::timeout(Duration::from_secs(2), watcher.next_surface())
            .await?
            .expect("watcher closed before reporting the change");
        assert_eq!(update.policy, InputPolicy::Blink);

        Ok(())
    }
}
