//! Watcher thread: notify + debounce, send changed paths to the async loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecursiveMode, Watcher};

use crate::error::{AssistError, Result};

/// Paths whose last event is at least `debounce` old at `now`, removed from `pending`.
pub(crate) fn drain_settled(
    pending: &mut HashMap<PathBuf, Instant>,
    now: Instant,
    debounce: Duration,
) -> Vec<PathBuf> {
    let mut ready: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, t)| now.duration_since(**t) >= debounce)
        .map(|(p, _)| p.clone())
        .collect();
    for p in &ready {
        pending.remove(p);
    }
    ready.sort();
    ready
}

/// Watch `root` and send debounced absolute paths over `tx`.
///
/// Exits when `tx`'s receiver is dropped or the watcher fails.
pub fn run_watcher_thread(root: &Path, debounce_ms: u64, tx: mpsc::Sender<PathBuf>) -> Result<()> {
    let debounce = Duration::from_millis(debounce_ms);
    let (event_tx, event_rx) = mpsc::channel::<Vec<PathBuf>>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(ev) = res {
            let _ = event_tx.send(ev.paths);
        }
    })
    .map_err(|e| AssistError::Config(e.to_string()))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| AssistError::Config(e.to_string()))?;
    log::info!("Watching {} (debounce {:?})", root.display(), debounce);

    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        match event_rx.recv_timeout(debounce) {
            Ok(paths) => {
                let now = Instant::now();
                for p in paths {
                    pending.insert(p, now);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                for p in drain_settled(&mut pending, Instant::now(), debounce) {
                    if tx.send(p).is_err() {
                        return Ok(());
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_settled_keeps_recent_events() {
        let debounce = Duration::from_millis(500);
        let now = Instant::now();
        let mut pending = HashMap::new();
        pending.insert(PathBuf::from("/c/old.md"), now);
        pending.insert(PathBuf::from("/c/new.md"), now + Duration::from_millis(400));

        let ready = drain_settled(&mut pending, now + Duration::from_millis(600), debounce);

        assert_eq!(ready, vec![PathBuf::from("/c/old.md")]);
        assert_eq!(pending.len(), 1);
        assert!(pending.contains_key(Path::new("/c/new.md")));
    }
}
