//! Watches the catalog file for external replacement (spec §6 "The file is
//! replaceable at runtime") and invalidates the cached connection so the next
//! query reopens it. Mirrors the teacher's filesystem-watcher task, scoped down
//! to a single watched path instead of a recursive music-library tree.

use std::path::Path;
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::library::LibraryStore;

/// Starts a background watcher on `path`'s parent directory (the file itself
/// may not exist yet, or may be replaced via rename rather than in-place write)
/// and invalidates `library` on every create/modify/remove event.
pub fn start(library: Arc<LibraryStore>, path: impl AsRef<Path>) -> anyhow::Result<RecommendedWatcher> {
    let watch_dir = path
        .as_ref()
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| Path::new(".").to_path_buf());

    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;
    watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                tracing::info!("catalog file change detected, invalidating cached connection");
                library.invalidate();
            }
        }
    });

    Ok(watcher)
}
