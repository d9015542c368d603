use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::store::TokenStore;

use super::registry::ChannelRegistry;

/**
    Background watcher that hot-swaps the registry when the token store
    file changes on disk.

    Extraction runs out-of-band (possibly in another process), so the
    file's modification time is the only signal available. Polls on a
    fixed interval; a missed tick just pushes the next check back.
*/
pub async fn run_reload_watcher(
    registry: Arc<ChannelRegistry>,
    store: Arc<TokenStore>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut last_seen = store.last_modified();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
                continue;
            }
        }

        let modified = store.last_modified();
        if modified.is_some() && modified != last_seen {
            println!("[watcher] Token store updated, reloading channels...");
            let snapshot = registry.rebuild(&store);
            println!(
                "[watcher] Registry now at generation {} ({} channels)",
                snapshot.generation,
                snapshot.len()
            );
            last_seen = modified;
        }
    }
}
