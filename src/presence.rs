use tracing::info;

use crate::domain::Collection;
use crate::store::Store;

/// Collections whose destination directory does not exist yet, in
/// declaration order.
pub fn missing(store: &Store) -> Vec<Collection> {
    Collection::all()
        .filter(|collection| !store.exists(&store.collection_dir(*collection)))
        .collect()
}

/// Returns true when every dataset and run directory is already in place.
/// Logs one line per missing entry.
pub fn check_downloaded(store: &Store) -> bool {
    let missing = missing(store);
    for collection in &missing {
        info!("Missing {}: {}", collection.kind(), collection.name());
    }
    missing.is_empty()
}
