mod asset;
mod bookmark;
mod sync_state;

pub use asset::{Asset, AssetStatus, RemoteAsset};
pub use bookmark::{Bookmark, ReadingMode, RemoteBookmark};
pub use sync_state::{Collection, CollectionProgress, PassMode, PassState, SyncMeta, SyncState};
