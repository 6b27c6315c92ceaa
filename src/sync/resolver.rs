use crate::models::{Bookmark, RemoteBookmark};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Write this merged record over the local one.
    Apply(Bookmark),
    /// The local copy is at least as new; leave it alone.
    KeepLocal,
}

/// Last-write-wins on `date_modified`. Ties go to the local copy.
pub fn should_apply(remote: &RemoteBookmark, local: Option<&Bookmark>) -> bool {
    match local {
        None => true,
        Some(local) => remote.date_modified > local.date_modified,
    }
}

pub fn resolve(remote: &RemoteBookmark, local: Option<&Bookmark>) -> Resolution {
    if !should_apply(remote, local) {
        return Resolution::KeepLocal;
    }

    let mut merged = Bookmark::from_remote(remote);
    if let Some(local) = local {
        merged.last_read_at = local.last_read_at;
        merged.read_progress = local.read_progress;
        merged.reading_mode = local.reading_mode;

        // A read the server has not acknowledged yet outlives remote edits
        if local.needs_read_sync {
            merged.needs_read_sync = true;
            merged.unread = false;
        }
    }
    merged.needs_asset_sync = true;

    Resolution::Apply(merged)
}
