#![forbid(unsafe_code)]

//! Where the sprite attaches.

use webuddy_core::WebuddyConfig;

/// The preview container, looked up only when the document turns preview
/// mode on. Anything else attaches to the page body, so a stale
/// `previewElement` left in a live config never narrows the bounds.
pub fn preview_container<T>(config: &WebuddyConfig, lookup: impl FnOnce() -> Option<T>) -> Option<T> {
    if config.preview_mode == Some(true) {
        lookup()
    } else {
        None
    }
}
