//! In-memory snapshot images, keyed by tab.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::{DateTime, Utc};
use tabhost_common::{SnapshotRef, TabId};

/// A PNG-encoded still of a tab plus when it was taken.
#[derive(Debug, Clone)]
pub struct SnapshotImage {
    pub png: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    /// Synthesized because the real capture failed or timed out.
    pub placeholder: bool,
}

impl SnapshotImage {
    pub fn new(png: Vec<u8>, placeholder: bool) -> Self {
        Self {
            png,
            captured_at: Utc::now(),
            placeholder,
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", B64.encode(&self.png))
    }

    /// The UI-facing reference to this image.
    pub fn to_ref(&self) -> SnapshotRef {
        SnapshotRef {
            captured_at: self.captured_at,
            placeholder: self.placeholder,
            data_uri: self.data_uri(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    images: HashMap<TabId, SnapshotImage>,
}

impl SnapshotStore {
    pub fn insert(&mut self, tab_id: TabId, image: SnapshotImage) -> Option<SnapshotImage> {
        self.images.insert(tab_id, image)
    }

    pub fn get(&self, tab_id: &TabId) -> Option<&SnapshotImage> {
        self.images.get(tab_id)
    }

    pub fn remove(&mut self, tab_id: &TabId) -> Option<SnapshotImage> {
        self.images.remove(tab_id)
    }

    pub fn contains(&self, tab_id: &TabId) -> bool {
        self.images.contains_key(tab_id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Encoded bytes held across all images.
    pub fn total_bytes(&self) -> usize {
        self.images.values().map(|i| i.png.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_is_base64_png() {
        let image = SnapshotImage::new(vec![0x89, b'P', b'N', b'G'], false);
        assert_eq!(image.data_uri(), "data:image/png;base64,iVBORw==");

        let r = image.to_ref();
        assert!(!r.placeholder);
        assert_eq!(r.captured_at, image.captured_at);
    }

    #[test]
    fn store_tracks_images_per_tab() {
        let mut store = SnapshotStore::default();
        let a = TabId::from("a");
        assert!(store.is_empty());

        store.insert(a.clone(), SnapshotImage::new(vec![1, 2, 3], true));
        assert!(store.contains(&a));
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 3);
        assert!(store.get(&a).unwrap().placeholder);

        assert!(store.remove(&a).is_some());
        assert!(store.remove(&a).is_none());
    }
}
