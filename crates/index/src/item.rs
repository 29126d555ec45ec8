//! Scan generations and the items that flow through the pipeline.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::TagInfo;

/// Generation marker for mark-and-sweep.
///
/// Every scan draws a fresh id from the wall clock at nanosecond resolution
/// and stamps it on each directory and media entry it touches. Ids only need
/// to be monotonically distinguishable, not sequential: after a pipeline
/// drains, anything still carrying an older id is unreachable and gets swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScanId(i64);

impl ScanId {
    /// Virtual directories carry this marker and are never swept.
    pub const PINNED: ScanId = ScanId(i64::MAX);

    /// A fresh generation for a scan starting now.
    pub fn now() -> Self {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Self(nanos.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }
}

/// What a [`ScanItem`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Directory,
    /// Visible, but neither image nor video.
    File,
    Image,
    Video,
}

/// One unit of work flowing through the scan pipeline.
///
/// Discovery emits bare items (kind, path, name); later stages fill in the
/// payload fields they are responsible for. The same shape doubles as the
/// persisted snapshot record, which is what makes cache replay work: a stored
/// item re-enters the pipeline exactly like a freshly discovered one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanItem {
    pub kind: ItemKind,
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "crate::model::is_zero_u32")]
    pub width: u32,
    #[serde(default, skip_serializing_if = "crate::model::is_zero_u32")]
    pub height: u32,
    #[serde(default, skip_serializing_if = "crate::model::is_zero_f64")]
    pub duration_sec: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caption: String,
}

impl ScanItem {
    fn bare(kind: ItemKind, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            name: name.into(),
            width: 0,
            height: 0,
            duration_sec: 0.0,
            tags: Vec::new(),
            caption: String::new(),
        }
    }

    pub fn directory(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::bare(ItemKind::Directory, path, name)
    }

    pub fn file(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::bare(ItemKind::File, path, name)
    }

    pub fn image(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::bare(ItemKind::Image, path, name)
    }

    pub fn video(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::bare(ItemKind::Video, path, name)
    }

    /// True once a size probe (or a replayed snapshot) filled in dimensions.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Parent directory of a slash-separated relative path, `""` for top-level
/// entries.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a/b/c.jpg", "a/b")]
    #[case("a/c.jpg", "a")]
    #[case("c.jpg", "")]
    #[case("", "")]
    fn test_parent_dir(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(parent_dir(path), expected);
    }

    #[test]
    fn test_scan_id_ordering() {
        assert!(ScanId::from_nanos(1) < ScanId::from_nanos(2));
        assert!(ScanId::from_nanos(i64::MAX - 1) < ScanId::PINNED);
        assert_eq!(ScanId::default(), ScanId::from_nanos(0));
    }

    #[test]
    fn test_scan_item_serde_omits_empty_payload() {
        let item = ScanItem::directory("a/b", "b");
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"kind":"directory","path":"a/b","name":"b"}"#);

        let parsed: ScanItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_scan_item_serde_round_trips_payload() {
        let item = ScanItem {
            width: 1920,
            height: 1080,
            duration_sec: 12.5,
            tags: vec![TagInfo::new("sky", 90)],
            caption: "clouds over water".into(),
            ..ScanItem::video("a/clip.mp4", "clip.mp4")
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains(r#""kind":"video""#));
        assert!(json.contains(r#""duration_sec":12.5"#));

        let parsed: ScanItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, item);
        assert!(parsed.has_dimensions());
    }
}
