//! Gallery-facing data models.
//!
//! Everything here serializes with "omit empty" semantics so API payloads and
//! the persisted snapshot stay small: zero dimensions, empty tag lists and
//! empty captions simply disappear from the output.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::item::ScanId;

pub(crate) fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

pub(crate) fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

/// Pixel dimensions of an image or a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub width: u32,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A size that was never probed (or failed to probe).
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// A tag with the confidence the tagger assigned to it.
///
/// Stored raw; visibility filtering happens when tags are aggregated or
/// displayed, never when they are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    pub tag: String,
    pub value: u32,
}

impl TagInfo {
    pub fn new(tag: impl Into<String>, value: u32) -> Self {
        Self { tag: tag.into(), value }
    }
}

/// Aggregated statistics for one tag across a set of images.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagStat {
    pub tag: String,
    pub count: usize,
    #[serde(skip)]
    pub total_score: u64,
    #[serde(rename = "avgScore")]
    pub avg_score: f64,
    pub weight: f64,
}

/// Aggregate tag statistics over a set of images, keeping only tags the
/// `visible` policy admits.
///
/// Weight is `count * average confidence`; the result is sorted by descending
/// weight with the tag name as tiebreaker so output is stable.
pub fn tag_stats<'a, I, F>(images: I, visible: F) -> Vec<TagStat>
where
    I: IntoIterator<Item = &'a ImageEntry>,
    F: Fn(&TagInfo) -> bool,
{
    let mut by_name: HashMap<&str, (usize, u64)> = HashMap::new();
    for image in images {
        for tag in &image.tags {
            if !visible(tag) {
                continue;
            }
            let entry = by_name.entry(tag.tag.as_str()).or_default();
            entry.0 += 1;
            entry.1 += u64::from(tag.value);
        }
    }

    let mut stats: Vec<TagStat> = by_name
        .into_iter()
        .map(|(tag, (count, total))| {
            let avg_score = total as f64 / count as f64;
            TagStat {
                tag: tag.to_owned(),
                count,
                total_score: total,
                avg_score,
                weight: count as f64 * avg_score,
            }
        })
        .collect();
    stats.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.tag.cmp(&b.tag))
    });
    stats
}

/// An image file in the tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip)]
    pub marker: ScanId,
    #[serde(flatten)]
    pub size: Size,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caption: String,
}

/// A video file in the tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip)]
    pub marker: ScanId,
    #[serde(flatten)]
    pub size: Size,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub duration_sec: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caption: String,
}

/// A visible file that is neither image nor video.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// A child directory as presented in listings: name, path and its cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirSummary {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<ImageEntry>,
}

/// The immediate contents of one directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<DirSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<VideoEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub others: Vec<FileEntry>,
}

/// A randomly picked image together with the directory it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickedImage {
    #[serde(flatten)]
    pub image: ImageEntry,
    pub parent: String,
}
