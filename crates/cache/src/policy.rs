//! Read-time tag visibility.

use std::collections::HashSet;

use glimpse_index::TagInfo;

/// Minimum confidence for a tag to surface in aggregated or displayed output.
pub const TAG_MIN_VALUE: u32 = 60;

/// Threshold-plus-blacklist filter for tag output.
///
/// The persisted cache and the in-memory tree both keep the tagger's raw
/// output; this policy applies only where tags are aggregated or displayed.
#[derive(Debug, Clone, Default)]
pub struct TagPolicy {
    blacklist: HashSet<String>,
}

impl TagPolicy {
    pub fn new(blacklist: impl IntoIterator<Item = String>) -> Self {
        Self { blacklist: blacklist.into_iter().collect() }
    }

    pub fn is_visible(&self, tag: &TagInfo) -> bool {
        tag.value >= TAG_MIN_VALUE && !self.blacklist.contains(&tag.tag)
    }

    /// The subset of `tags` this policy admits.
    pub fn filter(&self, tags: &[TagInfo]) -> Vec<TagInfo> {
        tags.iter().filter(|tag| self.is_visible(tag)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(60, "sky", true)]
    #[case(59, "sky", false)]
    #[case(100, "watermark", false)]
    #[case(0, "anything", false)]
    fn test_is_visible(#[case] value: u32, #[case] name: &str, #[case] expected: bool) {
        let policy = TagPolicy::new(["watermark".to_owned()]);
        assert_eq!(policy.is_visible(&TagInfo::new(name, value)), expected);
    }

    #[test]
    fn test_filter_keeps_order() {
        let policy = TagPolicy::new([]);
        let tags = vec![
            TagInfo::new("b", 90),
            TagInfo::new("a", 10),
            TagInfo::new("c", 70),
        ];
        let visible = policy.filter(&tags);
        assert_eq!(visible, vec![TagInfo::new("b", 90), TagInfo::new("c", 70)]);
    }
}
