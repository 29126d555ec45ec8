//! Media-type classification by file name.
//!
//! Classification is purely name-based: the scan pipeline decides how to
//! treat a directory entry before ever opening it. Content sniffing happens
//! later (and only for files that classify as pictures).

/// What a directory entry is, as far as the indexer cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Picture,
    Video,
    Other,
}

const PIC_EXTS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];
const VIDEO_EXTS: &[&str] = &["mp4", "avi", "mkv", "webm", "flv", "wmv", "ts", "mov", "m4v", "ogv", "ogg"];

/// Classify a file name into picture/video/other.
pub fn classify(name: &str) -> MediaKind {
    if is_picture(name) {
        MediaKind::Picture
    } else if is_video(name) {
        MediaKind::Video
    } else {
        MediaKind::Other
    }
}

/// True for picture extensions, except derived thumbnails ("thumb" anywhere
/// in the name marks generated files from an earlier life of the library).
pub fn is_picture(name: &str) -> bool {
    PIC_EXTS.contains(&ext(name).as_str()) && !name.contains("thumb")
}

/// True for recognized video container extensions.
pub fn is_video(name: &str) -> bool {
    VIDEO_EXTS.contains(&ext(name).as_str())
}

/// Files the scanner should look at in the first place. Hidden files,
/// editor backups and synology-style `@eaDir` metadata are all skipped by
/// their leading character.
pub fn is_visible(name: &str) -> bool {
    !matches!(name.as_bytes().first(), None | Some(b'.') | Some(b'@') | Some(b'~'))
}

// Last dot-separated segment, lowercased; the whole name when there is no dot.
fn ext(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picture_extensions() {
        assert!(is_picture("beach.jpg"));
        assert!(is_picture("beach.JPEG"));
        assert!(is_picture("scan.png"));
        assert!(is_picture("old.bmp"));
        assert!(is_picture("loop.gif"));
        assert!(!is_picture("clip.mp4"));
        assert!(!is_picture("notes.txt"));
        // Extension of a dotless name is the name itself
        assert!(is_picture("jpg"));
    }

    #[test]
    fn test_thumbnails_rejected() {
        assert!(!is_picture("beach.thumb.jpg"));
        assert!(!is_picture("thumbnail.png"));
    }

    #[test]
    fn test_video_extensions() {
        for name in ["a.mp4", "b.MKV", "c.webm", "d.mov", "e.ts", "f.ogv"] {
            assert!(is_video(name), "{name} should be a video");
        }
        assert!(!is_video("beach.jpg"));
        assert!(!is_video("notes.txt"));
    }

    #[test]
    fn test_visibility() {
        assert!(is_visible("beach.jpg"));
        assert!(is_visible("some dir"));
        assert!(!is_visible(".hidden"));
        assert!(!is_visible("~lock.mp4"));
        assert!(!is_visible("@eaDir"));
        assert!(!is_visible(""));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("beach.jpg"), MediaKind::Picture);
        assert_eq!(classify("clip.mp4"), MediaKind::Video);
        assert_eq!(classify("notes.txt"), MediaKind::Other);
        // Thumbnail names fall through to Other, not Picture
        assert_eq!(classify("beach.thumb.jpg"), MediaKind::Other);
    }
}
