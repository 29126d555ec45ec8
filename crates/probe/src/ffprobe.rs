use crate::error::{ErrorKind, Result};
use crate::MediaProber;
use async_trait::async_trait;
use exn::ResultExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Width, height and duration of a video's primary stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProbe {
    pub width: u32,
    pub height: u32,
    pub duration_sec: f64,
}

/// The `ffprobe` executable.
///
/// One invocation per video: `-select_streams v:0` picks the primary video
/// stream, and a single `-of json` document carries dimensions plus both the
/// stream-level and container-level durations. Stream duration wins; some
/// containers (notably Matroska) report `"N/A"` at the stream level, in which
/// case the container duration is used instead.
pub struct Ffprobe {
    binary: PathBuf,
}

impl Ffprobe {
    /// Locate `ffprobe` on the `PATH`.
    pub fn discover() -> Result<Self> {
        match which::which("ffprobe") {
            Ok(binary) => {
                tracing::info!(binary = %binary.display(), "Discovered ffprobe");
                Ok(Self { binary })
            }
            Err(_) => {
                tracing::info!("ffprobe executable not found in PATH");
                exn::bail!(ErrorKind::ProbeNotFound);
            }
        }
    }

    /// Use an explicitly configured binary instead of searching the `PATH`.
    pub fn at(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl MediaProber for Ffprobe {
    async fn probe(&self, path: &Path) -> Result<VideoProbe> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,duration",
                "-show_entries",
                "format=duration,format_name",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .await
            .or_raise(|| ErrorKind::Io)?;
        let diagnostic = combined_text(&output.stdout, &output.stderr);
        if !output.status.success() {
            let diagnostic = if diagnostic.is_empty() {
                format!("ffprobe exited with {}", output.status)
            } else {
                diagnostic
            };
            exn::bail!(ErrorKind::ProbeFailed(diagnostic));
        }
        parse_output(&output.stdout, &diagnostic)
    }
}

/// Trimmed stdout and stderr joined into one diagnostic blob.
fn combined_text(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let mut text = String::with_capacity(stdout.len() + stderr.len() + 1);
    text.push_str(stdout.trim());
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim());
    }
    text
}

#[derive(Debug, Deserialize)]
struct ProbeDocument {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    width: i64,
    #[serde(default)]
    height: i64,
    /// ffprobe emits durations as JSON strings, not numbers.
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: String,
}

/// Parse an ffprobe JSON document into a [`VideoProbe`].
///
/// Every rejection carries `diagnostic` so the caller can log what ffprobe
/// actually said about the file.
fn parse_output(raw: &[u8], diagnostic: &str) -> Result<VideoProbe> {
    let doc: ProbeDocument =
        serde_json::from_slice(raw).or_raise(|| ErrorKind::ProbeFailed(diagnostic.to_owned()))?;
    let Some(stream) = doc.streams.first() else {
        exn::bail!(ErrorKind::ProbeFailed(diagnostic.to_owned()));
    };
    if stream.width <= 0 || stream.height <= 0 {
        exn::bail!(ErrorKind::ProbeFailed(diagnostic.to_owned()));
    }
    let duration_sec = [stream.duration.trim(), doc.format.duration.trim()]
        .into_iter()
        .find(|text| !text.is_empty() && *text != "N/A")
        .and_then(|text| text.parse::<f64>().ok());
    let Some(duration_sec) = duration_sec else {
        exn::bail!(ErrorKind::ProbeFailed(diagnostic.to_owned()));
    };
    Ok(VideoProbe { width: stream.width as u32, height: stream.height as u32, duration_sec })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn document(streams: &str, format: &str) -> String {
        format!(r#"{{"streams":[{streams}],"format":{{{format}}}}}"#)
    }

    #[test]
    fn test_parse_prefers_stream_duration_over_container() {
        let raw = document(
            r#"{"width":1920,"height":1080,"duration":"12.500000"}"#,
            r#""duration":"99.000000","format_name":"mov,mp4,m4a""#,
        );
        let probe = parse_output(raw.as_bytes(), &raw).unwrap();
        assert_eq!(probe, VideoProbe { width: 1920, height: 1080, duration_sec: 12.5 });
    }

    #[test]
    fn test_parse_falls_back_to_container_duration_on_not_available() {
        let raw = document(
            r#"{"width":1280,"height":720,"duration":"N/A"}"#,
            r#""duration":"42.000000","format_name":"matroska,webm""#,
        );
        let probe = parse_output(raw.as_bytes(), &raw).unwrap();
        assert_eq!(probe, VideoProbe { width: 1280, height: 720, duration_sec: 42.0 });
    }

    #[test]
    fn test_parse_falls_back_to_container_duration_when_stream_omits_it() {
        let raw = document(
            r#"{"width":640,"height":480}"#,
            r#""duration":"3.5","format_name":"avi""#,
        );
        let probe = parse_output(raw.as_bytes(), &raw).unwrap();
        assert_eq!(probe.duration_sec, 3.5);
    }

    #[rstest]
    #[case::no_streams(r#"{"streams":[],"format":{"duration":"10.0"}}"#)]
    #[case::zero_width(document(r#"{"width":0,"height":1080,"duration":"10.0"}"#, r#""duration":"10.0""#))]
    #[case::negative_height(document(r#"{"width":1920,"height":-1,"duration":"10.0"}"#, r#""duration":"10.0""#))]
    #[case::duration_missing_everywhere(document(r#"{"width":1920,"height":1080,"duration":"N/A"}"#, r#""duration":"N/A""#))]
    #[case::duration_unparsable(document(r#"{"width":1920,"height":1080,"duration":"abc"}"#, r#""duration":"N/A""#))]
    #[case::malformed_json("{\"streams\":[".to_string())]
    fn test_parse_rejects_unusable_output<S: AsRef<str>>(#[case] raw: S) {
        let raw = raw.as_ref();
        let err = parse_output(raw.as_bytes(), "some diagnostic").unwrap_err();
        assert!(matches!(&*err, ErrorKind::ProbeFailed(text) if text == "some diagnostic"));
    }

    #[test]
    fn test_parse_tolerates_audio_only_metadata_shape() {
        // An audio file still yields a format block but no video stream.
        let raw = r#"{"format":{"duration":"180.0","format_name":"mp3"}}"#;
        assert!(parse_output(raw.as_bytes(), raw).is_err());
    }

    #[test]
    fn test_combined_text_joins_and_trims() {
        assert_eq!(combined_text(b"  out \n", b"\nerr  "), "out\nerr");
        assert_eq!(combined_text(b"", b"stderr only"), "stderr only");
        assert_eq!(combined_text(b"stdout only", b"  "), "stdout only");
        assert_eq!(combined_text(b" ", b""), "");
    }

    #[test]
    fn test_explicit_binary_skips_discovery() {
        let prober = Ffprobe::at("/opt/ffmpeg/bin/ffprobe");
        assert_eq!(prober.binary, Path::new("/opt/ffmpeg/bin/ffprobe"));
    }
}
