/// Video detection from the current page address
///
/// Runs inside the page context (see `router::PageContext`), which is the only
/// place the live page address is observable.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use url::Url;

/// Length of a platform video identifier
pub const VIDEO_ID_LEN: usize = 11;

/// Query key carrying the identifier on watch pages
const WATCH_QUERY_KEY: &str = "v";

/// Path segment preceding the identifier on short-form pages
const SHORTS_SEGMENT: &str = "shorts";

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static pattern is valid"))
}

/// A resolved, validated video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoReference {
    id: String,
}

impl VideoReference {
    /// Validate a raw identifier against the platform grammar
    pub fn parse(raw: &str) -> Option<Self> {
        if video_id_pattern().is_match(raw) {
            Some(Self { id: raw.to_string() })
        } else {
            None
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Canonical watch page for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }

    /// Medium quality thumbnail shown next to the results
    pub fn thumbnail_url(&self) -> String {
        format!("https://img.youtube.com/vi/{}/mqdefault.jpg", self.id)
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl TryFrom<String> for VideoReference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid video id: {:?}", value))
    }
}

impl From<VideoReference> for String {
    fn from(reference: VideoReference) -> Self {
        reference.id
    }
}

/// Extract the video identifier from a page address.
///
/// Recognizes `.../watch?v=<id>` and `.../shorts/<id>`. Every other shape,
/// and every address that fails to parse, yields `None`.
pub fn locate_video(address: &str) -> Option<VideoReference> {
    let url = Url::parse(address.trim()).ok()?;

    from_watch_query(&url).or_else(|| from_shorts_path(&url))
}

fn from_watch_query(url: &Url) -> Option<VideoReference> {
    let is_watch_page = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map_or(false, |last| last == "watch");
    if !is_watch_page {
        return None;
    }

    url.query_pairs()
        .find(|(key, _)| key == WATCH_QUERY_KEY)
        .and_then(|(_, value)| VideoReference::parse(&value))
}

fn from_shorts_path(url: &Url) -> Option<VideoReference> {
    let mut segments = url.path_segments()?;
    segments.find(|segment| *segment == SHORTS_SEGMENT)?;
    segments.next().and_then(VideoReference::parse)
}
