//! Timestamped lyric parsing and position lookup
//!
//! Lyric text arrives as plain lines of the form `[MM:SS]text` (one or two
//! digit minutes, two-digit seconds). A line may carry several tags; each
//! produces an entry sharing the line's text. The parsed timeline is sorted
//! ascending by timestamp and immutable: it is rebuilt from raw text on
//! every track load, never patched in place.
//!
//! Lookup is a pure function of the sorted entries and a position, with no
//! cursor: seeking backward or forward both resolve correctly by
//! re-evaluation.

use serde::Serialize;

/// One lyric entry: a timestamp in seconds and its display text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LyricLine {
    pub timestamp: f64,
    pub text: String,
}

/// Time-sorted lyric entries for one track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricTimeline {
    lines: Vec<LyricLine>,
}

impl LyricTimeline {
    /// An empty timeline (track without synced lyrics)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse raw lyric text into a sorted timeline
    ///
    /// Blank lines and lines without any valid tag are dropped. Entries with
    /// equal timestamps keep their source order (stable sort).
    pub fn parse(raw: &str) -> Self {
        let mut lines = Vec::new();

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (timestamps, text) = extract_tags(line);
            for timestamp in timestamps {
                lines.push(LyricLine {
                    timestamp,
                    text: text.clone(),
                });
            }
        }

        lines.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self { lines }
    }

    /// Index of the last entry whose timestamp is <= `position_seconds`
    ///
    /// `None` when the position precedes the first entry or the timeline is
    /// empty. On tied timestamps the last of the tied entries wins.
    pub fn current_line(&self, position_seconds: f64) -> Option<usize> {
        let count = self
            .lines
            .partition_point(|line| line.timestamp <= position_seconds);
        count.checked_sub(1)
    }

    pub fn get(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Collect every `[MM:SS]` tag in `line`; the remaining text (tags stripped,
/// trimmed) is shared by all of them
fn extract_tags(line: &str) -> (Vec<f64>, String) {
    let mut timestamps = Vec::new();
    let mut text = String::new();
    let mut rest = line;

    while !rest.is_empty() {
        if let Some(after_open) = rest.strip_prefix('[') {
            if let Some((consumed, seconds)) = parse_tag(after_open) {
                timestamps.push(seconds);
                rest = &after_open[consumed..];
                continue;
            }
        }
        let ch = rest.chars().next().expect("non-empty remainder");
        text.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    (timestamps, text.trim().to_string())
}

/// Parse `MM:SS]` at the start of `rest`, returning (bytes consumed, seconds)
fn parse_tag(rest: &str) -> Option<(usize, f64)> {
    let close = rest.find(']')?;
    let body = &rest[..close];
    let (minutes, seconds) = body.split_once(':')?;

    if minutes.is_empty() || minutes.len() > 2 || seconds.len() != 2 {
        return None;
    }
    if !minutes.bytes().all(|b| b.is_ascii_digit())
        || !seconds.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let m: u32 = minutes.parse().ok()?;
    let s: u32 = seconds.parse().ok()?;
    Some((close + 1, f64::from(m * 60 + s)))
}

// ========================================
// Tests
// ========================================
