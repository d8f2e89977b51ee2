use std::path::Path;

use lofty::error::LoftyError;
use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};

/// Technical parameters of an audio file as the container reports them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FormatInfo {
    /// Bits per second.
    pub bitrate: Option<u32>,
    /// Seconds.
    pub duration: Option<f64>,
}

/// Raw tag text. `year` is kept as written; see [`parse_year`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Source of format and tag data for a single file. Format and tags are read
/// separately so a broken tag block can be told apart from an unreadable file.
pub trait MetadataReader {
    fn read_format(&self, path: &Path) -> Result<FormatInfo, MetadataError>;
    fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError>;
}

impl<T: MetadataReader + ?Sized> MetadataReader for &T {
    fn read_format(&self, path: &Path) -> Result<FormatInfo, MetadataError> {
        (**self).read_format(path)
    }

    fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError> {
        (**self).read_tags(path)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyReader;

impl MetadataReader for LoftyReader {
    fn read_format(&self, path: &Path) -> Result<FormatInfo, MetadataError> {
        let tagged_file = lofty::read_from_path(path)?;
        let properties = tagged_file.properties();

        let duration = properties.duration();
        let duration = if duration.is_zero() {
            None
        } else {
            Some(duration.as_secs_f64())
        };
        // lofty reports kbps
        let bitrate = properties
            .audio_bitrate()
            .or(properties.overall_bitrate())
            .map(|kbps| kbps.saturating_mul(1000));

        Ok(FormatInfo { bitrate, duration })
    }

    fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError> {
        let tagged_file = lofty::read_from_path(path)?;
        let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            Some(tag) => tag,
            None => return Ok(TagInfo::default()),
        };

        let text = |key: &ItemKey| tag.get_string(key).map(|v| v.to_string());
        Ok(TagInfo {
            title: text(&ItemKey::TrackTitle),
            artist: text(&ItemKey::TrackArtist),
            album: text(&ItemKey::AlbumTitle),
            genre: text(&ItemKey::Genre),
            year: text(&ItemKey::Year).or_else(|| text(&ItemKey::RecordingDate)),
            comment: text(&ItemKey::Comment),
        })
    }
}

/// Converts bits per second to kilobits per second, rounding half up.
pub fn bitrate_kbps(bits_per_second: Option<u32>) -> Option<u32> {
    bits_per_second.map(|bps| ((u64::from(bps) + 500) / 1000) as u32)
}

/// Reads the leading base-10 integer of a year tag: leading whitespace and a
/// sign are accepted, parsing stops at the first non-digit. `"2019-05-01"`
/// gives 2019; text with no leading digits gives `None`.
pub fn parse_year(text: &str) -> Option<i32> {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    let value: i32 = rest[..digits_len].parse().ok()?;
    Some(if negative { -value } else { value })
}
