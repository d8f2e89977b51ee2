use serde::{Deserialize, Serialize};
use std::path::Path;

/// One catalog entry. Records are written once during sync and only ever
/// removed whole; there is no update path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub comment: Option<String>,
    /// Kilobits per second.
    pub bitrate: Option<u32>,
    /// Seconds.
    pub duration: Option<f64>,
    pub filepath: String,
    pub filename: Option<String>,
}

impl MediaRecord {
    /// A record with only its identity and location filled in.
    pub fn bare(id: impl Into<String>, filepath: impl Into<String>) -> Self {
        let filepath = filepath.into();
        Self {
            id: id.into(),
            title: None,
            artist: None,
            album: None,
            genre: None,
            year: None,
            comment: None,
            bitrate: None,
            duration: None,
            filename: last_segment(&filepath),
            filepath,
        }
    }
}

/// Builds the catalog key for a file found under `root`. The join is a plain
/// string concatenation; no separator or case normalization happens here, so
/// the result compares equal only to paths built the same way.
pub fn library_filepath(root: &str, relpath: &str) -> String {
    format!("{}/{}", root, relpath)
}

/// Last `/`-separated segment of a path, or `None` when it is empty.
pub fn last_segment(path: &str) -> Option<String> {
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::{last_segment, library_filepath, relpath_from, MediaRecord};
    use std::path::Path;

    #[test]
    fn filepath_is_plain_join() {
        assert_eq!(library_filepath("/lib", "a.mp3"), "/lib/a.mp3");
        assert_eq!(library_filepath("/lib/", "x/a.mp3"), "/lib//x/a.mp3");
    }

    #[test]
    fn last_segment_of_nested_path() {
        assert_eq!(last_segment("Artist/Album/01.mp3").as_deref(), Some("01.mp3"));
        assert_eq!(last_segment("single.mp3").as_deref(), Some("single.mp3"));
        assert_eq!(last_segment("dir/"), None);
        assert_eq!(last_segment(""), None);
    }

    #[test]
    fn relpath_uses_forward_slashes() {
        let root = Path::new("/music");
        let file = Path::new("/music/Artist/Album/01.mp3");
        assert_eq!(
            relpath_from(root, file).as_deref(),
            Some("Artist/Album/01.mp3")
        );
        assert_eq!(relpath_from(root, Path::new("/elsewhere/a.mp3")), None);
        assert_eq!(relpath_from(root, root), None);
    }

    #[test]
    fn bare_record_derives_filename() {
        let record = MediaRecord::bare("id-1", "/lib/sub/song.mp3");
        assert_eq!(record.filename.as_deref(), Some("song.mp3"));
        assert!(record.title.is_none());
    }

    #[test]
    fn absent_fields_serialize_as_null() {
        let record = MediaRecord::bare("id-1", "/lib/a.mp3");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["year"].is_null());
        assert_eq!(json["filename"], "a.mp3");
    }
}
