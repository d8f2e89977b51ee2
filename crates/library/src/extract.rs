use std::path::Path;

use common::{last_segment, MediaRecord};
use metadata::{bitrate_kbps, parse_year, MetadataReader, TagInfo};
use tracing::warn;
use uuid::Uuid;

use crate::LibraryError;

/// Reads one file into a fresh catalog record with a new id.
///
/// The format read must succeed; its failure is a `Parse` error for the whole
/// file. A failed tag read only leaves the tag fields empty.
pub fn extract_record<M: MetadataReader>(
    reader: &M,
    filepath: &str,
) -> Result<MediaRecord, LibraryError> {
    let path = Path::new(filepath);
    let format = reader.read_format(path).map_err(|source| LibraryError::Parse {
        path: filepath.to_string(),
        source,
    })?;
    let tags = match reader.read_tags(path) {
        Ok(tags) => tags,
        Err(err) => {
            warn!("Failed to read tags for {:?}: {}", filepath, err);
            TagInfo::default()
        }
    };

    Ok(MediaRecord {
        id: Uuid::new_v4().to_string(),
        title: tags.title,
        artist: tags.artist,
        album: tags.album,
        genre: tags.genre,
        year: tags.year.as_deref().and_then(parse_year),
        comment: tags.comment,
        bitrate: bitrate_kbps(format.bitrate),
        duration: format.duration,
        filepath: filepath.to_string(),
        filename: last_segment(filepath),
    })
}
