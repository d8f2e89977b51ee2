use std::collections::HashSet;
use std::io;
use std::path::Path;

use common::{library_filepath, relpath_from, MediaRecord};
use tracing::warn;
use walkdir::WalkDir;

/// Recursively lists files under `root` whose extension is one of
/// `extensions` (compared case-insensitively, without the dot). Paths come
/// back relative to `root` with `/` separators, in file-name order per
/// directory. Entries whose relative path is not valid UTF-8 are left out,
/// since a lossy name would not resolve back to the file.
pub fn list_audio_files(root: &Path, extensions: &[String]) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !has_extension(entry.path(), extensions) {
            continue;
        }
        let lossless = entry
            .path()
            .strip_prefix(root)
            .map(|rel| rel.to_str().is_some())
            .unwrap_or(false);
        if !lossless {
            warn!("Skipping non UTF-8 path {:?}", entry.path());
            continue;
        }
        if let Some(relpath) = relpath_from(root, entry.path()) {
            files.push(relpath);
        }
    }
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let ext = match path.extension() {
        Some(ext) => ext.to_string_lossy(),
        None => return false,
    };
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(&ext))
}

/// Files on disk with no catalog record. A file is known when
/// `root + "/" + relpath` equals some record's `filepath` exactly. Listing
/// order is kept.
pub fn diff<'a>(disk_files: &'a [String], catalog: &[MediaRecord], root: &str) -> Vec<&'a str> {
    let known: HashSet<&str> = catalog.iter().map(|record| record.filepath.as_str()).collect();
    disk_files
        .iter()
        .map(String::as_str)
        .filter(|relpath| !known.contains(library_filepath(root, relpath).as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{diff, list_audio_files};
    use common::MediaRecord;
    use std::fs;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lists_matching_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Artist/Album")).unwrap();
        fs::write(root.join("b.mp3"), b"x").unwrap();
        fs::write(root.join("a.mp3"), b"x").unwrap();
        fs::write(root.join("cover.jpg"), b"x").unwrap();
        fs::write(root.join("Artist/Album/01.MP3"), b"x").unwrap();
        fs::write(root.join("Artist/Album/02.flac"), b"x").unwrap();

        let files = list_audio_files(root, &exts(&["mp3"])).unwrap();
        assert_eq!(files, vec!["Artist/Album/01.MP3", "a.mp3", "b.mp3"]);

        let files = list_audio_files(root, &exts(&[".flac", "mp3"])).unwrap();
        assert_eq!(files.len(), 4);
        assert!(files.contains(&"Artist/Album/02.flac".to_string()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn skips_names_that_are_not_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("good.mp3"), b"x").unwrap();
        fs::write(root.join(OsStr::from_bytes(b"caf\xe9.mp3")), b"x").unwrap();

        let files = list_audio_files(root, &exts(&["mp3"])).unwrap();
        assert_eq!(files, vec!["good.mp3"]);
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_audio_files(&missing, &exts(&["mp3"])).is_err());
    }

    #[test]
    fn diff_keeps_unknown_files_in_listing_order() {
        let disk = exts(&["c.mp3", "a.mp3", "sub/b.mp3"]);
        let catalog = vec![MediaRecord::bare("1", "/lib/a.mp3")];
        assert_eq!(diff(&disk, &catalog, "/lib"), vec!["c.mp3", "sub/b.mp3"]);
    }

    #[test]
    fn diff_uses_exact_string_equality() {
        let disk = exts(&["A.mp3", "b.mp3"]);
        let catalog = vec![
            MediaRecord::bare("1", "/lib/a.mp3"),
            MediaRecord::bare("2", "/lib//b.mp3"),
        ];
        assert_eq!(diff(&disk, &catalog, "/lib"), vec!["A.mp3", "b.mp3"]);
        assert!(diff(&disk, &[], "/lib").len() == 2);
        assert!(diff(&[], &catalog, "/lib").is_empty());
    }
}
