//! Tag scan of a local music directory.
//!
//! Walks the directory, reads tags with lofty and groups files into an
//! artist → album → track tree. Files without an artist tag are skipped.
//! The resulting tree carries no native keys, so identity hashes are the
//! only matching criterion for rows it produces.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::ItemKey;
use lofty::tag::Accessor;
use stave_core::model::naming::{parse_release_date, release_date_from_year};
use walkdir::WalkDir;

use crate::error::{SyncError, SyncResult};
use crate::source::{NodeFields, TreeSource};

/// Album name used for files without an album tag.
pub const UNKNOWN_ALBUM: &str = "[Unknown Album]";

const SOURCE_NAME: &str = "local";

/// One audio file after tag extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub date: Option<String>,
    pub genres: Vec<String>,
    pub track_num: Option<u32>,
    pub disc_num: Option<u32>,
    pub duration_ms: Option<i64>,
    pub bitrate: Option<u32>,
    pub size: Option<u64>,
}

impl ScannedFile {
    fn title_or_stem(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    fn format(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

#[derive(Debug, Default)]
struct AlbumGroup {
    release_date: Option<NaiveDate>,
    genres: BTreeSet<String>,
    files: Vec<ScannedFile>,
}

fn is_audio_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        matches!(
            ext.to_string_lossy().to_lowercase().as_ref(),
            "flac" | "mp3" | "ogg" | "oga" | "opus" | "wav" | "m4a" | "aac" | "aiff"
        )
    })
}

fn non_empty(value: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_file(path: &Path) -> Result<ScannedFile, lofty::error::LoftyError> {
    let tagged_file = lofty::read_from_path(path)?;
    let properties = tagged_file.properties();

    let mut scanned = ScannedFile {
        path: path.to_path_buf(),
        duration_ms: i64::try_from(properties.duration().as_millis()).ok(),
        bitrate: properties.audio_bitrate(),
        ..ScannedFile::default()
    };

    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Ok(scanned);
    };

    scanned.title = non_empty(tag.title());
    scanned.artist = non_empty(tag.artist());
    scanned.album = non_empty(tag.album());
    scanned.track_num = tag.track();
    scanned.disc_num = tag.disk();
    scanned.date = tag
        .get_string(&ItemKey::RecordingDate)
        .map(str::to_string)
        .or_else(|| tag.year().map(|y| y.to_string()));
    scanned.genres = tag
        .genre()
        .map(|g| {
            g.split(';')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(scanned)
}

fn release_date(raw: &str) -> Option<NaiveDate> {
    match raw.trim().parse::<i32>() {
        Ok(year) => release_date_from_year(year),
        Err(_) => parse_release_date(raw),
    }
}

/// Group scanned files into a tree. Exposed separately from the directory
/// walk so grouping rules can be exercised without audio fixtures.
#[must_use]
pub fn build_tree(files: Vec<ScannedFile>) -> TreeSource {
    let mut library: BTreeMap<String, BTreeMap<String, AlbumGroup>> = BTreeMap::new();
    let mut skipped = 0usize;

    for file in files {
        let Some(artist) = file.artist.clone() else {
            log::debug!("No artist tag, skipping {}", file.path.display());
            skipped += 1;
            continue;
        };
        let album = file.album.clone().unwrap_or_else(|| UNKNOWN_ALBUM.to_string());

        let group = library.entry(artist).or_default().entry(album).or_default();
        // The first file seen decides the album date.
        if group.files.is_empty() {
            group.release_date = file.date.as_deref().and_then(release_date);
        }
        group.genres.extend(file.genres.iter().cloned());
        group.files.push(file);
    }

    if skipped > 0 {
        log::info!("Skipped {skipped} files without an artist tag");
    }

    let tree = TreeSource::new(SOURCE_NAME);
    for (artist_name, albums) in library {
        let artist = tree.add_artist(NodeFields::named(&artist_name), None);
        for (album_name, mut group) in albums {
            let mut fields = NodeFields::named(&album_name);
            fields.release_date = group.release_date;
            fields.genres = group.genres.into_iter().collect();

            // add_child only fails for unknown or track parents.
            let Ok(album) = tree.add_child(&artist, fields, None) else {
                continue;
            };

            group.files.sort_by(|a, b| {
                (a.disc_num.unwrap_or(1), a.track_num.unwrap_or(1), &a.path).cmp(&(
                    b.disc_num.unwrap_or(1),
                    b.track_num.unwrap_or(1),
                    &b.path,
                ))
            });
            for file in group.files {
                let mut fields = NodeFields::named(file.title_or_stem())
                    .with_storage_path(file.path.to_string_lossy());
                fields.track_num = Some(file.track_num.unwrap_or(1));
                fields.disc_num = Some(file.disc_num.unwrap_or(1));
                fields.duration_ms = file.duration_ms;
                fields.bitrate = file.bitrate;
                fields.size = file.size;
                fields.format = file.format();
                if tree.add_child(&album, fields, None).is_err() {
                    log::warn!("Could not place {} in the tree", file.path.display());
                }
            }
        }
    }
    tree
}

/// Scan `dir` recursively and return its catalog as a tree source.
///
/// # Errors
///
/// Returns [`SyncError::AdapterUnavailable`] if `dir` is not a directory.
/// Unreadable files are logged and skipped.
pub fn scan_library(dir: &Path) -> SyncResult<TreeSource> {
    if !dir.is_dir() {
        return Err(SyncError::AdapterUnavailable {
            source_name: SOURCE_NAME.to_string(),
            message: format!("{} is not a directory", dir.display()),
        });
    }
    log::info!("Scanning {}", dir.display());

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_audio_file(path) {
            continue;
        }

        log::debug!("Reading tags: {}", path.display());
        let mut scanned = match read_file(path) {
            Ok(scanned) => scanned,
            Err(e) => {
                log::warn!("Failed to read tags from {}: {}", path.display(), e);
                continue;
            }
        };
        scanned.size = entry.metadata().ok().map(|m| m.len());
        files.push(scanned);
    }

    log::info!("Scan found {} audio files", files.len());
    Ok(build_tree(files))
}
