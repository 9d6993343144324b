/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Artists (catalog root)
CREATE TABLE IF NOT EXISTS artists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    sort_name TEXT,
    album_count INTEGER NOT NULL DEFAULT 0,
    native_id INTEGER UNIQUE,
    native_thumb INTEGER,
    hash INTEGER NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_artists_name ON artists(name);

-- Albums (owned by one artist)
CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    sort_name TEXT,
    artist_id INTEGER NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
    artist_name TEXT NOT NULL,
    release_date TEXT,
    genres TEXT,
    track_count INTEGER NOT NULL DEFAULT 0,
    native_id INTEGER UNIQUE,
    native_thumb INTEGER,
    hash INTEGER NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_albums_artist_id ON albums(artist_id);
CREATE INDEX IF NOT EXISTS idx_albums_artist_name_name ON albums(artist_name, name);

-- Tracks (owned by one album; artist denormalised)
CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    sort_name TEXT,
    artist_id INTEGER NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
    artist_name TEXT NOT NULL,
    album_id INTEGER NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
    album_name TEXT NOT NULL,
    duration_ms INTEGER,
    track_num INTEGER,
    disc_num INTEGER,
    location TEXT,
    bitrate INTEGER,
    size INTEGER,
    format TEXT,
    native_id INTEGER UNIQUE,
    hash INTEGER NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_tracks_album_id ON tracks(album_id);
CREATE INDEX IF NOT EXISTS idx_tracks_artist_id ON tracks(artist_id);
"#;

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_catalog",
    sql: MIGRATION_001,
}];
