//! Plex Media Server adapter.
//!
//! Reads one music library section over the JSON API and streams change
//! notifications from the server's websocket endpoint.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use futures::{SinkExt, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use stave_core::model::naming::{parse_release_date, release_date_from_year};
use stave_core::model::{EntityKind, NativeKey};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::{SyncError, SyncResult};
use crate::notify::ListenerEvent;
use crate::source::{NodeFields, NodeHandle, Source, SourceNode};

const SOURCE_NAME: &str = "plex";
const TOKEN_HEADER: &str = "X-Plex-Token";

/// Connection settings for a Plex server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlexSettings {
    /// Base URL, e.g. `http://localhost:32400`.
    pub server_address: String,
    pub token: String,
    /// Title of the music library section to mirror.
    pub library_section: String,
}

impl PlexSettings {
    fn base_url(&self) -> &str {
        self.server_address.trim_end_matches('/')
    }

    /// Websocket URL of the notification feed.
    #[must_use]
    pub fn notifications_url(&self) -> String {
        let base = self.base_url();
        let ws_base = match base.strip_prefix("http") {
            Some(rest) => format!("ws{rest}"),
            None => base.to_string(),
        };
        format!("{ws_base}/:/websockets/notifications?{TOKEN_HEADER}={}", self.token)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MediaContainer", default)]
    container: MediaContainer,
}

#[derive(Debug, Default, Deserialize)]
struct MediaContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexMetadata>,
    #[serde(rename = "Directory", default)]
    directory: Vec<PlexDirectory>,
}

#[derive(Debug, Deserialize)]
struct PlexDirectory {
    key: String,
    title: String,
    #[serde(rename = "type", default)]
    section_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlexMetadata {
    rating_key: String,
    #[serde(rename = "type")]
    item_type: String,
    title: String,
    title_sort: Option<String>,
    thumb: Option<String>,
    child_count: Option<u32>,
    leaf_count: Option<u32>,
    year: Option<i32>,
    originally_available_at: Option<String>,
    #[serde(rename = "Genre", default)]
    genres: Vec<PlexTag>,
    duration: Option<i64>,
    index: Option<u32>,
    parent_index: Option<u32>,
    parent_rating_key: Option<String>,
    #[serde(rename = "Media", default)]
    media: Vec<PlexMedia>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlexTag {
    tag: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlexMedia {
    bitrate: Option<u32>,
    audio_codec: Option<String>,
    container: Option<String>,
    #[serde(rename = "Part", default)]
    parts: Vec<PlexPart>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlexPart {
    file: Option<String>,
    size: Option<u64>,
}

/// Statuses that mean the token was refused.
fn rejected(status: StatusCode) -> Option<SyncError> {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN).then(|| {
        SyncError::AdapterUnavailable {
            source_name: SOURCE_NAME.to_string(),
            message: format!("server rejected the token ({status})"),
        }
    })
}

/// Numeric reference from a thumbnail path such as
/// `/library/metadata/123/thumb/1690000000`.
#[must_use]
pub fn thumb_reference(path: &str) -> Option<i64> {
    path.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

fn kind_of(item_type: &str) -> Option<EntityKind> {
    match item_type {
        "artist" => Some(EntityKind::Artist),
        "album" => Some(EntityKind::Album),
        "track" => Some(EntityKind::Track),
        _ => None,
    }
}

impl PlexMetadata {
    fn into_node(self) -> SyncResult<SourceNode> {
        let kind = kind_of(&self.item_type).ok_or_else(|| SyncError::InvalidResponse {
            source_name: SOURCE_NAME.to_string(),
            message: format!("unexpected item type {:?}", self.item_type),
        })?;
        let native_key = self.rating_key.parse().ok().map(NativeKey::new);

        let mut fields = NodeFields::named(self.title);
        fields.sort_name = self.title_sort;
        fields.thumbnail = self.thumb.as_deref().and_then(thumb_reference);

        match kind {
            EntityKind::Artist => {
                fields.child_count = self.child_count;
            }
            EntityKind::Album => {
                fields.child_count = self.leaf_count.or(self.child_count);
                fields.release_date = self
                    .originally_available_at
                    .as_deref()
                    .and_then(parse_release_date)
                    .or_else(|| self.year.and_then(release_date_from_year));
                fields.genres = self.genres.into_iter().map(|g| g.tag).collect();
            }
            EntityKind::Track => {
                fields.duration_ms = self.duration;
                fields.track_num = self.index;
                fields.disc_num = self.parent_index;
                if let Some(media) = self.media.into_iter().next() {
                    fields.bitrate = media.bitrate;
                    fields.format = media.audio_codec.or(media.container);
                    if let Some(part) = media.parts.into_iter().next() {
                        fields.storage_path = part.file;
                        fields.size = part.size;
                    }
                }
            }
        }

        Ok(SourceNode {
            kind,
            handle: NodeHandle::new(self.rating_key),
            native_key,
            fields,
        })
    }
}

/// A Plex music library section.
#[derive(Debug, Clone)]
pub struct PlexSource {
    http: Client,
    settings: PlexSettings,
    section_id: String,
}

impl PlexSource {
    fn client() -> SyncResult<Client> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("stave/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(http)
    }

    /// Build a source for a section whose id is already known.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_section(settings: PlexSettings, section_id: impl Into<String>) -> SyncResult<Self> {
        Ok(Self {
            http: Self::client()?,
            settings,
            section_id: section_id.into(),
        })
    }

    /// Connect to the server and resolve the configured library section.
    ///
    /// # Errors
    /// Returns [`SyncError::AdapterUnavailable`] if the server cannot be
    /// reached or has no music section with the configured title.
    pub async fn connect(settings: PlexSettings) -> SyncResult<Self> {
        let mut source = Self::with_section(settings, String::new())?;
        let sections = source.fetch("/library/sections").await?.unwrap_or_default();

        let wanted = &source.settings.library_section;
        let section = sections
            .directory
            .into_iter()
            .find(|d| d.title == *wanted && d.section_type == "artist")
            .ok_or_else(|| SyncError::AdapterUnavailable {
                source_name: SOURCE_NAME.to_string(),
                message: format!("no music library section named {wanted:?}"),
            })?;

        log::info!("Using Plex section {:?} (id {})", section.title, section.key);
        source.section_id = section.key;
        Ok(source)
    }

    /// Library section id, as it appears in notifications.
    #[must_use]
    pub fn section_id(&self) -> &str {
        &self.section_id
    }

    async fn request(&self, path: &str) -> SyncResult<Option<MediaContainer>> {
        let url = format!("{}{path}", self.settings.base_url());
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .header(TOKEN_HEADER, &self.settings.token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if let Some(err) = rejected(response.status()) {
            return Err(err);
        }
        let envelope: Envelope = response.error_for_status()?.json().await?;
        Ok(Some(envelope.container))
    }

    /// GET `path`, retrying transient failures. `None` means 404.
    async fn fetch(&self, path: &str) -> SyncResult<Option<MediaContainer>> {
        let result = (|| self.request(path))
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(250))
                    .with_max_times(3),
            )
            .when(SyncError::is_transient)
            .notify(|err, delay| log::warn!("Retrying {path} in {delay:?}: {err}"))
            .await;

        result.map_err(|err| match err {
            SyncError::Http(e) if e.is_connect() || e.is_timeout() => {
                SyncError::AdapterUnavailable {
                    source_name: SOURCE_NAME.to_string(),
                    message: e.to_string(),
                }
            }
            other => other,
        })
    }

    async fn metadata(&self, kind: EntityKind, rating_key: &str) -> SyncResult<PlexMetadata> {
        let not_found = || SyncError::EntityNotFound {
            kind,
            key: rating_key.to_string(),
        };
        let container = self
            .fetch(&format!("/library/metadata/{rating_key}"))
            .await?
            .ok_or_else(not_found)?;
        container.metadata.into_iter().next().ok_or_else(not_found)
    }

    fn into_nodes(items: Vec<PlexMetadata>) -> Vec<SourceNode> {
        items
            .into_iter()
            .filter_map(|item| match item.into_node() {
                Ok(node) => Some(node),
                Err(e) => {
                    log::warn!("Ignoring item: {e}");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl Source for PlexSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn list_top_level(&self) -> SyncResult<Vec<SourceNode>> {
        let path = format!(
            "/library/sections/{}/all?type={}",
            self.section_id,
            EntityKind::Artist.type_code()
        );
        let container = self.fetch(&path).await?.ok_or_else(|| SyncError::AdapterUnavailable {
            source_name: SOURCE_NAME.to_string(),
            message: format!("library section {} is gone", self.section_id),
        })?;
        Ok(Self::into_nodes(container.metadata))
    }

    async fn list_children(&self, node: &SourceNode) -> SyncResult<Vec<SourceNode>> {
        if node.kind.child().is_none() {
            return Ok(Vec::new());
        }
        let container = self
            .fetch(&format!("/library/metadata/{}/children", node.handle))
            .await?
            .ok_or_else(|| SyncError::EntityNotFound {
                kind: node.kind,
                key: node.handle.to_string(),
            })?;
        Ok(Self::into_nodes(container.metadata))
    }

    async fn get_parent(&self, node: &SourceNode) -> SyncResult<Option<SourceNode>> {
        let Some(parent_kind) = node.kind.parent() else {
            return Ok(None);
        };
        let item = self.metadata(node.kind, node.handle.as_str()).await?;
        let parent_key = item.parent_rating_key.ok_or_else(|| SyncError::InvalidResponse {
            source_name: SOURCE_NAME.to_string(),
            message: format!("{} has no parent key", node.describe()),
        })?;
        let parent = self.metadata(parent_kind, &parent_key).await?.into_node()?;
        Ok(Some(parent))
    }

    async fn get_by_native_key(&self, kind: EntityKind, key: NativeKey) -> SyncResult<SourceNode> {
        let node = self.metadata(kind, &key.to_string()).await?.into_node()?;
        if node.kind != kind {
            return Err(SyncError::InvalidResponse {
                source_name: SOURCE_NAME.to_string(),
                message: format!("key {key} is a {}, not a {kind}", node.kind),
            });
        }
        Ok(node)
    }

    async fn subscribe(&self, events: mpsc::Sender<ListenerEvent>) -> SyncResult<()> {
        let url = self.settings.notifications_url();
        log::info!("Connecting to Plex notifications at {}", self.settings.base_url());

        let (ws_stream, _) = connect_async(url.as_str()).await.map_err(|e| {
            SyncError::AdapterUnavailable {
                source_name: SOURCE_NAME.to_string(),
                message: format!("websocket connection failed: {e}"),
            }
        })?;
        log::info!("Connected to Plex notifications");

        let (mut write, mut read) = ws_stream.split();
        let mut reason = "stream ended".to_string();

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if events
                        .send(ListenerEvent::Message(text.as_str().to_owned()))
                        .await
                        .is_err()
                    {
                        log::debug!("Listener went away, closing notification stream");
                        return Ok(());
                    }
                }
                Ok(Message::Ping(data)) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        reason = format!("failed to send pong: {e}");
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    reason = "closed by server".to_string();
                    break;
                }
                Err(e) => {
                    reason = format!("websocket error: {e}");
                    break;
                }
                _ => {}
            }
        }

        log::warn!("Plex notification stream ended: {reason}");
        if events.send(ListenerEvent::Closed(reason)).await.is_err() {
            log::debug!("Listener went away before the close was reported");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn settings() -> PlexSettings {
        PlexSettings {
            server_address: "http://localhost:32400/".to_string(),
            token: "secret".to_string(),
            library_section: "Music".to_string(),
        }
    }

    fn parse(json: &str) -> MediaContainer {
        serde_json::from_str::<Envelope>(json).unwrap().container
    }

    #[test]
    fn test_notifications_url() {
        assert_eq!(
            settings().notifications_url(),
            "ws://localhost:32400/:/websockets/notifications?X-Plex-Token=secret"
        );

        let mut tls = settings();
        tls.server_address = "https://plex.example.org".to_string();
        assert!(tls.notifications_url().starts_with("wss://plex.example.org/:/"));
    }

    #[test]
    fn test_auth_failures_abort_the_pass() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let err = rejected(status).unwrap();
            assert!(matches!(err, SyncError::AdapterUnavailable { .. }));
            assert!(err.is_fatal());
        }
        assert!(rejected(StatusCode::OK).is_none());
        assert!(rejected(StatusCode::INTERNAL_SERVER_ERROR).is_none());
    }

    #[test]
    fn test_thumb_reference() {
        assert_eq!(thumb_reference("/library/metadata/123/thumb/1690000000"), Some(1_690_000_000));
        assert_eq!(thumb_reference("/library/metadata/123/thumb/"), None);
        assert_eq!(thumb_reference(""), None);
    }

    #[test]
    fn test_sections() {
        let container = parse(
            r#"{"MediaContainer":{"size":2,"Directory":[
                {"key":"1","title":"Movies","type":"movie"},
                {"key":"4","title":"Music","type":"artist"}]}}"#,
        );
        assert_eq!(container.directory.len(), 2);
        assert_eq!(container.directory[1].key, "4");
        assert_eq!(container.directory[1].section_type, "artist");
    }

    #[test]
    fn test_artist_node() {
        let container = parse(
            r#"{"MediaContainer":{"Metadata":[{
                "ratingKey":"1","type":"artist","title":"The Band",
                "titleSort":"Band, The","thumb":"/library/metadata/1/thumb/1700000000",
                "childCount":3}]}}"#,
        );
        let node = PlexSource::into_nodes(container.metadata).remove(0);

        assert_eq!(node.kind, EntityKind::Artist);
        assert_eq!(node.native_key, Some(NativeKey::new(1)));
        assert_eq!(node.handle.as_str(), "1");
        assert_eq!(node.fields.sort_name.as_deref(), Some("Band, The"));
        assert_eq!(node.fields.thumbnail, Some(1_700_000_000));
        assert_eq!(node.fields.child_count, Some(3));
    }

    #[test]
    fn test_album_node() {
        let container = parse(
            r#"{"MediaContainer":{"Metadata":[{
                "ratingKey":"10","type":"album","title":"X","year":1997,
                "leafCount":12,"parentRatingKey":"1",
                "Genre":[{"tag":"Rock"},{"tag":"Alternative"}]}]}}"#,
        );
        let node = PlexSource::into_nodes(container.metadata).remove(0);

        assert_eq!(node.kind, EntityKind::Album);
        assert_eq!(node.fields.release_date, NaiveDate::from_ymd_opt(1997, 1, 1));
        assert_eq!(node.fields.genres, vec!["Rock", "Alternative"]);
        assert_eq!(node.fields.child_count, Some(12));
    }

    #[test]
    fn test_album_prefers_full_date() {
        let container = parse(
            r#"{"MediaContainer":{"Metadata":[{
                "ratingKey":"10","type":"album","title":"X","year":1997,
                "originallyAvailableAt":"1997-05-21"}]}}"#,
        );
        let node = PlexSource::into_nodes(container.metadata).remove(0);
        assert_eq!(node.fields.release_date, NaiveDate::from_ymd_opt(1997, 5, 21));
    }

    #[test]
    fn test_track_node() {
        let container = parse(
            r#"{"MediaContainer":{"Metadata":[{
                "ratingKey":"100","type":"track","title":"T1","duration":215000,
                "index":1,"parentIndex":2,"parentRatingKey":"10",
                "Media":[{"bitrate":1411,"audioCodec":"flac","container":"flac",
                    "Part":[{"file":"/music/A/X/01 T1.flac","size":38000000}]}]}]}}"#,
        );
        let node = PlexSource::into_nodes(container.metadata).remove(0);

        assert_eq!(node.kind, EntityKind::Track);
        assert_eq!(node.fields.duration_ms, Some(215_000));
        assert_eq!(node.fields.track_num, Some(1));
        assert_eq!(node.fields.disc_num, Some(2));
        assert_eq!(node.fields.bitrate, Some(1411));
        assert_eq!(node.fields.format.as_deref(), Some("flac"));
        assert_eq!(node.fields.storage_path.as_deref(), Some("/music/A/X/01 T1.flac"));
        assert_eq!(node.fields.size, Some(38_000_000));
    }

    #[test]
    fn test_unknown_types_are_dropped() {
        let container = parse(
            r#"{"MediaContainer":{"Metadata":[
                {"ratingKey":"7","type":"photo","title":"P"},
                {"ratingKey":"8","type":"artist","title":"A"}]}}"#,
        );
        let nodes = PlexSource::into_nodes(container.metadata);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].fields.name, "A");
    }

    #[test]
    fn test_empty_container() {
        let container = parse(r#"{"MediaContainer":{"size":0}}"#);
        assert!(container.metadata.is_empty());
        assert!(container.directory.is_empty());
    }

    #[test]
    fn test_with_section() {
        let source = PlexSource::with_section(settings(), "4").unwrap();
        assert_eq!(source.section_id(), "4");
        assert_eq!(source.name(), "plex");
    }
}
