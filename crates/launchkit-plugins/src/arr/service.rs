//! What differs between Lidarr, Radarr, Readarr and Sonarr.
//!
//! The four services share one REST dialect; they disagree on API version,
//! resource names, field names and the shape of the add request.

use launchkit_core::{ItemAction, RemoteItem};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrService {
    Lidarr,
    Radarr,
    Readarr,
    Sonarr,
}

/// User choices applied to an add request.
#[derive(Debug, Clone)]
pub struct AddOptions {
    pub profile_id: i64,
    pub metadata_id: i64,
    pub root_path: String,
    pub monitor: bool,
    pub search: bool,
}

impl ArrService {
    pub const ALL: [ArrService; 4] = [
        ArrService::Lidarr,
        ArrService::Radarr,
        ArrService::Readarr,
        ArrService::Sonarr,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ArrService::Lidarr => "lidarr",
            ArrService::Radarr => "radarr",
            ArrService::Readarr => "readarr",
            ArrService::Sonarr => "sonarr",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ArrService::Lidarr => "Lidarr",
            ArrService::Radarr => "Radarr",
            ArrService::Readarr => "Readarr",
            ArrService::Sonarr => "Sonarr",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ArrService::Lidarr => "Manage music artists via a Lidarr instance",
            ArrService::Radarr => "Manage movies via a Radarr instance",
            ArrService::Readarr => "Manage book authors via a Readarr instance",
            ArrService::Sonarr => "Manage TV series via a Sonarr instance",
        }
    }

    pub fn default_trigger(self) -> &'static str {
        match self {
            ArrService::Lidarr => "lidarr ",
            ArrService::Radarr => "radarr ",
            ArrService::Readarr => "readarr ",
            ArrService::Sonarr => "sonarr ",
        }
    }

    pub fn synopsis(self) -> &'static str {
        match self {
            ArrService::Lidarr => "[add] <artist>",
            ArrService::Radarr => "[add] <movie>",
            ArrService::Readarr => "[add] <author>",
            ArrService::Sonarr => "[add] <series>",
        }
    }

    /// Singular, capitalised name of what the library holds.
    pub fn noun(self) -> &'static str {
        match self {
            ArrService::Lidarr => "Artist",
            ArrService::Radarr => "Movie",
            ArrService::Readarr => "Author",
            ArrService::Sonarr => "Series",
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            ArrService::Lidarr => "http://localhost:8686",
            ArrService::Radarr => "http://localhost:7878",
            ArrService::Readarr => "http://localhost:8787",
            ArrService::Sonarr => "http://localhost:8989",
        }
    }

    pub fn default_root(self) -> &'static str {
        match self {
            ArrService::Lidarr => "/music",
            ArrService::Radarr => "/movies",
            ArrService::Readarr => "/books",
            ArrService::Sonarr => "/tv",
        }
    }

    pub fn default_profile(self) -> i64 {
        match self {
            ArrService::Sonarr => 3,
            _ => 1,
        }
    }

    /// Lidarr and Readarr also need a metadata profile when adding.
    pub fn has_metadata_profile(self) -> bool {
        matches!(self, ArrService::Lidarr | ArrService::Readarr)
    }

    fn api_version(self) -> &'static str {
        match self {
            ArrService::Lidarr | ArrService::Readarr => "v1",
            ArrService::Radarr | ArrService::Sonarr => "v3",
        }
    }

    fn resource(self) -> &'static str {
        match self {
            ArrService::Lidarr => "artist",
            ArrService::Radarr => "movie",
            ArrService::Readarr => "author",
            ArrService::Sonarr => "series",
        }
    }

    /// Field holding the name the library filter matches on.
    pub fn name_field(self) -> &'static str {
        match self {
            ArrService::Lidarr => "artistName",
            ArrService::Readarr => "authorName",
            ArrService::Radarr | ArrService::Sonarr => "title",
        }
    }

    pub fn library_path(self) -> String {
        format!("/api/{}/{}", self.api_version(), self.resource())
    }

    pub fn item_path(self, id: i64) -> String {
        format!("{}/{}", self.library_path(), id)
    }

    pub fn lookup_path(self, term: &str) -> String {
        format!(
            "{}/lookup?term={}",
            self.library_path(),
            urlencoding::encode(term)
        )
    }

    pub fn command_path(self) -> String {
        format!("/api/{}/command", self.api_version())
    }

    pub fn rescan_command(self, id: i64) -> Value {
        match self {
            ArrService::Lidarr => json!({"name": "RescanArtist", "artistId": id}),
            ArrService::Radarr => json!({"name": "RefreshMovie", "movieIds": [id]}),
            ArrService::Readarr => json!({"name": "RefreshAuthor", "authorIds": [id]}),
            ArrService::Sonarr => json!({"name": "RescanSeries", "seriesId": id}),
        }
    }

    /// Web UI path of a library entry.
    pub fn web_path(self, item: &RemoteItem) -> Option<String> {
        let id = item.i64_field("id")?;
        Some(match self {
            ArrService::Lidarr => {
                let slug = item
                    .str_field("titleSlug")
                    .or_else(|| item.str_field("foreignArtistId"))
                    .map(String::from)
                    .unwrap_or_else(|| id.to_string());
                format!("/artist/{}", slug)
            }
            ArrService::Radarr => format!("/movie/{}", id),
            ArrService::Readarr => format!("/author/{}", id),
            ArrService::Sonarr => format!("/series/{}", id),
        })
    }

    /// Web UI search page for a term the lookup could not resolve.
    pub fn search_path(self, term: &str) -> String {
        let page = match self {
            ArrService::Lidarr => "/add/search",
            _ => "/add/new",
        };
        format!("{}?term={}", page, urlencoding::encode(term))
    }

    pub fn title(self, item: &RemoteItem) -> String {
        let name = item.str_field(self.name_field()).unwrap_or("Unknown");
        match (self, item.i64_field("year")) {
            (ArrService::Radarr | ArrService::Sonarr, Some(year)) if year > 0 => {
                format!("{} ({})", name, year)
            }
            _ => name.to_string(),
        }
    }

    /// Summary line for an entry already in the library.
    pub fn library_subtext(self, item: &RemoteItem) -> String {
        match self {
            ArrService::Lidarr => {
                let albums = stat(item, "albumCount");
                let tracks = stat(item, "trackFileCount");
                let missing = stat(item, "trackCount") - tracks;
                with_missing(format!("{} Albums: {} Tracks", albums, tracks), missing)
            }
            ArrService::Radarr => item.str_field("overview").unwrap_or_default().to_string(),
            ArrService::Readarr => format!(
                "{} - {}/{} books owned",
                capitalized_status(item),
                stat(item, "bookFileCount"),
                stat(item, "availableBookCount")
            ),
            ArrService::Sonarr => {
                let seasons = item
                    .get("seasons")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                let episodes = stat(item, "episodeFileCount");
                let missing = stat(item, "episodeCount") - episodes;
                with_missing(format!("{} Seasons: {} Episodes", seasons, episodes), missing)
            }
        }
    }

    /// Summary line for a lookup candidate.
    pub fn lookup_subtext(self, item: &RemoteItem) -> String {
        let overview = item.str_field("overview").unwrap_or_default();
        match self {
            ArrService::Lidarr => format!(
                "{} - {}",
                item.str_field("artistType").unwrap_or_default(),
                capitalized_status(item)
            ),
            ArrService::Radarr => overview.to_string(),
            ArrService::Readarr => format!("{} - {}", capitalized_status(item), overview),
            ArrService::Sonarr => format!(
                "{}: {}",
                item.str_field("network").unwrap_or_default(),
                overview
            ),
        }
    }

    /// Links to third-party catalogues for a lookup candidate.
    pub fn external_links(self, item: &RemoteItem) -> Vec<ItemAction> {
        match self {
            ArrService::Radarr | ArrService::Sonarr => item
                .str_field("imdbId")
                .map(|imdb| {
                    ItemAction::open_url(
                        "imdb",
                        "View on IMDb",
                        format!("https://www.imdb.com/title/{}", imdb),
                    )
                })
                .into_iter()
                .collect(),
            ArrService::Lidarr => named_links(item)
                .filter_map(|(name, url)| match name {
                    "musicmoz" => Some(ItemAction::open_url("musicmoz", "View on MusicMoz", url)),
                    "discogs" => Some(ItemAction::open_url("discogs", "View on Discogs", url)),
                    _ => None,
                })
                .collect(),
            ArrService::Readarr => named_links(item)
                .filter(|(name, _)| name.eq_ignore_ascii_case("goodreads"))
                .map(|(_, url)| ItemAction::open_url("goodreads", "View on Goodreads", url))
                .take(1)
                .collect(),
        }
    }

    /// Request body that adds `record` (a lookup result) to the library.
    pub fn add_payload(self, record: &Value, options: &AddOptions) -> Value {
        let field = |key: &str| record.get(key).cloned().unwrap_or(Value::Null);
        match self {
            ArrService::Lidarr => json!({
                "artistName": field("artistName"),
                "artistType": field("artistType"),
                "foreignArtistId": field("foreignArtistId"),
                "qualityProfileId": options.profile_id,
                "metadataProfileId": options.metadata_id,
                "images": field("images"),
                "links": field("links"),
                "rootFolderPath": options.root_path,
                "monitored": options.monitor,
                "addOptions": {
                    "monitored": options.monitor,
                    "searchForMissingAlbums": options.search,
                },
            }),
            ArrService::Radarr => {
                let mut payload = record.clone();
                if let Some(object) = payload.as_object_mut() {
                    object.insert("id".into(), json!(0));
                    object.insert("qualityProfileId".into(), json!(options.profile_id));
                    object.insert("monitored".into(), json!(options.monitor));
                    object.insert("rootFolderPath".into(), json!(options.root_path));
                    object.insert("addOptions".into(), json!({"searchForMovie": options.search}));
                }
                payload
            }
            ArrService::Readarr => {
                let mut payload = record.clone();
                if let Some(object) = payload.as_object_mut() {
                    object.insert("id".into(), json!(0));
                    object.insert("qualityProfileId".into(), json!(options.profile_id));
                    object.insert("metadataProfileId".into(), json!(options.metadata_id));
                    object.insert("monitored".into(), json!(options.monitor));
                    object.insert("rootFolderPath".into(), json!(options.root_path));
                    object.insert(
                        "addOptions".into(),
                        json!({
                            "monitored": options.monitor,
                            "searchForMissingBooks": options.search,
                        }),
                    );
                }
                payload
            }
            ArrService::Sonarr => {
                let seasons: Vec<Value> = record
                    .get("seasons")
                    .and_then(Value::as_array)
                    .map(|seasons| {
                        seasons
                            .iter()
                            .map(|season| {
                                json!({
                                    "seasonNumber": season.get("seasonNumber").cloned().unwrap_or(Value::Null),
                                    "monitored": options.monitor,
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                json!({
                    "tvdbId": field("tvdbId"),
                    "title": field("title"),
                    "titleSlug": field("titleSlug"),
                    "images": field("images"),
                    "seasons": seasons,
                    "qualityProfileId": options.profile_id,
                    "rootFolderPath": options.root_path,
                    "monitored": options.monitor,
                    "addOptions": {
                        "ignoreEpisodesWithFiles": true,
                        "ignoreEpisodesWithoutFiles": !options.monitor,
                        "searchForMissingEpisodes": options.search,
                    },
                })
            }
        }
    }
}

fn stat(item: &RemoteItem, key: &str) -> i64 {
    item.i64_field(&format!("statistics.{}", key))
        .or_else(|| item.i64_field(key))
        .unwrap_or(0)
}

fn with_missing(summary: String, missing: i64) -> String {
    if missing > 0 {
        format!("{} - {} Missing", summary, missing)
    } else {
        summary
    }
}

fn capitalized_status(item: &RemoteItem) -> String {
    let status = item.str_field("status").unwrap_or_default();
    let mut chars = status.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `(name, url)` pairs of a record's `links` (Readarr capitalises the key).
fn named_links(item: &RemoteItem) -> impl Iterator<Item = (&str, String)> + '_ {
    item.get("links")
        .or_else(|| item.get("Links"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|link| {
            let name = link.get("name")?.as_str()?;
            let url = link.get("url")?.as_str()?;
            Some((name, url.to_string()))
        })
}
