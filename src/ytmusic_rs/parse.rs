//! Extraction of songs, artists and playlists from InnerTube renderer JSON.
//!
//! YouTube Music answers with deeply nested renderer trees whose exact shape
//! changes over time, so everything here navigates `serde_json::Value` by JSON
//! pointer and treats missing pieces as "no result" rather than as errors.

use serde_json::Value;

use crate::models::{Artist, Song};

const ARTIST_PAGE: &str = "MUSIC_PAGE_TYPE_ARTIST";
const ALBUM_PAGE: &str = "MUSIC_PAGE_TYPE_ALBUM";

const PAGE_TYPE: &str =
    "/navigationEndpoint/browseEndpoint/browseEndpointContextSupportedConfigs/browseEndpointContextMusicConfig/pageType";
const BROWSE_ID: &str = "/navigationEndpoint/browseEndpoint/browseId";
const SECTION_LIST: &str = "/tabRenderer/content/sectionListRenderer/contents";
const SINGLE_COLUMN_TAB: &str = "/contents/singleColumnBrowseResultsRenderer/tabs/0";

/// Where to fetch the next page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// `nextContinuationData` token, sent as `ctoken`/`continuation` query parameters.
    Legacy(String),
    /// `continuationCommand` token, sent as the request body's `continuation`.
    Command(String),
}

/// Renderers of one page of a listing, unwrapped from their `{"<kind>Renderer": ...}` envelope.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub continuation: Option<Continuation>,
}

/// A playlist entry of the user's library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPlaylist {
    pub id: String,
    pub title: String,
    pub author_ids: Vec<String>,
}

fn text_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn array_at<'a>(value: &'a Value, pointer: &str) -> &'a [Value] {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn page_from_items(items: &[Value], shelf: Option<&Value>) -> Page {
    let mut page = Page {
        continuation: shelf
            .and_then(|shelf| text_at(shelf, "/continuations/0/nextContinuationData/continuation"))
            .map(|token| Continuation::Legacy(token.to_string())),
        ..Page::default()
    };

    for item in items {
        let Some((kind, renderer)) = item.as_object().and_then(|object| object.iter().next())
        else {
            continue;
        };
        if kind == "continuationItemRenderer" {
            if let Some(token) = text_at(
                renderer,
                "/continuationEndpoint/continuationCommand/token",
            ) {
                page.continuation = Some(Continuation::Command(token.to_string()));
            }
            continue;
        }
        page.items.push(renderer.clone());
    }

    page
}

fn shelf_page(shelf: Option<&Value>, items_key: &str) -> Page {
    match shelf {
        Some(shelf) => page_from_items(array_at(shelf, items_key), Some(shelf)),
        None => Page::default(),
    }
}

/// First page of `FEmusic_liked_playlists`.
pub fn library_playlists_page(response: &Value) -> Page {
    let grid = response.pointer(&format!(
        "{SINGLE_COLUMN_TAB}{SECTION_LIST}/0/gridRenderer"
    ));
    shelf_page(grid, "/items")
}

/// First page of `FEmusic_library_corpus_artists`.
pub fn library_artists_page(response: &Value) -> Page {
    let shelf = response.pointer(&format!(
        "{SINGLE_COLUMN_TAB}{SECTION_LIST}/0/musicShelfRenderer"
    ));
    shelf_page(shelf, "/contents")
}

/// First page of a playlist's tracks (`VL<playlist id>`), in either page layout.
pub fn playlist_tracks_page(response: &Value) -> Page {
    let two_column = "/contents/twoColumnBrowseResultsRenderer/secondaryContents/sectionListRenderer/contents/0/musicPlaylistShelfRenderer";
    let single_column = format!("{SINGLE_COLUMN_TAB}{SECTION_LIST}/0/musicPlaylistShelfRenderer");
    let shelf = response
        .pointer(two_column)
        .or_else(|| response.pointer(&single_column));
    shelf_page(shelf, "/contents")
}

/// Any page fetched through a continuation token.
pub fn continuation_page(response: &Value) -> Page {
    if let Some(items) = response
        .pointer("/onResponseReceivedActions/0/appendContinuationItemsAction/continuationItems")
        .and_then(Value::as_array)
    {
        return page_from_items(items, None);
    }

    let Some(contents) = response.get("continuationContents").and_then(Value::as_object) else {
        return Page::default();
    };
    match contents.values().next() {
        Some(shelf) => {
            let items_key = if shelf.get("items").is_some() {
                "/items"
            } else {
                "/contents"
            };
            shelf_page(Some(shelf), items_key)
        }
        None => Page::default(),
    }
}

/// `musicResponsiveListItemRenderer`s of every result shelf of a search response.
pub fn search_results(response: &Value) -> Vec<Value> {
    let tabbed = format!("/contents/tabbedSearchResultsRenderer/tabs/0{SECTION_LIST}");
    let sections = response
        .pointer(&tabbed)
        .or_else(|| response.pointer("/contents/sectionListRenderer/contents"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    sections
        .iter()
        .filter_map(|section| section.get("musicShelfRenderer"))
        .flat_map(|shelf| page_from_items(array_at(shelf, "/contents"), None).items)
        .collect()
}

fn flex_column_runs(item: &Value, column: usize) -> &[Value] {
    array_at(
        item,
        &format!("/flexColumns/{column}/musicResponsiveListItemFlexColumnRenderer/text/runs"),
    )
}

fn video_id(item: &Value) -> Option<&str> {
    text_at(item, "/playlistItemData/videoId")
        .or_else(|| {
            text_at(
                item,
                "/overlay/musicItemThumbnailOverlayRenderer/content/musicPlayButtonRenderer/playNavigationEndpoint/watchEndpoint/videoId",
            )
        })
        .or_else(|| {
            flex_column_runs(item, 0)
                .first()
                .and_then(|run| text_at(run, "/navigationEndpoint/watchEndpoint/videoId"))
        })
}

/// Song of a `musicResponsiveListItemRenderer`, from search results or a playlist.
///
/// Entries without a video id (unavailable or removed tracks) yield `None`.
pub fn song_from_item(item: &Value) -> Option<Song> {
    let id = video_id(item)?;
    let title = flex_column_runs(item, 0).first().and_then(|run| text_at(run, "/text"))?;

    let detail_runs: Vec<&Value> = (1..)
        .map(|column| flex_column_runs(item, column))
        .take_while(|runs| !runs.is_empty())
        .flatten()
        .collect();
    let run_of_type = |page_type: &str| {
        detail_runs
            .iter()
            .find(|run| text_at(run, PAGE_TYPE) == Some(page_type))
            .and_then(|run| text_at(run, "/text"))
    };

    let artist = run_of_type(ARTIST_PAGE)
        .or_else(|| flex_column_runs(item, 1).first().and_then(|run| text_at(run, "/text")))
        .unwrap_or_default();
    let album = run_of_type(ALBUM_PAGE).map(str::to_string);

    Some(Song::new(id, title, artist, album))
}

/// Artist of a `musicResponsiveListItemRenderer` linking to an artist channel.
pub fn artist_from_item(item: &Value) -> Option<Artist> {
    let id = text_at(item, BROWSE_ID)?;
    let name = flex_column_runs(item, 0).first().and_then(|run| text_at(run, "/text"))?;
    Some(Artist::new(id, name))
}

/// First search result that is a playable song.
pub fn first_song(response: &Value) -> Option<Song> {
    search_results(response).iter().find_map(song_from_item)
}

pub fn first_artist(response: &Value) -> Option<Artist> {
    search_results(response).iter().find_map(artist_from_item)
}

/// Playlist of a library `musicTwoRowItemRenderer`. The "New playlist" tile
/// and other non-playlist entries yield `None`.
pub fn library_playlist(item: &Value) -> Option<LibraryPlaylist> {
    let browse_id = text_at(item, BROWSE_ID)
        .or_else(|| text_at(item, &format!("/title/runs/0{BROWSE_ID}")))?;
    let id = browse_id.strip_prefix("VL")?;
    let title = text_at(item, "/title/runs/0/text")?;
    let author_ids = array_at(item, "/subtitle/runs")
        .iter()
        .filter_map(|run| text_at(run, BROWSE_ID))
        .map(str::to_string)
        .collect();

    Some(LibraryPlaylist {
        id: id.to_string(),
        title: title.to_string(),
        author_ids,
    })
}

/// Channel id of the signed-in account, from `account/account_menu`.
pub fn user_channel_id(response: &Value) -> Option<String> {
    text_at(
        response,
        "/actions/0/openPopupAction/popup/multiPageMenuRenderer/sections/0/multiPageMenuSectionRenderer/items/0/compactLinkRenderer/navigationEndpoint/browseEndpoint/browseId",
    )
    .map(str::to_string)
}
