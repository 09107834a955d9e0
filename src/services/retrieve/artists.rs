use super::albums::ALBUM_PAGE_SIZE;
use super::{Retriever, dedup_by_id};
use crate::ports::catalog::{CatalogArtist, CatalogClient};
use crate::ports::fetcher::{AudioFetcher, ImageFetcher};
use crate::spotify::{SpotifyKind, extract_spotify_id};

impl<C: CatalogClient, A: AudioFetcher, I: ImageFetcher> Retriever<'_, C, A, I> {
    /// Download every album and single of each listed artist.
    pub(super) async fn retrieve_artists(&mut self, entries: &[String]) {
        for raw in entries {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }

            let Some(artist) = self.find_artist(name).await else {
                self.summary.failed += 1;
                continue;
            };
            tracing::info!("Found artist: {} (ID: {})", artist.name, artist.id);

            let catalog = &self.catalog;
            let albums = self
                .settings
                .retry
                .catalog
                .paginate(&format!("Albums of {}", artist.name), ALBUM_PAGE_SIZE, |offset| {
                    catalog.artist_albums(&artist.id, offset, ALBUM_PAGE_SIZE)
                })
                .await;
            let albums = dedup_by_id(albums, |album| album.id.as_str());
            if albums.is_empty() {
                tracing::warn!("No albums found for artist: {}", artist.name);
                continue;
            }

            tracing::info!("Found {} albums for {}", albums.len(), artist.name);
            for album in &albums {
                tracing::info!("Downloading album: {}", album.name);
                self.download_album(&artist.name, album).await;
            }
        }
    }

    /// Look the artist up by id, or take the first search hit for the name.
    async fn find_artist(&self, name: &str) -> Option<CatalogArtist> {
        let catalog = &self.catalog;
        let policy = self.settings.retry.catalog;

        if let Some(artist_id) = extract_spotify_id(name, SpotifyKind::Artist) {
            let artist = policy
                .execute(&format!("Artist lookup {}", artist_id), || {
                    catalog.artist(&artist_id)
                })
                .await;
            if artist.is_none() {
                tracing::warn!("No artist found for artist ID '{}'", artist_id);
            }
            return artist;
        }

        let results = policy
            .execute(&format!("Artist search '{}'", name), || {
                catalog.search_artists(name, 1)
            })
            .await?;
        let artist = results.into_iter().next();
        if artist.is_none() {
            tracing::warn!("No artist found for '{}'", name);
        }
        artist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::LibrarySession;
    use crate::input_list::ListMode;
    use crate::ports::catalog::{CatalogAlbum, CatalogTrack, MockCatalogClient};
    use crate::ports::fetcher::MockImageFetcher;
    use crate::retry::Page;
    use crate::test_utils::{FakeAudioFetcher, settings, strings};

    fn album(id: &str, name: &str) -> CatalogAlbum {
        CatalogAlbum {
            id: id.to_string(),
            name: name.to_string(),
            artists: strings(&["Daft Punk"]),
            images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_artist_albums_are_paged_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LibrarySession::open(dir.path()).unwrap();

        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_search_artists()
            .withf(|query, limit| query == "Daft Punk" && *limit == 1)
            .returning(|_, _| {
                Ok(vec![CatalogArtist {
                    id: "dp".to_string(),
                    name: "Daft Punk".to_string(),
                }])
            });
        // A full first page forces a second request, even when most of its
        // rows could not be parsed
        catalog
            .expect_artist_albums()
            .withf(|id, offset, _| id == "dp" && *offset == 0)
            .times(1)
            .returning(|_, _, limit| {
                Ok(Page::new(
                    vec![album("discovery", "Discovery"), album("discovery", "Discovery")],
                    limit,
                ))
            });
        catalog
            .expect_artist_albums()
            .withf(|_, offset, _| *offset == 50)
            .times(1)
            .returning(|_, _, _| Ok(vec![album("ram", "Random Access Memories")].into()));
        catalog.expect_album_tracks().returning(|album_id, _, _| {
            Ok(vec![CatalogTrack {
                id: Some(format!("{}-1", album_id)),
                name: format!("{} opener", album_id),
                artists: strings(&["Daft Punk"]),
                track_number: Some(1),
            }]
            .into())
        });

        let fetcher = FakeAudioFetcher::unique();
        let queries = fetcher.queries();
        let mut retriever = Retriever::new(
            catalog,
            fetcher,
            MockImageFetcher::new(),
            &mut session,
            settings(),
        );
        let summary = retriever
            .run(ListMode::Artists, &strings(&["Daft Punk", " "]))
            .await;

        assert_eq!(summary.stored, 2);
        assert!(dir.path().join("Discovery/01 - discovery opener.mp3").is_file());
        assert!(dir.path().join("Random Access Memories/01 - ram opener.mp3").is_file());
        assert_eq!(
            *queries.lock().unwrap(),
            ["Daft Punk - discovery opener", "Daft Punk - ram opener"]
        );
    }

    #[tokio::test]
    async fn test_unknown_artist_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LibrarySession::open(dir.path()).unwrap();

        let mut catalog = MockCatalogClient::new();
        catalog.expect_search_artists().returning(|_, _| Ok(Vec::new()));

        let mut retriever = Retriever::new(
            catalog,
            FakeAudioFetcher::unique(),
            MockImageFetcher::new(),
            &mut session,
            settings(),
        );
        let summary = retriever
            .run(ListMode::Artists, &strings(&["Nobody At All"]))
            .await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.attempted, 0);
    }

    #[tokio::test]
    async fn test_artist_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LibrarySession::open(dir.path()).unwrap();
        let artist_id = "4tZwfgrHOc3mvqYlEYSvVi";

        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_artist()
            .withf(move |id| id == artist_id)
            .times(1)
            .returning(|id| {
                Ok(CatalogArtist {
                    id: id.to_string(),
                    name: "Daft Punk".to_string(),
                })
            });
        catalog
            .expect_artist_albums()
            .withf(move |id, _, _| id == artist_id)
            .returning(|_, _, _| Ok(Vec::new().into()));

        let mut retriever = Retriever::new(
            catalog,
            FakeAudioFetcher::unique(),
            MockImageFetcher::new(),
            &mut session,
            settings(),
        );
        let summary = retriever
            .run(ListMode::Artists, &[format!("spotify:artist:{}", artist_id)])
            .await;

        assert_eq!(summary, Default::default());
    }
}
