//! # Catalog Tests
//!
//! Saving and searching media against the in-memory store.

use anyhow::Result;
use autofilter::db::{MediaStore, MemoryStore};
use autofilter::errors::SearchError;
use autofilter::file_id::FileIdParts;
use autofilter::media::{get_file_details, save_file, IncomingMedia, SaveOutcome};
use autofilter::search::{get_search_results, SearchRequest};

fn bot_api_id(media_id: i64) -> String {
    FileIdParts {
        file_type: 5,
        dc_id: 2,
        media_id,
        access_hash: 987654321,
        file_reference: b"abc".to_vec(),
    }
    .encode()
}

fn incoming(media_id: i64, name: &str) -> IncomingMedia {
    IncomingMedia {
        tg_file_id: bot_api_id(media_id),
        file_name: Some(name.to_string()),
        file_size: Some(1024 * media_id),
        file_type: Some("document".to_string()),
        mime_type: Some("video/x-matroska".to_string()),
        caption: None,
    }
}

async fn seeded_store(names: &[&str]) -> Result<MemoryStore> {
    let store = MemoryStore::new(0);
    for (i, name) in names.iter().enumerate() {
        save_file(&store, incoming(i as i64 + 1, name)).await?;
    }
    Ok(store)
}

#[tokio::test]
async fn test_save_reports_tri_state() -> Result<()> {
    let store = MemoryStore::new(0);

    let first = save_file(&store, incoming(123456789, "Movie_2020.mkv")).await?;
    assert_eq!(first, SaveOutcome::Saved("BQADAgADFc1bBwAEsWjeOgAEFgQ".to_string()));
    assert_eq!(first.status(), (true, 1));

    let again = save_file(&store, incoming(123456789, "Movie_2020.mkv")).await?;
    assert_eq!(again.status(), (false, 0));
    assert_eq!(again.file_id(), first.file_id());

    let missing_size = IncomingMedia {
        file_size: None,
        ..incoming(5, "x.mkv")
    };
    assert_eq!(save_file(&store, missing_size).await?.status(), (false, 2));

    let missing_name = IncomingMedia {
        file_name: None,
        ..incoming(6, "x.mkv")
    };
    assert_eq!(save_file(&store, missing_name).await?.status(), (false, 2));

    let undecodable = IncomingMedia {
        tg_file_id: "not a file id".to_string(),
        ..incoming(7, "x.mkv")
    };
    assert_eq!(save_file(&store, undecodable).await?, SaveOutcome::Invalid);

    Ok(())
}

#[tokio::test]
async fn test_saved_record_is_normalized() -> Result<()> {
    let store = MemoryStore::new(0);
    let outcome = save_file(&store, incoming(123456789, "The_Movie-2020.720p+x264.mkv")).await?;
    let id = outcome.file_id().expect("saved id");

    let details = get_file_details(&store, id).await?;
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].file_name, "The Movie 2020 720p x264 mkv");
    assert_eq!(details[0].file_ref.as_deref(), Some("YWJj"));
    assert_eq!(details[0].tg_file_id, bot_api_id(123456789));

    assert!(get_file_details(&store, "unknown").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_empty_query_lists_newest_first_with_pagination() -> Result<()> {
    let names: Vec<String> = (1..=25).map(|i| format!("file {i:02}.mkv")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let store = seeded_store(&refs).await?;

    let first = get_search_results(&store, &SearchRequest::new(""), false).await?;
    assert_eq!(first.total_results, 25);
    assert_eq!(first.files.len(), 10);
    assert_eq!(first.next_offset, Some(10));
    assert_eq!(first.files[0].file_name, "file 25 mkv");

    let last = get_search_results(
        &store,
        &SearchRequest {
            offset: 20,
            ..SearchRequest::new("")
        },
        false,
    )
    .await?;
    assert_eq!(last.files.len(), 5);
    assert_eq!(last.next_offset, None);
    assert_eq!(last.files[4].file_name, "file 01 mkv");
    Ok(())
}

#[tokio::test]
async fn test_huge_offset_ends_pagination() -> Result<()> {
    let store = seeded_store(&["movie one.mkv", "movie two.mkv"]).await?;

    let page = get_search_results(
        &store,
        &SearchRequest {
            offset: i64::MAX,
            ..SearchRequest::new("")
        },
        false,
    )
    .await?;

    assert!(page.files.is_empty());
    assert_eq!(page.total_results, 2);
    assert_eq!(page.next_offset, None);
    Ok(())
}

#[tokio::test]
async fn test_quality_token_narrows_results() -> Result<()> {
    let store = seeded_store(&[
        "Avatar.2009.720p.mkv",
        "Avatar.2009.1080p.mkv",
        "Avatar.2009.720px.mkv",
        "Titanic.1997.720p.mkv",
    ])
    .await?;

    let page = get_search_results(
        &store,
        &SearchRequest {
            quality: Some("720p".to_string()),
            ..SearchRequest::new("avatar")
        },
        false,
    )
    .await?;

    assert_eq!(page.total_results, 1);
    assert_eq!(page.files[0].file_name, "Avatar 2009 720p mkv");
    Ok(())
}

#[tokio::test]
async fn test_season_and_file_type_filters() -> Result<()> {
    let store = MemoryStore::new(0);
    save_file(&store, incoming(1, "Show.S01E05.mkv")).await?;
    save_file(&store, incoming(2, "Show.S02E05.mkv")).await?;
    save_file(
        &store,
        IncomingMedia {
            file_type: Some("video".to_string()),
            ..incoming(3, "Show.S01E06.mkv")
        },
    )
    .await?;

    let season_one = get_search_results(
        &store,
        &SearchRequest {
            season: Some(1),
            ..SearchRequest::new("show")
        },
        false,
    )
    .await?;
    assert_eq!(season_one.total_results, 2);

    let videos = get_search_results(
        &store,
        &SearchRequest {
            file_type: Some("video".to_string()),
            ..SearchRequest::new("show")
        },
        false,
    )
    .await?;
    assert_eq!(videos.total_results, 1);
    assert_eq!(videos.files[0].file_name, "Show S01E06 mkv");
    Ok(())
}

#[tokio::test]
async fn test_caption_matching_is_optional() -> Result<()> {
    let store = MemoryStore::new(0);
    save_file(
        &store,
        IncomingMedia {
            caption: Some("Directed by Cameron".to_string()),
            ..incoming(1, "movie.mkv")
        },
    )
    .await?;

    let request = SearchRequest::new("cameron");
    assert_eq!(get_search_results(&store, &request, false).await?.total_results, 0);
    assert_eq!(get_search_results(&store, &request, true).await?.total_results, 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_regex_is_reported() -> Result<()> {
    let store = seeded_store(&["movie.mkv"]).await?;
    let result = get_search_results(&store, &SearchRequest::new("movie(["), false).await;
    assert!(matches!(result, Err(SearchError::InvalidQuery(_))));

    // the store itself is unaffected
    assert!(store.find_media("missing").await?.is_none());
    Ok(())
}
