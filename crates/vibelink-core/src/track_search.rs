//! Catalog search with a fallback query ladder.
//!
//! Resolves an artist + title request to a concrete catalog track, relaxing
//! the query one rung at a time when stricter forms return nothing usable.

use vibelink_types::TrackRef;

use crate::playback_service::{PlaybackService, ServiceResult};

const SEARCH_LIMIT: u32 = 10;

/// Resolve a requested artist + title against the remote catalog.
///
/// Ladder: exact quoted artist+track query, then an unquoted fuzzy query,
/// then bare words with partial artist-name reconciliation. Returns
/// `Ok(None)` when every rung is exhausted.
pub fn resolve_track(
    service: &dyn PlaybackService,
    artist: &str,
    title: &str,
) -> ServiceResult<Option<TrackRef>> {
    let quoted = format!("artist:\"{artist}\" track:\"{title}\"");
    let candidates = service.search(&quoted, SEARCH_LIMIT)?;
    if let Some(hit) = candidates
        .iter()
        .find(|c| eq_fold(&c.artist, artist) && eq_fold(&c.name, title))
        .or(candidates.first())
    {
        return Ok(Some(hit.clone()));
    }

    let fuzzy = format!("{artist} {title}");
    let candidates = service.search(&fuzzy, SEARCH_LIMIT)?;
    if let Some(hit) = candidates.iter().find(|c| eq_fold(&c.artist, artist)) {
        return Ok(Some(hit.clone()));
    }

    let bare = bare_words(&format!("{title} {artist}"));
    if bare.is_empty() {
        return Ok(None);
    }
    let candidates = service.search(&bare, SEARCH_LIMIT)?;
    Ok(candidates
        .iter()
        .find(|c| shares_artist_word(&c.artist, artist))
        .cloned())
}

fn eq_fold(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Strip punctuation down to lowercase word soup.
fn bare_words(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Partial artist reconciliation: any shared word counts as a match.
fn shares_artist_word(candidate: &str, requested: &str) -> bool {
    let candidate_words = bare_words(candidate);
    let requested_words = bare_words(requested);
    requested_words
        .split_whitespace()
        .any(|word| candidate_words.split_whitespace().any(|c| c == word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use vibelink_types::{RemotePlaybackState, RemoteQueue};

    use crate::playback_service::PlaybackServiceError;

    fn track(id: &str, artist: &str, name: &str) -> TrackRef {
        TrackRef {
            id: id.to_string(),
            name: name.to_string(),
            artist: artist.to_string(),
            artwork_url: None,
            duration_ms: None,
        }
    }

    /// Returns canned result lists in order, recording each query.
    struct LadderService {
        responses: Mutex<Vec<Vec<TrackRef>>>,
        queries: Mutex<Vec<String>>,
    }

    impl LadderService {
        fn new(responses: Vec<Vec<TrackRef>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    impl PlaybackService for LadderService {
        fn get_queue(&self) -> ServiceResult<RemoteQueue> {
            Ok(RemoteQueue::default())
        }
        fn get_playback_state(&self) -> ServiceResult<RemotePlaybackState> {
            Ok(RemotePlaybackState::default())
        }
        fn skip_next(&self) -> ServiceResult<()> {
            Ok(())
        }
        fn skip_previous(&self) -> ServiceResult<()> {
            Ok(())
        }
        fn seek(&self, _position_ms: u64) -> ServiceResult<()> {
            Ok(())
        }
        fn enqueue(&self, _track_id: &str) -> ServiceResult<()> {
            Ok(())
        }
        fn search(&self, query: &str, _limit: u32) -> ServiceResult<Vec<TrackRef>> {
            self.queries.lock().unwrap().push(query.to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(responses.remove(0))
            }
        }
        fn start_playback(&self) -> ServiceResult<()> {
            Ok(())
        }
        fn get_liked_tracks(&self, _limit: u32, _offset: u32) -> ServiceResult<Vec<TrackRef>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn quoted_query_wins_on_first_rung() {
        let service = LadderService::new(vec![vec![track("t1", "Khruangbin", "Maria También")]]);
        let hit = resolve_track(&service, "Khruangbin", "Maria También")
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "t1");
        let queries = service.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0], "artist:\"Khruangbin\" track:\"Maria También\"");
    }

    #[test]
    fn falls_back_to_fuzzy_then_bare_words() {
        let service = LadderService::new(vec![
            vec![],
            vec![],
            vec![track("t9", "Nina Simone Trio", "Feeling Good")],
        ]);
        let hit = resolve_track(&service, "Nina Simone", "Feeling Good!")
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "t9");

        let queries = service.queries.lock().unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[1], "Nina Simone Feeling Good!");
        assert_eq!(queries[2], "feeling good nina simone");
    }

    #[test]
    fn bare_words_rejects_unrelated_artist() {
        let service = LadderService::new(vec![
            vec![],
            vec![],
            vec![track("t3", "Totally Different", "Feeling Good")],
        ]);
        let hit = resolve_track(&service, "Nina Simone", "Feeling Good").unwrap();
        assert!(hit.is_none());
    }

    #[test]
    fn transport_error_propagates() {
        struct FailingService;
        impl PlaybackService for FailingService {
            fn get_queue(&self) -> ServiceResult<RemoteQueue> {
                Ok(RemoteQueue::default())
            }
            fn get_playback_state(&self) -> ServiceResult<RemotePlaybackState> {
                Ok(RemotePlaybackState::default())
            }
            fn skip_next(&self) -> ServiceResult<()> {
                Ok(())
            }
            fn skip_previous(&self) -> ServiceResult<()> {
                Ok(())
            }
            fn seek(&self, _position_ms: u64) -> ServiceResult<()> {
                Ok(())
            }
            fn enqueue(&self, _track_id: &str) -> ServiceResult<()> {
                Ok(())
            }
            fn search(&self, _query: &str, _limit: u32) -> ServiceResult<Vec<TrackRef>> {
                Err(PlaybackServiceError::Transport("boom".to_string()))
            }
            fn start_playback(&self) -> ServiceResult<()> {
                Ok(())
            }
            fn get_liked_tracks(&self, _l: u32, _o: u32) -> ServiceResult<Vec<TrackRef>> {
                Ok(Vec::new())
            }
        }

        let err = resolve_track(&FailingService, "A", "B").unwrap_err();
        assert!(matches!(err, PlaybackServiceError::Transport(_)));
    }
}
