//! Merge detections of the same work into continuous tracks

use crate::models::ConsolidatedTrack;

/// Largest gap in seconds bridged between two detections of one work
pub const MERGE_GAP_SECONDS: f64 = 2.0;

/// Sort candidates by start and fold adjacent detections of one work
///
/// Single left-to-right pass: a candidate is merged into the immediately
/// preceding track when it starts no more than [`MERGE_GAP_SECONDS`] after
/// that track ends and both describe the same work. Ties on start keep
/// segment order.
///
/// Repeating the pass is a no-op unless a merge backfilled a title or ISRC
/// that now matches the track before it. For example, `"A"` at 0-20, an
/// untitled detection carrying an ISRC at 21-30, then `"A"` with that ISRC
/// at 30-40 gives two tracks. The second of those gains title `"A"` from
/// the third, so a second pass folds it into the first.
pub fn consolidate(candidates: Vec<ConsolidatedTrack>) -> Vec<ConsolidatedTrack> {
    let mut sorted = candidates;
    sorted.sort_by(|a, b| {
        a.start_seconds
            .total_cmp(&b.start_seconds)
            .then(a.first_segment.cmp(&b.first_segment))
    });

    let input_count = sorted.len();
    let tracks = sorted.into_iter().fold(Vec::new(), |mut tracks: Vec<ConsolidatedTrack>, candidate| {
        match tracks.last() {
            Some(last)
                if candidate.start_seconds - last.end_seconds <= MERGE_GAP_SECONDS
                    && last.same_work(&candidate) =>
            {
                let merged = last.absorb(&candidate);
                tracing::debug!(
                    title = merged.title.as_deref().unwrap_or(""),
                    end_seconds = merged.end_seconds,
                    "Extended track"
                );
                if let Some(slot) = tracks.last_mut() {
                    *slot = merged;
                }
            }
            _ => tracks.push(candidate),
        }
        tracks
    });

    tracing::info!(
        detections = input_count,
        tracks = tracks.len(),
        "Consolidation complete"
    );
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, start: f64, end: f64, segment: usize) -> ConsolidatedTrack {
        ConsolidatedTrack {
            start_seconds: start,
            end_seconds: end,
            title: Some(title.to_string()),
            artist: None,
            isrc: None,
            release_date: None,
            source_metadata: None,
            first_segment: segment,
        }
    }

    #[test]
    fn test_same_title_within_gap_merges() {
        let tracks = consolidate(vec![track("Song A", 0.0, 20.0, 0), track("Song A", 22.0, 40.0, 1)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].start_seconds, 0.0);
        assert_eq!(tracks[0].end_seconds, 40.0);
    }

    #[test]
    fn test_different_title_stays_separate() {
        let tracks = consolidate(vec![track("Song A", 0.0, 20.0, 0), track("Song B", 23.0, 40.0, 1)]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].title.as_deref(), Some("Song B"));
    }

    #[test]
    fn test_gap_over_threshold_stays_separate() {
        let tracks = consolidate(vec![track("Song A", 0.0, 20.0, 0), track("Song A", 22.5, 40.0, 1)]);
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn test_overlap_keeps_later_end() {
        let tracks = consolidate(vec![track("Song A", 0.0, 30.0, 0), track("song a", 10.0, 25.0, 0)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].end_seconds, 30.0);
    }

    #[test]
    fn test_isrc_match_merges_different_titles() {
        let mut a = track("Song A", 0.0, 20.0, 0);
        a.isrc = Some("USUM71703861".to_string());
        let mut b = track("Song A - Remastered", 20.0, 40.0, 1);
        b.isrc = Some("USUM71703861".to_string());
        b.artist = Some("Band".to_string());

        let tracks = consolidate(vec![a, b]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title.as_deref(), Some("Song A"));
        assert_eq!(tracks[0].artist.as_deref(), Some("Band"));
    }

    #[test]
    fn test_only_previous_track_extends() {
        let tracks = consolidate(vec![
            track("Song A", 0.0, 20.0, 0),
            track("Song B", 20.0, 21.0, 1),
            track("Song A", 21.0, 40.0, 1),
        ]);
        assert_eq!(tracks.len(), 3);
    }

    #[test]
    fn test_sorts_unordered_input_stably() {
        let tracks = consolidate(vec![
            track("Late", 60.0, 80.0, 3),
            track("Early B", 0.0, 5.0, 1),
            track("Early A", 0.0, 5.0, 0),
        ]);
        let titles: Vec<_> = tracks.iter().map(|t| t.title.clone().unwrap()).collect();
        assert_eq!(titles, vec!["Early A", "Early B", "Late"]);
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let once = consolidate(vec![
            track("Song A", 0.0, 20.0, 0),
            track("Song A", 21.0, 40.0, 1),
            track("Song B", 45.0, 60.0, 2),
            track("Song B", 60.0, 80.0, 3),
            track("Song C", 100.0, 110.0, 5),
        ]);
        let twice = consolidate(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_backfilled_title_can_merge_on_second_pass() {
        let mut untitled = track("Song A", 21.0, 30.0, 1);
        untitled.title = None;
        untitled.isrc = Some("USUM71703861".to_string());
        let mut with_isrc = track("Song A", 30.0, 40.0, 2);
        with_isrc.isrc = Some("USUM71703861".to_string());

        let once = consolidate(vec![track("Song A", 0.0, 20.0, 0), untitled, with_isrc]);
        assert_eq!(once.len(), 2);
        assert_eq!(once[1].title.as_deref(), Some("Song A"));

        let twice = consolidate(once);
        assert_eq!(twice.len(), 1);
        assert_eq!((twice[0].start_seconds, twice[0].end_seconds), (0.0, 40.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(consolidate(Vec::new()).is_empty());
    }
}
