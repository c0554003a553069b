use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{ClassifiedEntry, ParsedEntry, TvShowInfo};

lazy_static! {
    // ASCII classes only: `(?i)` would also fold in non-ASCII letters
    static ref SEASON_MARKER: Regex = Regex::new(r"[Ss]([0-9]{1,2})").unwrap();
    static ref EPISODE_MARKER: Regex = Regex::new(r"[Ee]([0-9]{1,2})").unwrap();
}

/// Heuristic content classifier.
///
/// Classification never fails: anything that doesn't look like a live stream
/// or a TV episode is a movie. Every function here is pure, so classifying the
/// same entry twice gives the same result.
pub struct ContentClassifier;

fn is_name_space(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\r' | '\t')
}

fn marker_number(captures: &regex::Captures<'_>) -> Option<u32> {
    captures.get(1)?.as_str().parse().ok()
}

impl ContentClassifier {
    /// True when the last path segment of the URL has no `.`
    pub fn is_possible_live_stream(url: &str) -> bool {
        match url.rfind('/') {
            Some(slash) => !url[slash..].contains('.'),
            None => false,
        }
    }

    /// Season/episode markers from a display name.
    ///
    /// The first `S<d>`/`S<dd>` fixes the season. Every `E<d>`/`E<dd>` after it
    /// is an episode candidate and the last one wins. Both must be present.
    pub fn tv_show_info(name: &str) -> Option<TvShowInfo> {
        let season_captures = SEASON_MARKER.captures(name)?;
        let season = marker_number(&season_captures)?;
        let marker = season_captures.get(0)?;

        let episode = EPISODE_MARKER
            .captures_iter(&name[marker.end()..])
            .filter_map(|c| marker_number(&c))
            .last()?;

        let show_name = name[..marker.start()].trim_end_matches(is_name_space);
        let show_name = if show_name.is_empty() { name } else { show_name };

        Some(TvShowInfo {
            show_name: show_name.to_string(),
            season,
            episode,
        })
    }

    /// Enrich a parsed entry with both heuristics
    pub fn classify(entry: ParsedEntry) -> ClassifiedEntry {
        let is_live_stream = Self::is_possible_live_stream(&entry.url);
        let tv_show_info = Self::tv_show_info(&entry.name);
        ClassifiedEntry {
            entry,
            is_live_stream,
            tv_show_info,
        }
    }

    pub fn classify_all(entries: Vec<ParsedEntry>) -> Vec<ClassifiedEntry> {
        entries.into_iter().map(Self::classify).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    fn entry(name: &str, url: &str) -> ParsedEntry {
        ParsedEntry {
            name: name.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_live_stream_heuristic() {
        assert!(ContentClassifier::is_possible_live_stream("http://host/stream"));
        assert!(!ContentClassifier::is_possible_live_stream("http://host/movie.mp4"));
        assert!(ContentClassifier::is_possible_live_stream("http://host.example.com/live/123"));
        assert!(!ContentClassifier::is_possible_live_stream("no-slash"));
        assert!(ContentClassifier::is_possible_live_stream("http://host/dir/"));
    }

    #[test]
    fn test_tv_show_detection() {
        let info = ContentClassifier::tv_show_info("Show Name S01E02 extra").unwrap();
        assert_eq!(info.show_name, "Show Name");
        assert_eq!(info.season, 1);
        assert_eq!(info.episode, 2);

        let info = ContentClassifier::tv_show_info("Breaking Bad s5e14").unwrap();
        assert_eq!(info.show_name, "Breaking Bad");
        assert_eq!((info.season, info.episode), (5, 14));
    }

    #[test]
    fn test_movie_title_has_no_tv_info() {
        assert_eq!(ContentClassifier::tv_show_info("Movie Title (2020)"), None);
        assert_eq!(ContentClassifier::tv_show_info("Seven"), None);
        // season without episode
        assert_eq!(ContentClassifier::tv_show_info("Show S01"), None);
    }

    #[test]
    fn test_tv_show_name_falls_back_to_full_name() {
        let info = ContentClassifier::tv_show_info("S03E04").unwrap();
        assert_eq!(info.show_name, "S03E04");
        assert_eq!((info.season, info.episode), (3, 4));
    }

    #[test]
    fn test_last_episode_marker_wins() {
        let info = ContentClassifier::tv_show_info("Show S01E02 Extended E3").unwrap();
        assert_eq!(info.episode, 3);
    }

    #[test]
    fn test_only_two_digits_are_read() {
        let info = ContentClassifier::tv_show_info("Long S123E456").unwrap();
        assert_eq!((info.season, info.episode), (12, 45));
    }

    #[test]
    fn test_classify_routes_tv_before_live() {
        let episode = ContentClassifier::classify(entry("News S01E01", "http://host/live/7"));
        assert_eq!(episode.kind(), MediaKind::TvShow);
        assert!(episode.is_live_stream);

        let live = ContentClassifier::classify(entry("News 24", "http://host/live/7"));
        assert_eq!(live.kind(), MediaKind::LiveStream);

        let tv = ContentClassifier::classify(entry("Show S02E05", "http://x/ep.mkv"));
        assert_eq!(tv.kind(), MediaKind::TvShow);

        let movie = ContentClassifier::classify(entry("Movie Title (2020)", "http://x/m.mp4"));
        assert_eq!(movie.kind(), MediaKind::Movie);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let source = entry("Show Name S01E02 extra", "http://x/y");
        let first = ContentClassifier::classify(source.clone());
        let second = ContentClassifier::classify(source);
        assert_eq!(first, second);
    }
}
