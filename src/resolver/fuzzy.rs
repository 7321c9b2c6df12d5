//! Normalized-Levenshtein title similarity, used by the fuzzy title search
//! fallback when no guid or override match is found.

use strsim::normalized_levenshtein;

use crate::clients::anilist::MediaSearchResult;

fn normalize(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of `plex_title` against the best of a candidate's romaji,
/// english, and native titles, as a percentage (0-100).
#[must_use]
pub fn best_title_similarity(plex_title: &str, candidate: &MediaSearchResult) -> f64 {
    let plex = normalize(plex_title);
    [
        candidate.romaji_title.as_deref(),
        candidate.english_title.as_deref(),
        candidate.native_title.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(|t| normalized_levenshtein(&plex, &normalize(t)) * 100.0)
    .fold(0.0_f64, f64::max)
}

/// Picks the best-scoring candidate at or above `threshold`, preferring the
/// candidate whose `season_year` matches `year` as a tiebreaker.
#[must_use]
pub fn best_match<'a>(
    plex_title: &str,
    year: Option<i32>,
    candidates: &'a [MediaSearchResult],
    threshold: u8,
) -> Option<&'a MediaSearchResult> {
    let mut scored: Vec<(f64, bool, &MediaSearchResult)> = candidates
        .iter()
        .map(|c| {
            let score = best_title_similarity(plex_title, c);
            let year_match = year.is_some() && c.season_year == year;
            (score, year_match, c)
        })
        .filter(|(score, _, _)| *score >= f64::from(threshold))
        .collect();

    scored.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal))
    });

    scored.into_iter().next().map(|(_, _, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(id: i32, romaji: &str, year: Option<i32>) -> MediaSearchResult {
        MediaSearchResult {
            id,
            romaji_title: Some(romaji.to_string()),
            english_title: None,
            native_title: None,
            season_year: year,
            format: None,
        }
    }

    #[test]
    fn exact_match_scores_100() {
        let candidate = media(1, "Shingeki no Kyojin", Some(2013));
        assert!((best_title_similarity("Shingeki no Kyojin", &candidate) - 100.0).abs() < 0.01);
    }

    #[test]
    fn best_match_respects_threshold() {
        let candidates = vec![media(1, "Completely Different Title", Some(2013))];
        assert!(best_match("Shingeki no Kyojin", Some(2013), &candidates, 90).is_none());
    }

    #[test]
    fn best_match_prefers_year_match_over_raw_score() {
        let candidates = vec![
            media(1, "Attack on Titan", Some(1999)),
            media(2, "Attack on Titan", Some(2013)),
        ];
        let picked = best_match("Attack on Titan", Some(2013), &candidates, 90).unwrap();
        assert_eq!(picked.id, 2);
    }
}
