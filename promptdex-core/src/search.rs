//! Weighted fuzzy search over the indexed record set.
//!
//! Five fields are matched with fixed weights (title highest, body lowest).
//! Raw fuzzy scores are normalized against the query's self-match score so the
//! base score lands in `[0, 1]` with lower meaning better, then a bounded
//! recency penalty favors recently modified documents.

use crate::record::Record;
use chrono::{DateTime, Utc};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Non-empty queries shorter than this return no fuzzy results.
pub const MIN_QUERY_CHARS: usize = 2;

/// A per-field similarity below this does not count as a match.
const MATCH_TOLERANCE: f64 = 0.35;

const RECENCY_WINDOW_DAYS: f64 = 30.0;
const RECENCY_WEIGHT: f64 = 0.25;

const TITLE_WEIGHT: f64 = 0.45;
const DESCRIPTION_WEIGHT: f64 = 0.20;
const TAGS_WEIGHT: f64 = 0.15;
const PATH_WEIGHT: f64 = 0.10;
const BODY_WEIGHT: f64 = 0.10;

/// A record paired with its combined score. Lower is better.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub record: Record,
    pub score: f64,
}

#[derive(Debug)]
struct DocFields {
    id: String,
    title: String,
    description: String,
    tags: String,
    path: String,
    body: String,
    modified_at: DateTime<Utc>,
}

/// The search structure rebuilt from the full record set after any mutation.
///
/// Documents are stored in the caller's order (most-recent-first), which is
/// what breaks score ties.
#[derive(Debug, Default)]
pub(crate) struct SearchIndex {
    docs: Vec<DocFields>,
}

impl SearchIndex {
    pub(crate) fn build(records: &[Record]) -> Self {
        let docs = records
            .iter()
            .map(|record| DocFields {
                id: record.id.clone(),
                title: record
                    .front_matter
                    .as_ref()
                    .map(|fm| fm.title.clone())
                    .unwrap_or_default(),
                description: record
                    .front_matter
                    .as_ref()
                    .and_then(|fm| fm.description.clone())
                    .unwrap_or_default(),
                tags: record.tags.join(" "),
                path: record.id.clone(),
                body: record.content.clone(),
                modified_at: record.modified_at,
            })
            .collect();
        SearchIndex { docs }
    }

    /// Scores every document against a non-empty query and returns record ids
    /// with combined scores, best first, truncated to `limit`.
    pub(crate) fn query(&self, query: &str, now: DateTime<Utc>, limit: usize) -> Vec<(String, f64)> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }

        let matcher = SkimMatcherV2::default();
        let Some(self_score) = matcher.fuzzy_match(query, query) else {
            return Vec::new();
        };
        let self_score = self_score as f64;

        let mut candidates: Vec<(usize, f64)> = Vec::new();
        for (position, doc) in self.docs.iter().enumerate() {
            let fields = [
                (doc.title.as_str(), TITLE_WEIGHT),
                (doc.description.as_str(), DESCRIPTION_WEIGHT),
                (doc.tags.as_str(), TAGS_WEIGHT),
                (doc.path.as_str(), PATH_WEIGHT),
                (doc.body.as_str(), BODY_WEIGHT),
            ];

            let mut base = 0.0;
            let mut matched = false;
            for (text, weight) in fields {
                let similarity = matcher
                    .fuzzy_match(text, query)
                    .map(|score| (score as f64 / self_score).clamp(0.0, 1.0))
                    .filter(|similarity| *similarity >= MATCH_TOLERANCE);
                match similarity {
                    Some(similarity) => {
                        matched = true;
                        base += weight * (1.0 - similarity);
                    }
                    None => base += weight,
                }
            }

            if matched {
                candidates.push((position, base.clamp(0.0, 1.0)));
            }
        }

        // Oversample before applying the recency adjustment so ranking stays
        // stable near the cutoff.
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.truncate(limit.saturating_mul(2));

        let mut results: Vec<(String, f64)> = candidates
            .into_iter()
            .map(|(position, base)| {
                let doc = &self.docs[position];
                let age_days = (now - doc.modified_at).num_seconds() as f64 / 86_400.0;
                let penalty = (age_days / RECENCY_WINDOW_DAYS).clamp(0.0, 1.0) * RECENCY_WEIGHT;
                (doc.id.clone(), base + penalty)
            })
            .collect();
        results.sort_by(|a, b| a.1.total_cmp(&b.1));
        results.truncate(limit);
        results
    }
}
