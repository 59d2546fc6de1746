//! Domain models.
//!
//! - [`Artist`] / [`ArtistCatalog`] - static artist styles available for generation
//! - [`ImageRecord`] - a job as stored by the contract
//! - [`JobSubmission`] - the in-memory record of one paid submission

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Artists
// =============================================================================

/// One portfolio thumbnail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub link: String,
    pub alt: String,
}

/// An artist style the model was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    /// Identifier passed to the contract
    pub artist_id: String,
    pub name: String,
    pub style: String,
    #[serde(default)]
    pub description: String,
    /// Link to the artist's own portfolio
    pub portfolio: String,
    #[serde(default)]
    pub thumbnails: Vec<Thumbnail>,
}

static BUILTIN_ARTISTS: Lazy<Vec<Artist>> = Lazy::new(|| {
    match serde_json::from_str(include_str!("../../data/artists.json")) {
        Ok(artists) => artists,
        Err(e) => {
            log::error!("Embedded artist catalog is invalid: {}", e);
            Vec::new()
        }
    }
});

/// Read-only list of artists.
#[derive(Debug, Clone)]
pub struct ArtistCatalog {
    artists: Vec<Artist>,
}

impl ArtistCatalog {
    /// Catalog shipped with the binary.
    pub fn builtin() -> Self {
        Self {
            artists: BUILTIN_ARTISTS.clone(),
        }
    }

    /// Catalog from explicit data.
    pub fn from_artists(artists: Vec<Artist>) -> Self {
        Self { artists }
    }

    pub fn all(&self) -> &[Artist] {
        &self.artists
    }

    pub fn find(&self, artist_id: &str) -> Option<&Artist> {
        self.artists.iter().find(|a| a.artist_id == artist_id)
    }

    pub fn len(&self) -> usize {
        self.artists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }
}

impl Default for ArtistCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// Contract records
// =============================================================================

/// A generation job as the contract reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: u64,
    pub customer: String,
    /// Artist id the job was run against
    pub artist: String,
    pub prompt: String,
    pub is_complete: bool,
    pub is_cancelled: bool,
}

// =============================================================================
// Submissions
// =============================================================================

/// One paid submission, kept in memory for the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    /// Local id, known before the contract assigns one
    pub submission_id: Uuid,
    pub prompt: String,
    pub artist_id: String,
    /// Amount paid, in wei
    pub paid_amount: U256,
    pub transaction_hash: Option<String>,
    /// `currentJobID + 1` read before submitting. Other submitters can race
    /// us for it.
    pub predicted_job_id: Option<u64>,
    pub submitted_at: DateTime<Utc>,
}

impl JobSubmission {
    pub fn new(prompt: impl Into<String>, artist_id: impl Into<String>, paid_amount: U256) -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            prompt: prompt.into(),
            artist_id: artist_id.into(),
            paid_amount,
            transaction_hash: None,
            predicted_job_id: None,
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ArtistCatalog::builtin();
        assert!(!catalog.is_empty());

        for artist in catalog.all() {
            assert!(!artist.artist_id.is_empty());
            assert!(!artist.name.is_empty());
            assert!(!artist.thumbnails.is_empty(), "{} has no thumbnails", artist.name);
        }
    }

    #[test]
    fn test_find_artist() {
        let catalog = ArtistCatalog::from_artists(vec![Artist {
            artist_id: "3".into(),
            name: "Claude Monet".into(),
            style: "Impressionism".into(),
            description: String::new(),
            portfolio: "https://example.org/monet".into(),
            thumbnails: vec![],
        }]);

        assert_eq!(catalog.find("3").map(|a| a.name.as_str()), Some("Claude Monet"));
        assert!(catalog.find("4").is_none());
    }

    #[test]
    fn test_artist_json_is_camel_case() {
        let json = r#"{
            "artistId": "7",
            "name": "Van Gogh",
            "style": "Post-Impressionism",
            "portfolio": "https://example.org",
            "thumbnails": [{ "link": "https://example.org/1.png", "alt": "Starry" }]
        }"#;
        let artist: Artist = serde_json::from_str(json).unwrap();
        assert_eq!(artist.artist_id, "7");
        assert_eq!(artist.description, "");
        assert_eq!(artist.thumbnails[0].alt, "Starry");
    }

    #[test]
    fn test_new_submission_has_no_hash_yet() {
        let submission = JobSubmission::new("a cat", "3", U256::from(1u64));
        assert!(submission.transaction_hash.is_none());
        assert!(submission.predicted_job_id.is_none());
    }
}
