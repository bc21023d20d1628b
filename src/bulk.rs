//! Normalized dump format consumed by `movielog-import`, and the load driver.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{Genre, Id, MovieFields, OriginCountry, ProductionCompany, ProductionCountry, SpokenLanguage, Video};
use crate::repo::{BulkLoadRepo, RepoError};

/// A movie row carrying its explicit id from the source dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMovie {
    pub id: Id,
    #[serde(flatten)]
    pub fields: MovieFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkDump {
    pub genres: Vec<Genre>,
    pub spoken_languages: Vec<SpokenLanguage>,
    pub origin_countries: Vec<OriginCountry>,
    pub production_companies: Vec<ProductionCompany>,
    pub production_countries: Vec<ProductionCountry>,
    pub videos: Vec<Video>,
    pub movies: Vec<BulkMovie>,
    pub movie_genres: Vec<(Id, i32)>,
    pub movie_spoken_languages: Vec<(Id, String)>,
    pub movie_origin_countries: Vec<(Id, String)>,
    pub movie_production_companies: Vec<(Id, i32)>,
    pub movie_production_countries: Vec<(Id, String)>,
    pub movie_videos: Vec<(Id, String)>,
}

/// Rows actually inserted per table (pre-existing keys are not counted).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkLoadReport {
    pub genres: u64,
    pub spoken_languages: u64,
    pub origin_countries: u64,
    pub production_companies: u64,
    pub production_countries: u64,
    pub videos: u64,
    pub movies: u64,
    pub movie_genres: u64,
    pub movie_spoken_languages: u64,
    pub movie_origin_countries: u64,
    pub movie_production_companies: u64,
    pub movie_production_countries: u64,
    pub movie_videos: u64,
}

impl BulkLoadReport {
    pub fn lines(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("genres", self.genres),
            ("spoken_languages", self.spoken_languages),
            ("origin_countries", self.origin_countries),
            ("production_companies", self.production_companies),
            ("production_countries", self.production_countries),
            ("videos", self.videos),
            ("movies", self.movies),
            ("movie_genres", self.movie_genres),
            ("movie_spoken_languages", self.movie_spoken_languages),
            ("movie_origin_countries", self.movie_origin_countries),
            ("movie_production_companies", self.movie_production_companies),
            ("movie_production_countries", self.movie_production_countries),
            ("movie_videos", self.movie_videos),
        ]
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BulkError {
    #[error("reading dump: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing dump: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid dump: {0}")]
    Invalid(String),
    #[error("load failed: {0}")]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// The catalogue already held movies and `force` was not set.
    Skipped { existing: i64 },
    Loaded(BulkLoadReport),
}

pub async fn read_dump(path: &Path) -> Result<BulkDump, BulkError> {
    let bytes = tokio::fs::read(path).await?;
    let dump: BulkDump = serde_json::from_slice(&bytes)?;
    check_dump(&dump)?;
    Ok(dump)
}

/// Scalar checks that do not need the database.
pub fn check_dump(dump: &BulkDump) -> Result<(), BulkError> {
    for m in &dump.movies {
        if let Some(v) = m.fields.vote_average {
            if !(0.0..=10.0).contains(&v) {
                return Err(BulkError::Invalid(format!("movie {}: vote_average {v} out of range", m.id)));
            }
        }
        if m.fields.runtime.is_some_and(|r| r < 0) {
            return Err(BulkError::Invalid(format!("movie {}: negative runtime", m.id)));
        }
        if m.id <= 0 {
            return Err(BulkError::Invalid(format!("movie id {} must be positive", m.id)));
        }
    }
    Ok(())
}

/// Load `dump` unless movies already exist (overridable with `force`).
pub async fn run(repo: &dyn BulkLoadRepo, dump: &BulkDump, force: bool) -> Result<BulkOutcome, BulkError> {
    check_dump(dump)?;
    let existing = repo.movie_count().await?;
    if existing > 0 && !force {
        tracing::info!(existing, "catalogue already populated; skipping import");
        return Ok(BulkOutcome::Skipped { existing });
    }
    let report = repo.bulk_load(dump).await?;
    tracing::info!(movies = report.movies, "bulk load committed");
    Ok(BulkOutcome::Loaded(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_parses_pair_arrays_and_defaults() {
        let raw = r#"{
            "genres": [{"tmdb_id": 18, "name": "Drama"}],
            "movies": [{"id": 550, "title": "Fight Club", "original_title": "Fight Club", "vote_average": 8.4}],
            "movie_genres": [[550, 18]]
        }"#;
        let dump: BulkDump = serde_json::from_str(raw).unwrap();
        assert_eq!(dump.movies[0].id, 550);
        assert_eq!(dump.movie_genres, vec![(550, 18)]);
        assert!(dump.videos.is_empty());
        assert!(check_dump(&dump).is_ok());
    }

    #[test]
    fn out_of_range_rating_rejected() {
        let mut dump = BulkDump::default();
        dump.movies.push(BulkMovie {
            id: 1,
            fields: MovieFields { title: "x".into(), original_title: "x".into(), vote_average: Some(12.0), ..Default::default() },
        });
        assert!(matches!(check_dump(&dump), Err(BulkError::Invalid(_))));
    }
}
