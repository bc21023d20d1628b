use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Id;

// ────────────────────────────────────────
//  Lookup tables (keyed by natural key)
// ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Genre {
    pub tmdb_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct SpokenLanguage {
    pub iso_639_1: String,
    #[serde(default)]
    pub english_name: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct OriginCountry {
    pub iso_3166_1: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ProductionCompany {
    pub tmdb_id: i32,
    pub name: String,
    pub origin_country: Option<String>,
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ProductionCountry {
    pub iso_3166_1: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Video {
    pub video_id: String,
    pub key: String,
    pub name: Option<String>,
    pub site: String,
    pub size: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub video_type: String,
    pub official: Option<bool>,
    pub published_at: DateTime<Utc>,
}

// ────────────────────────────────────────
//  Movie
// ────────────────────────────────────────

/// Scalar movie columns, shared by the stored row, write payloads and the bulk dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct MovieFields {
    pub title: String,
    pub original_title: String,
    pub overview: Option<String>,
    pub tagline: Option<String>,
    pub homepage: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub runtime: Option<i32>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub original_language: Option<String>,
    pub adult: Option<bool>,
    pub video: Option<bool>,
    pub status: Option<String>,
    pub imdb_id: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub collection_id: Option<i32>,
    pub collection_name: Option<String>,
    pub collection_poster_path: Option<String>,
    pub collection_backdrop_path: Option<String>,
    pub external_imdb_id: Option<String>,
    pub external_twitter_id: Option<String>,
    pub external_facebook_id: Option<String>,
    pub external_wikidata_id: Option<String>,
    pub external_instagram_id: Option<String>,
}

/// Column names of `MovieFields`, in declaration order. Used by the Postgres
/// backend to build INSERT/UPDATE statements.
pub const MOVIE_COLUMNS: [&str; 28] = [
    "title",
    "original_title",
    "overview",
    "tagline",
    "homepage",
    "release_date",
    "runtime",
    "budget",
    "revenue",
    "popularity",
    "vote_average",
    "vote_count",
    "original_language",
    "adult",
    "video",
    "status",
    "imdb_id",
    "poster_path",
    "backdrop_path",
    "collection_id",
    "collection_name",
    "collection_poster_path",
    "collection_backdrop_path",
    "external_imdb_id",
    "external_twitter_id",
    "external_facebook_id",
    "external_wikidata_id",
    "external_instagram_id",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Movie {
    pub id: Id,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: MovieFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Replacement sets for the many-to-many relations. `None` leaves a relation
/// untouched; `Some(vec![])` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MovieRelations {
    pub genre_ids: Option<Vec<i32>>,
    pub spoken_language_codes: Option<Vec<String>>,
    pub origin_country_codes: Option<Vec<String>>,
    pub production_company_ids: Option<Vec<i32>>,
    pub production_country_codes: Option<Vec<String>>,
    pub video_ids: Option<Vec<String>>,
}

impl MovieRelations {
    pub fn is_empty(&self) -> bool {
        self.genre_ids.is_none()
            && self.spoken_language_codes.is_none()
            && self.origin_country_codes.is_none()
            && self.production_company_ids.is_none()
            && self.production_country_codes.is_none()
            && self.video_ids.is_none()
    }
}

/// Create / full-replace payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MovieInput {
    #[serde(flatten)]
    pub fields: MovieFields,
    #[serde(flatten)]
    pub relations: MovieRelations,
}

/// Partial update payload: only the fields present are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MoviePatch {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub tagline: Option<String>,
    pub homepage: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub runtime: Option<i32>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub original_language: Option<String>,
    pub adult: Option<bool>,
    pub video: Option<bool>,
    pub status: Option<String>,
    pub imdb_id: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub collection_id: Option<i32>,
    pub collection_name: Option<String>,
    pub collection_poster_path: Option<String>,
    pub collection_backdrop_path: Option<String>,
    pub external_imdb_id: Option<String>,
    pub external_twitter_id: Option<String>,
    pub external_facebook_id: Option<String>,
    pub external_wikidata_id: Option<String>,
    pub external_instagram_id: Option<String>,
    #[serde(flatten)]
    pub relations: MovieRelations,
}

macro_rules! patch_into {
    ($patch:expr, $target:expr; required: $($r:ident),*; optional: $($o:ident),* $(,)?) => {
        $( if let Some(v) = $patch.$r { $target.$r = v; } )*
        $( if $patch.$o.is_some() { $target.$o = $patch.$o; } )*
    };
}

/// Scalar side of an update: PUT replaces every column, PATCH only the present ones.
#[derive(Debug, Clone)]
pub enum MovieChange {
    Replace(MovieFields),
    Patch(Box<MoviePatch>),
}

impl MovieChange {
    pub fn apply_to(self, mut current: MovieFields) -> MovieFields {
        match self {
            MovieChange::Replace(fields) => fields,
            MovieChange::Patch(patch) => {
                let patch = *patch;
                patch_into!(patch, current;
                    required: title, original_title;
                    optional: overview, tagline, homepage, release_date, runtime, budget, revenue,
                        popularity, vote_average, vote_count, original_language, adult, video, status,
                        imdb_id, poster_path, backdrop_path, collection_id, collection_name,
                        collection_poster_path, collection_backdrop_path, external_imdb_id,
                        external_twitter_id, external_facebook_id, external_wikidata_id,
                        external_instagram_id,
                );
                current
            }
        }
    }
}

/// Full movie with its related lookup rows embedded.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub movie: Movie,
    pub genres: Vec<Genre>,
    pub spoken_languages: Vec<SpokenLanguage>,
    pub origin_countries: Vec<OriginCountry>,
    pub production_companies: Vec<ProductionCompany>,
    pub production_countries: Vec<ProductionCountry>,
    pub videos: Vec<Video>,
}

/// Light list row: scalar fields plus genre names.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct MovieSummary {
    pub id: Id,
    pub title: String,
    pub original_title: String,
    pub release_date: Option<NaiveDate>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    pub popularity: Option<f64>,
    pub poster_path: Option<String>,
    pub genres: Vec<String>,
    pub overview: Option<String>,
    pub runtime: Option<i32>,
}

impl MovieSummary {
    pub fn from_movie(movie: &Movie, genres: Vec<String>) -> Self {
        let f = &movie.fields;
        Self {
            id: movie.id,
            title: f.title.clone(),
            original_title: f.original_title.clone(),
            release_date: f.release_date,
            vote_average: f.vote_average,
            vote_count: f.vote_count,
            popularity: f.popularity,
            poster_path: f.poster_path.clone(),
            genres,
            overview: f.overview.clone(),
            runtime: f.runtime,
        }
    }
}

// ────────────────────────────────────────
//  Listing
// ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieSortKey {
    Title,
    ReleaseDate,
    VoteAverage,
    Popularity,
    CreatedAt,
}

impl MovieSortKey {
    pub fn column(self) -> &'static str {
        match self {
            MovieSortKey::Title => "title",
            MovieSortKey::ReleaseDate => "release_date",
            MovieSortKey::VoteAverage => "vote_average",
            MovieSortKey::Popularity => "popularity",
            MovieSortKey::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieOrdering {
    pub key: MovieSortKey,
    pub descending: bool,
}

impl Default for MovieOrdering {
    fn default() -> Self {
        Self { key: MovieSortKey::CreatedAt, descending: true }
    }
}

impl MovieOrdering {
    /// Accepts `field` or `-field` for the whitelisted fields; anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let key = match name {
            "title" => MovieSortKey::Title,
            "release_date" => MovieSortKey::ReleaseDate,
            "vote_average" => MovieSortKey::VoteAverage,
            "popularity" => MovieSortKey::Popularity,
            "created_at" => MovieSortKey::CreatedAt,
            _ => return None,
        };
        Some(Self { key, descending })
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw query string of `GET /movies/`. Every value is kept as text so that
/// malformed filters can be ignored instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MovieListParams {
    /// Case-insensitive substring of title, original title or overview.
    pub search: Option<String>,
    /// Case-insensitive substring of a genre name.
    pub genre: Option<String>,
    /// Exact release year.
    pub year: Option<String>,
    /// Minimum vote average.
    pub min_rating: Option<String>,
    /// One of title, release_date, vote_average, popularity, created_at, optionally prefixed with `-`.
    pub ordering: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Parsed movie filter.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub min_rating: Option<f64>,
    pub ordering: MovieOrdering,
    pub page: u32,
    pub page_size: u32,
}

impl Default for MovieQuery {
    fn default() -> Self {
        MovieListParams::default().into()
    }
}

impl MovieQuery {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl From<MovieListParams> for MovieQuery {
    fn from(p: MovieListParams) -> Self {
        let year = p
            .year
            .as_deref()
            .map(str::trim)
            .filter(|y| !y.is_empty() && y.chars().all(|c| c.is_ascii_digit()))
            .and_then(|y| y.parse().ok());
        let min_rating = p
            .min_rating
            .as_deref()
            .and_then(|r| r.trim().parse::<f64>().ok())
            .filter(|r| r.is_finite());
        let ordering = p.ordering.as_deref().and_then(MovieOrdering::parse).unwrap_or_default();
        let page = p.page.as_deref().and_then(|v| v.trim().parse().ok()).filter(|v| *v >= 1).unwrap_or(1);
        let page_size = p
            .page_size
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .filter(|v| *v >= 1)
            .map(|v: u32| v.min(MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self {
            search: non_blank(p.search),
            genre: non_blank(p.genre),
            year,
            min_rating,
            ordering,
            page,
            page_size,
        }
    }
}

/// One page of results plus navigation page numbers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(MoviePage = Page<MovieSummary>)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: i64, page: u32, page_size: u32) -> Self {
        let shown = i64::from(page) * i64::from(page_size);
        Self {
            count,
            page,
            page_size,
            next: if shown < count { page.checked_add(1) } else { None },
            previous: (page > 1).then(|| page - 1),
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct GenreCount {
    pub genre: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovieStats {
    pub total_movies: i64,
    pub avg_rating: Option<f64>,
    pub highest_rating: Option<f64>,
    pub lowest_rating: Option<f64>,
    pub avg_runtime: Option<f64>,
    pub latest_release: Option<NaiveDate>,
    pub earliest_release: Option<NaiveDate>,
    pub top_genres: Vec<GenreCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_whitelist_falls_back() {
        let q = MovieQuery::from(MovieListParams { ordering: Some("-vote_average".into()), ..Default::default() });
        assert_eq!(q.ordering, MovieOrdering { key: MovieSortKey::VoteAverage, descending: true });
        let q = MovieQuery::from(MovieListParams { ordering: Some("budget; DROP TABLE".into()), ..Default::default() });
        assert_eq!(q.ordering, MovieOrdering::default());
    }

    #[test]
    fn malformed_filters_are_ignored() {
        let q = MovieQuery::from(MovieListParams {
            year: Some("19x9".into()),
            min_rating: Some("high".into()),
            page: Some("0".into()),
            page_size: Some("500".into()),
            ..Default::default()
        });
        assert_eq!(q.year, None);
        assert_eq!(q.min_rating, None);
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn patch_keeps_absent_fields() {
        let current = MovieFields {
            title: "Heat".into(),
            original_title: "Heat".into(),
            runtime: Some(170),
            tagline: Some("A Los Angeles crime saga".into()),
            ..Default::default()
        };
        let patch = MoviePatch { runtime: Some(171), ..Default::default() };
        let next = MovieChange::Patch(Box::new(patch)).apply_to(current);
        assert_eq!(next.title, "Heat");
        assert_eq!(next.runtime, Some(171));
        assert_eq!(next.tagline.as_deref(), Some("A Los Angeles crime saga"));
    }

    #[test]
    fn page_navigation() {
        let p = Page::new(vec![1, 2], 5, 2, 2);
        assert_eq!(p.next, Some(3));
        assert_eq!(p.previous, Some(1));
        let last = Page::new(vec![5], 5, 3, 2);
        assert_eq!(last.next, None);
    }

    #[test]
    fn huge_page_number_is_an_empty_last_page() {
        let q = MovieQuery::from(MovieListParams { page: Some(u32::MAX.to_string()), ..Default::default() });
        assert_eq!(q.page, u32::MAX);
        let p: Page<i32> = Page::new(vec![], 3, q.page, q.page_size);
        assert_eq!(p.next, None);
        assert_eq!(p.previous, Some(u32::MAX - 1));
        assert_eq!(Page::<i32>::new(vec![], i64::MAX, u32::MAX, 1).next, None);
    }
}
