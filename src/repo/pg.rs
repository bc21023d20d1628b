//! Postgres backend. Queries are built at runtime (no compile-time database
//! needed); multi-row changes and counter maintenance run in one transaction.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder, Row};

use super::*;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, role, date_joined";

const SUMMARY_SELECT: &str = "SELECT m.id, m.title, m.original_title, m.release_date, m.vote_average, \
     m.vote_count, m.popularity, m.poster_path, m.overview, m.runtime, \
     ARRAY(SELECT g.name FROM movie_genres mg JOIN genres g ON g.tmdb_id = mg.genre_id \
           WHERE mg.movie_id = m.id ORDER BY g.name) AS genres \
     FROM movies m";

const RECOUNT: &str = "UPDATE reviews SET \
     helpful_count = (SELECT COUNT(*) FROM review_votes WHERE review_id = $1 AND vote_type = 'HELPFUL'), \
     reported_count = (SELECT COUNT(*) FROM review_reports WHERE review_id = $1) \
     WHERE id = $1 RETURNING helpful_count, reported_count";

/// Postgres caps a statement at 65535 bind parameters.
const BIND_LIMIT: usize = 65_535;

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(ref db) => {
                let constraint = db.constraint().unwrap_or_default();
                match db.code().as_deref() {
                    Some("23505") => RepoError::Conflict(unique_message(constraint).into()),
                    Some("23503") => foreign_key_error(constraint),
                    Some("23514") => check_error(constraint),
                    _ => RepoError::Internal(e.to_string()),
                }
            }
            other => RepoError::Internal(other.to_string()),
        }
    }
}

fn unique_message(constraint: &str) -> &'static str {
    match constraint {
        "users_email_key" => MSG_DUPLICATE_EMAIL,
        "users_username_key" => MSG_DUPLICATE_USERNAME,
        "catalog_entries_user_movie_status_key" => MSG_DUPLICATE_CATALOG_ENTRY,
        "collections_user_name_key" => MSG_DUPLICATE_COLLECTION,
        "collection_items_collection_movie_key" => MSG_DUPLICATE_ITEM,
        "reviews_user_movie_active_key" => MSG_DUPLICATE_REVIEW,
        "review_reports_user_review_key" => MSG_DUPLICATE_REPORT,
        _ => "Duplicate record.",
    }
}

fn foreign_key_error(constraint: &str) -> RepoError {
    if constraint.ends_with("movie_id_fkey") {
        RepoError::invalid("movie_id", MSG_MOVIE_MISSING)
    } else if constraint.ends_with("review_id_fkey") {
        RepoError::invalid("review_id", MSG_REVIEW_MISSING)
    } else {
        RepoError::invalid("body", format!("Referenced record does not exist ({constraint})."))
    }
}

fn check_error(constraint: &str) -> RepoError {
    let field = ["personal_rating", "vote_average", "runtime", "rating"]
        .into_iter()
        .find(|f| constraint.contains(f))
        .unwrap_or("body");
    RepoError::invalid(field, "Value is out of range.")
}

fn internal(e: impl std::fmt::Display) -> RepoError {
    RepoError::Internal(e.to_string())
}

macro_rules! bind_movie_columns {
    ($sep:expr, $f:expr, $assign:expr; $($col:ident),* $(,)?) => {
        $(
            if $assign {
                $sep.push(concat!(stringify!($col), " = "));
                $sep.push_bind_unseparated($f.$col);
            } else {
                $sep.push_bind($f.$col);
            }
        )*
    };
}

/// Binds every scalar column in `MOVIE_COLUMNS` order, either as a VALUES
/// tuple body or as `col = $n` assignments.
fn push_movie_fields(sep: &mut Separated<'_, '_, Postgres, &'static str>, f: MovieFields, assign: bool) {
    bind_movie_columns!(sep, f, assign;
        title, original_title, overview, tagline, homepage, release_date, runtime, budget, revenue,
        popularity, vote_average, vote_count, original_language, adult, video, status, imdb_id,
        poster_path, backdrop_path, collection_id, collection_name, collection_poster_path,
        collection_backdrop_path, external_imdb_id, external_twitter_id, external_facebook_id,
        external_wikidata_id, external_instagram_id,
    );
}

/// How one many-to-many relation of `movies` is stored.
struct Relation {
    field: &'static str,
    label: &'static str,
    table: &'static str,
    column: &'static str,
    lookup: &'static str,
    key: &'static str,
}

const GENRES: Relation =
    Relation { field: "genre_ids", label: "genre", table: "movie_genres", column: "genre_id", lookup: "genres", key: "tmdb_id" };
const SPOKEN_LANGUAGES: Relation = Relation {
    field: "spoken_language_codes",
    label: "language",
    table: "movie_spoken_languages",
    column: "iso_639_1",
    lookup: "spoken_languages",
    key: "iso_639_1",
};
const ORIGIN_COUNTRIES: Relation = Relation {
    field: "origin_country_codes",
    label: "origin country",
    table: "movie_origin_countries",
    column: "iso_3166_1",
    lookup: "origin_countries",
    key: "iso_3166_1",
};
const PRODUCTION_COMPANIES: Relation = Relation {
    field: "production_company_ids",
    label: "production company",
    table: "movie_production_companies",
    column: "company_id",
    lookup: "production_companies",
    key: "tmdb_id",
};
const PRODUCTION_COUNTRIES: Relation = Relation {
    field: "production_country_codes",
    label: "production country",
    table: "movie_production_countries",
    column: "iso_3166_1",
    lookup: "production_countries",
    key: "iso_3166_1",
};
const VIDEOS: Relation =
    Relation { field: "video_ids", label: "video", table: "movie_videos", column: "video_id", lookup: "videos", key: "video_id" };

enum Keys {
    Int(Vec<i32>),
    Text(Vec<String>),
}

impl Keys {
    fn dedup(mut self) -> Self {
        match &mut self {
            Keys::Int(k) => {
                k.sort_unstable();
                k.dedup();
            }
            Keys::Text(k) => {
                k.sort_unstable();
                k.dedup();
            }
        }
        self
    }

    fn len(&self) -> usize {
        match self {
            Keys::Int(k) => k.len(),
            Keys::Text(k) => k.len(),
        }
    }
}

fn relation_updates(rel: MovieRelations) -> Vec<(&'static Relation, Keys)> {
    let mut out = Vec::new();
    if let Some(k) = rel.genre_ids {
        out.push((&GENRES, Keys::Int(k)));
    }
    if let Some(k) = rel.spoken_language_codes {
        out.push((&SPOKEN_LANGUAGES, Keys::Text(k)));
    }
    if let Some(k) = rel.origin_country_codes {
        out.push((&ORIGIN_COUNTRIES, Keys::Text(k)));
    }
    if let Some(k) = rel.production_company_ids {
        out.push((&PRODUCTION_COMPANIES, Keys::Int(k)));
    }
    if let Some(k) = rel.production_country_codes {
        out.push((&PRODUCTION_COUNTRIES, Keys::Text(k)));
    }
    if let Some(k) = rel.video_ids {
        out.push((&VIDEOS, Keys::Text(k)));
    }
    out.into_iter().map(|(r, k)| (r, k.dedup())).collect()
}

/// Validate all supplied relation keys, then swap each relation's rows.
async fn replace_relations(conn: &mut PgConnection, movie_id: Id, rel: MovieRelations) -> RepoResult<()> {
    let updates = relation_updates(rel);
    for (rel, keys) in &updates {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ANY($1)", rel.lookup, rel.key);
        let q = sqlx::query_scalar::<_, i64>(&sql);
        let found = match keys {
            Keys::Int(k) => q.bind(k.clone()),
            Keys::Text(k) => q.bind(k.clone()),
        }
        .fetch_one(&mut *conn)
        .await?;
        if found as usize != keys.len() {
            return Err(RepoError::invalid(rel.field, format!("Unknown {} key(s).", rel.label)));
        }
    }
    for (rel, keys) in updates {
        sqlx::query(&format!("DELETE FROM {} WHERE movie_id = $1", rel.table))
            .bind(movie_id)
            .execute(&mut *conn)
            .await?;
        let sql = format!(
            "INSERT INTO {} (movie_id, {}) SELECT $1, k FROM UNNEST($2) AS k ON CONFLICT DO NOTHING",
            rel.table, rel.column
        );
        let q = sqlx::query(&sql).bind(movie_id);
        match keys {
            Keys::Int(k) => q.bind(k),
            Keys::Text(k) => q.bind(k),
        }
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn push_movie_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &MovieQuery) {
    qb.push(" WHERE TRUE");
    if let Some(search) = &q.search {
        let pat = like_pattern(search);
        qb.push(" AND (m.title ILIKE ")
            .push_bind(pat.clone())
            .push(" OR m.original_title ILIKE ")
            .push_bind(pat.clone())
            .push(" OR m.overview ILIKE ")
            .push_bind(pat)
            .push(")");
    }
    if let Some(genre) = &q.genre {
        qb.push(
            " AND EXISTS (SELECT 1 FROM movie_genres mg JOIN genres g ON g.tmdb_id = mg.genre_id \
             WHERE mg.movie_id = m.id AND g.name ILIKE ",
        )
        .push_bind(like_pattern(genre))
        .push(")");
    }
    if let Some(year) = q.year {
        qb.push(" AND EXTRACT(YEAR FROM m.release_date) = ").push_bind(year);
    }
    if let Some(min) = q.min_rating {
        qb.push(" AND m.vote_average >= ").push_bind(min);
    }
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(FromRow)]
struct ItemRow {
    collection_id: Id,
    #[sqlx(flatten)]
    item: CollectionItem,
}

#[derive(Clone)]
pub struct PgRepo {
    pool: PgPool,
}

impl PgRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> RepoResult<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(internal)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn detail(&self, id: Id) -> RepoResult<MovieDetail> {
        let movie = sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::NotFound)?;
        let genres = sqlx::query_as::<_, Genre>(
            "SELECT g.tmdb_id, g.name FROM genres g JOIN movie_genres mg ON mg.genre_id = g.tmdb_id \
             WHERE mg.movie_id = $1 ORDER BY g.name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let spoken_languages = sqlx::query_as::<_, SpokenLanguage>(
            "SELECT l.iso_639_1, l.english_name, l.name FROM spoken_languages l \
             JOIN movie_spoken_languages ml ON ml.iso_639_1 = l.iso_639_1 \
             WHERE ml.movie_id = $1 ORDER BY l.english_name, l.name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let origin_countries = sqlx::query_as::<_, OriginCountry>(
            "SELECT iso_3166_1 FROM movie_origin_countries WHERE movie_id = $1 ORDER BY iso_3166_1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let production_companies = sqlx::query_as::<_, ProductionCompany>(
            "SELECT c.tmdb_id, c.name, c.origin_country, c.logo_path FROM production_companies c \
             JOIN movie_production_companies mc ON mc.company_id = c.tmdb_id \
             WHERE mc.movie_id = $1 ORDER BY c.name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let production_countries = sqlx::query_as::<_, ProductionCountry>(
            "SELECT c.iso_3166_1, c.name FROM production_countries c \
             JOIN movie_production_countries mc ON mc.iso_3166_1 = c.iso_3166_1 \
             WHERE mc.movie_id = $1 ORDER BY c.name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let videos = sqlx::query_as::<_, Video>(
            "SELECT v.* FROM videos v JOIN movie_videos mv ON mv.video_id = v.video_id \
             WHERE mv.movie_id = $1 ORDER BY v.published_at DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(MovieDetail {
            movie,
            genres,
            spoken_languages,
            origin_countries,
            production_companies,
            production_countries,
            videos,
        })
    }

    async fn with_items(&self, collections: Vec<Collection>) -> RepoResult<Vec<CollectionRecord>> {
        let ids: Vec<Id> = collections.iter().map(|c| c.id).collect();
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT collection_id, movie_id, position, added_at FROM collection_items \
             WHERE collection_id = ANY($1) ORDER BY position, added_at",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(collections
            .into_iter()
            .map(|c| {
                let items = rows.iter().filter(|r| r.collection_id == c.id).map(|r| r.item.clone()).collect();
                CollectionRecord { collection: c, items }
            })
            .collect())
    }
}

async fn lock_review(conn: &mut PgConnection, id: Id) -> RepoResult<Option<Review>> {
    Ok(sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?)
}

async fn lock_live_review(conn: &mut PgConnection, id: Id) -> RepoResult<Review> {
    lock_review(conn, id)
        .await?
        .filter(|r| r.status != ReviewStatus::Deleted)
        .ok_or(RepoError::NotFound)
}

async fn recount(conn: &mut PgConnection, review_id: Id) -> RepoResult<ReviewCounters> {
    Ok(sqlx::query_as::<_, ReviewCounters>(RECOUNT).bind(review_id).fetch_one(conn).await?)
}

fn upserted<T: for<'r> FromRow<'r, PgRow>>(row: &PgRow) -> RepoResult<Upserted<T>> {
    Ok(Upserted { value: T::from_row(row)?, created: row.try_get("inserted")? })
}

#[async_trait]
impl MovieRepo for PgRepo {
    async fn list_movies(&self, q: &MovieQuery) -> RepoResult<Page<MovieSummary>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM movies m");
        push_movie_filters(&mut count, q);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        push_movie_filters(&mut qb, q);
        let dir = if q.ordering.descending { "DESC" } else { "ASC" };
        qb.push(format!(" ORDER BY m.{} {dir} NULLS LAST, m.id DESC", q.ordering.key.column()));
        qb.push(" LIMIT ").push_bind(i64::from(q.page_size));
        qb.push(" OFFSET ").push_bind(q.offset());
        let results = qb.build_query_as::<MovieSummary>().fetch_all(&self.pool).await?;
        Ok(Page::new(results, total, q.page, q.page_size))
    }

    async fn get_movie(&self, id: Id) -> RepoResult<MovieDetail> {
        self.detail(id).await
    }

    async fn movie_summaries(&self, ids: &[Id]) -> RepoResult<Vec<MovieSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(sqlx::query_as::<_, MovieSummary>(&format!("{SUMMARY_SELECT} WHERE m.id = ANY($1)"))
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create_movie(&self, input: MovieInput) -> RepoResult<MovieDetail> {
        let mut tx = self.pool.begin().await?;
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO movies (");
        qb.push(MOVIE_COLUMNS.join(", ")).push(") VALUES (");
        push_movie_fields(&mut qb.separated(", "), input.fields, false);
        qb.push(") RETURNING id");
        let id: Id = qb.build_query_scalar().fetch_one(&mut *tx).await?;
        replace_relations(&mut tx, id, input.relations).await?;
        tx.commit().await?;
        tracing::debug!(movie_id = id, "movie created");
        self.detail(id).await
    }

    async fn update_movie(&self, id: Id, change: MovieChange, relations: MovieRelations) -> RepoResult<MovieDetail> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepoError::NotFound)?;
        let fields = change.apply_to(current.fields);
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE movies SET ");
        {
            let mut sep = qb.separated(", ");
            push_movie_fields(&mut sep, fields, true);
            sep.push("updated_at = now()");
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.build().execute(&mut *tx).await?;
        replace_relations(&mut tx, id, relations).await?;
        tx.commit().await?;
        self.detail(id).await
    }

    async fn delete_movie(&self, id: Id) -> RepoResult<()> {
        let done = sqlx::query("DELETE FROM movies WHERE id = $1").bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn movie_stats(&self) -> RepoResult<MovieStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total_movies, AVG(vote_average) AS avg_rating, \
             MAX(vote_average) AS highest_rating, MIN(vote_average) AS lowest_rating, \
             AVG(runtime)::float8 AS avg_runtime, MAX(release_date) AS latest_release, \
             MIN(release_date) AS earliest_release FROM movies",
        )
        .fetch_one(&self.pool)
        .await?;
        let top_genres = sqlx::query_as::<_, GenreCount>(
            "SELECT g.name AS genre, COUNT(mg.movie_id) AS count FROM genres g \
             LEFT JOIN movie_genres mg ON mg.genre_id = g.tmdb_id \
             GROUP BY g.tmdb_id, g.name ORDER BY count DESC, g.name LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(MovieStats {
            total_movies: row.try_get("total_movies")?,
            avg_rating: row.try_get("avg_rating")?,
            highest_rating: row.try_get("highest_rating")?,
            lowest_rating: row.try_get("lowest_rating")?,
            avg_runtime: row.try_get("avg_runtime")?,
            latest_release: row.try_get("latest_release")?,
            earliest_release: row.try_get("earliest_release")?,
            top_genres,
        })
    }
}

#[async_trait]
impl LookupRepo for PgRepo {
    async fn list_genres(&self) -> RepoResult<Vec<Genre>> {
        Ok(sqlx::query_as("SELECT tmdb_id, name FROM genres ORDER BY name").fetch_all(&self.pool).await?)
    }

    async fn list_spoken_languages(&self) -> RepoResult<Vec<SpokenLanguage>> {
        Ok(sqlx::query_as("SELECT iso_639_1, english_name, name FROM spoken_languages ORDER BY english_name, name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_origin_countries(&self) -> RepoResult<Vec<OriginCountry>> {
        Ok(sqlx::query_as("SELECT iso_3166_1 FROM origin_countries ORDER BY iso_3166_1").fetch_all(&self.pool).await?)
    }

    async fn list_production_companies(&self) -> RepoResult<Vec<ProductionCompany>> {
        Ok(sqlx::query_as("SELECT tmdb_id, name, origin_country, logo_path FROM production_companies ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_production_countries(&self) -> RepoResult<Vec<ProductionCountry>> {
        Ok(sqlx::query_as("SELECT iso_3166_1, name FROM production_countries ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_videos(&self) -> RepoResult<Vec<Video>> {
        Ok(sqlx::query_as("SELECT * FROM videos ORDER BY published_at DESC").fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, first_name, last_name, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        ))
        .bind(new.username)
        .bind(new.email)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.password_hash)
        .bind(new.role)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        Ok(sqlx::query_as::<_, UserCredentials>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_user(&self, id: Id) -> RepoResult<User> {
        Ok(sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_profile(&self, id: Id, upd: ProfileUpdate) -> RepoResult<User> {
        Ok(sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET username = COALESCE($2, username), first_name = COALESCE($3, first_name), \
             last_name = COALESCE($4, last_name) WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(upd.username)
        .bind(upd.first_name)
        .bind(upd.last_name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn set_role(&self, id: Id, role: Role) -> RepoResult<(Role, User)> {
        let mut tx = self.pool.begin().await?;
        let old: Role = sqlx::query_scalar("SELECT role FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let user = sqlx::query_as::<_, User>(&format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"))
            .bind(id)
            .bind(role)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok((old, user))
    }
}

#[async_trait]
impl CatalogRepo for PgRepo {
    async fn upsert_catalog_entry(&self, new: NewCatalogEntry) -> RepoResult<Upserted<CatalogEntry>> {
        let watched_at = (new.status == CatalogStatus::Watched).then(Utc::now);
        let row = sqlx::query(
            "INSERT INTO catalog_entries (user_id, movie_id, status, notes, personal_rating, watched_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, movie_id, status) DO UPDATE SET \
               notes = EXCLUDED.notes, \
               personal_rating = COALESCE(EXCLUDED.personal_rating, catalog_entries.personal_rating), \
               watched_at = COALESCE(EXCLUDED.watched_at, catalog_entries.watched_at) \
             RETURNING *, (xmax = 0) AS inserted",
        )
        .bind(new.user_id)
        .bind(new.movie_id)
        .bind(new.status)
        .bind(new.notes)
        .bind(new.personal_rating)
        .bind(watched_at)
        .fetch_one(&self.pool)
        .await?;
        upserted(&row)
    }

    async fn create_catalog_entry(&self, new: NewCatalogEntry) -> RepoResult<CatalogEntry> {
        let watched_at = (new.status == CatalogStatus::Watched).then(Utc::now);
        Ok(sqlx::query_as::<_, CatalogEntry>(
            "INSERT INTO catalog_entries (user_id, movie_id, status, notes, personal_rating, watched_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(new.user_id)
        .bind(new.movie_id)
        .bind(new.status)
        .bind(new.notes)
        .bind(new.personal_rating)
        .bind(watched_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_catalog_entries(&self, user_id: Id, status: Option<CatalogStatus>) -> RepoResult<Vec<CatalogEntry>> {
        Ok(sqlx::query_as::<_, CatalogEntry>(
            "SELECT * FROM catalog_entries WHERE user_id = $1 AND ($2::catalog_status IS NULL OR status = $2) \
             ORDER BY added_at DESC, id DESC",
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_catalog_entry(&self, user_id: Id, id: Id) -> RepoResult<CatalogEntry> {
        Ok(sqlx::query_as::<_, CatalogEntry>("SELECT * FROM catalog_entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_catalog_entry(&self, user_id: Id, id: Id, upd: CatalogEntryUpdate) -> RepoResult<CatalogEntry> {
        Ok(sqlx::query_as::<_, CatalogEntry>(
            "UPDATE catalog_entries SET notes = COALESCE($3, notes), \
             personal_rating = COALESCE($4, personal_rating) \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .bind(upd.notes)
        .bind(upd.personal_rating)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_catalog_entry(&self, user_id: Id, id: Id) -> RepoResult<()> {
        let done = sqlx::query("DELETE FROM catalog_entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn remove_from_catalog(&self, user_id: Id, movie_id: Id) -> RepoResult<u64> {
        let removed = sqlx::query("DELETE FROM catalog_entries WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(removed)
    }

    async fn catalog_stats(&self, user_id: Id) -> RepoResult<CatalogStats> {
        Ok(sqlx::query_as::<_, CatalogStats>(
            "SELECT COUNT(DISTINCT movie_id) AS total_movies, \
             COUNT(*) FILTER (WHERE status = 'bookmarked') AS bookmarked, \
             COUNT(*) FILTER (WHERE status = 'watched') AS watched, \
             COUNT(*) FILTER (WHERE status = 'want_to_watch') AS want_to_watch, \
             AVG(personal_rating) FILTER (WHERE status = 'watched') AS avg_personal_rating, \
             COUNT(personal_rating) FILTER (WHERE status = 'watched') AS total_rated \
             FROM catalog_entries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl CollectionRepo for PgRepo {
    async fn create_collection(&self, new: NewCollection) -> RepoResult<CollectionRecord> {
        let collection = sqlx::query_as::<_, Collection>(
            "INSERT INTO collections (user_id, name, description, is_public) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(new.user_id)
        .bind(new.name)
        .bind(new.description)
        .bind(new.is_public)
        .fetch_one(&self.pool)
        .await?;
        Ok(CollectionRecord { collection, items: Vec::new() })
    }

    async fn list_visible_collections(&self, viewer: Id) -> RepoResult<Vec<CollectionRecord>> {
        let rows = sqlx::query_as::<_, Collection>(
            "SELECT * FROM collections WHERE user_id = $1 OR is_public ORDER BY updated_at DESC, id DESC",
        )
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;
        self.with_items(rows).await
    }

    async fn list_own_collections(&self, owner: Id) -> RepoResult<Vec<CollectionRecord>> {
        let rows =
            sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE user_id = $1 ORDER BY updated_at DESC, id DESC")
                .bind(owner)
                .fetch_all(&self.pool)
                .await?;
        self.with_items(rows).await
    }

    async fn get_collection(&self, id: Id) -> RepoResult<CollectionRecord> {
        let c = sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        self.with_items(vec![c]).await?.pop().ok_or(RepoError::NotFound)
    }

    async fn update_collection(&self, id: Id, upd: CollectionUpdate) -> RepoResult<CollectionRecord> {
        let c = sqlx::query_as::<_, Collection>(
            "UPDATE collections SET name = COALESCE($2, name), description = COALESCE($3, description), \
             is_public = COALESCE($4, is_public), updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(upd.name)
        .bind(upd.description)
        .bind(upd.is_public)
        .fetch_one(&self.pool)
        .await?;
        self.with_items(vec![c]).await?.pop().ok_or(RepoError::NotFound)
    }

    async fn delete_collection(&self, id: Id) -> RepoResult<()> {
        let done = sqlx::query("DELETE FROM collections WHERE id = $1").bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn add_to_collection(&self, id: Id, movie_id: Id) -> RepoResult<CollectionItem> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT id FROM collections WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM movies WHERE id = $1)")
            .bind(movie_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(RepoError::invalid("movie_id", MSG_MOVIE_MISSING));
        }
        let item = sqlx::query_as::<_, CollectionItem>(
            "INSERT INTO collection_items (collection_id, movie_id, position) \
             VALUES ($1, $2, (SELECT COUNT(*)::int FROM collection_items WHERE collection_id = $1)) \
             RETURNING movie_id, position, added_at",
        )
        .bind(id)
        .bind(movie_id)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE collections SET updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn remove_from_collection(&self, id: Id, movie_id: Id) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM collection_items WHERE collection_id = $1 AND movie_id = $2")
            .bind(id)
            .bind(movie_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(RepoError::NotFound);
        }
        sqlx::query("UPDATE collections SET updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn push_review_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &ReviewFilter) {
    qb.push(" WHERE status <> 'DELETED'");
    match f.scope {
        ReviewScope::Public => {
            qb.push(" AND status = 'PUBLISHED'");
        }
        ReviewScope::PublicAndOwn(uid) => {
            qb.push(" AND (status = 'PUBLISHED' OR user_id = ").push_bind(uid).push(")");
        }
        ReviewScope::Own(uid) => {
            qb.push(" AND user_id = ").push_bind(uid);
        }
        ReviewScope::Everything => {}
    }
    if let Some(movie_id) = f.movie_id {
        qb.push(" AND movie_id = ").push_bind(movie_id);
    }
    if let Some(status) = f.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(featured) = f.featured {
        qb.push(" AND is_featured = ").push_bind(featured);
    }
    if f.needs_attention {
        qb.push(" AND (reported_count > 0 OR status = 'PUBLISHED')");
    }
    qb.push(match f.ordering {
        ReviewOrdering::Newest => " ORDER BY published_at DESC NULLS LAST, created_at DESC, id DESC",
        ReviewOrdering::Helpful => " ORDER BY helpful_count DESC, published_at DESC NULLS LAST, id DESC",
        ReviewOrdering::Rating => " ORDER BY rating DESC, published_at DESC NULLS LAST, id DESC",
        ReviewOrdering::MostReported => " ORDER BY reported_count DESC, created_at DESC, id DESC",
    });
}

#[async_trait]
impl ReviewRepo for PgRepo {
    async fn create_review(&self, new: NewReview) -> RepoResult<Review> {
        let published_at = (new.status == ReviewStatus::Published).then(Utc::now);
        Ok(sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (user_id, movie_id, title, content, rating, status, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(new.user_id)
        .bind(new.movie_id)
        .bind(new.title)
        .bind(new.content)
        .bind(new.rating)
        .bind(new.status)
        .bind(published_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_review(&self, id: Id) -> RepoResult<Review> {
        Ok(sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1 AND status <> 'DELETED'")
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_reviews(&self, filter: &ReviewFilter) -> RepoResult<Vec<Review>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM reviews");
        push_review_filter(&mut qb, filter);
        Ok(qb.build_query_as::<Review>().fetch_all(&self.pool).await?)
    }

    async fn update_review(&self, id: Id, upd: ReviewUpdate) -> RepoResult<Review> {
        let mut tx = self.pool.begin().await?;
        let current = lock_live_review(&mut tx, id).await?;
        if let Some(to) = upd.status {
            current.status.check_author_transition(to)?;
        }
        let published_at = match (upd.status, current.published_at) {
            (Some(ReviewStatus::Published), None) => Some(Utc::now()),
            (_, at) => at,
        };
        let review = sqlx::query_as::<_, Review>(
            "UPDATE reviews SET title = COALESCE($2, title), content = COALESCE($3, content), \
             rating = COALESCE($4, rating), status = COALESCE($5, status), published_at = $6, \
             updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(upd.title)
        .bind(upd.content)
        .bind(upd.rating)
        .bind(upd.status)
        .bind(published_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(review)
    }

    async fn publish_review(&self, id: Id) -> RepoResult<Review> {
        let mut tx = self.pool.begin().await?;
        lock_live_review(&mut tx, id).await?.status.check_publish()?;
        let review = sqlx::query_as::<_, Review>(
            "UPDATE reviews SET status = 'PUBLISHED', published_at = COALESCE(published_at, now()), \
             updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(review)
    }

    async fn hide_review(&self, id: Id, moderator: Id, notes: String) -> RepoResult<Review> {
        Ok(sqlx::query_as::<_, Review>(
            "UPDATE reviews SET status = 'HIDDEN', moderated_by = $2, moderation_notes = $3, updated_at = now() \
             WHERE id = $1 AND status <> 'DELETED' RETURNING *",
        )
        .bind(id)
        .bind(moderator)
        .bind(notes)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn restore_review(&self, id: Id, moderator: Id) -> RepoResult<Review> {
        let mut tx = self.pool.begin().await?;
        lock_live_review(&mut tx, id).await?.status.check_restore()?;
        let review = sqlx::query_as::<_, Review>(
            "UPDATE reviews SET status = 'PUBLISHED', published_at = COALESCE(published_at, now()), \
             moderated_by = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(moderator)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(review)
    }

    async fn feature_review(&self, id: Id, moderator: Id, featured: bool) -> RepoResult<Review> {
        Ok(sqlx::query_as::<_, Review>(
            "UPDATE reviews SET is_featured = $3, moderated_by = $2, updated_at = now() \
             WHERE id = $1 AND status <> 'DELETED' RETURNING *",
        )
        .bind(id)
        .bind(moderator)
        .bind(featured)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_review(&self, id: Id) -> RepoResult<()> {
        let done = sqlx::query(
            "UPDATE reviews SET status = 'DELETED', updated_at = now() WHERE id = $1 AND status <> 'DELETED'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if done.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn recount_review(&self, id: Id) -> RepoResult<ReviewCounters> {
        let mut tx = self.pool.begin().await?;
        lock_live_review(&mut tx, id).await?;
        let counters = recount(&mut tx, id).await?;
        tx.commit().await?;
        Ok(counters)
    }
}

#[async_trait]
impl VoteRepo for PgRepo {
    async fn upsert_vote(&self, user_id: Id, review_id: Id, vote_type: VoteType) -> RepoResult<Upserted<ReviewVote>> {
        let mut tx = self.pool.begin().await?;
        let review = lock_review(&mut tx, review_id).await?;
        check_votable(review.as_ref(), user_id)?;
        let row = sqlx::query(
            "INSERT INTO review_votes (user_id, review_id, vote_type) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, review_id) DO UPDATE SET vote_type = EXCLUDED.vote_type \
             RETURNING *, (xmax = 0) AS inserted",
        )
        .bind(user_id)
        .bind(review_id)
        .bind(vote_type)
        .fetch_one(&mut *tx)
        .await?;
        let vote = upserted(&row)?;
        recount(&mut tx, review_id).await?;
        tx.commit().await?;
        Ok(vote)
    }

    async fn list_votes(&self, user_id: Id) -> RepoResult<Vec<ReviewVote>> {
        Ok(sqlx::query_as::<_, ReviewVote>(
            "SELECT * FROM review_votes WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_vote(&self, user_id: Id, id: Id) -> RepoResult<ReviewVote> {
        Ok(sqlx::query_as::<_, ReviewVote>("SELECT * FROM review_votes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_vote(&self, user_id: Id, id: Id, vote_type: VoteType) -> RepoResult<ReviewVote> {
        let mut tx = self.pool.begin().await?;
        let review_id: Id = sqlx::query_scalar("SELECT review_id FROM review_votes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        let review = lock_review(&mut tx, review_id).await?;
        check_votable(review.as_ref(), user_id)?;
        let vote = sqlx::query_as::<_, ReviewVote>("UPDATE review_votes SET vote_type = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(vote_type)
            .fetch_one(&mut *tx)
            .await?;
        recount(&mut tx, review_id).await?;
        tx.commit().await?;
        Ok(vote)
    }

    async fn delete_vote(&self, user_id: Id, id: Id) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        let review_id: Id =
            sqlx::query_scalar("DELETE FROM review_votes WHERE id = $1 AND user_id = $2 RETURNING review_id")
                .bind(id)
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        recount(&mut tx, review_id).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn votes_on(&self, user_id: Id, review_ids: &[Id]) -> RepoResult<Vec<ReviewVote>> {
        Ok(sqlx::query_as::<_, ReviewVote>("SELECT * FROM review_votes WHERE user_id = $1 AND review_id = ANY($2)")
            .bind(user_id)
            .bind(review_ids.to_vec())
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl ReportRepo for PgRepo {
    async fn create_report(&self, new: NewReport) -> RepoResult<ReviewReport> {
        let mut tx = self.pool.begin().await?;
        let review = lock_review(&mut tx, new.review_id).await?;
        check_reportable(review.as_ref(), new.user_id)?;
        let report = sqlx::query_as::<_, ReviewReport>(
            "INSERT INTO review_reports (user_id, review_id, reason, description) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(new.user_id)
        .bind(new.review_id)
        .bind(new.reason)
        .bind(new.description)
        .fetch_one(&mut *tx)
        .await?;
        recount(&mut tx, new.review_id).await?;
        tx.commit().await?;
        Ok(report)
    }

    async fn list_reports(&self, reporter: Option<Id>, unresolved_only: bool) -> RepoResult<Vec<ReviewReport>> {
        Ok(sqlx::query_as::<_, ReviewReport>(
            "SELECT * FROM review_reports WHERE ($1::bigint IS NULL OR user_id = $1) \
             AND (NOT $2 OR NOT resolved) ORDER BY created_at DESC, id DESC",
        )
        .bind(reporter)
        .bind(unresolved_only)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_report(&self, id: Id) -> RepoResult<ReviewReport> {
        Ok(sqlx::query_as::<_, ReviewReport>("SELECT * FROM review_reports WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn resolve_report(&self, id: Id, moderator: Id, req: ResolveRequest) -> RepoResult<ReviewReport> {
        // Right-hand sides see the row as it was before this UPDATE.
        Ok(sqlx::query_as::<_, ReviewReport>(
            "UPDATE review_reports SET \
               resolved_by = CASE WHEN $2 AND NOT resolved THEN $3 ELSE resolved_by END, \
               resolved_at = CASE WHEN $2 AND NOT resolved THEN now() ELSE resolved_at END, \
               resolved = $2, resolution_notes = $4 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(req.resolved)
        .bind(moderator)
        .bind(req.resolution_notes)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_report(&self, id: Id) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        let review_id: Id = sqlx::query_scalar("DELETE FROM review_reports WHERE id = $1 RETURNING review_id")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        recount(&mut tx, review_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Multi-row `INSERT ... ON CONFLICT DO NOTHING`, chunked under the bind limit.
async fn insert_rows<T>(
    conn: &mut PgConnection,
    head: &str,
    columns: usize,
    rows: &[T],
    mut bind: impl FnMut(&mut Separated<'_, '_, Postgres, &'static str>, &T),
) -> RepoResult<u64> {
    let mut inserted = 0;
    for chunk in rows.chunks(BIND_LIMIT / columns) {
        let mut qb = QueryBuilder::<Postgres>::new(head);
        qb.push_values(chunk, |mut b, row| bind(&mut b, row));
        qb.push(" ON CONFLICT DO NOTHING");
        inserted += qb.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(inserted)
}

#[async_trait]
impl BulkLoadRepo for PgRepo {
    async fn movie_count(&self) -> RepoResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM movies").fetch_one(&self.pool).await?)
    }

    async fn bulk_load(&self, dump: &BulkDump) -> RepoResult<BulkLoadReport> {
        let mut tx = self.pool.begin().await?;
        let conn = &mut *tx;
        let mut report = BulkLoadReport {
            genres: insert_rows(conn, "INSERT INTO genres (tmdb_id, name) ", 2, &dump.genres, |b, g| {
                b.push_bind(g.tmdb_id).push_bind(g.name.clone());
            })
            .await?,
            spoken_languages: insert_rows(
                conn,
                "INSERT INTO spoken_languages (iso_639_1, english_name, name) ",
                3,
                &dump.spoken_languages,
                |b, l| {
                    b.push_bind(l.iso_639_1.clone()).push_bind(l.english_name.clone()).push_bind(l.name.clone());
                },
            )
            .await?,
            origin_countries: insert_rows(
                conn,
                "INSERT INTO origin_countries (iso_3166_1) ",
                1,
                &dump.origin_countries,
                |b, c| {
                    b.push_bind(c.iso_3166_1.clone());
                },
            )
            .await?,
            production_companies: insert_rows(
                conn,
                "INSERT INTO production_companies (tmdb_id, name, origin_country, logo_path) ",
                4,
                &dump.production_companies,
                |b, c| {
                    b.push_bind(c.tmdb_id)
                        .push_bind(c.name.clone())
                        .push_bind(c.origin_country.clone())
                        .push_bind(c.logo_path.clone());
                },
            )
            .await?,
            production_countries: insert_rows(
                conn,
                "INSERT INTO production_countries (iso_3166_1, name) ",
                2,
                &dump.production_countries,
                |b, c| {
                    b.push_bind(c.iso_3166_1.clone()).push_bind(c.name.clone());
                },
            )
            .await?,
            videos: insert_rows(
                conn,
                "INSERT INTO videos (video_id, key, name, site, size, type, official, published_at) ",
                8,
                &dump.videos,
                |b, v| {
                    b.push_bind(v.video_id.clone())
                        .push_bind(v.key.clone())
                        .push_bind(v.name.clone())
                        .push_bind(v.site.clone())
                        .push_bind(v.size)
                        .push_bind(v.video_type.clone())
                        .push_bind(v.official)
                        .push_bind(v.published_at);
                },
            )
            .await?,
            ..Default::default()
        };

        let movie_head = format!("INSERT INTO movies (id, {}) ", MOVIE_COLUMNS.join(", "));
        report.movies = insert_rows(conn, &movie_head, MOVIE_COLUMNS.len() + 1, &dump.movies, |b, m| {
            b.push_bind(m.id);
            push_movie_fields(b, m.fields.clone(), false);
        })
        .await?;
        // Explicit ids bypass the sequence; move it past them.
        sqlx::query("SELECT setval(pg_get_serial_sequence('movies', 'id'), GREATEST((SELECT MAX(id) FROM movies), 1))")
            .execute(&mut *conn)
            .await?;

        report.movie_genres = insert_rows(conn, "INSERT INTO movie_genres (movie_id, genre_id) ", 2, &dump.movie_genres, |b, (m, k)| {
            b.push_bind(*m).push_bind(*k);
        })
        .await?;
        report.movie_spoken_languages = insert_rows(
            conn,
            "INSERT INTO movie_spoken_languages (movie_id, iso_639_1) ",
            2,
            &dump.movie_spoken_languages,
            |b, (m, k)| {
                b.push_bind(*m).push_bind(k.clone());
            },
        )
        .await?;
        report.movie_origin_countries = insert_rows(
            conn,
            "INSERT INTO movie_origin_countries (movie_id, iso_3166_1) ",
            2,
            &dump.movie_origin_countries,
            |b, (m, k)| {
                b.push_bind(*m).push_bind(k.clone());
            },
        )
        .await?;
        report.movie_production_companies = insert_rows(
            conn,
            "INSERT INTO movie_production_companies (movie_id, company_id) ",
            2,
            &dump.movie_production_companies,
            |b, (m, k)| {
                b.push_bind(*m).push_bind(*k);
            },
        )
        .await?;
        report.movie_production_countries = insert_rows(
            conn,
            "INSERT INTO movie_production_countries (movie_id, iso_3166_1) ",
            2,
            &dump.movie_production_countries,
            |b, (m, k)| {
                b.push_bind(*m).push_bind(k.clone());
            },
        )
        .await?;
        report.movie_videos = insert_rows(conn, "INSERT INTO movie_videos (movie_id, video_id) ", 2, &dump.movie_videos, |b, (m, k)| {
            b.push_bind(*m).push_bind(k.clone());
        })
        .await?;
        tx.commit().await?;
        Ok(report)
    }
}
