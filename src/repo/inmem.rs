//! In-process backend. One `RwLock` guards the whole state; every operation
//! runs inside a single critical section, which gives it the same
//! all-or-nothing behaviour as a database transaction.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use super::*;

#[derive(Default)]
struct State {
    next_id: Id,
    movies: BTreeMap<Id, Movie>,
    genres: BTreeMap<i32, Genre>,
    spoken_languages: BTreeMap<String, SpokenLanguage>,
    origin_countries: BTreeMap<String, OriginCountry>,
    production_companies: BTreeMap<i32, ProductionCompany>,
    production_countries: BTreeMap<String, ProductionCountry>,
    videos: BTreeMap<String, Video>,
    movie_genres: BTreeSet<(Id, i32)>,
    movie_spoken_languages: BTreeSet<(Id, String)>,
    movie_origin_countries: BTreeSet<(Id, String)>,
    movie_production_companies: BTreeSet<(Id, i32)>,
    movie_production_countries: BTreeSet<(Id, String)>,
    movie_videos: BTreeSet<(Id, String)>,
    users: BTreeMap<Id, UserCredentials>,
    catalog: BTreeMap<Id, CatalogEntry>,
    collections: BTreeMap<Id, Collection>,
    // keyed by (collection, movie)
    collection_items: BTreeMap<(Id, Id), CollectionItem>,
    reviews: BTreeMap<Id, Review>,
    votes: BTreeMap<Id, ReviewVote>,
    reports: BTreeMap<Id, ReviewReport>,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn require_movie(&self, movie_id: Id) -> RepoResult<()> {
        if self.movies.contains_key(&movie_id) {
            Ok(())
        } else {
            Err(RepoError::invalid("movie_id", MSG_MOVIE_MISSING))
        }
    }

    fn live_review(&self, id: Id) -> Option<&Review> {
        self.reviews.get(&id).filter(|r| r.status != ReviewStatus::Deleted)
    }

    fn live_review_mut(&mut self, id: Id) -> RepoResult<&mut Review> {
        self.reviews
            .get_mut(&id)
            .filter(|r| r.status != ReviewStatus::Deleted)
            .ok_or(RepoError::NotFound)
    }

    fn genre_names(&self, movie_id: Id) -> Vec<String> {
        let mut names: Vec<String> = linked(&self.movie_genres, movie_id)
            .filter_map(|k| self.genres.get(k).map(|g| g.name.clone()))
            .collect();
        names.sort();
        names
    }

    fn summary(&self, movie: &Movie) -> MovieSummary {
        MovieSummary::from_movie(movie, self.genre_names(movie.id))
    }

    fn detail(&self, movie: &Movie) -> MovieDetail {
        let id = movie.id;
        let mut genres: Vec<Genre> = linked(&self.movie_genres, id).filter_map(|k| self.genres.get(k).cloned()).collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        let mut spoken_languages: Vec<SpokenLanguage> = linked(&self.movie_spoken_languages, id)
            .filter_map(|k| self.spoken_languages.get(k).cloned())
            .collect();
        spoken_languages.sort_by(|a, b| (&a.english_name, &a.name).cmp(&(&b.english_name, &b.name)));
        let origin_countries =
            linked(&self.movie_origin_countries, id).filter_map(|k| self.origin_countries.get(k).cloned()).collect();
        let mut production_companies: Vec<ProductionCompany> = linked(&self.movie_production_companies, id)
            .filter_map(|k| self.production_companies.get(k).cloned())
            .collect();
        production_companies.sort_by(|a, b| a.name.cmp(&b.name));
        let mut production_countries: Vec<ProductionCountry> = linked(&self.movie_production_countries, id)
            .filter_map(|k| self.production_countries.get(k).cloned())
            .collect();
        production_countries.sort_by(|a, b| a.name.cmp(&b.name));
        let mut videos: Vec<Video> = linked(&self.movie_videos, id).filter_map(|k| self.videos.get(k).cloned()).collect();
        videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        MovieDetail {
            movie: movie.clone(),
            genres,
            spoken_languages,
            origin_countries,
            production_companies,
            production_countries,
            videos,
        }
    }

    /// Check every key of every supplied relation before anything is written.
    fn check_relations(&self, rel: &MovieRelations) -> RepoResult<()> {
        if let Some(ids) = &rel.genre_ids {
            missing_keys("genre_ids", "genre", ids, &self.genres)?;
        }
        if let Some(codes) = &rel.spoken_language_codes {
            missing_keys("spoken_language_codes", "language", codes, &self.spoken_languages)?;
        }
        if let Some(codes) = &rel.origin_country_codes {
            missing_keys("origin_country_codes", "origin country", codes, &self.origin_countries)?;
        }
        if let Some(ids) = &rel.production_company_ids {
            missing_keys("production_company_ids", "production company", ids, &self.production_companies)?;
        }
        if let Some(codes) = &rel.production_country_codes {
            missing_keys("production_country_codes", "production country", codes, &self.production_countries)?;
        }
        if let Some(ids) = &rel.video_ids {
            missing_keys("video_ids", "video", ids, &self.videos)?;
        }
        Ok(())
    }

    fn replace_relations(&mut self, movie_id: Id, rel: MovieRelations) {
        if let Some(keys) = rel.genre_ids {
            replace_set(&mut self.movie_genres, movie_id, keys);
        }
        if let Some(keys) = rel.spoken_language_codes {
            replace_set(&mut self.movie_spoken_languages, movie_id, keys);
        }
        if let Some(keys) = rel.origin_country_codes {
            replace_set(&mut self.movie_origin_countries, movie_id, keys);
        }
        if let Some(keys) = rel.production_company_ids {
            replace_set(&mut self.movie_production_companies, movie_id, keys);
        }
        if let Some(keys) = rel.production_country_codes {
            replace_set(&mut self.movie_production_countries, movie_id, keys);
        }
        if let Some(keys) = rel.video_ids {
            replace_set(&mut self.movie_videos, movie_id, keys);
        }
    }

    fn collection_record(&self, c: &Collection) -> CollectionRecord {
        let mut items: Vec<CollectionItem> = self
            .collection_items
            .iter()
            .filter(|((cid, _), _)| *cid == c.id)
            .map(|(_, item)| item.clone())
            .collect();
        items.sort_by(|a, b| (a.order, a.added_at).cmp(&(b.order, b.added_at)));
        CollectionRecord { collection: c.clone(), items }
    }

    fn collection_name_taken(&self, user_id: Id, name: &str, except: Option<Id>) -> bool {
        self.collections
            .values()
            .any(|c| c.user_id == user_id && c.name == name && Some(c.id) != except)
    }

    fn recount(&mut self, review_id: Id) -> ReviewCounters {
        let helpful_count = self
            .votes
            .values()
            .filter(|v| v.review_id == review_id && v.vote_type == VoteType::Helpful)
            .count() as i64;
        let reported_count = self.reports.values().filter(|r| r.review_id == review_id).count() as i64;
        if let Some(r) = self.reviews.get_mut(&review_id) {
            r.helpful_count = helpful_count;
            r.reported_count = reported_count;
        }
        ReviewCounters { helpful_count, reported_count }
    }

    fn delete_movie_cascade(&mut self, id: Id) {
        self.movie_genres.retain(|(m, _)| *m != id);
        self.movie_spoken_languages.retain(|(m, _)| *m != id);
        self.movie_origin_countries.retain(|(m, _)| *m != id);
        self.movie_production_companies.retain(|(m, _)| *m != id);
        self.movie_production_countries.retain(|(m, _)| *m != id);
        self.movie_videos.retain(|(m, _)| *m != id);
        self.catalog.retain(|_, e| e.movie_id != id);
        self.collection_items.retain(|(_, m), _| *m != id);
        let gone: BTreeSet<Id> = self.reviews.values().filter(|r| r.movie_id == id).map(|r| r.id).collect();
        self.reviews.retain(|rid, _| !gone.contains(rid));
        self.votes.retain(|_, v| !gone.contains(&v.review_id));
        self.reports.retain(|_, r| !gone.contains(&r.review_id));
    }
}

fn linked<K>(set: &BTreeSet<(Id, K)>, movie_id: Id) -> impl Iterator<Item = &K> {
    set.iter().filter(move |(m, _)| *m == movie_id).map(|(_, k)| k)
}

fn replace_set<K: Ord>(set: &mut BTreeSet<(Id, K)>, movie_id: Id, keys: Vec<K>) {
    set.retain(|(m, _)| *m != movie_id);
    set.extend(keys.into_iter().map(|k| (movie_id, k)));
}

fn missing_keys<K: Ord + Display, V>(field: &str, label: &str, keys: &[K], table: &BTreeMap<K, V>) -> RepoResult<()> {
    let missing: Vec<String> = keys.iter().filter(|k| !table.contains_key(k)).map(|k| k.to_string()).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RepoError::invalid(field, format!("Unknown {label} key(s): {}.", missing.join(", "))))
    }
}

/// Compare two optional values with NULLs sorting last in either direction.
fn nulls_last<T: PartialOrd>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let o = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if descending {
                o.reverse()
            } else {
                o
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn movie_order(ordering: MovieOrdering, a: &Movie, b: &Movie) -> Ordering {
    let (fa, fb, desc) = (&a.fields, &b.fields, ordering.descending);
    let primary = match ordering.key {
        MovieSortKey::Title => nulls_last(Some(&fa.title), Some(&fb.title), desc),
        MovieSortKey::ReleaseDate => nulls_last(fa.release_date, fb.release_date, desc),
        MovieSortKey::VoteAverage => nulls_last(fa.vote_average, fb.vote_average, desc),
        MovieSortKey::Popularity => nulls_last(fa.popularity, fb.popularity, desc),
        MovieSortKey::CreatedAt => nulls_last(Some(a.created_at), Some(b.created_at), desc),
    };
    primary.then_with(|| b.id.cmp(&a.id))
}

fn review_order(ordering: ReviewOrdering, a: &Review, b: &Review) -> Ordering {
    let newest = |a: &Review, b: &Review| nulls_last(a.published_at, b.published_at, true);
    let primary = match ordering {
        ReviewOrdering::Newest => newest(a, b).then_with(|| b.created_at.cmp(&a.created_at)),
        ReviewOrdering::Helpful => b.helpful_count.cmp(&a.helpful_count).then_with(|| newest(a, b)),
        ReviewOrdering::Rating => nulls_last(Some(a.rating), Some(b.rating), true).then_with(|| newest(a, b)),
        ReviewOrdering::MostReported => {
            b.reported_count.cmp(&a.reported_count).then_with(|| b.created_at.cmp(&a.created_at))
        }
    };
    primary.then_with(|| b.id.cmp(&a.id))
}

fn contains_ci(haystack: Option<&str>, needle_lower: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle_lower))
}

fn avg(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
}

impl InMemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[async_trait]
impl MovieRepo for InMemRepo {
    async fn list_movies(&self, q: &MovieQuery) -> RepoResult<Page<MovieSummary>> {
        let s = self.read()?;
        let search = q.search.as_ref().map(|v| v.to_lowercase());
        let genre = q.genre.as_ref().map(|v| v.to_lowercase());
        let mut hits: Vec<&Movie> = s
            .movies
            .values()
            .filter(|m| {
                let f = &m.fields;
                search.as_deref().map_or(true, |needle| {
                    contains_ci(Some(&f.title), needle)
                        || contains_ci(Some(&f.original_title), needle)
                        || contains_ci(f.overview.as_deref(), needle)
                })
            })
            .filter(|m| {
                genre.as_deref().map_or(true, |needle| {
                    linked(&s.movie_genres, m.id)
                        .filter_map(|k| s.genres.get(k))
                        .any(|g| g.name.to_lowercase().contains(needle))
                })
            })
            .filter(|m| q.year.map_or(true, |y| m.fields.release_date.is_some_and(|d| d.year() == y)))
            .filter(|m| q.min_rating.map_or(true, |min| m.fields.vote_average.is_some_and(|v| v >= min)))
            .collect();
        hits.sort_by(|a, b| movie_order(q.ordering, a, b));
        let count = hits.len() as i64;
        let results = hits
            .into_iter()
            .skip(q.offset() as usize)
            .take(q.page_size as usize)
            .map(|m| s.summary(m))
            .collect();
        Ok(Page::new(results, count, q.page, q.page_size))
    }

    async fn get_movie(&self, id: Id) -> RepoResult<MovieDetail> {
        let s = self.read()?;
        let movie = s.movies.get(&id).ok_or(RepoError::NotFound)?;
        Ok(s.detail(movie))
    }

    async fn movie_summaries(&self, ids: &[Id]) -> RepoResult<Vec<MovieSummary>> {
        let s = self.read()?;
        let wanted: BTreeSet<Id> = ids.iter().copied().collect();
        Ok(wanted.into_iter().filter_map(|id| s.movies.get(&id)).map(|m| s.summary(m)).collect())
    }

    async fn create_movie(&self, input: MovieInput) -> RepoResult<MovieDetail> {
        let mut s = self.write()?;
        s.check_relations(&input.relations)?;
        let id = s.next_id();
        let ts = now();
        let movie = Movie { id, fields: input.fields, created_at: ts, updated_at: ts };
        s.movies.insert(id, movie.clone());
        s.replace_relations(id, input.relations);
        Ok(s.detail(&movie))
    }

    async fn update_movie(&self, id: Id, change: MovieChange, relations: MovieRelations) -> RepoResult<MovieDetail> {
        let mut s = self.write()?;
        let current = s.movies.get(&id).ok_or(RepoError::NotFound)?.fields.clone();
        s.check_relations(&relations)?;
        let fields = change.apply_to(current);
        let movie = {
            let m = s.movies.get_mut(&id).ok_or(RepoError::NotFound)?;
            m.fields = fields;
            m.updated_at = now();
            m.clone()
        };
        s.replace_relations(id, relations);
        Ok(s.detail(&movie))
    }

    async fn delete_movie(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        s.movies.remove(&id).ok_or(RepoError::NotFound)?;
        s.delete_movie_cascade(id);
        Ok(())
    }

    async fn movie_stats(&self) -> RepoResult<MovieStats> {
        let s = self.read()?;
        let movies = || s.movies.values().map(|m| &m.fields);
        let ratings = || movies().filter_map(|f| f.vote_average);
        let mut top_genres: Vec<GenreCount> = s
            .genres
            .values()
            .map(|g| GenreCount {
                genre: g.name.clone(),
                count: s.movie_genres.iter().filter(|(_, k)| *k == g.tmdb_id).count() as i64,
            })
            .collect();
        top_genres.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.genre.cmp(&b.genre)));
        top_genres.truncate(10);
        Ok(MovieStats {
            total_movies: s.movies.len() as i64,
            avg_rating: avg(ratings()),
            highest_rating: ratings().fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v)))),
            lowest_rating: ratings().fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v)))),
            avg_runtime: avg(movies().filter_map(|f| f.runtime).map(f64::from)),
            latest_release: movies().filter_map(|f| f.release_date).max(),
            earliest_release: movies().filter_map(|f| f.release_date).min(),
            top_genres,
        })
    }
}

#[async_trait]
impl LookupRepo for InMemRepo {
    async fn list_genres(&self) -> RepoResult<Vec<Genre>> {
        let mut v: Vec<Genre> = self.read()?.genres.values().cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(v)
    }

    async fn list_spoken_languages(&self) -> RepoResult<Vec<SpokenLanguage>> {
        let mut v: Vec<SpokenLanguage> = self.read()?.spoken_languages.values().cloned().collect();
        v.sort_by(|a, b| (&a.english_name, &a.name).cmp(&(&b.english_name, &b.name)));
        Ok(v)
    }

    async fn list_origin_countries(&self) -> RepoResult<Vec<OriginCountry>> {
        Ok(self.read()?.origin_countries.values().cloned().collect())
    }

    async fn list_production_companies(&self) -> RepoResult<Vec<ProductionCompany>> {
        let mut v: Vec<ProductionCompany> = self.read()?.production_companies.values().cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(v)
    }

    async fn list_production_countries(&self) -> RepoResult<Vec<ProductionCountry>> {
        let mut v: Vec<ProductionCountry> = self.read()?.production_countries.values().cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(v)
    }

    async fn list_videos(&self) -> RepoResult<Vec<Video>> {
        let mut v: Vec<Video> = self.read()?.videos.values().cloned().collect();
        v.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(v)
    }
}

#[async_trait]
impl UserRepo for InMemRepo {
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let mut s = self.write()?;
        if s.users.values().any(|u| u.user.email == new.email) {
            return Err(RepoError::Conflict(MSG_DUPLICATE_EMAIL.into()));
        }
        if s.users.values().any(|u| u.user.username == new.username) {
            return Err(RepoError::Conflict(MSG_DUPLICATE_USERNAME.into()));
        }
        let id = s.next_id();
        let user = User {
            id,
            username: new.username,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            role: new.role,
            date_joined: now(),
        };
        s.users.insert(id, UserCredentials { user: user.clone(), password_hash: new.password_hash });
        Ok(user)
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        Ok(self.read()?.users.values().find(|u| u.user.email == email).cloned())
    }

    async fn get_user(&self, id: Id) -> RepoResult<User> {
        self.read()?.users.get(&id).map(|u| u.user.clone()).ok_or(RepoError::NotFound)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.read()?.users.values().map(|u| u.user.clone()).collect())
    }

    async fn update_profile(&self, id: Id, upd: ProfileUpdate) -> RepoResult<User> {
        let mut s = self.write()?;
        if let Some(ref name) = upd.username {
            if s.users.values().any(|u| u.user.username == *name && u.user.id != id) {
                return Err(RepoError::Conflict(MSG_DUPLICATE_USERNAME.into()));
            }
        }
        let creds = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(v) = upd.username {
            creds.user.username = v;
        }
        if let Some(v) = upd.first_name {
            creds.user.first_name = v;
        }
        if let Some(v) = upd.last_name {
            creds.user.last_name = v;
        }
        Ok(creds.user.clone())
    }

    async fn set_role(&self, id: Id, role: Role) -> RepoResult<(Role, User)> {
        let mut s = self.write()?;
        let creds = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        let old = std::mem::replace(&mut creds.user.role, role);
        Ok((old, creds.user.clone()))
    }
}

#[async_trait]
impl CatalogRepo for InMemRepo {
    async fn upsert_catalog_entry(&self, new: NewCatalogEntry) -> RepoResult<Upserted<CatalogEntry>> {
        let mut s = self.write()?;
        s.require_movie(new.movie_id)?;
        let ts = now();
        let watched_at = (new.status == CatalogStatus::Watched).then_some(ts);
        let existing = s
            .catalog
            .values_mut()
            .find(|e| e.user_id == new.user_id && e.movie_id == new.movie_id && e.status == new.status);
        if let Some(e) = existing {
            e.notes = new.notes;
            if new.personal_rating.is_some() {
                e.personal_rating = new.personal_rating;
            }
            if watched_at.is_some() {
                e.watched_at = watched_at;
            }
            return Ok(Upserted { value: e.clone(), created: false });
        }
        let id = s.next_id();
        let entry = CatalogEntry {
            id,
            user_id: new.user_id,
            movie_id: new.movie_id,
            status: new.status,
            notes: new.notes,
            personal_rating: new.personal_rating,
            added_at: ts,
            watched_at,
        };
        s.catalog.insert(id, entry.clone());
        Ok(Upserted { value: entry, created: true })
    }

    async fn create_catalog_entry(&self, new: NewCatalogEntry) -> RepoResult<CatalogEntry> {
        let mut s = self.write()?;
        s.require_movie(new.movie_id)?;
        if s.catalog.values().any(|e| e.user_id == new.user_id && e.movie_id == new.movie_id && e.status == new.status) {
            return Err(RepoError::Conflict(MSG_DUPLICATE_CATALOG_ENTRY.into()));
        }
        let id = s.next_id();
        let ts = now();
        let entry = CatalogEntry {
            id,
            user_id: new.user_id,
            movie_id: new.movie_id,
            status: new.status,
            notes: new.notes,
            personal_rating: new.personal_rating,
            added_at: ts,
            watched_at: (new.status == CatalogStatus::Watched).then_some(ts),
        };
        s.catalog.insert(id, entry.clone());
        Ok(entry)
    }

    async fn list_catalog_entries(&self, user_id: Id, status: Option<CatalogStatus>) -> RepoResult<Vec<CatalogEntry>> {
        let s = self.read()?;
        let mut v: Vec<CatalogEntry> = s
            .catalog
            .values()
            .filter(|e| e.user_id == user_id && status.map_or(true, |st| e.status == st))
            .cloned()
            .collect();
        v.sort_by(|a, b| b.added_at.cmp(&a.added_at).then_with(|| b.id.cmp(&a.id)));
        Ok(v)
    }

    async fn get_catalog_entry(&self, user_id: Id, id: Id) -> RepoResult<CatalogEntry> {
        let s = self.read()?;
        s.catalog.get(&id).filter(|e| e.user_id == user_id).cloned().ok_or(RepoError::NotFound)
    }

    async fn update_catalog_entry(&self, user_id: Id, id: Id, upd: CatalogEntryUpdate) -> RepoResult<CatalogEntry> {
        let mut s = self.write()?;
        let e = s.catalog.get_mut(&id).filter(|e| e.user_id == user_id).ok_or(RepoError::NotFound)?;
        if let Some(notes) = upd.notes {
            e.notes = notes;
        }
        if upd.personal_rating.is_some() {
            e.personal_rating = upd.personal_rating;
        }
        Ok(e.clone())
    }

    async fn delete_catalog_entry(&self, user_id: Id, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        match s.catalog.get(&id) {
            Some(e) if e.user_id == user_id => {
                s.catalog.remove(&id);
                Ok(())
            }
            _ => Err(RepoError::NotFound),
        }
    }

    async fn remove_from_catalog(&self, user_id: Id, movie_id: Id) -> RepoResult<u64> {
        let mut s = self.write()?;
        let before = s.catalog.len();
        s.catalog.retain(|_, e| !(e.user_id == user_id && e.movie_id == movie_id));
        let removed = (before - s.catalog.len()) as u64;
        if removed == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(removed)
    }

    async fn catalog_stats(&self, user_id: Id) -> RepoResult<CatalogStats> {
        let s = self.read()?;
        let mine: Vec<&CatalogEntry> = s.catalog.values().filter(|e| e.user_id == user_id).collect();
        let count = |st: CatalogStatus| mine.iter().filter(|e| e.status == st).count() as i64;
        let rated: Vec<f64> = mine
            .iter()
            .filter(|e| e.status == CatalogStatus::Watched)
            .filter_map(|e| e.personal_rating)
            .collect();
        Ok(CatalogStats {
            total_movies: mine.iter().map(|e| e.movie_id).collect::<BTreeSet<_>>().len() as i64,
            bookmarked: count(CatalogStatus::Bookmarked),
            watched: count(CatalogStatus::Watched),
            want_to_watch: count(CatalogStatus::WantToWatch),
            avg_personal_rating: avg(rated.iter().copied()),
            total_rated: rated.len() as i64,
        })
    }
}

#[async_trait]
impl CollectionRepo for InMemRepo {
    async fn create_collection(&self, new: NewCollection) -> RepoResult<CollectionRecord> {
        let mut s = self.write()?;
        if s.collection_name_taken(new.user_id, &new.name, None) {
            return Err(RepoError::Conflict(MSG_DUPLICATE_COLLECTION.into()));
        }
        let id = s.next_id();
        let ts = now();
        let c = Collection {
            id,
            user_id: new.user_id,
            name: new.name,
            description: new.description,
            is_public: new.is_public,
            created_at: ts,
            updated_at: ts,
        };
        s.collections.insert(id, c.clone());
        Ok(CollectionRecord { collection: c, items: Vec::new() })
    }

    async fn list_visible_collections(&self, viewer: Id) -> RepoResult<Vec<CollectionRecord>> {
        let s = self.read()?;
        let mut v: Vec<&Collection> = s.collections.values().filter(|c| c.user_id == viewer || c.is_public).collect();
        v.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
        Ok(v.into_iter().map(|c| s.collection_record(c)).collect())
    }

    async fn list_own_collections(&self, owner: Id) -> RepoResult<Vec<CollectionRecord>> {
        let s = self.read()?;
        let mut v: Vec<&Collection> = s.collections.values().filter(|c| c.user_id == owner).collect();
        v.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
        Ok(v.into_iter().map(|c| s.collection_record(c)).collect())
    }

    async fn get_collection(&self, id: Id) -> RepoResult<CollectionRecord> {
        let s = self.read()?;
        let c = s.collections.get(&id).ok_or(RepoError::NotFound)?;
        Ok(s.collection_record(c))
    }

    async fn update_collection(&self, id: Id, upd: CollectionUpdate) -> RepoResult<CollectionRecord> {
        let mut s = self.write()?;
        let owner = s.collections.get(&id).ok_or(RepoError::NotFound)?.user_id;
        if let Some(ref name) = upd.name {
            if s.collection_name_taken(owner, name, Some(id)) {
                return Err(RepoError::Conflict(MSG_DUPLICATE_COLLECTION.into()));
            }
        }
        let c = s.collections.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(v) = upd.name {
            c.name = v;
        }
        if let Some(v) = upd.description {
            c.description = v;
        }
        if let Some(v) = upd.is_public {
            c.is_public = v;
        }
        c.updated_at = now();
        let c = c.clone();
        Ok(s.collection_record(&c))
    }

    async fn delete_collection(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        s.collections.remove(&id).ok_or(RepoError::NotFound)?;
        s.collection_items.retain(|(cid, _), _| *cid != id);
        Ok(())
    }

    async fn add_to_collection(&self, id: Id, movie_id: Id) -> RepoResult<CollectionItem> {
        let mut s = self.write()?;
        if !s.collections.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        s.require_movie(movie_id)?;
        if s.collection_items.contains_key(&(id, movie_id)) {
            return Err(RepoError::Conflict(MSG_DUPLICATE_ITEM.into()));
        }
        let order = s.collection_items.keys().filter(|(cid, _)| *cid == id).count() as i32;
        let ts = now();
        let item = CollectionItem { movie_id, order, added_at: ts };
        s.collection_items.insert((id, movie_id), item.clone());
        if let Some(c) = s.collections.get_mut(&id) {
            c.updated_at = ts;
        }
        Ok(item)
    }

    async fn remove_from_collection(&self, id: Id, movie_id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        if !s.collections.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        s.collection_items.remove(&(id, movie_id)).ok_or(RepoError::NotFound)?;
        if let Some(c) = s.collections.get_mut(&id) {
            c.updated_at = now();
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewRepo for InMemRepo {
    async fn create_review(&self, new: NewReview) -> RepoResult<Review> {
        let mut s = self.write()?;
        s.require_movie(new.movie_id)?;
        if s
            .reviews
            .values()
            .any(|r| r.user_id == new.user_id && r.movie_id == new.movie_id && r.status != ReviewStatus::Deleted)
        {
            return Err(RepoError::Conflict(MSG_DUPLICATE_REVIEW.into()));
        }
        let id = s.next_id();
        let ts = now();
        let review = Review {
            id,
            user_id: new.user_id,
            movie_id: new.movie_id,
            title: new.title,
            content: new.content,
            rating: new.rating,
            status: new.status,
            created_at: ts,
            updated_at: ts,
            published_at: (new.status == ReviewStatus::Published).then_some(ts),
            is_featured: false,
            moderated_by: None,
            moderation_notes: String::new(),
            helpful_count: 0,
            reported_count: 0,
        };
        s.reviews.insert(id, review.clone());
        Ok(review)
    }

    async fn get_review(&self, id: Id) -> RepoResult<Review> {
        self.read()?.live_review(id).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_reviews(&self, filter: &ReviewFilter) -> RepoResult<Vec<Review>> {
        let s = self.read()?;
        let mut v: Vec<Review> = s.reviews.values().filter(|r| filter.matches(r)).cloned().collect();
        v.sort_by(|a, b| review_order(filter.ordering, a, b));
        Ok(v)
    }

    async fn update_review(&self, id: Id, upd: ReviewUpdate) -> RepoResult<Review> {
        let mut s = self.write()?;
        let r = s.live_review_mut(id)?;
        if let Some(to) = upd.status {
            r.status.check_author_transition(to)?;
        }
        let ts = now();
        if let Some(v) = upd.title {
            r.title = v;
        }
        if let Some(v) = upd.content {
            r.content = v;
        }
        if let Some(v) = upd.rating {
            r.rating = v;
        }
        if let Some(to) = upd.status {
            r.status = to;
            if to == ReviewStatus::Published && r.published_at.is_none() {
                r.published_at = Some(ts);
            }
        }
        r.updated_at = ts;
        Ok(r.clone())
    }

    async fn publish_review(&self, id: Id) -> RepoResult<Review> {
        let mut s = self.write()?;
        let r = s.live_review_mut(id)?;
        r.status.check_publish()?;
        let ts = now();
        r.status = ReviewStatus::Published;
        r.published_at.get_or_insert(ts);
        r.updated_at = ts;
        Ok(r.clone())
    }

    async fn hide_review(&self, id: Id, moderator: Id, notes: String) -> RepoResult<Review> {
        let mut s = self.write()?;
        let r = s.live_review_mut(id)?;
        r.status = ReviewStatus::Hidden;
        r.moderated_by = Some(moderator);
        r.moderation_notes = notes;
        r.updated_at = now();
        Ok(r.clone())
    }

    async fn restore_review(&self, id: Id, moderator: Id) -> RepoResult<Review> {
        let mut s = self.write()?;
        let r = s.live_review_mut(id)?;
        r.status.check_restore()?;
        let ts = now();
        // a review hidden while still a draft gets its first publish stamp here
        r.published_at.get_or_insert(ts);
        r.status = ReviewStatus::Published;
        r.moderated_by = Some(moderator);
        r.updated_at = ts;
        Ok(r.clone())
    }

    async fn feature_review(&self, id: Id, moderator: Id, featured: bool) -> RepoResult<Review> {
        let mut s = self.write()?;
        let r = s.live_review_mut(id)?;
        r.is_featured = featured;
        r.moderated_by = Some(moderator);
        r.updated_at = now();
        Ok(r.clone())
    }

    async fn delete_review(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        let r = s.live_review_mut(id)?;
        r.status = ReviewStatus::Deleted;
        r.updated_at = now();
        Ok(())
    }

    async fn recount_review(&self, id: Id) -> RepoResult<ReviewCounters> {
        let mut s = self.write()?;
        s.live_review_mut(id)?;
        Ok(s.recount(id))
    }
}

#[async_trait]
impl VoteRepo for InMemRepo {
    async fn upsert_vote(&self, user_id: Id, review_id: Id, vote_type: VoteType) -> RepoResult<Upserted<ReviewVote>> {
        let mut s = self.write()?;
        check_votable(s.reviews.get(&review_id), user_id)?;
        let existing = s.votes.values_mut().find(|v| v.user_id == user_id && v.review_id == review_id);
        let upserted = match existing {
            Some(v) => {
                v.vote_type = vote_type;
                Upserted { value: v.clone(), created: false }
            }
            None => {
                let id = s.next_id();
                let vote = ReviewVote { id, user_id, review_id, vote_type, created_at: now() };
                s.votes.insert(id, vote.clone());
                Upserted { value: vote, created: true }
            }
        };
        s.recount(review_id);
        Ok(upserted)
    }

    async fn list_votes(&self, user_id: Id) -> RepoResult<Vec<ReviewVote>> {
        let s = self.read()?;
        let mut v: Vec<ReviewVote> = s.votes.values().filter(|v| v.user_id == user_id).cloned().collect();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(v)
    }

    async fn get_vote(&self, user_id: Id, id: Id) -> RepoResult<ReviewVote> {
        let s = self.read()?;
        s.votes.get(&id).filter(|v| v.user_id == user_id).cloned().ok_or(RepoError::NotFound)
    }

    async fn update_vote(&self, user_id: Id, id: Id, vote_type: VoteType) -> RepoResult<ReviewVote> {
        let mut s = self.write()?;
        let review_id = s.votes.get(&id).filter(|v| v.user_id == user_id).ok_or(RepoError::NotFound)?.review_id;
        check_votable(s.reviews.get(&review_id), user_id)?;
        let vote = {
            let v = s.votes.get_mut(&id).ok_or(RepoError::NotFound)?;
            v.vote_type = vote_type;
            v.clone()
        };
        s.recount(review_id);
        Ok(vote)
    }

    async fn delete_vote(&self, user_id: Id, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        let review_id = s.votes.get(&id).filter(|v| v.user_id == user_id).ok_or(RepoError::NotFound)?.review_id;
        s.votes.remove(&id);
        s.recount(review_id);
        Ok(())
    }

    async fn votes_on(&self, user_id: Id, review_ids: &[Id]) -> RepoResult<Vec<ReviewVote>> {
        let s = self.read()?;
        Ok(s.votes
            .values()
            .filter(|v| v.user_id == user_id && review_ids.contains(&v.review_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportRepo for InMemRepo {
    async fn create_report(&self, new: NewReport) -> RepoResult<ReviewReport> {
        let mut s = self.write()?;
        check_reportable(s.reviews.get(&new.review_id), new.user_id)?;
        if s.reports.values().any(|r| r.user_id == new.user_id && r.review_id == new.review_id) {
            return Err(RepoError::Conflict(MSG_DUPLICATE_REPORT.into()));
        }
        let id = s.next_id();
        let report = ReviewReport {
            id,
            user_id: new.user_id,
            review_id: new.review_id,
            reason: new.reason,
            description: new.description,
            created_at: now(),
            resolved: false,
            resolved_by: None,
            resolved_at: None,
            resolution_notes: String::new(),
        };
        s.reports.insert(id, report.clone());
        s.recount(new.review_id);
        Ok(report)
    }

    async fn list_reports(&self, reporter: Option<Id>, unresolved_only: bool) -> RepoResult<Vec<ReviewReport>> {
        let s = self.read()?;
        let mut v: Vec<ReviewReport> = s
            .reports
            .values()
            .filter(|r| reporter.map_or(true, |u| r.user_id == u) && !(unresolved_only && r.resolved))
            .cloned()
            .collect();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(v)
    }

    async fn get_report(&self, id: Id) -> RepoResult<ReviewReport> {
        self.read()?.reports.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn resolve_report(&self, id: Id, moderator: Id, req: ResolveRequest) -> RepoResult<ReviewReport> {
        let mut s = self.write()?;
        let r = s.reports.get_mut(&id).ok_or(RepoError::NotFound)?;
        if req.resolved && !r.resolved {
            r.resolved_by = Some(moderator);
            r.resolved_at = Some(now());
        }
        r.resolved = req.resolved;
        r.resolution_notes = req.resolution_notes;
        Ok(r.clone())
    }

    async fn delete_report(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        let report = s.reports.remove(&id).ok_or(RepoError::NotFound)?;
        s.recount(report.review_id);
        Ok(())
    }
}

fn insert_new<K: Ord + Clone, V: Clone>(table: &mut BTreeMap<K, V>, rows: impl Iterator<Item = (K, V)>) -> u64 {
    let mut n = 0;
    for (k, v) in rows {
        if !table.contains_key(&k) {
            table.insert(k, v);
            n += 1;
        }
    }
    n
}

fn check_pairs<K: Ord + Display>(
    field: &str,
    pairs: &[(Id, K)],
    movies: &BTreeSet<Id>,
    keys: &BTreeSet<&K>,
) -> RepoResult<()> {
    for (m, k) in pairs {
        if !movies.contains(m) {
            return Err(RepoError::invalid(field, format!("movie {m} does not exist")));
        }
        if !keys.contains(k) {
            return Err(RepoError::invalid(field, format!("key {k} does not exist")));
        }
    }
    Ok(())
}

fn insert_pairs<K: Ord + Clone>(set: &mut BTreeSet<(Id, K)>, pairs: &[(Id, K)]) -> u64 {
    pairs.iter().filter(|p| set.insert((*p).clone())).count() as u64
}

#[async_trait]
impl BulkLoadRepo for InMemRepo {
    async fn movie_count(&self) -> RepoResult<i64> {
        Ok(self.read()?.movies.len() as i64)
    }

    async fn bulk_load(&self, dump: &BulkDump) -> RepoResult<BulkLoadReport> {
        let mut s = self.write()?;

        // Validate every association against the union of stored and incoming rows first.
        let movies: BTreeSet<Id> = s.movies.keys().copied().chain(dump.movies.iter().map(|m| m.id)).collect();
        let genres: BTreeSet<&i32> = s.genres.keys().chain(dump.genres.iter().map(|g| &g.tmdb_id)).collect();
        let langs: BTreeSet<&String> =
            s.spoken_languages.keys().chain(dump.spoken_languages.iter().map(|l| &l.iso_639_1)).collect();
        let origins: BTreeSet<&String> =
            s.origin_countries.keys().chain(dump.origin_countries.iter().map(|c| &c.iso_3166_1)).collect();
        let companies: BTreeSet<&i32> =
            s.production_companies.keys().chain(dump.production_companies.iter().map(|c| &c.tmdb_id)).collect();
        let countries: BTreeSet<&String> =
            s.production_countries.keys().chain(dump.production_countries.iter().map(|c| &c.iso_3166_1)).collect();
        let videos: BTreeSet<&String> = s.videos.keys().chain(dump.videos.iter().map(|v| &v.video_id)).collect();
        check_pairs("movie_genres", &dump.movie_genres, &movies, &genres)?;
        check_pairs("movie_spoken_languages", &dump.movie_spoken_languages, &movies, &langs)?;
        check_pairs("movie_origin_countries", &dump.movie_origin_countries, &movies, &origins)?;
        check_pairs("movie_production_companies", &dump.movie_production_companies, &movies, &companies)?;
        check_pairs("movie_production_countries", &dump.movie_production_countries, &movies, &countries)?;
        check_pairs("movie_videos", &dump.movie_videos, &movies, &videos)?;

        let st = &mut *s;
        let mut report = BulkLoadReport {
            genres: insert_new(&mut st.genres, dump.genres.iter().map(|g| (g.tmdb_id, g.clone()))),
            spoken_languages: insert_new(
                &mut st.spoken_languages,
                dump.spoken_languages.iter().map(|l| (l.iso_639_1.clone(), l.clone())),
            ),
            origin_countries: insert_new(
                &mut st.origin_countries,
                dump.origin_countries.iter().map(|c| (c.iso_3166_1.clone(), c.clone())),
            ),
            production_companies: insert_new(
                &mut st.production_companies,
                dump.production_companies.iter().map(|c| (c.tmdb_id, c.clone())),
            ),
            production_countries: insert_new(
                &mut st.production_countries,
                dump.production_countries.iter().map(|c| (c.iso_3166_1.clone(), c.clone())),
            ),
            videos: insert_new(&mut st.videos, dump.videos.iter().map(|v| (v.video_id.clone(), v.clone()))),
            ..Default::default()
        };
        let ts = now();
        report.movies = insert_new(
            &mut st.movies,
            dump.movies
                .iter()
                .map(|m| (m.id, Movie { id: m.id, fields: m.fields.clone(), created_at: ts, updated_at: ts })),
        );
        if let Some(max) = st.movies.keys().next_back() {
            st.next_id = st.next_id.max(*max);
        }
        report.movie_genres = insert_pairs(&mut st.movie_genres, &dump.movie_genres);
        report.movie_spoken_languages = insert_pairs(&mut st.movie_spoken_languages, &dump.movie_spoken_languages);
        report.movie_origin_countries = insert_pairs(&mut st.movie_origin_countries, &dump.movie_origin_countries);
        report.movie_production_companies =
            insert_pairs(&mut st.movie_production_companies, &dump.movie_production_companies);
        report.movie_production_countries =
            insert_pairs(&mut st.movie_production_countries, &dump.movie_production_countries);
        report.movie_videos = insert_pairs(&mut st.movie_videos, &dump.movie_videos);
        Ok(report)
    }
}
