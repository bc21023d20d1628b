use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::Role;
use crate::error::ApiErrorBody;
use crate::models::*;
use crate::routes::{catalog, collections, movies, reviews, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        movies::list_movies,
        movies::movie_stats,
        movies::get_movie,
        movies::create_movie,
        movies::replace_movie,
        movies::patch_movie,
        movies::delete_movie,
        movies::list_genres,
        movies::list_companies,
        movies::list_languages,
        movies::list_origin_countries,
        movies::list_production_countries,
        movies::list_videos,
        catalog::list_entries,
        catalog::create_entry,
        catalog::bookmark,
        catalog::mark_watched,
        catalog::add_to_watchlist,
        catalog::remove_movie,
        catalog::bookmarked,
        catalog::watched,
        catalog::want_to_watch,
        catalog::catalog_stats,
        catalog::get_entry,
        catalog::update_entry,
        catalog::delete_entry,
        collections::list_collections,
        collections::my_collections,
        collections::create_collection,
        collections::get_collection,
        collections::replace_collection,
        collections::update_collection,
        collections::delete_collection,
        collections::add_movie,
        collections::remove_movie,
        reviews::list_reviews,
        reviews::create_review,
        reviews::my_reviews,
        reviews::featured_reviews,
        reviews::get_review,
        reviews::replace_review,
        reviews::update_review,
        reviews::delete_review,
        reviews::publish_review,
        reviews::recount_review,
        reviews::moderation_list,
        reviews::moderation_pending,
        reviews::moderation_detail,
        reviews::feature_review,
        reviews::hide_review,
        reviews::restore_review,
        reviews::list_votes,
        reviews::create_vote,
        reviews::get_vote,
        reviews::update_vote,
        reviews::delete_vote,
        reviews::list_reports,
        reviews::create_report,
        reviews::pending_reports,
        reviews::get_report,
        reviews::delete_report,
        reviews::resolve_report,
        users::register,
        users::login,
        users::refresh,
        users::list_users,
        users::me,
        users::update_me,
        users::update_role,
    ),
    components(schemas(
        ApiErrorBody, crate::validation::FieldError,
        Genre, SpokenLanguage, OriginCountry, ProductionCompany, ProductionCountry, Video,
        MovieFields, Movie, MovieRelations, MovieInput, MoviePatch, MovieDetail, MovieSummary,
        MoviePage, MovieStats, GenreCount,
        CatalogStatus, CatalogEntry, CatalogEntryView, CatalogAction, NewCatalogEntryRequest,
        CatalogEntryUpdate, RemoveFromCatalog, CatalogStats,
        Collection, CollectionItem, CollectionItemView, CollectionView, NewCollectionRequest,
        CollectionUpdate, CollectionMovie, Message,
        ReviewStatus, Review, ReviewDetail, NewReviewRequest, ReviewUpdate, ReviewReplace,
        HideRequest, FeatureRequest, ReviewCounters,
        VoteType, ReviewVote, NewVoteRequest, VoteUpdate,
        ReportReason, ReviewReport, NewReportRequest, ResolveRequest,
        Role, User, RegisterRequest, RegisterResponse, LoginRequest, TokenPair, RefreshRequest,
        AccessToken, ProfileUpdate, RoleUpdateRequest, RoleUpdateResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "movies", description = "Movie catalogue and lookup tables"),
        (name = "catalog", description = "Personal catalog entries and collections"),
        (name = "reviews", description = "Reviews, votes, reports and moderation"),
        (name = "auth", description = "Registration, login and user administration"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_component_path() {
        let doc = ApiDoc::openapi();
        for path in ["/api/movies/{id}/", "/api/catalog/entries/bookmark/", "/api/moderation/{id}/hide/", "/api/auth/users/{id}/role/"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc.components.expect("components").security_schemes;
        assert!(schemes.contains_key("bearer_auth"));
    }
}
