use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use tracing::{error, info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use movielog::config::AppConfig;
use movielog::openapi::ApiDoc;
use movielog::rate_limit::AuthThrottle;
use movielog::repo::Repo;
use movielog::{config, AppState, SecurityHeaders};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e}");
            eprintln!("Please copy .env.example to .env and configure it");
            std::process::exit(1);
        }
    };

    info!("Bootstrapping movielog server");
    info!(frontend_url = cfg.frontend_url.as_deref().unwrap_or("-"), hsts = cfg.enable_hsts, "configuration loaded");

    let repo = match build_repo(&cfg).await {
        Ok(repo) => repo,
        Err(e) => {
            error!("repository setup failed: {e:#}");
            std::process::exit(1);
        }
    };
    let state = AppState::new(repo).with_throttle(AuthThrottle::new(&cfg.throttle));

    let openapi = ApiDoc::openapi();
    info!("OpenAPI document generated");

    let frontend_url = cfg.frontend_url.clone();
    let enable_hsts = cfg.enable_hsts;
    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // during local dev allow React/Vite default ports
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if let Some(front) = frontend_url.as_deref() {
                c = c.allowed_origin(front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::new(enable_hsts))
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.bind_addr.as_str(), cfg.port))?;

    info!("Listening on http://{}:{}", cfg.bind_addr, cfg.port);

    server.run().await
}

/// Postgres when `DATABASE_URL` is set, otherwise the in-memory backend.
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    #[cfg(feature = "postgres-store")]
    if let Some(url) = cfg.database_url.as_deref() {
        let repo = movielog::repo::pg::PgRepo::connect(url).await?;
        if cfg.run_migrations {
            repo.migrate().await?;
            info!("database migrations applied");
        }
        info!("Using Postgres repository backend");
        return Ok(Arc::new(repo));
    }
    in_memory(cfg)
}

#[cfg(feature = "inmem-store")]
fn in_memory(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    if cfg.database_url.is_some() {
        warn!("DATABASE_URL ignored: built without the postgres-store feature");
    } else {
        warn!("DATABASE_URL not set; using the in-memory repository (data is lost on exit)");
    }
    Ok(Arc::new(movielog::repo::inmem::InMemRepo::new()))
}

#[cfg(not(feature = "inmem-store"))]
fn in_memory(_cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    anyhow::bail!("DATABASE_URL must be set")
}
