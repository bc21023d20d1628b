//! Bulk loader: `movielog-import <dump.json> [--force]`.
//!
//! Loads a normalized dump into the Postgres database named by `DATABASE_URL`
//! in a single transaction. Skips the load when movies already exist unless
//! `--force` is given.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use movielog::bulk::{self, BulkOutcome};
use movielog::repo::pg::PgRepo;

struct Args {
    dump: PathBuf,
    force: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut dump = None;
    let mut force = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--force" | "-f" => force = true,
            flag if flag.starts_with('-') => bail!("unknown option {flag}"),
            path if dump.is_none() => dump = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {extra}"),
        }
    }
    let dump = dump.context("usage: movielog-import <dump.json> [--force]")?;
    Ok(Args { dump, force })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let args = parse_args()?;
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let repo = PgRepo::connect(&url).await.context("connecting to the database")?;
    repo.migrate().await.context("applying migrations")?;

    let dump = bulk::read_dump(&args.dump)
        .await
        .with_context(|| format!("loading {}", args.dump.display()))?;
    match bulk::run(&repo, &dump, args.force).await? {
        BulkOutcome::Skipped { existing } => {
            println!("{existing} movies already present; nothing imported (use --force to load anyway)");
        }
        BulkOutcome::Loaded(report) => {
            for (table, inserted) in report.lines() {
                println!("{table:<28} {inserted}");
            }
        }
    }
    Ok(())
}
