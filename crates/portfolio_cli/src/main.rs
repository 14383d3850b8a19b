//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `portfolio_core` linkage.
//! - Open a database (file argument or in-memory) and print hierarchy counts.
//!
//! Usage: `portfolio_cli [DB_PATH]`. Logging is enabled when
//! `PORTFOLIO_LOG_DIR` is set.

use portfolio_core::db::migrations::{current_user_version, latest_version};
use portfolio_core::db::{open_db, open_db_in_memory};
use portfolio_core::{init_logging, LoggingConfig, SqliteHierarchyService};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("portfolio_cli error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Some(config) = LoggingConfig::from_env()? {
        init_logging(&config)?;
    }

    println!("portfolio_core ping={}", portfolio_core::ping());
    println!("portfolio_core version={}", portfolio_core::core_version());

    let conn = match std::env::args_os().nth(1) {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    println!(
        "schema version={} latest={}",
        current_user_version(&conn)?,
        latest_version()
    );

    let service = SqliteHierarchyService::sqlite(&conn)?;
    let portfolios = service.list_portfolios()?;
    let mut versions = 0;
    let mut pages = 0;
    for entry in &portfolios {
        versions += entry.versions.len();
        for version in &entry.versions {
            pages += service.list_pages(version.id)?.len();
        }
    }
    println!(
        "portfolios={} versions={} pages={}",
        portfolios.len(),
        versions,
        pages
    );
    log::info!(
        "event=cli_summary module=cli status=ok portfolios={} versions={} pages={}",
        portfolios.len(),
        versions,
        pages
    );
    Ok(())
}
