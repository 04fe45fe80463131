//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load `COURSEKIT_*` configuration, open the database and report its
//!   schema and course count for quick local sanity checks.

use coursekit_core::db::migrations::current_user_version;
use coursekit_core::{init_logging, open_db, open_db_in_memory, CoreConfig};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("coursekit: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = CoreConfig::from_env()?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let schema_version = current_user_version(&conn)?;
    let course_count: i64 = conn.query_row("SELECT COUNT(*) FROM courses;", [], |row| row.get(0))?;
    info!("event=cli_probe module=cli status=ok schema_version={schema_version} courses={course_count}");

    println!("coursekit_core ping={}", coursekit_core::ping());
    println!("coursekit_core version={}", coursekit_core::core_version());
    println!(
        "database={}",
        config
            .db_path
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    );
    println!("schema_version={schema_version}");
    println!("courses={course_count}");
    Ok(())
}
