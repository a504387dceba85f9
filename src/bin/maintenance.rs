use std::collections::HashSet;
use std::env;

use anyhow::{bail, Context, Result};
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use bidboard::{
    auth::password::hash_password, config::AppConfig, db, models::NewUser, s3,
    schema::{documents, users},
};

const USAGE: &str = "Usage:\n  maintenance create-user <username> <password> [role]\n  maintenance prune-files";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("create-user") => create_user(&args[1..])?,
        Some("prune-files") => prune_files().await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn create_user(args: &[String]) -> Result<()> {
    let (username, password, role) = match args {
        [username, password] => (username, password, "admin"),
        [username, password, role] => (username, password, role.as_str()),
        _ => bail!("{USAGE}"),
    };
    if username.trim().is_empty() || password.is_empty() {
        bail!("username and password must not be empty");
    }

    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let new_user = NewUser {
        id: Uuid::new_v4(),
        username: username.trim().to_string(),
        password_hash: hash_password(password)?,
        role: role.to_string(),
    };
    let inserted = diesel::insert_into(users::table)
        .values(&new_user)
        .on_conflict(users::username)
        .do_nothing()
        .execute(&mut conn)
        .context("failed to insert user")?;

    if inserted == 0 {
        bail!("user `{}` already exists", new_user.username);
    }
    println!("Created user {} ({}).", new_user.username, new_user.role);
    Ok(())
}

/// Deletes stored objects no document row points at and reports rows whose
/// bytes are gone.
async fn prune_files() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        storage_backend = ?config.storage_backend,
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let storage = s3::build_storage(&config).await?;

    let known: HashSet<String> = {
        let mut conn = pool.get().context("failed to get database connection")?;
        documents::table
            .select(documents::stored_name)
            .load::<String>(&mut conn)
            .context("failed to load documents")?
            .into_iter()
            .collect()
    };
    let stored: HashSet<String> = storage.list_objects().await?.into_iter().collect();

    let mut orphans: Vec<&String> = stored.difference(&known).collect();
    orphans.sort();
    let mut removed = 0usize;
    for key in &orphans {
        match storage.delete_object(key).await {
            Ok(()) => removed += 1,
            Err(err) => eprintln!("Failed to delete orphaned object {key}: {err:#}"),
        }
    }

    let mut missing: Vec<&String> = known.difference(&stored).collect();
    missing.sort();
    for key in &missing {
        println!("Document row without stored bytes: {key}");
    }

    println!(
        "Removed {removed} of {} orphaned objects; {} rows reference missing bytes.",
        orphans.len(),
        missing.len()
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
