use crate::cli::{DEFAULT_CONFIG, ReverseArgs};
use crate::config::{EnvLookup, ProjectConfig, default_out_dir, process_env};
use crate::emit::{self, EmitOptions};
use crate::write::{WriteMode, sync_generated};
use std::path::{Path, PathBuf};
use tabua::{DEFAULT_SCHEMA, Filter, Reverser};
use tokio_postgres::NoTls;

#[derive(Debug)]
struct Settings {
    database_url: String,
    filter: Filter,
    emit: EmitOptions,
}

pub async fn run(args: ReverseArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let project = load_project(&args.config)?;
    let settings = resolve(&args, project.as_ref(), &process_env)?;

    let client = connect_db(&settings.database_url).await?;
    let tables = Reverser::new(&client)
        .run(&settings.filter)
        .await
        .map_err(|e| {
            if e.is_permission_denied() {
                anyhow::anyhow!(
                    "permission denied reading the catalog of schema {}: {e}",
                    settings.filter.schema
                )
            } else {
                anyhow::anyhow!("failed to reverse schema {}: {e}", settings.filter.schema)
            }
        })?;

    println!(
        "reversed {} table(s) from schema {}",
        tables.len(),
        settings.filter.schema
    );

    for t in &tables {
        for c in &t.columns {
            let (rust_type, recognized) = settings.emit.column_type(c);
            if !recognized {
                eprintln!(
                    "warning: {}.{}: unrecognized type {} ({}), using {rust_type}",
                    t.name, c.name, c.udt_name, c.data_type
                );
            }
        }
    }

    let files = emit::emit_all(&tables, &settings.emit)?;
    let mode = if args.dry_run {
        WriteMode::DryRun
    } else if args.check {
        WriteMode::Check
    } else {
        WriteMode::Write
    };
    sync_generated(&settings.emit.out_dir, &files, mode)?;
    Ok(())
}

/// Load the config file; a missing default file means "flags only".
fn load_project(path: &Path) -> anyhow::Result<Option<ProjectConfig>> {
    if path.exists() {
        return ProjectConfig::load(path).map(Some);
    }
    if path == Path::new(DEFAULT_CONFIG) {
        return Ok(None);
    }
    anyhow::bail!("config file not found: {}", path.display())
}

/// Flags win over the config file, which wins over `DATABASE_URL`.
///
/// The config's URL is expanded only when `--database` is absent.
fn resolve(
    args: &ReverseArgs,
    project: Option<&ProjectConfig>,
    env: EnvLookup<'_>,
) -> anyhow::Result<Settings> {
    let cfg = project.map(|p| &p.file);

    let database_url = match (&args.database, cfg) {
        (Some(url), _) => Some(url.clone()),
        (None, Some(c)) => Some(c.database.resolve_url(env)?),
        (None, None) => env("DATABASE_URL"),
    };
    let Some(database_url) = database_url.filter(|u| !u.trim().is_empty()) else {
        anyhow::bail!(
            "no database URL: pass --database, set DATABASE_URL, or create a config with `tabua init`"
        );
    };

    let schema = args
        .schema
        .clone()
        .or_else(|| cfg.map(|c| c.database.schema.clone()))
        .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());

    let tables = args.tables.clone().or_else(|| {
        cfg.map(|c| c.database.tables.clone())
            .filter(|t| !t.is_empty())
    });

    let mut filter = Filter::new(schema);
    if let Some(tables) = tables {
        filter = filter.with_tables(tables);
    }

    let out_dir: PathBuf = match (&args.out, project) {
        (Some(out), _) => out.clone(),
        (None, Some(p)) => p.resolve_path(&p.file.output.dir),
        (None, None) => PathBuf::from(default_out_dir()),
    };

    let mut emit = EmitOptions::new(out_dir);
    if let Some(c) = cfg {
        emit = emit
            .with_tabua_path(c.output.tabua_path.clone())
            .with_derives(c.output.derives.clone())
            .with_types(c.types.clone());
    }

    Ok(Settings {
        database_url,
        filter,
        emit,
    })
}

async fn connect_db(database_url: &str) -> anyhow::Result<tokio_postgres::Client> {
    let (client, connection) = tokio_postgres::connect(database_url, NoTls)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to database: {e}"))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("postgres connection error: {e}");
        }
    });
    Ok(client)
}
