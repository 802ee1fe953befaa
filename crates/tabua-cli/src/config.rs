use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let raw = std::fs::read_to_string(config_path).map_err(|e| {
            anyhow::anyhow!(
                "failed to read config file {}: {e}",
                config_path.display()
            )
        })?;

        Ok(Self {
            config_dir,
            file: ConfigFile::parse(&raw).map_err(|e| {
                anyhow::anyhow!("invalid config file {}: {e:#}", config_path.display())
            })?,
        })
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Catalog type name -> Rust type, applied before the built-in mapping.
    #[serde(default)]
    pub types: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL as written; may reference `${VAR}`.
    pub url: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Table allow-list; empty reverses every table of the schema.
    #[serde(default)]
    pub tables: Vec<String>,
}

fn default_schema() -> String {
    tabua::DEFAULT_SCHEMA.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_out_dir")]
    pub dir: String,
    /// Path generated code uses to reach the tabua crate.
    #[serde(default = "default_tabua_path")]
    pub tabua_path: String,
    #[serde(default = "default_derives")]
    pub derives: Vec<String>,
}

pub fn default_out_dir() -> String {
    "src/tables".to_string()
}

fn default_tabua_path() -> String {
    "tabua".to_string()
}

fn default_derives() -> Vec<String> {
    vec!["Debug".to_string(), "Clone".to_string(), "Default".to_string()]
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_out_dir(),
            tabua_path: default_tabua_path(),
            derives: default_derives(),
        }
    }
}

/// Reads one environment variable; `None` when unset.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Lookup backed by the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl ConfigFile {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Self::parse_with(raw, &process_env)
    }

    /// Parse, expanding `${NAME}` references through `env`.
    ///
    /// `database.url` is kept as written; see [`DatabaseConfig::resolve_url`].
    pub fn parse_with(raw: &str, env: EnvLookup<'_>) -> anyhow::Result<Self> {
        let mut file: ConfigFile =
            toml::from_str(raw).map_err(|e| anyhow::anyhow!("failed to parse: {e}"))?;
        file.expand_env(env)?;
        file.validate()?;
        Ok(file)
    }

    fn expand_env(&mut self, env: EnvLookup<'_>) -> anyhow::Result<()> {
        let db = &mut self.database;
        db.schema = expand_vars("database.schema", &db.schema, env)?;
        for t in &mut db.tables {
            *t = expand_vars("database.tables", t, env)?;
        }

        let out = &mut self.output;
        out.dir = expand_vars("output.dir", &out.dir, env)?;
        out.tabua_path = expand_vars("output.tabua_path", &out.tabua_path, env)?;

        for (k, v) in &mut self.types {
            *v = expand_vars(&format!("types.{k}"), v, env)?;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.version.trim() != "1" {
            anyhow::bail!("unsupported config version: {}", self.version);
        }

        if self.database.url.trim().is_empty() {
            anyhow::bail!("database.url must not be empty");
        }
        if self.database.schema.trim().is_empty() {
            anyhow::bail!("database.schema must not be empty");
        }
        if self.database.tables.iter().any(|t| t.trim().is_empty()) {
            anyhow::bail!("database.tables must not contain empty names");
        }

        if self.output.dir.trim().is_empty() {
            anyhow::bail!("output.dir must not be empty");
        }
        if self.output.tabua_path.trim().is_empty() {
            anyhow::bail!("output.tabua_path must not be empty");
        }

        for (k, v) in &self.types {
            if v.trim().is_empty() {
                anyhow::bail!("types.{k} must not be empty");
            }
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Expand `database.url`. Called only when no `--database` flag is given,
    /// so a starter config naming an unset variable still loads.
    pub fn resolve_url(&self, env: EnvLookup<'_>) -> anyhow::Result<String> {
        let url = expand_vars("database.url", &self.url, env)?;
        if url.trim().is_empty() {
            anyhow::bail!("database.url expands to an empty string");
        }
        Ok(url)
    }
}

/// Replace `${NAME}` and `${NAME:-fallback}` references in a config value.
fn expand_vars(key: &str, value: &str, env: EnvLookup<'_>) -> anyhow::Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let Some(end) = body.find('}') else {
            anyhow::bail!("{key}: unterminated `${{` in {value:?}");
        };

        let (name, fallback) = match body[..end].split_once(":-") {
            Some((name, fallback)) => (name.trim(), Some(fallback)),
            None => (body[..end].trim(), None),
        };
        if name.is_empty() {
            anyhow::bail!("{key}: empty variable name in {value:?}");
        }

        match (env(name), fallback) {
            (Some(v), _) => out.push_str(&v),
            (None, Some(fallback)) => out.push_str(fallback),
            (None, None) => anyhow::bail!("{key}: environment variable {name} is not set"),
        }
        rest = &body[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
