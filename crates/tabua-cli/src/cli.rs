use std::path::PathBuf;
use tabua::model::split_csv;

pub const DEFAULT_CONFIG: &str = "tabua.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Init,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Init(InitArgs),
    Reverse(ReverseArgs),
}

#[derive(Debug, Clone)]
pub struct InitArgs {
    pub config: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ReverseArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub tables: Option<Vec<String>>,
    pub out: Option<PathBuf>,
    pub dry_run: bool,
    pub check: bool,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1).map(|s| s.as_str()).peekable();

    match it.peek().copied() {
        Some("init") => {
            it.next();
            parse_init(it)
        }
        _ => parse_reverse(it),
    }
}

fn parse_init<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Init)),
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                config = PathBuf::from(v);
            }
            _ if token.starts_with("--config=") => {
                config = PathBuf::from(token.trim_start_matches("--config="));
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(Command::Init(InitArgs { config }))
}

fn parse_reverse<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut database: Option<String> = None;
    let mut schema: Option<String> = None;
    let mut tables: Option<Vec<String>> = None;
    let mut out: Option<PathBuf> = None;
    let mut dry_run = false;
    let mut check = false;

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Root)),
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                config = PathBuf::from(v);
            }
            _ if token.starts_with("--config=") => {
                config = PathBuf::from(token.trim_start_matches("--config="));
            }
            "--database" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--database requires a value");
                };
                database = Some(v.to_string());
            }
            _ if token.starts_with("--database=") => {
                database = Some(token.trim_start_matches("--database=").to_string());
            }
            "--schema" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--schema requires a value");
                };
                schema = Some(non_empty("--schema", v)?);
            }
            _ if token.starts_with("--schema=") => {
                schema = Some(non_empty("--schema", token.trim_start_matches("--schema="))?);
            }
            "--filter" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--filter requires a value");
                };
                tables = Some(parse_filter(v)?);
            }
            _ if token.starts_with("--filter=") => {
                tables = Some(parse_filter(token.trim_start_matches("--filter="))?);
            }
            "--out" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--out requires a value");
                };
                out = Some(PathBuf::from(v));
            }
            _ if token.starts_with("--out=") => {
                out = Some(PathBuf::from(token.trim_start_matches("--out=")));
            }
            "--dry-run" => dry_run = true,
            "--check" => check = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    if dry_run && check {
        anyhow::bail!("--dry-run and --check are mutually exclusive");
    }

    Ok(Command::Reverse(ReverseArgs {
        config,
        database,
        schema,
        tables,
        out,
        dry_run,
        check,
    }))
}

fn non_empty(flag: &str, v: &str) -> anyhow::Result<String> {
    let v = v.trim();
    if v.is_empty() {
        anyhow::bail!("{flag} must not be empty");
    }
    Ok(v.to_string())
}

fn parse_filter(v: &str) -> anyhow::Result<Vec<String>> {
    let parsed = split_csv(v);
    if parsed.is_empty() {
        anyhow::bail!("--filter must not be empty");
    }
    Ok(parsed)
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
tabua - reverse a PostgreSQL schema into Rust table modules

USAGE:
  tabua [OPTIONS]
  tabua init [--config <FILE>]

OPTIONS:
  --config <FILE>       Config file path (default: tabua.toml)
  --database <URL>      Database URL (overrides config and DATABASE_URL)
  --schema <NAME>       Schema to reverse (default: public)
  --filter <CSV>        Comma-separated table allow-list
  --out <DIR>           Output directory (default: src/tables)
  --dry-run             Print files that would change
  --check               Exit non-zero if output would change
  -h, --help            Print help

Run `tabua init --help` for more."
            );
        }
        HelpTopic::Init => {
            println!(
                "\
USAGE:
  tabua init [OPTIONS]

OPTIONS:
  --config <FILE>       Config file to create (default: tabua.toml)
  -h, --help            Print help"
            );
        }
    }
}
