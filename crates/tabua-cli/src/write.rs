use crate::emit::{GeneratedFile, HEADER};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Write,
    /// Report what would change; touch nothing.
    DryRun,
    /// Fail when the output directory is not current.
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Change {
    Created,
    Updated,
    /// A generated module whose table is no longer reversed.
    Removed,
    Unchanged,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Change::Created => "created",
            Change::Updated => "updated",
            Change::Removed => "removed",
            Change::Unchanged => "unchanged",
        })
    }
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub entries: Vec<(PathBuf, Change)>,
}

impl SyncReport {
    pub fn count(&self, change: Change) -> usize {
        self.entries.iter().filter(|(_, c)| *c == change).count()
    }

    pub fn is_current(&self) -> bool {
        self.entries.iter().all(|(_, c)| *c == Change::Unchanged)
    }

    fn summary(&self) -> String {
        format!(
            "{} created, {} updated, {} removed, {} unchanged",
            self.count(Change::Created),
            self.count(Change::Updated),
            self.count(Change::Removed),
            self.count(Change::Unchanged)
        )
    }
}

/// Bring `out_dir` in line with the emitted modules.
///
/// Files carrying the generated header that are not part of `files` are
/// removed; other files in the directory are left alone.
pub fn sync_generated(
    out_dir: &Path,
    files: &[GeneratedFile],
    mode: WriteMode,
) -> anyhow::Result<SyncReport> {
    let report = plan(out_dir, files)?;

    match mode {
        WriteMode::DryRun => {
            for (path, change) in report.entries.iter().filter(|(_, c)| *c != Change::Unchanged) {
                println!("would be {change}: {}", path.display());
            }
            println!("dry run: {}", report.summary());
            return Ok(report);
        }
        WriteMode::Check => {
            if !report.is_current() {
                for (path, change) in &report.entries {
                    if *change != Change::Unchanged {
                        eprintln!("out of date ({change}): {}", path.display());
                    }
                }
                anyhow::bail!("generated modules in {} are out of date", out_dir.display());
            }
            return Ok(report);
        }
        WriteMode::Write => {}
    }

    for (path, change) in &report.entries {
        match change {
            Change::Created | Change::Updated => {
                let content = files
                    .iter()
                    .find(|f| &f.path == path)
                    .map(|f| f.content.as_str())
                    .unwrap_or_default();
                replace_file(path, content)?;
                println!("{change} {}", path.display());
            }
            Change::Removed => {
                std::fs::remove_file(path)
                    .map_err(|e| anyhow::anyhow!("failed to remove {}: {e}", path.display()))?;
                println!("{change} {}", path.display());
            }
            Change::Unchanged => {}
        }
    }
    println!("{}", report.summary());
    Ok(report)
}

fn plan(out_dir: &Path, files: &[GeneratedFile]) -> anyhow::Result<SyncReport> {
    let mut report = SyncReport::default();
    for f in files {
        let change = match std::fs::read_to_string(&f.path) {
            Ok(existing) if existing == f.content => Change::Unchanged,
            Ok(_) => Change::Updated,
            Err(_) => Change::Created,
        };
        report.entries.push((f.path.clone(), change));
    }

    let wanted: BTreeSet<&Path> = files.iter().map(|f| f.path.as_path()).collect();
    for path in stale_modules(out_dir)? {
        if !wanted.contains(path.as_path()) {
            report.entries.push((path, Change::Removed));
        }
    }

    report.entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    Ok(report)
}

/// `.rs` files in `dir` that start with the generated header.
fn stale_modules(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => anyhow::bail!("failed to list {}: {e}", dir.display()),
    };

    let mut found = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| anyhow::anyhow!("failed to list {}: {e}", dir.display()))?
            .path();
        if path.extension().and_then(|e| e.to_str()) != Some("rs") || !path.is_file() {
            continue;
        }
        let generated = std::fs::read_to_string(&path)
            .map(|content| content.starts_with(HEADER))
            .unwrap_or(false);
        if generated {
            found.push(path);
        }
    }
    Ok(found)
}

/// Write through a sibling temp file and rename over the target.
fn replace_file(path: &Path, content: &str) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| anyhow::anyhow!("failed to create directory {}: {e}", dir.display()))?;

    let staging = staging_path(path);
    std::fs::write(&staging, content)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", staging.display()))?;
    if let Err(e) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        anyhow::bail!("failed to replace {}: {e}", path.display());
    }
    Ok(())
}

/// Hidden sibling without the `.rs` extension, so an interrupted run never
/// leaves a file that looks like a generated module.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tabua-tmp"))
}
