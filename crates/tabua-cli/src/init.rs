use crate::cli::InitArgs;
use std::path::Path;

const TEMPLATE: &str = r#"
version = "1"

[database]
url = "${DATABASE_URL}"
schema = "public"
# If empty, reverse every table of the schema.
tables = []

[output]
dir = "src/tables"
# Path the generated modules use to reach the tabua crate.
tabua_path = "tabua"
derives = ["Debug", "Clone", "Default"]

# Catalog type -> Rust type, checked before the built-in mapping.
# Nullable columns get `Option<...>`, arrays get `Vec<...>` around the override.
[types]
# "uuid" = "uuid::Uuid"
# "numeric" = "rust_decimal::Decimal"
"#;

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    write_template(&args.config)
}

fn write_template(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("refusing to overwrite existing file: {}", path.display());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("failed to create directory {}: {e}", parent.display())
            })?;
        }
    }

    std::fs::write(path, TEMPLATE.trim_start_matches('\n'))
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;

    println!("wrote {}", path.display());
    Ok(())
}
