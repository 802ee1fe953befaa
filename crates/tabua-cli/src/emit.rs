use heck::{ToSnakeCase, ToUpperCamelCase};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tabua::{ConstraintType, bind_type};
use tabua::model::{Column, Constraint, ConstraintColumn, Table};
use tabua::typemap::normalize_type_name;

pub(crate) const HEADER: &str = "// This file is generated - do not edit.\n";

/// Names the generated code uses from the prelude; a generated type with one of
/// these names would shadow it.
const RESERVED_TYPE_IDENTS: &[&str] = &[
    "Self", "Box", "Vec", "Option", "Some", "None", "String", "Result", "Ok", "Err",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub out_dir: PathBuf,
    /// Path the generated modules use to reach the tabua crate.
    pub tabua_path: String,
    pub derives: Vec<String>,
    /// Normalized catalog type -> Rust type.
    types: BTreeMap<String, String>,
}

impl EmitOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            tabua_path: "tabua".to_string(),
            derives: vec!["Debug".to_string(), "Clone".to_string(), "Default".to_string()],
            types: BTreeMap::new(),
        }
    }

    pub fn with_tabua_path(mut self, path: impl Into<String>) -> Self {
        self.tabua_path = path.into();
        self
    }

    pub fn with_derives(mut self, derives: Vec<String>) -> Self {
        self.derives = derives;
        self
    }

    pub fn with_types<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.types = types
            .into_iter()
            .map(|(k, v)| (normalize_type_name(&k), v))
            .collect();
        self
    }

    /// Configured derives plus the `Clone` and `Default` the generated impls rely on.
    fn derive_attr(&self) -> String {
        let mut derives: Vec<&str> = Vec::new();
        for d in self
            .derives
            .iter()
            .map(|d| d.trim())
            .chain(["Clone", "Default"])
        {
            if !d.is_empty() && !derives.contains(&d) {
                derives.push(d);
            }
        }
        format!("#[derive({})]\n", derives.join(", "))
    }

    fn type_override(&self, column: &Column) -> Option<&String> {
        let udt = normalize_type_name(&column.udt_name);
        let base = udt.strip_prefix('_').unwrap_or(&udt);
        self.types
            .get(base)
            .or_else(|| self.types.get(&normalize_type_name(&column.data_type)))
    }

    /// Rust type a column binds through and whether the catalog type was
    /// recognized. A `[types]` override replaces the scalar; nullability and
    /// array levels still wrap it.
    pub fn column_type(&self, column: &Column) -> (String, bool) {
        let Some(ty) = self.type_override(column) else {
            return bind_type(
                &column.udt_name,
                &column.data_type,
                column.dimensions(),
                column.non_null,
                &self.tabua_path,
            );
        };
        let scalar = if column.non_null {
            ty.clone()
        } else {
            format!("Option<{ty}>")
        };
        let depth = column.target_type().0.depth();
        let wrapped = (0..depth).fold(scalar, |inner, _| format!("Vec<{inner}>"));
        (wrapped, true)
    }
}

/// Emit one module per table plus the `mod.rs` that lists them.
pub fn emit_all(tables: &[Table], opts: &EmitOptions) -> anyhow::Result<Vec<GeneratedFile>> {
    let known: HashSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    for t in tables {
        for cs in t.foreign_keys() {
            for target in &cs.columns_foreign {
                if !known.contains(target.table.as_str()) {
                    anyhow::bail!(
                        "foreign key {} on {} references table {}, which is not being generated; add it to the table filter",
                        cs.name,
                        t.name,
                        target.table
                    );
                }
            }
        }
    }

    let mut files = Vec::with_capacity(tables.len() + 1);
    files.push(GeneratedFile {
        path: opts.out_dir.join("mod.rs"),
        content: emit_mod_rs(tables)?,
    });
    for t in tables {
        files.push(emit_table(t, opts)?);
    }
    Ok(files)
}

pub fn emit_mod_rs(tables: &[Table]) -> anyhow::Result<String> {
    let mut seen_modules: HashSet<String> = HashSet::new();
    let mut seen_structs: HashSet<String> = HashSet::new();
    let mut lines: Vec<(String, String)> = Vec::new(); // (module_ident, struct_name)

    for t in tables {
        let module = module_ident(&t.name);
        if !seen_modules.insert(module.clone()) {
            anyhow::bail!("duplicate module name after sanitization: {module} (table: {})", t.name);
        }
        let struct_name = table_type_ident(&t.name);
        if !seen_structs.insert(struct_name.clone()) {
            anyhow::bail!(
                "duplicate table struct name after sanitization: {struct_name} (table: {})",
                t.name
            );
        }
        lines.push((module, struct_name));
    }
    lines.sort();

    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    for (module, _) in &lines {
        out.push_str(&format!("pub mod {module};\n"));
    }
    if !lines.is_empty() {
        out.push('\n');
    }
    for (module, struct_name) in &lines {
        out.push_str(&format!("pub use {module}::{struct_name};\n"));
    }
    Ok(out)
}

pub fn emit_table(t: &Table, opts: &EmitOptions) -> anyhow::Result<GeneratedFile> {
    let p = opts.tabua_path.as_str();
    let derive = opts.derive_attr();
    let struct_name = table_type_ident(&t.name);

    let mut seen_types: HashSet<String> = HashSet::from([struct_name.clone()]);
    let mut seen_fields: HashSet<String> = HashSet::new();
    let mut columns: Vec<(String, String, &Column)> = Vec::new(); // (field_ident, type_ident, column)
    for c in &t.columns {
        let field = field_ident(&c.name);
        if !seen_fields.insert(field.clone()) {
            anyhow::bail!("duplicate field name after sanitization in {}: {field}", t.name);
        }
        let ty = column_type_ident(&t.name, &c.name);
        if !seen_types.insert(ty.clone()) {
            anyhow::bail!("duplicate type name after sanitization in {}: {ty}", t.name);
        }
        columns.push((field, ty, c));
    }

    let mut constraints: Vec<(String, &Constraint)> = Vec::new();
    for cs in &t.constraints {
        let ty = constraint_type_ident(&cs.name);
        if !seen_types.insert(ty.clone()) {
            anyhow::bail!("duplicate type name after sanitization in {}: {ty}", t.name);
        }
        constraints.push((ty, cs));
    }

    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');

    // table struct
    push_doc(&mut out, "", t.comment.as_deref());
    out.push_str(&derive);
    out.push_str(&format!("pub struct {struct_name} {{\n"));
    for (field, ty, c) in &columns {
        push_doc(&mut out, "    ", c.comment.as_deref());
        out.push_str(&format!("    pub {field}: {ty},\n"));
    }
    out.push_str("}\n\n");

    push_namer(&mut out, p, &struct_name, &t.name);

    out.push_str(&format!("impl {p}::Table for {struct_name} {{\n"));
    out.push_str(&format!(
        "    fn columns(&self) -> Vec<Box<dyn {p}::Column + '_>> {{\n"
    ));
    if columns.is_empty() {
        out.push_str("        Vec::new()\n");
    } else {
        out.push_str("        vec![\n");
        for (field, _, _) in &columns {
            out.push_str(&format!("            Box::new(&self.{field}),\n"));
        }
        out.push_str("        ]\n");
    }
    out.push_str("    }\n\n");
    out.push_str(&format!(
        "    fn constraints(&self) -> Vec<Box<dyn {p}::Constrainer + '_>> {{\n"
    ));
    if constraints.is_empty() {
        out.push_str("        Vec::new()\n");
    } else {
        out.push_str("        vec![\n");
        for (ty, _) in &constraints {
            out.push_str(&format!("            Box::new({ty}),\n"));
        }
        out.push_str("        ]\n");
    }
    out.push_str("    }\n}\n");

    // columns
    for (_, ty, c) in &columns {
        let (rust_type, _) = opts.column_type(c);
        out.push('\n');
        push_doc(&mut out, "", c.comment.as_deref());
        out.push_str(&derive);
        out.push_str(&format!("pub struct {ty}(pub {rust_type});\n\n"));
        push_namer(&mut out, p, ty, &c.name);
        out.push_str(&format!("impl {p}::Column for {ty} {{\n"));
        out.push_str(&format!(
            "    fn table(&self) -> Box<dyn {p}::Table + '_> {{\n        Box::new({struct_name}::default())\n    }}\n\n"
        ));
        out.push_str(&format!(
            "    fn sql_type(&self) -> String {{\n        {:?}.to_string()\n    }}\n\n",
            c.sql_type()
        ));
        out.push_str(&format!(
            "    fn non_null(&self) -> bool {{\n        {}\n    }}\n\n",
            c.non_null
        ));
        out.push_str(&format!(
            "    fn value(&self) -> {p}::Param {{\n        {p}::Param::new(self.0.clone())\n    }}\n}}\n"
        ));
    }

    // constraints
    for (ty, cs) in &constraints {
        out.push('\n');
        out.push_str(&format!("pub struct {ty};\n\n"));
        push_namer(&mut out, p, ty, &cs.name);
        push_constraint(&mut out, p, &t.name, ty, cs);
    }

    Ok(GeneratedFile {
        path: opts
            .out_dir
            .join(format!("{}.rs", module_file_stem(&module_ident(&t.name)))),
        content: out,
    })
}

fn push_doc(out: &mut String, indent: &str, doc: Option<&str>) {
    let Some(doc) = doc.map(str::trim).filter(|d| !d.is_empty()) else {
        return;
    };
    for line in doc.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            out.push_str(&format!("{indent}///\n"));
        } else {
            out.push_str(&format!("{indent}/// {line}\n"));
        }
    }
}

fn push_namer(out: &mut String, p: &str, ty: &str, name: &str) {
    out.push_str(&format!(
        "impl {p}::Namer for {ty} {{\n    fn name(&self) -> &str {{\n        {name:?}\n    }}\n}}\n\n"
    ));
}

fn push_constraint(out: &mut String, p: &str, table: &str, ty: &str, cs: &Constraint) {
    let (variant, accessor, kind_trait) = match cs.constraint_type {
        ConstraintType::Unique => ("Unique", "as_unique", "UniqueConstrainer"),
        ConstraintType::Check => ("Check", "as_check", "CheckConstrainer"),
        ConstraintType::PrimaryKey => ("PrimaryKey", "as_primary_key", "PkConstrainer"),
        ConstraintType::ForeignKey => ("ForeignKey", "as_foreign_key", "FkConstrainer"),
    };

    out.push_str(&format!("impl {p}::Constrainer for {ty} {{\n"));
    out.push_str(&format!(
        "    fn constraint_type(&self) -> {p}::ConstraintType {{\n        {p}::ConstraintType::{variant}\n    }}\n\n"
    ));
    out.push_str(&format!(
        "    fn definition(&self) -> String {{\n        {:?}.to_string()\n    }}\n\n",
        cs.definition
    ));
    out.push_str(&format!(
        "    fn {accessor}(&self) -> Option<&dyn {p}::{kind_trait}> {{\n        Some(self)\n    }}\n}}\n\n"
    ));

    out.push_str(&format!("impl {p}::{kind_trait} for {ty} {{\n"));
    match cs.constraint_type {
        ConstraintType::ForeignKey => {
            out.push_str(&format!("    fn key(&self) -> {p}::Fk<'_> {{\n"));
            out.push_str(&format!("        {p}::Fk {{\n"));
            out.push_str(&format!(
                "            from: {},\n",
                column_vec(table, &cs.columns_local)
            ));
            out.push_str(&format!(
                "            to: {},\n",
                column_vec(table, &cs.columns_foreign)
            ));
            out.push_str("        }\n    }\n}\n");
        }
        other => {
            let method = match other {
                ConstraintType::Unique => "uniques",
                ConstraintType::Check => "check_columns",
                _ => "keys",
            };
            out.push_str(&format!(
                "    fn {method}(&self) -> Vec<Box<dyn {p}::Column + '_>> {{\n        {}\n    }}\n}}\n",
                column_vec(table, &cs.columns_local)
            ));
        }
    }
}

fn column_vec(table: &str, refs: &[ConstraintColumn]) -> String {
    if refs.is_empty() {
        return "Vec::new()".to_string();
    }
    let items = refs
        .iter()
        .map(|r| {
            let ty = column_type_ident(&r.table, &r.column);
            if r.table == table {
                format!("Box::new({ty}::default())")
            } else {
                format!(
                    "Box::new(super::{}::{ty}::default())",
                    module_ident(&r.table)
                )
            }
        })
        .collect::<Vec<_>>();
    format!("vec![{}]", items.join(", "))
}

/// Module of a table: its name without underscores, lowercased.
pub fn module_ident(table: &str) -> String {
    sanitize_field_ident(&table.replace('_', "").to_lowercase())
}

fn module_file_stem(module_ident: &str) -> &str {
    module_ident.trim_start_matches("r#")
}

pub fn table_type_ident(table: &str) -> String {
    sanitize_type_ident(&table.to_upper_camel_case())
}

/// Column newtype name; suffixed `Col` when it would collide with the table struct.
pub fn column_type_ident(table: &str, column: &str) -> String {
    let ty = sanitize_type_ident(&column.to_upper_camel_case());
    if ty == table_type_ident(table) {
        format!("{ty}Col")
    } else {
        ty
    }
}

pub fn constraint_type_ident(name: &str) -> String {
    let camel = name.replace(['.', '-'], "").to_upper_camel_case();
    sanitize_type_ident(&format!("CS{camel}"))
}

fn field_ident(column: &str) -> String {
    sanitize_field_ident(column)
}

fn sanitize_type_ident(name: &str) -> String {
    let mut s = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();

    if s.is_empty() {
        s.push('_');
    }
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        s.insert(0, '_');
    }
    if RESERVED_TYPE_IDENTS.contains(&s.as_str()) {
        s.push('_');
    }
    s
}

fn sanitize_field_ident(name: &str) -> String {
    let mut s = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();
    s = s.to_snake_case();
    if s.is_empty() {
        s.push('_');
    }
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        s.insert(0, '_');
    }
    match s.as_str() {
        // Not valid as raw identifiers.
        "self" | "super" | "crate" | "_" => format!("{s}_"),
        _ if is_rust_keyword(&s) => format!("r#{s}"),
        _ => s,
    }
}

fn is_rust_keyword(s: &str) -> bool {
    matches!(
        s,
        "as" | "async"
            | "await"
            | "break"
            | "const"
            | "continue"
            | "dyn"
            | "else"
            | "enum"
            | "extern"
            | "false"
            | "fn"
            | "for"
            | "gen"
            | "if"
            | "impl"
            | "in"
            | "let"
            | "loop"
            | "match"
            | "mod"
            | "move"
            | "mut"
            | "pub"
            | "ref"
            | "return"
            | "static"
            | "struct"
            | "trait"
            | "true"
            | "type"
            | "unsafe"
            | "use"
            | "where"
            | "while"
            | "abstract"
            | "become"
            | "box"
            | "do"
            | "final"
            | "macro"
            | "override"
            | "priv"
            | "try"
            | "typeof"
            | "unsized"
            | "virtual"
            | "yield"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, udt: &str, data_type: &str, non_null: bool) -> Column {
        Column {
            name: name.to_string(),
            udt_name: udt.to_string(),
            non_null,
            data_type: data_type.to_string(),
            comment: None,
            dimension: 0,
        }
    }

    fn cc(table: &str, column: &str) -> ConstraintColumn {
        ConstraintColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    fn users() -> Table {
        Table {
            name: "users".to_string(),
            columns: vec![
                Column {
                    comment: Some("Surrogate key.".to_string()),
                    ..column("id", "int4", "integer", true)
                },
                column("users", "text", "text", false),
                column("type", "varchar", "character varying", true),
            ],
            constraints: vec![Constraint {
                name: "users_pkey".to_string(),
                definition: "PRIMARY KEY (id)".to_string(),
                constraint_type: ConstraintType::PrimaryKey,
                columns_local: vec![cc("users", "id")],
                columns_foreign: Vec::new(),
            }],
            comment: Some("Registered accounts.".to_string()),
        }
    }

    fn user_roles() -> Table {
        Table {
            name: "user_roles".to_string(),
            columns: vec![
                column("user_id", "int4", "integer", true),
                Column {
                    dimension: 1,
                    ..column("scopes", "_text", "ARRAY", false)
                },
            ],
            constraints: vec![Constraint {
                name: "user_roles_user_id_fkey".to_string(),
                definition: "FOREIGN KEY (user_id) REFERENCES users(id)".to_string(),
                constraint_type: ConstraintType::ForeignKey,
                columns_local: vec![cc("user_roles", "user_id")],
                columns_foreign: vec![cc("users", "id")],
            }],
            comment: None,
        }
    }

    #[test]
    fn naming_rules() {
        assert_eq!(module_ident("user_roles"), "userroles");
        assert_eq!(module_ident("type"), "r#type");
        assert_eq!(module_file_stem(&module_ident("type")), "type");
        assert_eq!(table_type_ident("user_roles"), "UserRoles");
        assert_eq!(table_type_ident("option"), "Option_");
        assert_eq!(column_type_ident("users", "users"), "UsersCol");
        assert_eq!(column_type_ident("users", "created_at"), "CreatedAt");
        assert_eq!(constraint_type_ident("users.email-key"), "CSUsersemailkey");
        assert_eq!(constraint_type_ident("users_pkey"), "CSUsersPkey");
        assert_eq!(field_ident("Type"), "r#type");
        assert_eq!(field_ident("self"), "self_");
        assert_eq!(field_ident("2fa code"), "_2fa_code");
    }

    #[test]
    fn emits_table_module() {
        let opts = EmitOptions::new("src/tables");
        let file = emit_table(&users(), &opts).unwrap();
        assert_eq!(file.path, PathBuf::from("src/tables/users.rs"));

        let src = &file.content;
        assert!(src.starts_with("// This file is generated - do not edit.\n"));
        assert!(src.contains(
            "/// Registered accounts.\n#[derive(Debug, Clone, Default)]\npub struct Users {\n"
        ));
        assert!(src.contains("    /// Surrogate key.\n    pub id: Id,\n"));
        assert!(src.contains("    pub users: UsersCol,\n"));
        assert!(src.contains("    pub r#type: Type,\n"));
        assert!(src.contains("            Box::new(&self.r#type),\n"));
        assert!(src.contains("pub struct Id(pub i32);"));
        assert!(src.contains("pub struct UsersCol(pub Option<String>);"));
        assert!(src.contains("\"int4,integer\".to_string()"));
        assert!(src.contains("impl tabua::Column for Type {"));
        assert!(src.contains("        Box::new(Users::default())\n"));
        assert!(src.contains("pub struct CSUsersPkey;"));
        assert!(src.contains("        tabua::ConstraintType::PrimaryKey\n"));
        assert!(src.contains("fn as_primary_key(&self) -> Option<&dyn tabua::PkConstrainer> {"));
        assert!(src.contains("        vec![Box::new(Id::default())]\n"));
    }

    #[test]
    fn foreign_keys_reference_sibling_modules() {
        let opts = EmitOptions::new("out").with_tabua_path("crate::db");
        let file = emit_table(&user_roles(), &opts).unwrap();
        assert_eq!(file.path, PathBuf::from("out/userroles.rs"));

        let src = &file.content;
        assert!(src.contains("impl crate::db::FkConstrainer for CSUserRolesUserIdFkey {"));
        assert!(src.contains("            from: vec![Box::new(UserId::default())],\n"));
        assert!(src.contains("            to: vec![Box::new(super::users::Id::default())],\n"));
        assert!(src.contains("pub struct Scopes(pub Vec<Option<String>>);"));
    }

    #[test]
    fn mod_rs_lists_sorted_modules() {
        let src = emit_mod_rs(&[users(), user_roles()]).unwrap();
        assert_eq!(
            src,
            "// This file is generated - do not edit.\n\n\
             pub mod userroles;\n\
             pub mod users;\n\n\
             pub use userroles::UserRoles;\n\
             pub use users::Users;\n"
        );
    }

    #[test]
    fn emit_all_rejects_dangling_foreign_keys() {
        let opts = EmitOptions::new("out");
        let err = emit_all(&[user_roles()], &opts).unwrap_err();
        assert!(err.to_string().contains("references table users"));

        let files = emit_all(&[users(), user_roles()], &opts).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].path, PathBuf::from("out/mod.rs"));
    }

    #[test]
    fn rejects_colliding_names() {
        let mut t = users();
        t.columns.push(column("user-name", "text", "text", true));
        t.columns.push(column("user_name", "text", "text", true));
        assert!(emit_table(&t, &EmitOptions::new("out")).is_err());

        let dup = Table {
            name: "userroles".to_string(),
            ..user_roles()
        };
        assert!(emit_mod_rs(&[user_roles(), dup]).is_err());
    }

    #[test]
    fn type_overrides_and_derives() {
        let opts = EmitOptions::new("out")
            .with_derives(vec!["Debug".to_string(), "PartialEq".to_string()])
            .with_types([("UUID".to_string(), "uuid::Uuid".to_string())]);

        let mut tagged = column("tags", "_uuid", "ARRAY", true);
        tagged.dimension = 1;
        assert_eq!(opts.column_type(&tagged), ("Vec<uuid::Uuid>".to_string(), true));
        assert_eq!(
            opts.column_type(&column("owner", "uuid", "uuid", false)),
            ("Option<uuid::Uuid>".to_string(), true)
        );
        assert_eq!(
            opts.column_type(&column("at", "timestamptz", "timestamp with time zone", true)),
            ("chrono::DateTime<chrono::Utc>".to_string(), true)
        );
        assert_eq!(
            opts.column_type(&column("seen", "timestamp", "timestamp without time zone", false)),
            ("Option<chrono::NaiveDateTime>".to_string(), true)
        );
        assert_eq!(
            opts.column_type(&column("total", "numeric", "numeric", true)),
            ("tabua::Numeric".to_string(), true)
        );
        assert_eq!(
            opts.column_type(&column("pos", "point", "point", true)),
            ("Vec<u8>".to_string(), false)
        );
        assert_eq!(
            opts.derive_attr(),
            "#[derive(Debug, PartialEq, Clone, Default)]\n"
        );
    }
}
