use std::time::{SystemTime, UNIX_EPOCH};
use tabua::model::Table;
use tabua::{ConstraintType, Filter, Reverser, TabuaError, TabuaResult, TargetType};
use tokio_postgres::{Client, NoTls};

async fn connect() -> TabuaResult<Option<Client>> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };
    let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .map_err(TabuaError::from_db_error)?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Ok(Some(client))
}

fn unique_schema(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX_EPOCH")
        .as_nanos();
    format!("{prefix}_{}_{}", std::process::id(), nanos)
}

fn find<'a>(tables: &'a [Table], name: &str) -> &'a Table {
    tables
        .iter()
        .find(|t| t.name == name)
        .unwrap_or_else(|| panic!("table {name} not reversed"))
}

#[tokio::test]
async fn reverses_tables_columns_and_constraints() -> TabuaResult<()> {
    let Some(client) = connect().await? else {
        eprintln!("DATABASE_URL is not set; skipping reverses_tables_columns_and_constraints");
        return Ok(());
    };
    let schema = unique_schema("tabua_reverse");

    client
        .batch_execute(&format!(
            r#"
            CREATE SCHEMA {schema};
            CREATE TABLE {schema}.users (
                id bigserial PRIMARY KEY,
                email varchar(255) NOT NULL UNIQUE,
                age int CHECK (age >= 0),
                tags text[] NOT NULL DEFAULT '{{}}',
                grid int[][],
                prefs jsonb
            );
            COMMENT ON TABLE {schema}.users IS 'registered users';
            COMMENT ON COLUMN {schema}.users.email IS 'login address';
            CREATE TABLE {schema}.orders (
                id serial PRIMARY KEY,
                user_id bigint NOT NULL REFERENCES {schema}.users (id),
                placed_at timestamptz NOT NULL DEFAULT now(),
                total numeric(10, 2)
            );
            CREATE TABLE {schema}.audit (payload text);
            "#
        ))
        .await
        .map_err(TabuaError::from_db_error)?;

    let result = check_reversal(&client, &schema).await;

    client
        .batch_execute(&format!("DROP SCHEMA {schema} CASCADE"))
        .await
        .map_err(TabuaError::from_db_error)?;
    result
}

async fn check_reversal(client: &Client, schema: &str) -> TabuaResult<()> {
    let reverser = Reverser::new(client);
    let tables = reverser.run(&Filter::new(schema)).await?;
    assert_eq!(tables.len(), 3);

    let users = find(&tables, "users");
    assert_eq!(users.comment.as_deref(), Some("registered users"));
    let names: Vec<_> = users.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "email", "age", "tags", "grid", "prefs"]);

    let email = users.column("email").unwrap();
    assert!(email.non_null);
    assert_eq!(email.comment.as_deref(), Some("login address"));
    assert_eq!(email.sql_type(), "varchar,character varying");
    assert_eq!(email.target_type(), (TargetType::String, true));

    assert_eq!(users.column("age").unwrap().target_type(), (TargetType::NullInt, true));
    assert_eq!(users.column("tags").unwrap().target_type().0.rust_type(), "Vec<String>");
    assert!(users.column("grid").unwrap().dimension >= 1);
    assert_eq!(users.column("prefs").unwrap().target_type(), (TargetType::NullJson, true));

    let kinds: Vec<_> = users.constraints.iter().map(|c| c.constraint_type).collect();
    assert!(kinds.contains(&ConstraintType::PrimaryKey));
    assert!(kinds.contains(&ConstraintType::Unique));
    assert!(kinds.contains(&ConstraintType::Check));
    assert_eq!(users.primary_key().unwrap().columns_local[0].column, "id");

    let orders = find(&tables, "orders");
    let fk = orders.foreign_keys().next().expect("orders has a foreign key");
    assert_eq!(fk.columns_local[0].table, "orders");
    assert_eq!(fk.columns_local[0].column, "user_id");
    assert_eq!(fk.columns_foreign[0].table, "users");
    assert_eq!(fk.columns_foreign[0].column, "id");
    assert_eq!(
        orders.column("placed_at").unwrap().target_type(),
        (TargetType::Timestamp, true)
    );

    let audit = find(&tables, "audit");
    assert!(audit.constraints.is_empty());
    assert_eq!(audit.columns.len(), 1);

    let only_orders = reverser
        .run(&Filter::new(schema).with_tables_csv("orders"))
        .await?;
    assert_eq!(only_orders.len(), 1);
    assert_eq!(only_orders[0].name, "orders");

    let none = reverser
        .run(&Filter::new(schema).with_tables(["missing"]))
        .await?;
    assert!(none.is_empty());

    Ok(())
}

#[tokio::test]
async fn unknown_schema_is_an_empty_result() -> TabuaResult<()> {
    let Some(client) = connect().await? else {
        eprintln!("DATABASE_URL is not set; skipping unknown_schema_is_an_empty_result");
        return Ok(());
    };
    let tables = Reverser::new(&client)
        .run(&Filter::new(unique_schema("tabua_absent")))
        .await?;
    assert_eq!(tables, Vec::<Table>::new());
    Ok(())
}
