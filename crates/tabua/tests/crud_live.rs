use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tabua::{
    Bits, Column, Constrainer, Crud, Namer, NullStringMap, Numeric, Param, TabuaError,
    TabuaResult, Table, TimeTz, Uuid,
};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

/// Hand-written table in the shape the code emitter produces.
#[derive(Default)]
struct Events {
    id: Id,
    kind: Kind,
    at: At,
    meta: Meta,
}

impl Namer for Events {
    fn name(&self) -> &str {
        "events"
    }
}

impl Table for Events {
    fn columns(&self) -> Vec<Box<dyn Column + '_>> {
        vec![
            Box::new(&self.id),
            Box::new(&self.kind),
            Box::new(&self.at),
            Box::new(&self.meta),
        ]
    }

    fn constraints(&self) -> Vec<Box<dyn Constrainer + '_>> {
        Vec::new()
    }
}

macro_rules! events_column {
    ($ty:ident($inner:ty), $name:literal, $sql:literal, $non_null:literal) => {
        #[derive(Default, Clone)]
        struct $ty($inner);

        impl Namer for $ty {
            fn name(&self) -> &str {
                $name
            }
        }

        impl Column for $ty {
            fn table(&self) -> Box<dyn Table + '_> {
                Box::new(Events::default())
            }

            fn sql_type(&self) -> String {
                $sql.to_string()
            }

            fn non_null(&self) -> bool {
                $non_null
            }

            fn value(&self) -> Param {
                Param::new(self.0.clone())
            }
        }
    };
}

events_column!(Id(i64), "id", "int8,bigint", true);
events_column!(Kind(String), "kind", "text,text", true);
events_column!(At(DateTime<Utc>), "at", "timestamptz,timestamp with time zone", true);
events_column!(Meta(NullStringMap), "meta", "jsonb,jsonb", false);

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

#[tokio::test]
async fn crud_round_trip_against_postgres() -> TabuaResult<()> {
    let Some(client) = connect().await? else {
        eprintln!("DATABASE_URL is not set; skipping crud_round_trip_against_postgres");
        return Ok(());
    };
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX_EPOCH")
        .as_nanos();
    let schema = format!("tabua_crud_{}_{}", std::process::id(), nanos);

    client
        .batch_execute(&format!(
            r#"
            CREATE SCHEMA {schema};
            SET search_path TO {schema};
            CREATE TABLE events (
                id bigint PRIMARY KEY,
                kind text NOT NULL,
                at timestamptz NOT NULL,
                meta jsonb
            );
            "#
        ))
        .await
        .map_err(TabuaError::from_db_error)?;

    let result = round_trip(&client).await;

    client
        .batch_execute(&format!("DROP SCHEMA {schema} CASCADE"))
        .await
        .map_err(TabuaError::from_db_error)?;
    result
}

async fn round_trip(client: &Client) -> TabuaResult<()> {
    let crud = Crud::dollar();
    let event = Events {
        id: Id(1),
        kind: Kind("signup".into()),
        at: At(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        meta: Meta(NullStringMap::from_value(HashMap::from([(
            "source".to_string(),
            "web".to_string(),
        )]))),
    };

    let q = crud.insert_returning(
        &[&event.id, &event.kind, &event.at, &event.meta],
        &[&event.id],
    )?;
    let row = client
        .query_one(q.sql(), &q.params_ref())
        .await
        .map_err(TabuaError::from_db_error)?;
    assert_eq!(row.get::<_, i64>("id"), 1);

    let q = crud.select(&[&event.kind, &event.at, &event.meta], &[&event.id])?;
    let row = client
        .query_one(q.sql(), &q.params_ref())
        .await
        .map_err(TabuaError::from_db_error)?;
    assert_eq!(row.get::<_, String>("kind"), "signup");
    assert_eq!(row.get::<_, DateTime<Utc>>("at"), event.at.0);
    let meta: NullStringMap = row.get("meta");
    assert!(meta.valid);
    assert_eq!(meta.map["source"], "web");

    let renamed = Kind("login".into());
    let q = crud.upsert(&[&event.id, &renamed, &event.at], &event.id, &[&renamed])?;
    client
        .execute(q.sql(), &q.params_ref())
        .await
        .map_err(TabuaError::from_db_error)?;

    let cleared = Meta(NullStringMap::default());
    let q = crud.update_returning(&[&cleared], &[&event.kind, &event.meta], &[&event.id])?;
    let row = client
        .query_one(q.sql(), &q.params_ref())
        .await
        .map_err(TabuaError::from_db_error)?;
    assert_eq!(row.get::<_, String>("kind"), "login");
    let meta: NullStringMap = row.get("meta");
    assert!(meta.valid, "invalid wrappers are written as an empty object");
    assert!(meta.map.is_empty());

    let q = crud.delete(&event, &[&event.id])?;
    let deleted = client
        .execute(q.sql(), &q.params_ref())
        .await
        .map_err(TabuaError::from_db_error)?;
    assert_eq!(deleted, 1);
    Ok(())
}

#[tokio::test]
async fn narrowed_bind_types_round_trip() -> TabuaResult<()> {
    let Some(client) = connect().await? else {
        eprintln!("DATABASE_URL is not set; skipping narrowed_bind_types_round_trip");
        return Ok(());
    };
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX_EPOCH")
        .as_nanos();
    let schema = format!("tabua_bind_{}_{}", std::process::id(), nanos);

    client
        .batch_execute(&format!(
            r#"
            CREATE SCHEMA {schema};
            CREATE TABLE {schema}.readings (
                small int2 NOT NULL,
                maybe int4,
                ratio float4,
                taken timestamp NOT NULL,
                day date,
                at_time time,
                local_time timetz,
                amount numeric(12, 4),
                ref uuid,
                flags bit(4)
            );
            "#
        ))
        .await
        .map_err(TabuaError::from_db_error)?;

    let result = bind_round_trip(&client, &schema).await;

    client
        .batch_execute(&format!("DROP SCHEMA {schema} CASCADE"))
        .await
        .map_err(TabuaError::from_db_error)?;
    result
}

async fn bind_round_trip(client: &Client, schema: &str) -> TabuaResult<()> {
    let taken = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(8, 30, 0))
        .unwrap();
    let values = [
        Param::new(7i16),
        Param::new(Some(42i32)),
        Param::new(Some(0.5f32)),
        Param::new(taken),
        Param::new(Some(taken.date())),
        Param::new(Some(taken.time())),
        Param::new(Some("08:30:00+02:00".parse::<TimeTz>().unwrap())),
        Param::new(Some("-1234.5600".parse::<Numeric>().unwrap())),
        Param::new(Some(
            "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11".parse::<Uuid>().unwrap(),
        )),
        Param::new(Some("1010".parse::<Bits>().unwrap())),
    ];
    let refs: Vec<&(dyn ToSql + Sync)> = values.iter().map(Param::as_ref).collect();
    client
        .execute(
            &format!(
                "INSERT INTO {schema}.readings VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
            ),
            &refs,
        )
        .await
        .map_err(TabuaError::from_db_error)?;

    let row = client
        .query_one(&format!("SELECT * FROM {schema}.readings"), &[])
        .await
        .map_err(TabuaError::from_db_error)?;
    assert_eq!(row.get::<_, i16>("small"), 7);
    assert_eq!(row.get::<_, Option<i32>>("maybe"), Some(42));
    assert_eq!(row.get::<_, Option<f32>>("ratio"), Some(0.5));
    assert_eq!(row.get::<_, NaiveDateTime>("taken"), taken);
    assert_eq!(row.get::<_, Option<NaiveDate>>("day"), Some(taken.date()));
    assert_eq!(row.get::<_, Option<NaiveTime>>("at_time"), Some(taken.time()));
    assert_eq!(
        row.get::<_, TimeTz>("local_time").to_string(),
        "08:30:00+02:00"
    );
    assert_eq!(row.get::<_, Numeric>("amount").as_str(), "-1234.5600");
    assert_eq!(
        row.get::<_, Uuid>("ref").to_string(),
        "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"
    );
    assert_eq!(row.get::<_, Bits>("flags").as_str(), "1010");
    Ok(())
}
