//! Seeded Postgres fixture for repository tests.
//!
//! Set `RENTALS_TEST_DATABASE_URL` to a scratch database; the fixture drops
//! and recreates the `rentals` and `users` tables on every run.

use anyhow::Context;
use rentals::config::DatabaseConfig;
use std::{env, future::Future, sync::Once};
use tokio_postgres::{config::Host, Client, Config as PgConfig, NoTls};

pub const DATABASE_URL_ENV: &str = "RENTALS_TEST_DATABASE_URL";

static TRACING_INIT: Once = Once::new();

const SCHEMA: &str = r#"
DROP TABLE IF EXISTS rentals;
DROP TABLE IF EXISTS users;

CREATE TABLE users (
    id integer PRIMARY KEY,
    first_name text NOT NULL,
    last_name text NOT NULL
);

CREATE TABLE rentals (
    id integer PRIMARY KEY,
    user_id integer,
    name text,
    type text,
    description text,
    sleeps integer,
    price_per_day bigint,
    home_city text,
    home_state text,
    home_zip text,
    home_country text,
    vehicle_make text,
    vehicle_model text,
    vehicle_year integer,
    vehicle_length numeric(4, 2),
    lat double precision,
    lng double precision,
    primary_image_url text
);
"#;

// Portland sits ~50 miles from Salem and ~170 miles from Seattle.
const SEED: &str = r#"
INSERT INTO users (id, first_name, last_name) VALUES
    (1, 'John', 'Smith'),
    (2, 'Jane', 'Doe');

INSERT INTO rentals (id, user_id, name, type, description, sleeps, price_per_day,
    home_city, home_state, home_zip, home_country, vehicle_make, vehicle_model,
    vehicle_year, vehicle_length, lat, lng, primary_image_url) VALUES
    (1, 1, 'Salem Camper', 'camper-van', 'Cozy van', 4, 9000,
        'Salem', 'OR', '97301', 'US', 'Volkswagen', 'Vanagon',
        1985, 15.00, 44.94, -123.03, 'https://example.com/1.png'),
    (2, 2, 'Seattle Trailer', 'trailer', 'Big trailer', 6, 15000,
        'Seattle', 'WA', '98101', 'US', 'Airstream', 'Classic',
        2015, 30.50, 47.61, -122.33, 'https://example.com/2.png'),
    (3, 1, 'Portland Class C', 'class-c', 'Motorhome', 5, 12000,
        'Portland', 'OR', '97201', 'US', 'Ford', 'E-450',
        2005, 24.00, 45.52, -122.68, 'https://example.com/3.png'),
    (4, NULL, 'Ownerless Van', 'camper-van', 'No owner yet', 2, 5000,
        'Eugene', 'OR', '97401', 'US', 'Dodge', 'Sprinter',
        2010, 19.00, 44.05, -123.09, 'https://example.com/4.png'),
    (5, 2, 'Broken Listing', 'camper-van', NULL, 2, 7000,
        'Bend', 'OR', '97701', 'US', 'Ford', 'Transit',
        2018, 20.00, 44.06, -121.31, 'https://example.com/5.png');
"#;

/// Runs `test` against the seeded fixture, or skips when no database is
/// configured.
pub async fn with_seeded_database<F, Fut>(test: F)
where
    F: FnOnce(DatabaseConfig) -> Fut,
    Fut: Future<Output = ()>,
{
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });

    let Ok(url) = env::var(DATABASE_URL_ENV) else {
        eprintln!("[rentals-test] skipping: {DATABASE_URL_ENV} is not set");
        return;
    };

    let client = connect(&url).await.expect("failed to connect to fixture");
    client
        .batch_execute(SCHEMA)
        .await
        .expect("failed to create fixture schema");
    client
        .batch_execute(SEED)
        .await
        .expect("failed to seed fixture");

    let database = database_config(&url).expect("invalid fixture database url");
    test(database).await;
}

async fn connect(url: &str) -> anyhow::Result<Client> {
    let config: PgConfig = url.parse().context("invalid database url")?;
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            eprintln!("[rentals-test] fixture connection error: {err}");
        }
    });
    Ok(client)
}

fn database_config(url: &str) -> anyhow::Result<DatabaseConfig> {
    let config: PgConfig = url.parse()?;
    let host = match config.get_hosts().first() {
        Some(Host::Tcp(host)) => host.clone(),
        _ => anyhow::bail!("fixture database must be reachable over TCP"),
    };

    Ok(DatabaseConfig {
        host,
        port: config.get_ports().first().copied().unwrap_or(5432),
        username: config
            .get_user()
            .context("fixture database url must include a user")?
            .to_string(),
        password: config
            .get_password()
            .map(|password| String::from_utf8_lossy(password).into_owned())
            .unwrap_or_default(),
        name: config
            .get_dbname()
            .context("fixture database url must include a database name")?
            .to_string(),
        ssl_root_cert: None,
        ssl_cert: None,
        ssl_key: None,
    })
}
