pub mod calendar;
pub mod db;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod store;

use crate::calendar::{CalendarConfig, CalendarIndex};
use crate::db::ChatlogDb;
use crate::request_logger::RequestLogger;
use crate::store::{MessageStore, PgTimestampSource};
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let calendar_config = CalendarConfig::from_env();
    log::info!(
        "calendar zone {}, {} population workers, queue capacity {}",
        calendar_config.zone,
        calendar_config.population_workers,
        calendar_config.queue_capacity
    );

    // Read-only API
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(ChatlogDb::init())
        .attach(cors)
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match ChatlogDb::fetch(&rocket) {
                    Some(pool) => match db::run_migrations(pool).await {
                        Ok(_) => {
                            log::info!("database migrations successful");
                            Ok(rocket)
                        }
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    },
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite(
            "Calendar Index",
            move |rocket| async move {
                match ChatlogDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        let source = PgTimestampSource::new(pool.clone());
                        let calendar = CalendarIndex::new(Arc::new(source), &calendar_config);

                        Ok(rocket.manage(calendar).manage(MessageStore::new(pool)))
                    }
                    None => {
                        log::error!("database pool not available for calendar index");
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::on_shutdown("Stop Calendar Population", |rocket| {
            Box::pin(async move {
                if let Some(calendar) = rocket.state::<CalendarIndex>() {
                    log::info!(
                        "stopping calendar population with {} pending batches",
                        calendar.population().pending()
                    );
                    calendar.shutdown().await;
                }
            })
        }))
        .mount(
            "/api/v1",
            openapi_get_routes![
                routes::health::health_check,
                routes::calendar::list_years,
                routes::calendar::list_months,
                routes::calendar::list_days,
                routes::calendar::cache_stats,
                routes::chats::list_chats,
                routes::chats::list_messages,
                routes::chats::list_day_messages,
                routes::users::list_users,
                routes::users::get_user,
            ],
        )
        .mount(
            "/api/docs/swagger",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("General", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::calendar::TimeRange;
    use crate::store::{StoreError, TimestampSource};
    use parking_lot::Mutex;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub use database::{TestDatabase, TestDatabaseError};

    /// In-memory [`TimestampSource`] for exercising the calendar without Postgres.
    #[derive(Default)]
    pub struct MemoryTimestampSource {
        messages: Mutex<HashMap<i64, Vec<i64>>>,
        unavailable: AtomicBool,
        queries: AtomicUsize,
    }

    impl MemoryTimestampSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_messages(chat_id: i64, timestamps: impl IntoIterator<Item = i64>) -> Self {
            let source = Self::new();
            for timestamp in timestamps {
                source.push(chat_id, timestamp);
            }
            source
        }

        /// Add a message timestamp to a chat.
        pub fn push(&self, chat_id: i64, timestamp: i64) {
            self.messages.lock().entry(chat_id).or_default().push(timestamp);
        }

        /// Make every following query fail with [`StoreError::Unavailable`].
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Number of queries answered or rejected so far.
        pub fn query_count(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[rocket::async_trait]
    impl TimestampSource for MemoryTimestampSource {
        async fn timestamps(&self, chat_id: i64, range: TimeRange) -> Result<Vec<i64>, StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("archive offline".to_string()));
            }

            let mut timestamps: Vec<i64> = self
                .messages
                .lock()
                .get(&chat_id)
                .map(|all| all.iter().copied().filter(|ts| range.contains(*ts)).collect())
                .unwrap_or_default();
            timestamps.sort_unstable();
            Ok(timestamps)
        }
    }

    /// Seeds archive rows for database-backed tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        pub async fn insert_chat(
            &self,
            id: i64,
            kind: &str,
            title: Option<&str>,
            username: Option<&str>,
        ) -> Result<(), sqlx::Error> {
            sqlx::query("INSERT INTO chats (id, kind, title, username) VALUES ($1, $2, $3, $4)")
                .bind(id)
                .bind(kind)
                .bind(title)
                .bind(username)
                .execute(self.pool)
                .await?;

            Ok(())
        }

        pub async fn insert_user(
            &self,
            id: i64,
            username: Option<&str>,
            first_name: &str,
            last_name: Option<&str>,
        ) -> Result<(), sqlx::Error> {
            sqlx::query(
                "INSERT INTO users (id, username, first_name, last_name) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(username)
            .bind(first_name)
            .bind(last_name)
            .execute(self.pool)
            .await?;

            Ok(())
        }

        pub async fn insert_message(
            &self,
            chat_id: i64,
            message_id: i64,
            from_name: Option<&str>,
            date: i64,
            text: Option<&str>,
        ) -> Result<(), sqlx::Error> {
            sqlx::query(
                "INSERT INTO messages (chat_id, message_id, from_name, date, text) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(chat_id)
            .bind(message_id)
            .bind(from_name)
            .bind(date)
            .bind(text)
            .execute(self.pool)
            .await?;

            Ok(())
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::{ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner};
        use testcontainers_modules::postgres::Postgres;
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("TEST_DATABASE_URL not set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database for integration tests, migrated on creation.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Create a scratch database on the server named by `TEST_DATABASE_URL`.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                let url = std::env::var("TEST_DATABASE_URL")
                    .map_err(|_| TestDatabaseError::MissingUrl)?;
                Self::provision(&url, None).await
            }

            /// Create a scratch database inside a disposable Postgres container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().start().await?;
                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::provision(&url, Some(container)).await
            }

            async fn provision(
                url: &str,
                container: Option<ContainerAsync<Postgres>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                // Generated identifier; CREATE DATABASE cannot take bind parameters.
                let database_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", database_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.database(&database_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name,
                    container,
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the scratch database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database(self.admin_options.clone(), &self.database_name).await?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_sql = format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", database_name);
            sqlx::query(&drop_sql).execute(&admin_pool).await?;
            Ok(())
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let database_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database(admin_options, &database_name).await;
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for Rocket instances used by route tests.
    type ManageFn = Box<dyn FnOnce(Rocket<Build>) -> Rocket<Build> + Send>;

    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        states: Vec<ManageFn>,
    }

    impl TestRocketBuilder {
        /// Random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                states: Vec::new(),
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Put `state` in Rocket's managed state, e.g. a `CalendarIndex`.
        pub fn manage<T: Send + Sync + 'static>(mut self, state: T) -> Self {
            self.states.push(Box::new(move |rocket| rocket.manage(state)));
            self
        }

        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            for manage in self.states {
                rocket = manage(rocket);
            }

            rocket
        }

        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
