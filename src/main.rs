use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;

use tasktrack::{
    auth::{AuthMiddleware, SessionService, Signer, TokenLedger},
    config::Config,
    routes::{self, health},
    state::AppState,
    store::{
        postgres::{self, PgProjectStore, PgTaskStore, PgTokenLedger, PgUserStore},
        UserStore,
    },
};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;
    info!("Loaded configuration: {:?}", config);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(io::Error::other)?;
    postgres::migrate(&pool).await.map_err(io::Error::other)?;

    let signer = Arc::new(Signer::new(config.jwt_secret.as_bytes()).map_err(io::Error::other)?);
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let ledger: Arc<dyn TokenLedger> = Arc::new(PgTokenLedger::new(pool.clone()));
    let sessions = SessionService::new(signer.clone(), ledger, users.clone(), config.session())
        .map_err(io::Error::other)?;

    let state = web::Data::new(AppState {
        users: users.clone(),
        projects: Arc::new(PgProjectStore::new(pool.clone())),
        tasks: Arc::new(PgTaskStore::new(pool)),
        sessions: Arc::new(sessions),
    });
    let auth = AuthMiddleware::new(signer, users);

    info!("Starting server at {}", config.server_url());
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(auth.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(health::health)
            .service(web::scope("/api").configure(routes::config))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
