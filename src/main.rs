use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::io;
use std::sync::Arc;

use kinship::api::{self, AppState};
use kinship::auth::AuthService;
use kinship::config::Config;
use kinship::service::SocialService;
use kinship::store::Store;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // Initialize store
    let store = Arc::new(
        Store::with_timeout(&config.database_path, config.query_timeout)
            .map_err(io::Error::other)?,
    );
    log::info!("Database: {}", config.database_path);

    // Initialize auth and the service on top of the store
    let auth_service = Arc::new(AuthService::new(
        config.jwt_secret.clone(),
        chrono::Duration::hours(config.jwt_expire_hours),
        config.bcrypt_cost,
    ));
    let service = Arc::new(SocialService::new(store.clone(), auth_service.clone()));

    log::info!("Starting kinship server on port {}", config.port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            // AuthService is registered on its own for the AuthUser extractor
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(AppState {
                service: service.clone(),
            }))
            .configure(api::configure_routes)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
