mod auth;
mod database;
mod errors;
mod handlers;
mod models;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::env;

use crate::database::Database;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_address = format!("{}:{}", host, port);

    let database_url = env::var("DATABASE_URL").map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "DATABASE_URL must be set in environment",
        )
    })?;

    let db = Database::connect(&database_url).await.map_err(|err| {
        log::error!("Failed to initialize database: {err:?}");
        std::io::Error::other(err)
    })?;

    let db_data = web::Data::new(db);

    log::info!("Starting LocalBiz Directory Service on {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(db_data.clone())
            // Keep extractor failures inside the standard error envelope
            .app_data(errors::json_config())
            .app_data(errors::query_config())
            .app_data(errors::path_config())
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                web::scope("/api")
                    // Health
                    .service(handlers::health_check)
                    // Businesses
                    .service(handlers::list_businesses)
                    .service(handlers::list_my_businesses)
                    .service(handlers::get_business)
                    .service(handlers::create_business)
                    .service(handlers::update_business)
                    .service(handlers::delete_business)
                    // Reviews
                    .service(handlers::list_reviews_for_business)
                    .service(handlers::create_review)
                    .service(handlers::update_review)
                    .service(handlers::delete_review)
                    .service(handlers::respond_to_review)
                    .service(handlers::mark_review_helpful),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
