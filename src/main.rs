mod config;
mod handlers;
mod models;
mod services;

use actix_cors::Cors;
use actix_web::web::Data;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use log::{info, warn};

use services::database::DatabaseService;
use services::push::{PushService, VapidConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env().expect("Failed to load configuration");

    let database_service = DatabaseService::new();
    let push_service = match VapidConfig::from_env() {
        Some(vapid) => {
            info!("VAPID keys configured, push delivery enabled");
            PushService::new(database_service.clone(), vapid)
        }
        None => {
            warn!("VAPID keys not configured, push delivery disabled");
            PushService::disabled(database_service.clone())
        }
    };

    let db_data = Data::new(database_service);
    let push_data = Data::new(push_service);

    info!("starting server at http://{}", config.bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .supports_credentials(),
            )
            .app_data(db_data.clone())
            .app_data(push_data.clone())
            .service(
                web::scope("/auth")
                    .service(handlers::auth::register)
                    .service(handlers::auth::login)
                    .service(handlers::auth::logout)
                    .service(handlers::auth::change_password)
                    .service(handlers::auth::request_password_reset),
            )
            .service(
                web::scope("/perfil")
                    .service(handlers::user::get_stats)
                    .service(handlers::user::get_profile)
                    .service(handlers::user::update_profile),
            )
            .service(
                web::scope("/consultas")
                    .service(handlers::appointment::list_confirmed_appointments)
                    .service(handlers::appointment::appointment_action)
                    .service(handlers::appointment::add_appointment)
                    .service(handlers::appointment::list_appointments),
            )
            .service(
                web::scope("/notificacoes")
                    .service(handlers::notification::subscribe)
                    .service(handlers::notification::mark_read)
                    .service(handlers::notification::mark_unread)
                    .service(handlers::notification::mark_all_read)
                    .service(handlers::notification::vapid_public_key)
                    .service(handlers::notification::send_test_notification)
                    .service(handlers::notification::list_notifications),
            )
            .service(handlers::notification::broadcast_test_notification)
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
