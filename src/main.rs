use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local;
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use rifas_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    middlewares::{AdminAuth, create_cors},
    services::{ParticipantService, RedemptionService, ReferenceService, TicketService},
    swagger::swagger_config,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let reference_service = ReferenceService::new(pool.clone());
    let ticket_service = TicketService::new(pool.clone());
    let participant_service = ParticipantService::new(pool.clone());
    let redemption_service = RedemptionService::new(
        pool.clone(),
        ticket_service.clone(),
        reference_service.clone(),
    );

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let admin_token = config.admin.api_token.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AdminAuth::new(admin_token.clone()))
            .app_data(web::Data::new(reference_service.clone()))
            .app_data(web::Data::new(ticket_service.clone()))
            .app_data(web::Data::new(participant_service.clone()))
            .app_data(web::Data::new(redemption_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api")
                    .configure(handlers::public_config)
                    .service(
                        web::scope("/admin")
                            .configure(handlers::reference_config)
                            .configure(handlers::participant_config)
                            .configure(handlers::ticket_config)
                            .configure(handlers::admin_config),
                    ),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
