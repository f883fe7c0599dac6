use actix::Actor;
use actix_cors::Cors;
use actix_web::middleware::{Condition, Logger};
use actix_web::{web, App, HttpServer};
use clap::Parser;

use presence_server::admin::{sessions_control, RoomDirectory};
use presence_server::config::Config;
use presence_server::connection::ConnectionIdSource;
use presence_server::handlers;
use presence_server::host::RoomHost;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = Config::parse();
    log::info!("Serving room {} on {}", config.room, config.bind);

    let host = RoomHost::new(
        config.room.clone(),
        config.message_policy(),
        config.hibernate_after(),
    )
    .start();
    let directory = RoomDirectory::new();
    directory.publish(&config.room, host.clone());
    let control = sessions_control(config.admin_transport, host.clone(), directory, &config.room);
    let connection_ids = web::Data::new(ConnectionIdSource::new());
    let heartbeat = web::Data::new(config.heartbeat());
    let permissive_cors = config.permissive_cors;

    HttpServer::new(move || {
        App::new()
            .wrap(Condition::new(permissive_cors, Cors::permissive()))
            .wrap(Logger::default())
            .data(host.clone())
            .data(control.clone())
            .app_data(connection_ids.clone())
            .app_data(heartbeat.clone())
            .configure(handlers::root)
            .default_service(web::route().to(handlers::bad_request))
    })
    .bind(&config.bind)?
    .run()
    .await
}
