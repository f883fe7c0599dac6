use std::sync::Arc;

use actix::Addr;
use actix_web::error;
use actix_web::web::{self, HttpRequest, HttpResponse};
use actix_web::Responder;
use actix_web::Result;
use askama_actix::Template;

use crate::admin::SessionsControl;
use crate::host::{GetStats, RoomHost};

#[derive(Template)]
#[template(path = "admin-index.html")]
pub struct AdminIndexTemplate {
    room: String,
    participants: usize,
    connections: usize,
    awake: bool,
    generation: u32,
    close_sessions_action: String,
}

pub fn configure_admin_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(
                web::resource("")
                    .name("admin_index")
                    .route(web::get().to(admin_index)),
            )
            .service(
                web::resource("/close-sessions")
                    .name("admin_close_sessions")
                    .route(web::post().to(close_sessions)),
            ),
    );
}

pub async fn admin_index(
    req: HttpRequest,
    host: web::Data<Addr<RoomHost>>,
) -> Result<impl Responder> {
    let stats = host
        .send(GetStats)
        .await
        .map_err(|_| error::ErrorInternalServerError("Room host unavailable"))?;
    let close_sessions_action = req
        .url_for_static("admin_close_sessions")
        .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))?
        .to_string();

    Ok(AdminIndexTemplate {
        room: stats.room,
        participants: stats.participants,
        connections: stats.connections,
        awake: stats.awake,
        generation: stats.generation,
        close_sessions_action,
    })
}

pub async fn close_sessions(
    req: HttpRequest,
    control: web::Data<Arc<dyn SessionsControl>>,
) -> Result<HttpResponse> {
    let closed = control.close_sessions().await.map_err(|err| {
        log::error!("Closing sessions failed: {}", err);
        error::ErrorInternalServerError(err.to_string())
    })?;
    log::info!("Admin closed {} sessions", closed);

    let redirect_to = req
        .url_for_static("admin_index")
        .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))?
        .to_string();

    Ok(HttpResponse::Found()
        .header("Location", redirect_to)
        .finish())
}
