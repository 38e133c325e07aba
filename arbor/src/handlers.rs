use actix_files::Files;
use actix_web::{HttpResponse, Responder, get, web};
use log::error;

use crate::arbor::{ArborEngine, Mode};

pub fn config(conf: &mut web::ServiceConfig, engine: web::Data<ArborEngine>) {
    if engine.mode() == Mode::Development {
        // Reserved for a reverse proxy to the backend API.
        conf.service(web::scope("/api").default_service(web::to(api_stub)));
    }

    conf.service(
        Files::new("/assets", engine.assets_root())
            .prefer_utf8(true)
            .use_last_modified(true),
    );

    conf.app_data(engine);
    conf.service(index_handler);
    conf.default_service(web::to(not_found));
}

#[get("/")]
pub async fn index_handler(engine: web::Data<ArborEngine>) -> impl Responder {
    match engine.render_index() {
        Ok(html) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(html),
        Err(err) => {
            error!("failed to render index: {err:#}");
            HttpResponse::InternalServerError().body("500 internal server error")
        }
    }
}

async fn api_stub() -> impl Responder {
    HttpResponse::Ok().finish()
}

async fn not_found() -> impl Responder {
    HttpResponse::NotFound().finish()
}
