pub mod arbor;
pub mod handlers;

use std::io;

use actix_web::{App, HttpServer, middleware::Logger, web};
use log::info;

use crate::arbor::{ArborEngine, SiteConfig};

pub async fn run() -> io::Result<()> {
    let config = SiteConfig::load();
    let host = config.host.clone();
    let port = config.port;
    let mode = config.mode();

    // A broken template must keep a production process from starting at all;
    // development compiles per request and surfaces failures as 500s instead.
    let engine = ArborEngine::new(config)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, format!("{err:#}")))?;
    let engine = web::Data::new(engine);

    info!("Arbor is listening on: http://{}:{} ({})", host, port, mode);

    HttpServer::new(move || {
        let engine = engine.clone();
        App::new()
            .wrap(Logger::default())
            .configure(move |conf| handlers::config(conf, engine))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
