use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use docshelf::config::Config;
use docshelf::routes;
use docshelf::storage::Storage;
use env_logger::Env;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Init logger to show info by default, but can be overridden by RUST_LOG
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cfg = Config::from_args()?;

    let storage = Storage::open(&cfg.uploads_dir).with_context(|| {
        format!("failed to create uploads directory {}", cfg.uploads_dir.display())
    })?;

    log::info!("Server running at http://{}", cfg.listen);
    log::info!("Files will be uploaded to: {}", storage.root().display());

    let listen_addr = cfg.listen.clone();
    let uploads_dir = storage.root().to_path_buf();
    let cfg = Data::new(cfg);
    let storage = Data::new(storage);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors(&cfg.allowed_origins))
            .app_data(cfg.clone())
            .app_data(storage.clone())
            .configure(|c| routes::configure(c, &uploads_dir))
    })
    .bind(listen_addr)?
    .run()
    .await?;
    Ok(())
}

/// Any origin when none are configured, otherwise only the listed ones.
fn cors(allowed_origins: &[String]) -> Cors {
    let cors = if allowed_origins.is_empty() {
        Cors::permissive()
    } else {
        allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "DELETE"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}
