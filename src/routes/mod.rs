use actix_web::http::header;
use actix_web::middleware::DefaultHeaders;
use actix_web::web;
use std::path::Path;

#[cfg(test)]
macro_rules! test_app {
    ($cfg:expr, $storage:expr) => {{
        let storage = $storage.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($cfg))
                .app_data(actix_web::web::Data::new(storage.clone()))
                .configure(|c| crate::routes::configure(c, storage.root())),
        )
        .await
    }};
}

pub mod files;
pub mod health;

/// Mounts the upload service. Stored files are served read-only under
/// `/uploads` with headers that forbid script execution and MIME sniffing.
pub fn configure(cfg: &mut web::ServiceConfig, uploads_dir: &Path) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/upload", web::post().to(files::upload_files))
        .route("/files/{filename}", web::delete().to(files::delete_file))
        .service(
            web::scope("/uploads")
                .wrap(
                    DefaultHeaders::new()
                        .add((header::CONTENT_SECURITY_POLICY, "default-src 'self'"))
                        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff")),
                )
                .service(actix_files::Files::new("", uploads_dir)),
        );
}
