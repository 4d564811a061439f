use crate::config::Config;
use actix_web::{HttpResponse, web};

pub async fn health_check(cfg: web::Data<Config>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "health": true,
        "version": env!("CARGO_PKG_VERSION"),
        "limits": {
            "max_files": cfg.max_files,
            "max_upload_size": cfg.max_upload_size,
            "allowed_mime_types": cfg.allowed_mime_types,
        }
    }))
}
