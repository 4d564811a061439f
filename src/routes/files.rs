use crate::{
    config::Config,
    errors::ApiError,
    models::{file::UPLOAD_FIELD, FileDescriptor},
    storage::{Storage, StorageError},
};
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt as _;

/// A validated upload held in memory until the whole request checks out.
struct PendingFile {
    original_name: String,
    data: Vec<u8>,
}

pub async fn upload_files(
    cfg: web::Data<Config>,
    storage: web::Data<Storage>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut pending: Vec<PendingFile> = Vec::new();
    while let Some(field) = payload
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("invalid multipart".into()))?
    {
        if let Some(file) = read_file_field(&cfg, field, pending.len()).await? {
            pending.push(file);
        }
    }
    if pending.is_empty() {
        return Err(ApiError::BadRequest("no files uploaded".into()));
    }

    let files = web::block(move || store_all(&storage, pending))
        .await
        .map_err(|_| ApiError::Internal("failed to upload files"))??;

    log::info!(
        "Successfully uploaded {} files to {}",
        files.len(),
        cfg.uploads_dir.display()
    );
    Ok(HttpResponse::Ok().json(files))
}

/// Reads one part. Plain form values yield `None`; file parts are checked
/// against the count, type and size limits before being returned.
async fn read_file_field(
    cfg: &Config,
    mut field: Field,
    accepted: usize,
) -> Result<Option<PendingFile>, ApiError> {
    let filename = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .map(str::to_string);
    let Some(original_name) = filename else {
        while field
            .try_next()
            .await
            .map_err(|_| ApiError::BadRequest("invalid multipart".into()))?
            .is_some()
        {}
        return Ok(None);
    };

    let field_name = field.name().unwrap_or("").to_string();
    if field_name != UPLOAD_FIELD {
        return Err(ApiError::BadRequest(format!("unexpected field {field_name:?}")));
    }
    if accepted >= cfg.max_files {
        return Err(ApiError::BadRequest(format!(
            "too many files, maximum is {}",
            cfg.max_files
        )));
    }
    let declared = field.content_type().map(|m| m.essence_str().to_string());
    if !declared.as_deref().is_some_and(|m| cfg.is_allowed_mime(m)) {
        log::warn!("rejected upload {original_name:?} with type {declared:?}");
        return Err(ApiError::BadRequest("only PDF files are allowed".into()));
    }

    let mut data: Vec<u8> = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("upload read error".into()))?
    {
        data.extend_from_slice(&chunk);
        if data.len() > cfg.max_upload_size {
            return Err(ApiError::BadRequest(format!(
                "file too large, maximum size is {} MiB",
                cfg.max_upload_size_mib()
            )));
        }
    }

    // Stricter than the declared-type filter alone: a part declared as PDF
    // whose bytes sniff as another known format is refused too.
    if let Some(kind) = infer::get(&data) {
        if !cfg.is_allowed_mime(kind.mime_type()) {
            log::warn!(
                "rejected upload {original_name:?}: declared {declared:?}, content looks like {}",
                kind.mime_type()
            );
            return Err(ApiError::BadRequest("only PDF files are allowed".into()));
        }
    }

    Ok(Some(PendingFile {
        original_name,
        data,
    }))
}

fn store_all(storage: &Storage, pending: Vec<PendingFile>) -> Result<Vec<FileDescriptor>, ApiError> {
    let total = pending.len();
    let mut stored = Vec::with_capacity(total);
    for file in pending {
        match storage.store(&file.original_name, &file.data) {
            Ok(d) => stored.push(d),
            Err(e) => {
                log::error!(
                    "Error handling file upload ({} of {total} already stored): {e:?}",
                    stored.len()
                );
                return Err(ApiError::Internal("failed to upload files"));
            }
        }
    }
    Ok(stored)
}

pub async fn delete_file(
    storage: web::Data<Storage>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let filename = path.into_inner();
    let name = filename.clone();
    let result = web::block(move || storage.delete(&name))
        .await
        .map_err(|_| ApiError::Internal("failed to delete file"))?;

    match result {
        Ok(()) => {
            log::info!("Successfully deleted file: {filename}");
            Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "file deleted successfully" })))
        }
        Err(StorageError::Io(e)) => {
            log::error!("Error deleting file {filename:?}: {e:?}");
            Err(ApiError::Internal("failed to delete file"))
        }
        Err(e) => {
            log::warn!("Refused delete of {filename:?}: {e}");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::Config, models::FileDescriptor, storage::Storage};
    use actix_web::{http::header, http::StatusCode, test};
    use std::fs;

    const BOUNDARY: &str = "docshelf-test-boundary";

    struct Part<'a> {
        field: &'a str,
        filename: Option<&'a str>,
        content_type: Option<&'a str>,
        data: &'a [u8],
    }

    fn pdf<'a>(filename: &'a str, data: &'a [u8]) -> Part<'a> {
        Part {
            field: "files",
            filename: Some(filename),
            content_type: Some("application/pdf"),
            data,
        }
    }

    fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for p in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let mut cd = format!("Content-Disposition: form-data; name=\"{}\"", p.field);
            if let Some(f) = p.filename {
                cd.push_str(&format!("; filename=\"{f}\""));
            }
            body.extend_from_slice(cd.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(ct) = p.content_type {
                body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(p.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(parts: &[Part<'_>]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart(parts))
    }

    fn setup(cfg: Config) -> (tempfile::TempDir, Config, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path().join("uploads")).unwrap();
        let cfg = Config {
            uploads_dir: storage.root().to_path_buf(),
            ..cfg
        };
        (dir, cfg, storage)
    }

    fn stored_count(storage: &Storage) -> usize {
        fs::read_dir(storage.root()).unwrap().count()
    }

    #[actix_web::test]
    async fn uploads_are_stored_and_described_in_order() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let resp = test::call_service(
            &app,
            upload_request(&[
                pdf("first.pdf", b"%PDF-1.4 one"),
                pdf("second.pdf", b"%PDF-1.4 two"),
                pdf("third.pdf", b"%PDF-1.4 three"),
            ]).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let files: Vec<FileDescriptor> = test::read_body_json(resp).await;

        let names: Vec<_> = files.iter().map(|f| f.original_name.as_str()).collect();
        assert_eq!(names, ["first.pdf", "second.pdf", "third.pdf"]);
        for f in &files {
            assert_eq!(f.id, f.stored_name.id());
            assert!(storage.root().join(f.stored_name.as_str()).is_file());
        }
        assert_eq!(files[2].size, 14);
        assert_eq!(stored_count(&storage), 3);
    }

    #[actix_web::test]
    async fn non_pdf_is_rejected_and_nothing_is_stored() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let text = Part {
            field: "files",
            filename: Some("notes.txt"),
            content_type: Some("text/plain"),
            data: b"hello",
        };
        let resp = test::call_service(
            &app,
            upload_request(&[pdf("ok.pdf", b"%PDF-1.4"), text]).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "only PDF files are allowed");
        assert_eq!(stored_count(&storage), 0);
    }

    #[actix_web::test]
    async fn content_that_is_not_a_pdf_is_rejected() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        let resp = test::call_service(&app, upload_request(&[pdf("fake.pdf", png)]).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stored_count(&storage), 0);
    }

    #[actix_web::test]
    async fn six_files_hit_the_count_limit() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let parts: Vec<_> = (0..6).map(|_| pdf("many.pdf", b"%PDF-1.4")).collect();
        let resp = test::call_service(&app, upload_request(&parts).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("too many files"));
        assert_eq!(stored_count(&storage), 0);
    }

    #[actix_web::test]
    async fn oversized_file_is_rejected() {
        let (_dir, cfg, storage) = setup(Config {
            max_upload_size: 1024,
            ..Config::default()
        });
        let app = test_app!(cfg, storage);

        let mut big = b"%PDF-1.4".to_vec();
        big.resize(1025, b'x');
        let resp = test::call_service(&app, upload_request(&[pdf("big.pdf", &big)]).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("file too large"));
        assert_eq!(stored_count(&storage), 0);
    }

    #[actix_web::test]
    async fn request_without_files_is_rejected() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let note = Part {
            field: "comment",
            filename: None,
            content_type: None,
            data: b"just text",
        };
        let resp = test::call_service(&app, upload_request(&[note]).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "no files uploaded");
    }

    #[actix_web::test]
    async fn file_under_another_field_is_rejected() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let part = Part {
            field: "file",
            ..pdf("a.pdf", b"%PDF-1.4")
        };
        let resp = test::call_service(&app, upload_request(&[part]).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stored_count(&storage), 0);
    }

    #[actix_web::test]
    async fn round_trip_upload_serve_delete() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let mut data = b"%PDF-1.7\n".to_vec();
        data.resize(2 * 1024 * 1024, 0);
        let resp = test::call_service(&app, upload_request(&[pdf("a.pdf", &data)]).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let files: Vec<FileDescriptor> = test::read_body_json(resp).await;
        assert_eq!(files.len(), 1);
        let f = &files[0];
        assert_eq!(f.size, 2 * 1024 * 1024);
        assert_eq!(f.original_name, "a.pdf");

        let get = test::TestRequest::get()
            .uri(&format!("/uploads/{}", f.stored_name))
            .to_request();
        let resp = test::call_service(&app, get).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_SECURITY_POLICY).unwrap(),
            "default-src 'self'"
        );
        assert_eq!(resp.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        let served = test::read_body(resp).await;
        assert_eq!(served.len(), data.len());

        let del = test::TestRequest::delete()
            .uri(&format!("/files/{}", f.stored_name))
            .to_request();
        let resp = test::call_service(&app, del).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "file deleted successfully");
        assert!(!storage.root().join(f.stored_name.as_str()).exists());

        let get = test::TestRequest::get()
            .uri(&format!("/uploads/{}", f.stored_name))
            .to_request();
        let resp = test::call_service(&app, get).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let del = test::TestRequest::delete()
            .uri(&format!("/files/{}", f.stored_name))
            .to_request();
        let resp = test::call_service(&app, del).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn deleting_unknown_file_is_not_found() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let del = test::TestRequest::delete().uri("/files/1700000000000-1.pdf").to_request();
        let resp = test::call_service(&app, del).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "file not found");
    }

    #[actix_web::test]
    async fn parent_reference_is_forbidden() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let del = test::TestRequest::delete().uri("/files/..").to_request();
        let resp = test::call_service(&app, del).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(storage.root().is_dir());
    }

    #[actix_web::test]
    async fn write_failure_is_an_internal_error() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);
        fs::remove_dir_all(storage.root()).unwrap();

        let resp = test::call_service(&app, upload_request(&[pdf("a.pdf", b"%PDF-1.4")]).to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "failed to upload files");
    }

    #[cfg(unix)]
    #[actix_web::test]
    async fn unresolvable_delete_is_an_internal_error() {
        let (_dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);

        let del = test::TestRequest::delete()
            .uri(&format!("/files/{}.pdf", "a".repeat(300)))
            .to_request();
        let resp = test::call_service(&app, del).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "failed to delete file");
    }

    #[cfg(unix)]
    #[actix_web::test]
    async fn symlink_out_of_the_root_is_forbidden() {
        let (dir, cfg, storage) = setup(Config::default());
        let app = test_app!(cfg, storage);
        let outside = dir.path().join("secret.pdf");
        fs::write(&outside, b"keep").unwrap();
        std::os::unix::fs::symlink(&outside, storage.root().join("evil.pdf")).unwrap();

        let del = test::TestRequest::delete().uri("/files/evil.pdf").to_request();
        let resp = test::call_service(&app, del).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid file path");
        assert_eq!(fs::read(&outside).unwrap(), b"keep");
    }
}
