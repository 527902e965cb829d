use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::models::{ConversionResponse, FileKind, PageRange, PdfInfoResponse, StorageStats, UploadedFile};
use crate::services::{allowed_file, output_name};

const FILES_FIELD: &str = "files[]";
const FILE_FIELD: &str = "file";

pub async fn images_to_pdf_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ConversionResponse>> {
    let form = read_form(&mut multipart, state.max_file_size_mb).await?;
    let uploads = form.files_for(FILES_FIELD, FileKind::Image)?;

    let output = output_name("converted");
    let inputs = save_uploads(&state, &uploads)?;

    let converter = state.converter.clone();
    let (paths, target) = (inputs.clone(), output.clone());
    let result = tokio::task::spawn_blocking(move || converter.images_to_pdf(&paths, &target)).await;
    cleanup_inputs(&state, &inputs);
    result??;

    Ok(Json(ConversionResponse::new(
        "Images converted to PDF successfully",
        output,
    )))
}

pub async fn merge_pdfs_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ConversionResponse>> {
    let form = read_form(&mut multipart, state.max_file_size_mb).await?;
    let uploads = form.files_for(FILES_FIELD, FileKind::Pdf)?;

    let output = output_name("merged");
    let inputs = save_uploads(&state, &uploads)?;

    let converter = state.converter.clone();
    let (paths, target) = (inputs.clone(), output.clone());
    let result = tokio::task::spawn_blocking(move || converter.merge_pdfs(&paths, &target)).await;
    cleanup_inputs(&state, &inputs);
    result??;

    Ok(Json(ConversionResponse::new("PDFs merged successfully", output)))
}

pub async fn split_pdf_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ConversionResponse>> {
    let form = read_form(&mut multipart, state.max_file_size_mb).await?;
    let upload = form.single_file(FILE_FIELD, FileKind::Pdf)?;
    let range = PageRange::from_form(form.field("start_page"), form.field("end_page"));

    let output = output_name("split");
    let input = state.storage.save_file(&upload)?;

    let converter = state.converter.clone();
    let (path, target) = (input.clone(), output.clone());
    let result =
        tokio::task::spawn_blocking(move || converter.split_pdf(&path, range, &target)).await;
    cleanup_inputs(&state, std::slice::from_ref(&input));
    result??;

    Ok(Json(ConversionResponse::new("PDF split successfully", output)))
}

pub async fn pdf_info_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<PdfInfoResponse>> {
    let form = read_form(&mut multipart, state.max_file_size_mb).await?;
    let upload = form.single_file(FILE_FIELD, FileKind::Pdf)?;
    let input = state.storage.save_file(&upload)?;

    let converter = state.converter.clone();
    let path = input.clone();
    let result = tokio::task::spawn_blocking(move || converter.get_pdf_info(&path)).await;
    cleanup_inputs(&state, std::slice::from_ref(&input));
    let info = result??;

    info!(file_name = %upload.name, pages = info.pages, "PDF info read");
    Ok(Json(PdfInfoResponse {
        success: true,
        info,
    }))
}

pub async fn download_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let path = state.storage.resolve(&filename)?;

    // The sweeper may have removed it since `resolve` looked.
    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found(filename));
        }
        Err(e) => return Err(e.into()),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(filename);
    info!(file_name = %name, size = content.len(), "Serving download");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        content,
    )
        .into_response())
}

pub async fn stats_handler(State(state): State<AppState>) -> AppResult<Json<StorageStats>> {
    let cleanup = state.cleanup.clone();
    let stats = tokio::task::spawn_blocking(move || cleanup.folder_stats()).await?;
    Ok(Json(stats))
}

/// Multipart form contents: uploaded files by field plus plain text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    files: Vec<(String, UploadedFile)>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Every file sent under `field`, after checking each extension against `kind`.
    pub fn files_for(&self, field: &str, kind: FileKind) -> AppResult<Vec<UploadedFile>> {
        let files: Vec<UploadedFile> = self
            .files
            .iter()
            .filter(|(name, _)| name == field)
            .map(|(_, file)| file.clone())
            .collect();

        if files.is_empty() {
            return Err(AppError::MissingFile);
        }
        if let Some(rejected) = files.iter().find(|f| !allowed_file(&f.name, kind)) {
            warn!(file_name = %rejected.name, kind = ?kind, "Upload rejected by extension");
            return Err(AppError::invalid_input(format!(
                "file type not allowed: {}",
                rejected.name
            )));
        }
        Ok(files)
    }

    pub fn single_file(&self, field: &str, kind: FileKind) -> AppResult<UploadedFile> {
        self.files_for(field, kind)?
            .into_iter()
            .next()
            .ok_or(AppError::MissingFile)
    }
}

/// Drain the multipart body. Parts with an empty filename are what browsers
/// send for an untouched file input, so they are skipped.
pub async fn read_form(multipart: &mut Multipart, limit_mb: usize) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit_mb))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(|ct| ct.to_string());
                let data = field.bytes().await.map_err(|e| multipart_error(e, limit_mb))?;
                if file_name.is_empty() {
                    continue;
                }

                let mut file = UploadedFile::new(file_name, data);
                if let Some(mime_type) = content_type {
                    file = file.with_mime_type(mime_type);
                }
                debug!(
                    field = %field_name,
                    file_name = %file.name,
                    size = file.size,
                    mime_type = ?file.mime_type,
                    "Received upload"
                );
                form.files.push((field_name, file));
            }
            None => {
                let value = field.text().await.map_err(|e| multipart_error(e, limit_mb))?;
                form.fields.insert(field_name, value);
            }
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError, limit_mb: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge { limit: limit_mb }
    } else {
        AppError::invalid_input(format!("failed to read multipart body: {}", err.body_text()))
    }
}

fn save_uploads(state: &AppState, uploads: &[UploadedFile]) -> AppResult<Vec<PathBuf>> {
    let start = Instant::now();
    let mut saved = Vec::with_capacity(uploads.len());
    for upload in uploads {
        match state.storage.save_file(upload) {
            Ok(path) => saved.push(path),
            Err(e) => {
                error!(file_name = %upload.name, error = %e, "Failed to save upload");
                cleanup_inputs(state, &saved);
                return Err(e);
            }
        }
    }
    debug!(
        count = saved.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Uploads saved"
    );
    Ok(saved)
}

/// Best effort: anything left behind is reclaimed by the sweeper.
fn cleanup_inputs(state: &AppState, inputs: &[PathBuf]) {
    for path in inputs {
        if let Err(e) = state.storage.delete_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to delete transient input");
        }
    }
}
