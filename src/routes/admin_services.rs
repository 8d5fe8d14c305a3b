// Admin service management - the "agregar servicio" and "modificar servicio" forms
// Endpoints: POST   /v1/admin/services
//            PATCH  /v1/admin/services/:service_id
//            DELETE /v1/admin/services/:service_id/images?url=
//            DELETE /v1/admin/services/:service_id/images/:image_id

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, patch, post},
    Json, Router,
};
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Value};

use super::require_service;
use crate::auth::AuthUser;
use crate::error::{internal, ApiError};
use crate::models::{ImageUpload, Service, ServiceFields, StatusResponse};
use crate::services::cloudinary::service_folder;
use crate::validation;
use crate::AppState;

/// Photos come straight from phones, so allow a few large files per request
const MAX_FORM_BYTES: usize = 25 * 1024 * 1024;

/// Multipart form shared by create and update
#[derive(Debug, Default)]
struct ServiceForm {
    name: Option<String>,
    description: Option<String>,
    price_range: Option<String>,
    images: Vec<ImageUpload>,
}

impl ServiceForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ServiceForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation(format!("Invalid form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "name" | "description" | "price_range" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::validation(format!("Invalid {} field: {}", name, e)))?;
                    match name.as_str() {
                        "name" => form.name = Some(text),
                        "description" => form.description = Some(text),
                        _ => form.price_range = Some(text),
                    }
                }
                "images" | "images[]" | "image" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::validation(format!("Invalid image upload: {}", e)))?;

                    // Browsers send an empty part when no file was picked
                    if bytes.is_empty() && filename.is_empty() {
                        continue;
                    }
                    if !content_type.is_empty() && !content_type.starts_with("image/") {
                        return Err(ApiError::validation(format!("{} is not an image", filename)));
                    }
                    form.images.push(ImageUpload {
                        filename: if filename.is_empty() { "image".to_string() } else { filename },
                        bytes: bytes.to_vec(),
                    });
                }
                other => tracing::debug!("Ignoring unknown form field {}", other),
            }
        }

        Ok(form)
    }

    /// Name, description and price range, all required
    fn fields(&self) -> Result<ServiceFields, ApiError> {
        Ok(ServiceFields {
            name: validation::require("name", self.name.as_deref())?,
            description: validation::require("description", self.description.as_deref())?,
            price_range: validation::require("price_range", self.price_range.as_deref())?,
        })
    }
}

/// Upload every image before anything is written; one failure aborts the lot
async fn upload_all(
    state: &AppState,
    images: Vec<ImageUpload>,
    service_name: &str,
) -> Result<Vec<String>, ApiError> {
    let folder = service_folder(service_name);
    try_join_all(images.into_iter().map(|image| {
        let folder = folder.clone();
        async move {
            state
                .cloudinary
                .upload_image(image.bytes, &image.filename, &folder)
                .await
        }
    }))
    .await
    .map_err(|e| {
        tracing::error!("Image upload failed: {}", e);
        ApiError::Upstream("Failed to upload images".to_string())
    })
}

async fn attach_images(state: &AppState, service_id: &str, urls: &[String]) -> Result<(), ApiError> {
    try_join_all(urls.iter().map(|url| state.firestore.add_service_image(service_id, url)))
        .await
        .map_err(internal("Failed to save image references"))?;
    Ok(())
}

/// POST /v1/admin/services
async fn create_service(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Service>), ApiError> {
    let form = ServiceForm::read(multipart).await?;
    let fields = form.fields()?;
    if form.images.is_empty() {
        return Err(ApiError::validation("At least one image is required"));
    }

    tracing::info!(
        "Admin {} creating service {} with {} images",
        user.uid,
        fields.name,
        form.images.len()
    );

    let urls = upload_all(&state, form.images, &fields.name).await?;
    let mut service = state
        .firestore
        .create_service(&fields)
        .await
        .map_err(internal("Failed to create service"))?;
    attach_images(&state, &service.id, &urls).await?;

    service.images = state
        .firestore
        .list_service_images(&service.id)
        .await
        .map_err(internal("Failed to reload images"))?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// PATCH /v1/admin/services/:service_id - new images are appended
async fn update_service(
    State(state): State<AppState>,
    user: AuthUser,
    Path(service_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Service>, ApiError> {
    let form = ServiceForm::read(multipart).await?;
    let fields = form.fields()?;
    require_service(&state, &service_id).await?;

    tracing::info!(
        "Admin {} updating service {} ({} new images)",
        user.uid,
        service_id,
        form.images.len()
    );

    let urls = upload_all(&state, form.images, &fields.name).await?;
    state
        .firestore
        .update_service(&service_id, &fields)
        .await
        .map_err(internal("Failed to update service"))?
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))?;
    attach_images(&state, &service_id, &urls).await?;

    state
        .firestore
        .get_service(&service_id)
        .await
        .map_err(internal("Failed to reload service"))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))
}

/// DELETE /v1/admin/services/:service_id/images/:image_id
async fn delete_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path((service_id, image_id)): Path<(String, String)>,
) -> Result<Json<StatusResponse>, ApiError> {
    tracing::info!("Admin {} removing image {} from service {}", user.uid, image_id, service_id);
    state
        .firestore
        .delete_service_image(&service_id, &image_id)
        .await
        .map_err(internal("Failed to delete image"))?;
    Ok(Json(StatusResponse::ok()))
}

#[derive(Debug, Deserialize)]
struct DeleteImageByUrlQuery {
    url: Option<String>,
}

/// DELETE /v1/admin/services/:service_id/images?url=
async fn delete_image_by_url(
    State(state): State<AppState>,
    user: AuthUser,
    Path(service_id): Path<String>,
    Query(query): Query<DeleteImageByUrlQuery>,
) -> Result<Json<Value>, ApiError> {
    let url = validation::require("url", query.url.as_deref())?;
    let deleted = state
        .firestore
        .delete_service_image_by_url(&service_id, &url)
        .await
        .map_err(internal("Failed to delete image"))?;
    tracing::info!("Admin {} removed {} image records from service {}", user.uid, deleted, service_id);
    Ok(Json(json!({ "deleted": deleted })))
}

pub fn admin_services_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/services", post(create_service))
        .route("/v1/admin/services/:service_id", patch(update_service))
        .route("/v1/admin/services/:service_id/images", delete(delete_image_by_url))
        .route(
            "/v1/admin/services/:service_id/images/:image_id",
            delete(delete_image),
        )
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_trimmed_and_required() {
        let form = ServiceForm {
            name: Some(" Pintura ".to_string()),
            description: Some("Interiores y exteriores".to_string()),
            price_range: Some("$1,500 - $3,000".to_string()),
            images: vec![],
        };
        let fields = form.fields().unwrap();
        assert_eq!(fields.name, "Pintura");
        assert_eq!(fields.price_range, "$1,500 - $3,000");

        let blank_price = ServiceForm {
            price_range: Some("   ".to_string()),
            ..form
        };
        assert_eq!(blank_price.fields().unwrap_err().to_string(), "price_range is required");
    }

    #[test]
    fn test_missing_name_is_reported_first() {
        let form = ServiceForm::default();
        assert_eq!(form.fields().unwrap_err().to_string(), "name is required");
    }
}
