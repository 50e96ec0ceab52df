use super::state::AppState;
use crate::error::SessionError;
use crate::live::SessionSnapshot;
use crate::store::{Material, Payment, Project, ProjectFinancials, ProjectStatus};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StopVoiceResponse {
    /// False when no session was running
    pub stopped: bool,

    /// Final snapshot of the stopped session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSnapshot>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub client_name: String,
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub total_agreed_price: f64,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetailResponse {
    pub project: Project,
    pub materials: Vec<Material>,
    pub payments: Vec<Payment>,
    pub financials: ProjectFinancials,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ProjectStatus,
}

#[derive(Debug, Deserialize)]
pub struct AddMaterialRequest {
    pub name: String,
    pub cost: f64,

    /// Units purchased (litres, cans, rolls)
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

fn default_quantity() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct AddPaymentRequest {
    pub amount: f64,

    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct VisualizeRequest {
    /// Photo of the wall or room, base64-encoded
    pub image_base64: String,

    #[serde(default = "default_mime_type")]
    pub mime_type: String,

    /// Desired change, e.g. "paint the wall terracotta"
    pub prompt: String,
}

fn default_mime_type() -> String {
    "image/jpeg".to_string()
}

#[derive(Debug, Serialize)]
pub struct VisualizeResponse {
    /// Edited image as base64, or null when the model returned none
    pub image_base64: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Voice Session Handlers
// ============================================================================

/// POST /api/voice/start
/// Start a live voice session, replacing any active one
pub async fn start_voice(State(state): State<AppState>) -> impl IntoResponse {
    info!("Starting voice session");

    match state.voice.start().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            error!("Failed to start voice session: {}", e);
            let status = match &e {
                SessionError::NotIdle => StatusCode::CONFLICT,
                SessionError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                SessionError::TransportOpen(_) | SessionError::Transport(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            error_response(status, e.to_string())
        }
    }
}

/// POST /api/voice/stop
/// Stop the live voice session if one is running
pub async fn stop_voice(State(state): State<AppState>) -> impl IntoResponse {
    info!("Stopping voice session");

    let session = state.voice.stop().await;
    (
        StatusCode::OK,
        Json(StopVoiceResponse {
            stopped: session.is_some(),
            session,
        }),
    )
}

/// GET /api/voice/status
/// Snapshot of the voice session, idle placeholder when none is running
pub async fn voice_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.voice.status().await))
}

// ============================================================================
// Project Handlers
// ============================================================================

/// GET /api/projects
/// All projects, newest first
pub async fn list_projects(State(state): State<AppState>) -> impl IntoResponse {
    let ledger = state.ledger.read().await;
    (StatusCode::OK, Json(ledger.projects().to_vec()))
}

/// POST /api/projects
/// Register a new project
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    if req.client_name.trim().is_empty() || req.title.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "client_name and title must not be empty",
        );
    }

    let mut ledger = state.ledger.write().await;
    match ledger.add_project(
        req.client_name.trim(),
        req.title.trim(),
        &req.description,
        req.total_agreed_price,
    ) {
        Ok(project) => (StatusCode::CREATED, Json(project)).into_response(),
        Err(e) => {
            error!("Failed to add project: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/projects/:project_id
/// One project with its materials, payments and financials
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> impl IntoResponse {
    let ledger = state.ledger.read().await;

    match ledger.project(project_id) {
        Some(project) => {
            let detail = ProjectDetailResponse {
                project: project.clone(),
                materials: ledger.materials_for(project_id),
                payments: ledger.payments_for(project_id),
                financials: ledger.financials(project_id),
            };
            (StatusCode::OK, Json(detail)).into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Project {} not found", project_id),
        ),
    }
}

/// DELETE /api/projects/:project_id
/// Remove a project and its materials and payments
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.write().await;

    match ledger.remove_project(project_id) {
        Ok(true) => (StatusCode::OK, Json(DeleteResponse { deleted: true })).into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            format!("Project {} not found", project_id),
        ),
        Err(e) => {
            error!("Failed to remove project: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// PUT /api/projects/:project_id/status
/// Move a project through its lifecycle
pub async fn update_project_status(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.write().await;

    match ledger.update_project_status(project_id, req.status) {
        Ok(Some(project)) => (StatusCode::OK, Json(project)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Project {} not found", project_id),
        ),
        Err(e) => {
            error!("Failed to update project status: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Material and Payment Handlers
// ============================================================================

/// POST /api/projects/:project_id/materials
/// Book a materials purchase against a project
pub async fn add_material(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<AddMaterialRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "name must not be empty");
    }

    let mut ledger = state.ledger.write().await;
    match ledger.add_material(project_id, req.name.trim(), req.cost, req.quantity) {
        Ok(Some(material)) => (StatusCode::CREATED, Json(material)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Project {} not found", project_id),
        ),
        Err(e) => {
            error!("Failed to add material: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// DELETE /api/materials/:material_id
pub async fn delete_material(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.write().await;

    match ledger.remove_material(material_id) {
        Ok(true) => (StatusCode::OK, Json(DeleteResponse { deleted: true })).into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            format!("Material {} not found", material_id),
        ),
        Err(e) => {
            error!("Failed to remove material: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// POST /api/projects/:project_id/payments
/// Record a payment received for a project
pub async fn add_payment(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<AddPaymentRequest>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.write().await;

    match ledger.add_payment(project_id, req.amount, &req.note) {
        Ok(Some(payment)) => (StatusCode::CREATED, Json(payment)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Project {} not found", project_id),
        ),
        Err(e) => {
            error!("Failed to add payment: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// DELETE /api/payments/:payment_id
pub async fn delete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.write().await;

    match ledger.remove_payment(payment_id) {
        Ok(true) => (StatusCode::OK, Json(DeleteResponse { deleted: true })).into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            format!("Payment {} not found", payment_id),
        ),
        Err(e) => {
            error!("Failed to remove payment: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Dashboard and Assistant Handlers
// ============================================================================

/// GET /api/dashboard
/// Business-wide totals
pub async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let ledger = state.ledger.read().await;
    (StatusCode::OK, Json(ledger.dashboard()))
}

/// POST /api/assistant/chat
/// Ask the assistant a question, grounded in the ledger
pub async fn assistant_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let Some(client) = state.assistant.clone() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Assistant is not configured (set GEMINI_API_KEY)",
        );
    };
    if req.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message must not be empty");
    }

    // Snapshot the books before the network call so the ledger lock is
    // not held across it.
    let context = state.ledger.read().await.assistant_context();

    match client.ask(req.message.trim(), &context).await {
        Ok(reply) => (StatusCode::OK, Json(ChatResponse { reply })).into_response(),
        Err(e) => {
            error!("Assistant chat failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// POST /api/assistant/visualize
/// Render a repaint preview from a wall photo
pub async fn assistant_visualize(
    State(state): State<AppState>,
    Json(req): Json<VisualizeRequest>,
) -> impl IntoResponse {
    let Some(client) = state.assistant.clone() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Assistant is not configured (set GEMINI_API_KEY)",
        );
    };
    if req.image_base64.is_empty() || req.prompt.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "image_base64 and prompt must not be empty",
        );
    }

    match client
        .edit_image(&req.image_base64, &req.mime_type, req.prompt.trim())
        .await
    {
        Ok(image_base64) => {
            (StatusCode::OK, Json(VisualizeResponse { image_base64 })).into_response()
        }
        Err(e) => {
            error!("Image visualization failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

// ============================================================================
// Health
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
