//! HTTP API server for the browser frontend
//!
//! This module provides a REST API for the voice session, the project
//! ledger and the assistant:
//! - POST /api/voice/start - Start the live voice session
//! - POST /api/voice/stop - Stop it
//! - GET /api/voice/status - Session snapshot
//! - GET/POST /api/projects - List and create projects
//! - GET/DELETE /api/projects/:id - Detail view and removal
//! - PUT /api/projects/:id/status - Lifecycle changes
//! - POST /api/projects/:id/materials - Book a purchase
//! - POST /api/projects/:id/payments - Record a payment
//! - GET /api/dashboard - Business totals
//! - POST /api/assistant/chat - Ask a question
//! - POST /api/assistant/visualize - Repaint preview
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
