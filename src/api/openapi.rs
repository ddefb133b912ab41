//! OpenAPI document for the HTTP surface.

use utoipa::OpenApi;

use crate::api::handlers::{health, password_reset, sessions, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "janua",
        description = "Multi-tenant authentication and session service",
    ),
    paths(
        health::health,
        sessions::list_sessions,
        sessions::open_session,
        sessions::get_session,
        sessions::delete_session,
        users::create_user,
        users::get_user,
        password_reset::request_reset,
        password_reset::complete_reset,
    ),
    components(schemas(
        sessions::OpenSessionRequest,
        sessions::SessionCreatedResponse,
        sessions::SessionSummary,
        sessions::SessionDetail,
        users::CreateUserRequest,
        users::UserResponse,
        password_reset::CompleteResetRequest,
    )),
    tags(
        (name = "sessions", description = "Session lifecycle"),
        (name = "users", description = "User provisioning and lookup"),
        (name = "password-reset", description = "Single-use password reset tokens"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
