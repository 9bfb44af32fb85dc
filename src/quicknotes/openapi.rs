use super::handlers::{github, health, logout, me, twitter};
use super::users::User;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        twitter::login,
        twitter::callback,
        github::login,
        github::callback,
        logout::logout,
        me::me,
    ),
    components(schemas(User)),
    tags(
        (name = "auth", description = "Login with Twitter or GitHub, and logout"),
        (name = "session", description = "The user behind the session cookie"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

/// The `OpenAPI` document for every route the router serves.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
