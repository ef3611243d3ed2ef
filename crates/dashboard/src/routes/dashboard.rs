//! Dashboard overview.

use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::{Value, json};

use crate::middleware::RequireUser;
use crate::models::{UnseenCount, UserProfile};
use crate::state::AppState;

/// Overview payload: who is signed in and what is new.
#[derive(Debug, Serialize)]
pub struct Overview {
    pub profile: UserProfile,
    pub notifications: Vec<UnseenCount>,
}

/// Dashboard overview. Unauthenticated browsers are redirected to `/login`.
pub async fn index(State(state): State<AppState>, RequireUser(user): RequireUser) -> Json<Overview> {
    let notifications = state.unseen_counter().count_all(&user.uid).await;
    Json(Overview {
        profile: user,
        notifications,
    })
}

/// Landing target of the sign-in redirect.
pub async fn login_page() -> Json<Value> {
    Json(json!({
        "login": "/api/auth/login",
        "fields": ["handle", "password"],
    }))
}
