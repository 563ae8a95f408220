use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::{ConnectionTrait, Statement};
use serde_json::{json, Value};

use crate::handlers::AppState;

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_ok = state
        .db
        .execute(Statement::from_string(
            state.db.get_database_backend(),
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": if db_ok { "up" } else { "down" },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
