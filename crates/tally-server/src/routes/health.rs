use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

/// Liveness. Touches the database so a wedged connection shows up here.
pub(super) async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let conn = state.db.lock().await;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map_err(tally_core::Error::from)?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
