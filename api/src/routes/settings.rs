use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::preferences::{Language, Preferences, Theme};

pub async fn get(preferences: Preferences) -> Json<Value> {
    Json(json!({ "success": true, "data": preferences }))
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    theme: String,
    language: String,
}

pub async fn save(
    body: Result<Json<SettingsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let preferences = Preferences {
        theme: request.theme.parse::<Theme>().map_err(ApiError::Validation)?,
        language: request
            .language
            .parse::<Language>()
            .map_err(ApiError::Validation)?,
    };

    let [theme_cookie, language_cookie] = preferences.cookies();
    Ok((
        AppendHeaders([(SET_COOKIE, theme_cookie), (SET_COOKIE, language_cookie)]),
        Json(json!({ "success": true, "settings": preferences })),
    ))
}
