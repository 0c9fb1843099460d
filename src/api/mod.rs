use crate::models::{Chapter, Notebook, NoteRecord};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug)]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct EnvConfig {
    pub api_url: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let default_api_url = "http://localhost:6687".to_string();

        // We support BOTH `window.ENV.API_URL` (documented in README) and
        // `window.ENV.api_url` (legacy/implementation detail) for compatibility.
        if let Some(window) = web_sys::window() {
            if let Some(env) = window.get("ENV") {
                if !env.is_undefined() && env.is_object() {
                    // 1) Prefer README style: API_URL
                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"API_URL".into()) {
                        if let Some(url_str) = api_url.as_string() {
                            return Self { api_url: url_str };
                        }
                    }

                    // 2) Fallback: api_url
                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"api_url".into()) {
                        if let Some(url_str) = api_url.as_string() {
                            return Self { api_url: url_str };
                        }
                    }
                }
            }
        }

        Self {
            api_url: default_api_url,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for the notefold backend, the collaborator that owns note
/// storage. The viewer only lists and reads; create/edit/delete flows live
/// with the backend's own tooling.
#[derive(Clone)]
pub(crate) struct ApiClient {
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }

    pub fn from_env() -> Self {
        Self::new(EnvConfig::new().api_url)
    }

    async fn get_json(&self, path: &str, ctx: &str) -> ApiResult<serde_json::Value> {
        let client = reqwest::Client::new();
        let res = client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(ApiError::network)?;

        if res.status().is_success() {
            res.json().await.map_err(ApiError::parse)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, ctx))
        }
    }

    pub async fn get_notebooks(&self) -> ApiResult<Vec<Notebook>> {
        let data = self.get_json("/api/notebooks", "list notebooks").await?;
        serde_json::from_value(data["notebooks"].clone()).map_err(ApiError::parse)
    }

    pub async fn get_chapters(&self, notebook_id: &str) -> ApiResult<Vec<Chapter>> {
        let path = format!("/api/notebooks/{}/chapters", urlencoding::encode(notebook_id));
        let data = self.get_json(&path, "list chapters").await?;
        serde_json::from_value(data["chapters"].clone()).map_err(ApiError::parse)
    }

    pub async fn get_notes(&self, notebook_id: &str, chapter_id: &str) -> ApiResult<Vec<NoteRecord>> {
        let path = format!(
            "/api/notebooks/{}/chapters/{}/notes",
            urlencoding::encode(notebook_id),
            urlencoding::encode(chapter_id),
        );
        let data = self.get_json(&path, "list notes").await?;
        serde_json::from_value(data["notes"].clone()).map_err(ApiError::parse)
    }

    /// Base URL against which a note's relative attachment references
    /// (`attachments/...`) resolve. Used as the wrapped document's base
    /// href; the trailing slash matters.
    pub fn attachment_base(&self, notebook_id: &str, chapter_id: &str) -> String {
        format!(
            "{}/files/{}/{}/notes/",
            self.base_url,
            urlencoding::encode(notebook_id),
            urlencoding::encode(chapter_id),
        )
    }
}
