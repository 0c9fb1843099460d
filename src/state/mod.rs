use crate::api::ApiClient;
use crate::models::{AppSettings, Notebook, NoteRecord};
use crate::storage::load_settings;
use leptos::prelude::*;

// Copy: every field is an arena-backed signal handle, so pages can capture
// the whole context in as many closures as they need.
#[derive(Clone, Copy)]
pub(crate) struct AppState {
    pub api_client: RwSignal<ApiClient>,

    /// Loaded from backend.
    pub notebooks: RwSignal<Vec<Notebook>>,

    /// Notes for the currently displayed chapter.
    pub notes: RwSignal<Vec<NoteRecord>>,
    pub notes_loading: RwSignal<bool>,
    pub notes_error: RwSignal<Option<String>>,

    /// Notes load guard (ignore stale responses when the chapter changes
    /// mid-flight).
    pub notes_request_id: RwSignal<u64>,

    /// Viewer settings, persisted via `storage`.
    pub settings: RwSignal<AppSettings>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            api_client: RwSignal::new(ApiClient::from_env()),
            notebooks: RwSignal::new(vec![]),
            notes: RwSignal::new(vec![]),
            notes_loading: RwSignal::new(false),
            notes_error: RwSignal::new(None),
            notes_request_id: RwSignal::new(0),
            settings: RwSignal::new(load_settings()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
pub(crate) struct AppContext(pub AppState);
