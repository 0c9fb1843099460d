use crate::models::AppSettings;
use serde::{Deserialize, Serialize};

pub(crate) const SETTINGS_KEY: &str = "notefold_settings";

pub(crate) fn load_json_from_storage<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
    let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten())?;
    let json = storage.get_item(key).ok().flatten()?;
    serde_json::from_str(&json).ok()
}

pub(crate) fn save_json_to_storage<T: Serialize>(key: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            let _ = storage.set_item(key, &json);
        }
    }
}

pub(crate) fn load_settings() -> AppSettings {
    load_json_from_storage::<AppSettings>(SETTINGS_KEY).unwrap_or_default()
}

pub(crate) fn save_settings(settings: &AppSettings) {
    save_json_to_storage(SETTINGS_KEY, settings);
}

// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` +
// wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use crate::models::SortOrder;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_settings_storage_roundtrip() {
        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            let _ = storage.remove_item(SETTINGS_KEY);
        }

        assert_eq!(load_settings().sort_order, SortOrder::Descending);

        save_settings(&AppSettings {
            sort_order: SortOrder::Ascending,
        });
        assert_eq!(load_settings().sort_order, SortOrder::Ascending);

        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            let _ = storage.remove_item(SETTINGS_KEY);
        }
    }

    #[wasm_bindgen_test]
    fn test_corrupt_settings_fall_back_to_defaults() {
        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            let _ = storage.set_item(SETTINGS_KEY, "not json");
        }
        assert_eq!(load_settings().sort_order, SortOrder::Descending);
        if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
            let _ = storage.remove_item(SETTINGS_KEY);
        }
    }
}
