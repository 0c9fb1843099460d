use crate::pages::{ChaptersPage, NotesPage, RootPage, SettingsPage};
use crate::state::{AppContext, AppState};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    provide_context(AppContext(AppState::new()));

    // IMPORTANT:
    // - Leptos CSR requires the `csr` feature on `leptos`.
    // - router hooks require a <Router> context.
    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Not found"</div> }>
                <Route path=path!("settings") view=SettingsPage />
                <Route path=path!("nb/:notebook_id") view=ChaptersPage />
                <Route path=path!("nb/:notebook_id/:chapter_id") view=NotesPage />
                <Route path=path!("") view=RootPage />
            </Routes>
        </Router>
    }
}
