use crate::api::ApiErrorKind;
use crate::components::hooks::use_random::use_random_id_for;
use crate::components::ui::{
    Alert, AlertDescription, Button, Card, CardContent, CardDescription, CardHeader, CardItem,
    CardList, CardTitle, Input, Label, Spinner,
};
use crate::markdown;
use crate::models::{sort_notes, Chapter, NoteRecord, SortOrder};
use crate::render::NoteRenderController;
use crate::state::AppContext;
use crate::storage::save_settings;
use leptos::ev;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use leptos_router::hooks::use_params_map;
use wasm_bindgen::JsCast;

/// Notebook overview: entry point of the viewer.
#[component]
pub fn RootPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let notebooks = app_state.0.notebooks;

    let loading: RwSignal<bool> = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let load_notebooks = move || {
        let api_client = app_state.0.api_client.get_untracked();
        loading.set(true);
        error.set(None);

        spawn_local(async move {
            match api_client.get_notebooks().await {
                Ok(nbs) => notebooks.set(nbs),
                Err(e) => error.set(Some(e.to_string())),
            }
            loading.set(false);
        });
    };

    Effect::new(move |_| {
        load_notebooks();
    });

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto w-full max-w-[920px] px-4 py-8">
                <div class="mb-4 flex items-center justify-between">
                    <div class="space-y-1">
                        <h1 class="text-xl font-semibold">"Notefold"</h1>
                        <p class="text-xs text-muted-foreground">"Notebooks"</p>
                    </div>

                    <div class="flex items-center gap-2">
                        <Button
                            attr:disabled=move || loading.get()
                            on:click=move |_| load_notebooks()
                        >
                            <span class="inline-flex items-center gap-2">
                                <Show when=move || loading.get() fallback=|| ().into_view()>
                                    <Spinner />
                                </Show>
                                {move || if loading.get() { "Refreshing" } else { "Refresh" }}
                            </span>
                        </Button>

                        <a class="text-sm text-primary underline underline-offset-4" href="/settings">
                            "Settings"
                        </a>
                    </div>
                </div>

                <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                    {move || {
                        error.get().map(|e| view! {
                            <Alert class="border-destructive/30">
                                <AlertDescription class="text-destructive">{e}</AlertDescription>
                            </Alert>
                        })
                    }}
                </Show>

                <Card>
                    <CardHeader>
                        <CardTitle>"Notebooks"</CardTitle>
                        <CardDescription>
                            {move || format!("{} total", notebooks.get().len())}
                        </CardDescription>
                    </CardHeader>

                    <CardContent>
                        <Show
                            when=move || !notebooks.get().is_empty()
                            fallback=move || view! {
                                <div class="text-xs text-muted-foreground">
                                    {move || if loading.get() {
                                        "Loading notebooks..."
                                    } else {
                                        "No notebooks yet."
                                    }}
                                </div>
                            }
                        >
                            <CardList>
                                {move || {
                                    notebooks
                                        .get()
                                        .into_iter()
                                        .map(|nb| {
                                            let href = format!("/nb/{}", urlencoding::encode(&nb.id));
                                            view! {
                                                <CardItem class="rounded-md border">
                                                    <a class="flex w-full flex-col items-start gap-1 px-4 py-3" href=href>
                                                        <div class="text-sm font-medium">{nb.name}</div>
                                                        <div class="text-xs text-muted-foreground">{nb.id}</div>
                                                    </a>
                                                </CardItem>
                                            }
                                        })
                                        .collect_view()
                                }}
                            </CardList>
                        </Show>
                    </CardContent>
                </Card>
            </div>
        </div>
    }
}

/// Chapters of one notebook.
#[component]
pub fn ChaptersPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let params = use_params_map();
    let notebook_id = move || params.get().get("notebook_id").unwrap_or_default();

    let chapters: RwSignal<Vec<Chapter>> = RwSignal::new(vec![]);
    let loading: RwSignal<bool> = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    Effect::new(move |_| {
        let notebook = notebook_id();
        if notebook.trim().is_empty() {
            return;
        }

        let api_client = app_state.0.api_client.get_untracked();
        loading.set(true);
        error.set(None);

        spawn_local(async move {
            match api_client.get_chapters(&notebook).await {
                Ok(chs) => chapters.set(chs),
                Err(e) => error.set(Some(e.to_string())),
            }
            loading.set(false);
        });
    });

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto w-full max-w-[920px] px-4 py-8">
                <div class="mb-4 space-y-1">
                    <a class="text-xs text-primary underline underline-offset-4" href="/">
                        "Notebooks"
                    </a>
                    <h1 class="text-xl font-semibold">{notebook_id}</h1>
                    <p class="text-xs text-muted-foreground">"Chapters"</p>
                </div>

                <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                    {move || {
                        error.get().map(|e| view! {
                            <Alert class="border-destructive/30">
                                <AlertDescription class="text-destructive">{e}</AlertDescription>
                            </Alert>
                        })
                    }}
                </Show>

                <Card>
                    <CardContent>
                        <Show
                            when=move || !chapters.get().is_empty()
                            fallback=move || view! {
                                <div class="text-xs text-muted-foreground">
                                    {move || if loading.get() {
                                        "Loading chapters..."
                                    } else {
                                        "No chapters in this notebook."
                                    }}
                                </div>
                            }
                        >
                            <CardList>
                                {move || {
                                    chapters
                                        .get()
                                        .into_iter()
                                        .map(|ch| {
                                            let href = format!(
                                                "/nb/{}/{}",
                                                urlencoding::encode(&ch.notebook_id),
                                                urlencoding::encode(&ch.id),
                                            );
                                            view! {
                                                <CardItem class="rounded-md border">
                                                    <a class="flex w-full px-4 py-3 text-sm font-medium" href=href>
                                                        {ch.name}
                                                    </a>
                                                </CardItem>
                                            }
                                        })
                                        .collect_view()
                                }}
                            </CardList>
                        </Show>
                    </CardContent>
                </Card>
            </div>
        </div>
    }
}

/// The note viewer: a scrollable list where every note is rendered in its
/// own surface and sized by the measurement pipeline.
#[component]
pub fn NotesPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let params = use_params_map();
    let notebook_id = move || params.get().get("notebook_id").unwrap_or_default();
    let chapter_id = move || params.get().get("chapter_id").unwrap_or_default();

    let notes = app_state.0.notes;
    let loading = app_state.0.notes_loading;
    let error = app_state.0.notes_error;
    let filter: RwSignal<String> = RwSignal::new(String::new());

    let controller = NoteRenderController::new();

    // Resize coordinator wiring: rapid width changes collapse into a single
    // remeasure pass once the window settles.
    let resize_handle = {
        let controller = controller.clone();
        window_event_listener(ev::resize, move |_| {
            controller.schedule_resize_remeasure();
        })
    };
    {
        let controller = controller.clone();
        on_cleanup(move || {
            resize_handle.remove();
            controller.shutdown();
        });
    }

    let do_load = {
        let controller = controller.clone();
        move |notebook: String, chapter: String| {
            let api_client = app_state.0.api_client.get_untracked();
            let request_id = app_state.0.notes_request_id.get_untracked() + 1;
            app_state.0.notes_request_id.set(request_id);
            loading.set(true);
            error.set(None);

            // The displayed note set is about to change: no render from the
            // old set may touch layout from here on.
            controller.clear_all();

            spawn_local(async move {
                let result = api_client.get_notes(&notebook, &chapter).await;
                if app_state.0.notes_request_id.get_untracked() != request_id {
                    // a newer load superseded this one
                    return;
                }
                match result {
                    Ok(list) => notes.set(list),
                    Err(e) if e.kind == ApiErrorKind::Network => {
                        error.set(Some(format!("Backend unreachable: {e}")))
                    }
                    Err(e) => error.set(Some(e.to_string())),
                }
                loading.set(false);
            });
        }
    };

    {
        let do_load = do_load.clone();
        Effect::new(move |_| {
            let notebook = notebook_id();
            let chapter = chapter_id();
            if notebook.trim().is_empty() || chapter.trim().is_empty() {
                return;
            }
            do_load(notebook, chapter);
        });
    }

    // Display order and title filter are part of "which notes are visible";
    // any change rebuilds the list from scratch.
    let visible_notes = Memo::new(move |_| {
        let mut list = notes.get();
        let query = filter.get().trim().to_lowercase();
        if !query.is_empty() {
            list.retain(|n| n.title.to_lowercase().contains(&query));
        }
        sort_notes(&mut list, app_state.0.settings.get().sort_order);
        list
    });

    // Old cards unmount when the visible set changes, but their surfaces and
    // registry entries do not unmount themselves. New cards mount a tick
    // later, so clearing here cannot race them.
    {
        let controller = controller.clone();
        Effect::new(move |_| {
            visible_notes.track();
            controller.clear_all();
        });
    }

    let list_controller = controller.clone();
    let on_refresh = {
        let do_load = do_load.clone();
        move |_| do_load(notebook_id(), chapter_id())
    };

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto w-full max-w-[920px] px-4 py-8">
                <div class="mb-4 flex items-center justify-between gap-4">
                    <div class="min-w-0 space-y-1">
                        <a
                            class="text-xs text-primary underline underline-offset-4"
                            href=move || format!("/nb/{}", urlencoding::encode(&notebook_id()))
                        >
                            {notebook_id}
                        </a>
                        <h1 class="truncate text-xl font-semibold">{chapter_id}</h1>
                        <p class="text-xs text-muted-foreground">
                            {move || format!("{} notes", visible_notes.get().len())}
                        </p>
                    </div>

                    <div class="flex shrink-0 items-center gap-2">
                        <div class="w-48">
                            <Input placeholder="Filter by title" bind_value=filter />
                        </div>
                        <Button
                            attr:disabled=move || loading.get()
                            on:click=on_refresh
                        >
                            <span class="inline-flex items-center gap-2">
                                <Show when=move || loading.get() fallback=|| ().into_view()>
                                    <Spinner />
                                </Show>
                                {move || if loading.get() { "Refreshing" } else { "Refresh" }}
                            </span>
                        </Button>
                    </div>
                </div>

                <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                    {move || {
                        error.get().map(|e| view! {
                            <Alert class="border-destructive/30">
                                <AlertDescription class="text-destructive">{e}</AlertDescription>
                            </Alert>
                        })
                    }}
                </Show>

                <Show
                    when=move || !visible_notes.get().is_empty()
                    fallback=move || view! {
                        <div class="rounded-md border px-4 py-6 text-xs text-muted-foreground">
                            {move || if loading.get() {
                                "Loading notes...".to_string()
                            } else if !filter.get().trim().is_empty() {
                                "No notes match the filter.".to_string()
                            } else {
                                "No notes found in this chapter.".to_string()
                            }}
                        </div>
                    }
                >
                    <div class="flex flex-col gap-2">
                        {
                            let controller = list_controller.clone();
                            move || {
                                let controller = controller.clone();
                                visible_notes
                                    .get()
                                    .into_iter()
                                    .map(|note| {
                                        let base_href = app_state
                                            .0
                                            .api_client
                                            .get_untracked()
                                            .attachment_base(&note.notebook_id, &note.chapter_id);
                                        view! {
                                            <NoteCard
                                                note=note
                                                base_href=base_href
                                                controller=controller.clone()
                                            />
                                        }
                                    })
                                    .collect_view()
                            }
                        }
                    </div>
                </Show>
            </div>
        </div>
    }
}

/// One note in the list: a fixed header row (title, date) above the render
/// slot the surface mounts into. The card's height is owned by the
/// measurement pipeline once the document settles.
#[component]
fn NoteCard(
    note: NoteRecord,
    base_href: String,
    controller: NoteRenderController,
) -> impl IntoView {
    let card_id = use_random_id_for("note_card");
    let header_id = use_random_id_for("note_header");
    let slot_id = use_random_id_for("note_slot");

    let html_fragment = markdown::render_note_html(&note.content);

    {
        let card_id = card_id.clone();
        let header_id = header_id.clone();
        let slot_id = slot_id.clone();
        let note_key = note.id.clone();

        // Defer to the next tick so the card is mounted and the header row
        // has a measurable height before the surface loads.
        Effect::new(move |_| {
            let Some(win) = web_sys::window() else {
                return;
            };

            let controller = controller.clone();
            let card_id = card_id.clone();
            let header_id = header_id.clone();
            let slot_id = slot_id.clone();
            let note_key = note_key.clone();
            let base_href = base_href.clone();
            let html_fragment = html_fragment.clone();

            let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(
                wasm_bindgen::closure::Closure::once_into_js(move || {
                    let header_height = web_sys::window()
                        .and_then(|w| w.document())
                        .and_then(|d| d.get_element_by_id(&header_id))
                        .and_then(|el| el.dyn_into::<web_sys::HtmlElement>().ok())
                        .map(|el| el.offset_height())
                        .unwrap_or(0);

                    controller.mount_note(
                        &note_key,
                        &html_fragment,
                        &base_href,
                        &slot_id,
                        &card_id,
                        header_height,
                    );
                })
                .as_ref()
                .unchecked_ref(),
                0,
            );
        });
    }

    view! {
        <div
            id=card_id
            class="flex flex-col overflow-hidden rounded-md border bg-card text-card-foreground"
            data-people=note.people
            data-labels=note.labels
        >
            <div
                id=header_id
                class="flex items-center justify-between gap-2 border-b px-3 py-2"
            >
                <div class="min-w-0 truncate text-sm font-semibold" title=note.title.clone()>
                    {note.title.clone()}
                </div>
                {(!note.date.is_empty()).then(|| view! {
                    <div class="shrink-0 text-xs text-muted-foreground">{note.date.clone()}</div>
                })}
            </div>
            <div id=slot_id class="note-render-slot"></div>
        </div>
    }
}

/// Viewer settings (persisted locally).
#[component]
pub fn SettingsPage() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let settings = app_state.0.settings;

    let set_order = move |order: SortOrder| {
        let mut s = settings.get_untracked();
        s.sort_order = order;
        save_settings(&s);
        settings.set(s);
    };

    let order_label = move |order: SortOrder, label: &str| {
        let current = settings.get().sort_order == order;
        if current {
            format!("{label} ✓")
        } else {
            label.to_string()
        }
    };

    view! {
        <div class="min-h-screen bg-background">
            <div class="mx-auto w-full max-w-[560px] px-4 py-8">
                <div class="mb-4 space-y-1">
                    <a class="text-xs text-primary underline underline-offset-4" href="/">
                        "Notebooks"
                    </a>
                    <h1 class="text-xl font-semibold">"Settings"</h1>
                </div>

                <Card>
                    <CardHeader>
                        <CardTitle class="text-base">"Viewer"</CardTitle>
                        <CardDescription>"Stored in this browser only."</CardDescription>
                    </CardHeader>

                    <CardContent>
                        <div class="flex flex-col gap-2">
                            <Label>"Sort order"</Label>
                            <div class="flex items-center gap-2">
                                <Button on:click=move |_| set_order(SortOrder::Descending)>
                                    {move || order_label(SortOrder::Descending, "Newest first")}
                                </Button>
                                <Button on:click=move |_| set_order(SortOrder::Ascending)>
                                    {move || order_label(SortOrder::Ascending, "Oldest first")}
                                </Button>
                            </div>
                        </div>
                    </CardContent>
                </Card>
            </div>
        </div>
    }
}
