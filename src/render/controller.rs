use crate::render::registry::RenderRegistry;
use crate::render::{
    surface, wrap, APPLY_DEBOUNCE_MS, CHROME_PADDING_PX, CONTENT_PADDING_PX,
    FALLBACK_REMEASURE_DELAY_MS, MAX_CONTENT_HEIGHT_PX, MIN_CONTENT_HEIGHT_PX,
    MIN_SURFACE_WIDTH_PX, RESIZE_DEBOUNCE_MS, SURFACE_WIDTH_GUTTER_PX,
};
use leptos::logging;
use std::sync::{Arc, Mutex};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::Element;

/// Host-side coordinator for the note render pipeline.
///
/// Responsibilities:
/// - registry of generation-tagged render entries (create/invalidate/clear)
/// - debounced application of measured heights to surface + container
/// - viewport-resize remeasure pass (debounced, no reloads)
/// - bounded polling fallback when script injection fails
///
/// Non-responsibilities:
/// - fetching/sorting notes and building the list DOM (pages do that)
/// - the markup-to-hypertext conversion (markdown module)
///
/// All methods run on the host thread; the surfaces' documents only ever
/// talk back through the one-way message channel.
#[derive(Clone)]
pub(crate) struct NoteRenderController {
    registry: Arc<Mutex<RenderRegistry>>,
    resize_timer: Arc<Mutex<Option<i32>>>,
}

impl NoteRenderController {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(RenderRegistry::default())),
            resize_timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Register (or supersede) the entry for `note_key` and start loading
    /// its wrapped document into a fresh surface.
    ///
    /// `header_height` is the already-measured height of the title/date row;
    /// it is fixed for the entry's lifetime and added to every applied size.
    pub fn mount_note(
        &self,
        note_key: &str,
        html_fragment: &str,
        base_href: &str,
        slot_id: &str,
        container_id: &str,
        header_height: i32,
    ) {
        let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        let Some(slot) = doc.get_element_by_id(slot_id) else {
            logging::warn!("notefold: slot {slot_id} missing, cannot mount note {note_key}");
            return;
        };

        let width = available_width(&slot);
        let (generation, old_timer) = {
            let mut reg = match self.registry.lock() {
                Ok(reg) => reg,
                Err(_) => return,
            };
            reg.create_entry(note_key, slot_id, container_id, header_height, width)
        };
        if let Some(tid) = old_timer {
            if let Some(win) = web_sys::window() {
                win.clear_timeout_with_handle(tid);
            }
        }

        let document_html = wrap::wrap_note_document(html_fragment, base_href, width);
        surface::acquire_and_load(self, note_key, generation, &document_html, width, slot_id);
    }

    /// Load listener callback. A late load from a superseded surface is
    /// dropped here before it can touch the pool.
    pub(crate) fn on_surface_loaded(&self, note_key: &str, generation: u64) {
        if !self.is_current(note_key, generation) {
            return;
        }
        if !surface::finish_load(self, note_key, generation) {
            self.fallback_measure(note_key, generation);
        }
    }

    /// Error listener callback: show a static error block and park the
    /// entry. It stays registered, but with no surface every later resize
    /// or measurement operation on it is a no-op.
    pub(crate) fn on_surface_failed(&self, note_key: &str, generation: u64) {
        let slot_id = {
            let mut reg = match self.registry.lock() {
                Ok(reg) => reg,
                Err(_) => return,
            };
            if !reg.accepts(note_key, generation) {
                return;
            }
            let slot_id = reg.entry(note_key).map(|e| e.slot_id.clone());
            reg.mark_load_failed(note_key, generation);
            slot_id
        };

        surface::release(note_key);
        if let Some(slot_id) = slot_id {
            surface::show_render_error(&slot_id, "Failed to render note.");
        }
        logging::warn!("notefold: surface load failed for note {note_key}");
    }

    /// Feed one measured-height candidate into the debounced applier.
    ///
    /// Candidates are expected to arrive in bursts while a document settles;
    /// the last one inside the quiet period wins. Non-positive heights are
    /// discarded so the entry keeps its last good size, and stale
    /// generations are dropped silently (expected, not an error).
    pub(crate) fn on_height_signal(&self, note_key: &str, generation: u64, height: f64) {
        if height <= 0.0 {
            return;
        }
        let Some(win) = web_sys::window() else {
            return;
        };

        let old_timer = {
            let mut reg = match self.registry.lock() {
                Ok(reg) => reg,
                Err(_) => return,
            };
            if !reg.accepts(note_key, generation) {
                return;
            }
            reg.set_pending(note_key, generation, height)
        };
        if let Some(tid) = old_timer {
            win.clear_timeout_with_handle(tid);
        }

        let cb = {
            let s2 = self.clone();
            let key = note_key.to_string();
            Closure::once_into_js(move || s2.apply_pending(&key, generation))
        };
        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                APPLY_DEBOUNCE_MS,
            )
            .unwrap_or(0);

        if let Ok(mut reg) = self.registry.lock() {
            reg.store_debounce(note_key, generation, tid);
        }
    }

    /// Debounce-timer callback: apply the pending height to the surface and
    /// the container in one pass. Failures are contained per entry; the
    /// entry is left at its last known good size.
    pub(crate) fn apply_pending(&self, note_key: &str, generation: u64) {
        let (pending, container_id, header_height, last_applied) = {
            let mut reg = match self.registry.lock() {
                Ok(reg) => reg,
                Err(_) => return,
            };
            let Some(h) = reg.take_pending(note_key, generation) else {
                return;
            };
            let Some(e) = reg.entry(note_key) else {
                return;
            };
            (h, e.container_id.clone(), e.header_height, e.applied_height)
        };

        let content_px = clamp_content_height(pending);
        let total = total_container_height(content_px, header_height);
        if last_applied == Some(total) {
            // already at this size; re-writing styles would only cause churn
            return;
        }

        let surface_ok = surface::set_surface_height(note_key, content_px);
        let container_ok = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(&container_id))
            .and_then(|el| el.dyn_into::<web_sys::HtmlElement>().ok())
            .map(|el| {
                el.style()
                    .set_property("height", &format!("{total}px"))
                    .is_ok()
            })
            .unwrap_or(false);

        if !surface_ok || !container_ok {
            logging::warn!("notefold: could not apply measured height for note {note_key}");
            return;
        }

        let apply_count = match self.registry.lock() {
            Ok(mut reg) => reg.record_applied(note_key, generation, total),
            Err(_) => 0,
        };
        logging::log!(
            "notefold: applied measure note={note_key} content={content_px} total={total} apply#{apply_count}"
        );
    }

    /// Bounded fallback when the measurement script could not be injected:
    /// one immediate and one delayed direct measurement, routed through the
    /// normal (generation-checked, debounced) signal path. Produces at most
    /// two layout applications instead of a continuous stream.
    pub(crate) fn fallback_measure(&self, note_key: &str, generation: u64) {
        logging::warn!("notefold: measurement script unavailable for note {note_key}, polling directly");

        if let Some(h) = surface::content_root_height(note_key) {
            self.on_height_signal(note_key, generation, h);
        }

        let Some(win) = web_sys::window() else {
            return;
        };
        let cb = {
            let s2 = self.clone();
            let key = note_key.to_string();
            Closure::once_into_js(move || {
                if let Some(h) = surface::content_root_height(&key) {
                    s2.on_height_signal(&key, generation, h);
                }
            })
        };
        let _ = win.set_timeout_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            FALLBACK_REMEASURE_DELAY_MS,
        );
    }

    /// Debounced entry point for window resize events.
    pub fn schedule_resize_remeasure(&self) {
        let Some(win) = web_sys::window() else {
            return;
        };
        if let Ok(mut t) = self.resize_timer.lock() {
            if let Some(tid) = t.take() {
                win.clear_timeout_with_handle(tid);
            }
        }

        let cb = {
            let s2 = self.clone();
            Closure::once_into_js(move || {
                if let Ok(mut t) = s2.resize_timer.lock() {
                    *t = None;
                }
                s2.remeasure_all();
            })
        };
        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                RESIZE_DEBOUNCE_MS,
            )
            .unwrap_or(0);
        if let Ok(mut t) = self.resize_timer.lock() {
            *t = Some(tid);
        }
    }

    /// Re-drive measurement for every live entry whose available width
    /// changed: update the surface width and poke the injected re-measure
    /// global in place. No reloads.
    pub fn remeasure_all(&self) {
        let entries = match self.registry.lock() {
            Ok(reg) => reg.resize_snapshot(),
            Err(_) => return,
        };
        let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };

        for (note_key, slot_id, last_width, load_failed) in entries {
            if load_failed {
                continue;
            }
            let Some(slot) = doc.get_element_by_id(&slot_id) else {
                continue;
            };
            let width = available_width(&slot);
            if width == last_width {
                continue;
            }

            surface::set_surface_width(&note_key, width);
            surface::invoke_measure_global(&note_key);
            if let Ok(mut reg) = self.registry.lock() {
                reg.set_width(&note_key, width);
            }
        }
    }

    /// Invalidate one entry: late signals for the old generation are
    /// filtered from this point on, even though surface teardown and any
    /// already-scheduled timer may still fire afterwards.
    pub fn invalidate_note(&self, note_key: &str) {
        let timer = match self.registry.lock() {
            Ok(mut reg) => reg.invalidate(note_key),
            Err(_) => None,
        };
        if let (Some(tid), Some(win)) = (timer, web_sys::window()) {
            win.clear_timeout_with_handle(tid);
        }
        surface::release(note_key);
    }

    /// Drop every entry and surface. Called whenever the displayed note set
    /// changes (chapter switch, reload) and on page teardown.
    pub fn clear_all(&self) {
        let timers = match self.registry.lock() {
            Ok(mut reg) => reg.clear_all(),
            Err(_) => Vec::new(),
        };
        if let Some(win) = web_sys::window() {
            for tid in timers {
                win.clear_timeout_with_handle(tid);
            }
        }
        surface::release_all();
    }

    pub fn shutdown(&self) {
        self.clear_all();
        if let (Ok(mut t), Some(win)) = (self.resize_timer.lock(), web_sys::window()) {
            if let Some(tid) = t.take() {
                win.clear_timeout_with_handle(tid);
            }
        }
    }

    pub(crate) fn is_current(&self, note_key: &str, generation: u64) -> bool {
        self.registry
            .lock()
            .map(|reg| reg.accepts(note_key, generation))
            .unwrap_or(false)
    }

    #[cfg(all(test, target_arch = "wasm32"))]
    pub(crate) fn entry_snapshot(&self, note_key: &str) -> Option<crate::render::registry::RenderEntry> {
        self.registry.lock().ok()?.entry(note_key).cloned()
    }
}

/// Measured height -> surface height in pixels: pad, round, clamp.
fn clamp_content_height(measured: f64) -> i32 {
    (measured + CONTENT_PADDING_PX)
        .round()
        .clamp(MIN_CONTENT_HEIGHT_PX, MAX_CONTENT_HEIGHT_PX) as i32
}

fn total_container_height(content_px: i32, header_height: i32) -> i32 {
    content_px + header_height.max(0) + CHROME_PADDING_PX
}

fn available_width(slot: &Element) -> i32 {
    let mut width = slot.client_width();
    if width <= 0 {
        // Slot not laid out yet; fall back to the window width minus the
        // scrollbar/list padding allowance.
        width = web_sys::window()
            .and_then(|win| win.inner_width().ok())
            .and_then(|v| v.as_f64())
            .map(|v| v as i32 - SURFACE_WIDTH_GUTTER_PX)
            .unwrap_or(0);
    }
    width.max(MIN_SURFACE_WIDTH_PX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_pads_then_bounds() {
        // 10 + 16 = 26, below the floor
        assert_eq!(clamp_content_height(10.0), 80);
        assert_eq!(clamp_content_height(500.0), 516);
        assert_eq!(clamp_content_height(123.4), 139);
        // pathological document hits the ceiling
        assert_eq!(clamp_content_height(100_000.0), 4000);
    }

    #[test]
    fn test_total_height_adds_header_and_chrome() {
        assert_eq!(total_container_height(516, 24), 516 + 24 + 16);
        // defensive: a bogus negative header never shrinks the container
        assert_eq!(total_container_height(80, -5), 80 + 16);
    }

    #[test]
    fn test_minimum_applied_total_covers_header_plus_clamp() {
        let content = clamp_content_height(1.0);
        let total = total_container_height(content, 24);
        assert!(f64::from(total) >= MIN_CONTENT_HEIGHT_PX + 24.0);
    }
}

// Browser-only tests for the full pipeline (run with
// `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner).
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use crate::render::surface::live_surface_count;
    use wasm_bindgen_futures::JsFuture;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    async fn sleep(ms: i32) {
        let promise = js_sys::Promise::new(&mut |resolve, _| {
            web_sys::window()
                .unwrap()
                .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
                .unwrap();
        });
        let _ = JsFuture::from(promise).await;
    }

    const HEADER_HEIGHT: i32 = 24;

    /// Build a note card fixture (header row + render slot) in the test
    /// page body and return (slot id, card id).
    fn mount_fixture(suffix: &str) -> (String, String) {
        let doc = web_sys::window().unwrap().document().unwrap();
        let body = doc.body().unwrap();

        let card_id = format!("t_card_{suffix}");
        let slot_id = format!("t_slot_{suffix}");

        let card = doc.create_element("div").unwrap();
        card.set_id(&card_id);
        card.set_attribute("style", "width:600px;").unwrap();

        let header = doc.create_element("div").unwrap();
        header
            .set_attribute("style", &format!("height:{HEADER_HEIGHT}px;"))
            .unwrap();
        card.append_child(&header).unwrap();

        let slot = doc.create_element("div").unwrap();
        slot.set_id(&slot_id);
        card.append_child(&slot).unwrap();

        body.append_child(&card).unwrap();
        (slot_id, card_id)
    }

    #[wasm_bindgen_test]
    async fn settled_note_applies_height_within_clamp_bounds() {
        let controller = NoteRenderController::new();
        let (slot_id, card_id) = mount_fixture("settle");

        controller.mount_note("settle", "<p>Hello</p>", "", &slot_id, &card_id, HEADER_HEIGHT);
        sleep(500).await;

        let entry = controller.entry_snapshot("settle").expect("entry registered");
        let total = entry.applied_height.expect("height applied after settling");
        assert!(entry.apply_count >= 1);
        assert!(
            f64::from(total) >= MIN_CONTENT_HEIGHT_PX + f64::from(HEADER_HEIGHT),
            "applied total {total} below header + minimum clamp"
        );
        assert!(f64::from(total) <= MAX_CONTENT_HEIGHT_PX + f64::from(HEADER_HEIGHT + CHROME_PADDING_PX));

        controller.shutdown();
        assert_eq!(live_surface_count(), 0);
    }

    #[wasm_bindgen_test]
    async fn burst_of_signals_applies_exactly_once() {
        let controller = NoteRenderController::new();
        let (slot_id, card_id) = mount_fixture("burst");

        controller.mount_note("burst", "<p>Hello</p>", "", &slot_id, &card_id, HEADER_HEIGHT);
        sleep(500).await;

        let before = controller.entry_snapshot("burst").unwrap();
        let generation = before.generation;

        // a burst inside the quiet period coalesces; the last value wins
        for h in [200.0, 260.0, 320.0, 410.0, 500.0] {
            controller.on_height_signal("burst", generation, h);
        }
        sleep(200).await;

        let after = controller.entry_snapshot("burst").unwrap();
        assert_eq!(after.apply_count, before.apply_count + 1);
        assert_eq!(
            after.applied_height,
            Some(516 + HEADER_HEIGHT + CHROME_PADDING_PX),
            "only the final candidate of the burst should persist"
        );

        controller.shutdown();
    }

    #[wasm_bindgen_test]
    async fn stale_generation_signal_is_discarded() {
        let controller = NoteRenderController::new();
        let (slot_id, card_id) = mount_fixture("stale");

        controller.mount_note("stale", "<p>Hello</p>", "", &slot_id, &card_id, HEADER_HEIGHT);
        sleep(500).await;

        let entry = controller.entry_snapshot("stale").unwrap();
        let before = entry.apply_count;
        controller.on_height_signal("stale", entry.generation - 1, 900.0);
        sleep(200).await;

        let after = controller.entry_snapshot("stale").unwrap();
        assert_eq!(after.apply_count, before);

        controller.shutdown();
    }

    #[wasm_bindgen_test]
    async fn invalidate_before_debounce_fires_applies_nothing() {
        let controller = NoteRenderController::new();
        let (slot_id, card_id) = mount_fixture("inval");

        controller.mount_note("inval", "<p>Hello</p>", "", &slot_id, &card_id, HEADER_HEIGHT);
        // Invalidate while the document is still loading; any signal the old
        // surface manages to emit afterwards carries a dead generation.
        controller.invalidate_note("inval");
        sleep(500).await;

        let entry = controller.entry_snapshot("inval").unwrap();
        assert_eq!(entry.applied_height, None);
        assert_eq!(entry.apply_count, 0);

        controller.shutdown();
    }

    #[wasm_bindgen_test]
    async fn reloading_identical_content_applies_identical_height() {
        let controller = NoteRenderController::new();
        let (slot_id, card_id) = mount_fixture("redo");
        let markup = "<p>Hello</p><p>Second paragraph</p>";

        controller.mount_note("redo", markup, "", &slot_id, &card_id, HEADER_HEIGHT);
        sleep(500).await;
        let first = controller.entry_snapshot("redo").unwrap();
        let h1 = first.applied_height.expect("first pass applied");

        controller.mount_note("redo", markup, "", &slot_id, &card_id, HEADER_HEIGHT);
        sleep(500).await;
        let second = controller.entry_snapshot("redo").unwrap();
        let h2 = second.applied_height.expect("second pass applied");

        assert!(second.generation > first.generation);
        assert_eq!(h1, h2, "identical content and width must settle to the same height");

        controller.shutdown();
    }

    #[wasm_bindgen_test]
    async fn remeasure_all_adopts_the_new_width() {
        let controller = NoteRenderController::new();
        let (slot_id, card_id) = mount_fixture("resize");

        controller.mount_note("resize", "<p>Hello</p>", "", &slot_id, &card_id, HEADER_HEIGHT);
        sleep(500).await;
        assert_eq!(controller.entry_snapshot("resize").unwrap().last_width, 600);

        let doc = web_sys::window().unwrap().document().unwrap();
        doc.get_element_by_id(&card_id)
            .unwrap()
            .set_attribute("style", "width:400px;")
            .unwrap();

        controller.remeasure_all();
        sleep(300).await;

        let entry = controller.entry_snapshot("resize").unwrap();
        assert_eq!(entry.last_width, 400);
        assert!(entry.applied_height.is_some());

        controller.shutdown();
    }

    #[wasm_bindgen_test]
    async fn clear_all_releases_every_surface() {
        let controller = NoteRenderController::new();
        let (slot_a, card_a) = mount_fixture("clear_a");
        let (slot_b, card_b) = mount_fixture("clear_b");

        controller.mount_note("clear_a", "<p>A</p>", "", &slot_a, &card_a, HEADER_HEIGHT);
        controller.mount_note("clear_b", "<p>B</p>", "", &slot_b, &card_b, HEADER_HEIGHT);
        sleep(500).await;
        assert!(live_surface_count() >= 2);

        controller.clear_all();
        assert_eq!(live_surface_count(), 0);
        assert!(controller.entry_snapshot("clear_a").is_none());

        controller.shutdown();
    }
}
