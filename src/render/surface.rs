use crate::render::controller::NoteRenderController;
use crate::render::protocol::{self, parse_height_signal};
use crate::render::wrap::ROOT_ID;
use crate::render::LOADING_SURFACE_HEIGHT_PX;
use std::cell::RefCell;
use std::collections::HashMap;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, HtmlIFrameElement, MessageEvent};

/// One live iframe rendering a single note document, together with the
/// listener closures that must stay alive while it does.
pub(crate) struct RenderSurface {
    iframe: HtmlIFrameElement,
    placeholder: Option<Element>,
    on_load: Option<Closure<dyn FnMut()>>,
    on_error: Option<Closure<dyn FnMut()>>,
    on_message: Option<Closure<dyn FnMut(MessageEvent)>>,
}

thread_local! {
    // Surfaces are owned here rather than in the registry so the registry
    // stays plain data. Keyed by note key; inserting for an occupied key
    // disposes the incumbent, keeping at most one live surface per note.
    static SURFACES: RefCell<HashMap<String, RenderSurface>> = RefCell::new(HashMap::new());
}

fn with_surface<R>(note_key: &str, f: impl FnOnce(&RenderSurface) -> R) -> Option<R> {
    SURFACES.with(|m| m.borrow().get(note_key).map(f))
}

fn put(note_key: &str, surface: RenderSurface) {
    let old = SURFACES.with(|m| m.borrow_mut().insert(note_key.to_string(), surface));
    if let Some(s) = old {
        dispose(s);
    }
}

/// Create a surface for `note_key`, load `document_html` into it and mount
/// it into the slot element next to a loading placeholder.
///
/// Exactly one load happens per acquisition: the srcdoc is assigned once,
/// before the iframe enters the document. The signal handler is not armed
/// here; that happens in [`finish_load`] once the load listener fires.
pub(crate) fn acquire_and_load(
    controller: &NoteRenderController,
    note_key: &str,
    generation: u64,
    document_html: &str,
    width: i32,
    slot_id: &str,
) {
    let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let Some(slot) = doc.get_element_by_id(slot_id) else {
        return;
    };
    slot.set_inner_html("");

    let placeholder = doc.create_element("div").ok().and_then(|el| {
        el.set_class_name("note-render-placeholder px-3 py-4 text-xs");
        el.set_text_content(Some("Rendering…"));
        slot.append_child(&el).ok().map(|_| el)
    });

    let Ok(iframe) = doc
        .create_element("iframe")
        .and_then(|el| el.dyn_into::<HtmlIFrameElement>().map_err(JsValue::from))
    else {
        show_render_error(slot_id, "Failed to render note.");
        return;
    };

    let _ = iframe.set_attribute("scrolling", "no");
    let style = iframe.style();
    let _ = style.set_property("display", "block");
    let _ = style.set_property("border", "none");
    let _ = style.set_property("width", &format!("{width}px"));
    let _ = style.set_property("height", &format!("{LOADING_SURFACE_HEIGHT_PX}px"));
    // Hidden (but laid out) until the load listener fires, so the
    // placeholder is what the user sees meanwhile.
    let _ = style.set_property("visibility", "hidden");
    iframe.set_srcdoc(document_html);

    let on_load = {
        let controller = controller.clone();
        let note_key = note_key.to_string();
        Closure::wrap(Box::new(move || {
            controller.on_surface_loaded(&note_key, generation);
        }) as Box<dyn FnMut()>)
    };
    let _ = iframe.add_event_listener_with_callback("load", on_load.as_ref().unchecked_ref());

    let on_error = {
        let controller = controller.clone();
        let note_key = note_key.to_string();
        Closure::wrap(Box::new(move || {
            controller.on_surface_failed(&note_key, generation);
        }) as Box<dyn FnMut()>)
    };
    let _ = iframe.add_event_listener_with_callback("error", on_error.as_ref().unchecked_ref());

    let _ = slot.append_child(&iframe);

    put(
        note_key,
        RenderSurface {
            iframe,
            placeholder,
            on_load: Some(on_load),
            on_error: Some(on_error),
            on_message: None,
        },
    );
}

/// Complete a successful load: swap the placeholder for the surface, arm
/// the one-way message channel, and inject the measurement protocol.
///
/// Returns false when script injection failed and the caller should fall
/// back to direct polling measurements.
pub(crate) fn finish_load(
    controller: &NoteRenderController,
    note_key: &str,
    generation: u64,
) -> bool {
    let _ = with_surface(note_key, |s| {
        let _ = s.iframe.style().set_property("visibility", "visible");
    });
    SURFACES.with(|m| {
        if let Some(s) = m.borrow_mut().get_mut(note_key) {
            if let Some(p) = s.placeholder.take() {
                p.remove();
            }
        }
    });

    let on_message = {
        let controller = controller.clone();
        let note_key = note_key.to_string();
        Closure::wrap(Box::new(move |ev: MessageEvent| {
            let Some(payload) = ev.data().as_string() else {
                return;
            };
            let Some(height) = parse_height_signal(&payload) else {
                return;
            };
            if !message_is_from(&note_key, ev.as_ref()) {
                return;
            }
            controller.on_height_signal(&note_key, generation, height);
        }) as Box<dyn FnMut(MessageEvent)>)
    };

    SURFACES.with(|m| {
        let mut m = m.borrow_mut();
        let Some(s) = m.get_mut(note_key) else {
            return;
        };
        if let Some(win) = web_sys::window() {
            let _ =
                win.add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref());
        }
        s.on_message = Some(on_message);
    });

    inject_measurement_script(note_key)
}

/// The `HEIGHT:` payload carries no sender identity, so signals are matched
/// to their surface by comparing the message's source window against the
/// iframe's content window.
fn message_is_from(note_key: &str, ev: &JsValue) -> bool {
    let source = js_sys::Reflect::get(ev, &JsValue::from_str("source")).unwrap_or(JsValue::UNDEFINED);
    with_surface(note_key, |s| {
        s.iframe
            .content_window()
            .map(|w| js_sys::Object::is(&source, w.as_ref()))
            .unwrap_or(false)
    })
    .unwrap_or(false)
}

fn inject_measurement_script(note_key: &str) -> bool {
    with_surface(note_key, |s| {
        let Some(doc) = s.iframe.content_document() else {
            return false;
        };
        let Some(body) = doc.body() else {
            return false;
        };
        let Ok(script) = doc.create_element("script") else {
            return false;
        };
        script.set_text_content(Some(&protocol::measurement_script()));
        body.append_child(&script).is_ok()
    })
    .unwrap_or(false)
}

/// Direct host-side measurement of the loaded document, used by the
/// bounded fallback when the event-driven protocol could not be installed.
pub(crate) fn content_root_height(note_key: &str) -> Option<f64> {
    with_surface(note_key, |s| {
        let doc = s.iframe.content_document()?;
        doc.get_element_by_id(ROOT_ID)
            .map(|el| el.scroll_height())
            .or_else(|| doc.body().map(|b| b.scroll_height()))
            .map(f64::from)
    })
    .flatten()
}

pub(crate) fn set_surface_height(note_key: &str, height_px: i32) -> bool {
    with_surface(note_key, |s| {
        s.iframe
            .style()
            .set_property("height", &format!("{height_px}px"))
            .is_ok()
    })
    .unwrap_or(false)
}

pub(crate) fn set_surface_width(note_key: &str, width_px: i32) -> bool {
    with_surface(note_key, |s| {
        s.iframe
            .style()
            .set_property("width", &format!("{width_px}px"))
            .is_ok()
    })
    .unwrap_or(false)
}

/// Invoke the injected no-argument re-measure global inside the surface's
/// document, if present (it is absent when injection fell back to polling).
pub(crate) fn invoke_measure_global(note_key: &str) {
    let _ = with_surface(note_key, |s| {
        let Some(win) = s.iframe.content_window() else {
            return;
        };
        if let Ok(f) = js_sys::Reflect::get(win.as_ref(), &JsValue::from_str(protocol::MEASURE_GLOBAL))
        {
            if let Some(f) = f.dyn_ref::<js_sys::Function>() {
                let _ = f.call0(win.as_ref());
            }
        }
    });
}

/// Tear down the surface for `note_key`: unhook all listeners and remove
/// the iframe from the document. Safe to call repeatedly.
pub(crate) fn release(note_key: &str) {
    let surface = SURFACES.with(|m| m.borrow_mut().remove(note_key));
    if let Some(s) = surface {
        dispose(s);
    }
}

pub(crate) fn release_all() {
    let all: Vec<RenderSurface> =
        SURFACES.with(|m| m.borrow_mut().drain().map(|(_, s)| s).collect());
    for s in all {
        dispose(s);
    }
}

fn dispose(mut s: RenderSurface) {
    if let Some(cb) = s.on_message.take() {
        if let Some(win) = web_sys::window() {
            let _ = win.remove_event_listener_with_callback("message", cb.as_ref().unchecked_ref());
        }
    }
    if let Some(cb) = s.on_load.take() {
        let _ = s
            .iframe
            .remove_event_listener_with_callback("load", cb.as_ref().unchecked_ref());
    }
    if let Some(cb) = s.on_error.take() {
        let _ = s
            .iframe
            .remove_event_listener_with_callback("error", cb.as_ref().unchecked_ref());
    }
    if let Some(p) = s.placeholder.take() {
        p.remove();
    }
    s.iframe.remove();
}

/// Replace the slot content with a static error block.
pub(crate) fn show_render_error(slot_id: &str, message: &str) {
    let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let Some(slot) = doc.get_element_by_id(slot_id) else {
        return;
    };
    slot.set_inner_html("");
    if let Ok(el) = doc.create_element("div") {
        el.set_class_name("px-3 py-4 text-xs text-destructive");
        el.set_text_content(Some(message));
        let _ = slot.append_child(&el);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
pub(crate) fn live_surface_count() -> usize {
    SURFACES.with(|m| m.borrow().len())
}
