//! Asynchronous note rendering: per-note iframe surfaces, an injected
//! measurement protocol, and a generation-tagged registry that reconciles
//! settled content heights back into the host list layout.

mod controller;
mod protocol;
mod registry;
mod surface;
mod wrap;

pub(crate) use controller::NoteRenderController;

/// Quiet period applied to a burst of height signals for one note before a
/// single layout update is written.
pub(crate) const APPLY_DEBOUNCE_MS: i32 = 30;

/// Quiet period for viewport resize events. Longer than the per-note apply
/// debounce because resize events fire on every pixel of a window drag.
pub(crate) const RESIZE_DEBOUNCE_MS: i32 = 180;

/// Clamp bounds for a measured content height, defending layout against
/// pathological documents. Applied after the content padding is added.
pub(crate) const MIN_CONTENT_HEIGHT_PX: f64 = 80.0;
pub(crate) const MAX_CONTENT_HEIGHT_PX: f64 = 4000.0;

/// Padding added to the raw measured height before clamping.
pub(crate) const CONTENT_PADDING_PX: f64 = 16.0;

/// Fixed chrome (borders/padding) added on top of content + header when
/// sizing the note container.
pub(crate) const CHROME_PADDING_PX: i32 = 16;

/// Surfaces never lay out narrower than this, so a squeezed window does not
/// produce degenerate single-word line wrapping.
pub(crate) const MIN_SURFACE_WIDTH_PX: i32 = 200;

/// Subtracted from the window width when a slot has no measurable width of
/// its own yet (scrollbar and list padding allowance).
pub(crate) const SURFACE_WIDTH_GUTTER_PX: i32 = 32;

/// Delay before the second (and last) fallback measurement when script
/// injection failed and the event-driven protocol is unavailable.
pub(crate) const FALLBACK_REMEASURE_DELAY_MS: i32 = 100;

/// Initial surface height while a document is still loading.
pub(crate) const LOADING_SURFACE_HEIGHT_PX: i32 = 60;
