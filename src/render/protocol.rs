use crate::render::wrap::ROOT_ID;

/// Prefix of the one-way height signal posted by the measurement script.
/// Payloads that do not match `HEIGHT:<nonnegative number>` are ignored.
pub(crate) const HEIGHT_PREFIX: &str = "HEIGHT:";

/// Global installed inside the loaded document; calling it forces an
/// immediate re-measurement without reloading (used after width changes).
pub(crate) const MEASURE_GLOBAL: &str = "__notefoldMeasure";

/// Script injected into a loaded note document.
///
/// Measures the root container (falling back to the whole body when the
/// root cannot be found) and posts `HEIGHT:<px>` to the parent window.
/// Re-measures at most once per animation frame, re-armed by DOM mutations
/// and by load events of images that were still incomplete at injection
/// time. Every emission is a candidate, not a final answer: documents with
/// images or late reflows settle over several frames and the host is
/// expected to debounce.
pub(crate) fn measurement_script() -> String {
    format!(
        r#"(() => {{
  let scheduled = false;

  const measure = () => {{
    scheduled = false;
    const root = document.getElementById('{root_id}');
    let h;
    if (root) {{
      h = root.scrollHeight
        || (root.getBoundingClientRect && root.getBoundingClientRect().height)
        || 0;
    }} else {{
      h = document.body.scrollHeight || document.documentElement.scrollHeight || 0;
    }}
    try {{ parent.postMessage('{prefix}' + h, '*'); }} catch (_) {{}}
  }};

  const schedule = () => {{
    if (scheduled) return;
    scheduled = true;
    requestAnimationFrame(measure);
  }};

  window.{global} = schedule;

  const obs = new MutationObserver(schedule);
  try {{
    obs.observe(document.getElementById('{root_id}') || document.body,
      {{ subtree: true, childList: true, attributes: true }});
  }} catch (_) {{}}

  for (const img of Array.from(document.images || [])) {{
    if (!img.complete) img.addEventListener('load', schedule);
  }}

  schedule();
}})();"#,
        root_id = ROOT_ID,
        prefix = HEIGHT_PREFIX,
        global = MEASURE_GLOBAL,
    )
}

/// Parse a signal payload. Accepts only the `HEIGHT:<n>` shape with a
/// finite, nonnegative number; anything else is not ours.
pub(crate) fn parse_height_signal(payload: &str) -> Option<f64> {
    let rest = payload.strip_prefix(HEIGHT_PREFIX)?;
    let height: f64 = rest.trim().parse().ok()?;
    (height.is_finite() && height >= 0.0).then_some(height)
}
