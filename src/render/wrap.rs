/// Id of the measurable root container in every wrapped note document.
pub(crate) const ROOT_ID: &str = "notefold-root";

/// Reset + content styles baked into every wrapped document.
///
/// The html/body height overrides matter: without them the body inherits the
/// iframe viewport height and the measurement script would report that
/// instead of the content's intrinsic height. Images scale down to the
/// available width but keep any explicit `width` attribute below it, so a
/// chosen display width survives save and reload.
const WRAPPER_CSS: &str = "html,body{height:auto !important;min-height:0 !important;margin:0;padding:0;overflow-x:hidden;}\
#notefold-root{box-sizing:border-box;padding:8px 12px 8px 12px;display:block;width:100%;}\
body{font-family:sans-serif;font-size:12px;color:#111;}\
img{max-width:100%;height:auto;display:block;margin:0;} p{margin:12px 0;}\
pre, code { white-space: pre-wrap; word-wrap: break-word; overflow-wrap: break-word; }\
table{ max-width:100%; table-layout: fixed; } ul,ol{margin:4px 0;padding-left:24px;}";

/// Wrap a rendered note fragment into a complete, self-contained document.
///
/// `base_href` makes relative attachment references (e.g.
/// `attachments/img.png`) resolve against the note's chapter on the backend.
/// The initial width is recorded on the root as metadata only; layout width
/// is owned by the surface element so that width changes reflow the document
/// without a reload. The fragment is passed through verbatim.
pub(crate) fn wrap_note_document(fragment: &str, base_href: &str, width_px: i32) -> String {
    format!(
        "<!DOCTYPE html><html><head>\
<base href=\"{base}\">\
<style>{css}</style>\
</head><body><div id=\"{root_id}\" data-initial-width=\"{width}\">{fragment}</div></body></html>",
        base = escape_attr(base_href),
        css = WRAPPER_CSS,
        root_id = ROOT_ID,
        width = width_px,
    )
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_document_carries_root_and_base() {
        let doc = wrap_note_document("<p>Hello</p>", "http://localhost:6687/files/nb/ch/notes/", 600);
        assert!(doc.contains("<base href=\"http://localhost:6687/files/nb/ch/notes/\">"));
        assert!(doc.contains(&format!("id=\"{ROOT_ID}\"")));
        assert!(doc.contains("data-initial-width=\"600\""));
        assert!(doc.contains("<p>Hello</p>"));
    }

    #[test]
    fn test_css_reset_disables_viewport_height_and_scales_images() {
        let doc = wrap_note_document("", "", 600);
        assert!(doc.contains("height:auto !important"));
        assert!(doc.contains("margin:0"));
        assert!(doc.contains("img{max-width:100%;height:auto"));
        assert!(doc.contains("table-layout: fixed"));
    }

    #[test]
    fn test_malformed_fragment_passes_through_verbatim() {
        let fragment = "<div><span>unclosed";
        let doc = wrap_note_document(fragment, "", 480);
        assert!(doc.contains(fragment));
    }

    #[test]
    fn test_base_href_is_attribute_escaped() {
        let doc = wrap_note_document("", "http://h/a\"b<c>", 320);
        assert!(doc.contains("<base href=\"http://h/a&quot;b&lt;c&gt;\">"));
    }

    #[test]
    fn test_wrapping_is_deterministic() {
        let a = wrap_note_document("<em>x</em>", "http://h/", 500);
        let b = wrap_note_document("<em>x</em>", "http://h/", 500);
        assert_eq!(a, b);
    }
}
