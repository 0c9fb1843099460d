use pulldown_cmark::{html, Options, Parser};

/// Bodies larger than this skip the markdown parser and render as an
/// escaped plain-text block instead.
const MAX_BODY_BYTES: usize = 512 * 1024;

/// Render a note body (markdown) to an HTML fragment.
///
/// Note-taking dialect: a single newline is a hard line break, a blank line
/// still starts a new paragraph. Raw HTML passes through untouched, which is
/// what lets `<img src alt width>` attachments round-trip a chosen display
/// width through save and reload.
pub(crate) fn render_note_html(markup: &str) -> String {
    if markup.len() > MAX_BODY_BYTES {
        return plain_text_block(markup);
    }

    let prepared = prepare_hard_breaks(markup);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(&prepared, options);
    let mut out = String::with_capacity(prepared.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Fallback block for bodies that cannot (or should not) go through the
/// markdown parser. Height measurement is unaffected: it operates on the
/// final document regardless of content.
pub(crate) fn plain_text_block(markup: &str) -> String {
    format!("<pre>{}</pre>", escape_html(markup))
}

/// Turn every lone newline into a markdown hard break (two trailing spaces)
/// while leaving blank lines alone so paragraphs still work.
///
/// Line endings are normalized first (CRLF and bare CR both become LF). The
/// blank-line marker cannot occur in note text, so the swap is safe.
fn prepare_hard_breaks(markup: &str) -> String {
    const PARA: &str = "\u{0}PARA\u{0}";

    let normalized = markup.replace("\r\n", "\n").replace('\r', "\n");
    normalized
        .replace("\n\n", PARA)
        .replace('\n', "  \n")
        .replace(PARA, "\n\n")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
