//! Message body cleanup: HTML and quoted-reply markup reduced to plain text
//!
//! The cleaner runs in three stages:
//! 1. markup removal over the whole body (style/script blocks, images, links,
//!    inline base64 images, remaining tags, decorative attributes)
//! 2. per-line cleanup (space runs, boilerplate, quote markers, trailing
//!    whitespace)
//! 3. blank-line collapsing and a final trim
//!
//! The output of [`clean_email_content`] is a fixed point: cleaning it again
//! returns it unchanged.

use once_cell::sync::Lazy;
use regex::Regex;

static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<style[^>]*>.*?</style>").unwrap());

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<script[^>]*>.*?</script>").unwrap());

static IMAGE_WITH_ALT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]*alt="([^"]*)"[^>]*>"#).unwrap());

static IMAGE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<img[^>]*>").unwrap());

static ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a[^>]*href="[^"]*"[^>]*>([^<]+)</a>"#).unwrap());

static BASE64_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"data:image/[^;]+;base64,[a-zA-Z0-9+/]+={0,2}").unwrap());

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

static DECORATIVE_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:style|class|width|height|align)="[^"]*""#).unwrap());

/// Footer and legal boilerplate; each match runs to the end of its line
static BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Copyright ©.*",
        r"(?i)You are receiving this email because.*",
        r"(?i)To connect with us.*",
        r"(?i)Our mailing address.*",
        r"(?i)Unsubscribe.*",
        r"(?i)Add .* to your address book.*",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

static QUOTE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:>\s*)+").unwrap());

/// Clean a decoded message body for classification
///
/// Removes markup and footer boilerplate while keeping the visible text and
/// the structure of quoted replies. Never fails; the result may be empty.
pub fn clean_email_content(text: &str) -> String {
    let text = strip_markup(text);

    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = clean_line(line);
        // Collapse runs of blank lines into one
        if line.is_empty() && lines.last().is_some_and(|prev| prev.is_empty()) {
            continue;
        }
        lines.push(line);
    }

    lines.join("\n").trim().to_string()
}

fn strip_markup(text: &str) -> String {
    let text = STYLE_BLOCK.replace_all(text, "");
    let text = SCRIPT_BLOCK.replace_all(&text, "");

    let text = IMAGE_WITH_ALT.replace_all(&text, "${1}");
    let text = IMAGE_TAG.replace_all(&text, "");

    let text = ANCHOR.replace_all(&text, "${1}");
    let text = BASE64_IMAGE.replace_all(&text, "");

    let text = ANY_TAG.replace_all(&text, " ");

    // Removing one attribute can splice the halves of another (or of an
    // inline image) together
    let mut text = text.into_owned();
    loop {
        let stripped = DECORATIVE_ATTRIBUTE.replace_all(&text, "").into_owned();
        let stripped = BASE64_IMAGE.replace_all(&stripped, "").into_owned();
        if stripped.len() == text.len() {
            break;
        }
        text = stripped;
    }
    text
}

fn clean_line(line: &str) -> String {
    let mut line = SPACE_RUN.replace_all(line, " ").into_owned();

    for pattern in BOILERPLATE.iter() {
        if pattern.is_match(&line) {
            line = pattern.replace_all(&line, "").into_owned();
        }
    }

    if line.trim_start().starts_with('>') {
        line = QUOTE_PREFIX.replace(&line, "> ").into_owned();
    }

    line.trim_end().to_string()
}
