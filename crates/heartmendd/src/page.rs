//! HTML for the single-page form and the streamed results.
//!
//! Model output is rendered as markdown. Raw HTML in it is shown as text and
//! script-capable link targets are neutralised.

use heartmend_core::{
    ConfigError, CycleReport, MaterializeFailure, RecoveryRole, RoleOutcome, RoleSection,
};
use html_escape::encode_text;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

const TITLE: &str = "💔 Breakup Recovery App";

const CONSENT_TEXT: &str = "I consent to processing my text and uploaded images for the purpose \
of generating breakup recovery suggestions. I understand that I should not upload extremely \
sensitive personal information.";

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 1100px; margin: 2rem auto; padding: 0 1rem; }
.columns { display: flex; gap: 2rem; flex-wrap: wrap; }
.columns > div { flex: 1 1 420px; }
textarea { width: 100%; height: 150px; }
.thumbs figure { margin: 0.5rem 0; }
.thumbs img { max-width: 100%; }
.notice { padding: 0.75rem 1rem; border-radius: 6px; margin: 1rem 0; }
.notice.info { background: #e8f0fe; }
.notice.warning { background: #fff4e5; }
.notice.error { background: #fdecea; }
.pending { color: #555; font-style: italic; }
footer { text-align: center; margin-top: 3rem; color: #555; }
"#;

const THUMBNAIL_SCRIPT: &str = r#"
document.getElementById('screenshots').addEventListener('change', function (e) {
  const box = document.getElementById('thumbs');
  box.innerHTML = '';
  for (const file of e.target.files) {
    const fig = document.createElement('figure');
    const img = document.createElement('img');
    img.src = URL.createObjectURL(file);
    const cap = document.createElement('figcaption');
    cap.textContent = file.name;
    fig.appendChild(img);
    fig.appendChild(cap);
    box.appendChild(fig);
  }
});
"#;

/// Severity of a banner shown above the form or results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

impl NoticeKind {
    fn class(self) -> &'static str {
        match self {
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        }
    }
}

pub fn notice(kind: NoticeKind, message: &str) -> String {
    format!(
        "<div class=\"notice {}\">{}</div>\n",
        kind.class(),
        encode_text(message)
    )
}

fn head() -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{TITLE}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{TITLE}</h1>\n"
    )
}

fn footer() -> &'static str {
    "<hr>\n<footer><p>Don't worry, time heals everything ❤️</p></footer>\n</body>\n</html>\n"
}

/// The input form, optionally preceded by a banner.
pub fn form_page(banner: Option<(NoticeKind, &str)>) -> String {
    let mut out = head();
    out.push_str(
        "<h3>Your AI-powered breakup recovery team is here to help!</h3>\n\
         <p>Share your feelings and chat screenshots, and we'll help you navigate through this tough time.</p>\n",
    );
    if let Some((kind, message)) = banner {
        out.push_str(&notice(kind, message));
    }
    out.push_str(&format!(
        r#"<form method="post" action="/recovery-plan" enctype="multipart/form-data">
<h3>Privacy &amp; Consent</h3>
<label><input type="checkbox" name="consent" value="true"> {consent}</label>
<div class="columns">
<div>
<h2>Share Your Feelings</h2>
<label for="narrative">How are you feeling? What happened?</label>
<textarea id="narrative" name="narrative" placeholder="Tell us your story..."></textarea>
</div>
<div>
<h2>Upload Chat Screenshots</h2>
<label for="screenshots">Upload screenshots (optional)</label>
<input type="file" id="screenshots" name="screenshots" accept=".jpg,.jpeg,.png" multiple>
<div id="thumbs" class="thumbs"></div>
</div>
</div>
<p><button type="submit">Get Recovery Plan 💝</button></p>
</form>
<script>{script}</script>
"#,
        consent = encode_text(CONSENT_TEXT),
        script = THUMBNAIL_SCRIPT,
    ));
    out.push_str(footer());
    out
}

/// Shown instead of the form when no credential is configured.
pub fn config_error_page(err: &ConfigError) -> String {
    let mut out = head();
    out.push_str(&notice(NoticeKind::Error, &format!("❌ {err}")));
    out.push_str(
        "<p>Please set it as:</p>\n\
         <pre><code>gemini_api_key = \"YOUR_KEY_HERE\"</code></pre>\n\
         <pre><code>export GEMINI_API_KEY=YOUR_KEY</code></pre>\n",
    );
    out.push_str(footer());
    out
}

/// First chunk of a streamed result page.
pub fn results_head() -> String {
    let mut out = head();
    out.push_str("<h2>Your Personalized Recovery Plan</h2>\n");
    out
}

pub fn skipped_images(failures: &[MaterializeFailure]) -> String {
    let names: Vec<&str> = failures.iter().map(|f| f.source_name.as_str()).collect();
    notice(
        NoticeKind::Warning,
        &format!("Some screenshots could not be processed and were skipped: {}", names.join(", ")),
    )
}

fn is_script_url(url: &str) -> bool {
    let url = url.trim_start().to_ascii_lowercase();
    ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

fn neutralise_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_script_url(&url) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Markdown to HTML with embedded HTML demoted to escaped text.
pub fn render_markdown(source: &str) -> String {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let events = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: neutralise_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: neutralise_url(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// Progress line shown while a role generates; hidden once its section lands.
pub fn pending(role: RecoveryRole, label: &str) -> String {
    format!(
        "<p class=\"pending\" id=\"pending-{role}\">{}</p>\n",
        encode_text(label)
    )
}

pub fn section(section: &RoleSection) -> String {
    let body = match &section.outcome {
        RoleOutcome::Completed { response } => format!(
            "<div class=\"content\">\n{}</div>",
            render_markdown(&response.content)
        ),
        RoleOutcome::Failed { error } => notice(
            NoticeKind::Error,
            &format!("This section could not be generated: {error}"),
        ),
    };
    format!(
        "<style>#pending-{role} {{ display: none; }}</style>\n\
         <section class=\"section {role}\">\n<h3>{heading}</h3>\n{body}\n</section>\n",
        role = section.role,
        heading = encode_text(&section.heading),
    )
}

/// Last chunk of a streamed result page.
pub fn results_tail(report: Option<&CycleReport>) -> String {
    let mut out = String::new();
    if let Some(report) = report {
        let failed = report.failed_roles().len();
        if failed > 0 {
            out.push_str(&notice(
                NoticeKind::Info,
                &format!("{failed} of {} sections failed; try again in a moment.", report.sections.len()),
            ));
        }
    }
    out.push_str("<p><a href=\"/\">Start over</a></p>\n");
    out.push_str(footer());
    out
}
