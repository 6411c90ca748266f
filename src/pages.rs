//! Server-rendered HTML pages: home, score tracking and chat.
//!
//! Pages are plain strings with embedded CSS; every user- or model-supplied
//! value goes through [`escape_html`]. The score history chart is an inline
//! SVG polyline of `Score` over `Time`, one point per entry in file order.

use crate::models::{ChatMessage, Role, ScoreEntry, TIME_FORMAT};
use crate::scores;

const CHART_WIDTH: f64 = 720.0;
const CHART_HEIGHT: f64 = 280.0;
const CHART_PADDING: f64 = 40.0;

fn layout(title: &str, active: &str, body: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"vi\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!("<title>{} · MindCare Chatbot</title>\n", escape_html(title)));
    html.push_str("<style>\n");
    html.push_str(CSS_STYLES);
    html.push_str("</style>\n</head>\n<body>\n");

    html.push_str("<nav>\n");
    for (href, label) in [("/", "Home"), ("/user", "User"), ("/chat", "Chat")] {
        let class = if label == active { " class=\"active\"" } else { "" };
        html.push_str(&format!("<a href=\"{href}\"{class}>{label}</a>\n"));
    }
    html.push_str("</nav>\n<main>\n");
    html.push_str(body);
    html.push_str("</main>\n</body>\n</html>\n");
    html
}

pub fn home_page() -> String {
    layout("Home", "Home", HOME_BODY)
}

/// Score tracking page. `selected` is a `YYYY-MM-DD HH:MM:SS` timestamp;
/// the first entry is shown when none is given.
pub fn user_page(entries: &[ScoreEntry], selected: Option<&str>) -> String {
    let mut body = String::new();
    body.push_str("<h1>🧠 Mental Health Tracking</h1>\n");

    body.push_str("<h2>📊 Score History</h2>\n");
    if entries.is_empty() {
        body.push_str("<p class=\"warning\">No data available to display.</p>\n");
    } else {
        body.push_str(&score_chart_svg(entries));
    }

    body.push_str("<h2>📅 View Details by Time</h2>\n");
    if entries.is_empty() {
        body.push_str("<p class=\"warning\">No data available to select.</p>\n");
        return layout("User", "User", &body);
    }

    let times = scores::timestamps(entries);
    let selected = selected
        .map(|s| s.trim().to_string())
        .or_else(|| times.first().cloned())
        .unwrap_or_default();

    body.push_str("<form method=\"get\" action=\"/user\">\n");
    body.push_str("<label for=\"time\">Select a timestamp</label>\n");
    body.push_str("<select id=\"time\" name=\"time\" onchange=\"this.form.submit()\">\n");
    for t in &times {
        let sel = if *t == selected { " selected" } else { "" };
        let t = escape_html(t);
        body.push_str(&format!("<option value=\"{t}\"{sel}>{t}</option>\n"));
    }
    body.push_str("</select>\n<button type=\"submit\">Show</button>\n</form>\n");

    match scores::find_by_time(entries, &selected) {
        Some(entry) => {
            body.push_str("<div class=\"details\">\n");
            body.push_str(&format!(
                "<h3>Details for {}</h3>\n",
                entry.time.format(TIME_FORMAT)
            ));
            body.push_str(&format!("<p><strong>Score:</strong> {}</p>\n", entry.score));
            body.push_str(&format!(
                "<p><strong>Level:</strong> {}</p>\n",
                escape_html(&entry.level)
            ));
            body.push_str(&format!(
                "<p><strong>Content:</strong> {}</p>\n",
                escape_html(&entry.content)
            ));
            body.push_str(&format!(
                "<p><strong>Total Guess:</strong> {}</p>\n",
                escape_html(&entry.total_guess)
            ));
            body.push_str("</div>\n");
        }
        None => body.push_str("<p>No data available for the selected time.</p>\n"),
    }

    layout("User", "User", &body)
}

/// Chat page with the full transcript, an optional success notice and an
/// optional error from the last request.
pub fn chat_page(messages: &[ChatMessage], notice: Option<&str>, error: Option<&str>) -> String {
    let mut body = String::new();
    body.push_str("<h1>MindCare Chatbot</h1>\n");

    body.push_str("<form method=\"post\" action=\"/chat/clear\">\n");
    body.push_str("<button type=\"submit\" class=\"secondary\">Clear Chat History</button>\n");
    body.push_str("</form>\n");

    if let Some(notice) = notice {
        body.push_str(&format!("<p class=\"success\">{}</p>\n", escape_html(notice)));
    }

    body.push_str("<div class=\"chat\">\n");
    for msg in messages {
        let (class, label) = match msg.role {
            Role::User => ("user", "🧑"),
            Role::Assistant => ("assistant", "🤖"),
        };
        body.push_str(&format!(
            "<div class=\"message {class}\"><span class=\"avatar\">{label}</span><div class=\"content\">{}</div></div>\n",
            escape_html(&msg.content).replace('\n', "<br>")
        ));
    }
    body.push_str("</div>\n");

    if let Some(error) = error {
        body.push_str(&format!("<p class=\"error\">{}</p>\n", escape_html(error)));
    }

    body.push_str("<form method=\"post\" action=\"/chat\" class=\"input\">\n");
    body.push_str("<input type=\"text\" name=\"message\" placeholder=\"Nhập câu hỏi hoặc chia sẻ của bạn...\" autocomplete=\"off\" autofocus>\n");
    body.push_str("<button type=\"submit\">Gửi</button>\n");
    body.push_str("</form>\n");

    layout("Chat", "Chat", &body)
}

/// Inline SVG line chart of score over time.
pub fn score_chart_svg(entries: &[ScoreEntry]) -> String {
    let points = chart_points(entries);
    let (min, max) = score_range(entries);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg class=\"chart\" viewBox=\"0 0 {w} {h}\" width=\"100%\" role=\"img\" aria-label=\"Score History\">\n",
        w = CHART_WIDTH,
        h = CHART_HEIGHT + CHART_PADDING
    ));
    svg.push_str(&format!(
        "<line x1=\"{p}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\" class=\"axis\"/>\n<line x1=\"{p}\" y1=\"{p}\" x2=\"{p}\" y2=\"{b}\" class=\"axis\"/>\n",
        p = CHART_PADDING,
        b = CHART_HEIGHT - CHART_PADDING,
        r = CHART_WIDTH - CHART_PADDING
    ));
    svg.push_str(&format!(
        "<text x=\"4\" y=\"{}\" class=\"label\">{}</text>\n<text x=\"4\" y=\"{}\" class=\"label\">{}</text>\n",
        CHART_PADDING + 4.0,
        max,
        CHART_HEIGHT - CHART_PADDING,
        min
    ));

    let polyline: Vec<String> = points
        .iter()
        .map(|(x, y)| format!("{:.1},{:.1}", x, y))
        .collect();
    svg.push_str(&format!(
        "<polyline points=\"{}\" class=\"line\"/>\n",
        polyline.join(" ")
    ));

    for ((x, y), entry) in points.iter().zip(entries) {
        let time = entry.time.format(TIME_FORMAT).to_string();
        svg.push_str(&format!(
            "<circle cx=\"{x:.1}\" cy=\"{y:.1}\" r=\"4\" class=\"point\"><title>{} · {}</title></circle>\n",
            time, entry.score
        ));
        svg.push_str(&format!(
            "<text x=\"{x:.1}\" y=\"{:.1}\" class=\"label tick\" transform=\"rotate(30 {x:.1} {:.1})\">{}</text>\n",
            CHART_HEIGHT - CHART_PADDING + 14.0,
            CHART_HEIGHT - CHART_PADDING + 14.0,
            time
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

/// Chart coordinates: x evenly spaced in file order, y scaled between the
/// lowest and highest score (a flat series sits mid-height).
pub fn chart_points(entries: &[ScoreEntry]) -> Vec<(f64, f64)> {
    if entries.is_empty() {
        return Vec::new();
    }
    let (min, max) = score_range(entries);
    let left = CHART_PADDING;
    let right = CHART_WIDTH - CHART_PADDING;
    let top = CHART_PADDING;
    let bottom = CHART_HEIGHT - CHART_PADDING;

    let n = entries.len();
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let x = if n == 1 {
                (left + right) / 2.0
            } else {
                left + (right - left) * i as f64 / (n - 1) as f64
            };
            let y = if (max - min).abs() < f64::EPSILON {
                (top + bottom) / 2.0
            } else {
                bottom - (bottom - top) * (e.score_value() - min) / (max - min)
            };
            (x, y)
        })
        .collect()
}

fn score_range(entries: &[ScoreEntry]) -> (f64, f64) {
    entries
        .iter()
        .map(ScoreEntry::score_value)
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 0.0))
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const HOME_BODY: &str = r#"<h1>🧠 MindCare Chatbot</h1>
<p><strong>Support for mental health consultation and monitoring based on DSM-5 standards</strong></p>

<h2>📖 Introduction</h2>
<p>Welcome to the <strong>Mental Healthcare System</strong>, an application that uses artificial intelligence to provide an intelligent mental health assistant. The system helps with:</p>
<ul>
<li><strong>Mental health consultation</strong>: Engage in natural conversations to relieve emotions and address psychological concerns.</li>
<li><strong>Preliminary analysis and diagnosis</strong>: Assess mental health conditions based on DSM-5 standards, covering common disorders like anxiety and depression.</li>
<li><strong>Progress tracking</strong>: Store interaction history and provide recommendations to improve mental health over time.</li>
</ul>
<p>The system is designed with a user-friendly interface and keeps all data on the local machine.</p>

<h2>🚀 Usage Guide</h2>
<ol>
<li><strong>Interact with the AI assistant</strong>: open the <a href="/chat">chat</a> page and talk naturally, as you would with a friend. Share your emotions, symptoms, or any issues you're facing.</li>
<li><strong>Receive assessment and recommendations</strong>: when you choose to end the conversation, the assistant summarizes it and gives a preliminary assessment on four levels (Poor, Average, Normal, Good) with a simple suggestion to try at home.</li>
<li><strong>Track progress</strong>: review your scores over time on the <a href="/user">tracking</a> page.</li>
<li><strong>Use regularly</strong>: come back often to monitor and improve your mental health.</li>
</ol>

<h2>ℹ️ Additional Information</h2>
<ul>
<li><strong>Data source</strong>: the system uses the "Diagnostic Criteria for Mental Disorders based on DSM-5" (a condensed 106-page version) as the basis for analysis.</li>
</ul>

<footer>© 2025 All rights reserved.</footer>
"#;

const CSS_STYLES: &str = r#"
body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; margin: 0; color: #1f2933; background: #f7f8fa; }
nav { background: #2f3e5c; padding: 0.6em 2em; }
nav a { color: #dfe6f0; margin-right: 1.5em; text-decoration: none; }
nav a.active { color: #fff; font-weight: bold; }
main { max-width: 900px; margin: 0 auto; padding: 1.5em 2em; }
h1 { margin-top: 0.4em; }
.warning { background: #fff8e1; border-left: 4px solid #f0b429; padding: 0.6em 1em; }
.success { background: #e3f9e5; border-left: 4px solid #3ebd93; padding: 0.6em 1em; }
.error { background: #ffe3e3; border-left: 4px solid #e12d39; padding: 0.6em 1em; }
.details { background: #fff; border: 1px solid #d9e2ec; border-radius: 6px; padding: 0.5em 1.2em; margin-top: 1em; }
.chat { display: flex; flex-direction: column; gap: 0.8em; margin: 1em 0; }
.message { display: flex; gap: 0.6em; align-items: flex-start; }
.message .content { background: #fff; border: 1px solid #d9e2ec; border-radius: 8px; padding: 0.6em 0.9em; }
.message.user .content { background: #e8f0fe; }
form.input { display: flex; gap: 0.5em; }
form.input input { flex: 1; padding: 0.6em; border: 1px solid #bcccdc; border-radius: 6px; }
button { padding: 0.5em 1.1em; border: none; border-radius: 6px; background: #2f3e5c; color: #fff; cursor: pointer; }
button.secondary { background: #829ab1; }
svg.chart { background: #fff; border: 1px solid #d9e2ec; border-radius: 6px; }
svg .axis { stroke: #9fb3c8; stroke-width: 1; }
svg .line { fill: none; stroke: #2186eb; stroke-width: 2; }
svg .point { fill: #2186eb; }
svg .label { font-size: 10px; fill: #52606d; }
footer { margin-top: 3em; padding-top: 1em; border-top: 1px solid #d9e2ec; color: #7b8794; }
"#;
