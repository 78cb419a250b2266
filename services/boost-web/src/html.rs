//! Server-rendered pages
//!
//! Every interpolated value goes through [`escape`]; device names and flash
//! text come from Google or from form input.

use cookie_state::Flash;
use nest_device::Device;

/// Escape the HTML-special characters for text and attribute positions.
pub fn escape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(ch),
        }
    }
    output
}

fn layout(flashes: &[Flash], content: &str) -> String {
    let mut alerts = String::new();
    for flash in flashes {
        alerts.push_str(&format!(
            r#"<div class="alert {}" role="alert">{}</div>"#,
            flash.level.css_class(),
            escape(&flash.message)
        ));
        alerts.push('\n');
    }
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Nest Heating Boost</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css">
</head>
<body>
<main class="container py-4">
<h1 class="mb-4">Nest Heating Boost</h1>
{alerts}{content}
</main>
</body>
</html>
"#
    )
}

/// Page linking to Google's consent screen.
pub fn authorize_page(flashes: &[Flash], authorize_url: &str) -> String {
    let content = format!(
        r#"<p>Allow this site to adjust your thermostats.</p>
<a class="btn btn-primary" href="{}">Authorize access to Nest</a>"#,
        escape(authorize_url)
    );
    layout(flashes, &content)
}

/// Thermostat list with the boost form.
pub fn home_page<'a>(
    flashes: &[Flash],
    thermostats: impl IntoIterator<Item = &'a Device>,
    enable_submit: bool,
) -> String {
    let mut options = String::new();
    for device in thermostats {
        let mut label = escape(device.display_name());
        if let Some(current) = device.ambient_temperature() {
            label.push_str(&format!(" ({current:.1}&deg;C)"));
        }
        options.push_str(&format!(
            "<option value=\"{}\">{}</option>\n",
            escape(device.device_id()),
            label
        ));
    }
    let disabled = if enable_submit { "" } else { " disabled" };
    let content = format!(
        r#"<form method="post" action="/boost">
<div class="mb-3">
<label class="form-label" for="device">Thermostat</label>
<select class="form-select" id="device" name="device">
{options}</select>
</div>
<div class="mb-3">
<label class="form-label" for="temperature">Temperature (&deg;C)</label>
<input class="form-control" type="number" id="temperature" name="temperature" min="9" max="32" step="0.5" value="21">
</div>
<div class="mb-3">
<label class="form-label" for="duration">Duration (minutes)</label>
<input class="form-control" type="number" id="duration" name="duration" min="1" max="1440" step="1" value="30">
</div>
<button class="btn btn-primary" type="submit"{disabled}>Boost</button>
</form>"#
    );
    layout(flashes, &content)
}
