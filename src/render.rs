use std::borrow::Cow;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::air_quality::{AggregateResult, Category};

pub fn render_block(results: &[AggregateResult]) -> String {
    let mut html = String::from("<div id=\"insert-readings\">\n");

    for result in results {
        html.push_str(&render_machine(result));
    }

    html.push_str("</div>\n");
    html
}

fn render_machine(result: &AggregateResult) -> String {
    let name = escape_html(&result.machine.name);
    let text = match result.average.concentration() {
        Some(c) => format!("{name}: {c} &mu;g/m<sup>3</sup>"),
        None => format!("{name}: unavailable"),
    };

    format!(
        "  <div class=\"inner-div {}\"><p>{text}</p></div>\n",
        result.category.as_str()
    )
}

pub fn render_page(results: &[AggregateResult], generated_at: DateTime<Tz>) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Air quality</title>\n<style>\n",
    );

    html.push_str(".inner-div { padding: 0.5em 1em; margin: 0.25em; border-radius: 4px; }\n");
    for category in Category::ALL {
        html.push_str(&format!(
            ".{} {{ background-color: {}; }}\n",
            category.as_str(),
            category.color()
        ));
    }

    html.push_str("</style>\n</head>\n<body>\n<h1>Air quality</h1>\n");
    html.push_str(&render_block(results));
    html.push_str(&format!(
        "<p class=\"generated-at\">Generated at {}</p>\n",
        generated_at.format("%Y-%m-%d %H:%M:%S %Z")
    ));
    html.push_str("</body>\n</html>\n");

    html
}

fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    Cow::Owned(escaped)
}
