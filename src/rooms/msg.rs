use anyhow::anyhow;
use pulldown_cmark::{Event, Options, Parser};
use pulldown_cmark_escape::escape_html;
use time::macros::format_description;
use tracing::warn;

use crate::{include_res, message::RoomMessage, AppResult};

pub const RENDER_FALLBACK: &str = "failed to render message";

/// Renders a message for the browser, degrading to a placeholder on failure.
pub fn render(message: &RoomMessage) -> String {
    match try_render(message) {
        Ok(html) => html,
        Err(err) => {
            warn!(id = %message.id, %err, "render");
            RENDER_FALLBACK.to_owned()
        }
    }
}

pub fn try_render(message: &RoomMessage) -> AppResult<String> {
    if message.nick.is_empty() || message.color.is_empty() {
        return Err(anyhow!("message {} has no sender", message.id).into());
    }

    let time = message.time.format(format_description!("[hour]:[minute]"))?;

    let html = include_res!(str, "/pages/message.html")
        .replace("{id}", &message.id.to_string())
        .replace("{type}", message.kind.as_str())
        .replace("{time}", &time)
        .replace("{color}", &escape(&message.color))
        .replace("{nick}", &escape(&message.nick))
        .replace("{body}", &body_to_html(&message.body));

    Ok(html.trim().to_owned())
}

fn body_to_html(body: &str) -> String {
    let parser = Parser::new_ext(body, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        _ => event,
    });

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html.replace('{', "&#123;").replace('}', "&#125;")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String is infallible.
    let _ = escape_html(&mut out, text);
    out.replace('{', "&#123;").replace('}', "&#125;")
}
