use std::fmt::Write as _;

use slt_core::{LowerThird, Visibility, VisibilityChanged};

/// Formats the result of `ListLowerThirds`.
pub fn render_items(items: &[LowerThird]) -> String {
    if items.is_empty() {
        return "No items returned. Check that the plugin has lower thirds loaded.\n".to_string();
    }

    let mut out = format!("Listed {} item(s).\n", items.len());
    for item in items {
        out.push('\n');
        out.push_str(&render_item(item));
    }
    out
}

fn render_item(item: &LowerThird) -> String {
    let title = if item.title.is_empty() {
        &item.id
    } else {
        &item.title
    };

    let mut out = format!("{title}\n");
    if !item.subtitle.is_empty() {
        let _ = writeln!(out, "  {}", item.subtitle);
    }
    let _ = writeln!(out, "  {}", visibility_label(item.is_visible));
    let _ = writeln!(
        out,
        "  Repeat: {} sec | Visible: {} sec | Hotkey: {}",
        item.repeat_every_sec,
        item.repeat_visible_sec,
        if item.hotkey.is_empty() { "-" } else { item.hotkey.as_str() }
    );
    let _ = writeln!(out, "  id: {}", item.id);
    out
}

pub fn render_visibility(result: &Visibility) -> String {
    format!("{} is now {}.", result.id, visibility_label(result.visible).to_lowercase())
}

pub fn render_visibility_changed(event: &VisibilityChanged) -> String {
    let visible: Vec<&str> = event.visible_ids.iter().map(|entry| entry.id.as_str()).collect();
    format!(
        "{} -> {} (visible: {})",
        event.id,
        visibility_label(event.visible).to_lowercase(),
        if visible.is_empty() {
            "none".to_string()
        } else {
            visible.join(", ")
        }
    )
}

fn visibility_label(visible: bool) -> &'static str {
    if visible { "Visible" } else { "Hidden" }
}
