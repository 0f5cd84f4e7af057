//! Final story assembly for the vault entry.

use hourglass_types::turn::Turn;

/// Stand-in text for a session that produced no words at all.
pub const EMPTY_STORY: &str = "The story is still warming up...";

/// Fill a template with the resolved text of each turn.
///
/// Unresolved or unknown placeholders fall back to their slot name with
/// underscores shown as spaces. Without a template the resolved texts are
/// joined in turn order.
pub fn assemble_story(template_text: Option<&str>, turns: &[Turn]) -> String {
    let story = match template_text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(template) => {
            let mut story = template.to_string();
            for turn in turns {
                let value = turn
                    .resolved_text
                    .clone()
                    .unwrap_or_else(|| slot_fallback(&turn.part_of_speech));
                story = story.replace(&turn.placeholder, &value);
            }
            replace_leftover_placeholders(&story)
        }
        None => {
            let mut ordered: Vec<&Turn> = turns.iter().collect();
            ordered.sort_by_key(|t| t.order_index);
            ordered
                .iter()
                .filter_map(|t| t.resolved_text.as_deref())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        }
    };

    let story = story.trim();
    if story.is_empty() {
        EMPTY_STORY.to_string()
    } else {
        story.to_string()
    }
}

fn slot_fallback(slot: &str) -> String {
    slot.replace('_', " ")
}

/// Replace any `[[ID::slot]]` still in `text` with the slot fallback.
fn replace_leftover_placeholders(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("[[") {
        let Some(len) = rest[start..].find("]]") else {
            break;
        };
        let inner = &rest[start + 2..start + len];
        let slot = inner.split_once("::").map(|(_, slot)| slot).unwrap_or(inner);
        out.push_str(&rest[..start]);
        out.push_str(&slot_fallback(slot));
        rest = &rest[start + len + 2..];
    }
    out.push_str(rest);
    out
}
