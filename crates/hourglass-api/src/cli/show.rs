//! `hourglass show <id>`: print a stored session and its turns.

use anyhow::Result;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use console::style;

use hourglass_core::notify::format_duration;
use hourglass_types::session::SessionId;
use hourglass_types::turn::TurnStatus;

use crate::state::AppState;

pub async fn show_session(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id: SessionId = id
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid session id: {id}"))?;
    let detail = state.engine.get_session(&id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let session = &detail.session;
    println!();
    println!(
        "  {} {} {}",
        style("⏳").bold(),
        style(&session.title).cyan().bold(),
        style(format!("[{}]", session.status)).dim()
    );
    println!(
        "  {} template, {} window, fallback co-host {}",
        session.template_length,
        format_duration(session.response_window_minutes * 60_000),
        if session.allow_fallback_cohost { "on" } else { "off" }
    );
    println!();

    let now = chrono::Utc::now();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Slot", "Assigned", "Status", "Due / Text"]);
    for turn in &detail.turns {
        let last = match turn.status {
            TurnStatus::Pending => {
                let remaining = (turn.deadline - now).num_milliseconds();
                if remaining > 0 {
                    format!("in {}", format_duration(remaining))
                } else {
                    "overdue".to_string()
                }
            }
            _ => turn.resolved_text.clone().unwrap_or_default(),
        };
        table.add_row(vec![
            turn.order_index.to_string(),
            turn.part_of_speech.clone(),
            turn.assigned_handle.clone().unwrap_or_default(),
            turn.status.to_string(),
            last,
        ]);
    }
    println!("{table}");
    println!();
    Ok(())
}
