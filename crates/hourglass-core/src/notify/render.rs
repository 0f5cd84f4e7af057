//! Pure template rendering for turn notifications.
//!
//! One function per (channel, kind) pair, all driven by a [`TurnContext`].
//! Nothing here performs I/O or reads the clock: `now` travels in the
//! context so output is deterministic.

use chrono::{DateTime, Utc};

use hourglass_types::notify::{
    AllowedMentions, ChannelKind, ChatEmbed, ChatPayload, EmailMessage, EmbedFooter,
    NotificationKind, RenderedMessage, SmsMessage,
};
use hourglass_types::session::SessionId;
use hourglass_types::turn::TurnId;

const PROMPT_COLOR: u32 = 0x5eead4;
const WARNING_COLOR: u32 = 0xf97316;
const AUTOFILL_COLOR: u32 = 0xa855f7;
const OVERRIDE_COLOR: u32 = 0xfbbf24;

/// Everything a template needs to describe one turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: SessionId,
    pub turn_id: TurnId,
    pub brand: String,
    pub story_title: String,
    pub prompt: String,
    pub recipient_handle: Option<String>,
    pub deadline: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub turn_url: Option<String>,
    /// Text the fallback filled in. Only meaningful for timeouts.
    pub fill_text: Option<String>,
}

impl TurnContext {
    /// Milliseconds until the deadline, clamped at zero.
    pub fn remaining_ms(&self) -> i64 {
        (self.deadline - self.now).num_milliseconds().max(0)
    }

    /// Milliseconds since the deadline, clamped at zero.
    pub fn elapsed_ms(&self) -> i64 {
        (self.now - self.deadline).num_milliseconds().max(0)
    }
}

/// Human-readable duration: `"{h}h {m}m"`, `"{m}m {s}s"` or `"{s}s"`.
///
/// Rounds to the nearest second; negative input renders as `"0s"`.
pub fn format_duration(ms: i64) -> String {
    let total_seconds = ((ms.max(0) as f64) / 1000.0).round() as i64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Deadline label such as `"Oct 18, 3:04 PM UTC"`.
pub fn format_due_label(deadline: DateTime<Utc>) -> String {
    deadline.format("%b %-d, %-I:%M %p UTC").to_string()
}

/// Deep link to a turn, or `None` when no base URL is configured.
pub fn turn_url(app_base_url: Option<&str>, turn_id: &TurnId) -> Option<String> {
    let base = app_base_url?.trim();
    if base.is_empty() {
        return None;
    }
    Some(format!("{}/turn/{turn_id}", base.trim_end_matches('/')))
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Render `kind` for a single channel.
pub fn render(kind: NotificationKind, channel: ChannelKind, ctx: &TurnContext) -> RenderedMessage {
    match channel {
        ChannelKind::ChatWebhook => RenderedMessage::ChatWebhook(render_chat(kind, ctx)),
        ChannelKind::Email => RenderedMessage::Email(render_email(kind, ctx)),
        ChannelKind::Sms => RenderedMessage::Sms(render_sms(kind, ctx)),
    }
}

pub fn render_chat(kind: NotificationKind, ctx: &TurnContext) -> ChatPayload {
    match kind {
        NotificationKind::Prompt => {
            let countdown = format_duration(ctx.remaining_ms());
            let handle = ctx.recipient_handle.as_deref().unwrap_or("Crew");
            let link = ctx
                .turn_url
                .as_ref()
                .map(|url| format!("\n[Open turn]({url})"))
                .unwrap_or_default();
            ChatPayload {
                content: format!("⏳ **{countdown}** left · {handle}, it's your turn!"),
                embeds: vec![ChatEmbed {
                    title: ctx.story_title.clone(),
                    description: format!(
                        "{}\n\nRespond before **{}**{link}\nAI fills the blank if the hourglass empties.",
                        ctx.prompt,
                        format_due_label(ctx.deadline),
                    ),
                    color: PROMPT_COLOR,
                    footer: None,
                }],
                allowed_mentions: AllowedMentions::default(),
            }
        }
        NotificationKind::Warning => {
            let countdown = format_duration(ctx.remaining_ms());
            let link = ctx
                .turn_url
                .as_ref()
                .map(|url| format!("\n[Finish turn]({url})"))
                .unwrap_or_default();
            ChatPayload {
                content: format!("⚠️ **{countdown}** left!"),
                embeds: vec![ChatEmbed {
                    title: ctx.story_title.clone(),
                    description: format!("{}\n⏳ {countdown} remaining{link}", ctx.prompt),
                    color: WARNING_COLOR,
                    footer: None,
                }],
                allowed_mentions: AllowedMentions::default(),
            }
        }
        NotificationKind::Timeout => {
            let (description, color) = match &ctx.fill_text {
                Some(fill) => (
                    format!("AI co-host filled the blank with:\n> {fill}"),
                    AUTOFILL_COLOR,
                ),
                None => (
                    "Host override needed to keep the story moving.".to_string(),
                    OVERRIDE_COLOR,
                ),
            };
            ChatPayload {
                content: format!("⌛ Hourglass expired for **{}**", ctx.story_title),
                embeds: vec![ChatEmbed {
                    title: ctx.prompt.clone(),
                    description,
                    color,
                    footer: Some(EmbedFooter {
                        text: format!(
                            "Elapsed since expiry: {}",
                            format_duration(ctx.elapsed_ms())
                        ),
                    }),
                }],
                allowed_mentions: AllowedMentions::default(),
            }
        }
    }
}

pub fn render_email(kind: NotificationKind, ctx: &TurnContext) -> EmailMessage {
    let brand = &ctx.brand;
    let title = escape_html(&ctx.story_title);
    let prompt = escape_html(&ctx.prompt);

    match kind {
        NotificationKind::Prompt => {
            let countdown = format_duration(ctx.remaining_ms());
            let due = format_due_label(ctx.deadline);
            let cta = ctx
                .turn_url
                .as_deref()
                .map(|url| cta_button(url, "Open live turn"))
                .unwrap_or_default();
            EmailMessage {
                subject: format!("{brand} – {countdown} left ({})", ctx.story_title),
                html: format!(
                    r#"<div style="font-family:Inter,system-ui;background:#020617;padding:24px;color:#e2e8f0;">
  <div style="max-width:520px;margin:0 auto;border:1px solid rgba(94,234,212,0.35);border-radius:16px;padding:24px;">
    <p style="letter-spacing:0.35em;text-transform:uppercase;color:#64748b;font-size:11px;margin:0 0 12px;">{brand_html} Turn</p>
    <h1 style="margin:0 0 12px;font-size:24px;color:#f8fafc;">{title}</h1>
    <p style="margin:0 0 20px;font-size:15px;">{prompt}</p>
    <p style="margin:0;font-size:14px;">⏳ <strong>{countdown}</strong> remaining</p>
    <p style="margin:8px 0 24px;font-size:13px;color:#94a3b8;">Hourglass empties at <strong>{due}</strong>.</p>
    {cta}
  </div>
</div>"#,
                    brand_html = escape_html(brand),
                ),
            }
        }
        NotificationKind::Warning => {
            let countdown = format_duration(ctx.remaining_ms());
            let cta = ctx
                .turn_url
                .as_deref()
                .map(|url| cta_button(url, "Finish turn"))
                .unwrap_or_default();
            EmailMessage {
                subject: format!("{brand} – {countdown} left"),
                html: format!(
                    r#"<div style="font-family:Inter,system-ui;background:#020617;padding:24px;color:#e2e8f0;">
  <div style="max-width:520px;margin:0 auto;border:1px solid rgba(248,113,113,0.45);border-radius:16px;padding:24px;">
    <h1 style="margin:0 0 12px;font-size:22px;color:#fee2e2;">Almost out of time!</h1>
    <p style="margin:0 0 8px;font-size:13px;color:#94a3b8;">{title}</p>
    <p style="margin:0 0 16px;font-size:15px;">{prompt}</p>
    <p style="margin:0 0 24px;font-size:14px;">⏳ <strong>{countdown}</strong> left.</p>
    {cta}
  </div>
</div>"#
                ),
            }
        }
        NotificationKind::Timeout => {
            let fill = match &ctx.fill_text {
                Some(fill) => format!(
                    r#"<p style="margin:0 0 16px;font-size:14px;">AI co-host filled the blank with:</p><blockquote style="margin:0 0 16px;font-size:16px;">{}</blockquote>"#,
                    escape_html(fill)
                ),
                None => r#"<p style="margin:0 0 16px;font-size:14px;">Host override needed to resume the story.</p>"#
                    .to_string(),
            };
            let subject = if ctx.fill_text.is_some() {
                format!("{brand} turn auto-filled")
            } else {
                format!("{brand} turn needs a host override")
            };
            EmailMessage {
                subject,
                html: format!(
                    r#"<div style="font-family:Inter,system-ui;background:#020617;padding:24px;color:#e2e8f0;">
  <div style="max-width:520px;margin:0 auto;border:1px solid rgba(217,70,239,0.45);border-radius:16px;padding:24px;">
    <h1 style="margin:0 0 12px;font-size:22px;color:#f5d0fe;">Hourglass expired</h1>
    <p style="margin:0 0 8px;font-size:13px;color:#94a3b8;">{title}</p>
    <p style="margin:0 0 16px;font-size:15px;">{prompt}</p>
    {fill}
    <p style="margin:0 0 24px;font-size:13px;color:#cbd5f5;">Elapsed since expiry: {elapsed}</p>
  </div>
</div>"#,
                    elapsed = format_duration(ctx.elapsed_ms()),
                ),
            }
        }
    }
}

pub fn render_sms(kind: NotificationKind, ctx: &TurnContext) -> SmsMessage {
    let brand = &ctx.brand;
    let link = ctx
        .turn_url
        .as_ref()
        .map(|url| format!(" → {url}"))
        .unwrap_or_default();

    let body = match kind {
        NotificationKind::Prompt => format!(
            "{brand}: {} ({} left){link}",
            ctx.prompt,
            format_duration(ctx.remaining_ms())
        ),
        NotificationKind::Warning => format!(
            "{brand}: {} left! {}{link}",
            format_duration(ctx.remaining_ms()),
            ctx.prompt
        ),
        NotificationKind::Timeout => match &ctx.fill_text {
            Some(fill) => format!("{brand}: timer expired. AI filled with \"{fill}\"."),
            None => format!("{brand}: timer expired. Host override needed."),
        },
    };
    SmsMessage { body }
}

fn cta_button(url: &str, label: &str) -> String {
    format!(
        r#"<a href="{}" style="display:inline-block;padding:12px 24px;background:#5eead4;color:#020617;text-decoration:none;border-radius:9999px;font-weight:600;">{label} →</a>"#,
        escape_html(url)
    )
}
