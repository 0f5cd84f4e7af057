//! `hourglass simulate`: one session end to end against the in-memory
//! repository.
//!
//! Simulated players answer the first few turns; the remaining deadlines
//! fire and the fallback co-host fills them. Without `--wait` the deadlines
//! are fired immediately through the scheduler's expiry path.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use console::style;
use serde::Serialize;

use hourglass_core::HourglassEngine;
use hourglass_core::analytics::TracingAnalytics;
use hourglass_core::event::EventBus;
use hourglass_core::notify::NotificationDispatcher;
use hourglass_core::repository::InMemorySessionRepository;
use hourglass_core::schedule::ExpiryOutcome;
use hourglass_infra::config::secret_from_env;
use hourglass_infra::llm::create_fallback;
use hourglass_types::config::HourglassConfig;
use hourglass_types::session::{
    CompleteSessionRequest, ContactPoints, CreateSessionRequest, InvitationAction,
    ParticipantInput, ParticipantStatus, TemplateLength, VaultEntry,
};
use hourglass_types::turn::{Turn, TurnStatus};

const PLAYER_WORDS: &[&str] = &[
    "wobbly", "saxophone", "tiptoe", "lighthouse", "grumpily", "marmalade", "sparkle", "otter",
];

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub length: TemplateLength,
    pub genre: Option<String>,
    pub answered: usize,
    pub wait: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub turns: Vec<Turn>,
    pub vault: VaultEntry,
    pub realtime_events: usize,
}

impl SimulationReport {
    pub fn auto_filled(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.status == TurnStatus::AutoFilled)
            .count()
    }
}

/// Run the simulation and return what happened.
pub async fn run_simulation(
    options: &SimulateOptions,
    config: &HourglassConfig,
) -> Result<SimulationReport> {
    let bus = EventBus::new(config.realtime.bus_capacity);
    let mut events = bus.subscribe();

    let client = reqwest::Client::new();
    let engine = HourglassEngine::new(
        Arc::new(InMemorySessionRepository::new()),
        Arc::new(bus.clone()),
        NotificationDispatcher::new(&config.notify),
        create_fallback(
            &config.fallback,
            client,
            secret_from_env(&config.fallback.api_key_env),
        ),
        Arc::new(TracingAnalytics),
        &config.scheduler,
    );

    let mut request = CreateSessionRequest::new("sim-host");
    request.host_handle = Some("@host".to_string());
    request.genre = options.genre.clone();
    request.template_length = options.length;
    request.response_window_minutes = 1;
    request.participants = vec![
        ParticipantInput {
            user_id: "sim-player-1".to_string(),
            handle: Some("@ada".to_string()),
            contact: ContactPoints::default(),
        },
        ParticipantInput {
            user_id: "sim-player-2".to_string(),
            handle: Some("@kai".to_string()),
            contact: ContactPoints::default(),
        },
    ];

    let created = engine.create_session(request).await?;
    let session_id = created.session.id;
    for participant in &created.participants {
        if participant.status != ParticipantStatus::Accepted {
            engine
                .respond_to_invitation(&session_id, &participant.user_id, InvitationAction::Accept)
                .await?;
        }
    }
    engine.activate_session(&session_id).await?;
    let detail = engine.get_session(&session_id).await?;
    tracing::info!(%session_id, turns = detail.turns.len(), "simulation session started");

    let (answered, expiring) = detail
        .turns
        .split_at(options.answered.min(detail.turns.len()));

    for (turn, word) in answered.iter().zip(PLAYER_WORDS.iter().cycle()) {
        engine
            .submit_turn(&turn.id, word, turn.assigned_handle.clone())
            .await?;
    }

    if options.wait {
        let budget = Duration::from_secs(
            60 + config.fallback.timeout_secs + config.notify.channel_timeout_secs + 5,
        );
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let pending = engine.get_session(&session_id).await?.turns.iter().any(Turn::is_pending);
            if !pending {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("turns still pending after {}s", budget.as_secs());
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    } else {
        for turn in expiring {
            match engine.scheduler().expire_turn(&turn.id).await {
                ExpiryOutcome::AutoFilled(_) | ExpiryOutcome::Skipped => {}
                other => bail!("turn {} did not auto-fill: {other:?}", turn.id),
            }
        }
    }

    let vault = engine
        .complete_session(&session_id, CompleteSessionRequest::default())
        .await?;
    let turns = engine.get_session(&session_id).await?.turns;

    let mut realtime_events = 0;
    while events.try_recv().is_ok() {
        realtime_events += 1;
    }

    Ok(SimulationReport {
        turns,
        vault,
        realtime_events,
    })
}

/// `hourglass simulate`
pub async fn simulate(options: SimulateOptions, config: &HourglassConfig, json: bool) -> Result<()> {
    let report = run_simulation(&options, config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Slot", "Status", "By", "Text"]);
    for turn in &report.turns {
        table.add_row(vec![
            turn.order_index.to_string(),
            turn.part_of_speech.clone(),
            turn.status.to_string(),
            turn.resolved_handle.clone().unwrap_or_default(),
            turn.resolved_text.clone().unwrap_or_default(),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} {} ({} auto-filled, {} realtime events)",
        style("⏳").bold(),
        style(&report.vault.title).cyan().bold(),
        report.auto_filled(),
        report.realtime_events
    );
    println!();
    println!("  {}", report.vault.story_text);
    println!();
    Ok(())
}
