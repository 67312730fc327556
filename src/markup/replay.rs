//! Scripted sessions: a JSON list of host events replayed against a
//! [`MarkupCanvas`] on a virtual clock.

use crate::markup::canvas::MarkupCanvas;
use crate::markup::error::MarkupError;
use crate::markup::messages::CloseOutcome;
use crate::markup::model::{Color, MediaAsset, PixelSize};
use crate::markup::persist::{PersistenceGateway, SaveReport};
use crate::markup::render::Surface;
use crate::markup::tools::Tool;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayAsset {
    pub id: String,
    #[serde(default)]
    pub url: String,
    pub display_width: f64,
    pub display_height: f64,
    pub native_width: u32,
    pub native_height: u32,
}

impl ReplayAsset {
    pub fn native_size(&self) -> PixelSize {
        PixelSize {
            width: self.native_width,
            height: self.native_height,
        }
    }

    fn media_asset(&self) -> MediaAsset {
        MediaAsset::image(self.id.clone(), self.url.clone())
            .with_display_size(self.display_width, self.display_height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReplayEvent {
    Tool { tool: Tool },
    Color { color: Color },
    Palette { index: usize },
    Width { width: u32 },
    Down { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Up { x: f64, y: f64 },
    Text { text: String },
    CancelText,
    Cancel,
    Resize { width: f64, height: f64 },
    Wait { ms: u64 },
    ClearAll,
    Feedback {
        #[serde(default)]
        strengths: Option<String>,
        #[serde(default)]
        improvements: Option<String>,
        #[serde(default)]
        rating: Option<u8>,
    },
    Teardown,
    Close {
        #[serde(default)]
        confirmed: bool,
    },
    Save,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    pub asset: ReplayAsset,
    #[serde(default)]
    pub events: Vec<ReplayEvent>,
}

impl ReplayScript {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read replay script {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse replay script {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    pub events: usize,
    pub close_outcomes: Vec<CloseOutcome>,
    pub saves: Vec<SaveReport>,
    pub elapsed: Duration,
}

/// Replay `script` starting at `start`. `Wait` advances the clock; every
/// event is followed by a frame so timers and reopen run as in a live host.
pub fn run<S: Surface>(
    canvas: &mut MarkupCanvas<S>,
    script: &ReplayScript,
    gateway: Option<&PersistenceGateway>,
    start: Instant,
) -> Result<ReplaySummary, MarkupError> {
    run_with_export(canvas, script, gateway, start, |_| Ok(()))
}

/// Like [`run`], but hands the canvas to `export` before every `Save`,
/// while the annotations about to be persisted are still on it.
pub fn run_with_export<S, F>(
    canvas: &mut MarkupCanvas<S>,
    script: &ReplayScript,
    gateway: Option<&PersistenceGateway>,
    start: Instant,
    mut export: F,
) -> Result<ReplaySummary, MarkupError>
where
    S: Surface,
    F: FnMut(&mut MarkupCanvas<S>) -> Result<()>,
{
    let mut now = start;
    let mut summary = ReplaySummary::default();
    canvas.open(script.asset.media_asset(), now)?;
    canvas.asset_loaded(script.asset.native_width, script.asset.native_height, now);
    canvas.frame(now);

    for event in &script.events {
        match event {
            ReplayEvent::Tool { tool } => {
                if let Some(tools) = canvas.tools_mut() {
                    tools.set_tool(*tool);
                }
            }
            ReplayEvent::Color { color } => {
                if let Some(tools) = canvas.tools_mut() {
                    tools.set_color(*color);
                }
            }
            ReplayEvent::Palette { index } => {
                if let Some(tools) = canvas.tools_mut() {
                    tools.select_palette(*index);
                }
            }
            ReplayEvent::Width { width } => {
                if let Some(tools) = canvas.tools_mut() {
                    tools.set_stroke_width(*width);
                }
            }
            ReplayEvent::Down { x, y } => {
                canvas.pointer_down(*x, *y, now);
            }
            ReplayEvent::Move { x, y } => {
                canvas.pointer_move(*x, *y, now);
            }
            ReplayEvent::Up { x, y } => {
                canvas.pointer_up(*x, *y, now);
            }
            ReplayEvent::Text { text } => {
                canvas.commit_text(text, now);
            }
            ReplayEvent::CancelText => canvas.cancel_text(),
            ReplayEvent::Cancel => canvas.cancel(),
            ReplayEvent::Resize { width, height } => canvas.resize(*width, *height)?,
            ReplayEvent::Wait { ms } => now += Duration::from_millis(*ms),
            ReplayEvent::ClearAll => canvas.clear_all(now),
            ReplayEvent::Feedback {
                strengths,
                improvements,
                rating,
            } => {
                let session = canvas.session_mut().ok_or(MarkupError::NoActiveSession)?;
                if let Some(text) = strengths {
                    session.set_strengths(text.clone());
                }
                if let Some(text) = improvements {
                    session.set_improvements(text.clone());
                }
                if let Some(rating) = rating {
                    session.set_overall_rating(*rating)?;
                }
            }
            ReplayEvent::Teardown => {
                canvas.external_teardown();
            }
            ReplayEvent::Close { confirmed } => {
                summary.close_outcomes.push(canvas.close(now, *confirmed));
            }
            ReplayEvent::Save => {
                let gateway = gateway.ok_or_else(|| {
                    MarkupError::Persistence("no storage configured for replay".to_string())
                })?;
                export(canvas)
                    .map_err(|err| MarkupError::Persistence(format!("export frame: {err:#}")))?;
                summary
                    .saves
                    .push(gateway.try_save(canvas.controller_mut(), Utc::now())?);
            }
        }
        canvas.frame(now);
        summary.events += 1;
    }

    summary.elapsed = now.saturating_duration_since(start);
    tracing::debug!(events = summary.events, "replay finished");
    Ok(summary)
}
