use crate::markup::error::MarkupError;
use crate::markup::input::{DrawingEngine, RenderRequest};
use crate::markup::messages::{CloseOutcome, OpenOutcome, SessionEvent, TeardownOutcome};
use crate::markup::model::MediaAsset;
use crate::markup::render::{Renderer, Surface};
use crate::markup::session::{AnalysisSession, SessionStabilityController};
use crate::markup::settings::MarkupSettings;
use crate::markup::surface_map::{InitStatus, SurfaceInit, SurfaceMapper};
use crate::markup::tools::ToolController;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameReport {
    pub events: Vec<SessionEvent>,
    pub redrawn: bool,
}

/// Everything a host needs to put a markup surface on screen: session
/// ownership, surface initialization, input and rendering.
pub struct MarkupCanvas<S: Surface> {
    controller: SessionStabilityController,
    init: SurfaceInit,
    engine: DrawingEngine,
    renderer: Renderer,
    surface: S,
}

impl<S: Surface> MarkupCanvas<S> {
    pub fn new(settings: &MarkupSettings, surface: S) -> Self {
        Self {
            controller: SessionStabilityController::new(
                settings.session_config(),
                settings.tool_controller(),
            ),
            init: SurfaceInit::new(settings.backoff_schedule()),
            engine: DrawingEngine::new(settings.degenerate_policy),
            renderer: settings.renderer(),
            surface,
        }
    }

    pub fn controller(&self) -> &SessionStabilityController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SessionStabilityController {
        &mut self.controller
    }

    pub fn session(&self) -> Option<&AnalysisSession> {
        self.controller.session()
    }

    pub fn session_mut(&mut self) -> Option<&mut AnalysisSession> {
        self.controller.session_mut()
    }

    pub fn tools_mut(&mut self) -> Option<&mut ToolController> {
        self.controller.session_mut().map(AnalysisSession::tools_mut)
    }

    pub fn engine(&self) -> &DrawingEngine {
        &self.engine
    }

    pub fn mapper(&self) -> Option<&SurfaceMapper> {
        self.init.mapper()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn is_drawing_enabled(&self) -> bool {
        self.init.mapper().is_some() && self.controller.lifecycle().is_open()
    }

    pub fn open(&mut self, asset: MediaAsset, now: Instant) -> Result<OpenOutcome, MarkupError> {
        let outcome = self.controller.open(asset, now)?;
        if outcome == OpenOutcome::Opened {
            self.init.reset();
            self.engine.cancel();
        }
        self.poll_surface(now);
        Ok(outcome)
    }

    /// The asset finished loading with its native resolution.
    pub fn asset_loaded(&mut self, width: u32, height: u32, now: Instant) -> bool {
        let Some(session) = self.controller.session_mut() else {
            return false;
        };
        session.media_asset_mut().mark_loaded(width, height);
        self.init.retry_now();
        self.poll_surface(now)
    }

    /// The asset's rendered box changed size.
    pub fn resize(&mut self, display_width: f64, display_height: f64) -> Result<(), MarkupError> {
        let session = self
            .controller
            .session_mut()
            .ok_or(MarkupError::NoActiveSession)?;
        if let Some(mapper) = self.init.mapper_mut() {
            mapper.resize(display_width, display_height)?;
        }
        let asset = session.media_asset_mut();
        asset.display_width = display_width;
        asset.display_height = display_height;
        Ok(())
    }

    /// Per-frame driver: reopen after forced teardown, fire timers and keep
    /// retrying surface initialization.
    pub fn frame(&mut self, now: Instant) -> FrameReport {
        let mut report = FrameReport::default();
        if let Some(event) = self.controller.render_tick(now) {
            report.events.push(event);
            report.redrawn = true;
        }
        report.events.extend(self.controller.tick(now));
        if self.init.mapper().is_none() && self.poll_surface(now) {
            report.redrawn = true;
        }
        if report.redrawn && self.init.mapper().is_some() {
            self.redraw();
        }
        report
    }

    pub fn pointer_down(&mut self, display_x: f64, display_y: f64, now: Instant) -> RenderRequest {
        let Some(mapper) = self.init.mapper() else {
            tracing::debug!("pointer down ignored; surface not ready");
            return RenderRequest::Nothing;
        };
        self.controller.note_interaction(now);
        let Some(session) = self.controller.session_mut() else {
            return RenderRequest::Nothing;
        };
        let (tools, store) = session.drawing_parts();
        let state = tools.state();
        let request = self.engine.pointer_down(display_x, display_y, &state, mapper, store);
        self.renderer.apply(&mut self.surface, &request, store.annotations());
        request
    }

    pub fn pointer_move(&mut self, display_x: f64, display_y: f64, now: Instant) -> RenderRequest {
        let Some(mapper) = self.init.mapper() else {
            return RenderRequest::Nothing;
        };
        if self.engine.preview().is_none() {
            return RenderRequest::Nothing;
        }
        self.controller.note_interaction(now);
        let Some(session) = self.controller.session() else {
            return RenderRequest::Nothing;
        };
        let request = self.engine.pointer_move(display_x, display_y, mapper);
        self.renderer.apply(&mut self.surface, &request, session.store().annotations());
        request
    }

    pub fn pointer_up(&mut self, display_x: f64, display_y: f64, now: Instant) -> RenderRequest {
        let Some(mapper) = self.init.mapper() else {
            return RenderRequest::Nothing;
        };
        self.controller.note_interaction(now);
        let Some(session) = self.controller.session_mut() else {
            return RenderRequest::Nothing;
        };
        let store = session.store_mut();
        let request = self.engine.pointer_up(display_x, display_y, mapper, store);
        self.renderer.apply(&mut self.surface, &request, store.annotations());
        request
    }

    pub fn commit_text(&mut self, text: &str, now: Instant) -> RenderRequest {
        self.controller.note_interaction(now);
        let Some(session) = self.controller.session_mut() else {
            return RenderRequest::Nothing;
        };
        let store = session.store_mut();
        let request = self.engine.commit_text(text, store);
        self.renderer.apply(&mut self.surface, &request, store.annotations());
        request
    }

    pub fn cancel_text(&mut self) {
        self.engine.cancel_text();
    }

    /// Drop the in-progress gesture, e.g. on Escape.
    pub fn cancel(&mut self) {
        if self.engine.cancel() == RenderRequest::Full {
            self.redraw();
        }
    }

    pub fn clear_all(&mut self, now: Instant) {
        self.controller.note_interaction(now);
        let Some(session) = self.controller.session_mut() else {
            return;
        };
        session.clear_all();
        self.engine.cancel();
        tracing::info!(asset_id = %session.media_asset().id, "annotations cleared");
        self.redraw();
    }

    pub fn close(&mut self, now: Instant, confirmed: bool) -> CloseOutcome {
        let outcome = self.controller.close(now, confirmed);
        if outcome == CloseOutcome::Closed {
            self.engine.cancel();
            self.init.reset();
        }
        outcome
    }

    /// The host removed the surface without going through `close`.
    /// Uncommitted gestures are lost; committed work is held.
    pub fn external_teardown(&mut self) -> TeardownOutcome {
        self.engine.cancel();
        self.controller.external_teardown()
    }

    /// Full redraw of the base, committed annotations and any live preview.
    pub fn redraw(&mut self) {
        let annotations = self
            .controller
            .session()
            .map(|session| session.store().annotations())
            .unwrap_or_default();
        self.renderer.redraw_with_preview(&mut self.surface, annotations, self.engine.preview());
    }

    fn poll_surface(&mut self, now: Instant) -> bool {
        let Some(session) = self.controller.session() else {
            return false;
        };
        match self.init.poll(session.media_asset(), now) {
            InitStatus::Ready(_) => true,
            InitStatus::Pending { .. } => false,
            InitStatus::Unsupported => {
                tracing::warn!(asset_id = %session.media_asset().id, "asset cannot be annotated");
                false
            }
        }
    }
}
