//! Analysis session ownership and the stability watchdog.
//!
//! [`SessionStabilityController`] is the only owner of the
//! [`AnalysisSession`]. Hosts borrow it for edits and ask the controller to
//! open, close or tear down; the controller decides whether work may be
//! dropped. Timers are plain deadlines checked in [`tick`], so cancelling
//! them is clearing an `Option`.
//!
//! [`tick`]: SessionStabilityController::tick

use crate::markup::error::MarkupError;
use crate::markup::messages::{CloseOutcome, OpenOutcome, SessionEvent, TeardownOutcome};
use crate::markup::model::{Feedback, MediaAsset, Rating};
use crate::markup::state::{can_transition, SessionLifecycle};
use crate::markup::store::AnnotationStore;
use crate::markup::tools::ToolController;
use std::time::{Duration, Instant};

pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub lock_duration: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lock_duration: DEFAULT_LOCK_DURATION,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Marks a point in a session's edit history. Two equal revisions mean the
/// same session with no annotation or feedback change in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionRevision {
    pub session: u64,
    pub annotations: u64,
    pub feedback: u64,
}

/// One coach's pass over one media asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSession {
    id: u64,
    media_asset: MediaAsset,
    store: AnnotationStore,
    tools: ToolController,
    feedback: Feedback,
    feedback_revision: u64,
}

impl AnalysisSession {
    pub fn new(id: u64, media_asset: MediaAsset, tools: ToolController) -> Self {
        Self {
            id,
            media_asset,
            store: AnnotationStore::default(),
            tools,
            feedback: Feedback::default(),
            feedback_revision: 0,
        }
    }

    /// Unique per controller; a reopened asset gets a new id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn media_asset(&self) -> &MediaAsset {
        &self.media_asset
    }

    /// Load completion and display resizes land here.
    pub fn media_asset_mut(&mut self) -> &mut MediaAsset {
        &mut self.media_asset
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AnnotationStore {
        &mut self.store
    }

    pub fn tools(&self) -> &ToolController {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolController {
        &mut self.tools
    }

    /// Split borrow for the drawing engine, which reads tools while it
    /// appends to the store.
    pub fn drawing_parts(&mut self) -> (&ToolController, &mut AnnotationStore) {
        (&self.tools, &mut self.store)
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn set_strengths(&mut self, text: impl Into<String>) {
        self.feedback.strengths = text.into();
        self.feedback_revision += 1;
    }

    pub fn set_improvements(&mut self, text: impl Into<String>) {
        self.feedback.improvements = text.into();
        self.feedback_revision += 1;
    }

    pub fn set_overall_rating(&mut self, rating: u8) -> Result<(), MarkupError> {
        self.feedback.overall_rating = Rating::new(rating)?;
        self.feedback_revision += 1;
        Ok(())
    }

    pub fn set_feedback(&mut self, feedback: Feedback) {
        self.feedback = feedback;
        self.feedback_revision += 1;
    }

    pub fn clear_all(&mut self) {
        self.store.clear();
    }

    pub fn revision(&self) -> SessionRevision {
        SessionRevision {
            session: self.id,
            annotations: self.store.revision(),
            feedback: self.feedback_revision,
        }
    }

    pub fn has_unsaved_work(&self) -> bool {
        !self.store.is_empty() || !self.feedback.is_empty()
    }
}

/// Lock, heartbeat and auto-reopen state for the single active session.
#[derive(Debug, Clone)]
pub struct SessionStabilityController {
    config: SessionConfig,
    tool_defaults: ToolController,
    lifecycle: SessionLifecycle,
    session: Option<AnalysisSession>,
    next_session_id: u64,
    pending_reopen: bool,
    lock_expires_at: Option<Instant>,
    last_interaction_at: Option<Instant>,
    next_heartbeat_at: Option<Instant>,
}

impl SessionStabilityController {
    pub fn new(config: SessionConfig, tool_defaults: ToolController) -> Self {
        Self {
            config,
            tool_defaults,
            lifecycle: SessionLifecycle::Inactive,
            session: None,
            next_session_id: 1,
            pending_reopen: false,
            lock_expires_at: None,
            last_interaction_at: None,
            next_heartbeat_at: None,
        }
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn lifecycle(&self) -> SessionLifecycle {
        self.lifecycle
    }

    pub fn session(&self) -> Option<&AnalysisSession> {
        self.session.as_ref()
    }

    /// Mutable access while the session is open. A held session waiting
    /// for reopen is not editable.
    pub fn session_mut(&mut self) -> Option<&mut AnalysisSession> {
        if !self.lifecycle.is_open() {
            return None;
        }
        self.session.as_mut()
    }

    /// A session stays persistent until the coach closes it or it is saved,
    /// so a forced teardown always holds it for reopen.
    pub fn is_persistent(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_pending_reopen(&self) -> bool {
        self.pending_reopen
    }

    pub fn lock_expires_at(&self) -> Option<Instant> {
        self.lock_expires_at
    }

    pub fn last_interaction_at(&self) -> Option<Instant> {
        self.last_interaction_at
    }

    /// Next heartbeat deadline; `None` once the session is inactive.
    pub fn next_heartbeat_at(&self) -> Option<Instant> {
        self.next_heartbeat_at
    }

    pub fn revision(&self) -> Option<SessionRevision> {
        self.session.as_ref().map(AnalysisSession::revision)
    }

    pub fn open(&mut self, asset: MediaAsset, now: Instant) -> Result<OpenOutcome, MarkupError> {
        if !asset.is_drawable() {
            return Err(MarkupError::NotDrawable {
                asset_id: asset.id,
                kind: asset.kind,
            });
        }

        if let Some(session) = &self.session {
            if session.media_asset().id != asset.id {
                return Err(MarkupError::SessionBusy {
                    active: session.media_asset().id.clone(),
                    requested: asset.id,
                });
            }
            if self.lifecycle.is_open() {
                self.note_interaction(now);
                return Ok(OpenOutcome::AlreadyOpen);
            }
            self.activate(now);
            tracing::info!(asset_id = %asset.id, "analysis session restored on open");
            return Ok(OpenOutcome::Restored);
        }

        let id = self.next_session_id;
        self.next_session_id += 1;
        tracing::info!(asset_id = %asset.id, session = id, "analysis session opened");
        self.session = Some(AnalysisSession::new(id, asset, self.tool_defaults.clone()));
        self.activate(now);
        Ok(OpenOutcome::Opened)
    }

    /// Request a close. Refused while locked, including while a torn-down
    /// session waits for reopen; otherwise needs `confirmed`.
    pub fn close(&mut self, now: Instant, confirmed: bool) -> CloseOutcome {
        if self.session.is_none() {
            return CloseOutcome::NotOpen;
        }
        self.release_lock_if_expired(now);

        // An unexpired deadline means the lock still holds.
        if let Some(expires_at) = self.lock_expires_at {
            let remaining = expires_at.saturating_duration_since(now);
            tracing::warn!(
                asset_id = self.asset_id(),
                remaining_ms = remaining.as_millis() as u64,
                "close rejected while session is locked"
            );
            return CloseOutcome::RejectedLocked { remaining };
        }
        if !confirmed {
            return CloseOutcome::NeedsConfirmation;
        }

        tracing::info!(
            asset_id = self.asset_id(),
            annotations = self.session.as_ref().map_or(0, |s| s.store().len()),
            "analysis session closed by coach"
        );
        self.teardown();
        CloseOutcome::Closed
    }

    /// Fire due timers: lock expiry and heartbeat.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.release_lock_if_expired(now) {
            events.push(SessionEvent::LockReleased);
        }

        if let Some(due) = self.next_heartbeat_at {
            if self.lifecycle.is_open() && now >= due {
                self.last_interaction_at = Some(now);
                let mut next = due;
                while next <= now {
                    next += self.config.heartbeat_interval.max(Duration::from_millis(1));
                }
                self.next_heartbeat_at = Some(next);
                tracing::trace!("session heartbeat");
                events.push(SessionEvent::Heartbeat);
            }
        }
        events
    }

    pub fn note_interaction(&mut self, now: Instant) {
        if self.lifecycle.is_open() {
            self.last_interaction_at = Some(now);
        }
    }

    /// The host tore the surface down without asking. The heartbeat stops at
    /// once; the session and its lock deadline are held until reopen.
    pub fn external_teardown(&mut self) -> TeardownOutcome {
        if !self.lifecycle.is_open() {
            return TeardownOutcome::NotOpen;
        }
        self.transition(SessionLifecycle::Inactive);
        self.next_heartbeat_at = None;

        let annotations = self.session.as_ref().map_or(0, |s| s.store().len());
        self.pending_reopen = true;
        tracing::warn!(
            asset_id = self.asset_id(),
            annotations,
            "forced teardown; session held for reopen"
        );
        TeardownOutcome::HeldForReopen { annotations }
    }

    /// Called once per rendered frame. Reopens a session that was torn down
    /// from outside while still persistent.
    pub fn render_tick(&mut self, now: Instant) -> Option<SessionEvent> {
        if !self.pending_reopen || self.lifecycle.is_open() {
            return None;
        }
        let annotations = self.session.as_ref()?.store().len();
        self.activate(now);
        tracing::info!(annotations, "analysis session reopened after forced teardown");
        Some(SessionEvent::Reopened { annotations })
    }

    /// Reset after a successful save, unless the session moved on since the
    /// saved snapshot. Returns whether the session was reset.
    pub fn finish_persisted(&mut self, saved: SessionRevision) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if session.id() != saved.session {
            tracing::info!(
                saved = saved.session,
                current = session.id(),
                "save acknowledged for an earlier session; keeping current work"
            );
            return false;
        }
        if session.revision() != saved {
            tracing::info!("session edited during save; keeping newer work");
            return false;
        }
        tracing::info!(asset_id = self.asset_id(), "analysis session persisted");
        self.teardown();
        true
    }

    fn asset_id(&self) -> &str {
        self.session
            .as_ref()
            .map_or("", |session| session.media_asset().id.as_str())
    }

    fn activate(&mut self, now: Instant) {
        self.transition(SessionLifecycle::Active);
        self.last_interaction_at = Some(now);
        self.transition(SessionLifecycle::Locked);
        self.lock_expires_at = Some(now + self.config.lock_duration);
        self.next_heartbeat_at = Some(now + self.config.heartbeat_interval);
        self.pending_reopen = false;
    }

    fn release_lock_if_expired(&mut self, now: Instant) -> bool {
        let expired = self.lock_expires_at.is_some_and(|expires_at| now >= expires_at);
        if !expired {
            return false;
        }
        self.lock_expires_at = None;
        if self.lifecycle == SessionLifecycle::Locked {
            self.transition(SessionLifecycle::Active);
            return true;
        }
        false
    }

    fn teardown(&mut self) {
        if self.lifecycle.is_open() {
            self.transition(SessionLifecycle::Inactive);
        }
        self.cancel_timers();
        self.session = None;
        self.pending_reopen = false;
        self.last_interaction_at = None;
    }

    fn cancel_timers(&mut self) {
        self.lock_expires_at = None;
        self.next_heartbeat_at = None;
    }

    fn transition(&mut self, next: SessionLifecycle) {
        if !can_transition(self.lifecycle, next) {
            tracing::error!(from = ?self.lifecycle, to = ?next, "invalid session transition");
            return;
        }
        tracing::debug!(from = ?self.lifecycle, to = ?next, "session transition");
        self.lifecycle = next;
    }
}

impl Default for SessionStabilityController {
    fn default() -> Self {
        Self::new(SessionConfig::default(), ToolController::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::model::{Color, Markup, Point, Shape};

    fn asset(id: &str) -> MediaAsset {
        MediaAsset::image(id, format!("https://cdn/{id}.png"))
    }

    fn line() -> Markup {
        Markup {
            shape: Shape::Line {
                start: Point::new(0.0, 0.0),
                end: Point::new(4.0, 4.0),
            },
            color: Color::RED,
            stroke_width: 2,
        }
    }

    #[test]
    fn open_activates_then_locks() {
        let mut ctl = SessionStabilityController::default();
        let t0 = Instant::now();
        assert_eq!(ctl.open(asset("a"), t0), Ok(OpenOutcome::Opened));
        assert_eq!(ctl.lifecycle(), SessionLifecycle::Locked);
        assert_eq!(ctl.lock_expires_at(), Some(t0 + Duration::from_secs(10)));
        assert_eq!(ctl.last_interaction_at(), Some(t0));
        assert!(ctl.is_persistent());
    }

    #[test]
    fn lock_expiry_moves_back_to_active() {
        let mut ctl = SessionStabilityController::default();
        let t0 = Instant::now();
        ctl.open(asset("a"), t0).expect("open");

        assert!(ctl.tick(t0 + Duration::from_secs(9)).is_empty());
        let events = ctl.tick(t0 + Duration::from_secs(10));
        assert!(events.contains(&SessionEvent::LockReleased));
        assert_eq!(ctl.lifecycle(), SessionLifecycle::Active);
    }

    #[test]
    fn close_requires_expired_lock_and_confirmation() {
        let mut ctl = SessionStabilityController::default();
        let t0 = Instant::now();
        ctl.open(asset("a"), t0).expect("open");

        assert_eq!(
            ctl.close(t0 + Duration::from_secs(4), true),
            CloseOutcome::RejectedLocked {
                remaining: Duration::from_secs(6)
            }
        );
        let unlocked = t0 + Duration::from_secs(10);
        assert_eq!(ctl.close(unlocked, false), CloseOutcome::NeedsConfirmation);
        assert!(ctl.session().is_some());
        assert_eq!(ctl.close(unlocked, true), CloseOutcome::Closed);
        assert!(ctl.session().is_none());
        assert_eq!(ctl.next_heartbeat_at(), None);
        assert_eq!(ctl.close(unlocked, true), CloseOutcome::NotOpen);
    }

    #[test]
    fn heartbeat_refreshes_interaction_and_stops_on_teardown() {
        let config = SessionConfig {
            lock_duration: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(5),
        };
        let mut ctl = SessionStabilityController::new(config, ToolController::default());
        let t0 = Instant::now();
        ctl.open(asset("a"), t0).expect("open");

        let t1 = t0 + Duration::from_secs(5);
        assert!(ctl.tick(t1).contains(&SessionEvent::Heartbeat));
        assert_eq!(ctl.last_interaction_at(), Some(t1));
        assert_eq!(ctl.next_heartbeat_at(), Some(t0 + Duration::from_secs(10)));

        ctl.external_teardown();
        assert_eq!(ctl.next_heartbeat_at(), None);
        assert!(ctl.tick(t0 + Duration::from_secs(30)).is_empty());
    }

    #[test]
    fn forced_teardown_holds_work_and_render_tick_reopens() {
        let mut ctl = SessionStabilityController::default();
        let t0 = Instant::now();
        ctl.open(asset("a"), t0).expect("open");
        let session = ctl.session_mut().expect("session");
        for _ in 0..3 {
            session.store_mut().commit(line());
        }
        session.set_strengths("Good base");

        assert_eq!(
            ctl.external_teardown(),
            TeardownOutcome::HeldForReopen { annotations: 3 }
        );
        assert_eq!(ctl.lifecycle(), SessionLifecycle::Inactive);
        assert!(ctl.session_mut().is_none());

        let t1 = t0 + Duration::from_millis(16);
        assert_eq!(
            ctl.render_tick(t1),
            Some(SessionEvent::Reopened { annotations: 3 })
        );
        assert_eq!(ctl.lifecycle(), SessionLifecycle::Locked);
        let session = ctl.session().expect("session");
        assert_eq!(session.store().len(), 3);
        assert_eq!(session.feedback().strengths, "Good base");
        assert_eq!(ctl.render_tick(t1), None);
    }

    #[test]
    fn held_session_keeps_its_lock_until_the_deadline() {
        let mut ctl = SessionStabilityController::default();
        let t0 = Instant::now();
        ctl.open(asset("a"), t0).expect("open");
        ctl.session_mut().expect("session").store_mut().commit(line());
        ctl.external_teardown();

        assert_eq!(
            ctl.close(t0 + Duration::from_secs(1), true),
            CloseOutcome::RejectedLocked {
                remaining: Duration::from_secs(9)
            }
        );
        assert!(ctl.is_pending_reopen());
        assert_eq!(ctl.session().expect("session").store().len(), 1);

        assert!(ctl.tick(t0 + Duration::from_secs(10)).is_empty());
        assert_eq!(
            ctl.close(t0 + Duration::from_secs(10), false),
            CloseOutcome::NeedsConfirmation
        );
        assert!(ctl.session().is_some());
    }

    #[test]
    fn reopened_asset_gets_a_new_session_id() {
        let mut ctl = SessionStabilityController::default();
        let t0 = Instant::now();
        ctl.open(asset("a"), t0).expect("open");
        ctl.session_mut().expect("session").store_mut().commit(line());
        let first = ctl.revision().expect("revision");

        let unlocked = t0 + Duration::from_secs(10);
        assert_eq!(ctl.close(unlocked, true), CloseOutcome::Closed);
        ctl.open(asset("a"), unlocked).expect("reopen");
        ctl.session_mut().expect("session").store_mut().commit(line());

        let second = ctl.revision().expect("revision");
        assert_ne!(first.session, second.session);
        assert_eq!(
            (first.annotations, first.feedback),
            (second.annotations, second.feedback)
        );
        assert!(!ctl.finish_persisted(first));
        assert_eq!(ctl.session().expect("session").store().len(), 1);
    }

    #[test]
    fn opening_another_asset_while_held_is_refused() {
        let mut ctl = SessionStabilityController::default();
        let t0 = Instant::now();
        ctl.open(asset("a"), t0).expect("open");
        assert_eq!(ctl.open(asset("a"), t0), Ok(OpenOutcome::AlreadyOpen));
        assert_eq!(
            ctl.open(asset("b"), t0),
            Err(MarkupError::SessionBusy {
                active: "a".to_string(),
                requested: "b".to_string()
            })
        );

        ctl.external_teardown();
        assert!(ctl.open(asset("b"), t0).is_err());
        assert_eq!(ctl.open(asset("a"), t0), Ok(OpenOutcome::Restored));
    }

    #[test]
    fn video_assets_cannot_open_a_session() {
        let mut ctl = SessionStabilityController::default();
        let mut video = asset("clip");
        video.kind = crate::markup::model::MediaKind::Video;
        assert!(matches!(
            ctl.open(video, Instant::now()),
            Err(MarkupError::NotDrawable { .. })
        ));
        assert_eq!(ctl.lifecycle(), SessionLifecycle::Inactive);
    }

    #[test]
    fn finish_persisted_keeps_work_edited_after_snapshot() {
        let mut ctl = SessionStabilityController::default();
        let t0 = Instant::now();
        ctl.open(asset("a"), t0).expect("open");
        ctl.session_mut().expect("session").store_mut().commit(line());
        let saved = ctl.revision().expect("revision");

        ctl.session_mut()
            .expect("session")
            .set_overall_rating(4)
            .expect("rating");
        assert!(!ctl.finish_persisted(saved));
        assert!(ctl.session().is_some());

        let saved = ctl.revision().expect("revision");
        assert!(ctl.finish_persisted(saved));
        assert!(ctl.session().is_none());
        assert_eq!(ctl.lifecycle(), SessionLifecycle::Inactive);
        assert!(!ctl.is_persistent());
    }
}
