use crate::markup::error::MarkupError;
use crate::markup::model::{Annotation, AnnotationKind, Color, Feedback, Markup, Point, Shape};
use crate::markup::session::{AnalysisSession, SessionRevision, SessionStabilityController};
use crate::markup::tools::{MAX_STROKE_WIDTH, MIN_STROKE_WIDTH};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

/// One annotation as stored by the external API. Points are native pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAnnotation {
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub points: Vec<Point>,
    pub color: Color,
    pub stroke_width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl From<&Annotation> for WireAnnotation {
    fn from(annotation: &Annotation) -> Self {
        let shape = &annotation.markup.shape;
        Self {
            kind: shape.kind(),
            points: shape.points(),
            color: annotation.markup.color,
            stroke_width: annotation.markup.stroke_width,
            text: shape.text().map(str::to_string),
        }
    }
}

impl WireAnnotation {
    pub fn to_markup(&self) -> Result<Markup, MarkupError> {
        if !(MIN_STROKE_WIDTH..=MAX_STROKE_WIDTH).contains(&self.stroke_width) {
            return Err(MarkupError::InvalidAnnotation(format!(
                "stroke width {} outside {MIN_STROKE_WIDTH}..={MAX_STROKE_WIDTH}",
                self.stroke_width
            )));
        }
        Ok(Markup {
            shape: Shape::from_parts(self.kind, &self.points, self.text.as_deref())?,
            color: self.color,
            stroke_width: self.stroke_width,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub media_asset_id: String,
    pub annotations: Vec<WireAnnotation>,
    pub feedback: Feedback,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn from_session(session: &AnalysisSession, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            media_asset_id: session.media_asset().id.clone(),
            annotations: session.store().iter().map(WireAnnotation::from).collect(),
            feedback: session.feedback().clone(),
            analyzed_at,
        }
    }

    /// Decode and validate the annotations, in stored order.
    pub fn markups(&self) -> Result<Vec<Markup>, MarkupError> {
        self.annotations.iter().map(WireAnnotation::to_markup).collect()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(json).context("parse analysis record")?;
        record.markups()?;
        Ok(record)
    }
}

/// Receipt from the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub reference: String,
}

pub trait AnalysisSink: Send + Sync {
    fn submit(&self, record: &AnalysisRecord) -> Result<Ack>;
}

/// POSTs the record as JSON to an HTTP endpoint.
pub struct HttpSink {
    client: Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("courtside-markup")
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl AnalysisSink for HttpSink {
    fn submit(&self, record: &AnalysisRecord) -> Result<Ack> {
        let body = serde_json::to_vec(record).context("serialize analysis record")?;
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .with_context(|| format!("post analysis to {}", self.endpoint))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("http status {status}");
        }
        let text = resp.text().context("read storage response")?;
        let reference = match text.trim() {
            "" => status.to_string(),
            body => body.to_string(),
        };
        Ok(Ack { reference })
    }
}

/// Writes each record to a timestamped JSON file.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AnalysisSink for DirectorySink {
    fn submit(&self, record: &AnalysisRecord) -> Result<Ack> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create analysis folder {}", self.dir.display()))?;
        let stem = timestamped_stem(record.analyzed_at.with_timezone(&Local));
        let path = self
            .dir
            .join(build_filename(&stem, &record.media_asset_id, "json"));
        let json = serde_json::to_string_pretty(record).context("serialize analysis record")?;
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(Ack {
            reference: path.display().to_string(),
        })
    }
}

pub fn timestamped_stem(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// `<stem>_<asset>.<ext>`, with anything outside `[A-Za-z0-9_-]` in the
/// asset id replaced.
pub fn build_filename(stem: &str, asset_id: &str, ext: &str) -> String {
    let asset: String = asset_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}_{asset}.{ext}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub ack: Ack,
    /// False when the session changed while the save was in flight.
    pub session_reset: bool,
}

#[derive(Clone)]
pub struct PersistenceGateway {
    sink: Arc<dyn AnalysisSink>,
}

impl PersistenceGateway {
    pub fn new(sink: Arc<dyn AnalysisSink>) -> Self {
        Self { sink }
    }

    /// Save synchronously. On failure nothing local changes and the call can
    /// simply be repeated.
    pub fn try_save(
        &self,
        controller: &mut SessionStabilityController,
        analyzed_at: DateTime<Utc>,
    ) -> Result<SaveReport, MarkupError> {
        let (record, revision) = snapshot(controller, analyzed_at)?;
        match self.sink.submit(&record) {
            Ok(ack) => Ok(finish(controller, &record.media_asset_id, revision, ack)),
            Err(err) => Err(save_failed(&record, err)),
        }
    }

    /// Save on a worker thread. The session stays editable; poll the
    /// returned handle from the UI loop.
    pub fn spawn_save(
        &self,
        controller: &SessionStabilityController,
        analyzed_at: DateTime<Utc>,
    ) -> Result<PendingSave, MarkupError> {
        let (record, revision) = snapshot(controller, analyzed_at)?;
        let (tx, rx) = std::sync::mpsc::channel();
        let sink = Arc::clone(&self.sink);
        let worker_record = record.clone();
        std::thread::Builder::new()
            .name("analysis-save".to_string())
            .spawn(move || {
                let _ = tx.send(sink.submit(&worker_record));
            })
            .map_err(|err| MarkupError::Persistence(format!("spawn save worker: {err}")))?;
        Ok(PendingSave {
            rx,
            record,
            revision,
        })
    }
}

/// An in-flight background save.
pub struct PendingSave {
    rx: Receiver<Result<Ack>>,
    record: AnalysisRecord,
    revision: SessionRevision,
}

impl PendingSave {
    pub fn record(&self) -> &AnalysisRecord {
        &self.record
    }

    /// `None` while the worker is still running.
    pub fn poll(
        &self,
        controller: &mut SessionStabilityController,
    ) -> Option<Result<SaveReport, MarkupError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(self.complete(controller, result)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(MarkupError::Persistence(
                "save worker exited without a result".to_string(),
            ))),
        }
    }

    /// Block until the worker finishes.
    pub fn wait(
        self,
        controller: &mut SessionStabilityController,
    ) -> Result<SaveReport, MarkupError> {
        match self.rx.recv() {
            Ok(result) => self.complete(controller, result),
            Err(_) => Err(MarkupError::Persistence(
                "save worker exited without a result".to_string(),
            )),
        }
    }

    fn complete(
        &self,
        controller: &mut SessionStabilityController,
        result: Result<Ack>,
    ) -> Result<SaveReport, MarkupError> {
        match result {
            Ok(ack) => Ok(finish(
                controller,
                &self.record.media_asset_id,
                self.revision,
                ack,
            )),
            Err(err) => Err(save_failed(&self.record, err)),
        }
    }
}

fn snapshot(
    controller: &SessionStabilityController,
    analyzed_at: DateTime<Utc>,
) -> Result<(AnalysisRecord, SessionRevision), MarkupError> {
    let session = controller.session().ok_or(MarkupError::NoActiveSession)?;
    Ok((
        AnalysisRecord::from_session(session, analyzed_at),
        session.revision(),
    ))
}

fn finish(
    controller: &mut SessionStabilityController,
    asset_id: &str,
    revision: SessionRevision,
    ack: Ack,
) -> SaveReport {
    let same_asset = controller
        .session()
        .is_some_and(|session| session.media_asset().id == asset_id);
    let session_reset = same_asset && controller.finish_persisted(revision);
    tracing::info!(
        asset_id,
        reference = %ack.reference,
        session_reset,
        "analysis saved"
    );
    SaveReport { ack, session_reset }
}

fn save_failed(record: &AnalysisRecord, err: anyhow::Error) -> MarkupError {
    tracing::error!(
        asset_id = %record.media_asset_id,
        annotations = record.annotations.len(),
        error = %format!("{err:#}"),
        "saving analysis failed; local state kept"
    );
    MarkupError::Persistence(format!("{err:#}"))
}
