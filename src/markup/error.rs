use crate::markup::model::MediaKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarkupError {
    #[error("media asset {asset_id} has not finished loading")]
    AssetNotLoaded { asset_id: String },
    #[error("media asset {asset_id} is a {kind:?} and cannot be annotated")]
    NotDrawable { asset_id: String, kind: MediaKind },
    #[error("display size must be positive, got {width}x{height}")]
    InvalidDisplaySize { width: f64, height: f64 },
    #[error("annotation surface is not initialized yet")]
    SurfaceNotReady,
    #[error("no analysis session is open")]
    NoActiveSession,
    #[error("session for asset {active} is still held; cannot open {requested}")]
    SessionBusy { active: String, requested: String },
    #[error("overall rating must be between 0 and 5, got {0}")]
    InvalidRating(u8),
    #[error("invalid color '{0}', expected #RRGGBB or #RRGGBBAA")]
    InvalidColor(String),
    #[error("invalid annotation: {0}")]
    InvalidAnnotation(String),
    #[error("saving analysis failed: {0}")]
    Persistence(String),
}
