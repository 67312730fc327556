pub mod canvas;
pub mod error;
pub mod input;
pub mod messages;
pub mod model;
pub mod persist;
pub mod raster;
pub mod render;
pub mod replay;
pub mod session;
pub mod settings;
pub mod settings_store;
pub mod state;
pub mod store;
pub mod surface_map;
pub mod tools;

pub use canvas::{FrameReport, MarkupCanvas};
pub use error::MarkupError;
pub use input::{DegeneratePolicy, DrawingEngine, RenderRequest};
pub use persist::{AnalysisRecord, AnalysisSink, DirectorySink, HttpSink, PersistenceGateway};
pub use session::{AnalysisSession, SessionStabilityController};
pub use settings::MarkupSettings;
