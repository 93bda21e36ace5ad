pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod sanitize;
pub mod scan;
pub mod storage;

pub use config::ShieldConfig;
pub use error::{IntakeShieldError, Result};
pub use events::{RequestContext, SecurityEvent, SecurityEventLog, Severity};
pub use pipeline::{InspectionPipeline, SanitizationResult, UploadVerdict};
pub use scan::{FileScanner, ScanResult, ThreatKind, UploadedFile};
