//! Humanize services
//!
//! Leaf to root: quota admission, detection scoring, rewriting, usage
//! recording, stream framing, and the pipeline that sequences them.

pub mod detector;
pub mod framer;
pub mod pipeline;
pub mod quota;
pub mod recorder;
pub mod rewriter;

pub use detector::DetectionScorer;
pub use framer::{Frame, Framer, FramerError, FramerState};
pub use pipeline::{new_request_id, HumanizeJob, Pipeline, RewriteResult};
pub use quota::{Admission, AdmissionError, QuotaError, QuotaService, TierResolution, TierSource};
pub use recorder::{AttemptRecord, FailureSurface, UsageRecorder};
pub use rewriter::{Rewriter, Strength};
