pub mod capture;
pub mod chrome;
pub mod extractor;

pub use capture::{CaptureBudget, CaptureSession, CapturedUrl};
pub use extractor::{Candidate, Confidence, Selection, UrlFilter};
