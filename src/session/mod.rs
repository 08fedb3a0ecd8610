mod capture;
mod events;

pub use capture::CaptureSession;
pub use events::{CaptureEvent, Recorded};
