pub mod file;
pub mod source;

pub use file::FileCaptureSource;
pub use source::{rms_level, AudioFrame, CaptureSource, LevelMeter};
