//! Tracing subscriber setup (stdout plus daily rolling file)

mod logger;

pub use logger::init_logger;
