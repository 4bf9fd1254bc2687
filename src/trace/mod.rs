//! The `TRICOT` channel: trace records and where they are written
//!
//! Intercepted calls write one [`TraceRecord`] per successful exchange to the
//! file held by a [`TraceSink`], then publish the same line as an INFO event with
//! target `TRICOT` for any subscriber the host runs.

mod record;
mod sink;

pub use record::{epoch_seconds, TraceRecord, TRICOT_CHANNEL};
pub use sink::{
    close_log, current_log_path, default_log_path, global_sink, open_log, TraceSink,
    DEFAULT_LOG_DIR,
};
