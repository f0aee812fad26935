#![forbid(unsafe_code)]

mod aggregate;
mod cancel;
mod error;
mod gate;
mod histogram;
mod outcome;
mod report;
mod request;
mod run;
mod sender;
mod stats;
mod worker;

pub use aggregate::{Aggregator, StatsSender};
pub use cancel::CancellationFlag;
pub use error::{Error, Result};
pub use gate::RunGate;
pub use histogram::{DEFAULT_SIGFIG, HistogramConfig, LatencyHistogram, LatencySummary};
pub use outcome::{ErrorClass, ErrorKind, WorkOutcome, classify, estimate_header_bytes};
pub use report::{AggregateReport, ReportMetrics};
pub use request::{RequestBody, RequestTemplate, USER_AGENT, escape_query_values};
pub use run::{LoadPlan, run_load};
pub use sender::{OutboundRequest, RequestSender, ResponseHead, SendError, SendResult};
pub use stats::{ErrorTally, WorkerStats};
pub use worker::{WorkerContext, run_worker};
