//! saucejs runner core
//!
//! Submits JavaScript unit-test pages to Sauce Labs, polls each remote job
//! until it resolves, and interprets the framework's result payload:
//! - Expands the URL × browser matrix into concurrently running jobs
//! - Retries the whole batch when any job fails
//! - Brackets the run with an optional Sauce Connect tunnel
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  RunCoordinator                                             │
//! │    ├── TunnelManager::open(driver) -> TunnelHandle          │
//! │    ├── Orchestrate::run() -> RunVerdict                     │
//! │    └── TunnelManager::close(handle)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner (Orchestrate)                                   │
//! │    ├── run_batch(attempt): spawn one task per job           │
//! │    └── retry until passed or max_retries exhausted          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Job                                                        │
//! │    ├── start()      POST /{user}/js-tests                   │
//! │    ├── complete()   POST /{user}/js-tests/status (bounded)  │
//! │    └── get_result() -> interpret(framework, result)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SauceApi -> Transport (ReqwestTransport)                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod coordinator;
pub mod error;
pub mod interpreter;
pub mod job;
pub mod runner;
pub mod transport;
pub mod tunnel;

pub use api::{job_page_url, SauceApi};
pub use coordinator::RunCoordinator;
pub use error::{RunError, RunResult};
pub use interpreter::{interpret, interpret_named};
pub use job::{is_valid_job_id, Job, JobResult, JobState, JobStatus};
pub use runner::{
    unsupported_port, JobCompletionHook, JobReport, NegateVerdict, Orchestrate, RunVerdict, TestRunner,
};
pub use transport::{ApiRequest, Method, ReqwestTransport, Transport};
pub use tunnel::{
    ProcessTunnelConfig, ProcessTunnelDriver, TunnelDriver, TunnelHandle, TunnelManager, READY_MARKER,
};
