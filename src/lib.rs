//! jobctl - lifecycle manager for remote compute jobs
//!
//! Creates, reads, updates and deletes jobs on a remote jobs service and,
//! for always-running jobs, restarts them so that exactly one run is active.
//! Each operation speaks the legacy or the multi-task API version depending
//! on the shape of the job's settings.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod mock;
pub mod normalize;
pub mod poll;
pub mod resource;
pub mod restart;
pub mod routing;
pub mod runs;
pub mod signal;
pub mod transport;

pub use api::{wrap_missing_job, JobsApi};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ClientConfig, ConfigError};
pub use error::{FailureKind, JobError, JobResult};
pub use normalize::{fingerprint, normalize, normalize_in_place};
pub use poll::{PollConfig, RunStatePoller};
pub use resource::{validate, JobResource, JobResourceSpec, JobView, Plan, ResourceTimeouts};
pub use restart::{RestartOrchestrator, RestartOutcome};
pub use routing::select_version;
pub use runs::RunController;
pub use signal::CancelFlag;
pub use transport::{HttpTransport, HttpTransportConfig, MockTransport, Transport, TransportError};

pub use jobctl_protocol as protocol;
