//! Fluxdesk core: pure job-run state machine and view helpers.
//!
//! No I/O lives here. The engine crate executes the [`Effect`]s returned by
//! [`update`] and feeds the outcomes back in as [`Msg`]s.
mod effect;
mod error;
mod event;
mod msg;
mod request;
mod result;
mod state;
mod status;
mod update;
mod view_model;

pub use effect::Effect;
pub use error::RunError;
pub use event::RunEvent;
pub use msg::Msg;
pub use request::JobRequest;
pub use result::OutputRef;
pub use state::{Generation, JobHandle, JobRun, RunConfig, RunPhase};
pub use status::{ErrorDetail, JobStatus, StatusSnapshot};
pub use update::update;
pub use view_model::{event_line, status_line};
