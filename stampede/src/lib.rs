#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod check;
pub mod error;
pub mod evaluator;
pub mod payload;
pub mod profile;
pub mod recorder;
pub mod report;
pub mod run;
pub mod scheduler;
pub mod target;

pub(crate) mod measurement;
pub(crate) mod timer;
pub(crate) mod worker;

pub use error::{ReportError, SetupError, TargetError};
pub use profile::Profile;
pub use run::{LoadTest, RunState, RunStatus};
pub use stampede_core as core;

pub mod prelude {
    pub use crate::error::{SetupError, TargetError};
    pub use crate::profile::Profile;
    pub use crate::report::{ConsoleSink, JsonFileSink, ReportSink};
    pub use crate::run::{LoadTest, RunState, RunStatus};
    pub use crate::target::{HttpTarget, ResponseSnapshot, Target};

    pub use stampede_core::{Check, RampPolicy, RunConfig, RunReport, Stage, Threshold};
    pub use url::Url;
}
