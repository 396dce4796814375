pub mod app;
pub mod config;
pub mod error;
pub mod kubernetes;
pub mod labels;
pub mod report;
pub mod selector;

pub use app::{process_exit_code, run, ExecRequest};
pub use config::{Args, Settings};
pub use error::PodExecError;
pub use labels::{LabelConstraint, LabelSelector};
pub use selector::{PodSelector, RetryPolicy, Selection};
