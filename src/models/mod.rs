pub mod args;
pub mod error;
pub mod outcome;
pub mod report;
pub mod request_spec;
pub mod step_option;
