pub mod archive;
pub mod global_variables;
pub mod local;
#[cfg(feature = "reqwest")]
pub mod remote;
pub mod request;
pub mod service;
pub mod time_window;
