pub mod console;
pub mod log_file;
pub mod webhook;
