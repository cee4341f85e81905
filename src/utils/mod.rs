pub mod logging;

pub use logging::{file_name, format_elapsed};
