// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{format_bot_info, parse_format, resolve_output_path, write_report};
