pub mod graph;
pub mod layout;
pub mod render;
pub mod snapshot;
pub mod transform;
mod util;

pub use util::{format_count, format_id, hex_width};
