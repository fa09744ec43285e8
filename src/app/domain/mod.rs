pub mod content;
pub mod order_key;
pub mod policy;
pub mod test_code;

pub use content::{ContentBlock, TestContent};
pub use policy::{EntityResolution, ImportMode, TagResolution};
