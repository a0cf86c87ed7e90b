pub mod error;
pub mod ollama;
pub mod schema;
pub mod util;

pub use error::{AiError, Result};
pub use ollama::{Ollama, TextStream};
pub use schema::StructuredOutput;
pub use util::{extract_json_object, strip_code_blocks, truncate_chars};
