// Content extraction core.
// Pure functions over the raw model output: reasoning-block stripping,
// structured-report recovery, HTML rendering. No I/O and no logging in here;
// handlers own persistence and tracing.

pub mod format;
pub mod pipeline;
pub mod reasoning;
pub mod structured;

pub use format::{escape_html, format_text};
pub use pipeline::{process, ExtractionMetadata, ExtractionPath, ExtractionResult};
pub use reasoning::strip_reasoning;
pub use structured::{extract_structured, StructuredReport, SECTION_KEYS};
