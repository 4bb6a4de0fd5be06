pub mod context;
pub mod schema;
pub mod templates;

pub use context::format_context;
pub use schema::{parse_target_tables, render_target_hint, ColumnSpec, TableSchema};
pub use templates::{
    comparator_user_message, correction_hint, current_publish_cycle, generation_prompt,
    publish_cycle, COMPARATOR_SYSTEM_PROMPT, GENERATION_SYSTEM_PROMPT,
};
