pub mod completion;
pub mod health;
pub mod items;

pub use completion::generate_completion;
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use items::{create_item, delete_item, get_items, read_item, read_user_items, update_item};
