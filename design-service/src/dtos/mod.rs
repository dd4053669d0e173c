pub mod completion;
pub mod items;

pub use completion::{CompletionRequest, CompletionResponse};
pub use items::{DeleteResponse, DesignResponse, ItemQuery};
