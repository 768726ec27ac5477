pub mod backend;
pub mod object_store;
pub mod prompt;
pub mod storage;
pub mod store;

pub use backend::build_backend;
pub use object_store::{ObjectClient, ObjectStorageBackend};
pub use prompt::render_prompt;
pub use storage::{LocalFileBackend, StorageBackend};
pub use store::ConversationStore;
