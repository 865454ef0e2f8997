pub mod key_value;
pub mod local_tasks;

pub use key_value::{FileKeyValueStorage, KeyValueStorage, MemoryKeyValueStorage};
pub use local_tasks::LocalTaskStore;
