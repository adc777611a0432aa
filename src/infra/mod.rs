pub mod file_batch_source;
pub mod file_table_store;
pub mod table_csv;
pub mod table_ndjson;

pub use file_batch_source::FileBatchSource;
pub use file_table_store::FileTableStore;
