// Pipeline ingestion: discovering extracted files, loading long-form rows, id mapping

pub mod id_map;
pub mod loader;
pub mod walker;
pub mod years;

pub use id_map::{IdMap, MappingReport};
pub use loader::{load_file, FileFormat, LoadRejection, LoadedBatch};
pub use walker::{Batch, BatchKey, DataFile, Walker};
pub use years::resolve_year;
