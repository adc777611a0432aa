pub mod combine_use_case;
pub mod normalize_use_case;
pub mod ports;

pub use combine_use_case::{CombineReport, CombineUseCase};
pub use normalize_use_case::{BatchReport, NormalizeUseCase, RunSummary};
