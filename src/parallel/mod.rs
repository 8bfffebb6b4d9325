pub mod batch;
pub mod pool;

pub use batch::{batch_ranges, run_batch, run_one};
pub use pool::WorkerPool;
