pub mod checkpoint;

pub use checkpoint::{checkpoint_loop, Checkpoint};
