pub mod clock;
pub mod ids;
pub mod types;

pub use clock::*;
pub use ids::*;
pub use types::*;
