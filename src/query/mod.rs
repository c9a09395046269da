pub mod identity;
pub mod posts;
pub mod server;
pub mod service;

pub use identity::*;
pub use posts::*;
pub use server::*;
pub use service::*;
