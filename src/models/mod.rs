// Re-export all model types
pub use self::cart::*;
pub use self::errors::*;
pub use self::patch::*;
pub use self::product::*;
pub use self::schema::*;
pub use self::summary::*;

mod cart;
mod errors;
mod patch;
mod product;
mod schema;
mod summary;
