// Repositories module - data access layer

pub mod cart_repository;
pub mod document;
pub mod product_repository;
pub mod table_manager;

pub use cart_repository::{CartRepository, DynamoDbCartRepository};
pub use product_repository::{DynamoDbProductRepository, ProductRepository};
pub use table_manager::TableManager;
