pub mod error;
pub mod jwt;
pub mod pagination;
pub mod swagger_doc;
