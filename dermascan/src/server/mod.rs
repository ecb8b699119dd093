pub mod handlers;
pub mod routes;
pub mod types;
pub mod upload;
