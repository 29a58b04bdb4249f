pub mod albums;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod search;
pub mod snatched;
pub mod wanted;

pub use routes::create_router;
