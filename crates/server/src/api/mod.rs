pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod routines;
pub mod scheduler;
pub mod tickets;

pub use routes::create_router;
