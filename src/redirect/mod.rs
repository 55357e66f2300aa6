pub mod handlers;
pub mod middleware;
pub mod resolver;
pub mod routes;

pub use handlers::RedirectState;
pub use resolver::{LinkResolver, Resolution};
pub use routes::create_redirect_router;
