//! HTTP handlers. Each one parses the request, delegates to a service and
//! maps the result (or `AppError`) to a response.

pub mod auth_handlers;
pub mod catalog_handlers;
pub mod health_handlers;
pub mod object_handlers;
pub mod upload_handlers;
pub mod watch_handlers;
