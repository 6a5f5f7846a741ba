//! HTTP/WS front for the Runtime RPC surface (§6): Trigger, InjectInput,
//! Chat, Checkpoint/RestoreCheckpoint, graph registration, webhook
//! ingestion, and the `Subscribe` event stream.

pub mod error;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod ws;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use middleware::cors_layer;
pub use response::{ErrorResponse, SuccessResponse};
pub use routes::{create_router, AppState};
