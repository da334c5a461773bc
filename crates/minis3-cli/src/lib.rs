//! # minis3 Servers
//!
//! HTTP surfaces for the minis3 object store.
//!
//! This crate provides:
//! - **Gateway**: bucket, node and versioned object API over the core service
//! - **Storage node**: the blob server the gateway replicates to
//! - **Configuration**: file and environment layering for both binaries
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                  minis3-gateway                     │
//! ├─────────────────────────────────────────────────────┤
//! │   Request ID  │  Logging  │  CORS  │  Body Limit    │
//! ├─────────────────────────────────────────────────────┤
//! │      Bucket / Node / Object / Version Handlers      │
//! ├─────────────────────────────────────────────────────┤
//! │                    minis3-core                      │
//! │   (Placement, Replication, Versioning, Metadata)    │
//! └─────────────────────────┬───────────────────────────┘
//!                           │ PUT /store, GET /fetch
//!          ┌────────────────┼────────────────┐
//!          ▼                ▼                ▼
//!    minis3-node      minis3-node      minis3-node
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod node_server;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{GatewayConfig, NodeSeed, NodeServerConfig};
pub use error::{ApiError, ErrorCode};
pub use logging::init_tracing;
pub use node_server::create_node_router;
pub use routes::create_router;
pub use server::{
    run_node_server, run_node_server_with_shutdown, run_server, run_server_with_shutdown,
};
pub use state::{AppState, NodeState};
