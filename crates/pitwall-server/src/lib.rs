/*!
 * Pitwall Server
 *
 * Configuração, logging, superfície HTTP/WebSocket e supervisão do watcher.
 */

pub mod api;
pub mod config;
pub mod logging;
pub mod supervisor;

pub use api::{build_router, serve, AppState};
pub use config::ServerConfig;
pub use logging::{init_tracing, LogFormat};
