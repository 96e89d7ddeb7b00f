//! Assistant Gateway - HTTP front end for the corporate assistant
//!
//! Serves the login, chat and admin views and the JSON routes behind them.
//!
//! # Routes
//!
//! ```text
//! GET  /                    login or chat view
//! GET  /login, POST /login  form login, sets the session cookie
//! GET  /logout              ends the session
//! POST /ask                 {"question"} -> {"response", "timestamp"}   (logged in)
//! GET  /history             exchanges, newest first                     (admin)
//! GET  /admin               admin view                                  (admin)
//! GET  /admin/users         identity list                               (admin)
//! POST /admin/add_user      create an account                           (admin)
//! GET  /documents/search    keyword search in the document source       (logged in)
//! GET  /documents/content   one document's text                         (logged in)
//! GET  /documents/recent    recently modified documents                 (logged in)
//! GET  /documents/list      folder entries matching a name glob         (logged in)
//! GET  /health              liveness
//! ```
//!
//! Sessions live in memory; the cookie carries a keyed-hash-signed session id.

pub mod error;
pub mod extract;
pub mod gateway;
pub mod logging;
pub mod session;
pub mod views;

pub use error::{GatewayError, Result};
pub use extract::{Authenticated, CurrentSession, Privileged};
pub use gateway::{Gateway, GatewayState};
pub use logging::init_tracing;
pub use session::{CookieSigner, Session, SessionId, SessionManager, COOKIE_NAME};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
