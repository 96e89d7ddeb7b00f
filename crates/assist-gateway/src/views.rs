//! HTML views, compiled into the binary

/// Login form
pub const LOGIN: &str = include_str!("../static/login.html");

/// Chat view for logged-in users
pub const INDEX: &str = include_str!("../static/index.html");

/// User management and history
pub const ADMIN: &str = include_str!("../static/admin.html");
