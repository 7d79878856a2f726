//! Route paths.

pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const POST_AUTH_REGISTER: &str = "/api/auth/register";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const GET_AUTH_ME: &str = "/api/auth/me";
pub const POST_AUTH_INVITE: &str = "/api/auth/invite";
pub const GET_AUTH_INVITE_CODE: &str = "/api/auth/invite/{code}";
pub const POST_ADMIN_INVITE: &str = "/api/admin/invite";
pub const ADMIN_FAMILIES: &str = "/api/admin/families";
