//! Guest sign-in and bearer-JWT verification.

pub mod handlers;
pub mod middleware;
pub mod service;

pub use service::{Claims, GuestSignInResponse, UserAuthService};
