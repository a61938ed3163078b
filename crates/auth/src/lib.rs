//! `stockbook-auth`: role-based authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows the
//! closed set of roles, what each role may do, and how to check a verified
//! token's claims.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize};
pub use claims::{
    Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims,
};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{Role, UnknownRole};
