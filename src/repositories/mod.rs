//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations behind the
//! store traits the webhook handler depends on.

pub mod user;

pub use user::{StoreError, UserRepository, UserStore};
