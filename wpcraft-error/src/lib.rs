//! # wpcraft-error
//!
//! Unified error handling for wpcraft, following OpenDAL's error handling practices.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., ConfigInvalid, CommandTimeout)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use wpcraft_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::ContainerNotFound, "container 'wordpress_mysql' not found")
//!         .with_operation("docker::inspect")
//!         .with_context("container", "wordpress_mysql"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All functions return `Result<T, wpcraft_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using wpcraft Error
pub type Result<T> = std::result::Result<T, Error>;
