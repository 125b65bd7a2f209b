//! Audit declaration and call description types for Vigil.
//!
//! These types are pure data: they describe which methods are audited, with
//! which strategy, and what the audited call looked like. The machinery that
//! acts on them lives in `vigil-audit-capture`.

mod declaration;
mod method;
mod parameter;
mod value;

pub use declaration::{AuditDeclaration, StrategyOption, DEFAULT_AUDITED_TYPE, IGNORE_STRATEGY};
pub use method::{MethodIdentity, MethodIdentityError};
pub use parameter::{ParameterAnnotation, ParameterDescriptor};
pub use value::{ReturnValue, ValueKind};
