//! The operation middleware chain.
//!
//! Middlewares run in a fixed, explicit order: workspace scoping first,
//! so that authorization sees the final workspace assignment, then
//! authorization, then the repository. Each middleware either returns
//! the (possibly rewritten) operation to proceed with, or a typed
//! denial.

use std::fmt::Debug;

use crate::auth::AuthContext;
use crate::error::ServiceResult;
use crate::operation::Operation;

mod authorization;
mod scoping;

pub use authorization::Authorization;
pub use scoping::WorkspaceScoping;

/// One layer of the wrapper chain.
#[async_trait::async_trait]
pub trait OperationMiddleware: Debug + Send + Sync {
    /// Inspects the operation and returns it (possibly rewritten) to
    /// proceed, or an error to reject the call.
    async fn apply(&self, ctx: &AuthContext, operation: Operation) -> ServiceResult<Operation>;
}
