use crate::domain::errors::DomainResult;
use crate::domain::models::Redirect;

/// Port for the routing layer.
///
/// A failed navigation (for example, blocked by the host) is returned to
/// the caller and never retried.
pub trait Navigator: Send + Sync {
    /// Replace the current route or leave the app.
    fn navigate(&self, redirect: &Redirect) -> DomainResult<()>;
}
