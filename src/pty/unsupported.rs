//! Provider for platforms without pseudo-terminal support

use super::{PtyProcess, PtyProvider, SpawnRequest};
use crate::result::ExpectError;

/// Provider that refuses every request.
///
/// Selected by [`default_provider`](super::default_provider) where no native
/// terminal support exists, so construction fails up front instead of
/// producing a half-working session.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl PtyProvider for Unsupported {
    fn spawn(&self, _request: &SpawnRequest) -> Result<PtyProcess, ExpectError> {
        Err(ExpectError::Unsupported("pseudo-terminal spawning"))
    }
}
