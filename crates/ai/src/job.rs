use crate::result::AiError;

/// A self-contained inference unit.
///
/// Jobs receive a snapshot as `Input` (built by infra from projections) and
/// stay storage-agnostic.
pub trait AiJob: Send + Sync + 'static {
    type Input: Send + Sync + 'static;
    type Output: Send + 'static;

    /// The input snapshot the job will run on.
    fn input(&self) -> &Self::Input;

    /// Execute and return the insight. Must be deterministic for a given input.
    fn run(&self) -> Result<Self::Output, AiError>;
}
