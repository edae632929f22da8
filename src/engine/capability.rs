use super::job::Job;

/// Something a job can offer to the jobs that run after it.
///
/// Capabilities are looked up by walking the ancestor chain, so producers and
/// consumers never name each other's concrete types.
pub trait Capability: 'static {
    /// Human-readable name used in diagnostics.
    const NAME: &'static str;

    fn is_offered_by(job: &Job) -> bool;
}

/// Jobs exposing a [`ContentLedger`](super::ContentLedger).
#[derive(Debug, Clone, Copy)]
pub struct ContentSource;

impl Capability for ContentSource {
    const NAME: &'static str = "content source";

    fn is_offered_by(job: &Job) -> bool {
        job.ledger().is_some()
    }
}

/// Jobs that have deployed content into a folder.
#[derive(Debug, Clone, Copy)]
pub struct DeploySource;

impl Capability for DeploySource {
    const NAME: &'static str = "deploy source";

    fn is_offered_by(job: &Job) -> bool {
        job.deployed_path().is_some()
    }
}
