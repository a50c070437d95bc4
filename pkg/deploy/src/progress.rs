use pkg_types::NodeIdentity;

/// Receives human-readable progress lines. Purely observational: a sink can
/// never influence the outcome of a deployment.
pub trait ProgressSink: Send + Sync {
    fn report(&self, node: &NodeIdentity, message: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _node: &NodeIdentity, _message: &str) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&NodeIdentity, &str) + Send + Sync,
{
    fn report(&self, node: &NodeIdentity, message: &str) {
        self(node, message)
    }
}
