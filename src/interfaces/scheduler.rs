use crate::domains::Envelope;

/// A queue drainer. Enqueueing never blocks: `false` means the envelope was dropped.
pub trait Scheduler: Send + Sync {
    fn enqueue_outgoing(&self, envelope: Envelope) -> bool;
    fn enqueue_incoming(&self, envelope: Envelope) -> bool;
    fn start(&self);
    fn stop(&self);
}
