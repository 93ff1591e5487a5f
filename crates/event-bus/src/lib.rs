use std::sync::Arc;

use tokio::sync::broadcast;

use schedassist_core_types::AssistError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

/// Publishing is synchronous: emitters (tree mutations, lifecycle hooks) must not
/// suspend while they hold partially applied state.
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    /// Returns the number of subscribers that received the event.
    fn publish(&self, event: E) -> Result<usize, AssistError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
    fn subscriber_count(&self) -> usize;
}

/// Simple in-memory bus backed by a tokio broadcast channel.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }
}

impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    fn publish(&self, event: E) -> Result<usize, AssistError> {
        self.sender
            .send(event)
            .map_err(|err| AssistError::new(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let bus = InMemoryBus::<u32>::new(4);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(7).unwrap(), 2);
        assert_eq!(a.recv().await.unwrap(), 7);
        assert_eq!(b.recv().await.unwrap(), 7);
    }

    #[test]
    fn publish_without_subscribers_is_an_error() {
        let bus = InMemoryBus::<u32>::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.publish(1).is_err());
    }
}
