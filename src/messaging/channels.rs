// Lock-free notification channel

use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Producer, traits::Split};
use std::sync::{Arc, Mutex};

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity.max(1));
    rb.split()
}

/// Producer side shared between the session and its pattern callbacks
#[derive(Clone)]
pub struct Notifier {
    producer: Arc<Mutex<NotificationProducer>>,
}

impl Notifier {
    pub fn new(producer: NotificationProducer) -> Self {
        Self {
            producer: Arc::new(Mutex::new(producer)),
        }
    }

    /// Push a notification, dropping it when the channel is full
    pub fn send(&self, notification: Notification) {
        let mut producer = match self.producer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(dropped) = producer.try_push(notification) {
            tracing::debug!(message = %dropped.message, "notification channel full, dropped");
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
