// Communication channels lock-free

use crate::messaging::command::Command;
use crate::messaging::notification::Notification;
use ringbuf::traits::Producer;
use ringbuf::{HeapRb, traits::Split};
use std::sync::{Arc, Mutex};

pub type CommandProducer = ringbuf::HeapProd<Command>;
pub type CommandConsumer = ringbuf::HeapCons<Command>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<Command>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

/// Producer half shared by every component that reports diagnostics
pub type NotificationSender = Arc<Mutex<NotificationProducer>>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

/// Push a notification without blocking the calling thread
/// Returns false if the channel is busy or full (the notification is dropped)
pub fn try_notify(sender: &NotificationSender, notification: Notification) -> bool {
    match sender.try_lock() {
        Ok(mut tx) => tx.try_push(notification).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::notification::NotificationCategory;
    use ringbuf::traits::Consumer;

    #[test]
    fn test_command_channel_roundtrip() {
        let (mut tx, mut rx) = create_command_channel(4);
        assert!(tx.try_push(Command::AllNotesOff).is_ok());
        assert_eq!(rx.try_pop(), Some(Command::AllNotesOff));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn test_try_notify_drops_when_full() {
        let (tx, mut rx) = create_notification_channel(1);
        let sender: NotificationSender = Arc::new(Mutex::new(tx));

        assert!(try_notify(
            &sender,
            Notification::info(NotificationCategory::Generic, "first".to_string())
        ));
        assert!(!try_notify(
            &sender,
            Notification::info(NotificationCategory::Generic, "second".to_string())
        ));

        let received = rx.try_pop().unwrap();
        assert_eq!(received.message, "first");
        assert!(rx.try_pop().is_none());
    }
}
