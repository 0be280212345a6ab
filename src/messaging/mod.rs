// Messaging - lock-free channels between the playback core and its host

pub mod channels;
pub mod command;
pub mod notification;

pub use channels::{
    CommandConsumer, CommandProducer, NotificationConsumer, NotificationProducer,
    NotificationSender, create_command_channel, create_notification_channel, try_notify,
};
pub use command::Command;
pub use notification::{Notification, NotificationCategory, NotificationLevel};
