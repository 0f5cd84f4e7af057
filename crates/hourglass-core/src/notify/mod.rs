//! Turn notifications: pure templates, channel abstraction and fan-out.

pub mod channel;
pub mod dispatcher;
pub mod render;

pub use channel::{BoxNotificationChannel, NotificationChannel};
pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use render::{TurnContext, format_duration};
