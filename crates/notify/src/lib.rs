//! Delivery of fired rule actions to the notification API.
//!
//! The notification API owns channel fan-out (email, webhook, alert); this
//! crate only hands it the rendered action as JSON.

pub mod http;

pub use http::HttpNotificationSink;
