//! Multi-channel notification dispatch.
//!
//! The [`Notifier`] fans an alert out to every configured channel,
//! records one [`NotificationRecord`] per channel per send, and
//! swallows delivery failures: a dead webhook degrades observability,
//! never the control loop that raised the alert. When notifications
//! are disabled each send produces a single "mock" history record and
//! performs no network I/O.
//!
//! ```text
//!   send_alert ──┬── webhook  ──► POST json
//!                ├── slack    ──► POST attachments
//!                ├── dingtalk ──► POST markdown
//!                └── wechat   ──► POST markdown
//!                        │
//!                        ▼
//!                 history (append-only)
//! ```

pub mod format;
pub mod notifier;

pub use notifier::Notifier;

pub use navops_core::notify::{
    AlertLevel, ChannelConfig, NotificationRecord, NotifyConfig, NotifyStats,
};
