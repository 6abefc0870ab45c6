pub mod notification_bell;
