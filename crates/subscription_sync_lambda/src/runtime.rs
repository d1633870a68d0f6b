pub use subscription_sync_core::{arn, config, diff, error, event, selector, services, tags};
