/// Hysteresis alert state machine and alert notifiers
pub mod notifier;
pub mod state_machine;

pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
pub use state_machine::{transition, AlertOutcome, AlertState, AlertThresholds, AlertTransition};
