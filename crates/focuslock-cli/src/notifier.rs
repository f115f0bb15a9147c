use focuslock_core::{Notifier, NotifyVariant};

/// Prints user-visible notifications to stderr so stdout stays pure JSON.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&mut self, message: &str, variant: NotifyVariant) {
        let tag = match variant {
            NotifyVariant::Info => "info",
            NotifyVariant::Success => "done",
            NotifyVariant::Warning => "warn",
        };
        eprintln!("[{tag}] {message}");
    }
}
