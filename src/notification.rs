use std::time::Duration;

use crate::geometry::{Color, Rect};
use crate::macros::MacroId;

pub const APP_NAME: &str = "FT Capture";

/// Payload for the visual confirmation shown after a successful capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFeedback {
    pub macro_id: MacroId,
    pub name: String,
    pub color: Color,
    pub area: Rect,
    pub duration: Duration,
}

impl CaptureFeedback {
    pub fn message(&self) -> String {
        format!("\"{}\" captured! Ready to paste", self.name)
    }
}

/// User-facing messages. Fire-and-forget: implementations log their own
/// failures and never report them back.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);

    fn capture_feedback(&self, feedback: &CaptureFeedback) {
        self.notify(APP_NAME, &feedback.message());
    }
}

#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    timeout: Duration,
}

impl DesktopNotifier {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn show(&self, title: &str, body: &str, timeout: Duration) {
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        if let Err(err) = notify_rust::Notification::new()
            .appname(APP_NAME)
            .summary(title)
            .body(body)
            .timeout(notify_rust::Timeout::Milliseconds(millis))
            .show()
        {
            tracing::warn!("system notification failed: {err}");
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.show(title, body, self.timeout.max(Duration::from_secs(3)));
    }

    fn capture_feedback(&self, feedback: &CaptureFeedback) {
        tracing::info!(
            macro_id = %feedback.macro_id,
            color = %feedback.color,
            area = %feedback.area,
            "capture feedback"
        );
        self.show(APP_NAME, &feedback.message(), feedback.duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }

    #[test]
    fn default_feedback_goes_through_notify() {
        let notifier = RecordingNotifier::default();
        notifier.capture_feedback(&CaptureFeedback {
            macro_id: MacroId::new(),
            name: "Chart".to_string(),
            color: Color::default(),
            area: Rect::new(0, 0, 10, 10),
            duration: Duration::from_millis(1000),
        });

        assert_eq!(
            *notifier.messages.lock().unwrap(),
            vec![(
                APP_NAME.to_string(),
                "\"Chart\" captured! Ready to paste".to_string()
            )]
        );
    }
}
