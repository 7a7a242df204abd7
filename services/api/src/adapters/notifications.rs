//! services/api/src/adapters/notifications.rs
//!
//! Notification sink that records deliveries as structured log events.
//! A real email/SMS channel would implement the same port.

use async_trait::async_trait;
use detailing_core::domain::{Booking, User};
use detailing_core::ports::{NotificationKind, NotificationService, PortResult};
use tracing::info;

fn subject_line(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::BookingConfirmation => "Your detailing appointment is booked",
        NotificationKind::BookingReminder => "Reminder: your detailing appointment is tomorrow",
        NotificationKind::CompletionFollowUp => "How did we do?",
    }
}

#[derive(Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationService for LogNotifier {
    async fn send(
        &self,
        kind: NotificationKind,
        booking: &Booking,
        recipient: &User,
    ) -> PortResult<()> {
        info!(
            booking_id = %booking.id,
            recipient = %recipient.email,
            scheduled_at = %booking.scheduled_at,
            kind = ?kind,
            subject = subject_line(kind),
            "Notification sent"
        );
        Ok(())
    }
}
