use std::pin::Pin;

use futures::stream::Stream;
use tokio::sync::mpsc;

use crate::messages::Notification;

/// Handle through which a panel receives dispatcher notifications, in
/// emission order.
#[derive(Debug)]
pub struct NotificationStream {
    receiver: mpsc::Receiver<Notification>,
}

impl NotificationStream {
    pub(crate) fn new(receiver: mpsc::Receiver<Notification>) -> Self {
        Self { receiver }
    }

    /// Receives the next notification.
    pub async fn next(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Converts the handle into a `Stream` for ergonomic use in async flows.
    pub fn into_stream(self) -> impl Stream<Item = Notification> + Send + 'static {
        tokio_stream::wrappers::ReceiverStream::new(self.receiver)
    }
}

impl Stream for NotificationStream {
    type Item = Notification;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

pub fn notification_channel(capacity: usize) -> (mpsc::Sender<Notification>, NotificationStream) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, NotificationStream::new(rx))
}
