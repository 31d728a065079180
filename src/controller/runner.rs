//! Long-running loop: poll ticks, host requests and notifications
//!
//! Requests arrive as one JSON object per line on `input`; responses and
//! notifications leave as one JSON object per line on `output`. Everything
//! runs on one task, so detection cycles and requests never overlap.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::config::ObserveMode;
use crate::notify::Notification;

use super::GroupController;
use super::router::{Response, parse_request};

#[derive(Clone, Copy, Debug)]
pub struct RunSettings {
    pub mode: ObserveMode,
    pub poll_interval: Duration,
}

async fn write_message<W: AsyncWrite + Unpin>(output: &mut W, message: &Response) -> Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

/// Poll mode keeps watching playback when output breaks; push mode has no
/// way left to answer its host.
async fn deliver<W: AsyncWrite + Unpin>(output: &mut W, message: &Response, polling: bool) -> Result<()> {
    match write_message(output, message).await {
        Err(e) if polling => {
            tracing::warn!(error = %e, "Failed to write message, still watching playback");
            Ok(())
        }
        result => result,
    }
}

fn notification_message(notification: Notification) -> Response {
    Response::Notification {
        title: notification.title,
        message: notification.message,
    }
}

impl GroupController {
    /// Runs until `shutdown` resolves. In push mode the loop also ends when
    /// `input` closes, since no further track events can arrive.
    pub async fn run<R, W, S>(
        &self,
        settings: RunSettings,
        input: R,
        mut output: W,
        mut notifications: mpsc::UnboundedReceiver<Notification>,
        shutdown: S,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        let polling = settings.mode == ObserveMode::Poll;
        let mut lines = input.lines();
        let mut input_open = true;

        let mut ticker = tokio::time::interval(settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);

        tracing::info!(
            mode = ?settings.mode,
            interval_ms = settings.poll_interval.as_millis() as u64,
            "Watching playback"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick(), if polling => {
                    let outcome = self.poll_once().await;
                    tracing::trace!(?outcome, "Detection cycle finished");
                }
                line = lines.next_line(), if input_open => {
                    match line {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            let response = match parse_request(&line) {
                                Ok(request) => self.dispatch(request).await,
                                Err(e) => {
                                    tracing::warn!(error = %e, "Malformed request");
                                    Response::Error { error: format!("malformed request: {e}") }
                                }
                            };
                            deliver(&mut output, &response, polling).await?;
                        }
                        Ok(None) => {
                            tracing::info!("Request input closed");
                            input_open = false;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to read request input");
                            input_open = false;
                        }
                    }
                    if !input_open && !polling {
                        break;
                    }
                }
                Some(notification) = notifications.recv() => {
                    deliver(&mut output, &notification_message(notification), polling).await?;
                }
            }
        }

        while let Ok(notification) = notifications.try_recv() {
            deliver(&mut output, &notification_message(notification), polling).await?;
        }

        tracing::info!("Stopped watching playback");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config;
    use crate::controller::testing::{FakeSpotify, MemoryGroupStore};
    use crate::model::TrackId;
    use crate::notify::ChannelNotifier;

    fn ids(raw: &[&str]) -> Vec<TrackId> {
        raw.iter().map(|id| TrackId::new(*id)).collect()
    }

    fn channel_controller(
        api: FakeSpotify,
        store: MemoryGroupStore,
    ) -> (GroupController, mpsc::UnboundedReceiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::channel();
        let controller = GroupController::new(
            Arc::new(api),
            Arc::new(store),
            Arc::new(notifier),
            config::Notify::default(),
        );
        (controller, rx)
    }

    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    fn messages(output: &[u8]) -> Vec<Response> {
        std::str::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_mode_expands_once_across_ticks() {
        let api = FakeSpotify::new().playing(&[Some("h"), Some("h"), Some("h")]);
        let store = MemoryGroupStore::new().with_group("p1", &["h", "m1", "m2"]);
        let (controller, rx) = channel_controller(api.clone(), store);

        let settings = RunSettings {
            mode: ObserveMode::Poll,
            poll_interval: Duration::from_millis(5000),
        };
        let mut output = Vec::new();
        controller
            .run(
                settings,
                &b""[..],
                &mut output,
                rx,
                tokio::time::sleep(Duration::from_millis(12_000)),
            )
            .await
            .unwrap();

        assert_eq!(api.enqueue_attempts(), ids(&["m1", "m2"]));
        let notifications: Vec<Response> = messages(&output)
            .into_iter()
            .filter(|m| matches!(m, Response::Notification { .. }))
            .collect();
        assert_eq!(notifications.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_mode_serves_requests_until_input_closes() {
        let api = FakeSpotify::new();
        let store = MemoryGroupStore::new().with_group("p1", &["h", "m1"]);
        let (controller, rx) = channel_controller(api.clone(), store);

        let input = concat!(
            r#"{"type":"GET_GROUPED_SONGS"}"#,
            "\n",
            "garbage\n",
            "\n",
            r#"{"type":"CURRENT_TRACK","trackId":"h"}"#,
            "\n",
        );
        let settings = RunSettings {
            mode: ObserveMode::Push,
            poll_interval: Duration::from_millis(5000),
        };
        let mut output = Vec::new();
        controller
            .run(settings, input.as_bytes(), &mut output, rx, std::future::pending())
            .await
            .unwrap();

        let messages = messages(&output);
        assert_eq!(
            messages[0],
            Response::GroupedSongs {
                grouped_songs: ids(&["h", "m1"]),
            }
        );
        assert!(matches!(messages[1], Response::Error { .. }));
        assert_eq!(
            messages[2],
            Response::TrackObserved {
                changed: true,
                expanded: true,
            }
        );
        assert!(matches!(messages[3], Response::Notification { .. }));
        assert_eq!(messages.len(), 4);

        // Push mode never polls on its own
        assert_eq!(api.enqueue_attempts(), ids(&["m1"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_mode_survives_broken_output() {
        let api = FakeSpotify::new().playing(&[Some("a"), Some("h"), Some("g")]);
        let store = MemoryGroupStore::new()
            .with_group("p1", &["h", "m1"])
            .with_group("p2", &["g", "m2"]);
        let (controller, rx) = channel_controller(api.clone(), store);

        let settings = RunSettings {
            mode: ObserveMode::Poll,
            poll_interval: Duration::from_millis(5000),
        };
        let input = concat!(r#"{"type":"GET_GROUPED_SONGS"}"#, "\n");
        controller
            .run(
                settings,
                input.as_bytes(),
                BrokenPipe,
                rx,
                tokio::time::sleep(Duration::from_millis(12_000)),
            )
            .await
            .unwrap();

        assert_eq!(api.enqueue_attempts(), ids(&["m1", "m2"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_mode_stops_on_broken_output() {
        let (controller, rx) = channel_controller(FakeSpotify::new(), MemoryGroupStore::new());

        let settings = RunSettings {
            mode: ObserveMode::Push,
            poll_interval: Duration::from_millis(5000),
        };
        let input = concat!(r#"{"type":"GET_GROUPED_SONGS"}"#, "\n");
        let result = controller
            .run(settings, input.as_bytes(), BrokenPipe, rx, std::future::pending())
            .await;
        assert!(result.is_err());
    }
}
