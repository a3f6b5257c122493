// src/pipeline.rs - Stand-alone host: NDJSON in, alarms out, periodic pings
//!
//! Each input line is one message. A line holding an object with a
//! `payload` key (and optionally a string-valued `metadata` object) is read
//! as a full envelope; any other JSON value is the payload itself, and a
//! line that is not JSON at all becomes a text payload. Output lines use
//! the same form: the bare payload when there is no metadata, the envelope
//! otherwise.

use crate::{
    config::HostConfig,
    engine::{AlarmEngine, AlarmStats},
    error::Result,
    message::Message,
    scheduler::PeriodicTask,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const PING_CHANNEL_CAPACITY: usize = 4;

// ============================================================================
// LINE CODEC
// ============================================================================

/// Decode one input line; blank lines yield `None`.
pub fn decode_line(line: &str) -> Result<Option<Message>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: JsonValue = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(_) => return Ok(Some(Message::new(JsonValue::String(line.to_string())))),
    };

    if is_envelope(&value) {
        Ok(Some(serde_json::from_value(value)?))
    } else {
        Ok(Some(Message::new(value)))
    }
}

fn is_envelope(value: &JsonValue) -> bool {
    value
        .as_object()
        .map(|map| {
            map.contains_key("payload")
                && map.keys().all(|key| key == "payload" || key == "metadata")
        })
        .unwrap_or(false)
}

/// Encode one output message as a single line, without the newline.
pub fn encode_message(message: &Message) -> Result<String> {
    if message.metadata.is_empty() && !is_envelope(&message.payload) {
        Ok(serde_json::to_string(&message.payload)?)
    } else {
        Ok(serde_json::to_string(message)?)
    }
}

// ============================================================================
// PING GENERATOR
// ============================================================================

/// Periodic source of [`Message::ping`] for background-decided sends.
#[derive(Debug)]
pub struct PingGenerator {
    task: PeriodicTask,
}

impl PingGenerator {
    /// Start emitting pings every `period` into the returned receiver.
    ///
    /// A ping is skipped when the receiver still holds unread ones.
    pub fn start(period: Duration) -> Result<(Self, mpsc::Receiver<Message>)> {
        let (tx, rx) = mpsc::channel(PING_CHANNEL_CAPACITY);
        let task = PeriodicTask::spawn("ping", period, move || {
            if tx.try_send(Message::ping()).is_err() {
                debug!("Ping channel full or closed, skipping ping");
            }
        })?;
        Ok((Self { task }, rx))
    }

    /// Stop generating pings. Later calls are no-ops.
    pub fn stop(&mut self) {
        self.task.stop();
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Totals of one [`Pipeline::run`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub lines: u64,
    pub pings: u64,
    pub written: u64,
    pub errors: u64,
    pub engine: AlarmStats,
}

/// One alarm engine wired to a line-oriented reader and writer.
#[derive(Debug)]
pub struct Pipeline {
    engine: AlarmEngine,
    ping_period: Duration,
}

impl Pipeline {
    /// Build the engine. Must be called inside a tokio runtime when the
    /// alarm uses a timer.
    pub fn new(config: &HostConfig) -> Result<Self> {
        let ping_period = config.ping_period()?;
        let engine = AlarmEngine::with_tick_interval(&config.alarm, config.tick_period()?)?;
        Ok(Self {
            engine,
            ping_period,
        })
    }

    pub fn engine(&self) -> &AlarmEngine {
        &self.engine
    }

    /// Process `reader` until EOF, writing every emitted or forwarded
    /// message to `writer`.
    ///
    /// Per-message failures are logged and counted. I/O failures end the
    /// run. The engine is shut down when the run ends.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (mut generator, mut pings) = PingGenerator::start(self.ping_period)?;
        let mut lines = reader.lines();
        let mut summary = RunSummary::default();

        info!("Pipeline started (ping every {:?})", self.ping_period);

        let result: Result<()> = loop {
            let message = tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        summary.lines += 1;
                        match decode_line(&line) {
                            Ok(Some(message)) => message,
                            Ok(None) => continue,
                            Err(e) => {
                                summary.errors += 1;
                                warn!("Skipping undecodable line {}: {}", summary.lines, e);
                                continue;
                            }
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e.into()),
                },
                Some(ping) = pings.recv() => {
                    summary.pings += 1;
                    ping
                }
            };

            if let Err(e) = self.handle(message, &mut writer, &mut summary).await {
                break Err(e);
            }
        };

        generator.stop();
        self.engine.shutdown();
        summary.engine = self.engine.stats();

        info!(
            "Pipeline finished: {} lines, {} written, {} errors",
            summary.lines, summary.written, summary.errors
        );

        result.map(|()| summary)
    }

    async fn handle<W>(&self, message: Message, writer: &mut W, summary: &mut RunSummary) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let outcome = match self.engine.process(message) {
            Ok(outcome) => outcome,
            Err(e) => {
                summary.errors += 1;
                warn!("Message processing failed: {}", e);
                return Ok(());
            }
        };

        if let Some(out) = outcome.into_message() {
            let mut line = encode_message(&out)?;
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
            summary.written += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_bare_values() {
        assert_eq!(decode_line("150").unwrap(), Some(Message::new(json!(150))));
        assert_eq!(
            decode_line(r#"{"temp": 1}"#).unwrap(),
            Some(Message::new(json!({"temp": 1})))
        );
        assert_eq!(
            decode_line("ERR").unwrap(),
            Some(Message::new(json!("ERR")))
        );
        assert_eq!(decode_line("   ").unwrap(), None);
    }

    #[test]
    fn test_decode_envelope() {
        let msg = decode_line(r#"{"payload": {"temp": 1}, "metadata": {"topic": "a/b"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, json!({"temp": 1}));
        assert_eq!(msg.meta("topic"), Some("a/b"));

        let msg = decode_line(r#"{"payload": 3}"#).unwrap().unwrap();
        assert_eq!(msg.payload, json!(3));
        assert!(msg.metadata.is_empty());

        // Extra keys make it an ordinary payload
        let msg = decode_line(r#"{"payload": 3, "other": 1}"#).unwrap().unwrap();
        assert_eq!(msg.payload, json!({"payload": 3, "other": 1}));

        assert!(decode_line(r#"{"payload": 3, "metadata": {"n": 1}}"#).is_err());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode_message(&Message::new(json!({"a": 1}))).unwrap(), r#"{"a":1}"#);
        assert_eq!(
            encode_message(&Message::new(json!(1)).with_metadata("k", "v")).unwrap(),
            r#"{"payload":1,"metadata":{"k":"v"}}"#
        );
        // Payloads that look like envelopes are wrapped so they decode back unchanged
        let tricky = Message::new(json!({"payload": 1}));
        let line = encode_message(&tricky).unwrap();
        assert_eq!(decode_line(&line).unwrap(), Some(tricky));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_generator() {
        let (mut generator, mut pings) = PingGenerator::start(Duration::from_secs(1)).unwrap();
        let ping = pings.recv().await.unwrap();
        assert!(ping.is_ping());

        generator.stop();
        generator.stop();
        assert!(!generator.is_running());
        assert!(pings.recv().await.is_none());
    }
}
