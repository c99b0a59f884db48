//! Control-thread to audio-thread command channel.
//!
//! Commands are short text payloads stored inline in fixed-size slots, so
//! neither `push` nor `pop` allocates. The channel is split into a
//! [`CommandSender`] and a [`CommandReceiver`]; each half is `Send` but not
//! `Clone`, which enforces the single-producer/single-consumer discipline.
//!
//! ```
//! use flowzone_core::command_channel;
//!
//! let (mut tx, mut rx) = command_channel(16);
//! assert!(tx.push(r#"{"cmd":"PLAY"}"#));
//! let cmd = rx.pop().unwrap();
//! assert_eq!(cmd.as_str(), r#"{"cmd":"PLAY"}"#);
//! ```

use crate::{Error, Result};
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Largest payload a [`Command`] can hold.
pub const MAX_COMMAND_BYTES: usize = 512;

/// Default number of slots in the channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Inline, fixed-size text command.
#[derive(Clone, Copy)]
pub struct Command {
    len: u16,
    bytes: [u8; MAX_COMMAND_BYTES],
}

impl Command {
    /// Returns `None` if `text` is longer than [`MAX_COMMAND_BYTES`].
    pub fn new(text: &str) -> Option<Self> {
        let src = text.as_bytes();
        if src.len() > MAX_COMMAND_BYTES {
            return None;
        }
        let mut bytes = [0u8; MAX_COMMAND_BYTES];
        bytes[..src.len()].copy_from_slice(src);
        Some(Self {
            len: src.len() as u16,
            bytes,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // Only ever built from a whole `&str`, so this cannot fail.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Parse the payload as a JSON command envelope. Not for the audio thread.
    pub fn envelope(&self) -> Result<CommandEnvelope> {
        CommandEnvelope::parse(self.as_str())
    }
}

impl TryFrom<&str> for Command {
    type Error = Error;

    fn try_from(text: &str) -> Result<Self> {
        Self::new(text).ok_or(Error::CommandTooLong {
            len: text.len(),
            max: MAX_COMMAND_BYTES,
        })
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Command {}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Command").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create a bounded command channel with `capacity` slots (at least one).
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let rb = HeapRb::<Command>::new(capacity.max(1));
    let (prod, cons) = rb.split();
    (CommandSender { prod }, CommandReceiver { cons })
}

/// Control-thread half of the command channel.
pub struct CommandSender {
    prod: HeapProd<Command>,
}

impl CommandSender {
    /// Enqueue `text`. Returns false if the channel is full or the payload is
    /// longer than [`MAX_COMMAND_BYTES`]; the command is dropped either way.
    #[inline]
    pub fn push(&mut self, text: &str) -> bool {
        match Command::new(text) {
            Some(cmd) => self.push_command(cmd),
            None => false,
        }
    }

    #[inline]
    pub fn push_command(&mut self, cmd: Command) -> bool {
        self.prod.try_push(cmd).is_ok()
    }

    pub fn capacity(&self) -> usize {
        self.prod.capacity().get()
    }

    pub fn free_slots(&self) -> usize {
        self.prod.vacant_len()
    }
}

/// Audio-thread half of the command channel.
pub struct CommandReceiver {
    cons: HeapCons<Command>,
}

impl CommandReceiver {
    #[inline]
    pub fn pop(&mut self) -> Option<Command> {
        self.cons.try_pop()
    }

    /// Pop every queued command in order, handing each to `apply`.
    /// Returns how many were applied.
    #[inline]
    pub fn drain<F: FnMut(&Command)>(&mut self, mut apply: F) -> usize {
        let mut count = 0;
        while let Some(cmd) = self.cons.try_pop() {
            apply(&cmd);
            count += 1;
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.cons.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.cons.is_empty()
    }
}

/// Parsed form of a `{ "cmd": "<NAME>", ...fields }` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub cmd: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CommandEnvelope {
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Self = serde_json::from_str(text)?;
        if envelope.cmd.is_empty() {
            return Err(Error::MissingCommandName);
        }
        Ok(envelope)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_pop_preserves_order() {
        let (mut tx, mut rx) = command_channel(8);
        for i in 0..5 {
            assert!(tx.push(&format!("cmd-{i}")));
        }
        for i in 0..5 {
            assert_eq!(rx.pop().unwrap().as_str(), format!("cmd-{i}"));
        }
        assert!(rx.pop().is_none());
    }

    #[test]
    fn test_push_beyond_capacity_fails_without_disturbing_content() {
        let (mut tx, mut rx) = command_channel(3);
        assert!(tx.push("a"));
        assert!(tx.push("b"));
        assert!(tx.push("c"));
        assert!(!tx.push("d"));
        assert_eq!(tx.free_slots(), 0);

        let drained: Vec<String> = std::iter::from_fn(|| rx.pop())
            .map(|c| c.to_string())
            .collect();
        assert_eq!(drained, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_oversize_command_rejected() {
        let (mut tx, rx) = command_channel(4);
        let long = "x".repeat(MAX_COMMAND_BYTES + 1);
        assert!(!tx.push(&long));
        assert!(rx.is_empty());

        let exact = "y".repeat(MAX_COMMAND_BYTES);
        assert!(tx.push(&exact));
        assert!(matches!(
            Command::try_from(long.as_str()),
            Err(Error::CommandTooLong { len: 513, max: 512 })
        ));
    }

    #[test]
    fn test_multibyte_payload_round_trips() {
        let cmd = Command::new("{\"cmd\":\"SET_NAME\",\"name\":\"🎸 riff\"}").unwrap();
        assert_eq!(cmd.as_str(), "{\"cmd\":\"SET_NAME\",\"name\":\"🎸 riff\"}");
    }

    #[test]
    fn test_drain_counts_and_empties() {
        let (mut tx, mut rx) = command_channel(16);
        tx.push("one");
        tx.push("two");
        let mut seen = Vec::new();
        let n = rx.drain(|c| seen.push(c.to_string()));
        assert_eq!(n, 2);
        assert_eq!(seen, vec!["one", "two"]);
        assert_eq!(rx.pending(), 0);
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let (tx, _rx) = command_channel(0);
        assert_eq!(tx.capacity(), 1);
    }

    #[test]
    fn test_envelope_parse() {
        let env = CommandEnvelope::parse(r#"{"cmd":"SET_VOLUME","slot":2,"value":0.5}"#).unwrap();
        assert_eq!(env.cmd, "SET_VOLUME");
        assert_eq!(env.get_f64("slot"), Some(2.0));
        assert_eq!(env.get_f64("value"), Some(0.5));
        assert!(env.get("cmd").is_none());
    }

    #[test]
    fn test_envelope_errors() {
        assert!(matches!(
            CommandEnvelope::parse("not json"),
            Err(Error::MalformedCommand(_))
        ));
        assert!(matches!(
            CommandEnvelope::parse(r#"{"slot":1}"#),
            Err(Error::MalformedCommand(_))
        ));
        assert!(matches!(
            CommandEnvelope::parse(r#"{"cmd":""}"#),
            Err(Error::MissingCommandName)
        ));
    }

    #[test]
    fn test_channel_across_threads() {
        let (mut tx, mut rx) = command_channel(64);
        let producer = std::thread::spawn(move || {
            let mut sent = 0;
            while sent < 500 {
                if tx.push(&sent.to_string()) {
                    sent += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let mut expected = 0;
        while expected < 500 {
            if let Some(cmd) = rx.pop() {
                assert_eq!(cmd.as_str(), expected.to_string());
                expected += 1;
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
    }

    proptest! {
        #[test]
        fn prop_fifo_up_to_capacity(
            payloads in proptest::collection::vec("[a-zA-Z0-9 ]{0,64}", 0..32),
        ) {
            let (mut tx, mut rx) = command_channel(32);
            for p in &payloads {
                prop_assert!(tx.push(p));
            }
            for p in &payloads {
                let cmd = rx.pop();
                prop_assert!(cmd.is_some());
                let cmd = cmd.unwrap();
                prop_assert_eq!(cmd.as_str(), p.as_str());
            }
            prop_assert!(rx.pop().is_none());
        }
    }
}
