//! In-memory transport.
//!
//! The caller plays the coordinator: it scripts link events and inbound
//! frames, then inspects what the device sent.

use std::collections::VecDeque;

use serde_json::Value;

use super::{Endpoint, Transport, TransportEvent};
use crate::error::{LinkError, Result};

/// Scripted in-memory transport.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    inbound: VecDeque<TransportEvent>,
    sent: Vec<String>,
    opened: Vec<Endpoint>,
    close_requests: usize,
    connected: bool,
    fail_sends: bool,
}

impl LoopbackTransport {
    /// Create a transport with no link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the link up; delivered on the next poll.
    pub fn link_up(&mut self) {
        self.connected = true;
        self.inbound.push_back(TransportEvent::LinkUp);
    }

    /// Drop the link; delivered on the next poll.
    pub fn link_down(&mut self) {
        self.connected = false;
        self.inbound.push_back(TransportEvent::LinkDown);
    }

    /// Queue an inbound text frame.
    pub fn deliver(&mut self, frame: &str) {
        self.deliver_bytes(frame.as_bytes().to_vec());
    }

    /// Queue an inbound raw frame.
    pub fn deliver_bytes(&mut self, frame: Vec<u8>) {
        self.inbound.push_back(TransportEvent::Frame(frame));
    }

    /// Queue a transport error.
    pub fn inject_error(&mut self, message: &str) {
        self.inbound
            .push_back(TransportEvent::Error(message.to_string()));
    }

    /// Make subsequent sends fail.
    pub fn fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }

    /// Frames sent so far.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Take and clear the sent frames.
    pub fn take_sent(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sent)
    }

    /// Sent frames parsed as JSON (unparseable frames are skipped).
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }

    /// Sent frames whose `type` equals `kind`.
    pub fn sent_of_kind(&self, kind: &str) -> Vec<Value> {
        self.sent_json()
            .into_iter()
            .filter(|v| v["type"] == kind)
            .collect()
    }

    /// Endpoints passed to `open`.
    pub fn opened(&self) -> &[Endpoint] {
        &self.opened
    }

    /// Number of `close` calls.
    pub fn close_requests(&self) -> usize {
        self.close_requests
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.opened.push(endpoint.clone());
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        self.inbound.drain(..).collect()
    }

    fn send(&mut self, frame: &str) -> Result<()> {
        if !self.connected {
            return Err(LinkError::Transport("not connected".to_string()));
        }
        if self.fail_sends {
            return Err(LinkError::Transport("send failed".to_string()));
        }
        self.sent.push(frame.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.close_requests += 1;
        if self.connected {
            self.connected = false;
            self.inbound.push_back(TransportEvent::LinkDown);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn name(&self) -> &'static str {
        "Loopback"
    }
}
