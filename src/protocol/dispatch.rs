//! Command dispatch.
//!
//! Commands resolve against a small built-in set first, in fixed priority
//! order. Anything else goes to the host's command handler if one is
//! registered, in which case acknowledging it becomes the host's job (see
//! [`Client::acknowledge_command`](crate::Client::acknowledge_command)).
//! Without a handler the command is acknowledged as `failed`.
//!
//! The dispatcher also owns the acknowledgement bookkeeping: every command id
//! produces at most one acknowledgement for the lifetime of an authenticated
//! session. An id that is still outstanding or among the last 32 resolved is
//! treated as a redelivery and dropped, even when its payload differs. A
//! payload mismatch is logged as a warning since it usually means the
//! coordinator reused an id.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use super::message::AckStatus;
use crate::error::{LinkError, Result};

/// How many resolved command ids are remembered for duplicate suppression.
const RECENT_WINDOW: usize = 32;

/// A command awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    /// Correlation token from the coordinator
    pub id: String,
    /// Command text
    pub payload: String,
}

impl PendingCommand {
    /// Create a pending command.
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

/// Commands the device resolves without delegation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCommand {
    /// `LED_ON`
    IndicatorOn,
    /// `LED_OFF`
    IndicatorOff,
    /// `STATUS`: send a telemetry report
    StatusReport,
    /// `RESTART`: reboot, never acknowledged
    Restart,
}

impl BuiltinCommand {
    /// Built-ins in resolution order.
    pub const ALL: [BuiltinCommand; 4] = [
        Self::IndicatorOn,
        Self::IndicatorOff,
        Self::StatusReport,
        Self::Restart,
    ];

    /// Payload text that selects this built-in.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::IndicatorOn => "LED_ON",
            Self::IndicatorOff => "LED_OFF",
            Self::StatusReport => "STATUS",
            Self::Restart => "RESTART",
        }
    }

    /// Match a payload against the built-in set (exact, case-sensitive).
    pub fn parse(payload: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.keyword() == payload)
    }
}

/// Effects requested by the dispatcher, executed in order by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    /// Drive the indicator
    SetIndicator(bool),
    /// Send a telemetry report sampled from the device
    ReportStatus,
    /// Reboot the device; nothing after this runs
    Reboot,
    /// Send an acknowledgement
    Acknowledge {
        /// Command being acknowledged
        command_id: String,
        /// Outcome
        status: AckStatus,
    },
}

/// Host callback for commands outside the built-in set.
pub type CommandHandler = Box<dyn FnMut(&PendingCommand)>;

/// Routes commands and tracks which ids still owe an acknowledgement.
pub struct Dispatcher {
    handler: Option<CommandHandler>,
    /// Delegated command id to payload
    outstanding: HashMap<String, String>,
    /// Resolved (id, payload) pairs, oldest first
    recent: VecDeque<(String, String)>,
}

impl Dispatcher {
    /// Create a dispatcher with no external handler.
    pub fn new() -> Self {
        Self {
            handler: None,
            outstanding: HashMap::new(),
            recent: VecDeque::with_capacity(RECENT_WINDOW),
        }
    }

    /// Register the external handler, replacing any previous one.
    pub fn set_handler(&mut self, handler: CommandHandler) {
        if self.handler.replace(handler).is_some() {
            tracing::debug!("Command handler replaced");
        }
    }

    /// Whether an external handler is registered.
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Number of delegated commands still awaiting the host's acknowledgement.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Check whether a delegated command is awaiting acknowledgement.
    pub fn is_outstanding(&self, command_id: &str) -> bool {
        self.outstanding.contains_key(command_id)
    }

    /// Payload last seen under `command_id`, if it is outstanding or recent.
    fn seen_payload(&self, command_id: &str) -> Option<&str> {
        self.outstanding
            .get(command_id)
            .map(String::as_str)
            .or_else(|| {
                self.recent
                    .iter()
                    .find(|(id, _)| id == command_id)
                    .map(|(_, payload)| payload.as_str())
            })
    }

    /// Resolve a command received on an authenticated session.
    pub fn dispatch(&mut self, command: PendingCommand) -> Vec<DispatchAction> {
        if let Some(previous) = self.seen_payload(&command.id) {
            if previous == command.payload {
                tracing::debug!(id = %command.id, "Dropping redelivered command");
            } else {
                tracing::warn!(
                    id = %command.id,
                    previous = %previous,
                    payload = %command.payload,
                    "Command id reused with a different payload; dropping"
                );
            }
            return Vec::new();
        }

        match BuiltinCommand::parse(&command.payload) {
            Some(builtin) => {
                tracing::info!(id = %command.id, command = builtin.keyword(), "Built-in command");
                self.remember(command.id.clone(), command.payload.clone());

                let mut actions = match builtin {
                    BuiltinCommand::IndicatorOn => vec![DispatchAction::SetIndicator(true)],
                    BuiltinCommand::IndicatorOff => vec![DispatchAction::SetIndicator(false)],
                    BuiltinCommand::StatusReport => vec![DispatchAction::ReportStatus],
                    BuiltinCommand::Restart => return vec![DispatchAction::Reboot],
                };
                actions.push(DispatchAction::Acknowledge {
                    command_id: command.id,
                    status: AckStatus::Executed,
                });
                actions
            },
            None => match self.handler.as_mut() {
                Some(handler) => {
                    tracing::debug!(id = %command.id, "Delegating command to host handler");
                    self.outstanding
                        .insert(command.id.clone(), command.payload.clone());
                    handler(&command);
                    Vec::new()
                },
                None => {
                    tracing::warn!(
                        id = %command.id,
                        payload = %command.payload,
                        "Unrecognised command and no handler registered"
                    );
                    self.remember(command.id.clone(), command.payload.clone());
                    vec![DispatchAction::Acknowledge {
                        command_id: command.id,
                        status: AckStatus::Failed,
                    }]
                },
            },
        }
    }

    /// Mark a delegated command as acknowledged by the host.
    ///
    /// Fails if the id was never delegated or has already been acknowledged.
    pub fn settle(&mut self, command_id: &str) -> Result<()> {
        if let Some(payload) = self.outstanding.remove(command_id) {
            self.remember(command_id.to_string(), payload);
            Ok(())
        } else {
            Err(LinkError::UnknownCommand(command_id.to_string()))
        }
    }

    /// Forget all bookkeeping when the authenticated session ends.
    ///
    /// Returns how many delegated commands were left unacknowledged.
    pub fn reset(&mut self) -> usize {
        let abandoned = self.outstanding.len();
        if abandoned > 0 {
            tracing::warn!(abandoned, "Session ended with unacknowledged commands");
        }
        self.outstanding.clear();
        self.recent.clear();
        abandoned
    }

    fn remember(&mut self, command_id: String, payload: String) {
        if self.recent.len() == RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back((command_id, payload));
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("has_handler", &self.handler.is_some())
            .field("outstanding", &self.outstanding.len())
            .field("recent", &self.recent.len())
            .finish()
    }
}
