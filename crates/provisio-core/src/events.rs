//! Fire-and-forget provisioning events.

use crate::operand::{Operand, Transition};
use crate::status::{Severity, Status};
use provisio_metadata::{ProfileId, TouchpointType};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStage {
    Before,
    After,
}

/// Published around the action block of one operand in one phase.
#[derive(Debug, Clone)]
pub struct OperandEvent {
    pub phase_id: String,
    pub stage: EventStage,
    pub profile_id: ProfileId,
    pub operand: Operand,
    pub transition: Transition,
    pub touchpoint: Option<TouchpointType>,
    /// Only set on [`EventStage::After`].
    pub result: Option<Status>,
}

#[derive(Debug, Clone)]
pub enum ProvisioningEvent {
    Begin {
        profile_id: ProfileId,
        operands: usize,
    },
    Operand(OperandEvent),
    Committed {
        profile_id: ProfileId,
        timestamp: i64,
    },
    RolledBack {
        profile_id: ProfileId,
        severity: Severity,
    },
}

/// Event sink. Publishing never fails from the publisher's point of view.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: &ProvisioningEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn publish(&self, _event: &ProvisioningEvent) {}
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<ProvisioningEvent>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProvisioningEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn operand_events(&self) -> Vec<OperandEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProvisioningEvent::Operand(op) => Some(op),
                _ => None,
            })
            .collect()
    }
}

impl EventBus for RecordingEventBus {
    fn publish(&self, event: &ProvisioningEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Forwards events to an `mpsc` receiver; a dropped receiver is ignored.
#[derive(Debug)]
pub struct ChannelEventBus {
    sender: Mutex<Sender<ProvisioningEvent>>,
}

impl ChannelEventBus {
    pub fn new() -> (Self, Receiver<ProvisioningEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl EventBus for ChannelEventBus {
    fn publish(&self, event: &ProvisioningEvent) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin() -> ProvisioningEvent {
        ProvisioningEvent::Begin {
            profile_id: ProfileId::from("p"),
            operands: 2,
        }
    }

    #[test]
    fn recording_bus_keeps_order() {
        let bus = RecordingEventBus::new();
        bus.publish(&begin());
        bus.publish(&ProvisioningEvent::Committed {
            profile_id: ProfileId::from("p"),
            timestamp: 7,
        });
        let events = bus.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ProvisioningEvent::Committed { timestamp: 7, .. }));
        assert!(bus.operand_events().is_empty());
    }

    #[test]
    fn channel_bus_delivers_and_survives_dropped_receiver() {
        let (bus, rx) = ChannelEventBus::new();
        bus.publish(&begin());
        assert!(matches!(
            rx.recv().unwrap(),
            ProvisioningEvent::Begin { operands: 2, .. }
        ));
        drop(rx);
        bus.publish(&begin());
    }
}
