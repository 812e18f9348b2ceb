pub mod context;

use crate::store::Device;
use crate::{runtime::ProcessResult, types::events::CoreEventBus};

/// Core client containing only platform-independent protocol logic
pub struct CoreClient {
    /// Core device data
    pub device: Device,
    pub event_bus: CoreEventBus,
}

impl CoreClient {
    /// Creates a new core client with the given device
    pub fn new(device: Device) -> Self {
        Self {
            device,
            event_bus: CoreEventBus::new(),
        }
    }

    /// Processes an incoming message/event and returns the result
    /// This is a pure function that doesn't perform any I/O
    pub fn process_incoming_data(&self, _data: &[u8]) -> ProcessResult {
        // TODO: Implement core message processing logic
        // This would include:
        // - Binary protocol parsing
        // - Message decryption
        // - Event generation
        // But without any I/O operations

        ProcessResult::new()
    }

    /// Prepares outgoing data for sending
    /// This is a pure function that doesn't perform any I/O
    pub fn prepare_outgoing_message(
        &self,
        _message: &str, // placeholder
    ) -> ProcessResult {
        // TODO: Implement core message preparation logic
        // This would include:
        // - Message encryption
        // - Binary protocol encoding
        // But without any network operations

        ProcessResult::new()
    }

    /// Gets the current device state
    pub fn get_device(&self) -> &Device {
        &self.device
    }

    /// Updates device state (pure function)
    pub fn update_device(&mut self, device: Device) {
        self.device = device;
    }
}
