use thiserror::Error;

/// Maximum length for edge routing data (3 bytes max = 0xFFFFFF)
pub const MAX_EDGE_ROUTING_LEN: usize = 0xFF_FFFF;

#[derive(Debug, Error)]
pub enum EdgeRoutingError {
    #[error("edge routing info too large (max {MAX_EDGE_ROUTING_LEN} bytes)")]
    RoutingInfoTooLarge,
}

/// Builds the edge routing pre-intro header.
/// Format: `ED\0\1` (4 bytes) + length (3 bytes big-endian) + routing_data
pub fn build_edge_routing_preintro(routing_info: &[u8]) -> Result<Vec<u8>, EdgeRoutingError> {
    let len = routing_info.len();
    if len > MAX_EDGE_ROUTING_LEN {
        return Err(EdgeRoutingError::RoutingInfoTooLarge);
    }

    let mut preintro = Vec::with_capacity(7 + len);
    preintro.extend_from_slice(b"ED\x00\x01");
    preintro.push((len >> 16) as u8);
    preintro.push((len >> 8) as u8);
    preintro.push(len as u8);
    preintro.extend_from_slice(routing_info);
    Ok(preintro)
}
