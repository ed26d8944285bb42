use flowd_frame::Frame;
use tokio::io::AsyncWrite;
use tracing::info;

use crate::error::{AdapterError, Result};
use crate::process::SubprocessInput;
use crate::registry::InitialPacket;

/// Deliver the initial information packets in declaration order.
///
/// Must complete before any input endpoint starts forwarding.
pub async fn inject_initial_packets<W>(
    input: &SubprocessInput<W>,
    packets: &[InitialPacket],
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for packet in packets {
        let frame = Frame::iip(packet.port.clone(), packet.payload.clone());
        input
            .send(frame)
            .await
            .map_err(|source| AdapterError::IipDelivery {
                port: packet.port.clone(),
                source,
            })?;
        info!(port = %packet.port, bytes = packet.payload.len(), "delivered initial packet");
    }
    Ok(())
}
