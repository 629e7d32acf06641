//! Wake-on-LAN magic packet construction and delivery

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use tokio::net::UdpSocket;
use wolhub_shared::wire::MacAddr;

/// Magic packet length: 6 sync bytes + 16 repetitions of the address
pub const MAGIC_PACKET_LEN: usize = 102;

/// Build the magic packet for a hardware address
pub fn magic_packet(mac: &MacAddr) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFFu8; MAGIC_PACKET_LEN];
    let octets = mac.octets();
    for rep in 1..=16 {
        packet[rep * 6..rep * 6 + 6].copy_from_slice(&octets);
    }
    packet
}

/// Capability for sending a broadcast datagram
#[async_trait]
pub trait WakeSender: Send + Sync {
    async fn send_magic(&self, packet: &[u8], broadcast: Ipv4Addr, port: u16) -> Result<()>;
}

/// UDP broadcast sender
pub struct UdpWakeSender;

#[async_trait]
impl WakeSender for UdpWakeSender {
    async fn send_magic(&self, packet: &[u8], broadcast: Ipv4Addr, port: u16) -> Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("binding wake socket")?;
        socket
            .set_broadcast(true)
            .context("enabling broadcast on wake socket")?;
        socket
            .send_to(packet, (broadcast, port))
            .await
            .with_context(|| format!("sending wake packet to {broadcast}:{port}"))?;
        Ok(())
    }
}
