//! UDP receive loop feeding decoded OSC messages to the control surface.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use log::{debug, info, warn};
use rosc::decoder::{decode_udp, MTU};
use rosc::OscPacket;

use super::{Ack, ControlSurface};
use crate::error::{RcmpError, RcmpResult};

pub struct OscServer {
    socket: UdpSocket,
    surface: ControlSurface,
}

impl OscServer {
    /// Bind the control socket. The read timeout bounds how long the loop
    /// takes to notice that the process is exiting.
    pub fn bind(
        addr: SocketAddr,
        read_timeout: Duration,
        surface: ControlSurface,
    ) -> RcmpResult<Self> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| RcmpError::Osc(format!("could not bind {}: {}", addr, e)))?;
        socket.set_read_timeout(Some(read_timeout))?;
        Ok(OscServer { socket, surface })
    }

    pub fn local_addr(&self) -> RcmpResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn surface(&self) -> &ControlSurface {
        &self.surface
    }

    /// Receive and dispatch commands until exiting; the socket is closed on return.
    pub fn run(self) {
        info!(
            "OSC server listening on udp://{} prefix {}",
            self.local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".to_string()),
            self.surface.prefix()
        );
        let mut buf = [0u8; MTU];
        while !self.surface.transport().is_exiting() {
            match self.socket.recv_from(&mut buf) {
                Ok((size, from)) => {
                    for ack in self.handle_datagram(&buf[..size], from) {
                        self.surface.report(&ack);
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => warn!("OSC receive failed: {}", e),
            }
        }
        info!("OSC server closed");
    }

    /// Decode one datagram and run every recognized message in it
    pub fn handle_datagram(&self, data: &[u8], from: SocketAddr) -> Vec<Ack> {
        match decode_udp(data) {
            Ok((_, packet)) => {
                let mut acks = Vec::new();
                self.handle_packet(packet, from, &mut acks);
                acks
            }
            Err(e) => {
                warn!("Undecodable OSC packet from {}: {:?}", from, e);
                Vec::new()
            }
        }
    }

    fn handle_packet(&self, packet: OscPacket, from: SocketAddr, acks: &mut Vec<Ack>) {
        match packet {
            OscPacket::Message(msg) => match self.surface.handle_message(&msg) {
                Some(ack) => acks.push(ack),
                None => debug!("Ignoring {} from {}", msg.addr, from),
            },
            OscPacket::Bundle(bundle) => {
                for inner in bundle.content {
                    self.handle_packet(inner, from, acks);
                }
            }
        }
    }
}
