//! Packet buffers and the FIFO packet queue.
//!
//! Transport drivers and the interface relay exchange tunnel packets
//! through [`PacketQueue`]s owned by the session context. Queues live on
//! the single scheduling thread; operations never block and have no side
//! effects beyond the queue itself.

use std::collections::VecDeque;

use crate::core::QueueError;

/// An owned tunnel packet.
///
/// A packet is exclusively owned by whichever queue (or driver) currently
/// holds it, and is never mutated while queued. Ownership moves by value
/// when dequeued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    buf: Box<[u8]>,
}

impl Packet {
    /// Create a packet taking ownership of an existing buffer.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            buf: data.into_boxed_slice(),
        }
    }

    /// Create a packet by copying `data` into a freshly allocated buffer.
    ///
    /// # Errors
    /// Returns [`QueueError::Alloc`] if the buffer cannot be allocated.
    pub fn copy_from(data: &[u8]) -> Result<Self, QueueError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(data.len())?;
        buf.extend_from_slice(data);
        Ok(Self {
            buf: buf.into_boxed_slice(),
        })
    }

    /// Packet length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the packet is empty (zero-length keepalives are legal).
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The packet payload.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the packet, yielding its buffer.
    pub fn into_data(self) -> Box<[u8]> {
        self.buf
    }
}

/// A FIFO queue of pending packets.
///
/// Insertion order is preserved; consumers never observe reordering.
#[derive(Debug, Default)]
pub struct PacketQueue {
    packets: VecDeque<Packet>,
}

impl PacketQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet to the tail, preserving arrival order.
    pub fn push(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    /// Allocate a packet, copy `data` into it, and append it.
    ///
    /// # Errors
    /// Returns [`QueueError::Alloc`] if memory cannot be obtained; the
    /// queue is left unmodified.
    pub fn push_copy(&mut self, data: &[u8]) -> Result<(), QueueError> {
        let packet = Packet::copy_from(data)?;
        self.packets.push_back(packet);
        Ok(())
    }

    /// Remove and return the packet at the head, transferring ownership.
    pub fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    /// Peek at the packet at the head without dequeuing it.
    pub fn front(&self) -> Option<&Packet> {
        self.packets.front()
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
