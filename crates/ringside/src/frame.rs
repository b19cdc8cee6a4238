//! Frame arena
//!
//! Every spawned task lives in one frame slot until it completes. A frame
//! is *armed* while it has an operation in flight; arming bumps the slot's
//! generation and yields the completion token for that operation. A
//! completion resolves only if its token matches the frame's current arming,
//! so late, duplicate or foreign tokens are caught instead of resuming the
//! wrong frame.
//!
//! An armed frame also owns the buffer its operation reads into or writes
//! from. The buffer is handed back with the completion status. If the frame
//! is released while still armed, the buffer is kept as an orphan until the
//! ring reports that operation, so the ring never touches freed memory.
//!
//! Freed slots go on a LIFO stack and are reused before the slab grows.

use std::future::Future;
use std::panic::Location;
use std::pin::Pin;

use ringside_core::entry::{Opcode, Token};
use ringside_core::error::{Error, Result};

/// Type-erased body of a spawned task.
pub(crate) type LocalFuture = Pin<Box<dyn Future<Output = Result<()>>>>;

/// Record of the operation a frame is waiting on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Armed {
    pub token: Token,
    pub opcode: Opcode,
    pub location: &'static Location<'static>,
}

struct Frame {
    /// `None` while the reactor is polling it.
    future: Option<LocalFuture>,
    armed: Option<Armed>,
    /// Completion delivered for the last arming, not yet consumed.
    completed: Option<(Token, i32)>,
    /// Buffer of the last arming; in the ring's hands until it resolves.
    buffer: Option<Vec<u8>>,
}

struct Slot {
    generation: u32,
    frame: Option<Frame>,
}

#[derive(Default)]
pub(crate) struct FrameArena {
    slots: Vec<Slot>,
    /// LIFO stack of free slot indices
    free: Vec<u32>,
    live: usize,
    /// Buffers of released frames whose operation is still in flight
    orphans: Vec<(Token, Vec<u8>)>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), live: 0, orphans: Vec::new() }
    }

    /// Store `future` in a free slot and return the slot index.
    pub fn insert(&mut self, future: LocalFuture) -> u32 {
        let frame = Frame { future: Some(future), armed: None, completed: None, buffer: None };
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize].frame = Some(frame);
            return slot;
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, frame: Some(frame) });
        slot
    }

    fn frame_mut(&mut self, slot: u32) -> Option<(&mut u32, &mut Frame)> {
        let s = self.slots.get_mut(slot as usize)?;
        let frame = s.frame.as_mut()?;
        Some((&mut s.generation, frame))
    }

    /// Arm `slot` for one operation and return its fresh token. `buffer`
    /// stays parked in the frame until the completion is consumed.
    pub fn arm(
        &mut self,
        slot: u32,
        opcode: Opcode,
        location: &'static Location<'static>,
        buffer: Option<Vec<u8>>,
    ) -> Result<Token> {
        let (generation, frame) = self
            .frame_mut(slot)
            .ok_or(Error::NoCurrentTask { location })?;
        if frame.armed.is_some() {
            return Err(Error::FrameBusy { slot, location });
        }
        *generation = generation.wrapping_add(1);
        let token = Token::new(slot, *generation);
        frame.armed = Some(Armed { token, opcode, location });
        frame.completed = None;
        frame.buffer = buffer;
        Ok(token)
    }

    /// Withdraw an arming whose submission never reached the ring.
    pub fn disarm(&mut self, token: Token) -> bool {
        match self.frame_mut(token.slot()) {
            Some((_, frame)) if frame.armed.is_some_and(|a| a.token == token) => {
                frame.armed = None;
                frame.buffer = None;
                true
            }
            _ => false,
        }
    }

    /// Deliver a completion. Returns the arming it satisfied, or `None` if
    /// no live frame is armed with `token`. An orphaned buffer waiting on
    /// `token` is freed either way.
    pub fn resolve(&mut self, token: Token, result: i32) -> Option<Armed> {
        if let Some(pos) = self.orphans.iter().position(|(t, _)| *t == token) {
            self.orphans.swap_remove(pos);
        }
        let (_, frame) = self.frame_mut(token.slot())?;
        let armed = frame.armed.filter(|a| a.token == token)?;
        frame.armed = None;
        frame.completed = Some((token, result));
        Some(armed)
    }

    /// Consume the completion delivered for `token`, if it has arrived,
    /// together with the buffer parked for it.
    pub fn take_status(&mut self, token: Token) -> Option<(i32, Option<Vec<u8>>)> {
        let (_, frame) = self.frame_mut(token.slot())?;
        match frame.completed {
            Some((t, result)) if t == token => {
                frame.completed = None;
                Some((result, frame.buffer.take()))
            }
            _ => None,
        }
    }

    pub fn take_future(&mut self, slot: u32) -> Option<LocalFuture> {
        self.frame_mut(slot)?.1.future.take()
    }

    pub fn restore(&mut self, slot: u32, future: LocalFuture) {
        if let Some((_, frame)) = self.frame_mut(slot) {
            frame.future = Some(future);
        }
    }

    /// Free `slot`, handing back its future (if not taken) so the caller
    /// can drop it outside any borrow. Tokens from earlier armings stay stale.
    pub fn release(&mut self, slot: u32) -> Option<LocalFuture> {
        let frame = self.slots.get_mut(slot as usize)?.frame.take()?;
        self.live -= 1;
        self.free.push(slot);
        if let (Some(armed), Some(buffer)) = (frame.armed, frame.buffer) {
            self.orphans.push((armed.token, buffer));
        }
        frame.future
    }

    /// Give up every buffer the ring may still touch without freeing it.
    /// Returns how many were leaked.
    pub fn leak_in_flight(&mut self) -> usize {
        let mut leaked = 0;
        for (_, buffer) in self.orphans.drain(..) {
            std::mem::forget(buffer);
            leaked += 1;
        }
        for frame in self.slots.iter_mut().filter_map(|s| s.frame.as_mut()) {
            if frame.armed.is_some() {
                if let Some(buffer) = frame.buffer.take() {
                    std::mem::forget(buffer);
                    leaked += 1;
                }
            }
        }
        leaked
    }

    pub fn is_armed(&self, slot: u32) -> bool {
        self.slots
            .get(slot as usize)
            .and_then(|s| s.frame.as_ref())
            .is_some_and(|f| f.armed.is_some())
    }

    /// Whether a live frame is armed with exactly `token`.
    pub fn armed_with(&self, token: Token) -> bool {
        self.slots
            .get(token.slot() as usize)
            .and_then(|s| s.frame.as_ref())
            .is_some_and(|f| f.armed.is_some_and(|a| a.token == token))
    }

    /// Number of frames holding a task.
    #[inline]
    pub fn live(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> LocalFuture {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn test_insert_reuses_freed_slot_lifo() {
        let mut arena = FrameArena::new();
        let a = arena.insert(idle());
        let b = arena.insert(idle());
        assert_eq!((a, b), (0, 1));

        arena.release(a);
        arena.release(b);
        assert_eq!(arena.live(), 0);
        assert_eq!(arena.insert(idle()), b);
        assert_eq!(arena.insert(idle()), a);
    }

    #[test]
    fn test_each_arming_yields_new_token() {
        let mut arena = FrameArena::new();
        let slot = arena.insert(idle());
        let here = Location::caller();

        let t1 = arena.arm(slot, Opcode::Nop, here, None).unwrap();
        assert!(arena.resolve(t1, 0).is_some());
        let t2 = arena.arm(slot, Opcode::Read, here, None).unwrap();
        assert_eq!(t1.slot(), t2.slot());
        assert_ne!(t1, t2);

        // The first token is spent.
        assert!(arena.resolve(t1, 0).is_none());
        assert_eq!(arena.resolve(t2, 5).map(|a| a.opcode), Some(Opcode::Read));
        assert_eq!(arena.take_status(t2), Some((5, None)));
        assert_eq!(arena.take_status(t2), None);
    }

    #[test]
    fn test_second_arming_is_busy() {
        let mut arena = FrameArena::new();
        let slot = arena.insert(idle());
        let here = Location::caller();
        arena.arm(slot, Opcode::Nop, here, None).unwrap();
        assert!(matches!(arena.arm(slot, Opcode::Nop, here, None), Err(Error::FrameBusy { slot: 0, .. })));
    }

    #[test]
    fn test_token_of_released_frame_is_stale() {
        let mut arena = FrameArena::new();
        let here = Location::caller();
        let slot = arena.insert(idle());
        let old = arena.arm(slot, Opcode::Nop, here, None).unwrap();
        arena.release(slot);

        let reused = arena.insert(idle());
        assert_eq!(reused, slot);
        let fresh = arena.arm(reused, Opcode::Nop, here, None).unwrap();
        assert!(arena.resolve(old, 0).is_none());
        assert!(arena.resolve(fresh, 0).is_some());
    }

    #[test]
    fn test_disarm_only_matching_token() {
        let mut arena = FrameArena::new();
        let here = Location::caller();
        let slot = arena.insert(idle());
        let token = arena.arm(slot, Opcode::Write, here, None).unwrap();
        assert!(!arena.disarm(Token::new(slot, token.generation() + 1)));
        assert!(arena.is_armed(slot));
        assert!(arena.disarm(token));
        assert!(!arena.is_armed(slot));
    }

    #[test]
    fn test_buffer_returned_with_status() {
        let mut arena = FrameArena::new();
        let here = Location::caller();
        let slot = arena.insert(idle());
        let token = arena.arm(slot, Opcode::Read, here, Some(vec![7u8; 3])).unwrap();
        assert_eq!(arena.take_status(token), None);

        arena.resolve(token, 3);
        assert_eq!(arena.take_status(token), Some((3, Some(vec![7u8; 3]))));
    }

    #[test]
    fn test_released_frame_keeps_in_flight_buffer_until_resolved() {
        let mut arena = FrameArena::new();
        let here = Location::caller();
        let slot = arena.insert(idle());
        let token = arena.arm(slot, Opcode::Write, here, Some(b"kept".to_vec())).unwrap();

        arena.release(slot);
        assert_eq!(arena.orphans.len(), 1);
        assert_eq!(arena.orphans[0].1, b"kept");

        arena.insert(idle());
        assert!(arena.resolve(token, 4).is_none());
        assert!(arena.orphans.is_empty());
    }

    #[test]
    fn test_released_idle_frame_orphans_nothing() {
        let mut arena = FrameArena::new();
        let here = Location::caller();
        let slot = arena.insert(idle());
        let token = arena.arm(slot, Opcode::Read, here, Some(vec![0u8; 2])).unwrap();
        arena.resolve(token, 2);
        arena.release(slot);
        assert!(arena.orphans.is_empty());
    }

    #[test]
    fn test_leak_in_flight_counts_parked_buffers() {
        let mut arena = FrameArena::new();
        let here = Location::caller();
        let a = arena.insert(idle());
        let b = arena.insert(idle());
        arena.arm(a, Opcode::Read, here, Some(vec![0u8; 8])).unwrap();
        arena.arm(b, Opcode::Write, here, Some(vec![1u8; 8])).unwrap();
        arena.release(b);
        assert_eq!(arena.leak_in_flight(), 2);
        assert_eq!(arena.leak_in_flight(), 0);
    }
}
