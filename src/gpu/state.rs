//! Usage states of a buffer and the policy for moving between them.
//!
//! A [`Memory`](super::Memory) starts out host-readable and only migrates when
//! a caller asks for a capability the current allocation lacks. The policy is
//! the pure function [`UsageState::transition`]; executing the allocation and
//! copies it asks for is left to the buffer.

use crate::error::{Error, Result};
use std::fmt;

/// The legal usage-flag combinations of a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageState {
    /// `MAP_READ | COPY_DST`, the initial state
    MapRead,
    /// `MAP_WRITE | COPY_SRC`
    MapWrite,
    /// `STORAGE`, device-only
    Storage,
    /// `STORAGE | COPY_DST`, filled from host data
    StorageCopyDst,
    /// `STORAGE | COPY_SRC`, may be read back later
    StorageCopySrc,
}

/// A capability requested from a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Map for reading on the host
    HostRead,
    /// Map for writing on the host
    HostWrite,
    /// Bind as a read-write storage buffer
    Storage,
}

/// How existing contents travel into a newly allocated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyKind {
    /// Nothing to carry over
    None,
    /// `copy_buffer_to_buffer` encoded and submitted on the queue
    Device,
    /// Read the old buffer through a host mapping and write it into the new one
    Host,
}

/// Outcome of [`UsageState::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the transition
    pub from: UsageState,
    /// State of the buffer that satisfies the request
    pub target: UsageState,
    /// How contents reach the new buffer
    pub copy: CopyKind,
}

impl Transition {
    /// True when the current allocation already satisfies the request.
    pub fn is_noop(&self) -> bool {
        self.from == self.target
    }
}

impl UsageState {
    /// Every legal state
    pub const ALL: [UsageState; 5] = [
        UsageState::MapRead,
        UsageState::MapWrite,
        UsageState::Storage,
        UsageState::StorageCopyDst,
        UsageState::StorageCopySrc,
    ];

    /// Usage flags a buffer in this state is created with
    pub fn usages(&self) -> wgpu::BufferUsages {
        use wgpu::BufferUsages as U;
        match self {
            UsageState::MapRead => U::MAP_READ | U::COPY_DST,
            UsageState::MapWrite => U::MAP_WRITE | U::COPY_SRC,
            UsageState::Storage => U::STORAGE,
            UsageState::StorageCopyDst => U::STORAGE | U::COPY_DST,
            UsageState::StorageCopySrc => U::STORAGE | U::COPY_SRC,
        }
    }

    /// Inverse of [`usages`](Self::usages); `None` for combinations a buffer never holds.
    pub fn from_usages(usages: wgpu::BufferUsages) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.usages() == usages)
    }

    /// Whether this state already provides `capability`
    pub fn supports(&self, capability: Capability) -> bool {
        let usages = self.usages();
        match capability {
            Capability::HostRead => usages.contains(wgpu::BufferUsages::MAP_READ),
            Capability::HostWrite => usages.contains(wgpu::BufferUsages::MAP_WRITE),
            Capability::Storage => usages.contains(wgpu::BufferUsages::STORAGE),
        }
    }

    /// Decide the state a buffer must move to in order to provide `capability`.
    pub fn transition(self, capability: Capability) -> Result<Transition> {
        if self.supports(capability) {
            return Ok(Transition {
                from: self,
                target: self,
                copy: CopyKind::None,
            });
        }

        let (target, copy) = match (capability, self) {
            (Capability::HostRead | Capability::HostWrite, UsageState::StorageCopyDst) => {
                return Err(Error::usage(
                    "buffer is a device output without COPY_SRC; did you call read() on a device-output-only buffer?",
                ));
            }
            (Capability::HostRead | Capability::HostWrite, UsageState::Storage) => {
                return Err(Error::usage(
                    "buffer was allocated device-only and can never be mapped on the host",
                ));
            }
            (Capability::HostRead, _) => (UsageState::MapRead, CopyKind::Device),
            (Capability::HostWrite, _) => (UsageState::MapWrite, CopyKind::Host),
            // Host-authored data has to reach the device.
            (Capability::Storage, UsageState::MapWrite) => {
                (UsageState::StorageCopyDst, CopyKind::Device)
            }
            // A readable buffer holds nothing the device needs yet; keep the
            // way back open instead of copying.
            (Capability::Storage, _) => (UsageState::StorageCopySrc, CopyKind::None),
        };

        Ok(Transition {
            from: self,
            target,
            copy,
        })
    }
}

impl Default for UsageState {
    fn default() -> Self {
        UsageState::MapRead
    }
}

impl fmt::Display for UsageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UsageState::MapRead => "MAP_READ|COPY_DST",
            UsageState::MapWrite => "MAP_WRITE|COPY_SRC",
            UsageState::Storage => "STORAGE",
            UsageState::StorageCopyDst => "STORAGE|COPY_DST",
            UsageState::StorageCopySrc => "STORAGE|COPY_SRC",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(from: UsageState, capability: Capability) -> (UsageState, CopyKind) {
        let t = from.transition(capability).unwrap();
        (t.target, t.copy)
    }

    #[test]
    fn test_satisfied_requests_are_noops() {
        for state in UsageState::ALL {
            for cap in [Capability::HostRead, Capability::HostWrite, Capability::Storage] {
                if state.supports(cap) {
                    let t = state.transition(cap).unwrap();
                    assert!(t.is_noop());
                    assert_eq!(t.copy, CopyKind::None);
                }
            }
        }
    }

    #[test]
    fn test_read_transitions() {
        assert_eq!(
            step(UsageState::MapWrite, Capability::HostRead),
            (UsageState::MapRead, CopyKind::Device)
        );
        assert_eq!(
            step(UsageState::StorageCopySrc, Capability::HostRead),
            (UsageState::MapRead, CopyKind::Device)
        );
    }

    #[test]
    fn test_read_of_device_output_fails() {
        let err = UsageState::StorageCopyDst
            .transition(Capability::HostRead)
            .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(err.to_string().contains("device-output-only"));

        assert!(UsageState::Storage.transition(Capability::HostRead).is_err());
    }

    #[test]
    fn test_storage_transitions() {
        assert_eq!(
            step(UsageState::MapWrite, Capability::Storage),
            (UsageState::StorageCopyDst, CopyKind::Device)
        );
        assert_eq!(
            step(UsageState::MapRead, Capability::Storage),
            (UsageState::StorageCopySrc, CopyKind::None)
        );
    }

    #[test]
    fn test_write_transitions_copy_through_host() {
        assert_eq!(
            step(UsageState::MapRead, Capability::HostWrite),
            (UsageState::MapWrite, CopyKind::Host)
        );
        assert_eq!(
            step(UsageState::StorageCopySrc, Capability::HostWrite),
            (UsageState::MapWrite, CopyKind::Host)
        );
        assert!(UsageState::StorageCopyDst
            .transition(Capability::HostWrite)
            .is_err());
    }

    #[test]
    fn test_targets_are_legal_and_capable() {
        for state in UsageState::ALL {
            for cap in [Capability::HostRead, Capability::HostWrite, Capability::Storage] {
                if let Ok(t) = state.transition(cap) {
                    assert!(t.target.supports(cap));
                    assert_eq!(UsageState::from_usages(t.target.usages()), Some(t.target));
                }
            }
        }
    }

    #[test]
    fn test_from_usages_rejects_unknown() {
        let odd = wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE;
        assert_eq!(UsageState::from_usages(odd), None);
    }
}
