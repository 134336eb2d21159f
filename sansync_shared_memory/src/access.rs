//! Access descriptors applied to a segment at creation time.
//!
//! The segment is a same-host rendezvous between cooperating processes, not a
//! security boundary. The default policy therefore grants every local
//! principal full read/write access: the producer usually lives inside a host
//! process running as a different user than the consumer. This is a trust
//! decision of the deployment. Use [`AccessPolicy::Group`] or
//! [`AccessPolicy::Owner`] when the local host is not fully trusted.
//!
//! A descriptor is built in three steps, mirroring an ACL:
//!
//! 1. resolve the well-known principal(s) for the policy,
//! 2. build an access list of explicit entries,
//! 3. attach the list to a fresh descriptor, which resolves it to POSIX bits.
//!
//! Any failing step returns an error and nothing partially built escapes.

use crate::error::{ShmError, ShmResult};
use bitflags::bitflags;
use nix::sys::stat::Mode;
use sansync::config::AccessPolicy;

bitflags! {
    /// Rights granted by one access entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessRights: u8 {
        /// Map and read the segment
        const READ = 0b01;
        /// Write into the segment
        const WRITE = 0b10;
        /// Everything a consumer or producer needs
        const FULL = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Principal an access entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// The user creating the segment
    Owner,
    /// The creating user's group
    Group,
    /// Every local user (owner and group included)
    Everyone,
}

impl Principal {
    /// Permission bits this principal maps to for the given rights.
    fn mode_bits(self, rights: AccessRights) -> Mode {
        let (read, write) = match self {
            Principal::Owner => (Mode::S_IRUSR, Mode::S_IWUSR),
            Principal::Group => (Mode::S_IRGRP, Mode::S_IWGRP),
            Principal::Everyone => (
                Mode::S_IRUSR | Mode::S_IRGRP | Mode::S_IROTH,
                Mode::S_IWUSR | Mode::S_IWGRP | Mode::S_IWOTH,
            ),
        };

        let mut bits = Mode::empty();
        if rights.contains(AccessRights::READ) {
            bits |= read;
        }
        if rights.contains(AccessRights::WRITE) {
            bits |= write;
        }
        bits
    }
}

/// One explicit grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessEntry {
    /// Who the grant applies to
    pub principal: Principal,
    /// What is granted
    pub rights: AccessRights,
}

/// Ordered list of explicit grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessList {
    entries: Vec<AccessEntry>,
}

impl AccessList {
    /// Build a list from explicit entries.
    ///
    /// Rejects an empty list and entries granting nothing.
    pub fn from_entries(entries: Vec<AccessEntry>) -> ShmResult<Self> {
        if entries.is_empty() {
            return Err(ShmError::InvalidDescriptor {
                reason: "access list has no entries".to_string(),
            });
        }
        if let Some(entry) = entries.iter().find(|e| e.rights.is_empty()) {
            return Err(ShmError::InvalidDescriptor {
                reason: format!("entry for {:?} grants no rights", entry.principal),
            });
        }
        Ok(Self { entries })
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[AccessEntry] {
        &self.entries
    }
}

/// Access descriptor handed to segment creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDescriptor {
    acl: AccessList,
    mode: Mode,
}

impl SecurityDescriptor {
    /// Attach an access list to a fresh descriptor.
    ///
    /// The owner must end up with read and write access, otherwise the
    /// creating process could not map its own segment.
    pub fn with_acl(acl: AccessList) -> ShmResult<Self> {
        let mode = acl
            .entries()
            .iter()
            .fold(Mode::empty(), |mode, e| mode | e.principal.mode_bits(e.rights));

        let owner_rw = Mode::S_IRUSR | Mode::S_IWUSR;
        if !mode.contains(owner_rw) {
            return Err(ShmError::InvalidDescriptor {
                reason: format!("owner lacks read/write access (mode {:o})", mode.bits()),
            });
        }

        Ok(Self { acl, mode })
    }

    /// POSIX permission bits for the backing object.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Access list the descriptor was built from.
    pub fn acl(&self) -> &AccessList {
        &self.acl
    }

    /// True when any local user may open the segment.
    pub fn is_world_accessible(&self) -> bool {
        self.mode.intersects(Mode::S_IROTH | Mode::S_IWOTH)
    }
}

/// Builds descriptors for the configured policy.
pub struct AccessPolicyFactory;

impl AccessPolicyFactory {
    /// Descriptor granting full access to every local principal.
    pub fn everyone() -> ShmResult<SecurityDescriptor> {
        Self::build(AccessPolicy::Everyone)
    }

    /// Descriptor for the given policy.
    pub fn build(policy: AccessPolicy) -> ShmResult<SecurityDescriptor> {
        let principals: &[Principal] = match policy {
            AccessPolicy::Everyone => &[Principal::Everyone],
            AccessPolicy::Group => &[Principal::Owner, Principal::Group],
            AccessPolicy::Owner => &[Principal::Owner],
        };

        let entries = principals
            .iter()
            .map(|&principal| AccessEntry {
                principal,
                rights: AccessRights::FULL,
            })
            .collect();

        let descriptor = SecurityDescriptor::with_acl(AccessList::from_entries(entries)?)?;
        tracing::debug!(
            "Built access descriptor for {:?} policy (mode {:o})",
            policy,
            descriptor.mode().bits()
        );
        Ok(descriptor)
    }
}
