//! The device event loop.
//!
//! Reads records from the control channel one at a time and mirrors them
//! into the device node tree:
//!
//! ```text
//! control channel ──> DeviceEventLoop ──> NamingRules (kind, major)
//!                            │
//!                            ├──> FamilyRegistry (reserve / commit / release suffix)
//!                            │
//!                            └──> DeviceNodeOps (mknod, chown, symlink, unlink)
//! ```
//!
//! Processing is strictly sequential: one record is fully handled, including
//! every filesystem side effect, before the next is read. A failure while
//! handling one record is logged and counted; only a broken channel ends
//! [`DeviceEventLoop::run`].
//!
//! # Known limitation
//!
//! State lives only in memory. After a restart, removals of devices
//! registered by the previous process fail with `NotFound`, and the existing
//! tree is not reconciled.

use alloc::string::String;

use axerrno::{AxError, AxResult, ax_err};

use crate::config::DevMapConfig;
use crate::device::{
    DeviceIdentity, DeviceNodeType, MajorNumber, MinorNumber, join_path, lookup_link_path,
};
use crate::event::{DeviceEvent, DeviceEventState, read_event};
use crate::family::DeviceNodeFamily;
use crate::naming::DeviceNodeMatch;
use crate::ops::{DeviceEventSource, DeviceNodeOps};
use crate::pluggable::{PluggableOnceCharacterDeviceNodeMatch, find_pluggable_once};
use crate::registry::FamilyRegistry;

/// How one record was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The record named the control channel itself.
    ControlChannel,
    /// A pluggable-once node was created.
    PluggableOnce,
    /// A node was registered.
    Registered,
    /// A node was unregistered.
    Unregistered,
    /// No naming rule covers the device.
    Unnamed,
    /// The state value is not handled.
    UnknownState(u32),
    /// Handling failed; the error was logged.
    Failed(AxError),
}

/// Counters over the lifetime of a loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventLoopStats {
    /// Records read from the channel or handed to `handle_event`.
    pub events: u64,
    /// Nodes created through a naming rule.
    pub registered: u64,
    /// Nodes removed.
    pub unregistered: u64,
    /// Pluggable-once nodes created.
    pub pluggable_once: u64,
    /// Records skipped: control channel, unnamed devices, unknown states.
    pub ignored: u64,
    /// Records whose handling failed.
    pub failures: u64,
}

/// Mirrors kernel device events into a device node tree.
pub struct DeviceEventLoop<O: DeviceNodeOps> {
    config: DevMapConfig,
    registry: FamilyRegistry,
    ops: O,
    stats: EventLoopStats,
}

impl<O: DeviceNodeOps> DeviceEventLoop<O> {
    /// Creates a loop publishing nodes through `ops`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: DevMapConfig, ops: O) -> AxResult<Self> {
        config.validate()?;
        let registry = FamilyRegistry::new(config.suffix_capacity);
        Ok(Self {
            config,
            registry,
            ops,
            stats: EventLoopStats::default(),
        })
    }

    /// The configuration in use.
    #[inline]
    pub fn config(&self) -> &DevMapConfig {
        &self.config
    }

    /// The filesystem backend.
    #[inline]
    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// The filesystem backend, mutably.
    #[inline]
    pub fn ops_mut(&mut self) -> &mut O {
        &mut self.ops
    }

    /// Counters so far.
    #[inline]
    pub fn stats(&self) -> &EventLoopStats {
        &self.stats
    }

    /// All families created so far.
    pub fn families(&self) -> &[DeviceNodeFamily] {
        self.registry.families()
    }

    /// The family of `kind`/`major`, if one was created.
    pub fn family(&self, kind: DeviceNodeType, major: MajorNumber) -> Option<&DeviceNodeFamily> {
        self.registry.find(kind, major)
    }

    fn lookup_link(&self, identity: &DeviceIdentity) -> String {
        lookup_link_path(&self.config.lookup_root, identity)
    }

    /// Creates, owns and links the node for a newly inserted device.
    ///
    /// Devices without a naming rule are accepted without any effect.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the minor is already registered in the family
    /// - `StorageFull` if the family has no free suffix
    /// - `InvalidData` if the rule's permission group does not exist
    /// - any error from the filesystem backend
    ///
    /// On error the suffix is not left in use, and nodes created by this call
    /// are unlinked again.
    pub fn register_device(
        &mut self,
        kind: DeviceNodeType,
        major: MajorNumber,
        minor: MinorNumber,
    ) -> AxResult {
        let Some(rule) = self.config.naming_rules.find(kind, major).copied() else {
            trace!("no naming rule for {:?} major {}", kind, major);
            return Ok(());
        };
        let identity = DeviceIdentity { kind, major, minor };
        let link = self.lookup_link(&identity);

        let family = self.registry.get_or_create(&rule);
        if let Some(existing) = family.node(minor) {
            warn!(
                "{}: minor {} already registered at {}",
                rule.family_type_literal,
                minor,
                existing.device_path()
            );
            return ax_err!(AlreadyExists, "device minor already registered");
        }

        let reservation = family.reserve_suffix()?;
        let path = match rule.render_path(reservation.index()) {
            Ok(relative) => join_path(&self.config.device_root, &relative),
            Err(e) => {
                family.rollback_suffix(reservation);
                return Err(e);
            }
        };

        if let Err(e) = publish_node(
            &mut self.ops,
            &rule,
            self.config.node_owner_uid,
            &identity,
            &path,
            &link,
        ) {
            family.rollback_suffix(reservation);
            return Err(e);
        }

        let index = reservation.index();
        family.commit_node(reservation, path.clone(), minor)?;
        info!(
            "{}: {} -> {} (suffix {})",
            rule.family_type_literal, identity, path, index
        );
        Ok(())
    }

    /// Removes the node and lookup link of a device that went away.
    ///
    /// Devices without a naming rule are accepted without any effect.
    ///
    /// # Errors
    ///
    /// - `NotFound` ("no such device") if no family or node is registered
    ///   for the device, e.g. after a restart
    /// - any error from the filesystem backend
    ///
    /// A node or link that is already missing counts as removed. Once the
    /// node is unlinked the device is unregistered, even if removing the
    /// link then fails with another error.
    pub fn unregister_device(
        &mut self,
        kind: DeviceNodeType,
        major: MajorNumber,
        minor: MinorNumber,
    ) -> AxResult {
        if self.config.naming_rules.find(kind, major).is_none() {
            trace!("no naming rule for {:?} major {}", kind, major);
            return Ok(());
        }
        let identity = DeviceIdentity { kind, major, minor };
        let link = self.lookup_link(&identity);

        let Some(family) = self.registry.find_mut(kind, major) else {
            return ax_err!(NotFound, "no such device: family never registered");
        };
        let Some(node) = family.node(minor) else {
            return ax_err!(NotFound, "no such device: minor not registered");
        };

        unlink_existing(&mut self.ops, node.device_path())?;
        let link_result = unlink_existing(&mut self.ops, &link);

        // The node is gone, so the entry must go too, even if the link lingers.
        if let Some(node) = family.remove_node(minor) {
            info!(
                "{}: {} removed from {} (suffix {} free)",
                family.family_type_literal(),
                identity,
                node.device_path(),
                node.suffix_index()
            );
        }
        link_result
    }

    /// Creates the fixed node of a pluggable-once device.
    ///
    /// Seeing the same device again simply repeats the creation; whether that
    /// succeeds is up to the backend.
    pub fn create_pluggable_once_node(
        &mut self,
        entry: &PluggableOnceCharacterDeviceNodeMatch,
    ) -> AxResult {
        let path = join_path(&self.config.device_root, entry.path);
        self.ops.create_node(
            DeviceNodeType::Character,
            &path,
            entry.mode,
            entry.major,
            entry.minor,
        )?;
        info!("pluggable-once {}:{} -> {}", entry.major, entry.minor, path);
        Ok(())
    }

    fn dispatch(&mut self, event: &DeviceEvent) -> AxResult<EventOutcome> {
        let Some(state) = event.state() else {
            return Ok(EventOutcome::UnknownState(event.state));
        };
        let identity = event.identity()?;

        if state == DeviceEventState::Inserted {
            if let Some(entry) = self.pluggable_entry(&identity) {
                self.create_pluggable_once_node(&entry)?;
                return Ok(EventOutcome::PluggableOnce);
            }
        }
        if self.config.naming_rules.find(identity.kind, identity.major).is_none() {
            debug!("ignoring {}: no naming rule", identity);
            return Ok(EventOutcome::Unnamed);
        }

        match state {
            DeviceEventState::Inserted => {
                self.register_device(identity.kind, identity.major, identity.minor)?;
                Ok(EventOutcome::Registered)
            }
            DeviceEventState::Removed => {
                self.unregister_device(identity.kind, identity.major, identity.minor)?;
                Ok(EventOutcome::Unregistered)
            }
        }
    }

    fn pluggable_entry(
        &self,
        identity: &DeviceIdentity,
    ) -> Option<PluggableOnceCharacterDeviceNodeMatch> {
        if identity.kind != DeviceNodeType::Character {
            return None;
        }
        find_pluggable_once(&self.config.pluggable_once, identity.major, identity.minor).copied()
    }

    fn is_control_channel(&self, event: &DeviceEvent) -> bool {
        let control = &self.config.control_identity;
        event.major_number == control.major.value()
            && event.minor_number == control.minor.value()
            && event.is_block_device == u32::from(control.kind == DeviceNodeType::Block)
    }

    /// Handles one decoded record.
    ///
    /// Failures are logged and reported as [`EventOutcome::Failed`]; they never
    /// stop the loop.
    pub fn handle_event(&mut self, event: &DeviceEvent) -> EventOutcome {
        self.stats.events += 1;
        if self.is_control_channel(event) {
            self.stats.ignored += 1;
            return EventOutcome::ControlChannel;
        }

        match self.dispatch(event) {
            Ok(outcome) => {
                match outcome {
                    EventOutcome::PluggableOnce => self.stats.pluggable_once += 1,
                    EventOutcome::Registered => self.stats.registered += 1,
                    EventOutcome::Unregistered => self.stats.unregistered += 1,
                    EventOutcome::UnknownState(raw) => {
                        warn!("unhandled device event state {:#x}", raw);
                        self.stats.ignored += 1;
                    }
                    _ => self.stats.ignored += 1,
                }
                outcome
            }
            Err(e) => {
                let action = match event.state() {
                    Some(DeviceEventState::Inserted) => "registering",
                    _ => "unregistering",
                };
                error!(
                    "{} device {}:{} (block={}) failed: {:?}",
                    action, event.major_number, event.minor_number, event.is_block_device, e
                );
                self.stats.failures += 1;
                EventOutcome::Failed(e)
            }
        }
    }

    /// Reads and handles one record.
    pub fn process_next<S: DeviceEventSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> AxResult<EventOutcome> {
        let event = read_event(source)?;
        Ok(self.handle_event(&event))
    }

    /// Drains the control channel forever.
    ///
    /// Returns only when reading fails: a short record, a closed channel, or
    /// an I/O error.
    pub fn run<S: DeviceEventSource + ?Sized>(&mut self, source: &mut S) -> AxResult {
        loop {
            self.process_next(source)?;
        }
    }
}

/// Creates the node, applies its group and links it from the lookup tree.
///
/// Whatever this call created is removed again if a later step fails.
fn publish_node<O: DeviceNodeOps>(
    ops: &mut O,
    rule: &DeviceNodeMatch,
    owner_uid: u32,
    identity: &DeviceIdentity,
    path: &str,
    link: &str,
) -> AxResult {
    ops.create_node(
        identity.kind,
        path,
        rule.create_mode,
        identity.major,
        identity.minor,
    )?;

    let result = apply_permission_group(ops, rule, owner_uid, path)
        .and_then(|()| ops.symlink(path, link));
    if result.is_err() {
        if let Err(e) = ops.unlink(path) {
            warn!("could not remove {} after failed registration: {:?}", path, e);
        }
    }
    result
}

/// Unlinks `path`, treating a missing file as already removed.
fn unlink_existing<O: DeviceNodeOps>(ops: &mut O, path: &str) -> AxResult {
    match ops.unlink(path) {
        Err(AxError::NotFound) => {
            warn!("{} was already removed", path);
            Ok(())
        }
        result => result,
    }
}

fn apply_permission_group<O: DeviceNodeOps>(
    ops: &mut O,
    rule: &DeviceNodeMatch,
    owner_uid: u32,
    path: &str,
) -> AxResult {
    let Some(group) = rule.permission_group else {
        return Ok(());
    };
    let Some(gid) = ops.resolve_group(group)? else {
        error!("permission group {:?} of {} does not exist", group, rule.family_type_literal);
        return ax_err!(InvalidData, "permission group of naming rule does not exist");
    };
    ops.chown(path, owner_uid, gid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec::Vec;

    #[derive(Default)]
    struct RecordingOps {
        calls: Vec<String>,
        fail_symlink: bool,
    }

    impl DeviceNodeOps for RecordingOps {
        fn create_node(
            &mut self,
            kind: DeviceNodeType,
            path: &str,
            mode: u32,
            major: MajorNumber,
            minor: MinorNumber,
        ) -> AxResult {
            self.calls
                .push(format!("mknod {} {:?} {:o} {}:{}", path, kind, mode, major, minor));
            Ok(())
        }

        fn resolve_group(&mut self, name: &str) -> AxResult<Option<u32>> {
            Ok((name == "tty").then_some(5))
        }

        fn chown(&mut self, path: &str, uid: u32, gid: u32) -> AxResult {
            self.calls.push(format!("chown {} {}:{}", path, uid, gid));
            Ok(())
        }

        fn symlink(&mut self, target: &str, link: &str) -> AxResult {
            if self.fail_symlink {
                return ax_err!(PermissionDenied);
            }
            self.calls.push(format!("symlink {} {}", link, target));
            Ok(())
        }

        fn unlink(&mut self, path: &str) -> AxResult {
            self.calls.push(format!("unlink {}", path));
            Ok(())
        }
    }

    fn event_loop() -> DeviceEventLoop<RecordingOps> {
        DeviceEventLoop::new(DevMapConfig::default(), RecordingOps::default()).unwrap()
    }

    fn inserted(kind: DeviceNodeType, major: u32, minor: u32) -> DeviceEvent {
        DeviceEvent::new(DeviceIdentity::new(kind, major, minor), DeviceEventState::Inserted)
    }

    #[test]
    fn test_register_tty_node() {
        let mut devmap = event_loop();
        devmap
            .register_device(DeviceNodeType::Character, MajorNumber(4), MinorNumber(64))
            .unwrap();

        assert_eq!(
            devmap.ops().calls,
            [
                "mknod /dev/ttyS0 Character 620 4:64",
                "chown /dev/ttyS0 0:5",
                "symlink /tmp/system/devicemap/nodes/char/4/64 /dev/ttyS0",
            ]
        );
        let family = devmap
            .family(DeviceNodeType::Character, MajorNumber(4))
            .unwrap();
        assert_eq!(family.node(MinorNumber(64)).unwrap().suffix_index(), 0);
    }

    #[test]
    fn test_missing_group_rolls_back() {
        let mut devmap = event_loop();
        // `audio` is not resolvable by the recording backend.
        let err = devmap
            .register_device(DeviceNodeType::Character, MajorNumber(116), MinorNumber(0))
            .unwrap_err();
        assert_eq!(err, AxError::InvalidData);
        assert_eq!(
            devmap.ops().calls,
            ["mknod /dev/audio/0 Character 220 116:0", "unlink /dev/audio/0"]
        );

        let family = devmap
            .family(DeviceNodeType::Character, MajorNumber(116))
            .unwrap();
        assert_eq!(family.node_count(), 0);
        assert_eq!(family.allocation_map().allocated_count(), 0);
        assert_eq!(family.allocation_map().reserved_count(), 0);
    }

    #[test]
    fn test_symlink_failure_rolls_back() {
        let mut devmap = event_loop();
        devmap.ops_mut().fail_symlink = true;
        let outcome = devmap.handle_event(&inserted(DeviceNodeType::Character, 28, 3));
        assert_eq!(outcome, EventOutcome::Failed(AxError::PermissionDenied));
        assert_eq!(devmap.stats().failures, 1);

        devmap.ops_mut().fail_symlink = false;
        devmap.ops_mut().calls.clear();
        assert_eq!(
            devmap.handle_event(&inserted(DeviceNodeType::Character, 28, 3)),
            EventOutcome::Registered
        );
        assert_eq!(devmap.ops().calls[0], "mknod /dev/gpu/render0 Character 666 28:3");
    }

    #[test]
    fn test_unregister_without_family() {
        let mut devmap = event_loop();
        let err = devmap
            .unregister_device(DeviceNodeType::Block, MajorNumber(3), MinorNumber(0))
            .unwrap_err();
        assert_eq!(err, AxError::NotFound);
        assert!(devmap.ops().calls.is_empty());
        assert!(devmap.families().is_empty());
    }

    #[test]
    fn test_unnamed_and_control_events_ignored() {
        let mut devmap = event_loop();
        assert_eq!(
            devmap.handle_event(&inserted(DeviceNodeType::Character, 2, 10)),
            EventOutcome::ControlChannel
        );
        assert_eq!(
            devmap.handle_event(&inserted(DeviceNodeType::Block, 200, 0)),
            EventOutcome::Unnamed
        );
        let mut unknown = inserted(DeviceNodeType::Character, 28, 0);
        unknown.state = 9;
        assert_eq!(devmap.handle_event(&unknown), EventOutcome::UnknownState(9));

        assert!(devmap.ops().calls.is_empty());
        assert_eq!(devmap.stats().events, 3);
        assert_eq!(devmap.stats().ignored, 3);
    }

    #[test]
    fn test_pluggable_once() {
        let mut devmap = event_loop();
        for _ in 0..2 {
            assert_eq!(
                devmap.handle_event(&inserted(DeviceNodeType::Character, 1, 10)),
                EventOutcome::PluggableOnce
            );
        }
        assert_eq!(
            devmap.ops().calls,
            [
                "mknod /dev/beep Character 666 1:10",
                "mknod /dev/beep Character 666 1:10",
            ]
        );
        assert!(devmap.families().is_empty());
        assert_eq!(devmap.stats().pluggable_once, 2);
    }

    #[test]
    fn test_process_next_short_record() {
        let mut devmap = event_loop();
        let bytes = [0u8; 8];
        let mut source: &[u8] = &bytes;
        assert_eq!(devmap.process_next(&mut source).unwrap_err(), AxError::UnexpectedEof);
        assert_eq!(devmap.stats().events, 0);
    }
}
