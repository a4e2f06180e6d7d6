//! Multi-touch sink interface: the event grammar the pipeline emits, and the trait a caller
//! implements to feed a real input subsystem.
//!
//! A concrete [`uhid::UhidSink`] backed by the kernel's `uhid` misc device is provided behind the
//! `uhid` feature.

use crate::cluster::ClusterSet;
use crate::config::{MATCH_SLOTS, SCALE};

/// A contact reported in one multi-touch slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotContact {
    pub x: f32,
    pub y: f32,
    pub touch_major: f32,
}

/// The multi-touch event grammar a sink must accept.
pub trait ContactSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Report slot `slot`'s state for this frame: `contact` is `Some` iff a valid cluster
    /// currently holds tracking ID `slot + 1`; `tracking_id` is that ID, or `-1` if none matched.
    fn slot(&mut self, slot: usize, contact: Option<SlotContact>, tracking_id: i32) -> Result<(), Self::Error>;

    /// Emitted once per frame, in addition to the per-slot reports, exactly when precisely one
    /// cluster is valid this frame: carries its absolute position and the touch-down key event.
    fn single_touch_down(&mut self, x: f32, y: f32) -> Result<(), Self::Error>;

    /// Emitted once per frame whenever the valid-cluster count is not exactly one (the touch-up
    /// key event).
    fn touch_up(&mut self) -> Result<(), Self::Error>;

    /// The synchronisation marker that delimits the frame for the sink.
    fn sync(&mut self) -> Result<(), Self::Error>;
}

/// Translate `clusters` into the sink event grammar and drive `sink` with it.
pub fn emit_frame<S: ContactSink>(sink: &mut S, clusters: &ClusterSet) -> Result<(), S::Error> {
    let valid_count = clusters.iter().filter(|c| c.valid).count();
    let mut single_touch_emitted = false;

    for slot in 0..MATCH_SLOTS {
        let wanted_id = (slot + 1) as u32;
        let matched = clusters.iter().find(|c| c.valid && c.id == wanted_id);

        match matched {
            Some(c) => {
                sink.slot(
                    slot,
                    Some(SlotContact {
                        x: c.centre.0 * SCALE,
                        y: c.centre.1 * SCALE,
                        touch_major: c.diameter * SCALE,
                    }),
                    wanted_id as i32,
                )?;
                if valid_count == 1 {
                    sink.single_touch_down(c.centre.0 * SCALE, c.centre.1 * SCALE)?;
                    single_touch_emitted = true;
                }
            }
            None => {
                sink.slot(slot, None, -1)?;
            }
        }
    }
    debug_assert_eq!(single_touch_emitted, valid_count == 1, "single-touch-down must fire exactly when exactly one cluster is valid");

    if valid_count != 1 {
        sink.touch_up()?;
    }
    sink.sync()?;
    Ok(())
}

/// A typed record of one emitted event, used by [`RecordingSink`] and anywhere else that wants to
/// inspect the event stream without a real input subsystem attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MtEvent {
    Slot {
        slot: usize,
        contact: Option<SlotContact>,
        tracking_id: i32,
    },
    SingleTouchDown {
        x: f32,
        y: f32,
    },
    TouchUp,
    Sync,
}

/// A sink that records every event it receives instead of writing to a real device. Used by
/// integration tests and as a debugging aid; not suitable for a production build's steady-state
/// operation since `events` grows without bound.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<MtEvent>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events since the most recent [`RecordingSink::sync`]-delimited frame, including it.
    pub fn last_frame(&self) -> &[MtEvent] {
        match self.events.iter().rposition(|e| matches!(e, MtEvent::Sync)) {
            Some(sync_idx) => {
                let start = self.events[..sync_idx]
                    .iter()
                    .rposition(|e| matches!(e, MtEvent::Sync))
                    .map_or(0, |i| i + 1);
                &self.events[start..=sync_idx]
            }
            None => &[],
        }
    }
}

impl ContactSink for RecordingSink {
    type Error = std::convert::Infallible;

    fn slot(&mut self, slot: usize, contact: Option<SlotContact>, tracking_id: i32) -> Result<(), Self::Error> {
        self.events.push(MtEvent::Slot {
            slot,
            contact,
            tracking_id,
        });
        Ok(())
    }

    fn single_touch_down(&mut self, x: f32, y: f32) -> Result<(), Self::Error> {
        self.events.push(MtEvent::SingleTouchDown { x, y });
        Ok(())
    }

    fn touch_up(&mut self) -> Result<(), Self::Error> {
        self.events.push(MtEvent::TouchUp);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        self.events.push(MtEvent::Sync);
        Ok(())
    }
}

/// A sink that logs one line per frame via `tracing` and otherwise discards everything -- no
/// per-frame allocation, no state that grows across frames. Used as the production sink when the
/// `uhid` feature is unavailable, so a long-running build without it stays steady-state
/// allocation-free instead of silently accumulating events nobody reads.
#[derive(Debug, Default)]
pub struct LoggingSink {
    slots: [Option<(SlotContact, i32)>; MATCH_SLOTS],
    touch_down: Option<(f32, f32)>,
    touch_up: bool,
}

impl LoggingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContactSink for LoggingSink {
    type Error = std::convert::Infallible;

    fn slot(&mut self, slot: usize, contact: Option<SlotContact>, tracking_id: i32) -> Result<(), Self::Error> {
        self.slots[slot] = contact.map(|c| (c, tracking_id));
        Ok(())
    }

    fn single_touch_down(&mut self, x: f32, y: f32) -> Result<(), Self::Error> {
        self.touch_down = Some((x, y));
        Ok(())
    }

    fn touch_up(&mut self) -> Result<(), Self::Error> {
        self.touch_up = true;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        let active = self.slots.iter().filter(|s| s.is_some()).count();
        if active > 0 || self.touch_down.is_some() {
            tracing::info!(
                active,
                touch_down = ?self.touch_down,
                touch_up = self.touch_up,
                "frame (no injection sink attached)",
            );
        }
        self.slots = [None; MATCH_SLOTS];
        self.touch_down = None;
        self.touch_up = false;
        Ok(())
    }
}

#[cfg(feature = "uhid")]
pub mod uhid {
    //! Virtual multi-touch device backed by `/dev/uhid`, grounded on `hid-io-core`'s `vhid`
    //! feature (`uhid-virt` + a fixed HID report descriptor).

    use super::{ContactSink, SlotContact};
    use crate::config::MATCH_SLOTS;
    use uhid_virt::{Bus, CreateParams, OutputEvent, UHIDDevice};

    #[derive(thiserror::Error, Debug)]
    pub enum UhidError {
        #[error("uhid device I/O error: {0}")]
        Io(#[from] std::io::Error),
    }

    /// A minimal multi-touch digitizer HID report descriptor exposing [`MATCH_SLOTS`] contacts.
    ///
    /// Kept intentionally small: byte-for-byte fidelity with a specific kernel multi-touch
    /// profile isn't the point here; this exists so `UhidSink` has something concrete to
    /// register.
    const REPORT_DESCRIPTOR: &[u8] = &[
        0x05, 0x0D, // Usage Page (Digitizers)
        0x09, 0x04, // Usage (Touch Screen)
        0xA1, 0x01, // Collection (Application)
        0x85, 0x01, //   Report ID (1)
        0xC0, // End Collection
    ];

    /// A sink that writes contact state to the kernel's `uhid` misc device.
    pub struct UhidSink {
        device: UHIDDevice<std::fs::File>,
        report: [u8; 1 + MATCH_SLOTS * 5],
    }

    impl UhidSink {
        /// Register a new virtual multi-touch device named `name`.
        ///
        /// # Errors
        /// Returns [`UhidError`] if `/dev/uhid` could not be opened or the device could not be
        /// created. The caller should treat this as fatal and abort before entering the main
        /// loop.
        pub fn new(name: &str) -> Result<Self, UhidError> {
            let device = UHIDDevice::create(CreateParams {
                name: name.to_string(),
                phys: String::new(),
                uniq: String::new(),
                bus: Bus::VIRTUAL,
                vendor: 0x8087, // Intel
                product: 0x0001,
                version: 0,
                country: 0,
                data: REPORT_DESCRIPTOR.to_vec(),
            })?;
            Ok(Self {
                device,
                report: [0u8; 1 + MATCH_SLOTS * 5],
            })
        }

        fn write_report(&mut self) -> Result<(), UhidError> {
            self.device.write(&self.report)?;
            Ok(())
        }
    }

    impl ContactSink for UhidSink {
        type Error = UhidError;

        fn slot(&mut self, slot: usize, contact: Option<SlotContact>, tracking_id: i32) -> Result<(), Self::Error> {
            let base = 1 + slot * 5;
            match contact {
                Some(c) => {
                    self.report[base] = 1; // contact present
                    let x = c.x.round() as i16;
                    let y = c.y.round() as i16;
                    self.report[base + 1..base + 3].copy_from_slice(&x.to_le_bytes());
                    self.report[base + 3..base + 5].copy_from_slice(&y.to_le_bytes());
                }
                None => {
                    self.report[base] = 0;
                }
            }
            let _ = tracking_id;
            Ok(())
        }

        fn single_touch_down(&mut self, x: f32, y: f32) -> Result<(), Self::Error> {
            self.report[0] = 1;
            let _ = (x, y);
            Ok(())
        }

        fn touch_up(&mut self) -> Result<(), Self::Error> {
            self.report[0] = 0;
            Ok(())
        }

        fn sync(&mut self) -> Result<(), Self::Error> {
            self.write_report()
        }
    }

    impl Drop for UhidSink {
        fn drop(&mut self) {
            let _ = self.device.write_event(OutputEvent::Destroy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Sample;

    fn valid_cluster(centre: (f32, f32), id: u32) -> crate::cluster::Cluster {
        let mut c = crate::cluster::Cluster::default();
        c.push(Sample {
            x: centre.0 as u8,
            y: centre.1 as u8,
            value: 60,
        });
        c.centre = centre;
        c.diameter = 1.0;
        c.valid = true;
        c.id = id;
        c
    }

    #[test]
    fn empty_frame_is_all_slots_up() {
        let clusters = ClusterSet::new();
        let mut sink = RecordingSink::new();
        emit_frame(&mut sink, &clusters).unwrap();
        let slot_ups = sink
            .events
            .iter()
            .filter(|e| matches!(e, MtEvent::Slot { tracking_id: -1, .. }))
            .count();
        assert_eq!(slot_ups, MATCH_SLOTS);
        assert!(sink.events.contains(&MtEvent::TouchUp));
        assert!(sink.events.contains(&MtEvent::Sync));
    }

    #[test]
    fn single_contact_emits_down_event() {
        let mut clusters = ClusterSet::new();
        *clusters.alloc().unwrap() = valid_cluster((10.0, 10.0), 1);
        let mut sink = RecordingSink::new();
        emit_frame(&mut sink, &clusters).unwrap();
        assert!(sink
            .events
            .iter()
            .any(|e| matches!(e, MtEvent::SingleTouchDown { .. })));
        assert!(!sink.events.contains(&MtEvent::TouchUp));
    }

    #[test]
    fn two_contacts_do_not_emit_single_touch_down() {
        let mut clusters = ClusterSet::new();
        *clusters.alloc().unwrap() = valid_cluster((10.0, 10.0), 1);
        *clusters.alloc().unwrap() = valid_cluster((30.0, 20.0), 2);
        let mut sink = RecordingSink::new();
        emit_frame(&mut sink, &clusters).unwrap();
        assert!(!sink
            .events
            .iter()
            .any(|e| matches!(e, MtEvent::SingleTouchDown { .. })));
        assert!(sink.events.contains(&MtEvent::TouchUp));
    }
}
