//! Frame sources: anything that can hand over one [`crate::config::TRANSPORT_SIZE`] transport
//! buffer at a time.
//!
//! [`HidrawSource`] is grounded on `ratbagd-rs`'s `DeviceIo` (open-a-hidraw-node-and-read-fixed-
//! size-reports pattern, including the `HIDIOCSFEATURE` ioctl helper for enabling the heatmap
//! feature report), adapted to a blocking read loop since this driver has no async runtime.
//! [`ReplayFileSource`] exists so the rest of the pipeline can be exercised against a captured
//! transport log without real hardware.

use std::io::{Read, Seek, SeekFrom};

use crate::config::TRANSPORT_SIZE;
use crate::error::SourceError;

/// Something that can deliver one fixed-size transport buffer at a time.
pub trait FrameSource {
    /// Fill `buf` with exactly one transport buffer's worth of bytes.
    ///
    /// # Errors
    /// Returns [`SourceError`] if the underlying read failed or could not be completed even after
    /// whatever recovery the source attempts internally.
    fn read_frame(&mut self, buf: &mut [u8; TRANSPORT_SIZE]) -> Result<(), SourceError>;
}

/// Replays a captured transport log from a file, one [`TRANSPORT_SIZE`] chunk at a time.
///
/// On reaching a position where fewer than `TRANSPORT_SIZE` bytes remain, rewinds to the start of
/// the file and retries exactly once -- this lets a short capture loop indefinitely for manual
/// testing, while still surfacing [`SourceError::ShortRead`] for a file that is pathologically
/// shorter than one transport buffer even from the start.
pub struct ReplayFileSource {
    file: std::fs::File,
}

impl ReplayFileSource {
    /// # Errors
    /// Returns an I/O error if `path` could not be opened.
    pub fn open(path: &std::path::Path) -> std::io::Result<Self> {
        Ok(Self {
            file: std::fs::File::open(path)?,
        })
    }

    fn read_one(&mut self, buf: &mut [u8; TRANSPORT_SIZE]) -> Result<(), SourceError> {
        let mut got = 0;
        while got < TRANSPORT_SIZE {
            let n = self.file.read(&mut buf[got..])?;
            if n == 0 {
                break;
            }
            got += n;
        }
        if got == TRANSPORT_SIZE {
            Ok(())
        } else {
            Err(SourceError::ShortRead {
                got,
                expected: TRANSPORT_SIZE,
            })
        }
    }
}

impl FrameSource for ReplayFileSource {
    fn read_frame(&mut self, buf: &mut [u8; TRANSPORT_SIZE]) -> Result<(), SourceError> {
        match self.read_one(buf) {
            Ok(()) => Ok(()),
            Err(SourceError::ShortRead { .. }) => {
                self.file.seek(SeekFrom::Start(0))?;
                self.read_one(buf)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(feature = "hidraw")]
pub mod hidraw {
    //! Reading transport buffers directly from a `/dev/hidraw*` node.

    use std::io::Read;
    use std::os::unix::io::AsRawFd;

    use nix::libc;

    use super::FrameSource;
    use crate::config::TRANSPORT_SIZE;
    use crate::error::SourceError;

    /// `HIDIOCSFEATURE(len)`, per Linux's `hidraw.h`: `_IOC(_IOC_READ|_IOC_WRITE, 'H', 0x06, len)`.
    fn hid_set_feature_req(len: usize) -> libc::c_ulong {
        let ioc_readwrite: libc::c_ulong = 3;
        let ioc_type: libc::c_ulong = b'H' as libc::c_ulong;
        let ioc_nr: libc::c_ulong = 0x06;
        (ioc_readwrite << 30) | (ioc_type << 8) | ioc_nr | ((len as libc::c_ulong) << 16)
    }

    /// Feature report that switches the touch controller into heatmap-reporting mode. The report
    /// ID and payload are fixed by the hardware's HID descriptor, not configurable here.
    const ENABLE_HEATMAP_FEATURE: [u8; 2] = [0x01, 0x01];

    /// A `/dev/hidraw*` node opened for blocking reads of fixed-size transport buffers.
    pub struct HidrawSource {
        file: std::fs::File,
    }

    impl HidrawSource {
        /// Open `path` and enable heatmap reporting via `HIDIOCSFEATURE`.
        ///
        /// # Errors
        /// Returns [`SourceError::Io`] if the node could not be opened or the feature report
        /// ioctl failed.
        pub fn open(path: &std::path::Path) -> Result<Self, SourceError> {
            let file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;

            let mut report = ENABLE_HEATMAP_FEATURE;
            let req = hid_set_feature_req(report.len());
            // SAFETY: `req` encodes the correct direction/size for a `report.len()`-byte buffer,
            // and `report` is valid for that length for the duration of the call.
            let rc = unsafe { libc::ioctl(file.as_raw_fd(), req, report.as_mut_ptr()) };
            if rc < 0 {
                return Err(SourceError::Io(std::io::Error::last_os_error()));
            }

            Ok(Self { file })
        }
    }

    impl FrameSource for HidrawSource {
        fn read_frame(&mut self, buf: &mut [u8; TRANSPORT_SIZE]) -> Result<(), SourceError> {
            let mut got = 0;
            while got < TRANSPORT_SIZE {
                let n = self.file.read(&mut buf[got..])?;
                if n == 0 {
                    return Err(SourceError::ShortRead {
                        got,
                        expected: TRANSPORT_SIZE,
                    });
                }
                got += n;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_frames(path: &std::path::Path, frames: &[[u8; TRANSPORT_SIZE]]) {
        let mut f = std::fs::File::create(path).unwrap();
        for frame in frames {
            f.write_all(frame).unwrap();
        }
    }

    #[test]
    fn reads_successive_frames() {
        let dir = std::env::temp_dir();
        let path = dir.join("iptsd_test_reads_successive_frames.bin");
        let a = [1u8; TRANSPORT_SIZE];
        let b = [2u8; TRANSPORT_SIZE];
        write_frames(&path, &[a, b]);

        let mut src = ReplayFileSource::open(&path).unwrap();
        let mut buf = [0u8; TRANSPORT_SIZE];
        src.read_frame(&mut buf).unwrap();
        assert_eq!(buf, a);
        src.read_frame(&mut buf).unwrap();
        assert_eq!(buf, b);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rewinds_and_loops_at_eof() {
        let dir = std::env::temp_dir();
        let path = dir.join("iptsd_test_rewinds_and_loops_at_eof.bin");
        let a = [7u8; TRANSPORT_SIZE];
        write_frames(&path, &[a]);

        let mut src = ReplayFileSource::open(&path).unwrap();
        let mut buf = [0u8; TRANSPORT_SIZE];
        src.read_frame(&mut buf).unwrap();
        assert_eq!(buf, a);
        // Second read runs past EOF, rewinds, and re-reads the same single frame.
        src.read_frame(&mut buf).unwrap();
        assert_eq!(buf, a);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn pathologically_short_file_is_short_read() {
        let dir = std::env::temp_dir();
        let path = dir.join("iptsd_test_pathologically_short_file.bin");
        std::fs::write(&path, [0u8; 10]).unwrap();

        let mut src = ReplayFileSource::open(&path).unwrap();
        let mut buf = [0u8; TRANSPORT_SIZE];
        let err = src.read_frame(&mut buf).unwrap_err();
        assert!(matches!(err, SourceError::ShortRead { .. }));

        let _ = std::fs::remove_file(&path);
    }
}
