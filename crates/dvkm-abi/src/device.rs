//! The DVKM proc entry as a [`DeviceOpener`].

use std::ffi::{CString, c_int};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use dvkm_core::{ControlStatus, DeviceChannel, DeviceOpener, Request};

use crate::wire::{DvkmObj, request_code};

/// Opens device paths with `open(path, O_RDWR | O_CLOEXEC)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcDevice;

impl DeviceOpener for ProcDevice {
    type Channel = DeviceFd;

    fn open(&self, path: &Path) -> io::Result<DeviceFd> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(DeviceFd { fd })
    }
}

/// An open device descriptor. Closed by [`DeviceChannel::close`], or on drop.
#[derive(Debug)]
pub struct DeviceFd {
    fd: c_int,
}

impl DeviceFd {
    #[must_use]
    pub fn raw_fd(&self) -> c_int {
        self.fd
    }
}

impl DeviceChannel for DeviceFd {
    fn submit(&mut self, request: &Request<'_>) -> ControlStatus {
        let mut obj = DvkmObj::from_request(request);
        let code = request_code(request.operation);
        // SAFETY: obj lives across the call and `data` points into the caller's
        // input region, which outlives the request. The kernel reads obj and
        // then whatever `datasize` says; that overread is the fault being probed.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_ioctl,
                self.fd,
                libc::c_ulong::from(code.raw()),
                &mut obj as *mut DvkmObj,
            )
        };
        let ret = ret as i32;
        if ret < 0 {
            let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
            ControlStatus::with_errno(ret, errno)
        } else {
            ControlStatus::returned(ret)
        }
    }

    fn close(self) -> io::Result<()> {
        let fd = self.fd;
        std::mem::forget(self);
        // SAFETY: fd was returned by open and ownership ends here; Drop will not run.
        if unsafe { libc::close(fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for DeviceFd {
    fn drop(&mut self) {
        // SAFETY: fd is still owned; close errors are unreportable from drop.
        unsafe {
            libc::close(self.fd);
        }
    }
}
