/// Host power-off after a completed destruct run
use std::io;

/// Flush filesystem buffers and power the machine off. Only returns on failure.
#[cfg(target_os = "linux")]
pub fn power_off() -> io::Result<()> {
    use nix::sys::reboot::{reboot, RebootMode};

    log::warn!("Syncing filesystems and powering off");
    nix::unistd::sync();

    match reboot(RebootMode::RB_POWER_OFF) {
        Ok(never) => match never {},
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn power_off() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "power-off is only supported on Linux",
    ))
}
