//! Thin wrappers over the system calls the stream layer needs.

use std::io;

use super::transport::LockMode;

#[cfg(unix)]
pub type RawFd = std::os::unix::io::RawFd;
#[cfg(not(unix))]
pub type RawFd = i32;

/// Wait until any of `fds` is readable. A negative timeout waits forever.
///
/// Returns one flag per descriptor. Hang-up and error conditions count as
/// readable: the following read reports them.
#[cfg(unix)]
pub fn poll_readable(
    fds: &[RawFd],
    timeout_ms: i32,
) -> io::Result<Vec<bool>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();
    // SAFETY: `pollfds` is a live, correctly sized array of pollfd records.
    let rc = unsafe {
        libc::poll(
            pollfds.as_mut_ptr(),
            pollfds.len() as libc::nfds_t,
            timeout_ms,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    let ready = libc::POLLIN | libc::POLLHUP | libc::POLLERR;
    Ok(pollfds.iter().map(|p| p.revents & ready != 0).collect())
}

#[cfg(not(unix))]
pub fn poll_readable(
    fds: &[RawFd],
    _timeout_ms: i32,
) -> io::Result<Vec<bool>> {
    Ok(vec![true; fds.len()])
}

/// Take an advisory lock on a whole file.
#[cfg(unix)]
pub fn flock(
    fd: RawFd,
    mode: LockMode,
    wait: bool,
) -> io::Result<()> {
    let mut op = match mode {
        LockMode::None => return Ok(()),
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    };
    if !wait {
        op |= libc::LOCK_NB;
    }
    loop {
        // SAFETY: flock only inspects the descriptor.
        if unsafe { libc::flock(fd, op) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
pub fn flock(
    _fd: RawFd,
    mode: LockMode,
    _wait: bool,
) -> io::Result<()> {
    match mode {
        LockMode::None => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file locking is not supported on this platform",
        )),
    }
}

#[cfg(unix)]
pub fn set_close_on_exec(
    fd: RawFd,
    on: bool,
) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor we own, with integer arguments only.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        let flags = if on {
            flags | libc::FD_CLOEXEC
        } else {
            flags & !libc::FD_CLOEXEC
        };
        if libc::fcntl(fd, libc::F_SETFD, flags) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn set_close_on_exec(
    _fd: RawFd,
    _on: bool,
) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "close_on_exec is not supported on this platform",
    ))
}

#[cfg(unix)]
pub fn close_on_exec(fd: RawFd) -> io::Result<bool> {
    // SAFETY: see `set_close_on_exec`.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags & libc::FD_CLOEXEC != 0)
}

#[cfg(not(unix))]
pub fn close_on_exec(_fd: RawFd) -> io::Result<bool> {
    Ok(false)
}

#[cfg(unix)]
pub fn is_tty(fd: RawFd) -> bool {
    // SAFETY: isatty only inspects the descriptor.
    unsafe { libc::isatty(fd) == 1 }
}

#[cfg(not(unix))]
pub fn is_tty(_fd: RawFd) -> bool {
    false
}
