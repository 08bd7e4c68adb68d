// src/rtmp/poller.rs - Zero-timeout readiness check for the publishing socket
//
// One socket, one question: is there inbound data right now?
// - Unix: poll(2) via libc
// - Windows: WSAPoll
//
// Design principles:
// - Never blocks, timeout is always 0
// - EINTR auto-retry
// - Hangup and error count as readable, so the following read surfaces them

use std::io;

#[cfg(unix)]
pub type RawHandle = std::os::unix::io::RawFd;
#[cfg(windows)]
pub type RawHandle = std::os::windows::io::RawSocket;

#[cfg(unix)]
pub fn poll_readable(fd: RawHandle) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        // SAFETY: poll() requires:
        // - &mut pollfd points to one valid, writable pollfd (nfds = 1)
        // - fd is owned by the caller's TcpStream and stays open for the call
        // - timeout 0 makes the call return immediately
        let ret = unsafe { libc::poll(&mut pollfd, 1, 0) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(ret > 0 && pollfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0);
    }
}

#[cfg(windows)]
mod windows {
    use super::*;

    const POLLRDNORM: i16 = 0x0100;
    const POLLERR: i16 = 0x0001;
    const POLLHUP: i16 = 0x0002;

    #[repr(C)]
    struct WSAPollFd {
        fd: RawHandle,
        events: i16,
        revents: i16,
    }

    /// # Safety
    ///
    /// `fds` must point to `nfds` valid `WSAPollFd` entries whose sockets stay
    /// open for the duration of the call. Winsock is initialised by std when the
    /// socket was created.
    #[link(name = "ws2_32")]
    extern "system" {
        fn WSAPoll(fds: *mut WSAPollFd, nfds: u32, timeout: i32) -> i32;
        fn WSAGetLastError() -> i32;
    }

    pub fn poll_readable(socket: RawHandle) -> io::Result<bool> {
        let mut pollfd = WSAPollFd {
            fd: socket,
            events: POLLRDNORM,
            revents: 0,
        };
        // SAFETY: WSAPoll requires:
        // - &mut pollfd points to one valid, writable WSAPollFd (nfds = 1)
        // - the socket is owned by the caller's TcpStream and stays open
        // - timeout 0 makes the call return immediately
        let ret = unsafe { WSAPoll(&mut pollfd, 1, 0) };
        if ret < 0 {
            // SAFETY: WSAGetLastError reads thread-local state, no preconditions
            let code = unsafe { WSAGetLastError() };
            return Err(io::Error::from_raw_os_error(code));
        }
        Ok(ret > 0 && pollfd.revents & (POLLRDNORM | POLLHUP | POLLERR) != 0)
    }
}

#[cfg(windows)]
pub use windows::poll_readable;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_poll_readable_reflects_pending_data() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        assert!(!poll_readable(client.as_raw_fd()).unwrap());

        server.write_all(&[1, 2, 3]).unwrap();
        server.flush().unwrap();
        let mut ready = false;
        for _ in 0..100 {
            if poll_readable(client.as_raw_fd()).unwrap() {
                ready = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(ready);
    }

    #[test]
    fn test_hangup_counts_as_readable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        drop(server);

        let mut ready = false;
        for _ in 0..100 {
            if poll_readable(client.as_raw_fd()).unwrap() {
                ready = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(ready);
    }
}
