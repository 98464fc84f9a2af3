/// Progress of an in-flight connect.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectPoll {
    Pending,
    Established,
    Failed,
}

/// Non-blocking byte stream to one peer.
///
/// `begin_connect` only starts the attempt; completion is observed through
/// `poll_connect` on later passes. `read` and `write` must never wait.
pub trait Transport {
    type Error: core::fmt::Debug;

    fn begin_connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;
    fn poll_connect(&mut self) -> ConnectPoll;
    fn connected(&self) -> bool;
    fn available(&self) -> usize;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
    fn close(&mut self);
}

/// Transport for builds without networking. Every connect fails.
#[derive(Default, Debug, Clone, Copy)]
pub struct NullTransport;

impl NullTransport {
    pub const fn new() -> Self {
        Self
    }
}

impl Transport for NullTransport {
    type Error = ();

    fn begin_connect(&mut self, _host: &str, _port: u16) -> Result<(), Self::Error> {
        Err(())
    }

    fn poll_connect(&mut self) -> ConnectPoll {
        ConnectPoll::Failed
    }

    fn connected(&self) -> bool {
        false
    }

    fn available(&self) -> usize {
        0
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn write(&mut self, _bytes: &[u8]) -> Result<(), Self::Error> {
        Err(())
    }

    fn close(&mut self) {}
}
