//! # Connection
//!
//! Purpose: Own one TCP stream and run the RESP codec over it with
//! synchronous request/reply semantics.
//!
//! ## Design Principles
//! 1. **One In-Flight Request**: A connection is used by one caller at a time;
//!    pools enforce this by handing it out exclusively.
//! 2. **Sticky Breakage**: Any IO or framing failure marks the connection
//!    broken; pools destroy broken connections instead of reusing them.
//! 3. **Buffer Reuse**: Line and write buffers live on the connection.
//! 4. **Explicit Blocking**: Blocking commands lift the read timeout for their
//!    duration only.

use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use slotline_common::{encode_command, read_reply, NodeAddress, Reply, RespError, RespResult};

use crate::config::ConnectionConfig;
use crate::error::{ClientError, ClientResult};

/// Single TCP connection with reusable buffers.
pub struct Connection {
    node: NodeAddress,
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
    read_timeout: Option<Duration>,
    broken: bool,
}

impl Connection {
    /// Opens a connection to `node` using the socket settings in `config`.
    pub fn connect(node: &NodeAddress, config: &ConnectionConfig) -> ClientResult<Self> {
        let stream = connect_stream(node, config.connect_timeout)?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        Ok(Connection {
            node: node.clone(),
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
            read_timeout: config.read_timeout,
            broken: false,
        })
    }

    /// The address this connection was opened to.
    pub fn node(&self) -> &NodeAddress {
        &self.node
    }

    /// True once an IO or protocol failure happened on this connection.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Writes one command frame.
    pub fn send(&mut self, args: &[&[u8]]) -> ClientResult<()> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf)?;

        let stream = self.reader.get_mut();
        let written = stream
            .write_all(&self.write_buf)
            .and_then(|_| stream.flush());
        if let Err(err) = written {
            self.broken = true;
            return Err(ClientError::Io(err));
        }
        Ok(())
    }

    /// Reads one reply.
    ///
    /// A server error reply comes back as `ClientError::Server` (or
    /// `ClientError::Redirect`) and leaves the connection usable.
    pub fn receive(&mut self) -> ClientResult<Reply> {
        let reply = read_reply(&mut self.reader, &mut self.line_buf);
        self.track(reply)
    }

    /// Sends a command and reads its reply.
    pub fn exec(&mut self, args: &[&[u8]]) -> ClientResult<Reply> {
        self.send(args)?;
        self.receive()
    }

    /// Removes the read timeout so a legitimately long blocking command is not
    /// mistaken for a stalled server.
    pub fn set_infinite_timeout(&mut self) -> ClientResult<()> {
        self.reader.get_ref().set_read_timeout(None)?;
        Ok(())
    }

    /// Puts back the configured read timeout.
    pub fn restore_timeout(&mut self) -> ClientResult<()> {
        self.reader.get_ref().set_read_timeout(self.read_timeout)?;
        Ok(())
    }

    /// Returns a handle that can shut this connection down from another thread,
    /// e.g. to abandon a blocking command.
    pub fn shutdown_handle(&self) -> ClientResult<ShutdownHandle> {
        Ok(ShutdownHandle {
            stream: self.reader.get_ref().try_clone()?,
        })
    }

    /// Shuts the socket down. The connection is unusable afterwards.
    pub fn close(&mut self) {
        self.broken = true;
        if let Err(err) = self.reader.get_ref().shutdown(Shutdown::Both) {
            tracing::debug!(node = %self.node, error = %err, "error while closing connection");
        }
    }

    fn track<T>(&mut self, result: RespResult<T>) -> ClientResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err @ RespError::Server(_)) => Err(ClientError::from(err)),
            Err(err) => {
                self.broken = true;
                Err(ClientError::from(err))
            }
        }
    }
}

/// Shuts a connection down from outside the thread using it.
pub struct ShutdownHandle {
    stream: TcpStream,
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> ClientResult<()> {
        self.stream.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

fn connect_stream(node: &NodeAddress, timeout: Option<Duration>) -> ClientResult<TcpStream> {
    let addrs = (node.host(), node.port())
        .to_socket_addrs()
        .map_err(|_| ClientError::InvalidAddress(node.to_string()))?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    match last_err {
        Some(err) => Err(ClientError::Io(err)),
        None => Err(ClientError::InvalidAddress(node.to_string())),
    }
}
