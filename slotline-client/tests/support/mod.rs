#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use slotline_common::{encode_reply, Reply};

/// What a mock node does with one command: `Some(bytes)` is written back,
/// `None` drops the connection.
pub type Handler = dyn Fn(&[Vec<u8>]) -> Option<Vec<u8>> + Send + Sync;

/// In-process RESP server. Bind first so the port is known, then start it
/// with a handler that may refer to other nodes' ports.
pub struct MockNode {
    listener: Option<TcpListener>,
    port: u16,
    log: Arc<Mutex<Vec<String>>>,
    accepted: Arc<AtomicUsize>,
}

impl MockNode {
    pub fn bind() -> MockNode {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        MockNode {
            listener: Some(listener),
            port,
            log: Arc::new(Mutex::new(Vec::new())),
            accepted: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub fn start<H>(&mut self, handler: H)
    where
        H: Fn(&[Vec<u8>]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        let listener = self.listener.take().expect("node already started");
        let handler: Arc<Handler> = Arc::new(handler);
        let log = Arc::clone(&self.log);
        let accepted = Arc::clone(&self.accepted);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => break,
                };
                accepted.fetch_add(1, Ordering::SeqCst);
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                thread::spawn(move || serve(stream, handler, log));
            }
        });
    }

    /// Every command received so far, as space-joined text.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// How many received commands start with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|command| command.starts_with(prefix))
            .count()
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// A port nothing listens on.
pub fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

fn serve(mut stream: TcpStream, handler: Arc<Handler>, log: Arc<Mutex<Vec<String>>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));
    loop {
        let args = match read_command(&mut reader) {
            Ok(args) => args,
            Err(_) => return,
        };
        log.lock().unwrap().push(line(&args));

        match handler(&args) {
            Some(reply) => {
                if stream.write_all(&reply).and_then(|_| stream.flush()).is_err() {
                    return;
                }
            }
            None => {
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }
        }
    }
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<Vec<u8>>> {
    let mut line = Vec::new();
    read_line(reader, &mut line)?.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"))?;
    if line.first() != Some(&b'*') {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"))?;
        if line.first() != Some(&b'$') {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if crlf != [b'\r', b'\n'] {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "missing crlf"));
        }
        args.push(data);
    }
    Ok(args)
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<Option<()>> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Ok(None);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(()))
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    if data.is_empty() {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "empty"));
    }
    let mut value = 0usize;
    for &b in data {
        if !b.is_ascii_digit() {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "digit"));
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as usize);
    }
    Ok(value)
}

pub fn encode(reply: &Reply) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    encode_reply(reply, &mut out);
    Some(out)
}

pub fn status(text: &str) -> Option<Vec<u8>> {
    encode(&Reply::Status(text.to_string()))
}

pub fn error(text: &str) -> Option<Vec<u8>> {
    encode(&Reply::Error(text.to_string()))
}

pub fn bulk(data: &[u8]) -> Option<Vec<u8>> {
    encode(&Reply::Bulk(Some(data.to_vec())))
}

pub fn nil() -> Option<Vec<u8>> {
    encode(&Reply::Bulk(None))
}

pub fn integer(value: i64) -> Option<Vec<u8>> {
    encode(&Reply::Integer(value))
}

/// `CLUSTER SLOTS` reply; each entry is `(start, end, port)` on 127.0.0.1.
pub fn cluster_slots(ranges: &[(u16, u16, u16)]) -> Option<Vec<u8>> {
    let entries = ranges
        .iter()
        .map(|&(start, end, port)| {
            Reply::Array(Some(vec![
                Reply::Integer(i64::from(start)),
                Reply::Integer(i64::from(end)),
                Reply::Array(Some(vec![
                    Reply::Bulk(Some(b"127.0.0.1".to_vec())),
                    Reply::Integer(i64::from(port)),
                ])),
            ]))
        })
        .collect();
    encode(&Reply::Array(Some(entries)))
}

/// `CLUSTER NODES` reply; each entry is `(port, "start-end")` for a primary.
pub fn cluster_nodes(nodes: &[(u16, &str)]) -> Option<Vec<u8>> {
    let mut text = String::new();
    for (idx, &(port, slots)) in nodes.iter().enumerate() {
        text.push_str(&format!(
            "{idx:040} 127.0.0.1:{port}@{} master - 0 0 {idx} connected {slots}\n",
            u32::from(port) + 10000
        ));
    }
    bulk(text.as_bytes())
}

pub fn arg(args: &[Vec<u8>], idx: usize) -> &str {
    std::str::from_utf8(&args[idx]).expect("utf8 arg")
}

/// The whole command as space-joined text, e.g. `CLUSTER SLOTS`.
pub fn line(args: &[Vec<u8>]) -> String {
    args.iter()
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
