mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use slotline_client::{Client, ClientConfig, ClientError, ConnectionConfig, PoolError, Reply};
use support::{arg, bulk, encode, error, integer, nil, status, MockNode};

fn client_for(node: &MockNode, read_timeout: Duration) -> Client {
    let config = ClientConfig {
        addr: node.addr(),
        connection: ConnectionConfig {
            read_timeout: Some(read_timeout),
            ..ConnectionConfig::default()
        },
        ..ClientConfig::default()
    };
    Client::with_config(config).expect("client")
}

#[test]
fn client_set_get_del_roundtrip() {
    let mut node = MockNode::bind();
    node.start(|args| match arg(args, 0) {
        "SET" => {
            assert_eq!(arg(args, 1), "key");
            assert_eq!(arg(args, 2), "value");
            status("OK")
        }
        "GET" if arg(args, 1) == "key" => bulk(b"value"),
        "GET" => nil(),
        "DEL" => integer(1),
        "PING" => status("PONG"),
        _ => error("ERR unknown command"),
    });

    let client = client_for(&node, Duration::from_secs(1));
    client.set(b"key", b"value").expect("set");
    assert_eq!(client.get(b"key").expect("get"), Some(b"value".to_vec()));
    assert_eq!(client.get(b"missing").expect("get"), None);
    assert!(client.del(b"key").expect("del"));
    assert_eq!(client.ping().expect("ping"), b"PONG".to_vec());

    // One connection served every call.
    assert_eq!(node.accepted(), 1);
    assert_eq!(client.pool().num_idle(), 1);
    assert_eq!(client.pool().num_active(), 0);
}

#[test]
fn server_error_keeps_connection() {
    let mut node = MockNode::bind();
    node.start(|args| match arg(args, 0) {
        "INCR" => error("WRONGTYPE Operation against a key holding the wrong kind of value"),
        _ => bulk(b"ok"),
    });

    let client = client_for(&node, Duration::from_secs(1));
    match client.exec(&[b"INCR", b"list"]) {
        Err(ClientError::Server { message }) => assert!(message.starts_with("WRONGTYPE")),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(client.get(b"k").expect("get"), Some(b"ok".to_vec()));
    assert_eq!(node.accepted(), 1);
}

#[test]
fn broken_connection_is_replaced() {
    let gets = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&gets);
    let mut node = MockNode::bind();
    node.start(move |_args| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            None
        } else {
            bulk(b"fresh")
        }
    });

    let client = client_for(&node, Duration::from_secs(1));
    let err = client.get(b"k").unwrap_err();
    assert!(matches!(err, ClientError::Io(_)), "unexpected: {err:?}");
    assert_eq!(client.pool().num_idle(), 0);
    assert_eq!(client.pool().num_active(), 0);

    assert_eq!(client.get(b"k").expect("get"), Some(b"fresh".to_vec()));
    assert_eq!(node.accepted(), 2);
    assert_eq!(gets.load(Ordering::SeqCst), 2);
}

#[test]
fn blocking_pop_outlives_read_timeout() {
    let mut node = MockNode::bind();
    node.start(|args| {
        thread::sleep(Duration::from_millis(300));
        match arg(args, 0) {
            "BLPOP" => {
                assert_eq!(arg(args, 2), "0");
                encode(&Reply::Array(Some(vec![
                    Reply::Bulk(Some(b"jobs".to_vec())),
                    Reply::Bulk(Some(b"job-1".to_vec())),
                ])))
            }
            _ => bulk(b"late"),
        }
    });

    let client = client_for(&node, Duration::from_millis(100));
    let popped = client.blpop(b"jobs", Duration::ZERO).expect("blpop");
    assert_eq!(popped, Some((b"jobs".to_vec(), b"job-1".to_vec())));
    assert_eq!(client.pool().num_idle(), 1);

    // The read timeout is back in force for ordinary commands.
    let err = client.get(b"k").unwrap_err();
    assert!(matches!(err, ClientError::Io(_)), "unexpected: {err:?}");
    assert_eq!(client.pool().num_idle(), 0);
}

#[test]
fn blocking_pop_rounds_sub_second_timeout_up() {
    let mut node = MockNode::bind();
    node.start(|args| match arg(args, 0) {
        "BLPOP" => encode(&Reply::Array(None)),
        _ => error("ERR unexpected"),
    });

    let client = client_for(&node, Duration::from_secs(1));
    assert_eq!(client.blpop(b"jobs", Duration::from_millis(500)).expect("blpop"), None);
    assert_eq!(node.commands(), vec!["BLPOP jobs 1".to_string()]);
}

#[test]
fn closed_client_rejects_commands() {
    let mut node = MockNode::bind();
    node.start(|_args| status("PONG"));

    let client = client_for(&node, Duration::from_secs(1));
    client.ping().expect("ping");
    client.close();
    assert!(matches!(
        client.ping(),
        Err(ClientError::Pool(PoolError::Closed))
    ));
}

#[test]
fn rejects_bad_address() {
    let config = ClientConfig {
        addr: "no-port-here".to_string(),
        ..ClientConfig::default()
    };
    assert!(matches!(
        Client::with_config(config),
        Err(ClientError::InvalidAddress(_))
    ));
}
