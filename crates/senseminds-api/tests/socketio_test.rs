// Socket.IO transport tests against a scripted in-process WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use senseminds_api::{
    DisconnectReason, Error, Session, SessionEvent, SocketIoTransport, Transport,
};

const OPEN: &str =
    r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

async fn listen() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("http://{addr}")).unwrap();
    (listener, url)
}

async fn next_text<S>(ws: &mut S) -> String
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
            Some(Ok(_)) => {}
            other => panic!("server expected a text frame, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_handshake_events_and_server_disconnect() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Text(OPEN.into())).await.unwrap();
        assert_eq!(next_text(&mut ws).await, "40");
        ws.send(Message::Text(r#"40{"sid":"sio-1"}"#.into()))
            .await
            .unwrap();

        ws.send(Message::Text("2".into())).await.unwrap();
        ws.send(Message::Text(
            r#"42["sensor_update",{"readings":{"temperature":21.5}}]"#.into(),
        ))
        .await
        .unwrap();

        assert_eq!(next_text(&mut ws).await, "3");
        assert_eq!(
            next_text(&mut ws).await,
            r#"42["join_room",{"room":"alerts"}]"#
        );

        ws.send(Message::Text("41".into())).await.unwrap();
        // Drain until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let transport = SocketIoTransport::default();
    let mut session = transport.connect(&url).await.unwrap();

    let event = session.recv().await;
    assert_eq!(
        event,
        SessionEvent::Message {
            name: "sensor_update".into(),
            data: json!({ "readings": { "temperature": 21.5 } }),
        }
    );

    session
        .emit("join_room", &json!({ "room": "alerts" }))
        .await
        .unwrap();

    assert_eq!(
        session.recv().await,
        SessionEvent::Closed(DisconnectReason::ServerDisconnect)
    );

    session.close().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_connect_error_is_refused() {
    let (listener, url) = listen().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(OPEN.into())).await.unwrap();
        let _ = next_text(&mut ws).await;
        ws.send(Message::Text(r#"44{"message":"Not authorized"}"#.into()))
            .await
            .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let err = SocketIoTransport::default()
        .connect(&url)
        .await
        .err()
        .unwrap();

    match err {
        Error::ConnectRefused(message) => assert_eq!(message, "Not authorized"),
        other => panic!("expected ConnectRefused, got {other:?}"),
    }
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let (listener, url) = listen().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let transport = SocketIoTransport {
        connect_timeout: Duration::from_millis(200),
        ..SocketIoTransport::default()
    };
    let err = transport.connect(&url).await.err().unwrap();

    assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_refused_tcp_connection_fails_fast() {
    let (listener, url) = listen().await;
    drop(listener);

    let err = SocketIoTransport::default().connect(&url).await.err().unwrap();

    assert!(matches!(err, Error::WebSocketConnect(_)), "got {err:?}");
    assert!(err.is_transient());
}
