// tests/dev_server.rs

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use stylepipe::actions::{ActionContext, reload, serve};
use stylepipe::engine::RuntimeEvent;
use stylepipe::serve::{RELOAD_MESSAGE, start_server};
use stylepipe::types::LIVERELOAD_PATH;
use stylepipe_test_utils::{init_tracing, project_dir, with_timeout};

async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn html_pages_get_the_reload_client() {
    init_tracing();
    let dir = project_dir(&[
        ("index.html", "<html><body><h1>hi</h1></body></html>"),
        ("style.css", ".a{color:red}"),
    ]);

    let server = start_server(dir.path().to_path_buf(), "127.0.0.1", 0)
        .await
        .unwrap();
    let addr = server.session.addr();

    let page = with_timeout(get(addr, "/index.html")).await;
    assert!(page.starts_with("HTTP/1.1 200"), "{page}");
    assert!(page.contains("/__stylepipe/livereload"), "{page}");
    let script_at = page.find("<script>").unwrap();
    let body_close = page.find("</body>").unwrap();
    assert!(script_at < body_close);

    let css = with_timeout(get(addr, "/style.css")).await;
    assert!(css.starts_with("HTTP/1.1 200"), "{css}");
    assert!(css.ends_with(".a{color:red}"), "{css}");
    assert!(!css.contains("<script>"));

    let missing = with_timeout(get(addr, "/nope.html")).await;
    assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

    server.handle.abort();
}

#[tokio::test]
async fn second_bind_on_same_port_fails() {
    let dir = tempfile::tempdir().unwrap();
    let first = start_server(dir.path().to_path_buf(), "127.0.0.1", 0)
        .await
        .unwrap();
    let port = first.session.addr().port();

    let err = start_server(dir.path().to_path_buf(), "127.0.0.1", port)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("binding development server"));

    first.handle.abort();
}

/// Open a live-reload socket and return it once the server answered the
/// upgrade with `101 Switching Protocols`.
async fn connect_livereload(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {LIVERELOAD_PATH} HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    // Read the handshake byte by byte so no frame data is consumed.
    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        head.push(stream.read_u8().await.unwrap());
    }
    let head = String::from_utf8_lossy(&head);
    assert!(head.starts_with("HTTP/1.1 101"), "{head}");
    assert!(
        head.contains("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="),
        "missing accept key: {head}"
    );
    stream
}

#[tokio::test]
async fn reload_reaches_connected_browser() {
    init_tracing();
    let dir = project_dir(&[("index.html", "<html><body></body></html>")]);
    let (tx, mut rx) = mpsc::channel(8);
    let ctx = ActionContext::with_real_fs(dir.path(), tx);

    let serve_ctx = ctx.clone();
    let service = tokio::spawn(async move {
        serve(&serve_ctx, "browser-sync", ".", &[], "127.0.0.1", 0).await
    });
    let event = with_timeout(rx.recv()).await.unwrap();
    assert!(matches!(event, RuntimeEvent::TaskProgressed { task } if task == "browser-sync"));

    let session = ctx.session().unwrap();
    let mut client = with_timeout(connect_livereload(session.addr())).await;
    assert_eq!(session.client_count(), 1);

    assert_eq!(reload(&ctx), 1);

    // Unmasked text frame from the server: FIN + text opcode, then length.
    let mut frame = vec![0u8; 2 + RELOAD_MESSAGE.len()];
    with_timeout(client.read_exact(&mut frame)).await.unwrap();
    assert_eq!(frame[0], 0x81);
    assert_eq!(frame[1] as usize, RELOAD_MESSAGE.len());
    assert_eq!(&frame[2..], RELOAD_MESSAGE.as_bytes());

    service.abort();
}
