use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};

/// Serves one request with `status_line`, announcing a 1000 byte body but
/// closing the connection after a few bytes.
pub fn short_body_server(status_line: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!("{status_line}\r\nContent-Type: text/html\r\nContent-Length: 1000\r\n\r\n");
        stream.write_all(head.as_bytes()).unwrap();
        stream.write_all(b"<html>partial").unwrap();
        stream.flush().unwrap();
    });

    addr
}
