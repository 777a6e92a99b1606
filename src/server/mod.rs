use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

pub mod api;
pub mod routes;

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Largest request line plus headers accepted, in bytes.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

pub fn run_server(bind_addr: &str) -> io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    tracing::info!("warpflow server listening on http://{bind_addr}");

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream) {
                    tracing::warn!(%err, "request error");
                }
            }
            Err(err) => tracing::warn!(%err, "connection failed"),
        }
    }

    Ok(())
}

fn handle_connection(stream: &mut TcpStream) -> io::Result<()> {
    let Some(raw) = read_request(stream)? else {
        return Ok(());
    };

    let request = String::from_utf8_lossy(&raw);
    let (head, body) = split_head(&request);
    let mut request_parts = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_parts.next().unwrap_or("GET");
    let path = request_parts.next().unwrap_or("/");
    tracing::debug!(method, path, body_bytes = body.len(), "request");

    let response = routes::route_request(method, path, body).to_http_string();
    stream.write_all(response.as_bytes())?;
    stream.flush()?;
    Ok(())
}

/// Read headers, then as many body bytes as `Content-Length` announces.
fn read_request<R: Read>(stream: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut raw = Vec::new();
    let mut buffer = [0_u8; 16_384];

    let head_end = loop {
        let bytes_read = stream.read(&mut buffer)?;
        if bytes_read == 0 {
            if raw.is_empty() {
                return Ok(None);
            }
            break raw.len();
        }
        raw.extend_from_slice(&buffer[..bytes_read]);
        if let Some(pos) = find_head_end(&raw) {
            break pos;
        }
        if raw.len() > MAX_HEAD_BYTES {
            return Err(head_too_large());
        }
    };
    if head_end > MAX_HEAD_BYTES {
        return Err(head_too_large());
    }

    let head = String::from_utf8_lossy(&raw[..head_end.min(raw.len())]).into_owned();
    let expected = content_length(&head).min(MAX_BODY_BYTES);
    while raw.len() < head_end + expected {
        let bytes_read = stream.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        raw.extend_from_slice(&buffer[..bytes_read]);
    }
    Ok(Some(raw))
}

fn head_too_large() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("request head exceeds {MAX_HEAD_BYTES} bytes"),
    )
}

fn find_head_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
        .or_else(|| raw.windows(2).position(|window| window == b"\n\n").map(|pos| pos + 2))
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn split_head(request: &str) -> (&str, &str) {
    request
        .split_once("\r\n\r\n")
        .or_else(|| request.split_once("\n\n"))
        .unwrap_or((request, ""))
}
