use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use tracing::{info, warn};

pub mod api;
pub mod routes;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const BIND_ENV_VAR: &str = "ROTASIM_BIND";

/// Bind address from the environment, or the default.
pub fn bind_addr_from_env() -> String {
    std::env::var(BIND_ENV_VAR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}

pub fn run_server(bind_addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    info!("rotasim server listening on http://{bind_addr}");

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream) {
                    warn!(%err, "request error");
                }
            }
            Err(err) => warn!(%err, "connection failed"),
        }
    }

    Ok(())
}

fn handle_connection(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buffer = [0_u8; 65_536];
    let bytes_read = stream.read(&mut buffer)?;
    if bytes_read == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..bytes_read]);
    let mut lines = request.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut request_parts = request_line.split_whitespace();
    let method = request_parts.next().unwrap_or("GET");
    let path = request_parts.next().unwrap_or("/");

    let body = request
        .split("\r\n\r\n")
        .nth(1)
        .or_else(|| request.split("\n\n").nth(1))
        .unwrap_or("");

    let response = routes::route_request(method, path, body);
    info!(method, path, status = response.status_code, "request handled");
    stream.write_all(response.to_http_string().as_bytes())?;
    stream.flush()?;
    Ok(())
}
