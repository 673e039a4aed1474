use std::{
    io::{BufRead, BufReader, Write},
    net::TcpListener,
    thread,
    time::Duration,
};

use soda_pull::{
    discover,
    transport::{HttpTransport, Transport},
};

/// Serves `responses` in order, one per connection, and returns the base URL.
fn serve(responses: Vec<String>) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local port");
    let addr = listener.local_addr().expect("local addr");
    let handle = thread::spawn(move || {
        let mut request_lines = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut line = String::new();
            reader.read_line(&mut line).expect("request line");
            request_lines.push(line.trim_end().to_string());
            loop {
                let mut header = String::new();
                if reader.read_line(&mut header).expect("header") == 0 || header == "\r\n" {
                    break;
                }
            }
            stream.write_all(response.as_bytes()).expect("write response");
            stream.flush().expect("flush");
        }
        request_lines
    });
    (format!("http://{addr}"), handle)
}

const SERVER_ERROR: &str =
    "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

fn transport() -> HttpTransport {
    HttpTransport::new(Duration::from_secs(5)).expect("client")
}

#[test]
fn metadata_server_error_names_dataset_and_status() {
    let (base, server) = serve(vec![SERVER_ERROR.to_string()]);
    let url = format!("{base}/resource/abcd-1234.json");

    let err = discover::discover_columns(&transport(), &url).expect_err("500 is fatal");

    assert_eq!(err.status(), Some(500));
    let message = err.to_string();
    assert!(message.contains("dataset abcd-1234"), "{message}");
    assert!(message.contains("/api/views/abcd-1234.json"), "{message}");
    let lines = server.join().expect("server thread");
    assert!(lines[0].starts_with("GET /api/views/abcd-1234.json"));
}

#[test]
fn collection_server_error_names_dataset_and_status() {
    let (base, server) = serve(vec![SERVER_ERROR.to_string()]);
    let url = format!("{base}/resource/wxyz-9876.json");
    let query = vec![("$limit".to_string(), "10".to_string())];

    let err = transport().get_json(&url, &query).expect_err("500 is fatal");

    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("dataset wxyz-9876"));
    let lines = server.join().expect("server thread");
    assert!(lines[0].contains("%24limit=10") || lines[0].contains("$limit=10"));
}

#[test]
fn json_body_is_decoded() {
    let body = r#"[{"borough":"1"}]"#;
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let (base, server) = serve(vec![response]);

    let value = transport()
        .get_json(&format!("{base}/resource/abcd-1234.json"), &[])
        .expect("decoded body");

    assert_eq!(value[0]["borough"], "1");
    server.join().expect("server thread");
}
