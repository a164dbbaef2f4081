use std::thread;

use assert_cmd::Command;
use predicates::str::contains;
use tiny_http::{Response, Server};

/// Starts a throwaway HTTP server standing in for `ldf-server`, replying with
/// a single fixed JSON body to the next request it receives, then returns
/// the base URL to point `ldf-ctl` at.
fn fake_server(body: &'static str) -> String {
    let server = Server::http("127.0.0.1:0").expect("bind fake server");
    let addr = server.server_addr();
    let url = format!("http://{addr}");

    thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let response = Response::from_string(body)
                .with_header("Content-Type: application/json".parse::<tiny_http::Header>().unwrap());
            let _ = request.respond(response);
        }
    });

    url
}

#[test]
fn healthz_prints_the_servers_json_response() {
    let url = fake_server(r#"{"status":"ok","database":true,"storage":true}"#);

    Command::cargo_bin("ldf-ctl")
        .unwrap()
        .args(["--server", &url, "healthz"])
        .assert()
        .success()
        .stdout(contains("\"status\": \"ok\""));
}

#[test]
fn missing_required_subcommand_is_a_usage_error() {
    Command::cargo_bin("ldf-ctl").unwrap().assert().failure();
}

#[test]
fn distribution_create_requires_name_and_version() {
    Command::cargo_bin("ldf-ctl")
        .unwrap()
        .args(["distribution", "create"])
        .assert()
        .failure()
        .stderr(contains("required"));
}
