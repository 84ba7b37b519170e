//! Integration tests for the postwire-server binary.
//!
//! Each test spawns the binary on an OS-assigned port, reads the address it
//! prints and calls the demo procedures with the library client.

use postwire::{Client, RpcError};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;

struct ServerProcess {
    child: tokio::process::Child,
    addr: String,
    stdout_drain: Option<tokio::task::JoinHandle<()>>,
}

impl ServerProcess {
    fn rpc_url(&self) -> String {
        format!("http://{}/rpc", self.addr)
    }

    async fn stop(mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.start_kill();
    }
}

fn binary_path() -> Result<PathBuf, String> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_postwire-server") {
        return Ok(PathBuf::from(path));
    }
    let current_exe =
        std::env::current_exe().map_err(|e| format!("failed to resolve current_exe: {e}"))?;
    let target_dir = current_exe
        .parent()
        .and_then(|p| p.parent())
        .ok_or_else(|| "failed to resolve target directory".to_string())?;

    let mut fallback = target_dir.join("postwire-server");
    if cfg!(target_os = "windows") {
        fallback.set_extension("exe");
    }
    if !fallback.exists() {
        return Err(format!("binary not found at {}", fallback.display()));
    }
    Ok(fallback)
}

/// Spawn the binary and wait for its `RPC_ADDR=` line.
async fn start_server(extra_args: &[&str]) -> Result<ServerProcess, String> {
    let mut child = tokio::process::Command::new(binary_path()?)
        .args(["--host", "127.0.0.1", "--port", "0"])
        .args(extra_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn postwire-server: {e}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "failed to capture stdout".to_string())?;
    let mut lines = tokio::io::BufReader::new(stdout).lines();

    let mut addr = None;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(250), lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                if let Some(value) = line.strip_prefix("RPC_ADDR=") {
                    addr = Some(value.trim().to_string());
                    break;
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(err)) => return Err(format!("failed to read stdout: {err}")),
            Err(_) => continue,
        }
    }
    let addr = addr.ok_or_else(|| "RPC_ADDR line not emitted".to_string())?;

    let stdout_drain =
        tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });

    Ok(ServerProcess {
        child,
        addr,
        stdout_drain: Some(stdout_drain),
    })
}

#[tokio::test]
async fn test_demo_procedures() {
    let server = start_server(&[]).await.unwrap();
    let mut client = Client::new(server.rpc_url()).unwrap();

    let sum: i64 = client.call("Add", (2i64, 3i64)).await.unwrap();
    assert_eq!(sum, 5);

    let quotient: i64 = client.call("Div", (9i64, 3i64)).await.unwrap();
    assert_eq!(quotient, 3);

    let echoed: String = client.call("Echo", ("hello",)).await.unwrap();
    assert_eq!(echoed, "hello");

    let (mean, max): (f64, f64) = client
        .call("Stats", (vec![1.0f64, 2.0, 6.0],))
        .await
        .unwrap();
    assert_eq!((mean, max), (3.0, 6.0));

    server.stop().await;
}

#[tokio::test]
async fn test_demo_failures() {
    let server = start_server(&[]).await.unwrap();
    let mut client = Client::new(server.rpc_url()).unwrap();

    let err = client
        .call::<_, i64>("Div", (1i64, 0i64))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "division by zero");

    let err = client
        .call::<_, (f64, f64)>("Stats", (Vec::<f64>::new(),))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "no values to summarize");

    let err = client.call::<_, ()>("Nope", ()).await.unwrap_err();
    assert!(matches!(err, RpcError::Remote { .. }));

    server.stop().await;
}

#[tokio::test]
async fn test_custom_path_and_health() {
    let server = start_server(&["--path", "/calls"]).await.unwrap();

    let health: Value = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let mut client = Client::new(format!("http://{}/calls", server.addr)).unwrap();
    let sum: i64 = client.call("Add", (1i64, 1i64)).await.unwrap();
    assert_eq!(sum, 2);

    server.stop().await;
}

#[tokio::test]
async fn test_cors_preflight() {
    let server = start_server(&["--allow-origin", "http://app.local"])
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, server.rpc_url())
        .header("origin", "http://app.local")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://app.local"
    );

    server.stop().await;
}
