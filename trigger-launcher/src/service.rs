use crate::triggers::{TriggerSpec, TRIGGERS};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

pub const DEFAULT_DAR: &str = "target/bond-issuance-triggers.dar";
pub const TRIGGER_SERVICE_PORT: u16 = 8088;
pub const PORT_TIMEOUT: Duration = Duration::from_secs(30);
pub const PORT_RETRY: Duration = Duration::from_secs(2);
const SETTLE_AFTER_REGISTER: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("usage: trigger-launcher SANDBOX_PORT [--dar PATH] ({0})")]
    Usage(String),
    #[error("waited too long for port {host}:{port}")]
    PortTimeout { host: String, port: u16 },
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("inspect-dar failed: {0}")]
    Inspect(String),
    #[error("registering {trigger} for {party}: {reason}")]
    Register {
        party: String,
        trigger: String,
        reason: String,
    },
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("trigger service exited unexpectedly ({0})")]
    ServiceDied(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchArgs {
    pub sandbox_port: u16,
    pub dar: PathBuf,
}

impl LaunchArgs {
    /// Parses everything after the program name.
    pub fn parse<I, S>(args: I) -> Result<Self, LaunchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut port = None;
        let mut dar = PathBuf::from(DEFAULT_DAR);
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            if arg == "--dar" {
                dar = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or_else(|| LaunchError::Usage("--dar needs a path".into()))?;
            } else if port.is_none() {
                port = Some(
                    arg.parse::<u16>()
                        .map_err(|_| LaunchError::Usage(format!("bad port {arg:?}")))?,
                );
            } else {
                return Err(LaunchError::Usage(format!("unexpected argument {arg:?}")));
            }
        }
        Ok(Self {
            sandbox_port: port.ok_or_else(|| LaunchError::Usage("missing SANDBOX_PORT".into()))?,
            dar,
        })
    }
}

pub async fn wait_for_port(
    host: &str,
    port: u16,
    timeout: Duration,
    retry: Duration,
) -> Result<(), LaunchError> {
    let started = Instant::now();
    loop {
        match TcpStream::connect((host, port)).await {
            Ok(_) => {
                tracing::info!(host, port, "port is open");
                return Ok(());
            }
            Err(err) => {
                if started.elapsed() >= timeout {
                    return Err(LaunchError::PortTimeout {
                        host: host.to_string(),
                        port,
                    });
                }
                tracing::info!(host, port, %err, "waiting for port");
                tokio::time::sleep(retry).await;
            }
        }
    }
}

pub fn parse_package_id(inspect_json: &[u8]) -> Result<String, LaunchError> {
    let value: serde_json::Value =
        serde_json::from_slice(inspect_json).map_err(|e| LaunchError::Inspect(e.to_string()))?;
    value
        .get("main_package_id")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| LaunchError::Inspect("no main_package_id in output".into()))
}

pub async fn package_id(dar: &Path) -> Result<String, LaunchError> {
    let output = Command::new("daml")
        .args(["damlc", "inspect-dar", "--json"])
        .arg(dar)
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| LaunchError::Spawn {
            program: "daml damlc".into(),
            source,
        })?;
    if !output.status.success() {
        return Err(LaunchError::Inspect(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    parse_package_id(&output.stdout)
}

pub fn trigger_service_args(dar: &Path, sandbox_port: u16) -> Vec<String> {
    vec![
        "trigger-service".into(),
        "--ledger-host".into(),
        "localhost".into(),
        "--ledger-port".into(),
        sandbox_port.to_string(),
        "--wall-clock-time".into(),
        "--dar".into(),
        dar.display().to_string(),
    ]
}

pub fn start_trigger_service(dar: &Path, sandbox_port: u16) -> Result<Child, LaunchError> {
    let args = trigger_service_args(dar, sandbox_port);
    tracing::debug!(?args, "starting trigger service");
    Command::new("daml")
        .args(&args)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: "daml trigger-service".into(),
            source,
        })
}

pub fn http_client() -> Result<reqwest::Client, LaunchError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?)
}

pub async fn register(
    http: &reqwest::Client,
    base_url: &str,
    package_id: &str,
    trigger: &TriggerSpec,
) -> Result<(), LaunchError> {
    let body = trigger.registration(package_id);
    tracing::info!(party = trigger.party, trigger = %body.trigger_name, "starting trigger");
    let fail = |reason: String| LaunchError::Register {
        party: trigger.party.to_string(),
        trigger: trigger.trigger.to_string(),
        reason,
    };
    let response = http
        .post(format!("{base_url}/v1/triggers"))
        .header("Accept", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| fail(e.to_string()))?;
    response
        .error_for_status()
        .map_err(|e| fail(e.to_string()))?;
    Ok(())
}

pub async fn run(args: LaunchArgs) -> Result<(), LaunchError> {
    wait_for_port("localhost", args.sandbox_port, PORT_TIMEOUT, PORT_RETRY).await?;

    let mut service = start_trigger_service(&args.dar, args.sandbox_port)?;
    let outcome = supervise(&args, &mut service).await;

    tracing::debug!("stopping trigger service");
    if let Err(err) = service.kill().await {
        tracing::warn!(%err, "could not stop trigger service");
    }
    outcome
}

async fn supervise(args: &LaunchArgs, service: &mut Child) -> Result<(), LaunchError> {
    let package_id = package_id(&args.dar).await?;
    wait_for_port("localhost", TRIGGER_SERVICE_PORT, PORT_TIMEOUT, PORT_RETRY).await?;

    let http = http_client()?;
    let base_url = format!("http://localhost:{TRIGGER_SERVICE_PORT}");
    for trigger in &TRIGGERS {
        register(&http, &base_url, &package_id, trigger).await?;
    }
    tokio::time::sleep(SETTLE_AFTER_REGISTER).await;

    println!("\nPress Ctrl+C to stop...");
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::debug!("stopping gracefully");
            Ok(())
        }
        status = service.wait() => {
            let status = status?;
            tracing::error!(%status, "trigger service died");
            Err(LaunchError::ServiceDied(status.to_string()))
        }
    }
}
