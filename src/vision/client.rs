use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::OnceCell;

use super::Annotator;
use super::types::BatchAnnotateRequest;
use crate::config::{Config, Credential};

enum Auth {
    Key(String),
    Bearer(String),
}

/// Vision API 的 HTTP 客户端
pub struct VisionClient {
    client: Client,
    endpoint: String,
    credential: Credential,
    // 第一次请求时才解析凭据
    auth: OnceCell<Auth>,
}

impl VisionClient {
    pub fn new(
        endpoint: impl Into<String>,
        credential: Credential,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("fotometa/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
            credential,
            auth: OnceCell::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.endpoint.clone(), config.credential.clone(), config.timeout)
    }

    async fn auth(&self) -> Result<&Auth> {
        self.auth.get_or_try_init(|| resolve(&self.credential)).await
    }
}

impl Annotator for VisionClient {
    async fn annotate(&self, request: &BatchAnnotateRequest) -> Result<Value> {
        let builder = self.client.post(&self.endpoint).json(request);
        let builder = match self.auth().await? {
            Auth::Key(key) => builder.query(&[("key", key)]),
            Auth::Bearer(token) => builder.bearer_auth(token),
        };

        debug!("POST {} ({} bytes of image data)", self.endpoint, request.payload_len());
        let response = builder.send().await.context("request to Vision API failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Vision API returned {}: {}", status, body.trim());
        }

        let value: Value = response.json().await.context("Vision API returned invalid JSON")?;
        if let Some(error) = value.pointer("/responses/0/error") {
            warn!("Vision API reported an error: {}", error);
        }
        Ok(value)
    }
}

async fn resolve(credential: &Credential) -> Result<Auth> {
    match credential {
        Credential::ApiKey(key) => Ok(Auth::Key(key.clone())),
        Credential::AccessToken(token) => Ok(Auth::Bearer(token.clone())),
        Credential::Command(cmd) => run_token_command(cmd).await.map(Auth::Bearer),
    }
}

async fn run_token_command(cmd: &str) -> Result<String> {
    info!("获取 access token: {}", cmd);
    let output = shell(cmd).output().await.with_context(|| format!("failed to run `{cmd}`"))?;
    if !output.status.success() {
        bail!(
            "`{}` exited with {}: {}",
            cmd,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let token = String::from_utf8(output.stdout).context("token is not valid UTF-8")?;
    let token = token.trim();
    if token.is_empty() {
        bail!("`{cmd}` printed an empty token");
    }
    Ok(token.to_string())
}

fn shell(cmd: &str) -> Command {
    let (program, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    let mut command = Command::new(program);
    command.arg(flag).arg(cmd);
    command
}
