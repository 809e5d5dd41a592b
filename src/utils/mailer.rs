use anyhow::Result;
use async_trait::async_trait;
use hyper::{client::Client, client::HttpConnector, Body, Method, Request, Uri};
use serde::Serialize;

/// Outbound email. Implementations deliver one message per call.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, to_name: &str, subject: &str, html: &str) -> Result<()>;
}

#[derive(Serialize, Debug)]
struct RelayMessage<'a> {
    from_name: &'a str,
    from_address: &'a str,
    to: &'a str,
    to_name: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Posts each message as JSON to an HTTP mail relay.
pub struct HttpMailer {
    client: Client<HttpConnector, Body>,
    uri: Uri,
    token: Option<String>,
    from_name: String,
    from_address: String,
}

impl HttpMailer {
    pub fn new(relay_url: &str, token: Option<String>, from_name: &str, from_address: &str) -> Result<Self> {
        let uri = format!("{}/send", relay_url.trim_end_matches('/')).parse::<Uri>()?;
        Ok(Self {
            client: Client::new(),
            uri,
            token,
            from_name: from_name.to_string(),
            from_address: from_address.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, to_name: &str, subject: &str, html: &str) -> Result<()> {
        let msg = RelayMessage {
            from_name: self.from_name.as_str(),
            from_address: self.from_address.as_str(),
            to,
            to_name,
            subject,
            html,
        };
        let mut req = Request::builder()
            .uri(&self.uri)
            .method(Method::POST)
            .header("content-type", "application/json");
        if let Some(token) = &self.token {
            req = req.header("ACCESS_TOKEN", token.as_str());
        }
        let req = req.body(Body::from(serde_json::to_string(&msg)?))?;
        let res = self.client.request(req).await?;
        if !res.status().is_success() {
            let status = res.status();
            let buf = hyper::body::to_bytes(res.into_body()).await?;
            return Err(anyhow::Error::msg(format!(
                "mail relay answered {}: {}",
                status,
                String::from_utf8_lossy(buf.as_ref())
            )));
        }
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, to_name: &str, subject: &str, _html: &str) -> Result<()> {
        tracing::info!("mail to {} <{}>: {}", to_name, to, subject);
        Ok(())
    }
}
