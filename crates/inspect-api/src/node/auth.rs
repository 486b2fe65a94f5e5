// Node session authentication
//
// Login is a PUT with Basic credentials; the node answers with the session
// token in the `Authorization` response header. Every later call sends
// that token back verbatim.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::error::Error;
use crate::node::NodeClient;

impl NodeClient {
    /// Authenticate and store the issued token.
    ///
    /// `monitor` requests a read-only session; otherwise the session holds
    /// control of the node.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
        monitor: bool,
    ) -> Result<SecretString, Error> {
        let mut url = self.node_url(&["security", "login"])?;
        url.query_pairs_mut()
            .append_pair("monitor", if monitor { "1" } else { "0" })
            .append_pair("temporary", "0");

        debug!("logging in at {}", url);

        let req = self
            .http()
            .put(url)
            .basic_auth(username, Some(password.expose_secret()))
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .body(String::new());
        let resp = self.send(req).await?;

        let token = resp
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.to_owned()))
            .ok_or_else(|| Error::Authentication {
                message: "login response carried no Authorization header".into(),
            })?;

        self.set_token(Some(token.clone()));
        info!(user = username, monitor, "node session established");
        Ok(token)
    }

    /// End the session on the node and forget the token.
    ///
    /// The token is dropped locally even when the node call fails.
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.node_url(&["security", "logout"])?;
        let result = self.put_text(url, "").await;
        self.clear_token();
        debug!("node session closed");
        result
    }
}
