// Endpoint addressing for a single inspection node.
//
// A station exposes a system-level API on its base port and one API per
// node on `base port + node index`. Every path lives under
// `/api/{root}`; node paths additionally carry the node index.

use url::Url;

use crate::error::Error;

/// Default API root segment.
pub const DEFAULT_API_ROOT: &str = "printinspection";

/// Address book for one node: host, ports, and path roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoints {
    host: String,
    system_port: u16,
    node: u16,
    api_root: String,
}

impl NodeEndpoints {
    pub fn new(host: impl Into<String>, system_port: u16, node: u16) -> Self {
        Self {
            host: host.into(),
            system_port,
            node,
            api_root: DEFAULT_API_ROOT.into(),
        }
    }

    /// Replace the `/api/{root}` segment used by this device family.
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn system_port(&self) -> u16 {
        self.system_port
    }

    pub fn node(&self) -> u16 {
        self.node
    }

    /// Port serving this node's API: system port plus node index.
    pub fn node_port(&self) -> Result<u16, Error> {
        self.system_port
            .checked_add(self.node)
            .ok_or(Error::InvalidUrl(url::ParseError::InvalidPort))
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `http://{host}:{system_port}/api/{root}/{segments..}`
    pub fn system_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base("http", self.system_port)?;
        push_segments(&mut url, [self.api_root.as_str()].into_iter().chain(segments.iter().copied()))?;
        Ok(url)
    }

    /// `http://{host}:{node_port}/api/{root}/{node}/{segments..}`
    ///
    /// Each element is one path segment and is percent-encoded, so job and
    /// sector names may be passed through as-is. A trailing `""` yields a
    /// trailing slash.
    pub fn node_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base("http", self.node_port()?)?;
        let node = self.node.to_string();
        push_segments(
            &mut url,
            [self.api_root.as_str(), node.as_str()]
                .into_iter()
                .chain(segments.iter().copied()),
        )?;
        Ok(url)
    }

    /// Push-event stream: `ws://{host}:{node_port}/api/{root}/{node}/inspection/events`
    pub fn events_url(&self) -> Result<Url, Error> {
        let mut url = self.base("ws", self.node_port()?)?;
        let node = self.node.to_string();
        push_segments(
            &mut url,
            [self.api_root.as_str(), node.as_str(), "inspection", "events"].into_iter(),
        )?;
        Ok(url)
    }

    fn base(&self, scheme: &str, port: u16) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{scheme}://localhost/"))?;
        url.set_host(Some(&self.host))?;
        url.set_port(Some(port))
            .map_err(|()| Error::InvalidUrl(url::ParseError::InvalidPort))?;
        Ok(url)
    }
}

fn push_segments<'a>(url: &mut Url, tail: impl Iterator<Item = &'a str>) -> Result<(), Error> {
    let mut path = url
        .path_segments_mut()
        .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
    path.pop_if_empty().push("api").extend(tail);
    Ok(())
}
