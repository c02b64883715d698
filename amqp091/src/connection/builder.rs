use std::convert::TryInto;

use amqp091_types::{
    definitions::{FRAME_MIN_SIZE, PORT},
    primitives::{FieldTable, FieldValue},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::mpsc,
};
use url::Url;

use crate::sasl::SaslProfile;

use super::{
    engine::{ConnectionEngine, Handshake},
    Connection, OpenError, Tuning,
};

pub(crate) const DEFAULT_CONTROL_CHAN_BUF: usize = 128;

/// Default depth of the outgoing frame group queue shared by all channels
pub const DEFAULT_OUTGOING_BUFFER_SIZE: usize = 1024;

/// Default virtual host
pub const DEFAULT_VIRTUAL_HOST: &str = "/";

/// Default locale
pub const DEFAULT_LOCALE: &str = "en_US";

/// Product name announced in the client properties
pub const PRODUCT: &str = "amqp091";

/// Connection builder
#[derive(Debug, Clone)]
pub struct Builder {
    /// Name shown by the broker's management tools
    pub connection_name: Option<String>,

    /// Virtual host, taken from the url path when not set
    pub virtual_host: Option<String>,

    /// Credentials, taken from the url when not set
    pub sasl_profile: Option<SaslProfile>,

    /// Proposed tuning, negotiated down by the server
    pub tuning: Tuning,

    /// Message locale
    pub locale: String,

    /// Extra client properties, merged over the defaults
    pub client_properties: FieldTable,

    /// Depth of the outgoing frame group queue
    pub buffer_size: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates a new builder with the default configuration
    pub fn new() -> Self {
        Self {
            connection_name: None,
            virtual_host: None,
            sasl_profile: None,
            tuning: Tuning::default(),
            locale: String::from(DEFAULT_LOCALE),
            client_properties: FieldTable::new(),
            buffer_size: DEFAULT_OUTGOING_BUFFER_SIZE,
        }
    }

    /// Name of the connection
    pub fn connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    /// Virtual host to open
    pub fn virtual_host(mut self, virtual_host: impl Into<String>) -> Self {
        self.virtual_host = Some(virtual_host.into());
        self
    }

    /// SASL profile
    pub fn sasl_profile(mut self, profile: impl Into<SaslProfile>) -> Self {
        self.sasl_profile = Some(profile.into());
        self
    }

    /// PLAIN credentials
    pub fn credentials(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.sasl_profile(SaslProfile::plain(username, password))
    }

    /// Highest channel number to propose, zero for no limit
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.tuning.channel_max = channel_max;
        self
    }

    /// Largest frame to propose, zero for no limit. Non-zero values are raised to the
    /// protocol minimum of 4096.
    pub fn frame_max(mut self, frame_max: u32) -> Self {
        self.tuning.frame_max = match frame_max {
            0 => 0,
            frame_max => std::cmp::max(FRAME_MIN_SIZE, frame_max),
        };
        self
    }

    /// Heartbeat interval in seconds to propose, zero to disable
    pub fn heartbeat(mut self, heartbeat: u16) -> Self {
        self.tuning.heartbeat = heartbeat;
        self
    }

    /// Message locale
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Add a client property. Properties set here replace the default ones of the same
    /// name.
    pub fn client_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        self.client_properties.insert(name, value);
        self
    }

    /// Depth of the outgoing frame group queue
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    fn capabilities() -> FieldTable {
        FieldTable::new()
            .with("authentication_failure_close", true)
            .with("basic.nack", false)
            .with("connection.blocked", false)
            .with("consumer_cancel_notify", true)
            .with("exchange_exchange_bindings", true)
            .with("publisher_confirms", false)
    }

    fn build_client_properties(&self) -> FieldTable {
        let mut properties = FieldTable::new()
            .with("product", PRODUCT)
            .with("version", env!("CARGO_PKG_VERSION"))
            .with("platform", "Rust")
            .with("capabilities", Self::capabilities());
        if let Some(name) = &self.connection_name {
            properties.insert("connection_name", name.as_str());
        }
        for (name, value) in self.client_properties.iter() {
            properties.insert(name.clone(), value.clone());
        }
        properties
    }

    /// Open a connection over an already established byte stream, eg. a TLS stream
    pub async fn open_with_stream<Io>(self, stream: Io) -> Result<Connection, OpenError>
    where
        Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let client_properties = self.build_client_properties();
        let handshake = Handshake {
            sasl_profile: self.sasl_profile.unwrap_or_default(),
            virtual_host: self
                .virtual_host
                .unwrap_or_else(|| String::from(DEFAULT_VIRTUAL_HOST)),
            locale: self.locale,
            client_properties,
            tuning: self.tuning,
        };

        let (control_tx, control_rx) = mpsc::channel(DEFAULT_CONTROL_CHAN_BUF);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(self.buffer_size.max(1));

        let (engine, negotiated) =
            ConnectionEngine::open(stream, handshake, control_rx, outgoing_rx).await?;
        let handle = engine.spawn();

        Ok(Connection::new(
            control_tx,
            handle,
            outgoing_tx,
            negotiated.tuning,
            negotiated.server_properties,
        ))
    }

    /// Connect to `amqp://[user[:password]@]host[:port][/vhost]`
    pub async fn open(
        mut self,
        url: impl TryInto<Url, Error = url::ParseError>,
    ) -> Result<Connection, OpenError> {
        let url: Url = url.try_into()?;
        if url.scheme() != "amqp" {
            return Err(OpenError::InvalidScheme);
        }
        if self.sasl_profile.is_none() {
            self.sasl_profile = SaslProfile::try_from(&url).ok();
        }
        if self.virtual_host.is_none() {
            self.virtual_host = virtual_host_from_url(&url);
        }

        let addr = url.socket_addrs(|| Some(PORT))?;
        let stream = TcpStream::connect(&*addr).await?;
        stream.set_nodelay(true)?;
        self.open_with_stream(stream).await
    }
}

/// The path of the url without its leading slash, `None` if that is empty
fn virtual_host_from_url(url: &Url) -> Option<String> {
    let path = url.path().strip_prefix('/').unwrap_or_else(|| url.path());
    match path {
        "" => None,
        path => Some(
            urlencoding::decode(path)
                .map(|path| path.into_owned())
                .unwrap_or_else(|_| path.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::{virtual_host_from_url, Builder};

    #[test]
    fn virtual_host_from_url_path() {
        let vhost = |url: &str| virtual_host_from_url(&Url::parse(url).unwrap());
        assert_eq!(vhost("amqp://localhost"), None);
        assert_eq!(vhost("amqp://localhost/"), None);
        assert_eq!(vhost("amqp://localhost/staging"), Some(String::from("staging")));
        assert_eq!(vhost("amqp://localhost/%2f"), Some(String::from("/")));
        assert_eq!(vhost("amqp://localhost/%2Fteam%20a"), Some(String::from("/team a")));
    }

    #[test]
    fn frame_max_is_raised_to_the_minimum() {
        assert_eq!(Builder::new().frame_max(512).tuning.frame_max, 4096);
        assert_eq!(Builder::new().frame_max(0).tuning.frame_max, 0);
        assert_eq!(Builder::new().frame_max(65536).tuning.frame_max, 65536);
    }

    #[test]
    fn client_properties_carry_name_and_capabilities() {
        let properties = Builder::new()
            .connection_name("orders")
            .client_property("product", "custom")
            .build_client_properties();

        assert_eq!(
            properties.get("connection_name").and_then(|v| v.as_str()),
            Some("orders")
        );
        assert_eq!(
            properties.get("product").and_then(|v| v.as_str()),
            Some("custom")
        );
        let capabilities = properties
            .get("capabilities")
            .and_then(|v| v.as_table())
            .unwrap();
        assert_eq!(
            capabilities
                .get("consumer_cancel_notify")
                .and_then(|v| v.as_bool()),
            Some(true)
        );
    }
}
