// ABOUTME: Fluent construction of client sessions; string fields validate at connect time

use std::sync::Arc;
use std::time::Duration;

use crate::client::{Client, ClientHandler, NoopClientHandler};
use crate::codec::CodecError;
use crate::datatypes::{InterfaceVersion, NumericPlanIndicator, TypeOfNumber};
use crate::error::{SmppError, SmppResult};
use crate::macros::config_setters;
use crate::session::SessionConfig;

/// Builds a [`Client`] with validated credentials and timers.
///
/// ```no_run
/// use smpp34::client::ClientBuilder;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClientBuilder::new("localhost:2775")
///     .system_id("test_client")
///     .password("password")
///     .connect()
///     .await?;
/// client.bind_transceiver().await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    addr: String,
    system_id: String,
    password: String,
    system_type: String,
    address_range: String,
    interface_version: InterfaceVersion,
    addr_ton: TypeOfNumber,
    addr_npi: NumericPlanIndicator,
    bind_timeout: Duration,
    enquire_link_interval: Duration,
    response_timeout: Duration,
}

impl ClientBuilder {
    pub fn new(addr: impl Into<String>) -> Self {
        let defaults = SessionConfig::default();
        Self {
            addr: addr.into(),
            system_id: String::new(),
            password: String::new(),
            system_type: String::new(),
            address_range: String::new(),
            interface_version: defaults.interface_version,
            addr_ton: defaults.addr_ton,
            addr_npi: defaults.addr_npi,
            bind_timeout: defaults.bind_timeout,
            enquire_link_interval: defaults.enquire_link_interval,
            response_timeout: defaults.response_timeout,
        }
    }

    config_setters! {
        system_id => String,
        password => String,
        system_type => String,
        address_range => String,
        interface_version => InterfaceVersion,
        addr_ton => TypeOfNumber,
        addr_npi => NumericPlanIndicator,
        bind_timeout => Duration,
        enquire_link_interval => Duration,
        response_timeout => Duration,
    }

    /// Validate the accumulated fields into a session configuration.
    pub fn into_config(self) -> SmppResult<(String, SessionConfig)> {
        let config = SessionConfig {
            system_id: parse_field(&self.system_id, "system_id")?,
            password: parse_field(&self.password, "password")?,
            system_type: parse_field(&self.system_type, "system_type")?,
            interface_version: self.interface_version,
            addr_ton: self.addr_ton,
            addr_npi: self.addr_npi,
            address_range: parse_field(&self.address_range, "address_range")?,
            bind_timeout: self.bind_timeout,
            enquire_link_interval: self.enquire_link_interval,
            response_timeout: self.response_timeout,
        };
        Ok((self.addr, config))
    }

    pub async fn connect(self) -> SmppResult<Client> {
        self.connect_with_handler(Arc::new(NoopClientHandler)).await
    }

    pub async fn connect_with_handler(self, handler: Arc<dyn ClientHandler>) -> SmppResult<Client> {
        let (addr, config) = self.into_config()?;
        Client::connect_with_handler(addr, config, handler).await
    }
}

fn parse_field<const N: usize>(
    value: &str,
    field: &'static str,
) -> SmppResult<crate::datatypes::FixedString<N>> {
    crate::datatypes::FixedString::try_from(value).map_err(|e| {
        SmppError::Protocol(CodecError::Field {
            field,
            reason: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_validated_config() {
        let (addr, config) = ClientBuilder::new("localhost:2775")
            .system_id("test_client")
            .password("password")
            .system_type("VMS")
            .response_timeout(Duration::from_secs(5))
            .into_config()
            .unwrap();

        assert_eq!(addr, "localhost:2775");
        assert_eq!(config.system_id.as_str(), "test_client");
        assert_eq!(config.password.as_str(), "password");
        assert_eq!(config.system_type.as_str(), "VMS");
        assert_eq!(config.response_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overlong_password_is_rejected() {
        let err = ClientBuilder::new("localhost:2775")
            .system_id("c1")
            .password("way_too_long_password")
            .into_config()
            .unwrap_err();
        assert!(matches!(
            err,
            SmppError::Protocol(CodecError::Field {
                field: "password",
                ..
            })
        ));
    }
}
