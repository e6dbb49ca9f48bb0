use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::credentials::Credential;

use super::{binance, bybit, gate, okx, ExchangeClient, ExchangeError};

/// Builds a connected client for one account of a venue.
pub type VenueConstructor = Box<
    dyn Fn(&Credential, &VenueOptions) -> Result<Box<dyn ExchangeClient>, ExchangeError>
        + Send
        + Sync,
>;

/// Settings shared by every venue connector in a run.
#[derive(Clone)]
pub struct VenueOptions {
    /// Currency equity figures are expressed in.
    pub quote: String,
    pub request_timeout: Duration,
    pub clock: Arc<dyn Clock>,
    /// Per-exchange base URL overrides (tests, proxies, testnets).
    pub base_urls: HashMap<String, String>,
}

impl Default for VenueOptions {
    fn default() -> Self {
        Self {
            quote: "USDT".to_string(),
            request_timeout: Duration::from_secs(20),
            clock: Arc::new(SystemClock),
            base_urls: HashMap::new(),
        }
    }
}

impl VenueOptions {
    pub fn with_quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = quote.into().to_uppercase();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_base_url(mut self, exchange: impl Into<String>, url: impl Into<String>) -> Self {
        self.base_urls.insert(exchange.into(), url.into());
        self
    }

    pub fn base_url<'a>(&'a self, exchange: &str, default: &'a str) -> &'a str {
        self.base_urls
            .get(exchange)
            .map(String::as_str)
            .unwrap_or(default)
    }
}

/// Exchange id → connector constructor.
///
/// Adding a venue means registering one constructor; nothing else in the
/// pipeline branches on exchange identity.
pub struct ExchangeRegistry {
    venues: HashMap<String, VenueConstructor>,
    options: VenueOptions,
}

impl ExchangeRegistry {
    /// A registry with no venues.
    pub fn empty(options: VenueOptions) -> Self {
        Self {
            venues: HashMap::new(),
            options,
        }
    }

    /// Binance, OKX, Gate and Bybit.
    pub fn with_default_venues(options: VenueOptions) -> Self {
        Self::empty(options)
            .with_venue(binance::ID, |credential, options| {
                Ok(Box::new(binance::BinanceClient::new(credential.clone(), options)?))
            })
            .with_venue(okx::ID, |credential, options| {
                Ok(Box::new(okx::OkxClient::new(credential.clone(), options)?))
            })
            .with_venue(gate::ID, |credential, options| {
                Ok(Box::new(gate::GateClient::new(credential.clone(), options)?))
            })
            .with_venue(bybit::ID, |credential, options| {
                Ok(Box::new(bybit::BybitClient::new(credential.clone(), options)?))
            })
    }

    pub fn with_venue<F>(mut self, id: &str, constructor: F) -> Self
    where
        F: Fn(&Credential, &VenueOptions) -> Result<Box<dyn ExchangeClient>, ExchangeError>
            + Send
            + Sync
            + 'static,
    {
        self.register(id, constructor);
        self
    }

    pub fn register<F>(&mut self, id: &str, constructor: F)
    where
        F: Fn(&Credential, &VenueOptions) -> Result<Box<dyn ExchangeClient>, ExchangeError>
            + Send
            + Sync
            + 'static,
    {
        self.venues.insert(id.to_lowercase(), Box::new(constructor));
    }

    pub fn supports(&self, id: &str) -> bool {
        self.venues.contains_key(&id.to_lowercase())
    }

    pub fn options(&self) -> &VenueOptions {
        &self.options
    }

    pub fn create(
        &self,
        id: &str,
        credential: &Credential,
    ) -> Result<Box<dyn ExchangeClient>, ExchangeError> {
        let constructor = self
            .venues
            .get(&id.to_lowercase())
            .ok_or_else(|| ExchangeError::UnknownExchange(id.to_string()))?;
        constructor(credential, &self.options)
    }
}
