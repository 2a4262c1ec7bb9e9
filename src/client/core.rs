//! Trigger-driven table client.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ConfigWatcher;
use crate::error::{Error, Result};
use crate::protocol::{Response, TableRequest};
use crate::table::RandomTable;
use crate::transport::TableConnection;

use super::options::{ClientOptions, ConfigPolicy};

// ============================================================================
// ParameterSource
// ============================================================================

/// Where each cycle gets `min`, `max` and `cols` from.
#[derive(Debug, Clone)]
pub enum ParameterSource {
    /// The trigger line itself is `min,max,cols`.
    Prompted,
    /// The same request every cycle.
    Fixed(TableRequest),
    /// Read fresh from a configuration store every cycle.
    Watched(ConfigWatcher),
}

impl ParameterSource {
    /// Prompt shown before waiting for a trigger.
    #[must_use]
    pub const fn prompt(&self) -> &'static str {
        match self {
            Self::Prompted => "Enter 3 numbers min,max,cols separated by commas: ",
            Self::Fixed(_) | Self::Watched(_) => "Press [Enter] to fetch a new table: ",
        }
    }
}

/// How a cycle's parameters were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterOrigin {
    /// Parsed from the trigger line.
    Trigger,
    /// Fixed at startup.
    Fixed,
    /// Read from the store this cycle.
    Fresh,
    /// Store unavailable; reused from an earlier cycle.
    LastKnownGood,
}

// ============================================================================
// CycleReport
// ============================================================================

/// Result of one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Request sent.
    pub request: TableRequest,
    /// Where the request came from.
    pub origin: ParameterOrigin,
    /// Table received.
    pub table: RandomTable,
}

impl CycleReport {
    /// Whether the parameters are stale because the store was unavailable.
    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.origin == ParameterOrigin::LastKnownGood
    }
}

// ============================================================================
// TableClient
// ============================================================================

/// Fetches tables from a server, one cycle per trigger.
///
/// The connection is opened lazily and reused across cycles. Any network
/// failure drops it; the next cycle reconnects.
#[derive(Debug)]
pub struct TableClient {
    options: ClientOptions,
    source: ParameterSource,
    connection: Option<TableConnection>,
    last_known_good: Option<TableRequest>,
}

impl TableClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `options` are invalid.
    pub fn new(options: ClientOptions, source: ParameterSource) -> Result<Self> {
        options.validate()?;

        Ok(Self {
            options,
            source,
            connection: None,
            last_known_good: None,
        })
    }

    /// Parameter source.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &ParameterSource {
        &self.source
    }

    /// Options in use.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Whether a connection is currently held.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Runs one cycle: parameters, request, response.
    ///
    /// `trigger` is the line that started the cycle; only
    /// [`ParameterSource::Prompted`] reads it.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the parameters do not form a valid request
    /// - [`Error::ConfigUnavailable`] if the store cannot be read and the
    ///   policy does not allow reuse
    /// - [`Error::Rejected`] if the server answers `ERROR:`
    /// - network errors if the server is unreachable or the response is
    ///   malformed
    pub async fn cycle(&mut self, trigger: &str) -> Result<CycleReport> {
        let (request, origin) = self.parameters(trigger).await?;
        debug!(%request, ?origin, "Cycle parameters");

        let table = match self.exchange(&request).await? {
            Response::Table(table) => table,
            Response::Error(reason) => return Err(Error::rejected(reason)),
        };

        if !table.covers(&request) {
            self.connection = None;
            return Err(Error::protocol(format!(
                "table does not match request {request}"
            )));
        }

        Ok(CycleReport {
            request,
            origin,
            table,
        })
    }

    /// Closes the held connection, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the shutdown fails.
    pub async fn disconnect(&mut self) -> Result<()> {
        match self.connection.take() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }

    async fn parameters(&mut self, trigger: &str) -> Result<(TableRequest, ParameterOrigin)> {
        let watcher = match &self.source {
            ParameterSource::Prompted => {
                return Ok((TableRequest::parse(trigger)?, ParameterOrigin::Trigger));
            }
            ParameterSource::Fixed(request) => return Ok((*request, ParameterOrigin::Fixed)),
            ParameterSource::Watched(watcher) => watcher,
        };

        match watcher.fetch().await {
            Ok(config) => {
                let request = config.to_request()?;
                self.last_known_good = Some(request);
                Ok((request, ParameterOrigin::Fresh))
            }
            Err(e @ Error::ConfigUnavailable { .. }) => {
                match (self.options.config_policy, self.last_known_good) {
                    (ConfigPolicy::ReuseLastKnownGood, Some(request)) => {
                        warn!(
                            error = %e,
                            %request,
                            "Configuration unavailable, reusing last known good"
                        );
                        Ok((request, ParameterOrigin::LastKnownGood))
                    }
                    _ => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn exchange(&mut self, request: &TableRequest) -> Result<Response> {
        let connection = match &mut self.connection {
            Some(connection) => connection,
            slot @ None => {
                let addr = self.options.server_addr();
                let connection = TableConnection::connect(&addr, self.options.connect_timeout).await?;
                slot.insert(connection)
            }
        };

        let result = connection
            .exchange(
                request,
                self.options.response_timeout,
                self.options.max_response_bytes,
            )
            .await;

        if let Err(e) = &result {
            debug!(error = %e, "Dropping connection");
            self.connection = None;
        }

        result
    }
}

// ============================================================================
// Tests
// ============================================================================
