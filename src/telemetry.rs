//! Shared telemetry bootstrap for Replicant binaries.

use crate::{Error, Result};

use opentelemetry::global;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ATTR_SERVICE_NAME: &str = "service.name";
const ATTR_SERVICE_NAMESPACE: &str = "service.namespace";
const ATTR_COMPONENT: &str = "replicant.component";
const ATTR_RUN_ID: &str = "replicant.run_id";
const DEFAULT_NAMESPACE: &str = "replicant";

/// Resource identity of a Replicant process.
///
/// `service.name` and `replicant.component` always come from the process
/// itself; `OTEL_RESOURCE_ATTRIBUTES` may add to them or set the namespace
/// but never rename the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub component: String,
    pub run_id: Option<String>,
    pub resource_attributes: BTreeMap<String, String>,
}

impl TelemetryConfig {
    pub fn from_env(component: &str) -> Result<Self> {
        Self::build(
            component,
            std::env::var("OTEL_SERVICE_NAME").ok().as_deref(),
            std::env::var("REPLICANT_TELEMETRY_RUN_ID").ok().as_deref(),
            std::env::var("OTEL_RESOURCE_ATTRIBUTES").ok().as_deref(),
        )
    }

    fn build(
        component: &str,
        service_name: Option<&str>,
        run_id: Option<&str>,
        extra: Option<&str>,
    ) -> Result<Self> {
        let service_name = service_name.unwrap_or(component).trim();
        if service_name.is_empty() {
            return Err(Error::Config("OTEL_SERVICE_NAME cannot be empty".to_string()));
        }
        let run_id = run_id.map(str::trim).filter(|s| !s.is_empty());

        let mut attrs: BTreeMap<String, String> = match extra {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|pair| !pair.is_empty())
                .map(resource_attribute)
                .collect::<Result<_>>()?,
            None => BTreeMap::new(),
        };
        attrs
            .entry(ATTR_SERVICE_NAMESPACE.to_string())
            .or_insert_with(|| DEFAULT_NAMESPACE.to_string());
        attrs.insert(ATTR_SERVICE_NAME.to_string(), service_name.to_string());
        attrs.insert(ATTR_COMPONENT.to_string(), component.to_string());
        if let Some(run_id) = run_id {
            attrs.insert(ATTR_RUN_ID.to_string(), run_id.to_string());
        }

        Ok(Self {
            service_name: service_name.to_string(),
            component: component.to_string(),
            run_id: run_id.map(str::to_string),
            resource_attributes: attrs,
        })
    }

    fn resource(&self) -> Resource {
        let attrs = self
            .resource_attributes
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()));
        Resource::default().merge(&Resource::new(attrs))
    }
}

fn resource_attribute(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        Some(_) => Err(Error::Config(format!(
            "OTEL_RESOURCE_ATTRIBUTES entry '{pair}' has an empty key"
        ))),
        None => Err(Error::Config(format!(
            "OTEL_RESOURCE_ATTRIBUTES entry '{pair}' is not key=value"
        ))),
    }
}

/// Keeps the meter provider alive; flushes it on drop.
pub struct Telemetry {
    config: TelemetryConfig,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    /// JSON logs on stderr plus the global meter provider. `RUST_LOG`, when
    /// set, takes precedence over `log_level`.
    pub fn init_for_component(component: &str, log_level: &str) -> Result<Self> {
        let config = TelemetryConfig::from_env(component)?;
        let level = Level::from_str(log_level.trim())
            .map_err(|_| Error::Config(format!("invalid log level '{log_level}'")))?;
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

        FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init()
            .map_err(|e| Error::Config(format!("failed to initialize log subscriber: {e}")))?;

        let meter_provider = SdkMeterProvider::builder()
            .with_resource(config.resource())
            .build();
        global::set_meter_provider(meter_provider.clone());

        info!(
            service_name = %config.service_name,
            component = %config.component,
            run_id = config.run_id.as_deref().unwrap_or("none"),
            "Telemetry initialized"
        );

        Ok(Self {
            config,
            meter_provider,
        })
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let _ = self.meter_provider.shutdown();
    }
}
