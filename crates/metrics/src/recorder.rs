//! Metrics recorder initialization.

use {anyhow::Result, tracing::debug};

/// Handle to the installed recorder, used to render a snapshot.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Render collected metrics in Prometheus text format.
    ///
    /// Empty when collection is disabled or the exporter is compiled out.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(|h| h.render())
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
}

/// Install the global recorder.
///
/// Call once at startup. Without the `prometheus` feature, or with
/// `enabled: false`, no recorder is installed and the facade macros stay no-ops.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the exporter
/// rejects its configuration.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        debug!("metrics collection is disabled");
        return Ok(MetricsHandle {
            #[cfg(feature = "prometheus")]
            prometheus_handle: None,
        });
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = init_prometheus()?;
        debug!("prometheus metrics recorder installed");
        Ok(MetricsHandle {
            prometheus_handle: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        debug!("metrics requested but the prometheus exporter is not compiled in");
        Ok(MetricsHandle {})
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    use {
        crate::{buckets, installer},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(installer::INSTALL_DURATION_SECONDS.to_string()),
        &buckets::INSTALL_DURATION,
    )?;

    // install_recorder() installs globally without spawning an HTTP listener.
    Ok(builder.install_recorder()?)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_renders_nothing() {
        let handle = init_metrics(MetricsRecorderConfig::default()).unwrap();
        assert!(handle.render().is_empty());
    }
}
