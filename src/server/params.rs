use url::form_urlencoded;

use crate::analytics::{TrendMode, ALLOWED_WINDOW_DAYS};
use crate::service::DashboardRequest;

/// Raw query string of the dashboard routes.
///
/// Everything is kept as text so malformed values normalize to defaults
/// instead of rejecting the request.
#[derive(Debug, Default)]
pub struct DashboardQuery {
    pub window: Option<String>,
    pub trend_mode: Option<String>,
    pub network: Option<String>,
}

impl DashboardQuery {
    /// First occurrence wins for repeated keys; unknown keys are ignored.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        for (key, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "window" => &mut query.window,
                "trend_mode" => &mut query.trend_mode,
                "network" => &mut query.network,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }

    pub fn to_request(&self, default_window_days: u32) -> DashboardRequest {
        DashboardRequest {
            window_days: resolve_window(self.window.as_deref(), default_window_days),
            mode: TrendMode::from_param(self.trend_mode.as_deref()),
            include_network: parse_network_flag(self.network.as_deref()),
        }
    }
}

/// Parse, clamp to `1..=365`, then keep only allow-listed windows.
pub fn resolve_window(raw: Option<&str>, default_window_days: u32) -> u32 {
    let Some(days) = raw.and_then(|s| s.trim().parse::<i64>().ok()) else {
        return default_window_days;
    };
    let days = u32::try_from(days.clamp(1, 365)).unwrap_or(default_window_days);
    if ALLOWED_WINDOW_DAYS.contains(&days) {
        days
    } else {
        default_window_days
    }
}

/// Absent or unrecognized values enable the network section.
pub fn parse_network_flag(raw: Option<&str>) -> bool {
    !matches!(
        raw.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("0" | "false" | "off" | "no")
    )
}

/// Canonical URL used when the request carried no window.
pub fn redirect_target(default_window_days: u32, network: Option<&str>) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("window", &default_window_days.to_string())
        .append_pair("trend_mode", TrendMode::Trending.as_str())
        .append_pair("network", network.unwrap_or("1"))
        .finish();
    format!("/?{query}")
}
