use std::collections::HashSet;

use super::{
    types::{Config, MagnetPolicy, NzbBackendKind, TorrentBackendKind},
    ConfigError,
};
use crate::library::QualityTier;

/// Validate cross-field configuration rules that serde cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    validate_search(config)?;
    validate_providers(config)?;
    validate_download(config)?;

    if config.scheduler.enabled && config.scheduler.interval_minutes == 0 {
        return Err(invalid("scheduler.interval_minutes must be positive"));
    }

    Ok(())
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

fn validate_search(config: &Config) -> Result<(), ConfigError> {
    let search = &config.search;

    if search.quality == QualityTier::PreferredBitrate
        && search.preferred_bitrate.unwrap_or(0) == 0
    {
        return Err(invalid(
            "search.preferred_bitrate is required for the preferred_bitrate tier",
        ));
    }

    if let (Some(low), Some(high)) = (search.bitrate_low_buffer, search.bitrate_high_buffer) {
        if low > high {
            return Err(invalid(format!(
                "search.bitrate_low_buffer ({}) exceeds bitrate_high_buffer ({})",
                low, high
            )));
        }
    }

    if let (Some(from), Some(to)) = (search.lossless_bitrate_from, search.lossless_bitrate_to) {
        if from > to {
            return Err(invalid(format!(
                "search.lossless_bitrate_from ({}) exceeds lossless_bitrate_to ({})",
                from, to
            )));
        }
    }

    if search.timeout_secs == 0 {
        return Err(invalid("search.timeout_secs must be positive"));
    }

    Ok(())
}

fn validate_providers(config: &Config) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    let ids = config
        .providers
        .torznab
        .iter()
        .map(|p| &p.id)
        .chain(config.providers.newznab.iter().map(|p| &p.id));

    for id in ids {
        if id.trim().is_empty() {
            return Err(invalid("provider id cannot be empty"));
        }
        if !seen.insert(id.to_lowercase()) {
            return Err(invalid(format!("duplicate provider id: {}", id)));
        }
    }

    for p in &config.providers.torznab {
        if let Some(ratio) = p.seed_ratio {
            if ratio < 0.0 {
                return Err(invalid(format!("provider {}: seed_ratio is negative", p.id)));
            }
        }
    }

    Ok(())
}

fn validate_download(config: &Config) -> Result<(), ConfigError> {
    let d = &config.download;

    match d.nzb_backend {
        Some(NzbBackendKind::Sabnzbd) if d.sabnzbd.is_none() => {
            return Err(invalid("nzb_backend = sabnzbd requires [download.sabnzbd]"));
        }
        Some(NzbBackendKind::Nzbget) if d.nzbget.is_none() => {
            return Err(invalid("nzb_backend = nzbget requires [download.nzbget]"));
        }
        Some(NzbBackendKind::Blackhole) if d.blackhole.nzb_dir.is_none() => {
            return Err(invalid("nzb_backend = blackhole requires blackhole.nzb_dir"));
        }
        _ => {}
    }

    match d.torrent_backend {
        Some(TorrentBackendKind::Blackhole) if d.blackhole.torrent_dir.is_none() => {
            return Err(invalid(
                "torrent_backend = blackhole requires blackhole.torrent_dir",
            ));
        }
        Some(TorrentBackendKind::Transmission) if d.transmission.is_none() => {
            return Err(invalid(
                "torrent_backend = transmission requires [download.transmission]",
            ));
        }
        Some(TorrentBackendKind::Deluge) if d.deluge.is_none() => {
            return Err(invalid("torrent_backend = deluge requires [download.deluge]"));
        }
        Some(TorrentBackendKind::Qbittorrent) if d.qbittorrent.is_none() => {
            return Err(invalid(
                "torrent_backend = qbittorrent requires [download.qbittorrent]",
            ));
        }
        Some(TorrentBackendKind::Librqbit) if d.librqbit.is_none() => {
            return Err(invalid("torrent_backend = librqbit requires [download.librqbit]"));
        }
        _ => {}
    }

    if d.torrent_backend == Some(TorrentBackendKind::Blackhole)
        && d.magnet_policy == MagnetPolicy::Convert
        && d.blackhole.conversion_services.is_empty()
    {
        return Err(invalid(
            "magnet_policy = convert requires at least one conversion service",
        ));
    }

    Ok(())
}
