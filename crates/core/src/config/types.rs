use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::library::QualityTier;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchPreferences,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8181
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("encore.db")
}

/// Which provider class is asked first.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPreference {
    /// Usenet first, torrents only when Usenet found nothing.
    #[default]
    NzbFirst,
    /// Torrents first, Usenet only when torrents found nothing.
    TorrentFirst,
    /// Query both and concatenate, Usenet results first.
    Both,
}

/// User preferences that drive filtering and ranking.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchPreferences {
    #[serde(default)]
    pub quality: QualityTier,
    /// Target bitrate in kbps for the preferred-bitrate tier.
    #[serde(default)]
    pub preferred_bitrate: Option<u32>,
    /// Lower size bound as a percentage of the target size.
    #[serde(default)]
    pub bitrate_low_buffer: Option<u32>,
    /// Upper size bound as a percentage of the target size.
    #[serde(default)]
    pub bitrate_high_buffer: Option<u32>,
    /// Keep lossless releases above the lossy ceiling as a fallback pool.
    #[serde(default)]
    pub allow_lossless: bool,
    #[serde(default)]
    pub lossless_bitrate_from: Option<u32>,
    #[serde(default)]
    pub lossless_bitrate_to: Option<u32>,
    /// Ordered, earlier words weigh more.
    #[serde(default)]
    pub preferred_words: Vec<String>,
    #[serde(default)]
    pub ignored_words: Vec<String>,
    /// Each entry may be an `A OR B` group.
    #[serde(default)]
    pub required_words: Vec<String>,
    #[serde(default)]
    pub ignore_clean_releases: bool,
    #[serde(default)]
    pub prefer: ProviderPreference,
    #[serde(default)]
    pub wait_until_release_date: bool,
    #[serde(default)]
    pub min_seeders: u32,
    /// Per-request timeout for providers, payload fetches and backends.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for SearchPreferences {
    fn default() -> Self {
        Self {
            quality: QualityTier::default(),
            preferred_bitrate: None,
            bitrate_low_buffer: None,
            bitrate_high_buffer: None,
            allow_lossless: false,
            lossless_bitrate_from: None,
            lossless_bitrate_to: None,
            preferred_words: Vec::new(),
            ignored_words: Vec::new(),
            required_words: Vec::new(),
            ignore_clean_releases: false,
            prefer: ProviderPreference::default(),
            wait_until_release_date: false,
            min_seeders: 0,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

/// Search providers, one typed record per endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub torznab: Vec<TorznabProviderConfig>,
    #[serde(default)]
    pub newznab: Vec<NewznabProviderConfig>,
}

impl ProvidersConfig {
    /// Seed ratios keyed by provider id. Providers without a ratio are absent.
    pub fn seed_ratios(&self) -> HashMap<String, f64> {
        self.torznab
            .iter()
            .filter_map(|p| p.seed_ratio.map(|r| (p.id.clone(), r)))
            .collect()
    }
}

/// A Jackett (or compatible) indexer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorznabProviderConfig {
    /// Provider id used in logs, history and seed-ratio lookup.
    pub id: String,
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Indexer name as known to Jackett.
    pub indexer: String,
    pub api_key: String,
    #[serde(default)]
    pub seed_ratio: Option<f64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Download links need the uploader's payload rather than a URL hand-off.
    #[serde(default)]
    pub requires_payload: bool,
}

/// A Newznab Usenet indexer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewznabProviderConfig {
    pub id: String,
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Usenet download clients.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NzbBackendKind {
    Sabnzbd,
    Nzbget,
    Blackhole,
}

/// Torrent download clients.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TorrentBackendKind {
    Blackhole,
    Transmission,
    Deluge,
    Qbittorrent,
    Librqbit,
}

/// What the torrent blackhole does with magnet links.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MagnetPolicy {
    #[default]
    Ignore,
    /// Hand the URI to the OS default handler.
    Open,
    /// Convert through a magnet-to-torrent service.
    Convert,
    /// Write the magnet descriptor as a pseudo-torrent file.
    Embed,
}

/// Download dispatch configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default)]
    pub nzb_backend: Option<NzbBackendKind>,
    #[serde(default)]
    pub torrent_backend: Option<TorrentBackendKind>,
    #[serde(default)]
    pub magnet_policy: MagnetPolicy,
    #[serde(default)]
    pub blackhole: BlackholeConfig,
    /// Label/category applied after submit.
    #[serde(default)]
    pub label: Option<String>,
    /// Move-on-completion directory.
    #[serde(default)]
    pub move_path: Option<String>,
    #[serde(default)]
    pub add_paused: bool,
    #[serde(default)]
    pub sabnzbd: Option<SabnzbdConfig>,
    #[serde(default)]
    pub nzbget: Option<NzbgetConfig>,
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
    #[serde(default)]
    pub transmission: Option<TransmissionConfig>,
    #[serde(default)]
    pub deluge: Option<DelugeConfig>,
    #[serde(default)]
    pub librqbit: Option<LibrqbitConfig>,
}

/// Watched directories for file hand-off.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlackholeConfig {
    #[serde(default)]
    pub nzb_dir: Option<PathBuf>,
    #[serde(default)]
    pub torrent_dir: Option<PathBuf>,
    /// URL templates with `%s` standing for the upper-case info hash.
    #[serde(default = "default_conversion_services")]
    pub conversion_services: Vec<String>,
}

impl Default for BlackholeConfig {
    fn default() -> Self {
        Self {
            nzb_dir: None,
            torrent_dir: None,
            conversion_services: default_conversion_services(),
        }
    }
}

fn default_conversion_services() -> Vec<String> {
    vec![
        "https://itorrents.org/torrent/%s.torrent".to_string(),
        "https://cache.torrentgalaxy.org/get/%s".to_string(),
        "https://www.seedpeer.me/torrent/%s".to_string(),
    ]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SabnzbdConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NzbgetConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// qBittorrent WebUI configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub download_path: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransmissionConfig {
    /// RPC endpoint, e.g. "http://localhost:9091/transmission/rpc"
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DelugeConfig {
    /// Web UI base URL; requests go to `{url}/json`.
    pub url: String,
    pub password: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Embedded librqbit client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibrqbitConfig {
    pub download_path: String,
    #[serde(default = "default_true")]
    pub enable_dht: bool,
    #[serde(default)]
    pub listen_port: Option<u16>,
    #[serde(default)]
    pub persistence_path: Option<String>,
}

/// Notification channels
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    #[serde(default = "default_notify_buffer")]
    pub buffer_size: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook: None,
            slack: None,
            buffer_size: default_notify_buffer(),
        }
    }
}

fn default_notify_buffer() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_true")]
    pub on_snatch: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlackConfig {
    pub webhook_url: String,
    #[serde(default = "default_true")]
    pub on_snatch: bool,
}

/// Automatic wanted-album search
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    360
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SearchPreferences,
    pub providers: Vec<SanitizedProvider>,
    pub download: SanitizedDownloadConfig,
    pub notifications: Vec<String>,
    pub scheduler: SchedulerConfig,
}

/// Provider entry with the API key hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProvider {
    pub id: String,
    pub kind: String,
    pub url: String,
    pub api_key_configured: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloadConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nzb_backend: Option<NzbBackendKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_backend: Option<TorrentBackendKind>,
    pub magnet_policy: MagnetPolicy,
    pub clients_configured: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let torznab = config.providers.torznab.iter().map(|p| SanitizedProvider {
            id: p.id.clone(),
            kind: "torznab".to_string(),
            url: p.url.clone(),
            api_key_configured: !p.api_key.is_empty(),
            enabled: p.enabled,
        });
        let newznab = config.providers.newznab.iter().map(|p| SanitizedProvider {
            id: p.id.clone(),
            kind: "newznab".to_string(),
            url: p.url.clone(),
            api_key_configured: !p.api_key.is_empty(),
            enabled: p.enabled,
        });

        let d = &config.download;
        let clients_configured = [
            ("sabnzbd", d.sabnzbd.is_some()),
            ("nzbget", d.nzbget.is_some()),
            ("qbittorrent", d.qbittorrent.is_some()),
            ("transmission", d.transmission.is_some()),
            ("deluge", d.deluge.is_some()),
            ("librqbit", d.librqbit.is_some()),
        ]
        .into_iter()
        .filter(|(_, present)| *present)
        .map(|(name, _)| name.to_string())
        .collect();

        let mut notifications = Vec::new();
        if config.notifications.webhook.is_some() {
            notifications.push("webhook".to_string());
        }
        if config.notifications.slack.is_some() {
            notifications.push("slack".to_string());
        }

        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            search: config.search.clone(),
            providers: torznab.chain(newznab).collect(),
            download: SanitizedDownloadConfig {
                nzb_backend: d.nzb_backend,
                torrent_backend: d.torrent_backend,
                magnet_policy: d.magnet_policy,
                clients_configured,
            },
            notifications,
            scheduler: config.scheduler.clone(),
        }
    }
}
