//! Server kinds and their phase capability tables.
//!
//! Which resource types exist (and in what dependency order they must be
//! reconciled) depends on the server kind. Each kind maps to an explicit
//! ordered phase list; nothing else in the codebase branches on the kind
//! string.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// A supported media-automation server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Sonarr,
    Radarr,
    Lidarr,
    Prowlarr,
}

/// One step of a sync run. Phases run in the order the capability table
/// lists them; outputs of earlier phases (the tag map, compiled formats,
/// profile ids) feed later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Expand declared custom formats and quality profiles via the
    /// injected compiler.
    CompileFormats,
    /// Build the tag label → id reference map, creating missing tags.
    ResolveTags,
    DownloadClients,
    AppProfiles,
    /// Indexers reference app-profile ids, so they follow `AppProfiles`.
    Indexers,
    Applications,
    IndexerProxies,
    /// Update-only: existing quality definitions are patched by title.
    QualityDefinitions,
    CustomFormats,
    /// Quality profiles embed per-custom-format scores, so they follow
    /// `CustomFormats`.
    QualityProfiles,
    /// Root folders declared as a bare list of paths: create missing,
    /// remove undeclared, never update.
    RootFolderPaths,
    /// Root folders as a named collection with per-folder profile and tag
    /// defaults, which need the profile reference maps.
    RootFolders,
    Notifications,
    /// Generic patch of the residual `config` settings tree.
    ConfigTree,
}

const SONARR_PHASES: &[Phase] = &[
    Phase::CompileFormats,
    Phase::ResolveTags,
    Phase::DownloadClients,
    Phase::QualityDefinitions,
    Phase::CustomFormats,
    Phase::QualityProfiles,
    Phase::RootFolderPaths,
    Phase::Notifications,
    Phase::ConfigTree,
];

const LIDARR_PHASES: &[Phase] = &[
    Phase::ResolveTags,
    Phase::DownloadClients,
    Phase::QualityDefinitions,
    Phase::RootFolders,
    Phase::Notifications,
    Phase::ConfigTree,
];

const PROWLARR_PHASES: &[Phase] = &[
    Phase::ResolveTags,
    Phase::DownloadClients,
    Phase::AppProfiles,
    Phase::Indexers,
    Phase::Applications,
    Phase::IndexerProxies,
    Phase::Notifications,
    Phase::ConfigTree,
];

impl ServerKind {
    /// API version path requests are issued under.
    pub fn api_path(&self) -> &'static str {
        match self {
            ServerKind::Sonarr | ServerKind::Radarr => "/api/v3",
            ServerKind::Lidarr | ServerKind::Prowlarr => "/api/v1",
        }
    }

    /// Ordered phases applicable to this kind.
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            ServerKind::Sonarr | ServerKind::Radarr => SONARR_PHASES,
            ServerKind::Lidarr => LIDARR_PHASES,
            ServerKind::Prowlarr => PROWLARR_PHASES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerKind::Sonarr => "sonarr",
            ServerKind::Radarr => "radarr",
            ServerKind::Lidarr => "lidarr",
            ServerKind::Prowlarr => "prowlarr",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sonarr" => Ok(ServerKind::Sonarr),
            "radarr" => Ok(ServerKind::Radarr),
            "lidarr" => Ok(ServerKind::Lidarr),
            "prowlarr" => Ok(ServerKind::Prowlarr),
            other => Err(format!("unknown server type: {other}")),
        }
    }
}
