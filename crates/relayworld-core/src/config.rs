//! Configuration loading and typed config structures for a Relayworld client.
//!
//! The canonical configuration lives in `relayworld.yaml` at the project
//! root. Every field has a default, so an empty file (or no file at all)
//! yields a working offline client.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Duration;
use serde::Deserialize;

use relayworld_events::CodecLimits;
use relayworld_types::{ActorId, Position, Resource};
use relayworld_world::{ConflictPolicy, NodeRules, ResourceRules, SeedLayout};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration. Mirrors `relayworld.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Who this client acts as.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// World extent, seed, and tiling.
    #[serde(default)]
    pub world: WorldConfig,

    /// Resource node lifecycle.
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// Land claim durations.
    #[serde(default)]
    pub claims: ClaimsConfig,

    /// Building rules.
    #[serde(default)]
    pub structures: StructuresConfig,

    /// Reconciliation and validation limits.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Relay connections.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Lifecycle tick cadence.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `RELAYWORLD_RELAYS` (comma separated) overrides `transport.relays`
    /// - `RELAYWORLD_ACTOR` overrides `identity.actor`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse_yaml(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_yaml(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override identity and relay list from the environment when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RELAYWORLD_RELAYS") {
            self.transport.relays = split_relays(&val);
        }
        if let Ok(val) = std::env::var("RELAYWORLD_ACTOR") {
            self.identity.actor = val;
        }
    }

    /// The local actor id.
    pub fn actor(&self) -> ActorId {
        ActorId::new(self.identity.actor.trim())
    }

    /// Validation limits for the event codec.
    pub fn codec_limits(&self) -> CodecLimits {
        CodecLimits {
            max_future_skew: seconds(self.reconcile.max_future_skew_secs),
            max_claim_duration: seconds(self.claims.max_duration_secs),
            max_content_bytes: self.reconcile.max_content_bytes,
        }
    }

    /// Resource node rules.
    pub fn resource_rules(&self) -> ResourceRules {
        ResourceRules {
            seed: self.world.seed,
            respawn_delay: seconds(self.resources.respawn_delay_secs),
            gather_range: self.resources.gather_range,
            per_resource: self.resources.per_resource.clone(),
        }
    }

    /// Layout used to seed resource nodes.
    pub fn seed_layout(&self) -> SeedLayout {
        SeedLayout {
            width: self.world.width,
            height: self.world.height,
            counts: self.world.nodes.clone(),
        }
    }
}

fn split_relays(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
        .min(Duration::days(36_500))
}

/// Identity of the local actor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdentityConfig {
    /// Public key (or other stable id) the local client signs as.
    #[serde(default = "default_actor")]
    pub actor: String,

    /// Starting x position.
    #[serde(default = "default_spawn")]
    pub spawn_x: f64,

    /// Starting y position.
    #[serde(default = "default_spawn")]
    pub spawn_y: f64,
}

impl IdentityConfig {
    /// Starting position.
    pub const fn spawn(&self) -> Position {
        Position::new(self.spawn_x, self.spawn_y)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            actor: default_actor(),
            spawn_x: default_spawn(),
            spawn_y: default_spawn(),
        }
    }
}

/// World extent, seed, and tiling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Seed shared by every client of the same world.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Width of the seeded area.
    #[serde(default = "default_extent")]
    pub width: f64,

    /// Height of the seeded area.
    #[serde(default = "default_extent")]
    pub height: f64,

    /// Edge length of a land region.
    #[serde(default = "default_region_size")]
    pub region_size: f64,

    /// Edge length of a collision grid cell.
    #[serde(default = "default_grid_cell_size")]
    pub grid_cell_size: f64,

    /// Seeded node count per resource type.
    #[serde(default = "default_node_counts")]
    pub nodes: BTreeMap<Resource, u32>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            width: default_extent(),
            height: default_extent(),
            region_size: default_region_size(),
            grid_cell_size: default_grid_cell_size(),
            nodes: default_node_counts(),
        }
    }
}

/// Resource node lifecycle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourcesConfig {
    /// Seconds between depletion and respawn.
    #[serde(default = "default_respawn_delay_secs")]
    pub respawn_delay_secs: u64,

    /// Maximum distance between gatherer and node.
    #[serde(default = "default_gather_range")]
    pub gather_range: f64,

    /// Per-resource yield range and gather duration.
    #[serde(default)]
    pub per_resource: BTreeMap<Resource, NodeRules>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            respawn_delay_secs: default_respawn_delay_secs(),
            gather_range: default_gather_range(),
            per_resource: BTreeMap::new(),
        }
    }
}

/// Land claim durations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClaimsConfig {
    /// Lifetime of a claim made by this client.
    #[serde(default = "default_claim_duration_secs")]
    pub duration_secs: u64,

    /// Longest claim window accepted from any peer.
    #[serde(default = "default_max_claim_duration_secs")]
    pub max_duration_secs: u64,

    /// Prefix of the tokens issued by the built-in static payment method.
    /// Empty disables paying for claims submitted without a proof.
    #[serde(default = "default_payment_prefix")]
    pub payment_prefix: String,
}

impl ClaimsConfig {
    /// Lifetime of a locally made claim.
    pub fn duration(&self) -> Duration {
        seconds(self.duration_secs.min(self.max_duration_secs))
    }
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_claim_duration_secs(),
            max_duration_secs: default_max_claim_duration_secs(),
            payment_prefix: default_payment_prefix(),
        }
    }
}

/// Building rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StructuresConfig {
    /// Refuse building on regions nobody has claimed.
    #[serde(default)]
    pub require_claim_to_build: bool,

    /// Charge the material cost from the builder's inventory.
    #[serde(default = "default_true")]
    pub consume_materials: bool,

    /// Remove structures whose health has decayed to zero.
    #[serde(default = "default_true")]
    pub decay_enabled: bool,
}

impl Default for StructuresConfig {
    fn default() -> Self {
        Self {
            require_claim_to_build: false,
            consume_materials: true,
            decay_enabled: true,
        }
    }
}

/// Reconciliation and validation limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconcileConfig {
    /// How contested claims and placements are settled.
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Applied event ids remembered for duplicate suppression.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Events waiting for the entity they reference.
    #[serde(default = "default_deferred_capacity")]
    pub deferred_capacity: usize,

    /// Local events awaiting their echo. The oldest is forgotten when full.
    #[serde(default = "default_pending_capacity")]
    pub pending_capacity: usize,

    /// Seconds an event may be stamped ahead of the local clock.
    #[serde(default = "default_max_future_skew_secs")]
    pub max_future_skew_secs: u64,

    /// Largest accepted content string, in bytes.
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            dedup_capacity: default_dedup_capacity(),
            deferred_capacity: default_deferred_capacity(),
            pending_capacity: default_pending_capacity(),
            max_future_skew_secs: default_max_future_skew_secs(),
            max_content_bytes: default_max_content_bytes(),
        }
    }
}

/// Relay connections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// Relay URLs. Empty runs the client offline against an in-memory relay.
    #[serde(default = "default_relays")]
    pub relays: Vec<String>,

    /// Subject prefix; events travel on `<prefix>.<kind>`.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Capacity of the inbound event queue.
    #[serde(default = "default_inbound_buffer")]
    pub inbound_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            relays: default_relays(),
            subject_prefix: default_subject_prefix(),
            inbound_buffer: default_inbound_buffer(),
        }
    }
}

/// Lifecycle tick cadence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Real-time milliseconds between lifecycle ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Log world stats every N ticks. Zero disables.
    #[serde(default = "default_stats_every_ticks")]
    pub stats_every_ticks: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            stats_every_ticks: default_stats_every_ticks(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_actor() -> String {
    "local-player".to_owned()
}

const fn default_spawn() -> f64 {
    500.0
}

const fn default_seed() -> u64 {
    42
}

const fn default_extent() -> f64 {
    1000.0
}

const fn default_region_size() -> f64 {
    100.0
}

const fn default_grid_cell_size() -> f64 {
    8.0
}

fn default_node_counts() -> BTreeMap<Resource, u32> {
    SeedLayout::default().counts
}

const fn default_respawn_delay_secs() -> u64 {
    300
}

const fn default_gather_range() -> f64 {
    50.0
}

const fn default_claim_duration_secs() -> u64 {
    7 * 24 * 3600
}

const fn default_max_claim_duration_secs() -> u64 {
    30 * 24 * 3600
}

fn default_payment_prefix() -> String {
    "static".to_owned()
}

const fn default_dedup_capacity() -> usize {
    10_000
}

const fn default_deferred_capacity() -> usize {
    256
}

const fn default_pending_capacity() -> usize {
    1024
}

const fn default_max_future_skew_secs() -> u64 {
    600
}

const fn default_max_content_bytes() -> usize {
    16 * 1024
}

fn default_relays() -> Vec<String> {
    vec!["nats://localhost:4222".to_owned()]
}

fn default_subject_prefix() -> String {
    "relayworld.events".to_owned()
}

const fn default_inbound_buffer() -> usize {
    1024
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_stats_every_ticks() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
