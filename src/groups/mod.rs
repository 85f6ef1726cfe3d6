//! Group registry: maps every world id to exactly one inventory group.
//!
//! Resolution order is fixed: explicit world membership wins, then patterns
//! are evaluated in declared order (first match wins), then the default
//! group. The registry is immutable during normal operation and replaced
//! wholesale on reload, so concurrent resolvers never see a half-updated
//! rule set.

use regex_lite::Regex;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::snapshot::{GameMode, InventoryBucket};
use crate::validation::{validate_group_name, validate_world_id, NameError};

/// Errors that make a group configuration unusable. All of these are fatal
/// at load time; the engine refuses to start with an invalid registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate group name: {0}")]
    DuplicateGroupName(String),

    #[error("world '{world}' is claimed by both '{first}' and '{second}'")]
    DuplicateWorldClaim {
        world: String,
        first: String,
        second: String,
    },

    #[error("no group is marked as default")]
    NoDefaultGroup,

    #[error("groups '{first}' and '{second}' are both marked as default")]
    MultipleDefaultGroups { first: String, second: String },

    #[error("invalid pattern '{pattern}' in group '{group}': {source}")]
    InvalidPattern {
        group: String,
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },

    #[error("in group '{group}': {source}")]
    InvalidName {
        group: String,
        #[source]
        source: NameError,
    },
}

/// Per-group behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSettings {
    pub separate_gamemode_inventories: bool,
    pub save_ender_chest: bool,
    /// When game modes are separated, fold spectator into survival's bucket.
    pub spectator_shares_survival: bool,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            separate_gamemode_inventories: false,
            save_ender_chest: true,
            spectator_shares_survival: true,
        }
    }
}

impl GroupSettings {
    /// Which bucket a snapshot for the given mode lives in under these
    /// settings.
    pub fn bucket_for(&self, mode: GameMode) -> InventoryBucket {
        if !self.separate_gamemode_inventories {
            return InventoryBucket::Shared;
        }
        match mode {
            GameMode::Spectator if self.spectator_shares_survival => {
                InventoryBucket::Mode(GameMode::Survival)
            }
            other => InventoryBucket::Mode(other),
        }
    }
}

/// A world-matching rule. Patterns are full-match regular expressions over
/// the world id (`world_.*` matches `world_nether` but not `myworld_a`).
#[derive(Debug, Clone)]
pub struct WorldPattern {
    raw: String,
    regex: Regex,
}

impl WorldPattern {
    fn compile(group: &str, raw: &str) -> Result<Self, RegistryError> {
        let regex = Regex::new(&format!("^(?:{})$", raw)).map_err(|source| {
            RegistryError::InvalidPattern {
                group: group.to_string(),
                pattern: raw.to_string(),
                source,
            }
        })?;
        Ok(Self {
            raw: raw.to_string(),
            regex,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, world: &str) -> bool {
        self.regex.is_match(world)
    }
}

/// One configured inventory group.
#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,
    pub is_default: bool,
    pub worlds: Vec<String>,
    pub patterns: Vec<WorldPattern>,
    pub settings: GroupSettings,
}

impl Group {
    pub fn claims_world(&self, world: &str) -> bool {
        self.worlds.iter().any(|w| w == world)
    }

    pub fn matches_pattern(&self, world: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(world))
    }
}

/// Plain input for registry construction; the config layer maps its TOML
/// shape onto this.
#[derive(Debug, Clone)]
pub struct GroupDefinition {
    pub name: String,
    pub is_default: bool,
    pub worlds: Vec<String>,
    pub patterns: Vec<String>,
    pub settings: GroupSettings,
}

/// The validated, immutable rule set behind one registry generation.
#[derive(Debug)]
struct GroupSet {
    groups: Vec<Arc<Group>>,
    by_name: HashMap<String, usize>,
    world_index: HashMap<String, usize>,
    default_index: usize,
}

impl GroupSet {
    fn build(definitions: Vec<GroupDefinition>) -> Result<Self, RegistryError> {
        let mut groups: Vec<Arc<Group>> = Vec::with_capacity(definitions.len());
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut world_index: HashMap<String, usize> = HashMap::new();
        let mut default_index: Option<usize> = None;

        for def in definitions {
            validate_group_name(&def.name).map_err(|source| RegistryError::InvalidName {
                group: def.name.clone(),
                source,
            })?;
            let index = groups.len();
            if by_name.insert(def.name.clone(), index).is_some() {
                return Err(RegistryError::DuplicateGroupName(def.name));
            }

            if def.is_default {
                if let Some(existing) = default_index {
                    return Err(RegistryError::MultipleDefaultGroups {
                        first: groups[existing].name.clone(),
                        second: def.name,
                    });
                }
                default_index = Some(index);
            }

            for world in &def.worlds {
                validate_world_id(world).map_err(|source| RegistryError::InvalidName {
                    group: def.name.clone(),
                    source,
                })?;
                if let Some(&claimed) = world_index.get(world.as_str()) {
                    // claimed == index means the same group listed the world twice
                    let first = if claimed == index {
                        def.name.clone()
                    } else {
                        groups[claimed].name.clone()
                    };
                    return Err(RegistryError::DuplicateWorldClaim {
                        world: world.clone(),
                        first,
                        second: def.name,
                    });
                }
                world_index.insert(world.clone(), index);
            }

            let patterns = def
                .patterns
                .iter()
                .map(|raw| WorldPattern::compile(&def.name, raw))
                .collect::<Result<Vec<_>, _>>()?;

            groups.push(Arc::new(Group {
                name: def.name,
                is_default: def.is_default,
                worlds: def.worlds,
                patterns,
                settings: def.settings,
            }));
        }

        let default_index = default_index.ok_or(RegistryError::NoDefaultGroup)?;

        Ok(Self {
            groups,
            by_name,
            world_index,
            default_index,
        })
    }

    fn resolve(&self, world: &str) -> Arc<Group> {
        if let Some(&index) = self.world_index.get(world) {
            return Arc::clone(&self.groups[index]);
        }
        for group in &self.groups {
            if group.matches_pattern(world) {
                return Arc::clone(group);
            }
        }
        Arc::clone(&self.groups[self.default_index])
    }
}

/// Shared, reloadable view over the configured groups.
///
/// Readers take a cheap clone of the current generation's pointer; `reload`
/// swaps the pointer only after the replacement validates, so a failed
/// reload leaves the previous rules in effect.
#[derive(Debug)]
pub struct GroupRegistry {
    inner: RwLock<Arc<GroupSet>>,
}

impl GroupRegistry {
    pub fn new(definitions: Vec<GroupDefinition>) -> Result<Self, RegistryError> {
        let set = GroupSet::build(definitions)?;
        Ok(Self {
            inner: RwLock::new(Arc::new(set)),
        })
    }

    fn current(&self) -> Arc<GroupSet> {
        Arc::clone(&self.inner.read().expect("group registry lock poisoned"))
    }

    /// Resolve a world to its owning group. Never fails: unmatched worlds
    /// fall back to the default group.
    pub fn resolve(&self, world: &str) -> Arc<Group> {
        self.current().resolve(world)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        let set = self.current();
        set.by_name.get(name).map(|&i| Arc::clone(&set.groups[i]))
    }

    /// All groups in declaration order.
    pub fn all(&self) -> Vec<Arc<Group>> {
        self.current().groups.to_vec()
    }

    pub fn default_group(&self) -> Arc<Group> {
        let set = self.current();
        Arc::clone(&set.groups[set.default_index])
    }

    /// Replace the whole rule set. Builds and validates the new generation
    /// first; in-flight resolutions see either the old or the new set.
    pub fn reload(&self, definitions: Vec<GroupDefinition>) -> Result<(), RegistryError> {
        let set = GroupSet::build(definitions)?;
        *self.inner.write().expect("group registry lock poisoned") = Arc::new(set);
        Ok(())
    }
}
