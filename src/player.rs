//! Player context.
//!
//! Rules see the player through `PlayerInfo` and the ownership helpers
//! (`IsUnownedItem`, `IsUnownedGem`). The caller builds a `PlayerSnapshot`
//! per observation, usually through a `PlayerCache` that rate-limits how
//! often the game state is re-read.

use crate::config::FilterConfig;
use crate::item::{ItemAttributes, ItemSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// Raw player state as a provider reports it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerAttributes {
    pub level: i64,
    pub strength: i64,
    pub dexterity: i64,
    pub intelligence: i64,
    pub equipped: Vec<ItemAttributes>,
    pub inventory: Vec<ItemAttributes>,
}

/// One immutable view of the player.
#[derive(Debug)]
pub struct PlayerSnapshot {
    pub level: i64,
    pub strength: i64,
    pub dexterity: i64,
    pub intelligence: i64,
    pub equipped_items: Vec<Arc<ItemSnapshot>>,
    pub inventory_items: Vec<Arc<ItemSnapshot>>,
    /// Equipped followed by inventory items.
    pub owned_items: Vec<Arc<ItemSnapshot>>,
    /// Owned gems, socketed ones included.
    pub owned_gems: Vec<Arc<ItemSnapshot>>,
}

pub(crate) static EMPTY_PLAYER: PlayerSnapshot = PlayerSnapshot {
    level: 0,
    strength: 0,
    dexterity: 0,
    intelligence: 0,
    equipped_items: Vec::new(),
    inventory_items: Vec::new(),
    owned_items: Vec::new(),
    owned_gems: Vec::new(),
};

fn sorted_ids(items: &[Arc<ItemSnapshot>]) -> Vec<i64> {
    let mut ids: Vec<i64> = items.iter().map(|item| item.id).collect();
    ids.sort_unstable();
    ids
}

impl PlayerSnapshot {
    pub fn new(attrs: PlayerAttributes) -> Self {
        let snapshot = |items: Vec<ItemAttributes>| -> Vec<Arc<ItemSnapshot>> {
            items.into_iter().map(|a| Arc::new(ItemSnapshot::new(a))).collect()
        };
        let equipped_items = snapshot(attrs.equipped);
        let inventory_items = snapshot(attrs.inventory);

        let owned_items: Vec<Arc<ItemSnapshot>> =
            equipped_items.iter().chain(&inventory_items).cloned().collect();
        let owned_gems = owned_items
            .iter()
            .flat_map(|item| std::iter::once(item).chain(&item.socket_info.socketed_gems))
            .filter(|item| item.gem_info.is_gem)
            .cloned()
            .collect();

        Self {
            level: attrs.level,
            strength: attrs.strength,
            dexterity: attrs.dexterity,
            intelligence: attrs.intelligence,
            equipped_items,
            inventory_items,
            owned_items,
            owned_gems,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, crate::FilterError> {
        let attrs: PlayerAttributes = serde_json::from_str(json)?;
        Ok(Self::new(attrs))
    }
}

impl PartialEq for PlayerSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
            && self.strength == other.strength
            && self.dexterity == other.dexterity
            && self.intelligence == other.intelligence
            && sorted_ids(&self.equipped_items) == sorted_ids(&other.equipped_items)
            && sorted_ids(&self.inventory_items) == sorted_ids(&other.inventory_items)
    }
}

/// Reads the current player state.
pub trait PlayerSource: Send + Sync {
    fn snapshot(&self) -> PlayerSnapshot;
}

impl<F> PlayerSource for F
where
    F: Fn() -> PlayerSnapshot + Send + Sync,
{
    fn snapshot(&self) -> PlayerSnapshot {
        self()
    }
}

#[derive(Default)]
struct CacheState {
    refreshed_at: Option<Instant>,
    snapshot: Option<Arc<PlayerSnapshot>>,
}

/// Rate-limited access to a `PlayerSource`.
///
/// `current` re-reads the source at most once per refresh interval. A
/// refresh that yields a snapshot equal to the cached one keeps the cached
/// `Arc`, so callers can detect changes with `Arc::ptr_eq`.
///
/// # Examples
///
/// ```rust
/// use itemfilter::player::{PlayerAttributes, PlayerCache, PlayerSnapshot};
/// use std::sync::Arc;
///
/// let cache = PlayerCache::new(|| PlayerSnapshot::new(PlayerAttributes {
///     level: 90,
///     ..Default::default()
/// }));
///
/// let first = cache.current();
/// assert_eq!(first.level, 90);
/// assert!(Arc::ptr_eq(&first, &cache.current()));
/// ```
pub struct PlayerCache<P> {
    source: P,
    refresh_interval: Duration,
    state: Mutex<CacheState>,
}

impl<P: PlayerSource> PlayerCache<P> {
    pub fn new(source: P) -> Self {
        Self::with_refresh_interval(source, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_refresh_interval(source: P, refresh_interval: Duration) -> Self {
        Self {
            source,
            refresh_interval,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn from_config(source: P, config: &FilterConfig) -> Self {
        Self::with_refresh_interval(source, config.player_refresh_interval())
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// The cached snapshot, refreshed first if it is older than the interval.
    pub fn current(&self) -> Arc<PlayerSnapshot> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let (Some(at), Some(snapshot)) = (state.refreshed_at, &state.snapshot) {
            if at.elapsed() < self.refresh_interval {
                return Arc::clone(snapshot);
            }
        }

        let fresh = self.source.snapshot();
        let snapshot = match state.snapshot.take() {
            Some(previous) if *previous == fresh => previous,
            _ => {
                debug!(level = fresh.level, owned = fresh.owned_items.len(), "player snapshot changed");
                Arc::new(fresh)
            }
        };
        state.refreshed_at = Some(Instant::now());
        state.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Force the next `current` call to re-read the source.
    pub fn invalidate(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .refreshed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::GemInfo;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    fn item(id: i64) -> ItemAttributes {
        ItemAttributes {
            id,
            base_name: format!("Item {}", id),
            ..Default::default()
        }
    }

    fn gem(id: i64, name: &str) -> ItemAttributes {
        ItemAttributes {
            id,
            base_name: name.to_string(),
            gem: Some(GemInfo {
                level: 20,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_owned_gems_include_socketed() {
        let mut armour = item(1);
        armour.sockets.socketed_gems = vec![gem(10, "Arc")];
        let player = PlayerSnapshot::new(PlayerAttributes {
            level: 80,
            equipped: vec![armour],
            inventory: vec![gem(2, "Frostbolt"), item(3)],
            ..Default::default()
        });

        assert_eq!(player.owned_items.len(), 3);
        let gems: Vec<&str> = player.owned_gems.iter().map(|g| g.base_name.as_str()).collect();
        assert_eq!(gems, vec!["Arc", "Frostbolt"]);
    }

    #[test]
    fn test_equality_ignores_item_order() {
        let a = PlayerSnapshot::new(PlayerAttributes {
            inventory: vec![item(1), item(2)],
            ..Default::default()
        });
        let b = PlayerSnapshot::new(PlayerAttributes {
            inventory: vec![item(2), item(1)],
            ..Default::default()
        });
        let c = PlayerSnapshot::new(PlayerAttributes {
            equipped: vec![item(1), item(2)],
            ..Default::default()
        });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cache_rate_limits_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = PlayerCache::with_refresh_interval(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                PlayerSnapshot::new(PlayerAttributes::default())
            },
            Duration::from_secs(3600),
        );

        cache.current();
        cache.current();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate();
        cache.current();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_equal_refresh_keeps_arc() {
        let cache = PlayerCache::with_refresh_interval(
            || PlayerSnapshot::new(PlayerAttributes::default()),
            Duration::ZERO,
        );
        let first = cache.current();
        let second = cache.current();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_changed_refresh_replaces_arc() {
        let level = Arc::new(AtomicI64::new(1));
        let source_level = Arc::clone(&level);
        let cache = PlayerCache::with_refresh_interval(
            move || {
                PlayerSnapshot::new(PlayerAttributes {
                    level: source_level.load(Ordering::SeqCst),
                    ..Default::default()
                })
            },
            Duration::ZERO,
        );

        let first = cache.current();
        level.store(2, Ordering::SeqCst);
        let second = cache.current();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.level, 2);
    }

    #[test]
    fn test_default_interval() {
        let cache = PlayerCache::new(|| PlayerSnapshot::new(PlayerAttributes::default()));
        assert_eq!(cache.refresh_interval(), Duration::from_millis(1000));
    }
}
