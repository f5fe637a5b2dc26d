//! Stat aggregation module.
//!
//! Modifiers contribute `(StatKey, value)` pairs; aggregation flattens every
//! contribution, groups by key and sums (additive). The result is a
//! `StatTable`, a total map where absent keys read as zero.
//!
//! Sums over one of an item's named mod partitions are memoized in a
//! `PartitionStatCache` owned by that item. Sums over anything else (a
//! filtered subset, a name lookup) are always recomputed.

use crate::numeric::StatNumeric;
use crate::stat_key::StatKey;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Affix slot a modifier occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AffixKind {
    Prefix,
    Suffix,
    #[default]
    None,
}

impl AffixKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AffixKind::Prefix => "Prefix",
            AffixKind::Suffix => "Suffix",
            AffixKind::None => "None",
        }
    }
}

/// One modifier on an item.
///
/// # Examples
///
/// ```rust
/// use itemfilter::stats::ModifierEntry;
///
/// let m = ModifierEntry::new("IncreasedLife7")
///     .with_stat("base_maximum_life", 90);
/// assert_eq!(m.stats.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModifierEntry {
    /// Mod group name, e.g. `"IncreasedLife"`.
    pub name: String,
    /// Raw mod identifier, e.g. `"IncreasedLife7"`.
    #[serde(default)]
    pub raw_name: String,
    /// Name shown to the player.
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub affix: AffixKind,
    /// Stat contributions, in the order the mod record lists them.
    #[serde(default)]
    pub stats: Vec<(StatKey, i64)>,
}

impl ModifierEntry {
    /// Create a modifier whose name, raw name and display name are all `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            raw_name: name.clone(),
            display_name: name.clone(),
            name,
            affix: AffixKind::None,
            stats: Vec::new(),
        }
    }

    pub fn with_raw_name(mut self, raw_name: impl Into<String>) -> Self {
        self.raw_name = raw_name.into();
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_affix(mut self, affix: AffixKind) -> Self {
        self.affix = affix;
        self
    }

    /// Add a stat contribution.
    pub fn with_stat(mut self, key: impl Into<StatKey>, value: i64) -> Self {
        self.stats.push((key.into(), value));
        self
    }
}

/// Accumulated stat values keyed by `StatKey`.
///
/// Lookups never fail: a key nobody contributed to reads as zero.
///
/// # Examples
///
/// ```rust
/// use itemfilter::stats::StatTable;
///
/// let mut table = StatTable::<i64>::new();
/// table.add("life", 10);
/// table.add("life", 5);
///
/// assert_eq!(table.get("life"), 15);
/// assert_eq!(table.get("mana"), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatTable<N> {
    values: HashMap<StatKey, N>,
}

impl<N: StatNumeric> StatTable<N> {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Value for `key`, or zero if absent.
    pub fn get(&self, key: &str) -> N {
        self.values.get(key).copied().unwrap_or_else(N::zero)
    }

    /// Accumulate `value` into `key`.
    pub fn add(&mut self, key: impl Into<StatKey>, value: N) {
        let slot = self.values.entry(key.into()).or_insert_with(N::zero);
        *slot = *slot + value;
    }

    /// Whether any modifier contributed to `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StatKey, &N)> {
        self.values.iter()
    }
}

impl<N: StatNumeric> FromIterator<(StatKey, N)> for StatTable<N> {
    fn from_iter<T: IntoIterator<Item = (StatKey, N)>>(iter: T) -> Self {
        let mut table = StatTable::new();
        for (key, value) in iter {
            table.add(key, value);
        }
        table
    }
}

fn accumulate<'m, N, I>(mods: I) -> StatTable<N>
where
    N: StatNumeric,
    I: IntoIterator<Item = (&'m ModifierEntry, N)>,
{
    mods.into_iter()
        .flat_map(|(m, weight)| {
            m.stats
                .iter()
                .map(move |(key, value)| (key.clone(), N::from_int(*value) * weight))
        })
        .collect()
}

/// Sum every stat contribution of `mods`.
///
/// # Examples
///
/// ```rust
/// use itemfilter::stats::{sum_stats, ModifierEntry};
///
/// let mods = vec![
///     ModifierEntry::new("A").with_stat("life", 10),
///     ModifierEntry::new("B").with_stat("life", 5).with_stat("mana", 2),
/// ];
/// let table = sum_stats(&mods);
/// assert_eq!(table.get("life"), 15);
/// assert_eq!(table.get("mana"), 2);
/// ```
pub fn sum_stats<'m, I>(mods: I) -> StatTable<i64>
where
    I: IntoIterator<Item = &'m ModifierEntry>,
{
    accumulate(mods.into_iter().map(|m| (m, 1_i64)))
}

/// Sum every stat contribution of `mods`, each scaled by its modifier's weight.
///
/// # Examples
///
/// ```rust
/// use itemfilter::stats::{sum_weighted_stats, ModifierEntry};
///
/// let life = ModifierEntry::new("A").with_stat("life", 10);
/// let table = sum_weighted_stats([(&life, 0.5)]);
/// assert_eq!(table.get("life"), 5.0);
/// ```
pub fn sum_weighted_stats<'m, I>(mods: I) -> StatTable<f64>
where
    I: IntoIterator<Item = (&'m ModifierEntry, f64)>,
{
    accumulate(mods)
}

/// The named mod collections of an item.
///
/// `ItemMods` is the union; the others are disjoint partitions of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModPartition {
    ItemMods,
    EnchantedMods,
    ExplicitMods,
    FracturedMods,
    ImplicitMods,
    ScourgeMods,
    SynthesisMods,
    CrucibleMods,
}

impl ModPartition {
    pub const COUNT: usize = 8;

    pub const ALL: [ModPartition; ModPartition::COUNT] = [
        ModPartition::ItemMods,
        ModPartition::EnchantedMods,
        ModPartition::ExplicitMods,
        ModPartition::FracturedMods,
        ModPartition::ImplicitMods,
        ModPartition::ScourgeMods,
        ModPartition::SynthesisMods,
        ModPartition::CrucibleMods,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ModPartition::ItemMods => "ItemMods",
            ModPartition::EnchantedMods => "EnchantedMods",
            ModPartition::ExplicitMods => "ExplicitMods",
            ModPartition::FracturedMods => "FracturedMods",
            ModPartition::ImplicitMods => "ImplicitMods",
            ModPartition::ScourgeMods => "ScourgeMods",
            ModPartition::SynthesisMods => "SynthesisMods",
            ModPartition::CrucibleMods => "CrucibleMods",
        }
    }
}

/// Per-item memo of partition sums.
///
/// Each slot is filled at most once.
#[derive(Debug, Default)]
pub struct PartitionStatCache {
    slots: [OnceLock<StatTable<i64>>; ModPartition::COUNT],
}

impl PartitionStatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached table for `partition`, computing it with `compute` on first use.
    pub fn get_or_compute<F>(&self, partition: ModPartition, compute: F) -> &StatTable<i64>
    where
        F: FnOnce() -> StatTable<i64>,
    {
        self.slots[partition.slot()].get_or_init(compute)
    }

    /// Whether `partition` has been computed already.
    pub fn is_cached(&self, partition: ModPartition) -> bool {
        self.slots[partition.slot()].get().is_some()
    }
}

/// A sequence of modifiers as seen by a rule.
///
/// A `Partition` remembers which named collection it came from, so its
/// stat sum can be served from the owning item's cache. A `Subset` is an
/// ad-hoc selection and is summed on every request.
#[derive(Debug, Clone)]
pub enum ModList<'a> {
    Partition {
        mods: &'a [ModifierEntry],
        partition: ModPartition,
        cache: &'a PartitionStatCache,
    },
    Subset(Vec<&'a ModifierEntry>),
}

impl<'a> ModList<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a ModifierEntry> + '_ {
        let (whole, picked) = match self {
            ModList::Partition { mods, .. } => (Some(mods.iter()), None),
            ModList::Subset(picked) => (None, Some(picked.iter().copied())),
        };
        whole
            .into_iter()
            .flatten()
            .chain(picked.into_iter().flatten())
    }

    pub fn len(&self) -> usize {
        match self {
            ModList::Partition { mods, .. } => mods.len(),
            ModList::Subset(picked) => picked.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summed stats of this list.
    pub fn stats(&self) -> Cow<'a, StatTable<i64>> {
        match self {
            ModList::Partition {
                mods,
                partition,
                cache,
            } => {
                let mods: &'a [ModifierEntry] = *mods;
                let cache: &'a PartitionStatCache = *cache;
                Cow::Borrowed(cache.get_or_compute(*partition, || sum_stats(mods)))
            }
            ModList::Subset(picked) => Cow::Owned(sum_stats(picked.iter().copied())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn sample_mods() -> Vec<ModifierEntry> {
        vec![
            ModifierEntry::new("Life1").with_stat("life", 10),
            ModifierEntry::new("Life2").with_stat("life", 5),
            ModifierEntry::new("Mana1").with_stat("mana", 2),
        ]
    }

    #[test]
    fn test_sum_groups_by_key() {
        let table = sum_stats(&sample_mods());
        assert_eq!(table.get("life"), 15);
        assert_eq!(table.get("mana"), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_absent_key_reads_zero() {
        let table = sum_stats(&sample_mods());
        assert_eq!(table.get("armour"), 0);
        assert!(!table.contains_key("armour"));
    }

    #[test]
    fn test_multi_stat_modifier() {
        let hybrid = ModifierEntry::new("Hybrid")
            .with_stat("life", 20)
            .with_stat("mana", 20);
        let table = sum_stats([&hybrid, &hybrid]);
        assert_eq!(table.get("life"), 40);
        assert_eq!(table.get("mana"), 40);
    }

    #[test]
    fn test_weighted_halves() {
        let mods = sample_mods();
        let table = sum_weighted_stats(mods.iter().map(|m| (m, 0.5)));
        assert_eq!(table.get("life"), 7.5);
        assert_eq!(table.get("mana"), 1.0);
        assert_eq!(table.get("missing"), 0.0);
    }

    #[test]
    fn test_partition_cache_computes_once() {
        let cache = PartitionStatCache::new();
        let calls = Cell::new(0);
        let mods = sample_mods();

        for _ in 0..3 {
            let table = cache.get_or_compute(ModPartition::ExplicitMods, || {
                calls.set(calls.get() + 1);
                sum_stats(&mods)
            });
            assert_eq!(table.get("life"), 15);
        }

        assert_eq!(calls.get(), 1);
        assert!(cache.is_cached(ModPartition::ExplicitMods));
        assert!(!cache.is_cached(ModPartition::ImplicitMods));
    }

    #[test]
    fn test_mod_list_partition_is_cached_subset_is_not() {
        let cache = PartitionStatCache::new();
        let mods = sample_mods();

        let partition = ModList::Partition {
            mods: &mods,
            partition: ModPartition::ItemMods,
            cache: &cache,
        };
        assert!(matches!(partition.stats(), Cow::Borrowed(_)));
        assert!(cache.is_cached(ModPartition::ItemMods));

        let subset = ModList::Subset(mods.iter().take(1).collect());
        let stats = subset.stats();
        assert!(matches!(stats, Cow::Owned(_)));
        assert_eq!(stats.get("life"), 10);
        assert_eq!(subset.iter().count(), 1);
    }
}
