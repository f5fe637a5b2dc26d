//! Item snapshots.
//!
//! An `ItemSnapshot` is one immutable view of an item, built from the raw
//! `ItemAttributes` a provider hands over. Cheap derived fields (influence,
//! mod counts, map flags, attack speed, open affixes) are computed in
//! `ItemSnapshot::new`; stat sums, tag lookups and the price estimate are
//! computed on first use and memoized inside the snapshot.

use crate::error::{EvalError, FilterError};
use crate::numeric::round_to;
use crate::player::PlayerSnapshot;
use crate::sockets;
use crate::stats::{
    sum_stats, sum_weighted_stats, AffixKind, ModList, ModPartition, ModifierEntry, PartitionStatCache, StatTable,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::warn;

/// Stat keys the snapshot derives fields from.
pub mod keys {
    pub const LOCAL_MAXIMUM_PREFIXES_ALLOWED: &str = "local_maximum_prefixes_allowed";
    pub const LOCAL_MAXIMUM_SUFFIXES_ALLOWED: &str = "local_maximum_suffixes_allowed";
    pub const LOCAL_ATTACK_SPEED_PCT: &str = "local_attack_speed_+%";
    pub const MAP_ELDER_BOSS_VARIATION: &str = "map_elder_boss_variation";
    pub const MAP_CONTAINS_CITADEL: &str = "map_contains_citadel";
    pub const IS_UBER_BLIGHTED_MAP: &str = "is_uber_blighted_map";
    pub const IS_BLIGHTED_MAP: &str = "is_blighted_map";
    pub const MAP_IS_UBER_MAP: &str = "map_is_uber_map";
    pub const MAP_ZANA_INFLUENCE: &str = "map_zana_influence";
    pub const MAP_PACK_SIZE_PCT: &str = "map_pack_size_+%";
    pub const MAP_ITEM_DROP_QUANTITY_PCT: &str = "map_item_drop_quantity_+%";
    pub const MAP_ITEM_DROP_RARITY_PCT: &str = "map_item_drop_rarity_+%";
    pub const MAP_MORE_MAPS_PCT: &str = "map_map_item_drop_chance_+%_final_from_uber_mod";
    pub const MAP_MORE_SCARABS_PCT: &str = "map_scarab_drop_chance_+%_final_from_uber_mod";
    pub const MAP_MORE_CURRENCY_PCT: &str = "map_currency_drop_chance_+%_final_from_uber_mod";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ItemRarity {
    #[default]
    Normal,
    Magic,
    Rare,
    Unique,
    Gem,
    Currency,
    Quest,
}

impl ItemRarity {
    /// Member names, usable in rules as `ItemRarity.<Name>`.
    pub const NAMES: &'static [&'static str] = &["Normal", "Magic", "Rare", "Unique", "Gem", "Currency", "Quest"];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemRarity::Normal => "Normal",
            ItemRarity::Magic => "Magic",
            ItemRarity::Rare => "Rare",
            ItemRarity::Unique => "Unique",
            ItemRarity::Gem => "Gem",
            ItemRarity::Currency => "Currency",
            ItemRarity::Quest => "Quest",
        }
    }
}

impl fmt::Display for ItemRarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GemInfo {
    pub level: i64,
    pub max_level: i64,
    pub quality_type: String,
    pub is_gem: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackInfo {
    pub count: i64,
    pub max_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeInfo {
    pub current: i64,
    pub max: i64,
    pub per_use: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlaskInfo {
    pub life_recovery: i64,
    pub mana_recovery: i64,
    pub stats: StatTable<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeRequirements {
    pub strength: i64,
    pub dexterity: i64,
    pub intelligence: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmourInfo {
    pub armour: i64,
    pub evasion: i64,
    pub es: i64,
    pub perfection: i64,
}

/// The area the item was observed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaInfo {
    pub level: i64,
    pub name: String,
    pub act: i64,
    /// Derived: act above 10.
    #[serde(skip)]
    pub is_end_game: bool,
}

impl Default for AreaInfo {
    fn default() -> Self {
        Self {
            level: 0,
            name: "N/A".to_string(),
            act: 0,
            is_end_game: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketAttributes {
    pub largest_link_size: i64,
    pub socket_groups: Vec<String>,
    pub socketed_gems: Vec<ItemAttributes>,
}

/// Raw mod partitions. The union (`ItemMods`) is derived.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModAttributes {
    pub enchanted: Vec<ModifierEntry>,
    pub implicit: Vec<ModifierEntry>,
    pub explicit: Vec<ModifierEntry>,
    pub fractured: Vec<ModifierEntry>,
    pub scourge: Vec<ModifierEntry>,
    pub synthesis: Vec<ModifierEntry>,
    pub crucible: Vec<ModifierEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapAttributes {
    pub tier: i64,
    pub is_bonus_completed: bool,
    pub is_completed: bool,
}

/// Everything a provider knows about one item.
///
/// Deserializable from JSON with every field optional:
///
/// ```rust
/// use itemfilter::{ItemRarity, ItemSnapshot};
///
/// let item = ItemSnapshot::from_json(r#"{
///     "base_name": "Vaal Regalia",
///     "rarity": "Rare",
///     "item_level": 86,
///     "sockets": { "largest_link_size": 6, "socket_groups": ["bbbbbb"] }
/// }"#).unwrap();
///
/// assert_eq!(item.rarity, ItemRarity::Rare);
/// assert_eq!(item.socket_info.socket_number, 6);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemAttributes {
    pub path: String,
    pub class_name: String,
    pub base_name: String,
    pub name: String,
    pub public_price: String,
    pub heist_contract_job_type: String,
    pub resource_path: String,
    pub item_quality: i64,
    pub item_level: i64,
    pub required_level: i64,
    pub heist_contract_req_job_level: i64,
    pub scourge_tier: i64,
    pub memory_strands: i64,
    pub height: i64,
    pub width: i64,
    pub shield_block_chance: i64,
    pub id: i64,
    pub inventory_id: i64,
    pub is_identified: bool,
    pub is_mirrored: bool,
    pub is_corrupted: bool,
    pub is_elder: bool,
    pub is_shaper: bool,
    pub is_crusader: bool,
    pub is_redeemer: bool,
    pub is_hunter: bool,
    pub is_warlord: bool,
    pub is_synthesised: bool,
    pub rarity: ItemRarity,
    pub path_tags: Vec<String>,
    pub tags: Vec<String>,
    /// Distance to the player; `None` when not on the ground.
    pub distance: Option<f64>,
    /// Present for skill gems.
    pub gem: Option<GemInfo>,
    pub stack: StackInfo,
    pub charges: ChargeInfo,
    pub flask: FlaskInfo,
    pub attribute_requirements: AttributeRequirements,
    pub armour: ArmourInfo,
    pub area: AreaInfo,
    pub sockets: SocketAttributes,
    pub mods: ModAttributes,
    /// Present for maps.
    pub map: Option<MapAttributes>,
    /// Weapon attack time in milliseconds; present for weapons.
    pub attack_time: Option<i64>,
    pub local_stats: StatTable<i64>,
}

#[derive(Debug)]
pub struct SocketInfo {
    pub largest_link_size: i64,
    pub socket_number: i64,
    pub socket_groups: Vec<String>,
    pub socketed_gems: Vec<Arc<ItemSnapshot>>,
}

/// The item's modifiers, by partition.
#[derive(Debug, Default)]
pub struct ModsInfo {
    pub(crate) item_mods: Vec<ModifierEntry>,
    pub(crate) enchanted_mods: Vec<ModifierEntry>,
    pub(crate) explicit_mods: Vec<ModifierEntry>,
    pub(crate) fractured_mods: Vec<ModifierEntry>,
    pub(crate) implicit_mods: Vec<ModifierEntry>,
    pub(crate) scourge_mods: Vec<ModifierEntry>,
    pub(crate) synthesis_mods: Vec<ModifierEntry>,
    pub(crate) crucible_mods: Vec<ModifierEntry>,
    pub(crate) prefixes: Vec<ModifierEntry>,
    pub(crate) suffixes: Vec<ModifierEntry>,
    pub open_prefix_count: i64,
    pub open_suffix_count: i64,
    pub has_open_prefix: bool,
    pub has_open_suffix: bool,
    stat_cache: PartitionStatCache,
}

impl ModsInfo {
    fn new(raw: ModAttributes) -> Self {
        let ModAttributes {
            enchanted,
            implicit,
            explicit,
            fractured,
            scourge,
            synthesis,
            crucible,
        } = raw;

        let item_mods = [&enchanted, &implicit, &explicit, &fractured, &scourge, &synthesis, &crucible]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        let affixed = |kind: AffixKind| explicit.iter().filter(|m| m.affix == kind).cloned().collect::<Vec<_>>();
        let prefixes = affixed(AffixKind::Prefix);
        let suffixes = affixed(AffixKind::Suffix);

        Self {
            item_mods,
            enchanted_mods: enchanted,
            explicit_mods: explicit,
            fractured_mods: fractured,
            implicit_mods: implicit,
            scourge_mods: scourge,
            synthesis_mods: synthesis,
            crucible_mods: crucible,
            prefixes,
            suffixes,
            open_prefix_count: -1,
            open_suffix_count: -1,
            has_open_prefix: false,
            has_open_suffix: false,
            stat_cache: PartitionStatCache::new(),
        }
    }

    /// Modifiers of one named partition.
    pub fn partition(&self, partition: ModPartition) -> &[ModifierEntry] {
        match partition {
            ModPartition::ItemMods => &self.item_mods,
            ModPartition::EnchantedMods => &self.enchanted_mods,
            ModPartition::ExplicitMods => &self.explicit_mods,
            ModPartition::FracturedMods => &self.fractured_mods,
            ModPartition::ImplicitMods => &self.implicit_mods,
            ModPartition::ScourgeMods => &self.scourge_mods,
            ModPartition::SynthesisMods => &self.synthesis_mods,
            ModPartition::CrucibleMods => &self.crucible_mods,
        }
    }

    /// A partition as a cache-aware mod list.
    pub fn list(&self, partition: ModPartition) -> ModList<'_> {
        ModList::Partition {
            mods: self.partition(partition),
            partition,
            cache: &self.stat_cache,
        }
    }

    /// Memoized stat sum of one partition.
    pub fn stats(&self, partition: ModPartition) -> &StatTable<i64> {
        self.stat_cache
            .get_or_compute(partition, || sum_stats(self.partition(partition)))
    }

    pub fn is_cached(&self, partition: ModPartition) -> bool {
        self.stat_cache.is_cached(partition)
    }

    pub fn prefixes(&self) -> &[ModifierEntry] {
        &self.prefixes
    }

    pub fn suffixes(&self) -> &[ModifierEntry] {
        &self.suffixes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapOccupation {
    pub elder_boss: bool,
    pub enslaver: bool,
    pub eradicator: bool,
    pub constrictor: bool,
    pub purifier: bool,
    pub conqueror_boss: bool,
    pub baran: bool,
    pub veritania: bool,
    pub al_hezmin: bool,
    pub drox: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapType {
    pub normal: bool,
    pub blighted: bool,
    pub blight_ravaged: bool,
    pub uber: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapInfluence {
    pub memory: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapInfo {
    pub is_map: bool,
    pub tier: i64,
    pub quantity: i64,
    pub rarity: i64,
    pub pack_size: i64,
    pub quality: i64,
    pub more_maps: i64,
    pub more_scarabs: i64,
    pub more_currency: i64,
    pub occupied: bool,
    pub occupied_by: MapOccupation,
    pub kind: MapType,
    pub influence: MapInfluence,
    pub is_bonus_completed: bool,
    pub is_completed: bool,
}

impl MapInfo {
    fn derive(raw: MapAttributes, stats: &StatTable<i64>, quality: i64) -> Self {
        let elder = stats.get(keys::MAP_ELDER_BOSS_VARIATION);
        let citadel = stats.get(keys::MAP_CONTAINS_CITADEL);
        let mut occupied_by = MapOccupation {
            enslaver: elder == 1,
            eradicator: elder == 2,
            constrictor: elder == 3,
            purifier: elder == 4,
            baran: citadel == 1,
            veritania: citadel == 2,
            al_hezmin: citadel == 3,
            drox: citadel == 4,
            ..MapOccupation::default()
        };
        occupied_by.elder_boss =
            occupied_by.enslaver || occupied_by.eradicator || occupied_by.constrictor || occupied_by.purifier;
        occupied_by.conqueror_boss =
            occupied_by.baran || occupied_by.veritania || occupied_by.al_hezmin || occupied_by.drox;
        let occupied = occupied_by.elder_boss || occupied_by.conqueror_boss;

        let blighted = stats.get(keys::IS_BLIGHTED_MAP) == 1;
        let blight_ravaged = stats.get(keys::IS_UBER_BLIGHTED_MAP) == 1;
        let uber = stats.get(keys::MAP_IS_UBER_MAP) == 1;

        Self {
            is_map: true,
            tier: raw.tier,
            quantity: stats.get(keys::MAP_ITEM_DROP_QUANTITY_PCT),
            rarity: stats.get(keys::MAP_ITEM_DROP_RARITY_PCT),
            pack_size: stats.get(keys::MAP_PACK_SIZE_PCT),
            quality,
            more_maps: stats.get(keys::MAP_MORE_MAPS_PCT),
            more_scarabs: stats.get(keys::MAP_MORE_SCARABS_PCT),
            more_currency: stats.get(keys::MAP_MORE_CURRENCY_PCT),
            occupied,
            occupied_by,
            kind: MapType {
                normal: !blighted && !blight_ravaged && !occupied && !uber,
                blighted,
                blight_ravaged,
                uber,
            },
            influence: MapInfluence {
                memory: stats.get(keys::MAP_ZANA_INFLUENCE) == 1,
            },
            is_bonus_completed: raw.is_bonus_completed,
            is_completed: raw.is_completed,
        }
    }
}

/// Attacks per second, before and after local attack speed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttackSpeed {
    pub base: f64,
    pub total: f64,
}

impl AttackSpeed {
    fn derive(attack_time: Option<i64>, local_stats: &StatTable<i64>) -> Self {
        match attack_time {
            Some(ms) if ms > 0 => {
                let base = 1000.0 / ms as f64;
                let modifier = (100 + local_stats.get(keys::LOCAL_ATTACK_SPEED_PCT)) as f64 / 100.0;
                Self {
                    base: round_to(base, 2),
                    total: round_to(base * modifier, 2),
                }
            }
            _ => Self::default(),
        }
    }
}

/// Supplies `EstimatedValue` for items.
pub trait PriceSource: Send + Sync {
    /// Estimated value of `item`, or `None` if it cannot be priced.
    fn estimate(&self, item: &ItemSnapshot) -> Option<f64>;
}

/// Affix slots by rarity: Magic 1, Rare 3 (jewels 2), otherwise 0.
pub fn total_affix_slots(rarity: ItemRarity, class_name: &str) -> i64 {
    match rarity {
        ItemRarity::Magic => 1,
        ItemRarity::Rare if class_name == "Jewel" => 2,
        ItemRarity::Rare => 3,
        _ => 0,
    }
}

/// One immutable view of an item.
pub struct ItemSnapshot {
    pub path: String,
    pub class_name: String,
    pub base_name: String,
    pub name: String,
    pub public_price: String,
    pub heist_contract_job_type: String,
    pub resource_path: String,
    pub item_quality: i64,
    pub veiled_mod_count: i64,
    pub fractured_mod_count: i64,
    pub item_level: i64,
    pub required_level: i64,
    pub real_required_level: i64,
    pub delirium_stacks: i64,
    pub heist_contract_req_job_level: i64,
    pub scourge_tier: i64,
    pub is_identified: bool,
    pub is_mirrored: bool,
    pub is_corrupted: bool,
    pub is_elder: bool,
    pub is_shaper: bool,
    pub is_crusader: bool,
    pub is_redeemer: bool,
    pub is_hunter: bool,
    pub is_warlord: bool,
    pub is_influenced: bool,
    pub is_synthesised: bool,
    pub enchanted: bool,
    pub rarity: ItemRarity,
    pub mods_names: Vec<String>,
    pub path_tags: Vec<String>,
    pub tags: Vec<String>,
    pub id: i64,
    pub inventory_id: i64,
    pub height: i64,
    pub width: i64,
    pub memory_strands: i64,
    pub is_weapon: bool,
    pub shield_block_chance: i64,
    pub distance: f64,
    pub gem_info: GemInfo,
    pub stack_info: StackInfo,
    pub socket_info: SocketInfo,
    pub charge_info: ChargeInfo,
    pub flask_info: FlaskInfo,
    pub attribute_requirements: AttributeRequirements,
    pub armour_info: ArmourInfo,
    pub mods_info: ModsInfo,
    pub area_info: AreaInfo,
    pub map_info: MapInfo,
    pub attack_speed: AttackSpeed,
    pub local_stats: StatTable<i64>,
    player: Option<Arc<PlayerSnapshot>>,
    price_source: Option<Arc<dyn PriceSource>>,
    estimated_value: OnceLock<f64>,
    tag_cache: Mutex<HashMap<String, bool>>,
}

impl fmt::Debug for ItemSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemSnapshot")
            .field("base_name", &self.base_name)
            .field("class_name", &self.class_name)
            .field("rarity", &self.rarity)
            .field("item_level", &self.item_level)
            .field("mods", &self.mods_info.item_mods.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ItemSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) Dist: {}", self.base_name, self.class_name, self.distance)
    }
}

fn count_where(mods: &[ModifierEntry], pred: impl Fn(&ModifierEntry) -> bool) -> i64 {
    mods.iter().filter(|m| pred(m)).count() as i64
}

fn sorted_join<S: AsRef<str>>(items: &[S]) -> String {
    let mut sorted: Vec<&str> = items.iter().map(|s| s.as_ref()).collect();
    sorted.sort_unstable();
    sorted.join("_")
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl ItemSnapshot {
    /// Build a snapshot, deriving every eager field from `attrs`.
    pub fn new(attrs: ItemAttributes) -> Self {
        let ItemAttributes {
            path,
            class_name,
            base_name,
            name,
            public_price,
            heist_contract_job_type,
            resource_path,
            item_quality,
            item_level,
            required_level,
            heist_contract_req_job_level,
            scourge_tier,
            memory_strands,
            height,
            width,
            shield_block_chance,
            id,
            inventory_id,
            is_identified,
            is_mirrored,
            is_corrupted,
            is_elder,
            is_shaper,
            is_crusader,
            is_redeemer,
            is_hunter,
            is_warlord,
            is_synthesised,
            rarity,
            path_tags,
            tags,
            distance,
            gem,
            stack,
            charges,
            flask,
            attribute_requirements,
            armour,
            mut area,
            sockets,
            mods,
            map,
            attack_time,
            local_stats,
        } = attrs;

        let mut mods_info = ModsInfo::new(mods);
        if is_identified {
            let slots = total_affix_slots(rarity, &class_name);
            let stats = mods_info.stats(ModPartition::ItemMods);
            let open_prefixes = (slots - mods_info.prefixes.len() as i64
                + stats.get(keys::LOCAL_MAXIMUM_PREFIXES_ALLOWED))
            .max(0);
            let open_suffixes = (slots - mods_info.suffixes.len() as i64
                + stats.get(keys::LOCAL_MAXIMUM_SUFFIXES_ALLOWED))
            .max(0);
            mods_info.open_prefix_count = open_prefixes;
            mods_info.open_suffix_count = open_suffixes;
            mods_info.has_open_prefix = open_prefixes >= 1;
            mods_info.has_open_suffix = open_suffixes >= 1;
        }

        let map_info = match map {
            Some(raw) => MapInfo::derive(raw, mods_info.stats(ModPartition::ItemMods), item_quality),
            None => MapInfo {
                quality: item_quality,
                ..MapInfo::default()
            },
        };

        let socketed_gems: Vec<Arc<ItemSnapshot>> = sockets
            .socketed_gems
            .into_iter()
            .map(|gem| Arc::new(ItemSnapshot::new(gem)))
            .collect();
        let real_required_level = socketed_gems
            .iter()
            .map(|g| g.required_level)
            .max()
            .unwrap_or(0)
            .max(required_level);
        let socket_info = SocketInfo {
            largest_link_size: sockets.largest_link_size,
            socket_number: sockets.socket_groups.iter().map(|g| g.chars().count() as i64).sum(),
            socket_groups: sockets.socket_groups,
            socketed_gems,
        };

        area.is_end_game = area.act > 10;

        let item_mods = &mods_info.item_mods;
        Self {
            mods_names: item_mods.iter().map(|m| m.name.clone()).collect(),
            veiled_mod_count: count_where(item_mods, |m| m.display_name.contains("Veil")),
            delirium_stacks: count_where(item_mods, |m| m.name.contains("AfflictionMapReward")),
            fractured_mod_count: mods_info.fractured_mods.len() as i64,
            enchanted: !mods_info.enchanted_mods.is_empty(),
            is_influenced: is_crusader || is_redeemer || is_warlord || is_hunter || is_shaper || is_elder,
            is_weapon: attack_time.is_some(),
            attack_speed: AttackSpeed::derive(attack_time, &local_stats),
            distance: distance.unwrap_or(f64::INFINITY),
            gem_info: gem
                .map(|g| GemInfo { is_gem: true, ..g })
                .unwrap_or_default(),
            path,
            class_name,
            base_name,
            name,
            public_price,
            heist_contract_job_type,
            resource_path,
            item_quality,
            item_level,
            required_level,
            real_required_level,
            heist_contract_req_job_level,
            scourge_tier,
            is_identified,
            is_mirrored,
            is_corrupted,
            is_elder,
            is_shaper,
            is_crusader,
            is_redeemer,
            is_hunter,
            is_warlord,
            is_synthesised,
            rarity,
            path_tags,
            tags,
            id,
            inventory_id,
            height,
            width,
            memory_strands,
            shield_block_chance,
            stack_info: stack,
            socket_info,
            charge_info: charges,
            flask_info: flask,
            attribute_requirements,
            armour_info: armour,
            area_info: area,
            map_info,
            local_stats,
            mods_info,
            player: None,
            price_source: None,
            estimated_value: OnceLock::new(),
            tag_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Parse `ItemAttributes` from JSON and build a snapshot.
    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        let attrs: ItemAttributes = serde_json::from_str(json)?;
        Ok(Self::new(attrs))
    }

    /// Attach the player context `PlayerInfo` and the ownership helpers read.
    pub fn with_player(mut self, player: Arc<PlayerSnapshot>) -> Self {
        self.player = Some(player);
        self
    }

    /// Attach the collaborator that computes `EstimatedValue`.
    pub fn with_price_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.price_source = Some(source);
        self
    }

    /// The attached player context, or an empty one.
    pub fn player(&self) -> &PlayerSnapshot {
        self.player.as_deref().unwrap_or(&crate::player::EMPTY_PLAYER)
    }

    /// Memoized stat sum over all item mods.
    pub fn item_stats(&self) -> &StatTable<i64> {
        self.mods_info.stats(ModPartition::ItemMods)
    }

    /// Memoized price estimate. Reads 0 without a price source.
    pub fn estimated_value(&self) -> f64 {
        *self.estimated_value.get_or_init(|| {
            let value = self.price_source.as_ref().and_then(|source| source.estimate(self));
            value.unwrap_or_else(|| {
                warn!(item = %self.base_name, "EstimatedValue used without a price source; reading 0");
                0.0
            })
        })
    }

    fn cached_tag_check(&self, key: String, check: impl FnOnce() -> bool) -> bool {
        if let Some(hit) = self
            .tag_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return *hit;
        }
        let result = check();
        self.tag_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, result);
        result
    }

    fn all_tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().chain(&self.path_tags).map(String::as_str)
    }

    /// Whether any tag or path tag contains `wanted`, ignoring case.
    pub fn has_tag(&self, wanted: &str) -> bool {
        self.cached_tag_check(format!("Single_{}", wanted.to_lowercase()), || {
            self.all_tags().any(|tag| contains_ignore_case(tag, wanted))
        })
    }

    /// Whether any tag or path tag contains `wanted`.
    pub fn has_tag_case(&self, wanted: &str) -> bool {
        self.cached_tag_check(format!("SingleCase_{}", wanted), || {
            self.all_tags().any(|tag| tag.contains(wanted))
        })
    }

    /// `has_tag` over a caller-supplied tag list.
    pub fn has_tag_in<S: AsRef<str>>(&self, tags: &[S], wanted: &str) -> bool {
        let key = format!("List_{}_{}", sorted_join(tags), wanted.to_lowercase());
        self.cached_tag_check(key, || {
            tags.iter().any(|tag| contains_ignore_case(tag.as_ref(), wanted))
        })
    }

    /// `has_tag_case` over a caller-supplied tag list.
    pub fn has_tag_in_case<S: AsRef<str>>(&self, tags: &[S], wanted: &str) -> bool {
        let key = format!("ListCase_{}_{}", sorted_join(tags), wanted);
        self.cached_tag_check(key, || tags.iter().any(|tag| tag.as_ref().contains(wanted)))
    }

    /// Number of memoized tag lookups.
    pub fn cached_tag_count(&self) -> usize {
        self.tag_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Item mods whose name contains `wanted`, ignoring case.
    pub fn find_mods(&self, wanted: &str) -> Vec<&ModifierEntry> {
        self.mods_info
            .item_mods
            .iter()
            .filter(|m| contains_ignore_case(&m.name, wanted))
            .collect()
    }

    /// Item mods named in `wanted` (ignoring case), first occurrence per name.
    fn mods_named<S: AsRef<str>>(&self, wanted: &[S]) -> Vec<&ModifierEntry> {
        let wanted: HashSet<String> = wanted.iter().map(|w| w.as_ref().to_lowercase()).collect();
        let mut seen = HashSet::new();
        self.mods_info
            .item_mods
            .iter()
            .filter(|m| {
                let key = m.name.to_lowercase();
                wanted.contains(&key) && seen.insert(key)
            })
            .collect()
    }

    /// Whether every wanted mod name is present, ignoring case.
    ///
    /// Duplicate wanted names never match, since each present name counts once.
    pub fn has_mods<S: AsRef<str>>(&self, wanted: &[S]) -> bool {
        self.mods_named(wanted).len() == wanted.len()
    }

    /// Summed stats of the item mods named in `wanted`.
    pub fn mod_stats<S: AsRef<str>>(&self, wanted: &[S]) -> StatTable<i64> {
        sum_stats(self.mods_named(wanted))
    }

    /// Stats of every item mod named in `names`, weighted by the matching entry of `weights`.
    pub fn mod_weighted_stat_sum<S: AsRef<str>>(&self, names: &[S], weights: &[f64]) -> Result<StatTable<f64>, EvalError> {
        if names.len() != weights.len() {
            return Err(EvalError::LengthMismatch {
                what: "ModWeightedStatSum",
                left: names.len(),
                right: weights.len(),
            });
        }
        let mods = &self.mods_info.item_mods;
        Ok(sum_weighted_stats(mods.iter().flat_map(|m| {
            names
                .iter()
                .zip(weights)
                .filter(move |(name, _)| name.as_ref().to_lowercase() == m.name.to_lowercase())
                .map(move |(_, weight)| (m, *weight))
        })))
    }

    /// Whether any set has every raw mod name present in `mods`, ignoring case.
    pub fn has_any_mod_set_in<'m, S: AsRef<str>>(
        mods: impl IntoIterator<Item = &'m ModifierEntry>,
        sets: &[Vec<S>],
    ) -> bool {
        let present: HashSet<String> = mods.into_iter().map(|m| m.raw_name.to_lowercase()).collect();
        sets.iter()
            .any(|set| set.iter().all(|name| present.contains(&name.as_ref().to_lowercase())))
    }

    /// `has_any_mod_set_in` over the explicit mods.
    pub fn has_any_mod_set<S: AsRef<str>>(&self, sets: &[Vec<S>]) -> bool {
        Self::has_any_mod_set_in(&self.mods_info.explicit_mods, sets)
    }

    pub fn has_unordered_socket_group(&self, pattern: &str, exact: bool) -> bool {
        sockets::matches_any_group(&self.socket_info.socket_groups, pattern, exact)
    }

    pub fn has_sockets(&self, pattern: &str, exact: bool) -> bool {
        sockets::matches_flattened(&self.socket_info.socket_groups, pattern, exact)
    }

    pub fn total_affix_slots(&self) -> i64 {
        total_affix_slots(self.rarity, &self.class_name)
    }

    /// `criterion` holds for this item and for none the player owns.
    pub fn is_unowned_item<'s, E>(
        &'s self,
        mut criterion: impl FnMut(&'s ItemSnapshot) -> Result<bool, E>,
    ) -> Result<bool, E> {
        if !criterion(self)? {
            return Ok(false);
        }
        for owned in &self.player().owned_items {
            if criterion(owned.as_ref())? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// This item is a gem, `criterion` holds for it, and for no owned gem.
    pub fn is_unowned_gem<'s, E>(
        &'s self,
        mut criterion: impl FnMut(&'s ItemSnapshot) -> Result<bool, E>,
    ) -> Result<bool, E> {
        if !self.gem_info.is_gem || !criterion(self)? {
            return Ok(false);
        }
        for owned in &self.player().owned_gems {
            if criterion(owned.as_ref())? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Whether any set has all of its conditions true.
pub fn has_any_matching_condition_set(sets: &[Vec<bool>]) -> bool {
    sets.iter().any(|set| set.iter().all(|c| *c))
}

/// Whether `input` contains any of `wanted`, ignoring case.
pub fn contains_string<S: AsRef<str>>(input: &str, wanted: &[S]) -> bool {
    wanted.iter().any(|w| contains_ignore_case(input, w.as_ref()))
}

/// Whether `input` contains any of `wanted`.
pub fn contains_string_case<S: AsRef<str>>(input: &str, wanted: &[S]) -> bool {
    wanted.iter().any(|w| input.contains(w.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rare_ring() -> ItemAttributes {
        ItemAttributes {
            base_name: "Two-Stone Ring".into(),
            class_name: "Ring".into(),
            rarity: ItemRarity::Rare,
            is_identified: true,
            item_level: 84,
            tags: vec!["ring".into()],
            path_tags: vec!["RingAtlas".into()],
            mods: ModAttributes {
                implicit: vec![ModifierEntry::new("FireColdResist").with_stat("fire_res", 12)],
                explicit: vec![
                    ModifierEntry::new("IncreasedLife")
                        .with_raw_name("IncreasedLife7")
                        .with_affix(AffixKind::Prefix)
                        .with_stat("base_maximum_life", 70),
                    ModifierEntry::new("FireResist")
                        .with_raw_name("FireResist5")
                        .with_affix(AffixKind::Suffix)
                        .with_stat("fire_res", 30),
                    ModifierEntry::new("VeiledSuffix")
                        .with_display_name("Veiled")
                        .with_affix(AffixKind::Suffix),
                ],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_derived_mod_fields() {
        let item = ItemSnapshot::new(rare_ring());
        assert_eq!(item.mods_names, vec!["FireColdResist", "IncreasedLife", "FireResist", "VeiledSuffix"]);
        assert_eq!(item.veiled_mod_count, 1);
        assert!(!item.enchanted);
        assert_eq!(item.mods_info.prefixes().len(), 1);
        assert_eq!(item.mods_info.suffixes().len(), 2);
        assert_eq!(item.mods_info.open_prefix_count, 2);
        assert_eq!(item.mods_info.open_suffix_count, 1);
        assert!(item.mods_info.has_open_prefix);
    }

    #[test]
    fn test_unidentified_open_affixes_unknown() {
        let mut attrs = rare_ring();
        attrs.is_identified = false;
        let item = ItemSnapshot::new(attrs);
        assert_eq!(item.mods_info.open_prefix_count, -1);
        assert!(!item.mods_info.has_open_prefix);
    }

    #[test]
    fn test_item_stats_memoized() {
        let mut attrs = rare_ring();
        attrs.is_identified = false;
        let item = ItemSnapshot::new(attrs);
        assert!(!item.mods_info.is_cached(ModPartition::ItemMods));
        assert_eq!(item.item_stats().get("fire_res"), 42);
        assert!(item.mods_info.is_cached(ModPartition::ItemMods));
        assert!(std::ptr::eq(item.item_stats(), item.item_stats()));
    }

    #[test]
    fn test_influence_and_distance() {
        let item = ItemSnapshot::new(ItemAttributes {
            is_hunter: true,
            ..Default::default()
        });
        assert!(item.is_influenced);
        assert!(item.distance.is_infinite());
    }

    #[test]
    fn test_map_derivation() {
        let item = ItemSnapshot::new(ItemAttributes {
            item_quality: 20,
            map: Some(MapAttributes {
                tier: 16,
                ..Default::default()
            }),
            mods: ModAttributes {
                explicit: vec![
                    ModifierEntry::new("MapElder").with_stat(keys::MAP_ELDER_BOSS_VARIATION, 2),
                    ModifierEntry::new("MapPack").with_stat(keys::MAP_PACK_SIZE_PCT, 25),
                ],
                ..Default::default()
            },
            ..Default::default()
        });
        let map = item.map_info;
        assert!(map.is_map);
        assert_eq!(map.tier, 16);
        assert_eq!(map.quality, 20);
        assert_eq!(map.pack_size, 25);
        assert!(map.occupied_by.eradicator);
        assert!(map.occupied_by.elder_boss);
        assert!(map.occupied);
        assert!(!map.kind.normal);
    }

    #[test]
    fn test_attack_speed() {
        let mut local = StatTable::new();
        local.add(keys::LOCAL_ATTACK_SPEED_PCT, 10);
        let item = ItemSnapshot::new(ItemAttributes {
            attack_time: Some(800),
            local_stats: local,
            ..Default::default()
        });
        assert!(item.is_weapon);
        assert_eq!(item.attack_speed.base, 1.25);
        assert_eq!(item.attack_speed.total, 1.38);
    }

    #[test]
    fn test_real_required_level_uses_gems() {
        let item = ItemSnapshot::new(ItemAttributes {
            required_level: 40,
            sockets: SocketAttributes {
                largest_link_size: 2,
                socket_groups: vec!["rg".into()],
                socketed_gems: vec![ItemAttributes {
                    required_level: 70,
                    gem: Some(GemInfo::default()),
                    ..Default::default()
                }],
            },
            ..Default::default()
        });
        assert_eq!(item.real_required_level, 70);
        assert!(item.socket_info.socketed_gems[0].gem_info.is_gem);
        assert_eq!(item.socket_info.socket_number, 2);
    }

    #[test]
    fn test_tag_helpers_are_cached() {
        let item = ItemSnapshot::new(rare_ring());
        assert!(item.has_tag("RING"));
        assert!(!item.has_tag_case("RING"));
        assert!(item.has_tag_case("Atlas"));
        assert_eq!(item.cached_tag_count(), 3);
        assert!(item.has_tag("ring"));
        assert_eq!(item.cached_tag_count(), 3);
        assert!(item.has_tag_in(&["a", "Amulet"], "amu"));
    }

    #[test]
    fn test_mod_helpers() {
        let item = ItemSnapshot::new(rare_ring());
        assert!(item.has_mods(&["increasedlife", "FireResist"]));
        assert!(!item.has_mods(&["IncreasedLife", "Missing"]));
        assert!(!item.has_mods(&["IncreasedLife", "IncreasedLife"]));
        assert_eq!(item.find_mods("resist").len(), 2);
        assert_eq!(item.mod_stats(&["FireResist"]).get("fire_res"), 30);

        let weighted = item.mod_weighted_stat_sum(&["IncreasedLife"], &[0.5]).unwrap();
        assert_eq!(weighted.get("base_maximum_life"), 35.0);
        assert!(matches!(
            item.mod_weighted_stat_sum(&["a", "b"], &[1.0]),
            Err(EvalError::LengthMismatch { left: 2, right: 1, .. })
        ));

        assert!(item.has_any_mod_set(&[vec!["Nope"], vec!["increasedlife7", "FIRERESIST5"]]));
        assert!(!item.has_any_mod_set(&[vec!["IncreasedLife7", "Nope"]]));
    }

    #[test]
    fn test_affix_slots() {
        assert_eq!(total_affix_slots(ItemRarity::Rare, "Jewel"), 2);
        assert_eq!(total_affix_slots(ItemRarity::Rare, "Ring"), 3);
        assert_eq!(total_affix_slots(ItemRarity::Magic, "Ring"), 1);
        assert_eq!(total_affix_slots(ItemRarity::Unique, "Ring"), 0);
    }

    struct CountingPricer(AtomicUsize);

    impl PriceSource for CountingPricer {
        fn estimate(&self, item: &ItemSnapshot) -> Option<f64> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(item.item_level as f64 * 0.5)
        }
    }

    #[test]
    fn test_estimated_value_memoized() {
        let pricer = Arc::new(CountingPricer(AtomicUsize::new(0)));
        let item = ItemSnapshot::new(rare_ring()).with_price_source(pricer.clone());
        assert_eq!(item.estimated_value(), 42.0);
        assert_eq!(item.estimated_value(), 42.0);
        assert_eq!(pricer.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_estimated_value_without_source() {
        let item = ItemSnapshot::new(rare_ring());
        assert_eq!(item.estimated_value(), 0.0);
    }

    #[test]
    fn test_condition_sets_and_strings() {
        assert!(has_any_matching_condition_set(&[vec![true, false], vec![true, true]]));
        assert!(!has_any_matching_condition_set(&[vec![false]]));
        assert!(contains_string("Chaos Orb", &["orb"]));
        assert!(!contains_string_case("Chaos Orb", &["orb"]));
    }
}
