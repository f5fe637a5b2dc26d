//! Rule-visible surface of `ItemSnapshot`.
//!
//! Field tables for every record reachable from an item, and the helper
//! library rules can call. Field names are case-sensitive.

use crate::error::EvalError;
use crate::item::{
    contains_string, contains_string_case, has_any_matching_condition_set, AreaInfo, ArmourInfo, AttackSpeed,
    AttributeRequirements, ChargeInfo, FlaskInfo, GemInfo, ItemRarity, ItemSnapshot, MapInfluence, MapInfo,
    MapOccupation, MapType, ModsInfo, SocketInfo, StackInfo,
};
use crate::player::PlayerSnapshot;
use crate::schema::{ElemType, Field, Helper, RecordInfo, RecordType, Schema, Type};
use crate::stats::{sum_stats, ModList, ModPartition, ModifierEntry};
use crate::value::{Args, Value};
use std::borrow::Cow;

macro_rules! field {
    ($name:literal, $ty:expr, $get:expr) => {
        Field {
            name: $name,
            ty: $ty,
            get: $get,
        }
    };
}

const STRS: Type = Type::List(ElemType::Str);
const ITEMS: Type = Type::List(ElemType::Record(RecordInfo::of::<ItemSnapshot>()));

const fn record<T: RecordType>() -> Type {
    Type::Record(RecordInfo::of::<T>())
}

fn items(list: &[std::sync::Arc<ItemSnapshot>]) -> Value<'_> {
    Value::records(list.iter().map(|item| item.as_ref()))
}

fn mods<'a>(info: &'a ModsInfo, partition: ModPartition) -> Value<'a> {
    Value::Mods(info.list(partition))
}

static ITEM_FIELDS: &[Field<ItemSnapshot>] = &[
    field!("Path", Type::Str, |it| Value::str(&it.path)),
    field!("ClassName", Type::Str, |it| Value::str(&it.class_name)),
    field!("BaseName", Type::Str, |it| Value::str(&it.base_name)),
    field!("Name", Type::Str, |it| Value::str(&it.name)),
    field!("PublicPrice", Type::Str, |it| Value::str(&it.public_price)),
    field!("HeistContractJobType", Type::Str, |it| Value::str(&it.heist_contract_job_type)),
    field!("ResourcePath", Type::Str, |it| Value::str(&it.resource_path)),
    field!("ItemQuality", Type::Int, |it| Value::Int(it.item_quality)),
    field!("VeiledModCount", Type::Int, |it| Value::Int(it.veiled_mod_count)),
    field!("FracturedModCount", Type::Int, |it| Value::Int(it.fractured_mod_count)),
    field!("ItemLevel", Type::Int, |it| Value::Int(it.item_level)),
    field!("RequiredLevel", Type::Int, |it| Value::Int(it.required_level)),
    field!("RealRequiredLevel", Type::Int, |it| Value::Int(it.real_required_level)),
    field!("DeliriumStacks", Type::Int, |it| Value::Int(it.delirium_stacks)),
    field!("HeistContractReqJobLevel", Type::Int, |it| Value::Int(it.heist_contract_req_job_level)),
    field!("ScourgeTier", Type::Int, |it| Value::Int(it.scourge_tier)),
    field!("IsIdentified", Type::Bool, |it| Value::Bool(it.is_identified)),
    field!("IsMirrored", Type::Bool, |it| Value::Bool(it.is_mirrored)),
    field!("IsCorrupted", Type::Bool, |it| Value::Bool(it.is_corrupted)),
    field!("IsElder", Type::Bool, |it| Value::Bool(it.is_elder)),
    field!("IsShaper", Type::Bool, |it| Value::Bool(it.is_shaper)),
    field!("IsCrusader", Type::Bool, |it| Value::Bool(it.is_crusader)),
    field!("IsRedeemer", Type::Bool, |it| Value::Bool(it.is_redeemer)),
    field!("IsHunter", Type::Bool, |it| Value::Bool(it.is_hunter)),
    field!("IsWarlord", Type::Bool, |it| Value::Bool(it.is_warlord)),
    field!("IsInfluenced", Type::Bool, |it| Value::Bool(it.is_influenced)),
    field!("IsSynthesised", Type::Bool, |it| Value::Bool(it.is_synthesised)),
    field!("Enchanted", Type::Bool, |it| Value::Bool(it.enchanted)),
    field!("Rarity", Type::Str, |it| Value::str(it.rarity.as_str())),
    field!("ModsNames", STRS, |it| Value::str_list(&it.mods_names)),
    field!("PathTags", STRS, |it| Value::str_list(&it.path_tags)),
    field!("Tags", STRS, |it| Value::str_list(&it.tags)),
    field!("Id", Type::Int, |it| Value::Int(it.id)),
    field!("InventoryId", Type::Int, |it| Value::Int(it.inventory_id)),
    field!("Height", Type::Int, |it| Value::Int(it.height)),
    field!("Width", Type::Int, |it| Value::Int(it.width)),
    field!("MemoryStrands", Type::Int, |it| Value::Int(it.memory_strands)),
    field!("IsWeapon", Type::Bool, |it| Value::Bool(it.is_weapon)),
    field!("ShieldBlockChance", Type::Int, |it| Value::Int(it.shield_block_chance)),
    field!("Distance", Type::Float, |it| Value::Float(it.distance)),
    field!("EstimatedValue", Type::Float, |it| Value::Float(it.estimated_value())),
    field!("GemInfo", record::<GemInfo>(), |it| Value::Record(&it.gem_info)),
    field!("StackInfo", record::<StackInfo>(), |it| Value::Record(&it.stack_info)),
    field!("SocketInfo", record::<SocketInfo>(), |it| Value::Record(&it.socket_info)),
    field!("ChargeInfo", record::<ChargeInfo>(), |it| Value::Record(&it.charge_info)),
    field!("FlaskInfo", record::<FlaskInfo>(), |it| Value::Record(&it.flask_info)),
    field!("AttributeRequirements", record::<AttributeRequirements>(), |it| {
        Value::Record(&it.attribute_requirements)
    }),
    field!("ArmourInfo", record::<ArmourInfo>(), |it| Value::Record(&it.armour_info)),
    field!("ModsInfo", record::<ModsInfo>(), |it| Value::Record(&it.mods_info)),
    field!("AreaInfo", record::<AreaInfo>(), |it| Value::Record(&it.area_info)),
    field!("MapInfo", record::<MapInfo>(), |it| Value::Record(&it.map_info)),
    field!("AttackSpeed", record::<AttackSpeed>(), |it| Value::Record(&it.attack_speed)),
    field!("PlayerInfo", record::<PlayerSnapshot>(), |it| Value::Record(it.player())),
    field!("LocalStats", Type::IntStats, |it| Value::IntStats(Cow::Borrowed(&it.local_stats))),
    field!("ItemStats", Type::IntStats, |it| Value::IntStats(Cow::Borrowed(it.item_stats()))),
];

impl RecordType for ItemSnapshot {
    const NAME: &'static str = "ItemSnapshot";

    fn fields() -> &'static [Field<Self>] {
        ITEM_FIELDS
    }

    fn aliases() -> &'static [(&'static str, &'static str)] {
        &[("Corrupted", "IsCorrupted")]
    }
}

static MOD_FIELDS: &[Field<ModifierEntry>] = &[
    field!("Name", Type::Str, |m| Value::str(&m.name)),
    field!("RawName", Type::Str, |m| Value::str(&m.raw_name)),
    field!("DisplayName", Type::Str, |m| Value::str(&m.display_name)),
    field!("Affix", Type::Str, |m| Value::str(m.affix.as_str())),
    field!("Values", Type::List(ElemType::Int), |m| {
        Value::List(m.stats.iter().map(|(_, v)| Value::Int(*v)).collect())
    }),
    field!("Stats", Type::IntStats, |m| Value::IntStats(Cow::Owned(sum_stats([m])))),
];

impl RecordType for ModifierEntry {
    const NAME: &'static str = "ItemMod";

    fn fields() -> &'static [Field<Self>] {
        MOD_FIELDS
    }
}

static GEM_FIELDS: &[Field<GemInfo>] = &[
    field!("Level", Type::Int, |g| Value::Int(g.level)),
    field!("MaxLevel", Type::Int, |g| Value::Int(g.max_level)),
    field!("QualityType", Type::Str, |g| Value::str(&g.quality_type)),
    field!("IsGem", Type::Bool, |g| Value::Bool(g.is_gem)),
];

impl RecordType for GemInfo {
    const NAME: &'static str = "SkillGemData";

    fn fields() -> &'static [Field<Self>] {
        GEM_FIELDS
    }
}

static STACK_FIELDS: &[Field<StackInfo>] = &[
    field!("Count", Type::Int, |s| Value::Int(s.count)),
    field!("MaxCount", Type::Int, |s| Value::Int(s.max_count)),
];

impl RecordType for StackInfo {
    const NAME: &'static str = "StackData";

    fn fields() -> &'static [Field<Self>] {
        STACK_FIELDS
    }
}

static SOCKET_FIELDS: &[Field<SocketInfo>] = &[
    field!("LargestLinkSize", Type::Int, |s| Value::Int(s.largest_link_size)),
    field!("SocketNumber", Type::Int, |s| Value::Int(s.socket_number)),
    field!("SocketGroups", STRS, |s| Value::str_list(&s.socket_groups)),
    field!("SocketedGems", ITEMS, |s| items(&s.socketed_gems)),
];

impl RecordType for SocketInfo {
    const NAME: &'static str = "SocketData";

    fn fields() -> &'static [Field<Self>] {
        SOCKET_FIELDS
    }
}

static CHARGE_FIELDS: &[Field<ChargeInfo>] = &[
    field!("Current", Type::Int, |c| Value::Int(c.current)),
    field!("Max", Type::Int, |c| Value::Int(c.max)),
    field!("PerUse", Type::Int, |c| Value::Int(c.per_use)),
];

impl RecordType for ChargeInfo {
    const NAME: &'static str = "ChargesData";

    fn fields() -> &'static [Field<Self>] {
        CHARGE_FIELDS
    }
}

static FLASK_FIELDS: &[Field<FlaskInfo>] = &[
    field!("LifeRecovery", Type::Int, |f| Value::Int(f.life_recovery)),
    field!("ManaRecovery", Type::Int, |f| Value::Int(f.mana_recovery)),
    field!("Stats", Type::IntStats, |f| Value::IntStats(Cow::Borrowed(&f.stats))),
];

impl RecordType for FlaskInfo {
    const NAME: &'static str = "FlaskData";

    fn fields() -> &'static [Field<Self>] {
        FLASK_FIELDS
    }
}

static REQUIREMENT_FIELDS: &[Field<AttributeRequirements>] = &[
    field!("Strength", Type::Int, |r| Value::Int(r.strength)),
    field!("Dexterity", Type::Int, |r| Value::Int(r.dexterity)),
    field!("Intelligence", Type::Int, |r| Value::Int(r.intelligence)),
];

impl RecordType for AttributeRequirements {
    const NAME: &'static str = "AttributeRequirementsData";

    fn fields() -> &'static [Field<Self>] {
        REQUIREMENT_FIELDS
    }
}

static ARMOUR_FIELDS: &[Field<ArmourInfo>] = &[
    field!("Armour", Type::Int, |a| Value::Int(a.armour)),
    field!("Evasion", Type::Int, |a| Value::Int(a.evasion)),
    field!("ES", Type::Int, |a| Value::Int(a.es)),
    field!("Perfection", Type::Int, |a| Value::Int(a.perfection)),
];

impl RecordType for ArmourInfo {
    const NAME: &'static str = "ArmourData";

    fn fields() -> &'static [Field<Self>] {
        ARMOUR_FIELDS
    }
}

static MODS_FIELDS: &[Field<ModsInfo>] = &[
    field!("ItemMods", Type::Mods, |m| mods(m, ModPartition::ItemMods)),
    field!("EnchantedMods", Type::Mods, |m| mods(m, ModPartition::EnchantedMods)),
    field!("ExplicitMods", Type::Mods, |m| mods(m, ModPartition::ExplicitMods)),
    field!("FracturedMods", Type::Mods, |m| mods(m, ModPartition::FracturedMods)),
    field!("ImplicitMods", Type::Mods, |m| mods(m, ModPartition::ImplicitMods)),
    field!("ScourgeMods", Type::Mods, |m| mods(m, ModPartition::ScourgeMods)),
    field!("SynthesisMods", Type::Mods, |m| mods(m, ModPartition::SynthesisMods)),
    field!("CrucibleMods", Type::Mods, |m| mods(m, ModPartition::CrucibleMods)),
    field!("Prefixes", Type::Mods, |m| Value::Mods(ModList::Subset(m.prefixes().iter().collect()))),
    field!("Suffixes", Type::Mods, |m| Value::Mods(ModList::Subset(m.suffixes().iter().collect()))),
    field!("OpenPrefixCount", Type::Int, |m| Value::Int(m.open_prefix_count)),
    field!("OpenSuffixCount", Type::Int, |m| Value::Int(m.open_suffix_count)),
    field!("HasOpenPrefix", Type::Bool, |m| Value::Bool(m.has_open_prefix)),
    field!("HasOpenSuffix", Type::Bool, |m| Value::Bool(m.has_open_suffix)),
];

impl RecordType for ModsInfo {
    const NAME: &'static str = "ModsData";

    fn fields() -> &'static [Field<Self>] {
        MODS_FIELDS
    }
}

static AREA_FIELDS: &[Field<AreaInfo>] = &[
    field!("Level", Type::Int, |a| Value::Int(a.level)),
    field!("Name", Type::Str, |a| Value::str(&a.name)),
    field!("Act", Type::Int, |a| Value::Int(a.act)),
    field!("IsEndGame", Type::Bool, |a| Value::Bool(a.is_end_game)),
];

impl RecordType for AreaInfo {
    const NAME: &'static str = "AreaData";

    fn fields() -> &'static [Field<Self>] {
        AREA_FIELDS
    }
}

static ATTACK_SPEED_FIELDS: &[Field<AttackSpeed>] = &[
    field!("Base", Type::Float, |a| Value::Float(a.base)),
    field!("Total", Type::Float, |a| Value::Float(a.total)),
];

impl RecordType for AttackSpeed {
    const NAME: &'static str = "AttackSpeedData";

    fn fields() -> &'static [Field<Self>] {
        ATTACK_SPEED_FIELDS
    }
}

static MAP_FIELDS: &[Field<MapInfo>] = &[
    field!("IsMap", Type::Bool, |m| Value::Bool(m.is_map)),
    field!("Tier", Type::Int, |m| Value::Int(m.tier)),
    field!("Quantity", Type::Int, |m| Value::Int(m.quantity)),
    field!("Rarity", Type::Int, |m| Value::Int(m.rarity)),
    field!("PackSize", Type::Int, |m| Value::Int(m.pack_size)),
    field!("Quality", Type::Int, |m| Value::Int(m.quality)),
    field!("MoreMaps", Type::Int, |m| Value::Int(m.more_maps)),
    field!("MoreScarabs", Type::Int, |m| Value::Int(m.more_scarabs)),
    field!("MoreCurrency", Type::Int, |m| Value::Int(m.more_currency)),
    field!("Occupied", Type::Bool, |m| Value::Bool(m.occupied)),
    field!("OccupiedBy", record::<MapOccupation>(), |m| Value::Record(&m.occupied_by)),
    field!("Type", record::<MapType>(), |m| Value::Record(&m.kind)),
    field!("Influence", record::<MapInfluence>(), |m| Value::Record(&m.influence)),
    field!("IsBonusCompleted", Type::Bool, |m| Value::Bool(m.is_bonus_completed)),
    field!("IsCompleted", Type::Bool, |m| Value::Bool(m.is_completed)),
];

impl RecordType for MapInfo {
    const NAME: &'static str = "MapData";

    fn fields() -> &'static [Field<Self>] {
        MAP_FIELDS
    }
}

static OCCUPATION_FIELDS: &[Field<MapOccupation>] = &[
    field!("ElderBoss", Type::Bool, |o| Value::Bool(o.elder_boss)),
    field!("Enslaver", Type::Bool, |o| Value::Bool(o.enslaver)),
    field!("Eradicator", Type::Bool, |o| Value::Bool(o.eradicator)),
    field!("Constrictor", Type::Bool, |o| Value::Bool(o.constrictor)),
    field!("Purifier", Type::Bool, |o| Value::Bool(o.purifier)),
    field!("ConquerorBoss", Type::Bool, |o| Value::Bool(o.conqueror_boss)),
    field!("Baran", Type::Bool, |o| Value::Bool(o.baran)),
    field!("Veritania", Type::Bool, |o| Value::Bool(o.veritania)),
    field!("AlHezmin", Type::Bool, |o| Value::Bool(o.al_hezmin)),
    field!("Drox", Type::Bool, |o| Value::Bool(o.drox)),
];

impl RecordType for MapOccupation {
    const NAME: &'static str = "MapOccupationData";

    fn fields() -> &'static [Field<Self>] {
        OCCUPATION_FIELDS
    }
}

static MAP_TYPE_FIELDS: &[Field<MapType>] = &[
    field!("Normal", Type::Bool, |t| Value::Bool(t.normal)),
    field!("Blighted", Type::Bool, |t| Value::Bool(t.blighted)),
    field!("BlightRavaged", Type::Bool, |t| Value::Bool(t.blight_ravaged)),
    field!("Uber", Type::Bool, |t| Value::Bool(t.uber)),
];

impl RecordType for MapType {
    const NAME: &'static str = "MapTypeData";

    fn fields() -> &'static [Field<Self>] {
        MAP_TYPE_FIELDS
    }
}

static MAP_INFLUENCE_FIELDS: &[Field<MapInfluence>] = &[field!("Memory", Type::Bool, |i| Value::Bool(i.memory))];

impl RecordType for MapInfluence {
    const NAME: &'static str = "MapInfluenceData";

    fn fields() -> &'static [Field<Self>] {
        MAP_INFLUENCE_FIELDS
    }
}

static PLAYER_FIELDS: &[Field<PlayerSnapshot>] = &[
    field!("Level", Type::Int, |p| Value::Int(p.level)),
    field!("Strength", Type::Int, |p| Value::Int(p.strength)),
    field!("Dexterity", Type::Int, |p| Value::Int(p.dexterity)),
    field!("Intelligence", Type::Int, |p| Value::Int(p.intelligence)),
    field!("EquippedItems", ITEMS, |p| items(&p.equipped_items)),
    field!("InventoryItems", ITEMS, |p| items(&p.inventory_items)),
    field!("OwnedItems", ITEMS, |p| items(&p.owned_items)),
    field!("OwnedGems", ITEMS, |p| items(&p.owned_gems)),
];

impl RecordType for PlayerSnapshot {
    const NAME: &'static str = "PlayerData";

    fn fields() -> &'static [Field<Self>] {
        PLAYER_FIELDS
    }
}

// Helper implementations. Arguments arrive type-checked and in declaration
// order; variadic tails arrive as one list.

type HelperResult<'a> = Result<Value<'a>, EvalError>;

fn has_tag<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    Ok(Value::Bool(item.has_tag(&args.str()?)))
}

fn has_tag_in<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    let tags = args.strings()?;
    Ok(Value::Bool(item.has_tag_in(&tags, &args.str()?)))
}

fn has_tag_case<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    Ok(Value::Bool(item.has_tag_case(&args.str()?)))
}

fn has_tag_in_case<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    let tags = args.strings()?;
    Ok(Value::Bool(item.has_tag_in_case(&tags, &args.str()?)))
}

fn contains_string_helper<'a>(_: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    let input = args.str()?;
    Ok(Value::Bool(contains_string(&input, &args.strings()?)))
}

fn contains_string_case_helper<'a>(_: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    let input = args.str()?;
    Ok(Value::Bool(contains_string_case(&input, &args.strings()?)))
}

fn has_mods<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    Ok(Value::Bool(item.has_mods(&args.strings()?)))
}

fn find_mods<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    Ok(Value::Mods(ModList::Subset(item.find_mods(&args.str()?))))
}

fn mod_stats<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    Ok(Value::IntStats(Cow::Owned(item.mod_stats(&args.strings()?))))
}

fn mod_weighted_stat_sum<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    let names = args.strings()?;
    let weights = args.floats()?;
    let table = item.mod_weighted_stat_sum(&names, &weights)?;
    Ok(Value::FloatStats(Cow::Owned(table)))
}

fn mod_sets<'a>(args: &mut Args<'a>) -> Result<Vec<Vec<Cow<'a, str>>>, EvalError> {
    args.list()?.into_iter().map(Value::into_strings).collect()
}

fn has_any_mod_set<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    Ok(Value::Bool(item.has_any_mod_set(&mod_sets(&mut args)?)))
}

fn has_any_mod_set_in<'a>(_: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    let mods = args.mods()?;
    let sets = mod_sets(&mut args)?;
    Ok(Value::Bool(ItemSnapshot::has_any_mod_set_in(mods.iter(), &sets)))
}

fn has_any_matching_condition_set_helper<'a>(_: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let mut args = Args::new(args);
    let sets = args
        .list()?
        .into_iter()
        .map(|set| -> Result<Vec<bool>, EvalError> { set.into_list()?.iter().map(Value::as_bool).collect() })
        .collect::<Result<Vec<Vec<bool>>, EvalError>>()?;
    Ok(Value::Bool(has_any_matching_condition_set(&sets)))
}

fn socket_args<'a>(args: Vec<Value<'a>>) -> Result<(Cow<'a, str>, bool), EvalError> {
    let exact = args.len() > 1;
    let mut args = Args::new(args);
    let pattern = args.str()?;
    let exact = if exact { args.bool()? } else { false };
    Ok((pattern, exact))
}

fn has_unordered_socket_group<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let (pattern, exact) = socket_args(args)?;
    Ok(Value::Bool(item.has_unordered_socket_group(&pattern, exact)))
}

fn has_sockets<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let (pattern, exact) = socket_args(args)?;
    Ok(Value::Bool(item.has_sockets(&pattern, exact)))
}

fn get_total_affix_slots<'a>(item: &'a ItemSnapshot, _: Vec<Value<'a>>) -> HelperResult<'a> {
    Ok(Value::Int(item.total_affix_slots()))
}

fn is_unowned_item<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let criterion = Args::new(args).predicate()?;
    let unowned = item.is_unowned_item(|candidate| criterion.call(Value::Record(candidate)))?;
    Ok(Value::Bool(unowned))
}

fn is_unowned_gem<'a>(item: &'a ItemSnapshot, args: Vec<Value<'a>>) -> HelperResult<'a> {
    let criterion = Args::new(args).predicate()?;
    let unowned = item.is_unowned_gem(|candidate| criterion.call(Value::Record(candidate)))?;
    Ok(Value::Bool(unowned))
}

const ITEM_CRITERION: Type = Type::Predicate(ElemType::Record(RecordInfo::of::<ItemSnapshot>()));

static ITEM_HELPERS: &[Helper<ItemSnapshot>] = &[
    Helper {
        name: "HasTag",
        params: &[Type::Str],
        variadic: None,
        returns: Type::Bool,
        call: has_tag,
    },
    Helper {
        name: "HasTag",
        params: &[STRS, Type::Str],
        variadic: None,
        returns: Type::Bool,
        call: has_tag_in,
    },
    Helper {
        name: "HasTagCase",
        params: &[Type::Str],
        variadic: None,
        returns: Type::Bool,
        call: has_tag_case,
    },
    Helper {
        name: "HasTagCase",
        params: &[STRS, Type::Str],
        variadic: None,
        returns: Type::Bool,
        call: has_tag_in_case,
    },
    Helper {
        name: "ContainsString",
        params: &[Type::Str],
        variadic: Some(ElemType::Str),
        returns: Type::Bool,
        call: contains_string_helper,
    },
    Helper {
        name: "ContainsStringCase",
        params: &[Type::Str],
        variadic: Some(ElemType::Str),
        returns: Type::Bool,
        call: contains_string_case_helper,
    },
    Helper {
        name: "HasMods",
        params: &[],
        variadic: Some(ElemType::Str),
        returns: Type::Bool,
        call: has_mods,
    },
    Helper {
        name: "FindMods",
        params: &[Type::Str],
        variadic: None,
        returns: Type::Mods,
        call: find_mods,
    },
    Helper {
        name: "ModStats",
        params: &[],
        variadic: Some(ElemType::Str),
        returns: Type::IntStats,
        call: mod_stats,
    },
    Helper {
        name: "ModWeightedStatSum",
        params: &[STRS, Type::List(ElemType::Float)],
        variadic: None,
        returns: Type::FloatStats,
        call: mod_weighted_stat_sum,
    },
    Helper {
        name: "HasAnyModSet",
        params: &[Type::List(ElemType::StrList)],
        variadic: None,
        returns: Type::Bool,
        call: has_any_mod_set,
    },
    Helper {
        name: "HasAnyModSet",
        params: &[Type::Mods, Type::List(ElemType::StrList)],
        variadic: None,
        returns: Type::Bool,
        call: has_any_mod_set_in,
    },
    Helper {
        name: "HasAnyMatchingConditionSet",
        params: &[Type::List(ElemType::BoolList)],
        variadic: None,
        returns: Type::Bool,
        call: has_any_matching_condition_set_helper,
    },
    Helper {
        name: "HasUnorderedSocketGroup",
        params: &[Type::Str],
        variadic: None,
        returns: Type::Bool,
        call: has_unordered_socket_group,
    },
    Helper {
        name: "HasUnorderedSocketGroup",
        params: &[Type::Str, Type::Bool],
        variadic: None,
        returns: Type::Bool,
        call: has_unordered_socket_group,
    },
    Helper {
        name: "HasSockets",
        params: &[Type::Str],
        variadic: None,
        returns: Type::Bool,
        call: has_sockets,
    },
    Helper {
        name: "HasSockets",
        params: &[Type::Str, Type::Bool],
        variadic: None,
        returns: Type::Bool,
        call: has_sockets,
    },
    Helper {
        name: "GetTotalAffixSlots",
        params: &[],
        variadic: None,
        returns: Type::Int,
        call: get_total_affix_slots,
    },
    Helper {
        name: "IsUnownedItem",
        params: &[ITEM_CRITERION],
        variadic: None,
        returns: Type::Bool,
        call: is_unowned_item,
    },
    Helper {
        name: "IsUnownedGem",
        params: &[ITEM_CRITERION],
        variadic: None,
        returns: Type::Bool,
        call: is_unowned_gem,
    },
];

impl Schema for ItemSnapshot {
    fn helpers() -> &'static [Helper<Self>] {
        ITEM_HELPERS
    }

    fn enums() -> &'static [(&'static str, &'static [&'static str])] {
        &[("ItemRarity", ItemRarity::NAMES)]
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Record;

    #[test]
    fn test_field_names_unique() {
        let mut names: Vec<&str> = ITEM_FIELDS.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ITEM_FIELDS.len());
    }

    #[test]
    fn test_alias_resolves_to_same_field() {
        let info = RecordInfo::of::<ItemSnapshot>();
        assert_eq!(info.field("Corrupted"), info.field("IsCorrupted"));
        assert!(info.field("corrupted").is_none());
    }

    #[test]
    fn test_field_access_by_index() {
        let item = ItemSnapshot::new(crate::item::ItemAttributes {
            base_name: "Chaos Orb".into(),
            rarity: ItemRarity::Currency,
            ..Default::default()
        });
        let info = RecordInfo::of::<ItemSnapshot>();

        let (index, ty) = info.field("BaseName").unwrap();
        assert_eq!(ty, Type::Str);
        assert_eq!(item.field(index).unwrap().as_str().unwrap(), "Chaos Orb");

        let (index, _) = info.field("Rarity").unwrap();
        assert_eq!(item.field(index).unwrap().as_str().unwrap(), "Currency");
    }

    #[test]
    fn test_describe() {
        let item = ItemSnapshot::new(crate::item::ItemAttributes {
            base_name: "Chaos Orb".into(),
            class_name: "StackableCurrency".into(),
            distance: Some(12.5),
            ..Default::default()
        });
        assert_eq!(item.describe(), "Chaos Orb (StackableCurrency) Dist: 12.5");
    }
}
