use itemfilter::item::{keys, GemInfo, MapAttributes, ModAttributes, SocketAttributes};
use itemfilter::stats::{sum_stats, sum_weighted_stats, AffixKind};
use itemfilter::*;
use std::sync::Arc;

fn check(rule: &str, item: &ItemSnapshot) -> bool {
    let predicate = compile::<ItemSnapshot>(rule).unwrap_or_else(|e| panic!("{}: {}", rule, e));
    predicate.evaluate(item).unwrap()
}

fn six_link() -> ItemSnapshot {
    ItemSnapshot::new(ItemAttributes {
        base_name: "Vaal Regalia".into(),
        class_name: "Body Armour".into(),
        rarity: ItemRarity::Rare,
        is_identified: true,
        item_level: 86,
        tags: vec!["body_armour".into(), "int_armour".into()],
        sockets: SocketAttributes {
            largest_link_size: 4,
            socket_groups: vec!["rgbw".into(), "rr".into()],
            socketed_gems: Vec::new(),
        },
        mods: ModAttributes {
            implicit: vec![ModifierEntry::new("EnergyShieldImplicit").with_stat("local_energy_shield", 30)],
            explicit: vec![
                ModifierEntry::new("IncreasedLife")
                    .with_raw_name("IncreasedLife9")
                    .with_affix(AffixKind::Prefix)
                    .with_stat("base_maximum_life", 90),
                ModifierEntry::new("IncreasedEnergyShield")
                    .with_raw_name("IncreasedEnergyShield8")
                    .with_affix(AffixKind::Prefix)
                    .with_stat("local_energy_shield", 60),
                ModifierEntry::new("ColdResist")
                    .with_raw_name("ColdResist6")
                    .with_affix(AffixKind::Suffix)
                    .with_stat("cold_damage_resistance_%", 42),
            ],
            ..Default::default()
        },
        ..Default::default()
    })
}

/// `[{+10 life}, {+5 life}, {+2 mana}]` sums per key, missing keys read 0.
#[test]
fn test_stat_aggregation() {
    let mods = vec![
        ModifierEntry::new("A").with_stat("life", 10),
        ModifierEntry::new("B").with_stat("life", 5),
        ModifierEntry::new("C").with_stat("mana", 2),
    ];
    let table = sum_stats(&mods);
    assert_eq!(table.get("life"), 15);
    assert_eq!(table.get("mana"), 2);
    assert_eq!(table.get("armour"), 0);

    let halved = sum_weighted_stats(mods.iter().map(|m| (m, 0.5)));
    assert_eq!(halved.get("life"), 7.5);
}

#[test]
fn test_socket_helpers() {
    let item = six_link();
    assert!(check("HasUnorderedSocketGroup(\"rgb\")", &item));
    // the white socket of "rgbw" stands in for the second red
    assert!(check("HasUnorderedSocketGroup(\"rrg\")", &item));
    assert!(!check("HasUnorderedSocketGroup(\"rrr\")", &item));
    assert!(!check("HasUnorderedSocketGroup(\"rgb\", true)", &item));
    assert!(check("HasSockets(\"rrrgb\")", &item));
    assert!(check("SocketInfo.SocketNumber == 6", &item));
    assert!(check("SocketInfo.SocketGroups.Any(g => g.Length == 4)", &item));
}

#[test]
fn test_mod_partitions_and_stats() {
    let item = six_link();
    assert!(check("ModsInfo.ExplicitMods.Count == 3", &item));
    assert!(check("ModsInfo.ItemMods.Count() == 4", &item));
    assert!(check("ModsInfo.Prefixes.Count == 2", &item));
    assert!(check("ModsInfo.ExplicitMods.Count(Affix == \"Suffix\") == 1", &item));
    assert!(check("ItemStats[\"local_energy_shield\"] == 90", &item));
    assert!(check("ModsInfo.ImplicitMods.GetStats()[\"local_energy_shield\"] == 30", &item));
    assert!(check(
        "ModsInfo.ExplicitMods.Where(m => m.Affix == \"Prefix\").GetStats()[\"local_energy_shield\"] == 60",
        &item
    ));
    assert!(check("ModsInfo.OpenPrefixCount == 1 && ModsInfo.HasOpenSuffix", &item));
    assert!(check("GetTotalAffixSlots() == 3", &item));
}

#[test]
fn test_mod_lookup_helpers() {
    let item = six_link();
    assert!(check("HasMods(\"increasedlife\", \"ColdResist\")", &item));
    assert!(!check("HasMods(\"IncreasedLife\", \"FireResist\")", &item));
    assert!(check("FindMods(\"energyshield\").Count == 2", &item));
    assert!(check("ModStats(\"IncreasedLife\")[\"base_maximum_life\"] == 90", &item));
    assert!(check(
        "ModWeightedStatSum(new[] { \"IncreasedLife\", \"ColdResist\" }, new[] { 0.5, 2 })[\"base_maximum_life\"] == 45.0",
        &item
    ));
    assert!(check(
        "HasAnyModSet(new[] { new[] { \"Nope\" }, new[] { \"increasedlife9\", \"COLDRESIST6\" } })",
        &item
    ));
    assert!(!check("HasAnyModSet(ModsInfo.ImplicitMods, new[] { new[] { \"IncreasedLife9\" } })", &item));
    assert!(check("HasAnyMatchingConditionSet(new[] { new[] { false }, new[] { ItemLevel > 80, true } })", &item));
}

#[test]
fn test_tag_and_string_helpers() {
    let item = six_link();
    assert!(check("HasTag(\"ARMOUR\")", &item));
    assert!(!check("HasTagCase(\"ARMOUR\")", &item));
    assert!(check("HasTag(new[] { \"ring\", \"amulet\" }, \"AMU\")", &item));
    assert!(check("ContainsString(BaseName, \"regalia\", \"robe\")", &item));
    assert!(!check("ContainsStringCase(BaseName, \"regalia\")", &item));
    assert!(check("Rarity == ItemRarity.Rare && Rarity != ItemRarity.Unique", &item));
}

#[test]
fn test_item_from_json() {
    let json = r#"{
        "base_name": "Hubris Circlet",
        "class_name": "Helmet",
        "rarity": "Rare",
        "item_level": 84,
        "is_identified": true,
        "tags": ["helmet"],
        "mods": {
            "explicit": [
                { "name": "IncreasedLife", "affix": "Prefix", "stats": [["base_maximum_life", 80]] }
            ]
        },
        "local_stats": { "local_attack_speed_+%": 0 }
    }"#;
    let item = ItemSnapshot::from_json(json).unwrap();
    assert_eq!(item.rarity, ItemRarity::Rare);
    assert!(check("ItemStats[\"base_maximum_life\"] == 80", &item));
    assert!(check("ModsInfo.OpenPrefixCount == 2", &item));

    assert!(matches!(ItemSnapshot::from_json("{ \"item_level\": \"x\" }"), Err(FilterError::Json(_))));
}

#[test]
fn test_map_fields() {
    let item = ItemSnapshot::new(ItemAttributes {
        base_name: "Cemetery Map".into(),
        class_name: "Map".into(),
        item_quality: 12,
        map: Some(MapAttributes {
            tier: 14,
            is_completed: true,
            ..Default::default()
        }),
        mods: ModAttributes {
            explicit: vec![
                ModifierEntry::new("MapCitadel").with_stat(keys::MAP_CONTAINS_CITADEL, 3),
                ModifierEntry::new("MapBlighted").with_stat(keys::IS_BLIGHTED_MAP, 1),
                ModifierEntry::new("MapQuantity").with_stat(keys::MAP_ITEM_DROP_QUANTITY_PCT, 20),
                ModifierEntry::new("MapQuantity2").with_stat(keys::MAP_ITEM_DROP_QUANTITY_PCT, 15),
            ],
            ..Default::default()
        },
        ..Default::default()
    });

    assert!(check("MapInfo.IsMap && MapInfo.Tier >= 14", &item));
    assert!(check("MapInfo.OccupiedBy.AlHezmin && MapInfo.OccupiedBy.ConquerorBoss", &item));
    assert!(check("!MapInfo.OccupiedBy.ElderBoss && MapInfo.Occupied", &item));
    assert!(check("MapInfo.Type.Blighted && !MapInfo.Type.Normal", &item));
    assert!(check("MapInfo.Quantity == 35 && MapInfo.Quality == 12", &item));
    assert!(check("MapInfo.IsCompleted && !MapInfo.IsBonusCompleted", &item));
}

#[test]
fn test_weapon_and_gem_fields() {
    let mut local = StatTable::new();
    local.add(keys::LOCAL_ATTACK_SPEED_PCT, 20);
    let weapon = ItemSnapshot::new(ItemAttributes {
        attack_time: Some(667),
        local_stats: local,
        required_level: 60,
        sockets: SocketAttributes {
            largest_link_size: 1,
            socket_groups: vec!["g".into()],
            socketed_gems: vec![ItemAttributes {
                base_name: "Cyclone".into(),
                required_level: 68,
                gem: Some(GemInfo {
                    level: 20,
                    max_level: 20,
                    ..Default::default()
                }),
                ..Default::default()
            }],
        },
        ..Default::default()
    });

    assert!(check("IsWeapon && AttackSpeed.Base == 1.5 && AttackSpeed.Total == 1.8", &weapon));
    assert!(check("RealRequiredLevel == 68 && RequiredLevel == 60", &weapon));
    assert!(check("SocketInfo.SocketedGems.All(GemInfo.IsGem && GemInfo.Level == GemInfo.MaxLevel)", &weapon));
}

#[test]
fn test_player_context_and_ownership() {
    let player = Arc::new(PlayerSnapshot::new(PlayerAttributes {
        level: 92,
        strength: 150,
        inventory: vec![ItemAttributes {
            base_name: "Vaal Regalia".into(),
            id: 7,
            ..Default::default()
        }],
        equipped: vec![ItemAttributes {
            base_name: "Astral Plate".into(),
            id: 3,
            sockets: SocketAttributes {
                socketed_gems: vec![ItemAttributes {
                    base_name: "Arc".into(),
                    gem: Some(GemInfo::default()),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }],
        ..Default::default()
    }));

    let owned_base = six_link().with_player(Arc::clone(&player));
    assert!(check("PlayerInfo.Level == 92 && PlayerInfo.Strength > 100", &owned_base));
    assert!(check("PlayerInfo.OwnedItems.Count == 2", &owned_base));
    assert!(!check("IsUnownedItem(x => x.BaseName == BaseName)", &owned_base));

    let arc_gem = ItemSnapshot::new(ItemAttributes {
        base_name: "Arc".into(),
        gem: Some(GemInfo::default()),
        ..Default::default()
    })
    .with_player(Arc::clone(&player));
    assert!(!check("IsUnownedGem(g => g.BaseName == BaseName)", &arc_gem));

    let spark_gem = ItemSnapshot::new(ItemAttributes {
        base_name: "Spark".into(),
        gem: Some(GemInfo::default()),
        ..Default::default()
    })
    .with_player(player);
    assert!(check("IsUnownedGem(g => g.BaseName == BaseName)", &spark_gem));
    assert!(!check("IsUnownedGem(g => g.BaseName == \"Arc\")", &spark_gem));

    let no_player = six_link();
    assert!(check("PlayerInfo.Level == 0", &no_player));
    assert!(check("IsUnownedItem(x => x.ItemLevel > 80)", &no_player));
}

struct FlatPricer;

impl PriceSource for FlatPricer {
    fn estimate(&self, item: &ItemSnapshot) -> Option<f64> {
        (item.rarity == ItemRarity::Rare).then_some(12.5)
    }
}

#[test]
fn test_estimated_value() {
    let priced = six_link().with_price_source(Arc::new(FlatPricer));
    assert!(check("EstimatedValue > 10", &priced));
    assert!(check("EstimatedValue == 0", &six_link()));
}

#[test]
fn test_player_cache_shares_snapshot() {
    let cache = PlayerCache::new(|| {
        PlayerSnapshot::new(PlayerAttributes {
            level: 50,
            ..Default::default()
        })
    });
    let player = cache.current();
    let item = six_link().with_player(Arc::clone(&player));
    assert!(check("PlayerInfo.Level == 50", &item));
    assert!(Arc::ptr_eq(&player, &cache.current()));
}
