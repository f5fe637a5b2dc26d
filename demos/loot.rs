//! Loot example: Stat-aware rules with a player context
//!
//! This example demonstrates:
//! - Items deserialized from JSON
//! - Mod and stat helpers (`ItemStats`, `ModStats`, `HasAnyModSet`)
//! - Socket patterns
//! - Player context through a refreshing `PlayerCache`
//! - Pricing through a `PriceSource`

use itemfilter::*;
use std::sync::Arc;

struct Pricer;

impl PriceSource for Pricer {
    fn estimate(&self, item: &ItemSnapshot) -> Option<f64> {
        match item.base_name.as_str() {
            "Divine Orb" => Some(180.0),
            "Chaos Orb" => Some(1.0),
            _ => None,
        }
    }
}

const SCRIPT: &str = "\
// Life and resist rares with room to craft
Rarity == ItemRarity.Rare
    && ItemStats[\"base_maximum_life\"] >= 70
    && ModsInfo.HasOpenSuffix

// Six sockets, one group covering rgb
HasSockets(\"??????\") && HasUnorderedSocketGroup(\"rgb\")

// Gems nobody in the party owns yet
IsUnownedGem(g => g.BaseName == BaseName)

// Valuable currency
ClassName == \"StackableCurrency\" && EstimatedValue >= 10";

const ITEMS: &[&str] = &[
    r#"{
        "base_name": "Two-Stone Ring",
        "class_name": "Ring",
        "rarity": "Rare",
        "is_identified": true,
        "item_level": 84,
        "mods": {
            "explicit": [
                { "name": "IncreasedLife", "raw_name": "IncreasedLife7", "affix": "Prefix",
                  "stats": [["base_maximum_life", 74]] }
            ]
        }
    }"#,
    r#"{
        "base_name": "Vaal Regalia",
        "class_name": "Body Armour",
        "sockets": { "largest_link_size": 3, "socket_groups": ["rgb", "wrr"] }
    }"#,
    r#"{
        "base_name": "Arc",
        "class_name": "Active Skill Gem",
        "gem": { "level": 1, "max_level": 20 }
    }"#,
    r#"{
        "base_name": "Fireball",
        "class_name": "Active Skill Gem",
        "gem": { "level": 1, "max_level": 20 }
    }"#,
    r#"{ "base_name": "Divine Orb", "class_name": "StackableCurrency" }"#,
    r#"{ "base_name": "Chaos Orb", "class_name": "StackableCurrency" }"#,
];

const PLAYER: &str = r#"{
    "level": 90,
    "equipped": [
        {
            "base_name": "Astral Plate",
            "class_name": "Body Armour",
            "id": 1,
            "sockets": { "socket_groups": ["bbb"], "socketed_gems": [
                { "base_name": "Arc", "gem": { "level": 20, "max_level": 20 } }
            ] }
        }
    ]
}"#;

fn main() -> Result<(), FilterError> {
    let config = FilterConfig::from_json(r#"{ "debug": false, "player_refresh_interval_ms": 500 }"#)?;
    let player = PlayerCache::from_config(
        || PlayerSnapshot::from_json(PLAYER).unwrap_or_else(|_| PlayerSnapshot::new(PlayerAttributes::default())),
        &config,
    );
    let pricer: Arc<dyn PriceSource> = Arc::new(Pricer);

    let rules: RuleSet = RuleSet::load_from_str(SCRIPT);
    for (line, error) in rules.compile_errors() {
        println!("line {} failed to compile: {}", line, error);
    }

    println!("Player level {}", player.current().level);
    println!("\n=== Loot ===");
    for json in ITEMS {
        let item = ItemSnapshot::from_json(json)?
            .with_player(player.current())
            .with_price_source(Arc::clone(&pricer));
        let verdict = rules.evaluate_configured(&item, &config);
        let line = verdict
            .deciding
            .as_ref()
            .map(|d| d.line.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} {:<5} rule {}",
            item.to_string(),
            if verdict.matched { "keep" } else { "skip" },
            line
        );
    }

    Ok(())
}
