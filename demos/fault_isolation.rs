//! Fault isolation example: Broken rules never stop a scan
//!
//! This example demonstrates:
//! - Rules that fail to compile are reported at load time and never fire
//! - Rules that fail on a particular item are logged and skipped
//! - The `Verdict` trace of which rule decided and which rules faulted
//!
//! Run with `RUST_LOG=itemfilter=debug` to see the evaluation log.

use itemfilter::*;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("itemfilter=info")))
        .init();

    let script = "\
// does not compile: unknown field
ItemLvl > 80

// faults when the item has fewer than two socket groups
SocketInfo.SocketGroups[1] == \"rgb\"

// faults when the item level is zero
100 / ItemLevel > 1

// the fallback
Rarity == ItemRarity.Rare";

    let rules: RuleSet = RuleSet::load_from_str(script);

    println!("Compile errors:");
    for (line, error) in rules.compile_errors() {
        println!("  line {}: {}", line, error);
    }

    let items = [
        ItemSnapshot::new(ItemAttributes {
            base_name: "Spine Bow".into(),
            class_name: "Bow".into(),
            rarity: ItemRarity::Rare,
            item_level: 0,
            ..Default::default()
        }),
        ItemSnapshot::new(ItemAttributes {
            base_name: "Titan Greaves".into(),
            class_name: "Boots".into(),
            rarity: ItemRarity::Rare,
            item_level: 60,
            sockets: item::SocketAttributes {
                largest_link_size: 3,
                socket_groups: vec!["r".into(), "rgb".into()],
                ..Default::default()
            },
            ..Default::default()
        }),
    ];

    let config = FilterConfig {
        debug: true,
        ..Default::default()
    };

    for item in &items {
        let verdict = rules.evaluate_configured(item, &config);
        println!("\n=== {} ===", item);
        println!("matched: {}", verdict.matched);
        if let Some(rule) = &verdict.deciding {
            println!("decided by line {}: {}", rule.line, rule.raw);
        }
        for fault in &verdict.faults {
            println!("fault at line {}: {}", fault.line, fault.error);
        }
        match serde_json::to_string_pretty(&verdict) {
            Ok(json) => println!("{}", json),
            Err(err) => println!("could not serialize verdict: {}", err),
        }
    }
}
