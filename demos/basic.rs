//! Basic example: Compiling a filter script and checking items
//!
//! This example demonstrates:
//! - Writing a script with comments, blank-line separators and a negated rule
//! - Loading it into a rule set
//! - Evaluating items and reading the deciding rule

use itemfilter::*;

fn main() {
    let script = "\
// Keep well-rolled rares
Rarity == ItemRarity.Rare && ItemLevel >= 84

// Throw away anything corrupted
^IsCorrupted

// Currency is always worth picking up
ClassName == \"StackableCurrency\"";

    println!("Loading script:");
    let rules: RuleSet = RuleSet::load_from_str(script);
    for rule in rules.rules() {
        println!("  {}", rule);
    }

    let items = vec![
        ItemSnapshot::new(ItemAttributes {
            base_name: "Hubris Circlet".into(),
            class_name: "Helmet".into(),
            rarity: ItemRarity::Rare,
            item_level: 86,
            ..Default::default()
        }),
        ItemSnapshot::new(ItemAttributes {
            base_name: "Iron Ring".into(),
            class_name: "Ring".into(),
            is_corrupted: true,
            ..Default::default()
        }),
        ItemSnapshot::new(ItemAttributes {
            base_name: "Chaos Orb".into(),
            class_name: "StackableCurrency".into(),
            ..Default::default()
        }),
        ItemSnapshot::new(ItemAttributes {
            base_name: "Leather Belt".into(),
            class_name: "Belt".into(),
            rarity: ItemRarity::Magic,
            ..Default::default()
        }),
    ];

    println!("\n=== Verdicts ===");
    for item in &items {
        let verdict = rules.evaluate_with(item, false);
        match &verdict.deciding {
            Some(rule) => println!(
                "{}: {} (line {}{})",
                item,
                if verdict.matched { "keep" } else { "drop" },
                rule.line,
                if rule.negated { ", negated" } else { "" }
            ),
            None => println!("{}: drop (no rule fired)", item),
        }
    }
}
