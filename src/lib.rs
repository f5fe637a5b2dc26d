//! # itemfilter - Rule-Script Item Filter Engine
//!
//! Compiles human-written filter scripts into typed predicates and decides,
//! per item, whether the item is wanted:
//! - **Compiled once** rules are parsed and type-checked at load time
//! - **First match wins** rules are scanned in script order
//! - **Fault-isolated** a rule that fails on one item never stops the scan
//! - **Lazy** expensive item fields are computed on first use, once
//!
//! ## Core Concepts
//!
//! ### Rule Pipeline
//!
//! ```text
//! script text → [split_sections] → [compile] → Rule → RuleSet::evaluate(item) → bool
//! ```
//!
//! 1. **Sections** are blank-line separated; `//` starts a comment and a
//!    leading `^` negates the rule
//! 2. **Compilation** resolves every identifier against the item schema and
//!    rejects anything that is not a boolean expression
//! 3. **Evaluation** returns the first firing rule's outcome, inverted when
//!    that rule is negated; no firing rule means `false`
//!
//! ### Rule Language
//!
//! Rules are C#-flavoured expressions over the fields of [`ItemSnapshot`]:
//!
//! ```text
//! Rarity == ItemRarity.Rare && ItemLevel >= 84
//! ModsInfo.ExplicitMods.Count(Affix == "Prefix") < 3
//! HasSockets("rgb") && SocketInfo.LargestLinkSize >= 5
//! ItemStats["base_maximum_life"] + ModStats("IncreasedLife")["base_maximum_life"] > 100
//! ```
//!
//! ## Example
//!
//! ```rust
//! use itemfilter::*;
//!
//! let script = "\
//! // good rares
//! Rarity == \"Rare\" && ItemLevel >= 80
//!
//! ^Corrupted";
//!
//! let rules: RuleSet = RuleSet::load_from_str(script);
//!
//! let helmet = ItemSnapshot::new(ItemAttributes {
//!     base_name: "Hubris Circlet".into(),
//!     rarity: ItemRarity::Rare,
//!     item_level: 86,
//!     ..Default::default()
//! });
//! let junk = ItemSnapshot::new(ItemAttributes {
//!     base_name: "Iron Ring".into(),
//!     is_corrupted: true,
//!     ..Default::default()
//! });
//!
//! assert!(rules.evaluate(&helmet));
//! assert!(!rules.evaluate(&junk));
//! ```
//!
//! ## Modules
//!
//! - [`script`] - Script splitting into rule sections
//! - [`lexer`], [`parser`], [`ast`] - Rule language front end
//! - [`compiler`] - Name resolution, type checking, [`Predicate`]
//! - [`schema`] - Record and helper tables rules compile against
//! - [`item`] - Item snapshots and their derived fields
//! - [`stats`] - Modifiers and stat aggregation
//! - [`sockets`] - Socket pattern matching
//! - [`player`] - Player context and its refresh cache
//! - [`rule`], [`filter`], [`verdict`] - Rules, rule sets, evaluation traces
//! - [`config`] - Host configuration
//! - [`error`] - Error types

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
mod eval;
pub mod filter;
pub mod item;
mod item_fields;
pub mod lexer;
pub mod numeric;
pub mod parser;
pub mod player;
pub mod rule;
pub mod schema;
pub mod script;
pub mod sockets;
pub mod stat_key;
pub mod stats;
pub mod value;
pub mod verdict;

// Re-export main types for convenience
pub use compiler::{compile, Predicate};
pub use config::FilterConfig;
pub use error::{CompileError, EvalError, FilterError};
pub use filter::RuleSet;
pub use item::{ItemAttributes, ItemRarity, ItemSnapshot, PriceSource};
pub use player::{PlayerAttributes, PlayerCache, PlayerSnapshot, PlayerSource};
pub use rule::Rule;
pub use schema::{RecordType, Schema};
pub use stat_key::StatKey;
pub use stats::{ModifierEntry, StatTable};
pub use verdict::{DecidingRule, RuleFault, Verdict};
