use std::collections::BTreeSet;

use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::modifiers::ModifierTable;
use crate::parser::ParseRollError;
use crate::storage::LocalStore;
use crate::utils::format_modifier;

/// Most dice of one kind a roller holds, the largest count dice notation can spell.
pub(crate) const MAX_DICE: u32 = 9999;

/// The dice a roller offers.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(into = "u32", try_from = "u32")]
pub(crate) enum DieSides {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieSides {
    pub const ALL: [DieSides; 7] = [
        DieSides::D4,
        DieSides::D6,
        DieSides::D8,
        DieSides::D10,
        DieSides::D12,
        DieSides::D20,
        DieSides::D100,
    ];

    pub fn sides(self) -> u32 {
        match self {
            DieSides::D4 => 4,
            DieSides::D6 => 6,
            DieSides::D8 => 8,
            DieSides::D10 => 10,
            DieSides::D12 => 12,
            DieSides::D20 => 20,
            DieSides::D100 => 100,
        }
    }
}

impl From<DieSides> for u32 {
    fn from(die: DieSides) -> Self {
        die.sides()
    }
}

impl TryFrom<u32> for DieSides {
    type Error = ParseRollError;

    fn try_from(sides: u32) -> Result<Self, Self::Error> {
        DieSides::ALL
            .into_iter()
            .find(|die| die.sides() == sides)
            .ok_or(ParseRollError::UnsupportedSides(sides))
    }
}

impl std::fmt::Display for DieSides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DieEntry {
    pub sides: DieSides,
    pub count: u32,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct DieRolls {
    pub sides: DieSides,
    pub rolls: Vec<u32>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct AppliedModifier {
    pub name: String,
    pub value: i32,
}

/// Snapshot of a single roll.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct RollResult {
    pub dice: Vec<DieRolls>,
    pub modifiers: Vec<AppliedModifier>,
    pub bonus: i32,
    pub total: i64,
}

impl std::fmt::Display for RollResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for die in &self.dice {
            let rolls = die
                .rolls
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "[{}] {}{}", rolls, die.rolls.len(), die.sides)?;
        }
        for modifier in &self.modifiers {
            writeln!(f, "{}: {}", modifier.name, format_modifier(modifier.value))?;
        }
        if self.bonus != 0 {
            writeln!(f, "Bonus: {}", format_modifier(self.bonus))?;
        }
        write!(f, "Total: {}", self.total)
    }
}

/// Dice selection plus the modifiers a roll may add.
///
/// The modifier table is fed by a character sheet through a [`watch`] channel, or
/// loaded from the local store when no sheet is running.
#[derive(Debug, Default)]
pub(crate) struct DiceRoller {
    dice: Vec<DieEntry>,
    applied: BTreeSet<String>,
    bonus: i32,
    modifiers: ModifierTable,
    feed: Option<watch::Receiver<ModifierTable>>,
}

impl DiceRoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roller that follows the modifiers published on `feed`.
    pub fn attached(mut feed: watch::Receiver<ModifierTable>) -> Self {
        let modifiers = feed.borrow_and_update().clone();
        Self {
            modifiers,
            feed: Some(feed),
            ..Self::default()
        }
    }

    pub fn dice(&self) -> &[DieEntry] {
        &self.dice
    }

    pub fn bonus(&self) -> i32 {
        self.bonus
    }

    pub fn modifiers(&self) -> &ModifierTable {
        &self.modifiers
    }

    pub fn is_applied(&self, name: &str) -> bool {
        self.applied.contains(name)
    }

    pub fn add_die(&mut self, sides: DieSides) {
        self.add_dice(sides, 1);
    }

    /// Counts stop at [`MAX_DICE`].
    pub fn add_dice(&mut self, sides: DieSides, count: u32) {
        match self.dice.iter_mut().find(|entry| entry.sides == sides) {
            Some(entry) => entry.count = entry.count.saturating_add(count).min(MAX_DICE),
            None => self.dice.push(DieEntry {
                sides,
                count: count.min(MAX_DICE),
            }),
        }
    }

    pub fn remove_die(&mut self, sides: DieSides) {
        self.dice.retain(|entry| entry.sides != sides);
    }

    /// Zero is accepted and rolls nothing for that die. Counts above [`MAX_DICE`] are capped.
    pub fn set_die_count(&mut self, sides: DieSides, count: u32) {
        if let Some(entry) = self.dice.iter_mut().find(|entry| entry.sides == sides) {
            entry.count = count.min(MAX_DICE);
        }
    }

    pub fn toggle_modifier(&mut self, name: &str) {
        if !self.applied.remove(name) {
            self.applied.insert(name.to_string());
        }
    }

    pub fn set_bonus(&mut self, bonus: i32) {
        self.bonus = bonus;
    }

    /// Picks up a newer table from the feed, if one was published since the last look.
    pub fn refresh_modifiers(&mut self) -> bool {
        let Some(feed) = self.feed.as_mut() else {
            return false;
        };
        match feed.has_changed() {
            Ok(true) => {
                self.modifiers = feed.borrow_and_update().clone();
                log::debug!("Modifiers updated: {:?}", self.modifiers);
                true
            }
            _ => false,
        }
    }

    /// Reads the cached table. Unreadable or malformed data keeps the current table.
    pub fn load_modifiers(&mut self, store: &LocalStore) {
        match ModifierTable::load_cached(store) {
            Ok(Some(modifiers)) => self.modifiers = modifiers,
            Ok(None) => log::debug!("No cached modifiers"),
            Err(e) => log::warn!("Ignoring cached modifiers: {}", e),
        }
    }

    pub fn roll(&self) -> RollResult {
        self.roll_with(&mut rand::thread_rng())
    }

    pub fn roll_with<R: Rng + ?Sized>(&self, rng: &mut R) -> RollResult {
        let dice: Vec<DieRolls> = self
            .dice
            .iter()
            .map(|entry| {
                let die = Uniform::from(1..=entry.sides.sides());
                DieRolls {
                    sides: entry.sides,
                    rolls: (0..entry.count).map(|_| die.sample(rng)).collect(),
                }
            })
            .collect();

        // Toggled names the table does not know have no value to add.
        let modifiers: Vec<AppliedModifier> = self
            .applied
            .iter()
            .filter_map(|name| {
                self.modifiers.get(name).map(|value| AppliedModifier {
                    name: name.clone(),
                    value,
                })
            })
            .collect();

        let mut total: i64 = dice
            .iter()
            .flat_map(|die| die.rolls.iter())
            .map(|roll| *roll as i64)
            .sum();
        total += modifiers.iter().map(|m| m.value as i64).sum::<i64>();
        total += self.bonus as i64;

        RollResult {
            dice,
            modifiers,
            bonus: self.bonus,
            total,
        }
    }
}
