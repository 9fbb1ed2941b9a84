//! Interactive sheet session: the character sheet, spell search and dice roller share
//! one modifier hub.

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::api::{CampaignApi, MagicFilter};
use crate::dice::{DiceRoller, DieSides, MAX_DICE};
use crate::dnd::{Ability, Character, Magic, RecordError};
use crate::modifiers::{ability_modifier, ModifierHub};
use crate::parser::{parse_dice, ParseRollError};
use crate::search::SpellSearch;
use crate::sheet::{CharacterSheet, SheetError};
use crate::utils::format_modifier;

const HELP: &str = "\
Sheet:
  show                      print the character sheet
  status                    print the saving status
  name|class|race <text>    edit character info
  level|prof <number>       edit level or proficiency
  stat <ability> <score>    edit an ability score (str, dex, con, int, wis, cha)
Spells:
  spells                    list known spells
  search [name=..] [level=..] [type=..]
                            search the catalogue (no filters lists everything)
  results                   print the latest search results
  pick <n>                  add search result n to the spell list
  create <json>             create a spell in the catalogue and add it
  forget <n>                remove spell n from the spell list
  cast <n>                  add the damage dice of spell n to the dice selection
Dice:
  add <dice>                add dice, e.g. d20 or 2d6
  drop <die>                remove a die type
  count <die> <n>           set how many of a die to roll
  toggle <modifier>         apply or stop applying a modifier (FOR, DES, ..., PROF)
  bonus <n>                 set the manual bonus
  dice                      print the current selection
  roll                      roll the selection
Other:
  help                      print this help
  quit                      save and leave";

#[derive(Error, Debug)]
pub(crate) enum CommandError {
    #[error("Unknown command {0}, try help")]
    Unknown(String),
    #[error("Missing {0}")]
    MissingArgument(&'static str),
    #[error("Not a number: {0}")]
    InvalidNumber(String),
    #[error("Too many dice: {0}, at most {max} of one kind", max = MAX_DICE)]
    TooManyDice(u32),
    #[error("Unknown search filter {0}, expected name=, level= or type=")]
    InvalidFilter(String),
    #[error(transparent)]
    Dice(#[from] ParseRollError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("Invalid spell: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, PartialEq)]
pub(crate) enum SessionCommand {
    Help,
    Show,
    Status,
    Name(String),
    Class(String),
    Race(String),
    Level(u32),
    Proficiency(i32),
    Stat(Ability, i32),
    Spells,
    Search(MagicFilter),
    Results,
    Pick(usize),
    Create(Magic),
    Forget(usize),
    Cast(usize),
    Add(u32, DieSides),
    Drop(DieSides),
    Count(DieSides, u32),
    Toggle(String),
    Bonus(i32),
    Dice,
    Roll,
    Quit,
}

fn number<T: FromStr>(input: &str) -> Result<T, CommandError> {
    input
        .trim()
        .parse()
        .map_err(|_| CommandError::InvalidNumber(input.trim().to_string()))
}

fn text(input: &str, what: &'static str) -> Result<String, CommandError> {
    let input = input.trim();
    if input.is_empty() {
        Err(CommandError::MissingArgument(what))
    } else {
        Ok(input.to_string())
    }
}

/// Lists are shown from 1, stored from 0.
fn position(input: &str) -> Result<usize, CommandError> {
    match number::<usize>(input)? {
        0 => Err(CommandError::InvalidNumber(input.trim().to_string())),
        n => Ok(n - 1),
    }
}

fn two<'a>(input: &'a str, what: &'static str) -> Result<(&'a str, &'a str), CommandError> {
    input
        .trim()
        .split_once(char::is_whitespace)
        .ok_or(CommandError::MissingArgument(what))
}

fn parse_filter(input: &str) -> Result<MagicFilter, CommandError> {
    fn field<'a>(filter: &'a mut MagicFilter, key: &str) -> Option<&'a mut String> {
        match key {
            "name" => Some(&mut filter.name),
            "level" => Some(&mut filter.level),
            "type" => Some(&mut filter.kind),
            _ => None,
        }
    }

    let mut filter = MagicFilter::default();
    let mut current: Option<&str> = None;
    for word in input.split_whitespace() {
        let invalid = || CommandError::InvalidFilter(word.to_string());
        match word.split_once('=') {
            Some((key, value)) => {
                *field(&mut filter, key).ok_or_else(invalid)? = value.to_string();
                current = Some(key);
            }
            // Values may contain spaces: `name=bola de fogo`.
            None => {
                let value = match current {
                    Some(key) => field(&mut filter, key),
                    None => None,
                }
                .ok_or_else(invalid)?;
                value.push(' ');
                value.push_str(word);
            }
        }
    }
    Ok(filter)
}

impl FromStr for SessionCommand {
    type Err = CommandError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (verb, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
        let command = match verb.to_lowercase().as_str() {
            "help" | "?" => SessionCommand::Help,
            "show" => SessionCommand::Show,
            "status" => SessionCommand::Status,
            "name" => SessionCommand::Name(text(rest, "name")?),
            "class" => SessionCommand::Class(text(rest, "class")?),
            "race" => SessionCommand::Race(text(rest, "race")?),
            "level" => SessionCommand::Level(number(rest)?),
            "prof" => SessionCommand::Proficiency(number(rest)?),
            "stat" => {
                let (ability, score) = two(rest, "ability and score")?;
                SessionCommand::Stat(ability.parse()?, number(score)?)
            }
            "spells" => SessionCommand::Spells,
            "search" => SessionCommand::Search(parse_filter(rest)?),
            "results" => SessionCommand::Results,
            "pick" => SessionCommand::Pick(position(rest)?),
            "create" => SessionCommand::Create(serde_json::from_str(&text(rest, "spell JSON")?)?),
            "forget" => SessionCommand::Forget(position(rest)?),
            "cast" => SessionCommand::Cast(position(rest)?),
            "add" => {
                let (count, sides) = parse_dice(&text(rest, "dice")?)?;
                SessionCommand::Add(count, sides)
            }
            "drop" => SessionCommand::Drop(text(rest, "die")?.parse()?),
            "count" => {
                let (die, count) = two(rest, "die and count")?;
                let count = number(count)?;
                if count > MAX_DICE {
                    return Err(CommandError::TooManyDice(count));
                }
                SessionCommand::Count(die.parse()?, count)
            }
            "toggle" => SessionCommand::Toggle(text(rest, "modifier")?.to_uppercase()),
            "bonus" => SessionCommand::Bonus(number(rest)?),
            "dice" => SessionCommand::Dice,
            "roll" => SessionCommand::Roll,
            "quit" | "exit" => SessionCommand::Quit,
            _ => return Err(CommandError::Unknown(verb.to_string())),
        };
        Ok(command)
    }
}

pub(crate) fn render_sheet(character: &Character) -> String {
    let mut lines = vec![
        format!(
            "{} | {} {} | {} | Prof. {}",
            character.name,
            character.class,
            character.level,
            character.race,
            format_modifier(character.proficiency)
        ),
        String::new(),
    ];
    for ability in Ability::ALL {
        let score = character.stats.get(ability);
        lines.push(format!(
            "{:<4}{:>3} ({})",
            ability.key().to_uppercase(),
            score,
            format_modifier(ability_modifier(score))
        ));
    }
    lines.push(String::new());
    lines.push(render_spells(&character.spells));
    lines.join("\n")
}

pub(crate) fn render_spells(spells: &[Magic]) -> String {
    if spells.is_empty() {
        return "No spells".to_string();
    }
    spells
        .iter()
        .enumerate()
        .map(|(i, spell)| {
            format!(
                "{:>3}. {} [{}] {}",
                i + 1,
                spell.name,
                spell.level,
                spell.damage_summary()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) struct Session {
    api: Arc<dyn CampaignApi>,
    sheet: CharacterSheet,
    search: SpellSearch,
    roller: DiceRoller,
}

impl Session {
    pub fn new(api: Arc<dyn CampaignApi>, hub: Arc<ModifierHub>) -> Self {
        let roller = DiceRoller::attached(hub.subscribe());
        Self {
            sheet: CharacterSheet::new(Arc::clone(&api), hub),
            search: SpellSearch::new(Arc::clone(&api)),
            roller,
            api,
        }
    }

    pub async fn load(&mut self) -> Result<(), SheetError> {
        self.sheet.load().await?;
        self.roller.refresh_modifiers();
        Ok(())
    }

    /// Runs one command and returns what to print. `None` ends the session.
    pub async fn execute(&mut self, command: SessionCommand) -> anyhow::Result<Option<String>> {
        self.roller.refresh_modifiers();
        let output = match command {
            SessionCommand::Help => HELP.to_string(),
            SessionCommand::Show => match self.sheet.character() {
                Some(character) => render_sheet(character),
                None => "Loading...".to_string(),
            },
            SessionCommand::Status => format!("Status: {}", self.sheet.status()),
            SessionCommand::Name(name) => {
                self.sheet.set_name(name)?;
                String::new()
            }
            SessionCommand::Class(class) => {
                self.sheet.set_class(class)?;
                String::new()
            }
            SessionCommand::Race(race) => {
                self.sheet.set_race(race)?;
                String::new()
            }
            SessionCommand::Level(level) => {
                self.sheet.set_level(level)?;
                String::new()
            }
            SessionCommand::Proficiency(proficiency) => {
                self.sheet.set_proficiency(proficiency)?;
                String::new()
            }
            SessionCommand::Stat(ability, score) => {
                self.sheet.set_stat(ability, score)?;
                let score = self
                    .sheet
                    .character()
                    .map(|c| c.stats.get(ability))
                    .unwrap_or(score);
                format!(
                    "{} {} ({})",
                    ability.key().to_uppercase(),
                    score,
                    format_modifier(ability_modifier(score))
                )
            }
            SessionCommand::Spells => match self.sheet.character() {
                Some(character) => render_spells(&character.spells),
                None => "Loading...".to_string(),
            },
            SessionCommand::Search(filter) => {
                self.search.set_filter(filter);
                "Searching...".to_string()
            }
            SessionCommand::Results => {
                let state = self.search.state();
                if state.loading {
                    "Loading...".to_string()
                } else if let Some(error) = state.error {
                    format!("Search failed: {}", error)
                } else {
                    render_spells(&state.spells)
                }
            }
            SessionCommand::Pick(index) => {
                let spell = self
                    .search
                    .state()
                    .spells
                    .get(index)
                    .cloned()
                    .ok_or(SheetError::NoSuchSpell(index + 1))?;
                let name = spell.name.clone();
                self.sheet.add_spell(spell)?;
                format!("Added {}", name)
            }
            SessionCommand::Create(spell) => {
                let saved = self.api.add_magic(&spell).await.map_err(|e| {
                    log::error!("Could not create spell: {}", e);
                    e
                })?;
                let name = saved.name.clone();
                self.sheet.add_spell(saved)?;
                format!("Created and added {}", name)
            }
            SessionCommand::Forget(index) => {
                let removed = self.sheet.remove_spell(index).map_err(|e| match e {
                    SheetError::NoSuchSpell(i) => SheetError::NoSuchSpell(i + 1),
                    e => e,
                })?;
                format!("Removed {}", removed.name)
            }
            SessionCommand::Cast(index) => {
                let spell = self
                    .sheet
                    .character()
                    .and_then(|character| character.spells.get(index))
                    .ok_or(SheetError::NoSuchSpell(index + 1))?;
                let mut dice = Vec::with_capacity(spell.damage.len());
                for damage in &spell.damage {
                    dice.push((damage.die_sides()?, damage.quantity));
                }
                let note = spell.add_spell_mod.then(|| {
                    format!("{} adds the spellcasting modifier, toggle it to apply\n", spell.name)
                });
                for (sides, count) in dice {
                    self.roller.add_dice(sides, count);
                }
                format!("{}{}", note.unwrap_or_default(), self.render_dice())
            }
            SessionCommand::Add(count, sides) => {
                self.roller.add_dice(sides, count);
                self.render_dice()
            }
            SessionCommand::Drop(sides) => {
                self.roller.remove_die(sides);
                self.render_dice()
            }
            SessionCommand::Count(sides, count) => {
                self.roller.set_die_count(sides, count);
                self.render_dice()
            }
            SessionCommand::Toggle(name) => {
                self.roller.toggle_modifier(&name);
                self.render_dice()
            }
            SessionCommand::Bonus(bonus) => {
                self.roller.set_bonus(bonus);
                self.render_dice()
            }
            SessionCommand::Dice => self.render_dice(),
            SessionCommand::Roll => {
                let result = self.roller.roll();
                log::debug!("Dice roll: {:?}", result);
                result.to_string()
            }
            SessionCommand::Quit => return Ok(None),
        };
        Ok(Some(output))
    }

    fn render_dice(&self) -> String {
        let dice = if self.roller.dice().is_empty() {
            "none".to_string()
        } else {
            self.roller
                .dice()
                .iter()
                .map(|entry| format!("{}{}", entry.count, entry.sides))
                .collect::<Vec<_>>()
                .join(" + ")
        };
        let modifiers = self
            .roller
            .modifiers()
            .iter()
            .map(|(name, value)| {
                let mark = if self.roller.is_applied(name) { "x" } else { " " };
                format!("[{}] {} {}", mark, name, format_modifier(value))
            })
            .collect::<Vec<_>>()
            .join("  ");
        format!(
            "Dice: {}\nModifiers: {}\nBonus: {}",
            dice,
            modifiers,
            format_modifier(self.roller.bonus())
        )
    }

    /// Reads commands from stdin until `quit` or end of input, then saves.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("{}", HELP);
        if let (Some(id), Some(character)) = (self.sheet.id(), self.sheet.character()) {
            log::info!("Editing character sheet {}", id);
            println!("\n{}", render_sheet(character));
        }
        self.drive(BufReader::new(tokio::io::stdin())).await;
        Ok(())
    }

    /// Runs commands from `input`, then sends any pending save whatever ended the input.
    async fn drive<R>(&mut self, input: R)
    where
        R: AsyncBufRead + Unpin,
    {
        if let Err(e) = self.read_commands(input).await {
            log::error!("Stopped reading commands: {}", e);
        }
        if self.sheet.has_pending_save() {
            println!("Saving...");
        }
        self.sheet.flush().await;
        println!("Status: {}", self.sheet.status());
    }

    async fn read_commands<R>(&mut self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let command = match SessionCommand::from_str(&line) {
                Ok(command) => command,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };
            match self.execute(command).await {
                Ok(Some(output)) if output.is_empty() => {}
                Ok(Some(output)) => println!("{}", output),
                Ok(None) => break,
                Err(e) => println!("{:#}", e),
            }
        }
        Ok(())
    }
}
