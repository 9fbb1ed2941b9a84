use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::api::DEFAULT_API_URL;

/// Campaign companion: spells, items, a character sheet and a dice roller.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the campaign API
    #[arg(long, env = "SRPG_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// File holding the login token and cached modifiers
    #[arg(long, env = "SRPG_STORE", default_value = "srpg_store.json", global = true)]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Actions
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and remember the session token
    Login(LoginArgs),

    /// Forget the session token
    Logout,

    /// Roll dice, adding cached character modifiers on request
    Roll(RollArgs),

    /// Browse and edit the spell catalogue
    #[command(subcommand)]
    Magic(MagicCommand),

    /// Draft items
    #[command(subcommand)]
    Item(ItemCommand),

    /// Open the character sheet. Reads commands from stdin; edits are saved automatically.
    Sheet,
}

impl Command {
    /// Everything but signing in or out needs a stored token.
    pub fn requires_login(&self) -> bool {
        !matches!(self, Command::Login(_) | Command::Logout)
    }
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long, env = "SRPG_USERNAME")]
    pub username: String,

    /// Password. **Highly recommended that this is not set via command line, because it will show up in running processes.**
    #[arg(long, env = "SRPG_PASSWORD", conflicts_with("password_file"))]
    pub password: Option<String>,

    /// Path to file containing the password
    #[arg(long, env = "SRPG_PASSWORD_FILE", required_unless_present("password"))]
    pub password_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RollArgs {
    /// Dice to roll, e.g. d20 2d6
    #[arg(required = true)]
    pub dice: Vec<String>,

    /// Manual bonus (or penalty) added to the total
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub bonus: i32,

    /// Cached modifier to add, e.g. FOR or PROF. Repeatable.
    #[arg(long = "apply")]
    pub apply: Vec<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum MagicCommand {
    /// Add a spell to the catalogue
    Add(MagicArgs),

    /// Replace a catalogue spell
    Update {
        id: String,
        #[command(flatten)]
        magic: MagicArgs,
    },

    /// Show one spell
    Get { id: String },

    /// List spells, optionally filtered
    List(FilterArgs),
}

#[derive(Args, Debug)]
pub struct MagicArgs {
    #[arg(long)]
    pub name: String,

    /// Truque or 1 to 9
    #[arg(long, default_value = "Truque")]
    pub level: String,

    #[arg(long, required_unless_present("touch"))]
    pub range: Option<String>,

    /// Touch range
    #[arg(long, conflicts_with("range"))]
    pub touch: bool,

    #[arg(long)]
    pub description: String,

    /// Damage dice with type, e.g. 8d6:fogo. Repeatable.
    #[arg(long)]
    pub damage: Vec<String>,

    /// Add the spellcasting ability modifier to the damage
    #[arg(long)]
    pub add_spell_mod: bool,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long, default_value = "")]
    pub name: String,

    #[arg(long, default_value = "")]
    pub level: String,

    /// Damage type
    #[arg(long = "type", default_value = "")]
    pub kind: String,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    /// Assemble an item and print it
    Add(ItemArgs),
}

#[derive(Args, Debug)]
pub struct ItemArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long = "type")]
    pub kind: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value_t = 0.0)]
    pub weight: f64,

    #[arg(long, default_value = "")]
    pub rarity: String,

    #[arg(long, default_value_t = 0)]
    pub pp: u32,
    #[arg(long, default_value_t = 0)]
    pub gp: u32,
    #[arg(long, default_value_t = 0)]
    pub sp: u32,
    #[arg(long, default_value_t = 0)]
    pub cp: u32,

    /// Damage dice with type, e.g. 1d8:corte. Repeatable.
    #[arg(long)]
    pub damage: Vec<String>,
}
