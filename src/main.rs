mod api;
mod cli;
mod debounce;
mod dice;
mod dnd;
mod modifiers;
mod parser;
mod search;
mod session;
mod sheet;
mod storage;
#[cfg(test)]
mod testing;
mod utils;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;

use api::{ApiError, CampaignApi, HttpApi, LoginRequest, MagicFilter};
use cli::{Cli, Command, FilterArgs, ItemArgs, ItemCommand, LoginArgs, MagicArgs, MagicCommand, RollArgs};
use dice::DiceRoller;
use dnd::{Coins, Item, Magic, TOUCH_RANGE};
use modifiers::{ModifierHub, ModifierTable};
use parser::{parse_damage, parse_dice};
use search::SpellSearch;
use session::Session;
use storage::{LocalStore, TOKEN_KEY, USER_KEY};

/// Stored when the backend accepts a login without handing out a token.
const LOGGED_IN_MARKER: &str = "logged_in";

fn get_password(args: &LoginArgs) -> anyhow::Result<String> {
    if let Some(password) = args.password.as_ref() {
        return Ok(password.clone());
    }
    if let Some(file) = args.password_file.as_ref() {
        return Ok(std::fs::read_to_string(file)
            .with_context(|| format!("error reading password file {:?}", file))?
            .trim()
            .to_string());
    }
    Err(anyhow!("No password provided"))
}

async fn login(api: &dyn CampaignApi, store: &LocalStore, args: &LoginArgs) -> anyhow::Result<()> {
    let request = LoginRequest {
        username: args.username.clone(),
        password: get_password(args)?,
    };
    log::info!("Logging in as {}...", request.username);
    let response = match api.login(&request).await {
        Ok(response) => response,
        Err(ApiError::Status { status, message }) => {
            log::error!("Login failed with {}", status);
            return Err(anyhow!(message.unwrap_or_else(|| "Erro ao logar".to_string())));
        }
        Err(e) => {
            log::error!("Network error: {}", e);
            return Err(anyhow!("Network or server error. Try again later."));
        }
    };

    let token = response
        .token
        .filter(|token| !token.is_empty())
        .unwrap_or_else(|| LOGGED_IN_MARKER.to_string());
    store.set(TOKEN_KEY, token)?;
    if let Some(user) = response.user.as_ref() {
        store.set(USER_KEY, serde_json::to_string(user)?)?;
    }
    log::debug!("Login response user: {:?}", response.user);
    println!("Logged in as {}", args.username);
    Ok(())
}

fn logout(store: &LocalStore) -> anyhow::Result<()> {
    store.remove(TOKEN_KEY)?;
    store.remove(USER_KEY)?;
    println!("Logged out");
    Ok(())
}

fn roll(store: &LocalStore, args: &RollArgs) -> anyhow::Result<()> {
    let mut roller = DiceRoller::new();
    roller.load_modifiers(store);
    for dice in &args.dice {
        let (count, sides) = parse_dice(dice)?;
        roller.add_dice(sides, count);
    }
    for name in &args.apply {
        let name = name.to_uppercase();
        if roller.modifiers().get(&name).is_none() {
            log::warn!("No cached modifier {}, open the sheet to refresh them", name);
        }
        roller.toggle_modifier(&name);
    }
    roller.set_bonus(args.bonus);

    let result = roller.roll();
    log::debug!("Dice roll: {:?}", result);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result);
    }
    Ok(())
}

fn build_magic(args: &MagicArgs) -> anyhow::Result<Magic> {
    let range = if args.touch {
        TOUCH_RANGE.to_string()
    } else {
        args.range.clone().unwrap_or_default()
    };
    let damage = args
        .damage
        .iter()
        .map(|damage| parse_damage(damage))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Magic {
        id: None,
        name: args.name.clone(),
        description: args.description.clone(),
        level: args.level.parse()?,
        range,
        damage,
        add_spell_mod: args.add_spell_mod,
    })
}

fn print_magic_list(spells: &[Magic]) {
    if spells.is_empty() {
        println!("No spells found");
    }
    for spell in spells {
        println!(
            "{}  {} [{}] {}",
            spell.id.as_deref().unwrap_or("-"),
            spell.name,
            spell.level,
            spell.damage_summary()
        );
    }
}

async fn magic(api: Arc<dyn CampaignApi>, command: &MagicCommand) -> anyhow::Result<()> {
    match command {
        MagicCommand::Add(args) => {
            let magic = build_magic(args)?;
            let saved = api
                .add_magic(&magic)
                .await
                .context("error adding magic")?;
            log::info!("Magic created: {:?}", saved);
            println!("Added {} ({})", saved.name, saved.id.as_deref().unwrap_or("-"));
        }
        MagicCommand::Update { id, magic } => {
            let magic = build_magic(magic)?;
            api.update_magic(id, &magic)
                .await
                .with_context(|| format!("error updating magic {}", id))?;
            println!("Updated {}", id);
        }
        MagicCommand::Get { id } => {
            let magic = api
                .get_magic(id)
                .await
                .with_context(|| format!("error fetching magic {}", id))?;
            println!("{}", serde_json::to_string_pretty(&magic)?);
        }
        MagicCommand::List(FilterArgs { name, level, kind }) => {
            let filter = MagicFilter {
                name: name.clone(),
                level: level.clone(),
                kind: kind.clone(),
            };
            let mut search = SpellSearch::new(api);
            search
                .issue(filter)
                .await
                .context("spell search did not finish")?;
            let state = search.state();
            if let Some(error) = state.error {
                return Err(anyhow!("error fetching magic: {}", error));
            }
            print_magic_list(&state.spells);
        }
    }
    Ok(())
}

fn build_item(args: &ItemArgs) -> anyhow::Result<Item> {
    let damage = args
        .damage
        .iter()
        .map(|damage| parse_damage(damage))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Item {
        name: args.name.clone(),
        kind: args.kind.clone(),
        description: args.description.clone(),
        weight: args.weight,
        rarity: args.rarity.clone(),
        value: Coins {
            pp: args.pp,
            gp: args.gp,
            sp: args.sp,
            cp: args.cp,
        },
        damage,
    })
}

async fn sheet(api: Arc<dyn CampaignApi>, store: &LocalStore) -> anyhow::Result<()> {
    let hub = Arc::new(ModifierHub::with_store(
        ModifierTable::default(),
        store.clone(),
    ));
    let mut session = Session::new(api, hub);
    log::info!("Loading character sheet...");
    session
        .load()
        .await
        .context("error loading the character sheet")?;
    session.run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut logger = pretty_env_logger::formatted_timed_builder();
    logger.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();
    let args = Cli::parse();
    let store = LocalStore::new(&args.store);
    let api: Arc<dyn CampaignApi> = Arc::new(HttpApi::new(args.api_url.as_str()));
    log::debug!("Using API at {} and store {:?}", args.api_url, store.path());

    if args.command.requires_login() {
        store.require_token()?;
    }

    match &args.command {
        Command::Login(login_args) => login(api.as_ref(), &store, login_args).await?,
        Command::Logout => logout(&store)?,
        Command::Roll(roll_args) => roll(&store, roll_args)?,
        Command::Magic(command) => magic(api, command).await?,
        Command::Item(ItemCommand::Add(item_args)) => {
            let item = build_item(item_args)?;
            log::info!("Item created: {:?}", item);
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Command::Sheet => sheet(api, &store).await?,
    }
    Ok(())
}
