use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use structopt::StructOpt;

use barback::drinks::{
    CreateDrink, Drink, DrinkFilter, FilterFields, GenerateDrinks, IngredientList, ListDrinks,
    MatchMode, NewDrink, Page, ShowDrink,
};
use barback::ingredients::{ImportIngredients, Ingredient, ListIngredients, ShowIngredient};
use barback::services::{Commandable, Queryable};
use infra::ids::Id;

#[derive(Debug, StructOpt)]
#[structopt(name = "bb", about = "Barback cocktail catalog CLI")]
struct Opt {
    /// Configuration file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
    #[structopt(subcommand)]
    command: Commands,
}

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "setup", about = "Create the catalog tables")]
    Setup,
    #[structopt(name = "drinks", about = "List drinks")]
    ListDrinks(ListOpts),
    #[structopt(name = "drink", about = "Show one drink")]
    ShowDrink { id: Id<Drink> },
    #[structopt(name = "create-drink", about = "Create a drink from JSON")]
    CreateDrink(Body),
    #[structopt(name = "generate", about = "Find drinks makeable from a JSON ingredient list")]
    Generate {
        /// Only drinks whose every ingredient is on hand
        #[structopt(long = "strict")]
        strict: bool,
        #[structopt(flatten)]
        body: Body,
    },
    #[structopt(name = "ingredients", about = "List ingredients")]
    ListIngredients,
    #[structopt(name = "ingredient", about = "Show one ingredient")]
    ShowIngredient { id: Id<Ingredient> },
    #[structopt(name = "import-ingredients", about = "Bulk import ingredients from JSON")]
    ImportIngredients(Body),
}

#[derive(Debug, StructOpt)]
struct ListOpts {
    #[structopt(long = "limit")]
    limit: Option<i64>,
    #[structopt(long = "skip")]
    skip: Option<i64>,
    #[structopt(long = "id")]
    id: Option<Id<Drink>>,
    /// One name, or several separated by commas
    #[structopt(long = "name")]
    name: Option<String>,
}

#[derive(Debug, StructOpt)]
struct Body {
    /// JSON request body; read from stdin when absent
    #[structopt(parse(from_os_str))]
    input: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    barback: barback::config::Config,
    #[serde(default)]
    env_logger: barback::config::EnvLogger,
}

impl Body {
    fn read<T: DeserializeOwned>(&self) -> Result<T> {
        let mut buf = String::new();
        match self.input.as_ref() {
            Some(path) => {
                File::open(path)
                    .with_context(|| format!("open {}", path.display()))?
                    .read_to_string(&mut buf)?;
            }
            None => {
                io::stdin().read_to_string(&mut buf).context("read stdin")?;
            }
        }
        let body = serde_json::from_str(&buf).context("decode request body")?;
        Ok(body)
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let mut config_buf = String::new();
    File::open(path)
        .with_context(|| format!("open {}", path.display()))?
        .read_to_string(&mut config_buf)?;
    let config: Config = toml::from_str(&config_buf).context("parse config")?;
    Ok(config)
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let config = load_config(&opt.config)?;
    config.env_logger.builder().init();
    debug!("Options: {:?}", opt);

    let barback = config.barback.with_env_overrides()?;
    let bb = barback::Barback::new(&barback)?;

    match opt.command {
        Commands::Setup => {
            bb.setup()?;
        }
        Commands::ListDrinks(list) => {
            let fields = FilterFields {
                id: list.id,
                name: list.name,
            };
            let filter = DrinkFilter::from_fields(&fields, Page::new(list.limit, list.skip));
            print(&bb.drinks().query(ListDrinks(filter))?)?;
        }
        Commands::ShowDrink { id } => {
            print(&bb.drinks().query(ShowDrink(id))?)?;
        }
        Commands::CreateDrink(body) => {
            let new: NewDrink = body.read()?;
            let created = bb.drinks().execute(CreateDrink(new))?;
            for name in created.unresolved.iter() {
                warn!("No such ingredient: {:?}", name);
            }
            print(&created)?;
        }
        Commands::Generate { strict, body } => {
            let list: IngredientList = body.read()?;
            let req = GenerateDrinks::from_list(&list, MatchMode::from_strict_flag(strict));
            print(&bb.drinks().query(req)?)?;
        }
        Commands::ListIngredients => {
            print(&bb.ingredients().query(ListIngredients)?)?;
        }
        Commands::ShowIngredient { id } => {
            print(&bb.ingredients().query(ShowIngredient(id))?)?;
        }
        Commands::ImportIngredients(body) => {
            let req: ImportIngredients = body.read()?;
            print(&bb.ingredients().execute(req)?)?;
        }
    }

    Ok(())
}
