use clap::{Parser, Subcommand};

use crate::generation::ConstraintSet;
use crate::search::StrategyKind;

#[derive(Parser, Debug)]
#[command(author, version, about = "Find or generate recipes from the ingredients you have", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Normalize free-text ingredient lines
    Parse {
        #[arg(required = true)]
        ingredients: Vec<String>,
    },
    /// Look up dataset recipes matching the ingredients
    Search {
        #[arg(required = true)]
        ingredients: Vec<String>,
        /// Overrides RETRIEVAL_STRATEGY
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyKind>,
        /// Overrides TOP_N
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
    },
    /// Generate a new recipe with the configured model
    Generate {
        #[arg(required = true)]
        ingredients: Vec<String>,
        #[command(flatten)]
        constraints: ConstraintArgs,
        /// Print the prompt instead of calling the model for the recipe
        #[arg(long)]
        dry_run: bool,
    },
    /// Show allergen-safe replacements
    Substitute {
        #[arg(required = true)]
        ingredients: Vec<String>,
        /// Allergen categories to avoid; without it, lists every known substitute
        #[arg(short = 'x', long = "exclude")]
        exclude: Vec<String>,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ConstraintArgs {
    /// e.g. vegetarian, vegan
    #[arg(long = "diet")]
    pub dietary_preference: Option<String>,
    #[arg(long = "max-prep")]
    pub max_prep_minutes: Option<u32>,
    #[arg(long = "max-cook")]
    pub max_cook_minutes: Option<u32>,
    /// Allergen category to exclude; repeatable
    #[arg(short = 'x', long = "exclude")]
    pub excluded_allergens: Vec<String>,
    #[arg(long = "cuisine")]
    pub preferred_cuisine: Option<String>,
}

impl From<ConstraintArgs> for ConstraintSet {
    fn from(args: ConstraintArgs) -> Self {
        ConstraintSet {
            dietary_preference: args.dietary_preference,
            max_prep_minutes: args.max_prep_minutes,
            max_cook_minutes: args.max_cook_minutes,
            excluded_allergens: args.excluded_allergens,
            preferred_cuisine: args.preferred_cuisine,
        }
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
