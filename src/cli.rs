use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::api::Boost;
use crate::models::{CellOrder, PaintingConfig, TemplateAssignmentMode};

#[derive(Parser, Debug)]
#[command(
    name = "pixel-painter",
    version,
    about = "Paints canvas templates across many game accounts",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Directory holding config.json, accounts.json, templates.json and colors.json
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a painting pass (or keep running passes with --continuous)
    Paint(PaintArgs),
    /// Claim mining rewards for every account
    Claim,
    /// Buy one level of an upgrade for every account
    Boost {
        #[arg(value_enum)]
        kind: BoostKind,
    },
    /// Claim task and league bonuses for every account
    Tasks {
        /// Task keys; defaults to the league bonuses
        keys: Vec<String>,
    },
    /// Log profile and charges of every account
    Status,
}

#[derive(Args, Debug, Default)]
pub struct PaintArgs {
    /// Repeat passes until interrupted
    #[arg(long)]
    pub continuous: bool,
    /// Paint this template with every account
    #[arg(long, value_name = "ID", conflicts_with = "random_templates")]
    pub template: Option<u32>,
    /// Give each account a random template
    #[arg(long)]
    pub random_templates: bool,
    /// Read each cell before painting and skip it when it already matches
    #[arg(long)]
    pub double_verify: bool,
    /// Process one account at a time
    #[arg(long)]
    pub sequential: bool,
    /// Paint cells in row order instead of shuffled
    #[arg(long)]
    pub ordered: bool,
}

impl PaintArgs {
    /// Flags only ever switch settings on; anything not given keeps the
    /// value from config.json.
    pub fn apply(&self, settings: &mut PaintingConfig) {
        if self.continuous {
            settings.continuous = true;
        }
        if let Some(template_id) = self.template {
            settings.template_assignment = TemplateAssignmentMode::Fixed { template_id };
        }
        if self.random_templates {
            settings.template_assignment = TemplateAssignmentMode::Random;
        }
        if self.double_verify {
            settings.double_verify = true;
        }
        if self.sequential {
            settings.concurrent = false;
        }
        if self.ordered {
            settings.cell_order = CellOrder::Sequential;
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoostKind {
    PaintReward,
    RechargeSpeed,
    EnergyLimit,
}

impl From<BoostKind> for Boost {
    fn from(kind: BoostKind) -> Self {
        match kind {
            BoostKind::PaintReward => Boost::PaintReward,
            BoostKind::RechargeSpeed => Boost::RechargeSpeed,
            BoostKind::EnergyLimit => Boost::EnergyLimit,
        }
    }
}
