use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "objdb",
    about = "objdb: inspect object stores and B-tree indexes",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the committed root record of a tree file
    TreeInfo(TreeInfoArgs),
    /// List the live identifiers of a store
    Ids(IdsArgs),
    /// List the types recorded in a store's catalog
    Types(TypesArgs),
    /// List the objects of a store with their class and size
    Objects(ObjectsArgs),
}

#[derive(Args)]
pub struct TreeInfoArgs {
    /// Tree channel file
    pub path: PathBuf,
}

#[derive(Args)]
pub struct IdsArgs {
    /// Store directory
    pub dir: PathBuf,
    #[arg(long, default_value = "all")]
    pub kind: IdKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum IdKind {
    Object,
    Class,
    All,
}

#[derive(Args)]
pub struct TypesArgs {
    /// Store directory
    pub dir: PathBuf,
    /// Include built-in types
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct ObjectsArgs {
    /// Store directory
    pub dir: PathBuf,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}
