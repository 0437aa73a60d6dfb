use anyhow::{ensure, Context};
use clap::{Parser, Subcommand};
use gitlet_tags::objects::GitObject;
use gitlet_tags::{Fmt, Oid, Repository};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// init gitlet repository
    Init {
        /// path to create repository in
        #[arg(help = "Initialize a new, empty repository.", default_value = ".")]
        path: PathBuf,
    },
    /// Provide content of repository objects
    CatFile {
        /// type
        #[arg(
            value_enum,
            value_name = "type",
            help = "Specify the expected type.",
            default_value = "blob",
            required = true
        )]
        fmt: Fmt,
        /// file to cat
        #[arg(help = "The object to display.")]
        object: String,
    },

    /// Compute object ID and optionally creates a blob from a file
    HashObject {
        /// Actually write the object into the database
        #[arg(short)]
        write: bool,
        #[arg(
            value_enum,
            short = 't',
            value_name = "type",
            help = "Specify the expected type.",
            default_value = "blob"
        )]
        fmt: Fmt,
        /// Read object from <file>
        path: PathBuf,
    },

    /// Create, list or delete tags
    Tag {
        /// List tags, filtered by <name> as a pattern if given
        #[arg(short, long, conflicts_with_all = ["delete", "annotate"])]
        list: bool,
        /// Delete the tag <name>
        #[arg(short, long, conflicts_with = "annotate")]
        delete: bool,
        /// Make an annotated tag object
        #[arg(short, long)]
        annotate: bool,
        /// Tag message, implies -a
        #[arg(short, long)]
        message: Option<String>,
        /// Replace an existing tag
        #[arg(short, long)]
        force: bool,
        /// tag name, or pattern with -l
        name: Option<String>,
        /// object to tag: a full object id or an existing tag name
        object: Option<String>,
    },
}

/// resolve a full object id, or the name of an existing tag
fn resolve(repo: &Repository, name: &str) -> anyhow::Result<Oid> {
    if let Ok(oid) = name.parse::<Oid>() {
        return Ok(oid);
    }

    repo.tags()
        .lookup(name)?
        .context(format!("not a valid object name: {}", name))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gitlet_tags=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            let repo = Repository::init(path)?;
            println!("init at path: {}", repo.git_dir.display());
        }
        Commands::CatFile { fmt, object } => {
            let repo = Repository::find(".")?;

            let object = repo.lookup_object(&resolve(&repo, &object)?)?;

            ensure!(object.kind() == fmt, "object type mismatch");

            println!("{}", object);
        }
        Commands::HashObject { write, fmt, path } => {
            let repo = Repository::find(".")?;
            ensure!(path.exists(), "file does not exist: {}", path.display());

            let data = std::fs::read(&path)?;

            let sha = if write {
                repo.write_object(fmt, data)?
            } else {
                GitObject::new(fmt, data).id()
            };

            println!("{}", sha);
        }
        Commands::Tag {
            list,
            delete,
            annotate,
            message,
            force,
            name,
            object,
        } => {
            let repo = Repository::find(".")?;
            let tags = repo.tags();

            match name {
                None => {
                    for tag in tags.list()? {
                        println!("{}", tag);
                    }
                }
                Some(pattern) if list => {
                    for tag in tags.list_match(&pattern)? {
                        println!("{}", tag);
                    }
                }
                Some(name) if delete => {
                    let old = tags.lookup(&name)?;
                    tags.remove(&name)?;
                    if let Some(old) = old {
                        println!("Deleted tag '{}' (was {})", name, &old.to_string()[..7]);
                    }
                }
                Some(name) => {
                    let object = object.context("missing object to tag")?;
                    let target = repo.lookup_object(&resolve(&repo, &object)?)?;

                    let oid = if annotate || message.is_some() {
                        let tagger = repo.signature()?;
                        let message = message.unwrap_or_default();
                        tags.create(&name, &target, &tagger, &message, force)?
                    } else {
                        tags.create_lightweight(&name, &target, force)?
                    };

                    println!("{}", oid);
                }
            }
        }
    }
    Ok(())
}
