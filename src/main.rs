use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use dirc::areas::repository::Repository;
use dirc::artifacts::objects::object_type::ObjectType;
use dirc::commands::plumbing::cat_file::CatFileMode;
use dirc::commands::plumbing::update_index::{CacheInfo, UpdateIndexOptions};
use dirc::config::Config;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dirc",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "A git-compatible object store and staging index",
    long_about = "This is an implementation of git's object database and index, written in Rust. \
    It reads and writes the same on-disk formats as git, including the cache tree \
    that lets unchanged directories skip rehashing.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[arg(short = 'C', global = true, value_name = "PATH", help = "Run as if started in <PATH>")]
    work_tree: Option<PathBuf>,
    #[arg(long = "git-dir", global = true, value_name = "PATH", help = "Path to the repository metadata")]
    git_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command initializes a new repository in the current directory or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<PathBuf>,
    },
    #[command(
        name = "hash-object",
        about = "Hash an object and optionally write it to the object database",
        long_about = "This command hashes a file as an object of the given type and can write it to the object database."
    )]
    HashObject {
        #[arg(short, long, required = false, help = "Write the object to the object database")]
        write: bool,
        #[arg(short = 't', default_value = "blob", help = "The object type")]
        kind: ObjectType,
        #[arg(index = 1)]
        file: String,
    },
    #[command(
        name = "cat-file",
        about = "Print the type, size or content of an object",
        group(ArgGroup::new("mode").required(true).args(["show_type", "size", "pretty"]))
    )]
    CatFile {
        #[arg(short = 't', help = "Print the object type")]
        show_type: bool,
        #[arg(short = 's', help = "Print the object size")]
        size: bool,
        #[arg(short = 'p', help = "Pretty-print the object content")]
        pretty: bool,
        #[arg(index = 1, help = "The object to print")]
        object: String,
    },
    #[command(name = "dump", about = "Hex dump an object, or decode the index with 'index'")]
    Dump {
        #[arg(index = 1)]
        target: String,
    },
    #[command(name = "ls-tree", about = "List the contents of a tree object")]
    LsTree {
        #[arg(short = 'r', help = "Recurse into subtrees")]
        recursive: bool,
        #[arg(index = 1)]
        tree_ish: String,
    },
    #[command(name = "ls-files", about = "Show the files in the index")]
    LsFiles {
        #[arg(short = 's', long = "stage", help = "Show mode, object id and stage")]
        stage: bool,
        #[arg(long, help = "Show the decoded index including the cache tree")]
        debug: bool,
    },
    #[command(name = "update-index", about = "Register file contents in the index")]
    UpdateIndex {
        #[arg(long, help = "Add files not yet in the index")]
        add: bool,
        #[arg(long, help = "Remove files missing from the working tree")]
        remove: bool,
        #[arg(long = "force-remove", help = "Remove files even if they still exist")]
        force_remove: bool,
        #[arg(long, value_name = "MODE,OBJECT,PATH", value_parser = CacheInfo::try_parse)]
        cacheinfo: Vec<CacheInfo>,
        paths: Vec<String>,
    },
    #[command(name = "write-tree", about = "Create tree objects from the index")]
    WriteTree {
        #[arg(long, help = "Write the tree of this directory only")]
        prefix: Option<String>,
    },
    #[command(name = "read-tree", about = "Read a tree into the index")]
    ReadTree {
        #[arg(long, help = "Read the tree below this directory, keeping the current entries")]
        prefix: Option<String>,
        #[arg(index = 1)]
        tree_ish: String,
    },
    #[command(name = "commit-tree", about = "Create a commit object from a tree")]
    CommitTree {
        #[arg(short = 'p', help = "Parent commit")]
        parents: Vec<String>,
        #[arg(short, long, help = "The commit message")]
        message: String,
        #[arg(index = 1)]
        tree: String,
    },
    #[command(name = "diff-tree", about = "Compare the files of two trees")]
    DiffTree {
        #[arg(long = "diff-filter", value_name = "ADM")]
        diff_filter: Option<String>,
        #[arg(index = 1)]
        old: String,
        #[arg(index = 2)]
        new: String,
    },
    #[command(name = "add", about = "Add file contents to the index")]
    Add {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    #[command(name = "rm", about = "Remove files from the index and the working tree")]
    Rm {
        #[arg(short = 'r', help = "Allow recursive removal")]
        recursive: bool,
        #[arg(long, help = "Only remove from the index")]
        cached: bool,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    #[command(
        name = "commit",
        about = "Create a new commit with the specified message",
        long_about = "This command creates a new commit in the repository with the specified commit message."
    )]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
    },
}

fn main() -> Result<()> {
    dirc::logging::init();
    let cli = Cli::parse();

    let work_tree = match (&cli.command, &cli.work_tree) {
        (Commands::Init { path: Some(path) }, Some(base)) => Some(base.join(path)),
        (Commands::Init { path: Some(path) }, None) => Some(path.clone()),
        (_, work_tree) => work_tree.clone(),
    };
    let config = Config::resolve(work_tree.as_deref(), cli.git_dir.as_deref())?;
    let mut repository = Repository::new(config, Box::new(std::io::stdout()));

    match cli.command {
        Commands::Init { .. } => repository.init()?,
        Commands::HashObject { write, kind, file } => repository.hash_object(&file, kind, write)?,
        Commands::CatFile {
            show_type,
            size,
            object,
            ..
        } => {
            let mode = if show_type {
                CatFileMode::Type
            } else if size {
                CatFileMode::Size
            } else {
                CatFileMode::Pretty
            };
            repository.cat_file(&object, mode)?
        }
        Commands::Dump { target } => repository.dump(&target)?,
        Commands::LsTree {
            recursive,
            tree_ish,
        } => repository.ls_tree(&tree_ish, recursive)?,
        Commands::LsFiles { stage, debug } => repository.ls_files(stage, debug)?,
        Commands::UpdateIndex {
            add,
            remove,
            force_remove,
            cacheinfo,
            paths,
        } => {
            let options = UpdateIndexOptions {
                add,
                remove,
                force_remove,
                cacheinfo,
            };
            repository.update_index(&paths, &options)?
        }
        Commands::WriteTree { prefix } => repository.write_tree(prefix.as_deref())?,
        Commands::ReadTree { prefix, tree_ish } => repository.read_tree(&tree_ish, prefix.as_deref())?,
        Commands::CommitTree {
            parents,
            message,
            tree,
        } => repository.commit_tree(&tree, &parents, &message)?,
        Commands::DiffTree {
            diff_filter,
            old,
            new,
        } => repository.diff_tree(&old, &new, diff_filter.as_deref())?,
        Commands::Add { paths } => repository.add(&paths)?,
        Commands::Rm {
            recursive,
            cached,
            paths,
        } => repository.rm(&paths, recursive, cached)?,
        Commands::Commit { message } => repository.commit(&message)?,
    }

    repository.writer().flush()?;

    Ok(())
}
