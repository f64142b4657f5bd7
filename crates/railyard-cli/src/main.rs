//! CLI binary for designing, validating, fixing, and compiling pipelines.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use railyard_pipeline::{
    apply_all_fixes, compile, execution_order, validate, Dialect, ExecutionOrder, PipelineGraph,
    Severity,
};
use railyard_project::ProjectSnapshot;

#[derive(Parser)]
#[command(name = "railyard", version, about = "Design, lint, auto-fix, and compile CI pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Github,
    Gitlab,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Github => Dialect::GithubActions,
            DialectArg::Gitlab => Dialect::GitlabCi,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project file and print every finding
    Validate {
        /// Path to the project .json file
        project: PathBuf,
    },

    /// Compile a project into a CI configuration document
    Compile {
        /// Path to the project .json file
        project: PathBuf,

        /// Target dialect (defaults to the project's own)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply every automatic remediation, then report what remains
    Fix {
        /// Path to the project .json file
        project: PathBuf,

        /// Save the fixed project back to the same file
        #[arg(long)]
        write: bool,
    },

    /// Show information about a project
    Info {
        /// Path to the project .json file
        project: PathBuf,
    },

    /// Convert a hand-written CI document (either dialect) into a project
    Import {
        /// Path to the pipeline .yml file
        pipeline: PathBuf,

        /// Output project path (default: <pipeline>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a project, optionally from a starter template
    New {
        /// Template name; omit for an empty pipeline
        #[arg(short, long)]
        template: Option<String>,

        /// Output project path
        #[arg(short, long, default_value = "pipeline-project.json")]
        output: PathBuf,

        /// List the available templates and exit
        #[arg(long)]
        list: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Validate { project } => cmd_validate(&project),
        Commands::Compile {
            project,
            dialect,
            output,
        } => cmd_compile(&project, dialect.map(Into::into), output.as_deref()),
        Commands::Fix { project, write } => cmd_fix(&project, write),
        Commands::Info { project } => cmd_info(&project),
        Commands::Import { pipeline, output } => cmd_import(&pipeline, output.as_deref()),
        Commands::New {
            template,
            output,
            list,
        } => cmd_new(template.as_deref(), &output, list),
    }
}

fn load_graph(path: &Path) -> anyhow::Result<PipelineGraph> {
    let snapshot = ProjectSnapshot::load(path)?;
    Ok(PipelineGraph::from_snapshot(&snapshot))
}

fn print_issues(graph: &PipelineGraph) -> bool {
    let issues = validate(graph);
    let mut has_error = false;
    for issue in &issues {
        if issue.severity == Severity::Error {
            has_error = true;
        }
        println!("[{}] {}: {}", issue.severity.label(), issue.title, issue.detail);
        if let Some(hint) = &issue.hint {
            println!("        fix: {hint}");
        }
    }
    has_error
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let graph = load_graph(path)?;
    if print_issues(&graph) {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_compile(path: &Path, dialect: Option<Dialect>, output: Option<&Path>) -> anyhow::Result<()> {
    let graph = load_graph(path)?;
    let dialect = dialect.unwrap_or(graph.settings().dialect);
    let yaml = compile(&graph, dialect).to_yaml()?;

    match output {
        Some(out) => {
            std::fs::write(out, &yaml)?;
            println!("Wrote {} configuration to {}", dialect, out.display());
        }
        None => print!("{yaml}"),
    }
    Ok(())
}

fn cmd_fix(path: &Path, write: bool) -> anyhow::Result<()> {
    let snapshot = ProjectSnapshot::load(path)?;
    let mut graph = PipelineGraph::from_snapshot(&snapshot);

    let applied = apply_all_fixes(&mut graph);
    println!("Applied {applied} fix(es)");

    let remaining = validate(&graph)
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    println!("Remaining errors: {remaining}");

    if write {
        graph.to_snapshot().save(path)?;
        println!("Saved {}", path.display());
    } else if applied > 0 {
        println!("(dry run -- pass --write to save)");
    }
    Ok(())
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let graph = load_graph(path)?;
    let settings = graph.settings();

    println!("Dialect: {}", settings.dialect);
    println!("Branch: {}", settings.branch);
    println!("Stages: {}", settings.stages.join(", "));
    println!("Jobs: {}", graph.jobs().len());
    println!("Edges: {}", graph.edges().len());

    match execution_order(&graph) {
        ExecutionOrder::Ordered(order) => {
            let names: Vec<&str> = order
                .iter()
                .filter_map(|id| graph.job(id))
                .map(|j| j.name.as_str())
                .collect();
            println!("Order: {}", names.join(" -> "));
        }
        ExecutionOrder::Cycle(cycle) => {
            println!("Cycle: {}", cycle.join(" -> "));
        }
    }

    println!("\nJobs:");
    for job in graph.jobs() {
        let kind = if job.external { "external" } else { "standard" };
        println!(
            "  {} [{}] stage={} steps={} ({})",
            job.slug,
            job.name,
            job.stage,
            job.steps.len(),
            kind
        );
    }
    Ok(())
}

fn cmd_import(pipeline: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(pipeline)?;
    let snapshot = railyard_project::import_yaml(&source)?;

    let out = match output {
        Some(out) => out.to_path_buf(),
        None => pipeline.with_extension("json"),
    };
    snapshot.save(&out)?;

    println!(
        "Imported {} job(s) and {} edge(s) ({} dialect) into {}",
        snapshot.jobs.len(),
        snapshot.edges.len(),
        snapshot.dialect,
        out.display()
    );
    Ok(())
}

fn cmd_new(template: Option<&str>, output: &Path, list: bool) -> anyhow::Result<()> {
    if list {
        for name in railyard_project::template_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let snapshot = match template {
        Some(name) => railyard_project::template(name).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown template '{}'; run `railyard new --list` to see what exists",
                name
            )
        })?,
        None => ProjectSnapshot::default(),
    };
    snapshot.save(output)?;

    println!(
        "Created {} with {} job(s)",
        output.display(),
        snapshot.jobs.len()
    );
    Ok(())
}
