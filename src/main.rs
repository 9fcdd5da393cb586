use clap::{Parser, Subcommand};

use flowctl::actor;
use flowctl::commands::{config_cmds, epic, query, review_cmds, task};
use flowctl::error::Result;
use flowctl::output::{Format, emit_err};
use flowctl::paths::Paths;
use flowctl::review::invoke::SandboxMode;

#[derive(Parser)]
#[command(
    name = "flowctl",
    version,
    about = "Git-repository-local task tracking for AI coding agents"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format text
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum EpicAction {
    /// Create a new epic
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Replace an epic's plan body
    SetPlan {
        id: String,
        #[arg(long)]
        file: String,
    },
    SetPlanReviewStatus {
        id: String,
        #[arg(long)]
        status: String,
    },
    SetCompletionReviewStatus {
        id: String,
        #[arg(long)]
        status: String,
    },
    SetBranch {
        id: String,
        #[arg(long)]
        branch: String,
    },
    SetTitle {
        id: String,
        #[arg(long)]
        title: String,
    },
    AddDep {
        id: String,
        dep: String,
    },
    RmDep {
        id: String,
        dep: String,
    },
    SetBackend {
        id: String,
        #[arg(long = "impl")]
        r#impl: Option<String>,
        #[arg(long)]
        review: Option<String>,
        #[arg(long)]
        sync: Option<String>,
    },
    Close {
        id: String,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Create a new task under an epic
    Create {
        #[arg(long)]
        epic: String,
        #[arg(long)]
        title: String,
        #[arg(long, value_delimiter = ',')]
        deps: Vec<String>,
        #[arg(long)]
        priority: Option<i64>,
        #[arg(long)]
        acceptance_file: Option<String>,
    },
    SetDescription {
        id: String,
        #[arg(long)]
        file: String,
    },
    SetAcceptance {
        id: String,
        #[arg(long)]
        file: String,
    },
    SetSpec {
        id: String,
        #[arg(long, conflicts_with_all = ["description", "acceptance"])]
        file: Option<String>,
        #[arg(long, conflicts_with = "file")]
        description: Option<String>,
        #[arg(long, conflicts_with = "file")]
        acceptance: Option<String>,
    },
    SetDeps {
        id: String,
        #[arg(long, value_delimiter = ',')]
        deps: Vec<String>,
    },
    Reset {
        id: String,
        #[arg(long)]
        cascade: bool,
    },
    SetBackend {
        id: String,
        #[arg(long = "impl")]
        r#impl: Option<String>,
        #[arg(long)]
        review: Option<String>,
        #[arg(long)]
        sync: Option<String>,
    },
    ShowBackend {
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Get { key: String },
    Set { key: String, value: String },
}

#[derive(Subcommand)]
enum CheckpointAction {
    Save {
        #[arg(long)]
        epic: String,
    },
    Restore {
        #[arg(long)]
        epic: String,
    },
    Delete {
        #[arg(long)]
        epic: String,
    },
}

#[derive(Subcommand)]
enum CodexAction {
    /// Check whether the reviewer binary is on PATH
    Check,
    ImplReview {
        /// Task id; omit for a standalone focus-only review
        task: Option<String>,
        #[arg(long)]
        base: String,
        #[arg(long)]
        focus: Option<String>,
        #[arg(long)]
        receipt: Option<String>,
        #[arg(long, value_enum, default_value = "auto")]
        sandbox: SandboxMode,
    },
    PlanReview {
        epic: String,
        #[arg(long, value_delimiter = ',', required = true)]
        files: Vec<String>,
        #[arg(long, default_value = "main")]
        base: String,
        #[arg(long)]
        receipt: Option<String>,
        #[arg(long, value_enum, default_value = "auto")]
        sandbox: SandboxMode,
    },
    CompletionReview {
        epic: String,
        #[arg(long, default_value = "main")]
        base: String,
        #[arg(long)]
        receipt: Option<String>,
        #[arg(long, value_enum, default_value = "auto")]
        sandbox: SandboxMode,
    },
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a `.flow` store in the current repository
    Init,
    /// Dashboard summary across every epic
    Status,
    /// Report whether the current directory is a flow repository
    Detect,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Resolve which reviewer backend is active
    ReviewBackend,
    Epic {
        #[command(subcommand)]
        action: EpicAction,
    },
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Add a task-level dependency edge
    Dep {
        task: String,
        dep: String,
    },
    /// Show a single epic or task record
    Show {
        id: String,
    },
    /// List every epic
    Epics,
    /// List tasks, optionally scoped by epic and/or status
    Tasks {
        #[arg(long)]
        epic: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// List every task across every epic
    List,
    /// Print the raw markdown spec body for an epic or task
    Cat {
        id: String,
    },
    /// Compute the ready/in_progress/blocked partition for an epic
    Ready {
        #[arg(long)]
        epic: String,
    },
    /// Select the next unit of work across epics
    Next {
        #[arg(long)]
        epics_file: Option<String>,
        #[arg(long)]
        require_plan_review: bool,
        #[arg(long)]
        require_completion_review: bool,
    },
    /// Claim a task
    Start {
        id: String,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        note: Option<String>,
    },
    /// Mark a task done
    Done {
        id: String,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long = "summary-file")]
        summary_file: Option<String>,
        #[arg(long)]
        evidence: Option<String>,
        #[arg(long = "evidence-json")]
        evidence_json: Option<String>,
        #[arg(long)]
        force: bool,
    },
    /// Mark a task blocked
    Block {
        id: String,
        #[arg(long = "reason-file")]
        reason_file: String,
    },
    /// Print the resolved state directory, or one task's runtime state file
    StatePath {
        #[arg(long)]
        task: Option<String>,
    },
    /// Extract legacy inline runtime fields into the runtime store
    MigrateState {
        #[arg(long)]
        clean: bool,
    },
    /// Validate one epic or the whole repository
    Validate {
        #[arg(long)]
        epic: Option<String>,
        #[arg(long)]
        all: bool,
    },
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    Codex {
        #[command(subcommand)]
        action: CodexAction,
    },
}

fn run(cli: Cli, format: Format) -> Result<()> {
    if matches!(cli.command, Commands::Init) {
        let cwd = std::env::current_dir().map_err(flowctl::error::FlowError::Io)?;
        let paths = Paths::resolve(&cwd);
        return query::init(&paths, format);
    }

    let cwd = std::env::current_dir().map_err(flowctl::error::FlowError::Io)?;
    let paths = Paths::resolve(&cwd);
    let actor = actor::current_actor(&paths.repo_root);

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Status => query::status(&paths, format),
        Commands::Detect => query::detect(&paths, format),
        Commands::ReviewBackend => config_cmds::review_backend(&paths, format),
        Commands::Config { action } => match action {
            ConfigAction::Get { key } => config_cmds::get(&paths, format, &key),
            ConfigAction::Set { key, value } => config_cmds::set(&paths, format, &key, &value),
        },
        Commands::Epic { action } => match action {
            EpicAction::Create { title, branch } => epic::create(&paths, format, &title, branch.as_deref()),
            EpicAction::SetPlan { id, file } => {
                let content = flowctl::commands::read_input(&file)?;
                epic::set_plan(&paths, format, &id, &content)
            }
            EpicAction::SetPlanReviewStatus { id, status } => {
                epic::set_plan_review_status(&paths, format, &id, &status)
            }
            EpicAction::SetCompletionReviewStatus { id, status } => {
                epic::set_completion_review_status(&paths, format, &id, &status)
            }
            EpicAction::SetBranch { id, branch } => epic::set_branch(&paths, format, &id, &branch),
            EpicAction::SetTitle { id, title } => epic::set_title(&paths, format, &id, &title),
            EpicAction::AddDep { id, dep } => epic::add_dep(&paths, format, &id, &dep),
            EpicAction::RmDep { id, dep } => epic::rm_dep(&paths, format, &id, &dep),
            EpicAction::SetBackend { id, r#impl, review, sync } => {
                epic::set_backend(&paths, format, &id, r#impl, review, sync)
            }
            EpicAction::Close { id } => epic::close(&paths, format, &id),
        },
        Commands::Task { action } => match action {
            TaskAction::Create { epic, title, deps, priority, acceptance_file } => task::create(
                &paths,
                format,
                task::CreateArgs { epic: &epic, title: &title, deps, priority, acceptance_file: acceptance_file.as_deref() },
            ),
            TaskAction::SetDescription { id, file } => {
                let content = flowctl::commands::read_input(&file)?;
                task::set_description(&paths, format, &id, &content)
            }
            TaskAction::SetAcceptance { id, file } => {
                let content = flowctl::commands::read_input(&file)?;
                task::set_acceptance(&paths, format, &id, &content)
            }
            TaskAction::SetSpec { id, file, description, acceptance } => task::set_spec(
                &paths,
                format,
                &id,
                task::SetSpecArgs { file: file.as_deref(), description: description.as_deref(), acceptance: acceptance.as_deref() },
            ),
            TaskAction::SetDeps { id, deps } => task::set_deps(&paths, format, &id, deps),
            TaskAction::Reset { id, cascade } => task::reset(&paths, format, &id, cascade),
            TaskAction::SetBackend { id, r#impl, review, sync } => {
                task::set_backend(&paths, format, &id, r#impl, review, sync)
            }
            TaskAction::ShowBackend { id } => task::show_backend(&paths, format, &id),
        },
        Commands::Dep { task, dep } => epic::dep_add(&paths, format, &task, &dep),
        Commands::Show { id } => query::show(&paths, format, &id),
        Commands::Epics => query::epics(&paths, format),
        Commands::Tasks { epic, status } => query::tasks(&paths, format, epic.as_deref(), status.as_deref()),
        Commands::List => query::list(&paths, format),
        Commands::Cat { id } => query::cat(&paths, format, &id),
        Commands::Ready { epic } => query::ready(&paths, format, &epic),
        Commands::Next { epics_file, require_plan_review, require_completion_review } => query::next(
            &paths,
            format,
            &actor,
            epics_file.as_deref(),
            require_plan_review,
            require_completion_review,
        ),
        Commands::Start { id, force, note } => task::start(&paths, format, &id, &actor, force, note.as_deref()),
        Commands::Done { id, summary, summary_file, evidence, evidence_json, force } => {
            let summary = match summary_file {
                Some(f) => flowctl::commands::read_input(&f)?,
                None => summary.unwrap_or_default(),
            };
            let evidence_json = match evidence_json {
                Some(raw) => Some(raw),
                None => evidence,
            };
            task::done(
                &paths,
                format,
                &id,
                &actor,
                task::DoneArgs { summary: &summary, evidence_json: evidence_json.as_deref(), force },
            )
        }
        Commands::Block { id, reason_file } => {
            let reason = flowctl::commands::read_input(&reason_file)?;
            task::block(&paths, format, &id, &reason)
        }
        Commands::StatePath { task } => query::state_path(&paths, format, task.as_deref()),
        Commands::MigrateState { clean } => query::migrate_state(&paths, format, clean),
        Commands::Validate { epic, all } => query::validate(&paths, format, epic.as_deref(), all),
        Commands::Checkpoint { action } => match action {
            CheckpointAction::Save { epic } => query::checkpoint_save(&paths, format, &epic),
            CheckpointAction::Restore { epic } => query::checkpoint_restore(&paths, format, &epic),
            CheckpointAction::Delete { epic } => query::checkpoint_delete(&paths, format, &epic),
        },
        Commands::Codex { action } => match action {
            CodexAction::Check => review_cmds::check(format),
            CodexAction::ImplReview { task, base, focus, receipt, sandbox } => review_cmds::impl_review(
                &paths,
                format,
                task.as_deref(),
                focus.as_deref(),
                &base,
                receipt.as_deref(),
                sandbox,
            ),
            CodexAction::PlanReview { epic, files, base, receipt, sandbox } => {
                review_cmds::plan_review(&paths, format, &epic, files, &base, receipt.as_deref(), sandbox)
            }
            CodexAction::CompletionReview { epic, base, receipt, sandbox } => {
                review_cmds::completion_review(&paths, format, &epic, &base, receipt.as_deref(), sandbox)
            }
        },
    }
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.pretty { Format::Text } else { cli.format };
    if let Err(e) = run(cli, format) {
        emit_err(format, &e);
        std::process::exit(e.exit_class().code());
    }
}
