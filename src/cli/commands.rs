use crate::error::MigrateResult;
use crate::migrate::{MigrationPlan, MigrationReport, Migrator, NoProgress, ProgressSink};
use crate::workbook::Workbook;
use crate::xlsx::read_workbook;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Prints each checkpoint as it is reached
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn report(&self, percent: u8, message: &str) {
        println!("   {} {}", format!("[{:>3}%]", percent).cyan(), message);
    }
}

fn load_plan(plan: Option<&Path>) -> MigrateResult<MigrationPlan> {
    match plan {
        Some(path) => MigrationPlan::from_file(path),
        None => Ok(MigrationPlan::default()),
    }
}

/// Execute the migrate command
pub fn migrate(
    source: PathBuf,
    template: PathBuf,
    output: PathBuf,
    plan: Option<PathBuf>,
    verbose: bool,
) -> MigrateResult<()> {
    println!("{}", "📦 Sheet Migrate - Migrating workbook".bold().green());
    println!("   Source:   {}", source.display());
    println!("   Template: {}", template.display());
    if let Some(ref p) = plan {
        println!("   Plan:     {}", p.display());
    }
    println!();

    let migrator = Migrator::new(load_plan(plan.as_deref())?);
    let source_bytes = fs::read(&source)?;
    let template_bytes = fs::read(&template)?;

    let progress: &dyn ProgressSink = if verbose { &ConsoleProgress } else { &NoProgress };
    let (bytes, report) =
        migrator.migrate_bytes_with_report(&source_bytes, &template_bytes, progress)?;

    fs::write(&output, &bytes)?;

    if verbose {
        println!();
    }
    print_report(&report);
    println!("{}", "✅ Migration Complete!".bold().green());
    println!("   Output: {} ({} bytes)\n", output.display(), bytes.len());
    Ok(())
}

fn print_report(report: &MigrationReport) {
    println!("   Cells copied:        {}", report.cells_copied);
    println!("   Formulas rewritten:  {}", report.substitutions);
    println!("   Validations applied: {}", report.validations_applied);
    println!("   Braces cleaned:      {}", report.braces_cleaned);
    if report.ad_hoc_sheets.is_empty() {
        println!("   Ad hoc sheets:       {}", "none".dimmed());
    } else {
        println!(
            "   Ad hoc sheets:       {}",
            report.ad_hoc_sheets.join(", ").bright_blue()
        );
    }
    println!();
}

/// Execute the inspect command
pub fn inspect(file: PathBuf) -> MigrateResult<()> {
    let bytes = fs::read(&file)?;
    let label = file.display().to_string();
    let workbook = read_workbook(&bytes, &label)?;

    println!("{}", "🔍 Sheet Migrate - Workbook summary".bold().green());
    println!("   File: {}", file.display());
    println!(
        "   Macros: {}\n",
        if workbook.has_vba_project() {
            "yes (xl/vbaProject.bin)".green()
        } else {
            "no".yellow()
        }
    );
    print_sheets(&workbook);
    Ok(())
}

fn print_sheets(workbook: &Workbook) {
    println!("   {} sheets:", workbook.sheet_count());
    for (i, sheet) in workbook.sheets().iter().enumerate() {
        let range = match sheet.used_range() {
            Some(range) => range.to_a1(),
            None => "empty".to_string(),
        };
        let kind = if sheet.is_worksheet() {
            String::new()
        } else {
            format!(" {}", "(not a worksheet)".dimmed())
        };
        println!(
            "   {:>3}. {}  {}  {} cells, {} validations{}",
            i + 1,
            sheet.name().bright_blue().bold(),
            range,
            sheet.cell_count(),
            sheet.data_validations().len(),
            kind
        );
    }
    println!();
}

/// Execute the plan command: print (or write) the migration plan as YAML
pub fn plan(input: Option<PathBuf>, output: Option<PathBuf>) -> MigrateResult<()> {
    let plan = load_plan(input.as_deref())?;
    let yaml = plan.to_yaml()?;
    match output {
        Some(path) => {
            fs::write(&path, yaml)?;
            println!("{}", "✅ Plan written".bold().green());
            println!("   File: {}", path.display());
        }
        None => print!("{}", yaml),
    }
    Ok(())
}
