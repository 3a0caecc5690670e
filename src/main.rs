// Entry point and high-level CLI flow.
//
// - Option [1] loads and cleans the records JSON, printing diagnostics.
// - Option [2] changes the facet filters and the month range.
// - Option [3] recomputes the dashboard and writes the reports.
use anyhow::{Context, Result};
use case_analytics::aggregate::{
    align_datasets, client_monthly_sales, client_sales_between, filter_labeled_by_range,
};
use case_analytics::config::{parse_period, parse_year, Cli};
use case_analytics::ranking::{rank_for_cif, rank_label_values};
use case_analytics::types::SummaryStats;
use case_analytics::{
    loader, output, util, Dashboard, Facet, FilterSet, Metric, Period, PeriodRange,
};
use clap::Parser;
use once_cell::sync::Lazy;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

// Records are loaded once per run; filters persist between report runs.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        dashboard: None,
        filters: FilterSet::default(),
    })
});

struct AppState {
    dashboard: Option<Dashboard>,
    filters: FilterSet,
}

fn state() -> std::sync::MutexGuard<'static, AppState> {
    // A panic while holding the lock leaves plain data behind; keep going.
    APP_STATE.lock().unwrap_or_else(|e| e.into_inner())
}

/// One trimmed line from `input`, or `None` at end of input.
fn read_trimmed_line(input: &mut impl BufRead) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Print `label` and read one trimmed line. `None` once stdin is closed.
fn prompt(label: &str) -> Option<String> {
    print!("{}: ", label);
    let _ = io::stdout().flush();
    read_trimmed_line(&mut io::stdin().lock())
}

fn read_choice() -> Option<String> {
    prompt("Enter choice")
}

/// Ask whether to return to the menu. A closed stdin counts as "no".
fn prompt_back_to_menu() -> bool {
    loop {
        let Some(answer) = prompt("Back to Report Selection (Y/N)") else {
            return false;
        };
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Option [1]: load `--data`, print the cleaning diagnostics and replace
/// the current dashboard.
fn handle_load(cli: &Cli) {
    match loader::load_records(&cli.data) {
        Ok((records, report)) => {
            println!(
                "Processing dataset... ({} rows read, {} loaded)",
                util::format_int(report.total_rows as i64),
                util::format_int(report.loaded_rows as i64)
            );
            if report.skipped_rows > 0 {
                println!(
                    "Note: {} rows skipped for a missing or malformed month.",
                    util::format_int(report.skipped_rows as i64)
                );
            }
            if report.zeroed_numbers > 0 {
                println!(
                    "Info: {} numeric values were unreadable and counted as 0.",
                    util::format_int(report.zeroed_numbers as i64)
                );
            }
            println!();
            let dashboard = Dashboard::new(records)
                .with_metric(cli.metric)
                .with_top_n(cli.top);
            state().dashboard = Some(dashboard);
        }
        Err(e) => eprintln!("Failed to load file: {}\n", e),
    }
}

/// List `options` and read a pick. Empty input, a closed stdin or an
/// unknown number clear the facet.
fn choose_facet(dashboard: &Dashboard, facet: Facet, options: &[String]) -> Option<String> {
    println!("\nAvailable {} values:", facet.as_str());
    for (i, v) in options.iter().enumerate() {
        println!("  [{}] {}", i + 1, v);
    }
    let current = dashboard.filters().get(facet).unwrap_or("all");
    let input = prompt(&format!("Pick {} (number, empty = all, current: {})", facet.as_str(), current))
        .unwrap_or_default();
    if input.is_empty() {
        return None;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=options.len()).contains(&n) => Some(options[n - 1].clone()),
        _ => {
            println!("Unknown choice, filter cleared.");
            None
        }
    }
}

/// Read a range: a calendar year, or else optional `YYYY-MM` bounds.
fn prompt_range() -> PeriodRange {
    let year = prompt("Year (empty to enter a month range)").unwrap_or_default();
    if !year.is_empty() {
        match parse_year(&year) {
            Ok(y) => return PeriodRange::year(y),
            Err(e) => println!("{}; enter a month range instead.", e),
        }
    }
    let bound = |label: &str| {
        let s = prompt(label).unwrap_or_default();
        if s.is_empty() {
            return None;
        }
        match parse_period(&s) {
            Ok(p) => Some(p),
            Err(e) => {
                println!("{}; bound left open.", e);
                None
            }
        }
    };
    let from = bound("From month YYYY-MM (empty = open)");
    let to = bound("To month YYYY-MM (empty = open)");
    PeriodRange::new(from, to)
}

/// Option [2]: walk every facet in cascade order, then the range.
fn handle_filters() {
    let mut st = state();
    let Some(dashboard) = st.dashboard.as_mut() else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return;
    };

    for facet in Facet::all() {
        let options = match facet {
            Facet::Company => dashboard.company_options(),
            Facet::CaseType => dashboard.case_type_options(),
            other => case_analytics::aggregate::distinct_values(dashboard.records(), other),
        };
        let value = choose_facet(dashboard, facet, &options);
        dashboard.set_facet(facet, value);
    }

    dashboard.set_range(prompt_range());
    let filters = dashboard.filters().clone();
    st.filters = filters;
    println!();
}

/// Write `rows` to `out_dir/name` and print a preview of them.
fn export<T>(out_dir: &Path, name: &str, title: &str, rows: &[T], max_rows: usize) -> Result<()>
where
    T: serde::Serialize + tabled::Tabled + Clone,
{
    let path = out_dir.join(name);
    output::write_csv(&path, rows).with_context(|| format!("writing {}", path.display()))?;
    output::preview_table(title, None, rows, max_rows);
    if rows.len() > max_rows {
        println!("(Full table exported to {})\n", path.display());
    }
    Ok(())
}

/// Option [3]: recompute the dashboard and write series.csv,
/// top_clients.csv, top_specialists.csv, recent_months.csv and
/// summary.json, then any report whose dataset flag is set.
fn generate_reports(cli: &Cli) -> Result<()> {
    let dashboard = {
        let st = state();
        st.dashboard.clone()
    };
    let Some(dashboard) = dashboard else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return Ok(());
    };

    println!("Generating reports...\n");
    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    let view = dashboard.snapshot();
    let decimals = match dashboard.metric() {
        Metric::Cases => 0,
        _ => 2,
    };

    let series = output::series_rows(&view.series, decimals);
    let file1 = cli.out_dir.join("series.csv");
    output::write_csv(&file1, &series).with_context(|| format!("writing {}", file1.display()))?;
    output::preview_table(
        &format!("Monthly {} (filtered vs total)", dashboard.metric().as_str()),
        Some(format!("y-axis ceiling {}", util::format_number(view.chart_ceiling, decimals)).as_str()),
        &series,
        12,
    );
    println!("(Full table exported to {})\n", file1.display());

    let clients = output::ranking_rows(&view.top_clients, decimals);
    export(&cli.out_dir, "top_clients.csv", "Top clients", &clients, clients.len())?;
    let specialists = output::ranking_rows(&view.top_specialists, decimals);
    export(&cli.out_dir, "top_specialists.csv", "Top specialists", &specialists, specialists.len())?;

    let as_of = cli.as_of.unwrap_or_else(Period::current);
    let tiles = output::tile_rows(&dashboard.recent_tiles(as_of));
    export(
        &cli.out_dir,
        "recent_months.csv",
        &format!("Last complete months before {}", as_of.label_es()),
        &tiles,
        tiles.len(),
    )?;

    let summary: SummaryStats = dashboard.summary(&view);
    let file4 = cli.out_dir.join("summary.json");
    output::write_json(&file4, &summary).with_context(|| format!("writing {}", file4.display()))?;
    let v = view.variance;
    println!("Year over year (summary.json):");
    if v.has_baseline {
        println!(
            "{} vs {} last year, {} ({}%)\n",
            util::format_number(v.current_total, decimals),
            util::format_number(v.prior_total, decimals),
            util::format_number(v.delta, decimals),
            util::format_number(v.delta_percent, 2)
        );
    } else {
        println!(
            "{} this period, no data for the same months last year\n",
            util::format_number(v.current_total, decimals)
        );
    }

    generate_dataset_reports(cli, dashboard.filters().range)
}

/// Reports over the pre-aggregated exports named on the command line. Each
/// one is skipped when its flag is unset.
fn generate_dataset_reports(cli: &Cli, range: PeriodRange) -> Result<()> {
    let out = cli.out_dir.as_path();

    if let Some(path) = &cli.clients_data {
        let points = loader::load_label_values(path)
            .with_context(|| format!("loading {}", path.display()))?;
        let rows = output::ranking_rows(&rank_label_values(&points, cli.top), 2);
        export(out, "client_share.csv", "Sales share per client", &rows, rows.len())?;
    }

    if let Some(path) = &cli.specialists_data {
        let points = loader::load_label_values(path)
            .with_context(|| format!("loading {}", path.display()))?;
        let rows = output::ranking_rows(&rank_label_values(&points, cli.top), 2);
        export(out, "specialist_share.csv", "Cost share per specialist", &rows, rows.len())?;
    }

    if let Some(path) = &cli.history_data {
        let points = loader::load_label_values(path)
            .with_context(|| format!("loading {}", path.display()))?;
        let rows = output::label_rows(&filter_labeled_by_range(&points, range), 2);
        export(out, "history.csv", "History inside the range", &rows, 12)?;
    }

    if let (Some(path), Some(client)) = (&cli.client_sales_data, &cli.client) {
        let sales = loader::load_client_sales(path)
            .with_context(|| format!("loading {}", path.display()))?;
        let monthly = output::monthly_rows(&client_monthly_sales(&sales, client, range), 2);
        export(
            out,
            "client_sales_monthly.csv",
            &format!("Monthly sales of {}", client),
            &monthly,
            12,
        )?;
        let detail = output::sale_rows(&client_sales_between(&sales, client, range));
        export(
            out,
            "client_sales_detail.csv",
            &format!("Sales lines of {}", client),
            &detail,
            10,
        )?;
    }

    if let (Some(path), Some(cif)) = (&cli.cif_data, &cli.cif) {
        let points = loader::load_label_values(path)
            .with_context(|| format!("loading {}", path.display()))?;
        let rows = output::ranking_rows(&rank_for_cif(&points, cif, cli.top), 2);
        export(out, "cif_clients.csv", &format!("Sales breakdown for {}", cif), &rows, rows.len())?;
    }

    if let Some(path) = &cli.comparison_data {
        let datasets = loader::load_datasets(path)
            .with_context(|| format!("loading {}", path.display()))?;
        let comparison = align_datasets(&datasets);
        let csv_path = out.join("comparison.csv");
        output::write_comparison_csv(&csv_path, &comparison, 2)
            .with_context(|| format!("writing {}", csv_path.display()))?;
        let json_path = out.join("comparison.json");
        output::write_json(&json_path, &comparison)
            .with_context(|| format!("writing {}", json_path.display()))?;
        println!("Series comparison\n");
        println!("{}\n", output::render_comparison(&comparison, 2));
        info!(series = comparison.series.len(), "comparison written");
    }
    Ok(())
}

fn handle_generate_reports(cli: &Cli) {
    if let Err(e) = generate_reports(cli) {
        warn!("report generation failed: {:#}", e);
        eprintln!("Write error: {:#}", e);
    }
}

/// Replay a saved selection on a freshly loaded dashboard, range first so
/// the group cascade sees the final company.
fn apply_filters(dashboard: &mut Dashboard, filters: &FilterSet) {
    dashboard.set_range(filters.range);
    for facet in Facet::all() {
        dashboard.set_facet(facet, filters.get(facet).map(str::to_string));
    }
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    state().filters = cli.filters();

    if cli.batch {
        let (records, _) = loader::load_records(&cli.data)
            .with_context(|| format!("loading {}", cli.data.display()))?;
        let mut dashboard = Dashboard::new(records)
            .with_metric(cli.metric)
            .with_top_n(cli.top);
        apply_filters(&mut dashboard, &cli.filters());
        state().dashboard = Some(dashboard);
        return generate_reports(&cli);
    }

    loop {
        println!("Case analytics:");
        println!("[1] Load the file");
        println!("[2] Set filters");
        println!("[3] Generate Reports\n");
        let Some(choice) = read_choice() else {
            println!("\nExiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => {
                handle_load(&cli);
                let mut st = state();
                let filters = st.filters.clone();
                if let Some(d) = st.dashboard.as_mut() {
                    apply_filters(d, &filters);
                }
            }
            "2" => handle_filters(),
            "3" => {
                println!();
                handle_generate_reports(&cli);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1, 2 or 3.\n"),
        }
    }
    Ok(())
}
