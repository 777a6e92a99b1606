use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::analysis::{
    load_log_file, Analysis, AnalysisError, AnalysisSession, Direction, EntitySelection, Segment,
    ViewBy,
};
use crate::config::EngineConfig;
use crate::server;

const USAGE: &str = "usage: warpflow <analyze|flows|shots|crits|serve> [log] [--config PATH] \
[--entity NAME]... [--direction outgoing|incoming|both] [--by shot|round] [--table]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Analyze,
    Flows,
    Shots,
    Crits,
    Serve,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("analyze") => Some(Command::Analyze),
        Some("flows") => Some(Command::Flows),
        Some("shots") => Some(Command::Shots),
        Some("crits") => Some(Command::Crits),
        Some("serve") => Some(Command::Serve),
        _ => None,
    }
}

/// Flags shared by the log commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogOptions {
    pub log_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub entities: Vec<String>,
    pub direction: Direction,
    pub view_by: ViewBy,
    pub table: bool,
}

pub fn parse_log_options(args: &[String]) -> Result<LogOptions, String> {
    let mut options = LogOptions::default();
    let mut log_path = None;
    let mut rest = args.iter().skip(2);

    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--table" => options.table = true,
            "--config" => options.config_path = Some(PathBuf::from(flag_value(&mut rest, arg)?)),
            "--entity" => options.entities.push(flag_value(&mut rest, arg)?.to_string()),
            "--direction" => options.direction = flag_value(&mut rest, arg)?.parse()?,
            "--by" => options.view_by = flag_value(&mut rest, arg)?.parse()?,
            flag if flag.starts_with("--") => return Err(format!("unknown flag '{flag}'")),
            path if log_path.is_none() => log_path = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument '{extra}'")),
        }
    }

    options.log_path = log_path.ok_or_else(|| "missing log path".to_string())?;
    Ok(options)
}

fn flag_value<'a>(
    rest: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a str, String> {
    rest.next()
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} needs a value"))
}

pub fn run_with_args(args: &[String]) -> i32 {
    let Some(command) = parse_command(args) else {
        eprintln!("{USAGE}");
        return 2;
    };
    if command == Command::Serve {
        return handle_serve();
    }

    let options = match parse_log_options(args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{USAGE}");
            return 2;
        }
    };
    let analysis = match run_analysis(&options.log_path, options.config_path.as_deref()) {
        Ok(analysis) => analysis,
        Err(err) => {
            eprintln!("analysis failed: {err}");
            return 1;
        }
    };
    let selection = match analysis.select(options.entities.as_slice()) {
        Ok(selection) => selection,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    match command {
        Command::Analyze => handle_analyze(&analysis, &selection, &options),
        Command::Flows => handle_flows(&analysis, &options),
        Command::Shots => handle_shots(&analysis, &selection, &options),
        Command::Crits => handle_crits(&analysis, &selection, &options),
        Command::Serve => handle_serve(),
    }
}

/// Load config and log, then run one session.
pub fn run_analysis(log_path: &Path, config_path: Option<&Path>) -> Result<Analysis, String> {
    let config = EngineConfig::load_or_default(config_path).map_err(|err| err.to_string())?;
    let log = load_log_file(log_path).map_err(|err| err.to_string())?;
    AnalysisSession::new(config)
        .analyze_log(log)
        .map_err(|err: AnalysisError| err.to_string())
}

fn handle_serve() -> i32 {
    let bind_addr = env::var("WARPFLOW_BIND").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    match server::run_server(&bind_addr) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn handle_analyze(analysis: &Analysis, selection: &EntitySelection, options: &LogOptions) -> i32 {
    if options.table {
        let view = analysis.view(selection, options.direction);
        println!("round\tsource\ttarget\tcategory\traw\tmitigated\tpost\tmatched\tvalid");
        for row in &view.rows {
            let flow = row.flow;
            println!(
                "{}\t{}\t{}\t{}\t{:.3}\t{:.3}\t{:.3}\t{:?}\t{}",
                flow.round_index,
                analysis.label(flow.source),
                analysis.label(flow.target),
                flow.category,
                flow.total_raw,
                flow.total_mitigated,
                flow.total_post,
                row.matched,
                row.valid
            );
        }
        let summary = analysis.summary();
        eprintln!(
            "rows={} invalid={} errors={} warnings={} incomplete={}",
            view.rows.len(),
            view.invalid_rows,
            summary.errors,
            summary.warnings,
            summary.incomplete
        );
        return 0;
    }
    print_json(&analysis.report(selection, options.direction), "analysis")
}

fn handle_flows(analysis: &Analysis, options: &LogOptions) -> i32 {
    let rows = analysis.decompositions();
    if options.table {
        println!("round\tsource\ttarget\tcategory\tpre\tmitigated\tpost\tshare\tvalid");
        for row in &rows {
            println!(
                "{}\t{}\t{}\t{}\t{:.3}\t{:.3}\t{:.3}\t{:.4}\t{}",
                row.flow.round_index,
                analysis.label(row.flow.source),
                analysis.label(row.flow.target),
                row.flow.category,
                row.pre_mitigation,
                row.mitigated,
                row.post_mitigation,
                row.share_of_raw,
                row.is_valid()
            );
        }
        return 0;
    }
    print_json(&rows, "flows")
}

fn handle_shots(analysis: &Analysis, selection: &EntitySelection, options: &LogOptions) -> i32 {
    let series = analysis.destination(selection, options.direction, options.view_by);
    if options.table {
        let header: Vec<&str> = Segment::ALL.iter().map(Segment::label).collect();
        println!("{}\tround\tshots\t{}", options.view_by, header.join("\t"));
        for point in &series {
            let amounts: Vec<String> = Segment::ALL
                .iter()
                .map(|segment| format!("{:.3}", point.amount(*segment)))
                .collect();
            println!(
                "{}\t{}\t{}\t{}",
                point.position,
                point.round_index,
                point.shots,
                amounts.join("\t")
            );
        }
        return 0;
    }
    print_json(&series, "shot series")
}

fn handle_crits(analysis: &Analysis, selection: &EntitySelection, options: &LogOptions) -> i32 {
    let series = analysis.crit_hits(selection, options.direction, options.view_by);
    if options.table {
        println!("{}\tround\tshots\tcrits\tcrit_rate", options.view_by);
        for point in &series {
            println!(
                "{}\t{}\t{}\t{}\t{:.4}",
                point.position, point.round_index, point.shots, point.crits, point.crit_rate
            );
        }
        let shots: usize = series.iter().map(|point| point.shots).sum();
        let crits: usize = series.iter().map(|point| point.crits).sum();
        eprintln!("crits={crits} shots={shots}");
        return 0;
    }
    print_json(&series, "crit series")
}

fn print_json<T: Serialize + ?Sized>(value: &T, what: &str) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize {what}: {err}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn log_options_collect_repeated_entities() {
        let options = parse_log_options(&args(&[
            "warpflow",
            "analyze",
            "fight.tsv",
            "--entity",
            "Kirk",
            "--entity",
            "Spock",
            "--direction",
            "both",
            "--table",
        ]))
        .expect("options");
        assert_eq!(options.log_path, PathBuf::from("fight.tsv"));
        assert_eq!(options.entities, vec!["Kirk", "Spock"]);
        assert_eq!(options.direction, Direction::Both);
        assert!(options.table);
    }

    #[test]
    fn missing_flag_value_is_reported() {
        let err = parse_log_options(&args(&["warpflow", "shots", "log.json", "--by"]))
            .expect_err("no value");
        assert!(err.contains("--by"));
    }

    #[test]
    fn log_path_is_required() {
        assert!(parse_log_options(&args(&["warpflow", "flows"])).is_err());
    }
}
