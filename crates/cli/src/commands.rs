//! Parsing and execution of shell commands.
//!
//! Kept separate from the stdin loop so every command can be exercised
//! against a store in unit tests.

use refsample::{Dataset, ReferenceSample, XYDataset};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    New(i64),
    AddSed(i64, XYDataset),
    AddPdz(i64, XYDataset),
    GetSed(i64),
    GetPdz(i64),
    Ids,
    Size,
    Missing(Dataset),
    Optimize,
    Stats,
    Exit,
}

/// Parses one input line. Blank lines yield `Ok(None)`; malformed input
/// yields the message to print after `ERR`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();

    let command = match cmd.to_uppercase().as_str() {
        "NEW" => Command::New(single_id(&args, "NEW id")?),
        "ADDSED" => {
            let (id, data) = id_and_pairs(&args, "ADDSED id x:y [x:y ...]")?;
            Command::AddSed(id, data)
        }
        "ADDPDZ" => {
            let (id, data) = id_and_pairs(&args, "ADDPDZ id z:p [z:p ...]")?;
            Command::AddPdz(id, data)
        }
        "GETSED" => Command::GetSed(single_id(&args, "GETSED id")?),
        "GETPDZ" => Command::GetPdz(single_id(&args, "GETPDZ id")?),
        "IDS" => Command::Ids,
        "SIZE" => Command::Size,
        "MISSING" => match args.as_slice() {
            [which] => match which.to_uppercase().as_str() {
                "SED" => Command::Missing(Dataset::Sed),
                "PDZ" => Command::Missing(Dataset::Pdz),
                _ => return Err("usage: MISSING SED|PDZ".to_string()),
            },
            _ => return Err("usage: MISSING SED|PDZ".to_string()),
        },
        "OPTIMIZE" => Command::Optimize,
        "STATS" => Command::Stats,
        "EXIT" | "QUIT" => Command::Exit,
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(Some(command))
}

fn parse_id(raw: &str) -> Result<i64, String> {
    raw.parse()
        .map_err(|_| format!("invalid id: {}", raw))
}

fn single_id(args: &[&str], usage: &str) -> Result<i64, String> {
    match args {
        [id] => parse_id(id),
        _ => Err(format!("usage: {}", usage)),
    }
}

fn id_and_pairs(args: &[&str], usage: &str) -> Result<(i64, XYDataset), String> {
    match args {
        [id, pairs @ ..] => Ok((parse_id(id)?, parse_pairs(pairs)?)),
        [] => Err(format!("usage: {}", usage)),
    }
}

/// Parses `x:y` tokens into a dataset. Zero tokens give an empty dataset.
pub fn parse_pairs(tokens: &[&str]) -> Result<XYDataset, String> {
    tokens
        .iter()
        .map(|tok| -> Result<(f64, f64), String> {
            let (x, y) = tok
                .split_once(':')
                .ok_or_else(|| format!("invalid point {:?}, expected x:y", tok))?;
            let x: f64 = x.parse().map_err(|_| format!("invalid number {:?}", x))?;
            let y: f64 = y.parse().map_err(|_| format!("invalid number {:?}", y))?;
            Ok((x, y))
        })
        .collect()
}

/// Formats a dataset as `x:y x:y ...`. Values are stored as `f32` and
/// printed at that precision.
pub fn format_dataset(data: &XYDataset) -> String {
    data.iter()
        .map(|(x, y)| format!("{}:{}", *x as f32, *y as f32))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_ids(ids: &[i64]) -> String {
    if ids.is_empty() {
        "(empty)".to_string()
    } else {
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs `cmd` against the store and returns the reply line(s).
/// `Exit` is handled by the caller.
pub fn execute(rs: &mut ReferenceSample, cmd: Command) -> String {
    match cmd {
        Command::New(id) => match rs.create_object(id) {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("ERR {}", e),
        },
        Command::AddSed(id, data) => match rs.add_sed_data(id, &data) {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("ERR {:#}", e),
        },
        Command::AddPdz(id, data) => match rs.add_pdz_data(id, &data) {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("ERR {:#}", e),
        },
        Command::GetSed(id) => match rs.get_sed_data(id) {
            Ok(Some(data)) => format_dataset(&data),
            Ok(None) => "(nil)".to_string(),
            Err(e) => format!("ERR {:#}", e),
        },
        Command::GetPdz(id) => match rs.get_pdz_data(id) {
            Ok(Some(data)) => format_dataset(&data),
            Ok(None) => "(nil)".to_string(),
            Err(e) => format!("ERR {:#}", e),
        },
        Command::Ids => format_ids(&rs.ids()),
        Command::Size => rs.size().to_string(),
        Command::Missing(Dataset::Sed) => format_ids(&rs.missing_seds()),
        Command::Missing(Dataset::Pdz) => format_ids(&rs.missing_pdzs()),
        Command::Optimize => match rs.optimize() {
            Ok(()) => "OK".to_string(),
            Err(e) => format!("ERR optimize failed: {:#}", e),
        },
        Command::Stats => format!("{:?}", rs),
        Command::Exit => "bye".to_string(),
    }
}
