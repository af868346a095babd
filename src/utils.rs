use crate::mlfq::Mlfq;
use crate::process::ProcessDescriptor;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

// The input file holds one process per line: `id;burst;arrival;level[;priority]`.
// The level is 1-based and the priority defaults to 0. Lines starting with '#'
// and blank lines are skipped.
pub fn parse_input(contents: &str) -> Result<Vec<ProcessDescriptor>> {
    let mut descriptors = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let desc = parse_line(line).with_context(|| format!("line {}: '{}'", idx + 1, line))?;
        descriptors.push(desc);
    }
    Ok(descriptors)
}

fn parse_line(line: &str) -> Result<ProcessDescriptor> {
    let parts: Vec<&str> = line.split(';').map(|part| part.trim()).collect();
    if parts.len() != 4 && parts.len() != 5 {
        bail!("expected 4 or 5 fields, found {}", parts.len());
    }

    let id = parts[0];
    if id.is_empty() {
        bail!("empty process id");
    }
    let burst_time: u64 = parts[1].parse().context("Failed to parse burst time")?;
    let arrival_time: u64 = parts[2].parse().context("Failed to parse arrival time")?;
    let level: usize = parts[3].parse().context("Failed to parse queue level")?;
    if level == 0 {
        bail!("queue levels start at 1");
    }
    let priority: i64 = match parts.get(4) {
        Some(p) => p.parse().context("Failed to parse priority")?,
        None => 0,
    };

    Ok(ProcessDescriptor::new(id, burst_time, arrival_time, level - 1).with_priority(priority))
}

pub fn read_input_file(path: &Path) -> Result<Vec<ProcessDescriptor>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    parse_input(&contents).with_context(|| format!("in {}", path.display()))
}

/// Uses `name` as given if it exists, otherwise looks for it under `input/`.
pub fn resolve_input_path(name: &str) -> Result<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.exists() {
        return Ok(direct);
    }
    let fallback = Path::new("input").join(name);
    if fallback.exists() {
        return Ok(fallback);
    }
    bail!("File {} not found", name)
}

/// `input/x.txt` becomes `output/x_out.txt`. Every `input` and `.txt` in
/// the path is replaced, not only the last component.
pub fn default_output_path(input: &Path) -> PathBuf {
    let s = input.to_string_lossy();
    PathBuf::from(s.replace("input", "output").replace(".txt", "_out.txt"))
}

pub fn write_report(path: &Path, mlfq: &Mlfq) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }

    let averages = mlfq.averages()?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().replace("_out", ""))
        .unwrap_or_default();

    let mut completed: Vec<_> = mlfq.completed().collect();
    completed.sort_by(|a, b| a.id().cmp(b.id()));

    let mut out = String::new();
    out.push_str(&format!("# file: {}\n", name));
    out.push_str("# id; BT; AT; Q; Pr; WT; CT; RT; TAT\n");
    for p in completed {
        out.push_str(&format!(
            "{};{};{};{};{};{};{};{};{}\n",
            p.id(),
            p.burst_time(),
            p.arrival_time(),
            p.display_level(),
            p.priority(),
            p.waiting_time().unwrap_or(0),
            p.finish_time().unwrap_or(0),
            p.response_time().unwrap_or(0),
            p.turnaround_time().unwrap_or(0)
        ));
    }
    out.push_str(&format!(
        "WT={:.1};CT={:.1};RT={:.1};TAT={:.1};\n",
        averages.waiting, averages.completion, averages.response, averages.turnaround
    ));

    let mut file =
        fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(out.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
