use std::path::PathBuf;

use anyhow::{Result, anyhow};
use post_fx_pipeline::{dsl, renderer};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Clone)]
struct Cli {
    input: Option<PathBuf>,
    frame_json: Option<PathBuf>,
    output: Option<PathBuf>,
    depth: Option<PathBuf>,
    normals: Option<PathBuf>,
}

const USAGE: &str = "usage: post-fx-pipeline --input <img> --frame-json <frame.json> --output <out.png|out.exr> [--depth <img>] [--normals <img>]";

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let slot = match flag {
            "--input" | "-i" => &mut cli.input,
            "--frame-json" => &mut cli.frame_json,
            "--output" | "-o" => &mut cli.output,
            "--depth" => &mut cli.depth,
            "--normals" => &mut cli.normals,
            "--help" | "-h" => return Err(anyhow!(USAGE)),
            other => return Err(anyhow!("unknown argument: {other}\n{USAGE}")),
        };
        let Some(v) = args.get(i + 1) else {
            return Err(anyhow!("missing value for {flag}"));
        };
        *slot = Some(PathBuf::from(v));
        i += 2;
    }
    Ok(cli)
}

fn run(cli: Cli) -> Result<()> {
    let input = cli.input.ok_or_else(|| anyhow!("--input is required\n{USAGE}"))?;
    let frame_path = cli
        .frame_json
        .ok_or_else(|| anyhow!("--frame-json is required\n{USAGE}"))?;
    let output = cli.output.ok_or_else(|| anyhow!("--output is required\n{USAGE}"))?;

    let frame = dsl::load_frame_from_path(&frame_path)?;
    let files = renderer::FrameFiles {
        input,
        depth: cli.depth,
        normals: cli.normals,
    };
    renderer::render_frame_to_file(&frame, &files, &output)?;
    println!("saved: {}", output.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&args)?;
    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_all_flags() {
        let cli = parse_cli(&args(&[
            "--input", "in.png", "--frame-json", "f.json", "--output", "out.exr", "--depth",
            "d.exr", "--normals", "n.png",
        ]))
        .unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("in.png")));
        assert_eq!(cli.output, Some(PathBuf::from("out.exr")));
        assert_eq!(cli.normals, Some(PathBuf::from("n.png")));
    }

    #[test]
    fn rejects_unknown_and_dangling_flags() {
        assert!(parse_cli(&args(&["--headless"])).is_err());
        assert!(parse_cli(&args(&["--input"])).is_err());
    }
}
