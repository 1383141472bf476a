use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ferrosync::{ContextHint, IntPolicy, Scanner, Updater, WordHint, set_int_policy};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

mod template;

use template::render;

#[derive(Parser)]
#[command(name = "ferrosync")]
#[command(about = "Synchronize between TeX sources and typeset output", long_about = None)]
struct Cli {
    /// Use the raw digit scanner instead of strict C-locale parsing.
    #[arg(long, global = true)]
    raw_int: bool,

    /// Print results as JSON instead of the classic result block.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward synchronization: source location to typeset output
    View {
        /// line:column:input, the source position to look up
        #[arg(short = 'i', value_name = "SPEC")]
        input: String,
        /// Path of the output document (pdf/dvi/xdv)
        #[arg(short = 'o', value_name = "FILE")]
        output: PathBuf,
        /// Build directory holding the synctex file, when separate
        #[arg(short = 'd', value_name = "DIR")]
        directory: Option<PathBuf>,
        /// Viewer command template; "-" reads SYNCTEX_VIEWER
        #[arg(short = 'x', value_name = "COMMAND")]
        viewer: Option<String>,
        /// before/offset:middle/after word hint for disambiguation
        #[arg(short = 'H', long = "hint", value_name = "HINT")]
        hint: Option<String>,
    },
    /// Backward synchronization: output point to source location
    Edit {
        /// page:x:y:file, the point under the mouse
        #[arg(short = 'o', value_name = "SPEC")]
        output: String,
        /// Build directory holding the synctex file, when separate
        #[arg(short = 'd', value_name = "DIR")]
        directory: Option<PathBuf>,
        /// Editor command template; "-" reads SYNCTEX_EDITOR
        #[arg(short = 'x', value_name = "COMMAND")]
        editor: Option<String>,
        /// offset:context hint for disambiguation by contents
        #[arg(short = 'H', long = "hint", value_name = "HINT")]
        hint: Option<String>,
    },
    /// Record a dvi/xdv-to-pdf filter's magnification and offsets
    Update {
        /// Path of the output document or of the synctex file itself
        #[arg(short = 'o', value_name = "FILE")]
        output: PathBuf,
        /// Build directory holding the synctex file, when separate
        #[arg(short = 'd', value_name = "DIR")]
        directory: Option<PathBuf>,
        /// Additional magnification
        #[arg(short = 'm', value_name = "NUMBER")]
        magnification: Option<String>,
        /// Horizontal offset
        #[arg(short = 'x', value_name = "DIMENSION")]
        x_offset: Option<String>,
        /// Vertical offset
        #[arg(short = 'y', value_name = "DIMENSION")]
        y_offset: Option<String>,
    },
}

#[derive(Serialize)]
struct ViewResult {
    page: i32,
    x: f32,
    y: f32,
    h: f32,
    v: f32,
    width: f32,
    height: f32,
}

#[derive(Serialize)]
struct EditResult {
    input: String,
    line: i32,
    column: i32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    if cli.raw_int {
        set_int_policy(IntPolicy::Raw2);
    }
    match cli.command {
        Commands::View {
            input,
            output,
            directory,
            viewer,
            hint,
        } => view(&input, &output, directory, viewer, hint, cli.json),
        Commands::Edit {
            output,
            directory,
            editor,
            hint,
        } => edit(&output, directory, editor, hint, cli.json),
        Commands::Update {
            output,
            directory,
            magnification,
            x_offset,
            y_offset,
        } => update(&output, directory, magnification, x_offset, y_offset),
    }
}

/// `-d` fallback, then the conventional environment variable.
fn resolve_directory(directory: Option<PathBuf>) -> Option<PathBuf> {
    directory.or_else(|| std::env::var_os("SYNCTEX_BUILD_DIRECTORY").map(PathBuf::from))
}

/// `-x -` means "take the command from the environment".
fn resolve_command(option: Option<String>, env: &str) -> Option<String> {
    match option {
        Some(ref value) if value.as_str() == "-" => std::env::var(env).ok(),
        other => other,
    }
}

/// `line:column:input`; the input path may itself contain colons.
fn parse_view_spec(spec: &str) -> anyhow::Result<(i32, i32, &str)> {
    let mut parts = spec.splitn(3, ':');
    let line = parts
        .next()
        .and_then(|p| p.parse().ok())
        .context("bad -i argument: expected line:column:input")?;
    let column = parts
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(0)
        .max(0);
    let input = parts
        .next()
        .context("bad -i argument: expected line:column:input")?;
    Ok((line, column, input))
}

/// `page:x:y:file`; the file path may itself contain colons.
fn parse_edit_spec(spec: &str) -> anyhow::Result<(i32, f32, f32, &str)> {
    let mut parts = spec.splitn(4, ':');
    let page = parts
        .next()
        .and_then(|p| p.parse().ok())
        .context("bad -o argument: expected page:x:y:file")?;
    let x = parts
        .next()
        .and_then(|p| p.parse().ok())
        .context("bad -o argument: expected page:x:y:file")?;
    let y = parts
        .next()
        .and_then(|p| p.parse().ok())
        .context("bad -o argument: expected page:x:y:file")?;
    let file = parts
        .next()
        .context("bad -o argument: expected page:x:y:file")?;
    Ok((page, x, y, file))
}

/// `before/offset:middle/after`, every piece optional but the shape fixed.
fn parse_word_hint(hint: &str) -> anyhow::Result<WordHint> {
    let (before, rest) = hint.split_once('/').context("bad hint: missing '/'")?;
    let (offset, rest) = rest.split_once(':').context("bad hint: missing ':'")?;
    let (middle, after) = rest.split_once('/').context("bad hint: missing '/'")?;
    Ok(WordHint {
        before: (!before.is_empty()).then(|| before.to_string()),
        offset: offset.parse().unwrap_or(0),
        middle: middle.to_string(),
        after: (!after.is_empty()).then(|| after.to_string()),
    })
}

/// `offset:context`.
fn parse_context_hint(hint: &str) -> anyhow::Result<ContextHint> {
    let (offset, context) = hint.split_once(':').context("bad hint: missing ':'")?;
    Ok(ContextHint {
        offset: offset.parse().unwrap_or(0),
        context: context.to_string(),
    })
}

fn view(
    spec: &str,
    output: &Path,
    directory: Option<PathBuf>,
    viewer: Option<String>,
    hint: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (line, column, input) = parse_view_spec(spec)?;
    let directory = resolve_directory(directory);
    let viewer = resolve_command(viewer, "SYNCTEX_VIEWER");
    let hint = hint.as_deref().map(parse_word_hint).transpose()?;
    let mut scanner = Scanner::new_with_output_file(output, directory.as_deref(), true)
        .with_context(|| format!("no synchronization available for {}", output.display()))?;
    let matched = match &hint {
        Some(hint) => scanner.display_query_with_hint(input, line, column, 0, hint),
        None => scanner.display_query(input, line, column, 0),
    };
    if !matched {
        log::info!("no typeset material for {input}:{line}:{column}");
        return Ok(());
    }
    let hint = hint.unwrap_or_default();
    if let Some(viewer) = viewer {
        let Some(id) = scanner.next_result() else {
            return Ok(());
        };
        let node = scanner.node(id);
        let bindings = vec![
            ("output", output.display().to_string()),
            ("page", (node.page() - 1).to_string()),
            ("page+1", node.page().to_string()),
            ("x", node.visible_h().to_string()),
            ("y", node.visible_v().to_string()),
            ("h", node.box_visible_h().to_string()),
            (
                "v",
                (node.box_visible_v() + node.box_visible_depth()).to_string(),
            ),
            ("width", node.box_visible_width().abs().to_string()),
            (
                "height",
                (node.box_visible_height() + node.box_visible_depth()).max(1.0).to_string(),
            ),
            ("before", hint.before.clone().unwrap_or_default()),
            ("offset", hint.offset.to_string()),
            ("middle", hint.middle.clone()),
            ("after", hint.after.clone().unwrap_or_default()),
        ];
        debug_assert!(bindings.iter().all(|(key, _)| template::KEYS.contains(key)));
        return launch(&render(&viewer, &bindings));
    }
    if json {
        let mut results = Vec::new();
        while let Some(id) = scanner.next_result() {
            let node = scanner.node(id);
            results.push(ViewResult {
                page: node.page(),
                x: node.visible_h(),
                y: node.visible_v(),
                h: node.box_visible_h(),
                v: node.box_visible_v() + node.box_visible_depth(),
                width: node.box_visible_width().abs(),
                height: node.box_visible_height() + node.box_visible_depth(),
            });
        }
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    println!("SyncTeX result begin");
    while let Some(id) = scanner.next_result() {
        let node = scanner.node(id);
        println!("Output:{}", output.display());
        println!("Page:{}", node.page());
        println!("x:{}", node.visible_h());
        println!("y:{}", node.visible_v());
        println!("h:{}", node.box_visible_h());
        println!("v:{}", node.box_visible_v() + node.box_visible_depth());
        println!("W:{}", node.box_visible_width().abs());
        println!("H:{}", node.box_visible_height() + node.box_visible_depth());
        println!("before:{}", hint.before.as_deref().unwrap_or(""));
        println!("offset:{}", hint.offset);
        println!("middle:{}", hint.middle);
        println!("after:{}", hint.after.as_deref().unwrap_or(""));
    }
    println!("SyncTeX result end");
    Ok(())
}

fn edit(
    spec: &str,
    directory: Option<PathBuf>,
    editor: Option<String>,
    hint: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (page, x, y, file) = parse_edit_spec(spec)?;
    let directory = resolve_directory(directory);
    let editor = resolve_command(editor, "SYNCTEX_EDITOR");
    let hint = hint.as_deref().map(parse_context_hint).transpose()?;
    let mut scanner = Scanner::new_with_output_file(file, directory.as_deref(), true)
        .with_context(|| format!("no synchronization available for {file}"))?;
    let matched = match &hint {
        Some(hint) => scanner.edit_query_with_hint(page, x, y, hint),
        None => scanner.edit_query(page, x, y),
    };
    if !matched {
        log::info!("nothing under page {page} ({x}, {y})");
        return Ok(());
    }
    let hint = hint.unwrap_or_default();
    if let Some(editor) = editor {
        let Some(id) = scanner.next_result() else {
            return Ok(());
        };
        let node = scanner.node(id);
        let input = scanner.get_name(node.tag()).unwrap_or_default().to_string();
        let column = node.column().unwrap_or(-1);
        let bindings = vec![
            ("output", file.to_string()),
            ("input", input),
            ("line", (node.line() - 1).max(0).to_string()),
            ("line+1", node.line().to_string()),
            ("column", column.to_string()),
            ("column+1", if column < 0 { "-1".to_string() } else { (column + 1).to_string() }),
            ("offset", hint.offset.to_string()),
            ("context", hint.context.clone()),
        ];
        debug_assert!(bindings.iter().all(|(key, _)| template::KEYS.contains(key)));
        return launch(&render(&editor, &bindings));
    }
    if json {
        let mut results = Vec::new();
        while let Some(id) = scanner.next_result() {
            let node = scanner.node(id);
            results.push(EditResult {
                input: scanner.get_name(node.tag()).unwrap_or_default().to_string(),
                line: node.line(),
                column: node.column().unwrap_or(-1),
            });
        }
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    println!("SyncTeX result begin");
    while let Some(id) = scanner.next_result() {
        let node = scanner.node(id);
        println!("Output:{file}");
        println!("Input:{}", scanner.get_name(node.tag()).unwrap_or_default());
        println!("Line:{}", node.line());
        println!("Column:{}", node.column().unwrap_or(-1));
        println!("Offset:{}", hint.offset);
        println!("Context:{}", hint.context);
    }
    println!("SyncTeX result end");
    Ok(())
}

fn update(
    output: &Path,
    directory: Option<PathBuf>,
    magnification: Option<String>,
    x_offset: Option<String>,
    y_offset: Option<String>,
) -> anyhow::Result<()> {
    let directory = resolve_directory(directory);
    let mut updater = Updater::new_with_output_file(output, directory.as_deref())
        .with_context(|| format!("no synctex file to update for {}", output.display()))?;
    updater.append_magnification(magnification.as_deref().unwrap_or(""));
    updater.append_x_offset(x_offset.as_deref().unwrap_or(""));
    updater.append_y_offset(y_offset.as_deref().unwrap_or(""));
    let appended = updater.finish()?;
    log::info!("appended {appended} byte(s)");
    Ok(())
}

fn launch(command: &str) -> anyhow::Result<()> {
    println!("SyncTeX: Executing");
    println!("{command}");
    let status = Command::new("sh").arg("-c").arg(command).status()?;
    if !status.success() {
        bail!("command exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_spec_splits_on_the_first_two_colons() {
        let (line, column, input) = parse_view_spec("12:3:./dir:with:colons.tex").unwrap();
        assert_eq!((line, column, input), (12, 3, "./dir:with:colons.tex"));
    }

    #[test]
    fn view_spec_tolerates_missing_column() {
        let (line, column, input) = parse_view_spec("12:x:main.tex").unwrap();
        assert_eq!((line, column, input), (12, 0, "main.tex"));
    }

    #[test]
    fn edit_spec_parses_floats() {
        let (page, x, y, file) = parse_edit_spec("3:72.5:144.25:out/main.pdf").unwrap();
        assert_eq!(page, 3);
        assert_eq!((x, y), (72.5, 144.25));
        assert_eq!(file, "out/main.pdf");
    }

    #[test]
    fn edit_spec_rejects_short_input() {
        assert!(parse_edit_spec("3:72.5").is_err());
    }

    #[test]
    fn word_hint_round_trip() {
        let hint = parse_word_hint("foo/3:bar/baz").unwrap();
        assert_eq!(hint.before.as_deref(), Some("foo"));
        assert_eq!(hint.offset, 3);
        assert_eq!(hint.middle, "bar");
        assert_eq!(hint.after.as_deref(), Some("baz"));
    }

    #[test]
    fn word_hint_pieces_may_be_empty() {
        let hint = parse_word_hint("/0:word/").unwrap();
        assert_eq!(hint.before, None);
        assert_eq!(hint.middle, "word");
        assert_eq!(hint.after, None);
    }

    #[test]
    fn context_hint_keeps_the_whole_context() {
        let hint = parse_context_hint("5:some context: with colon").unwrap();
        assert_eq!(hint.offset, 5);
        assert_eq!(hint.context, "some context: with colon");
    }
}
