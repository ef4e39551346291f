use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use amrtui::*;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
        MouseEventKind,
    },
    execute,
    style::Stylize,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "amrtui", version, about = "Terminal browser for multi-resolution grid hierarchies")]
struct Cli {
    /// Container file to open instead of a built-in sample
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Built-in sample to open when no --dataset is given
    #[arg(long, global = true, default_value = DEFAULT_SAMPLE)]
    sample: String,

    /// Color palette (arbre, viridis, magma, gray)
    #[arg(long, global = true, default_value = "arbre")]
    palette: PaletteId,

    /// Cut axis: 0, 1 or 2
    #[arg(long, global = true, default_value_t = 2)]
    axis: usize,

    /// Initial slice coordinate along the cut axis
    #[arg(long, global = true, default_value_t = DEFAULT_COORD)]
    coord: usize,

    /// Refuse hierarchies nested deeper than this
    #[arg(long, global = true, default_value_t = MAX_DEPTH)]
    max_depth: usize,

    /// Decoded grid fields kept in memory (0 disables the cache)
    #[arg(long, global = true, default_value_t = 16)]
    field_cache: usize,

    /// Check header and chunk CRCs while reading
    #[arg(long, global = true)]
    validate: bool,

    /// Write logs here; the browser never logs to the terminal
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Interactive browser (default)
    Browse,

    /// Print the grid hierarchy and exit
    Tree {
        /// Max depth to print (default: unlimited)
        #[arg(long, default_value_t = usize::MAX)]
        depth: usize,
        /// Show edges and cell counts for every grid
        #[arg(long)]
        details: bool,
    },

    /// Print the container header (or a summary for samples)
    Info {
        /// Print raw header JSON as stored in file
        #[arg(long)]
        raw: bool,
        /// Pretty-print header JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Write the selected sample to a container file
    WriteSample {
        out: PathBuf,
        #[arg(long)]
        no_compress: bool,
        /// Skip per-chunk CRCs
        #[arg(long)]
        no_crc: bool,
        #[arg(long)]
        pretty_header: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let interactive = matches!(cli.cmd, None | Some(Cmd::Browse));
    init_logging(cli.log_file.as_deref(), interactive)?;

    let source = match &cli.dataset {
        Some(p) => DatasetSource::Path(p.clone()),
        None => DatasetSource::Sample(cli.sample.clone()),
    };

    match &cli.cmd {
        None | Some(Cmd::Browse) => cmd_browse(&cli, &source),
        Some(Cmd::Tree { depth, details }) => cmd_tree(&cli, &source, *depth, *details),
        Some(Cmd::Info { raw, pretty }) => cmd_info(&cli, &source, *raw, *pretty),
        Some(Cmd::WriteSample {
            out,
            no_compress,
            no_crc,
            pretty_header,
        }) => {
            let opts = WriteOptions {
                compression: !no_compress,
                crc: !no_crc,
                pretty_header: *pretty_header,
                ..WriteOptions::default()
            };
            cmd_write_sample(&cli.sample, out, opts)
        }
    }
}

fn init_logging(log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("amrtui=info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        // Anything written to the terminal would tear the TUI.
        None if interactive => {}
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_source(cli: &Cli, source: &DatasetSource) -> Result<Dataset> {
    let opts = ReadOptions { validate: cli.validate };
    load(source, opts).with_context(|| format!("failed to load dataset {}", source))
}

//
// ===== Commands =====
//

fn cmd_browse(cli: &Cli, source: &DatasetSource) -> Result<()> {
    let dataset = load_source(cli, source)?;
    let settings = ShellSettings {
        palette: cli.palette,
        axis: Axis::from_index(cli.axis)?,
        coord: cli.coord,
        max_depth: cli.max_depth,
        field_cache: cli.field_cache,
    };
    let title = dataset.name().to_string();
    let mut shell = BrowserShell::spawn(Arc::new(dataset), title, settings)?;
    run_tui(&mut shell)
}

fn cmd_tree(cli: &Cli, source: &DatasetSource, depth: usize, details: bool) -> Result<()> {
    let dataset = load_source(cli, source)?;
    let forest = project_with(
        &dataset,
        ProjectOptions {
            max_depth: cli.max_depth,
        },
    )?;

    println!(
        "{} {}",
        dataset.field_name().magenta().bold(),
        format!("grid hierarchy: {}", dataset.name()).white().bold()
    );
    for root in &forest {
        print_node(root, 0, depth, details);
    }
    Ok(())
}

fn fmt_dims(dims: &[usize]) -> String {
    if dims.is_empty() {
        return "[?]".to_string();
    }
    let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
    format!("[{}]", parts.join(" x "))
}

fn fmt_edges(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{:.4}", x)).collect();
    format!("[{}]", parts.join(", "))
}

fn print_node(node: &HierarchyNode, indent: usize, max_depth: usize, details: bool) {
    if indent >= max_depth {
        return;
    }
    let pad = "  ".repeat(indent);
    let name = format!("{:<12}", node.label);
    let name = if node.is_leaf() {
        name.white().bold()
    } else {
        name.cyan().bold()
    };

    if details {
        println!(
            "{}{} {} {} {} {}",
            pad,
            name,
            format!("L{:<3}", node.level).yellow().bold(),
            format!("{:<14}", fmt_dims(&node.dims)).dim(),
            format!("left={}", fmt_edges(&node.bounds.left)).dim(),
            format!("right={}", fmt_edges(&node.bounds.right)).dim(),
        );
    } else {
        println!(
            "{}{} {} {}",
            pad,
            name,
            format!("L{:<3}", node.level).yellow().bold(),
            fmt_dims(&node.dims).dim(),
        );
    }

    for ch in &node.children {
        print_node(ch, indent + 1, max_depth, details);
    }
}

fn cmd_info(cli: &Cli, source: &DatasetSource, raw: bool, pretty: bool) -> Result<()> {
    let path = match source {
        DatasetSource::Path(p) => p,
        DatasetSource::Sample(_) => {
            let dataset = load_source(cli, source)?;
            println!("{} {}", "sample".cyan().bold(), dataset.name().white().bold());
            println!("{} {}", "field".cyan().bold(), dataset.field_name().green().bold());
            println!("{} {}", "grids".cyan().bold(), dataset.grid_count());
            println!("{} {}", "roots".cyan().bold(), dataset.roots().len());
            return Ok(());
        }
    };

    if cli.validate {
        // Decode every chunk so payload CRCs are checked too.
        let dataset = load_source(cli, source)?;
        for id in dataset.grid_ids() {
            dataset
                .field(id)
                .with_context(|| format!("validate failed at grid {}", id))?;
        }
    }

    let (hdr, header_len, raw_json) = read_header_only(path, ReadOptions { validate: true })?;

    println!("{} {}", "file".cyan().bold(), path.display().to_string().white().bold());
    println!("{} {}", "magic".cyan().bold(), hdr.magic.as_str().green().bold());
    println!(
        "{} {} {}",
        "header".cyan().bold(),
        "len".cyan().bold(),
        format!("{header_len} bytes").white().bold()
    );

    if raw {
        if pretty {
            let v: serde_json::Value = serde_json::from_str(&raw_json)?;
            println!("{}", serde_json::to_string_pretty(&v)?);
        } else {
            println!("{}", raw_json);
        }
        return Ok(());
    }

    println!("{} {}", "dataset".cyan().bold(), hdr.dataset.as_str().white().bold());
    println!("{} {}", "field".cyan().bold(), hdr.field.as_str().green().bold());
    println!("{} {}", "created".cyan().bold(), hdr.created_utc.as_str().dim());
    println!("{} {}", "grids".cyan().bold(), hdr.grids.len());
    for g in &hdr.grids {
        let parent = g.parent.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} {} {} {} {}",
            format!("#{:<4}", g.id).white().bold(),
            format!("parent={:<4}", parent).dim(),
            format!("L{:<3}", g.level).yellow().bold(),
            format!("comp={:<5}", g.compression).dim(),
            format!("csize={}", g.csize).dim(),
            format!("crc32={:08X}", g.crc32).green().bold(),
        );
    }
    Ok(())
}

fn cmd_write_sample(sample: &str, out: &Path, opts: WriteOptions) -> Result<()> {
    let dataset = load_sample(sample)?;
    write_dataset(out, &dataset, dataset.name(), opts)
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!(sample = dataset.name(), out = %out.display(), "sample written");
    println!("{} {}", "wrote".green().bold(), out.display().to_string().white().bold());
    Ok(())
}

//
// ===== Interactive browser =====
//

fn key_action(code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }
    let action = match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Up => Action::Up,
        KeyCode::Down => Action::Down,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Home => Action::Home,
        KeyCode::End => Action::End,
        KeyCode::Right => Action::Expand,
        KeyCode::Left => Action::Collapse,
        KeyCode::Char('x') => Action::SetAxis(Axis::X),
        KeyCode::Char('y') => Action::SetAxis(Axis::Y),
        KeyCode::Char('z') => Action::SetAxis(Axis::Z),
        KeyCode::Char('+') | KeyCode::Char('=') => Action::CoordStep(1),
        KeyCode::Char('-') => Action::CoordStep(-1),
        KeyCode::Char(']') => Action::CoordPage(1),
        KeyCode::Char('[') => Action::CoordPage(-1),
        KeyCode::Char('p') => Action::NextPalette,
        KeyCode::Char('l') => Action::LockRange,
        KeyCode::Char('u') => Action::UnlockRange,
        _ => return None,
    };
    Some(action)
}

/// Wheel scrolls the tree selection; other input besides keys just triggers a redraw.
fn event_action(ev: Event) -> Option<Action> {
    match ev {
        Event::Key(KeyEvent { kind: KeyEventKind::Release, .. }) => None,
        Event::Key(KeyEvent { code, modifiers, .. }) => key_action(code, modifiers),
        Event::Mouse(me) => match me.kind {
            MouseEventKind::ScrollUp => Some(Action::Up),
            MouseEventKind::ScrollDown => Some(Action::Down),
            _ => None,
        },
        _ => None,
    }
}

fn run_tui(shell: &mut BrowserShell) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    execute!(stdout, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut term = Terminal::new(backend)?;

    let res = (|| -> Result<()> {
        while !shell.should_quit() {
            shell.refresh();
            term.draw(|f| ui::draw(f, shell))?;

            if event::poll(Duration::from_millis(120))? {
                if let Some(action) = event_action(event::read()?) {
                    shell.handle(action);
                }
            }
        }
        Ok(())
    })();

    disable_raw_mode()?;
    execute!(term.backend_mut(), DisableMouseCapture)?;
    execute!(term.backend_mut(), LeaveAlternateScreen)?;
    term.show_cursor()?;

    res
}
