use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::controller::ViewportController;
use crate::models::{ItemId, LayoutConfig, LayoutItemInput, LayoutMode, MediaDimensions};
use crate::navigation::{Direction, KeyboardNavigator, ScrollContainer};

pub const USAGE: &str = "\
Usage: gallery-viewport [OPTIONS]

Drives a viewport over a synthetic library and reports layout, scroll and
navigation latency.

Options:
  --items <N>              Number of synthetic items (default 20000)
  --mode <MODE>            masonry-v, masonry-h or grid (default masonry-v)
  --width <PX>             Container width (default 1920)
  --viewport-height <PX>   Viewport height (default 1080)
  --runs <N>               Number of runs (default 3)
  --seed <N>               Seed for the synthetic library (default 1)
  --report <PATH>          Write a JSON report to PATH
  -h, --help               Print this help";

/// Upper bound for one relayout or scroll round-trip.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Focus moves per navigation walk.
const NAV_STEPS: usize = 200;

/// Common media shapes `(width, height)` for the synthetic library.
const SHAPES: [(i32, i32); 8] = [
    (1920, 1080),
    (1080, 1920),
    (4000, 3000),
    (3000, 4000),
    (1080, 1080),
    (2560, 1080),
    (800, 1200),
    (1200, 800),
];

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkArgs {
    pub items: usize,
    pub mode: LayoutMode,
    pub width: f64,
    pub viewport_height: f64,
    pub runs: usize,
    pub seed: u64,
    pub report: Option<PathBuf>,
}

impl Default for BenchmarkArgs {
    fn default() -> Self {
        Self {
            items: 20_000,
            mode: LayoutMode::MasonryVertical,
            width: 1920.0,
            viewport_height: 1080.0,
            runs: 3,
            seed: 1,
            report: None,
        }
    }
}

#[derive(Debug)]
struct BenchmarkRun {
    run_index: usize,
    total_height: f64,
    layout_ms: f64,
    frames: usize,
    frame_p50_ms: f64,
    frame_p95_ms: f64,
    frames_over_16ms: usize,
    frames_over_33ms: usize,
    avg_visible: f64,
    max_visible: usize,
    nav_steps: usize,
    nav_p95_ms: f64,
    scroll_messages: u64,
    scrolls_coalesced: u64,
    errors: u64,
}

#[derive(Debug)]
struct BenchmarkAggregate {
    runs: usize,
    avg_layout_ms: f64,
    min_layout_ms: f64,
    max_layout_ms: f64,
    avg_frame_p95_ms: f64,
    avg_nav_p95_ms: f64,
    total_errors: u64,
}

#[derive(Debug)]
struct BenchmarkReport {
    schema_version: u32,
    generated_at_unix_ms: u128,
    benchmark: String,
    mode: LayoutMode,
    items: usize,
    width: f64,
    viewport_height: f64,
    seed: u64,
    runs_requested: usize,
    results: Vec<BenchmarkRun>,
    aggregate: BenchmarkAggregate,
}

/// Parses benchmark flags (without the program name).
///
/// Returns `Ok(None)` when help was requested.
pub fn parse_args<I>(args: I) -> Result<Option<BenchmarkArgs>>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = BenchmarkArgs::default();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--items" => {
                let value = args.next().context("Missing value for --items")?;
                parsed.items = value
                    .parse::<usize>()
                    .context("Failed to parse --items as a non-negative integer")?;
            }
            "--mode" => {
                let value = args.next().context("Missing value for --mode")?;
                parsed.mode = value
                    .parse::<LayoutMode>()
                    .context("Failed to parse --mode")?;
            }
            "--width" => {
                let value = args.next().context("Missing value for --width")?;
                parsed.width = value
                    .parse::<f64>()
                    .context("Failed to parse --width as a number")?;
            }
            "--viewport-height" => {
                let value = args.next().context("Missing value for --viewport-height")?;
                parsed.viewport_height = value
                    .parse::<f64>()
                    .context("Failed to parse --viewport-height as a number")?;
            }
            "--runs" => {
                let value = args.next().context("Missing value for --runs")?;
                parsed.runs = value
                    .parse::<usize>()
                    .context("Failed to parse --runs as a positive integer")?;
            }
            "--seed" => {
                let value = args.next().context("Missing value for --seed")?;
                parsed.seed = value
                    .parse::<u64>()
                    .context("Failed to parse --seed as a non-negative integer")?;
            }
            "--report" => {
                let value = args.next().context("Missing value for --report")?;
                parsed.report = Some(PathBuf::from(value));
            }
            other => bail!("Unknown argument: {other}"),
        }
    }

    if parsed.runs == 0 {
        bail!("--runs must be greater than 0");
    }
    if !parsed.width.is_finite() || parsed.width <= 0.0 {
        bail!("--width must be a positive number");
    }
    if !parsed.viewport_height.is_finite() || parsed.viewport_height <= 0.0 {
        bail!("--viewport-height must be a positive number");
    }

    Ok(Some(parsed))
}

/// Deterministic library of `count` items with mixed shapes.
///
/// Roughly one item in sixteen has unknown dimensions and lays out square.
pub fn synthetic_library(count: usize, seed: u64) -> Vec<LayoutItemInput> {
    (0..count)
        .map(|i| {
            let id = i as ItemId + 1;
            let hash = xxh3_64_with_seed(&(i as u64).to_le_bytes(), seed);
            let dims = if hash % 16 == 0 {
                MediaDimensions::new(id, None, None)
            } else {
                let (width, height) = SHAPES[((hash >> 8) % SHAPES.len() as u64) as usize];
                MediaDimensions::new(id, Some(width), Some(height))
            };
            LayoutItemInput::from(dims)
        })
        .collect()
}

/// Scroll container stand-in that forwards programmatic scrolls to the
/// controller, like a real container's scroll events would.
struct BenchScroller {
    top: Cell<f64>,
    height: f64,
    controller: Rc<ViewportController>,
}

impl ScrollContainer for BenchScroller {
    fn scroll_top(&self) -> f64 {
        self.top.get()
    }

    fn viewport_height(&self) -> f64 {
        self.height
    }

    fn scroll_to(&self, scroll_top: f64) {
        self.top.set(scroll_top);
        self.controller.handle_scroll(scroll_top, self.height);
    }
}

pub fn run_benchmark(args: BenchmarkArgs) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime for benchmark")?;

    let items = synthetic_library(args.items, args.seed);
    info!(
        items = items.len(),
        mode = %args.mode,
        width = args.width,
        runs = args.runs,
        "Starting viewport benchmark"
    );

    let mut runs = Vec::with_capacity(args.runs);
    for run_index in 0..args.runs {
        let run = runtime
            .block_on(run_once(run_index + 1, &args, &items))
            .with_context(|| format!("Benchmark run {} failed", run_index + 1))?;
        info!(
            run = run.run_index,
            layout_ms = run.layout_ms,
            frame_p95_ms = run.frame_p95_ms,
            nav_p95_ms = run.nav_p95_ms,
            "Benchmark run complete"
        );
        runs.push(run);
    }

    let aggregate = build_aggregate(&runs);
    let generated_at_unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock appears to be before Unix epoch")?
        .as_millis();

    let report = BenchmarkReport {
        schema_version: 1,
        generated_at_unix_ms,
        benchmark: "viewport_layout_scroll_nav_v1".to_string(),
        mode: args.mode,
        items: args.items,
        width: args.width,
        viewport_height: args.viewport_height,
        seed: args.seed,
        runs_requested: args.runs,
        results: runs,
        aggregate,
    };

    if let Some(output_path) = &args.report {
        let json = render_report_json(&report);
        fs::write(output_path, json).with_context(|| {
            format!(
                "Failed to write benchmark report to {}",
                output_path.display()
            )
        })?;
        println!("Benchmark report: {}", output_path.display());
    }

    println!(
        "runs={} avg_layout_ms={:.2} min_layout_ms={:.2} max_layout_ms={:.2} avg_frame_p95_ms={:.3} avg_nav_p95_ms={:.3} errors={}",
        report.aggregate.runs,
        report.aggregate.avg_layout_ms,
        report.aggregate.min_layout_ms,
        report.aggregate.max_layout_ms,
        report.aggregate.avg_frame_p95_ms,
        report.aggregate.avg_nav_p95_ms,
        report.aggregate.total_errors
    );
    for run in &report.results {
        println!(
            "run={} height={:.0} layout_ms={:.2} frames={} p50/p95={:.3}/{:.3} over16/33={}/{} visible(avg/max)={:.1}/{} nav_steps={} scrolls(sent/coalesced)={}/{}",
            run.run_index,
            run.total_height,
            run.layout_ms,
            run.frames,
            run.frame_p50_ms,
            run.frame_p95_ms,
            run.frames_over_16ms,
            run.frames_over_33ms,
            run.avg_visible,
            run.max_visible,
            run.nav_steps,
            run.scroll_messages,
            run.scrolls_coalesced
        );
    }

    Ok(if report.aggregate.total_errors > 0 { 1 } else { 0 })
}

async fn run_once(
    run_index: usize,
    args: &BenchmarkArgs,
    items: &[LayoutItemInput],
) -> Result<BenchmarkRun> {
    let config = LayoutConfig {
        mode: args.mode,
        container_width: args.width,
        ..LayoutConfig::default()
    };
    let controller = Rc::new(
        ViewportController::builder()
            .config(config)
            .build()
            .context("Failed to start layout worker")?,
    );
    controller.connect_error(|message| warn!(%message, "Layout error during benchmark"));

    // Initial layout, including the first visible-set query.
    let viewport_height = args.viewport_height;
    let layout_start = Instant::now();
    controller.handle_scroll(0.0, viewport_height);
    controller.set_items(items.to_vec());
    if !controller.settle(SETTLE_TIMEOUT) {
        bail!("Initial layout did not settle within {:?}", SETTLE_TIMEOUT);
    }
    let layout_ms = layout_start.elapsed().as_secs_f64() * 1000.0;
    let total_height = controller.total_height().get();

    // Frame-by-frame sweep, a quarter viewport per frame.
    let step = (viewport_height / 4.0).max(1.0);
    let max_top = (total_height - viewport_height).max(0.0);
    let mut frame_times_ms = Vec::new();
    let mut visible_counts = Vec::new();
    let mut top = 0.0;
    loop {
        let frame_start = Instant::now();
        controller.handle_scroll(top, viewport_height);
        if !controller.settle(SETTLE_TIMEOUT) {
            bail!("Scroll to {top:.0} did not settle");
        }
        frame_times_ms.push(frame_start.elapsed().as_secs_f64() * 1000.0);
        visible_counts.push(controller.visible_items().with(Vec::len));

        if top >= max_top {
            break;
        }
        top = (top + step).min(max_top);
    }

    // Keyboard walk from the top: right, right, down.
    let scroller = Rc::new(BenchScroller {
        top: Cell::new(0.0),
        height: viewport_height,
        controller: Rc::clone(&controller),
    });
    scroller.scroll_to(0.0);
    if !controller.settle(SETTLE_TIMEOUT) {
        bail!("Scroll reset did not settle");
    }
    let navigator = KeyboardNavigator::new(Rc::clone(&controller), scroller.clone());
    navigator.set_items(items.iter().map(|item| item.id).collect());
    navigator.home().await;

    let pattern = [Direction::Right, Direction::Right, Direction::Down];
    let mut nav_times_ms = Vec::new();
    for direction in pattern.iter().cycle().take(NAV_STEPS.min(items.len())) {
        let nav_start = Instant::now();
        if navigator.move_focus(*direction).await.is_none() {
            continue;
        }
        if !controller.settle(SETTLE_TIMEOUT) {
            bail!("Navigation scroll did not settle");
        }
        nav_times_ms.push(nav_start.elapsed().as_secs_f64() * 1000.0);
    }

    let stats = controller.stats();
    controller.dispose();

    let frame_p50_ms = percentile_ms(&frame_times_ms, 0.50);
    let frame_p95_ms = percentile_ms(&frame_times_ms, 0.95);
    let frames_over_16ms = frame_times_ms.iter().filter(|t| **t > 16.67).count();
    let frames_over_33ms = frame_times_ms.iter().filter(|t| **t > 33.33).count();
    let visible_values: Vec<f64> = visible_counts.iter().map(|c| *c as f64).collect();

    Ok(BenchmarkRun {
        run_index,
        total_height,
        layout_ms,
        frames: frame_times_ms.len(),
        frame_p50_ms,
        frame_p95_ms,
        frames_over_16ms,
        frames_over_33ms,
        avg_visible: average(&visible_values),
        max_visible: visible_counts.iter().copied().max().unwrap_or(0),
        nav_steps: nav_times_ms.len(),
        nav_p95_ms: percentile_ms(&nav_times_ms, 0.95),
        scroll_messages: stats.scroll_messages,
        scrolls_coalesced: stats.scrolls_coalesced,
        errors: stats.errors,
    })
}

fn build_aggregate(runs: &[BenchmarkRun]) -> BenchmarkAggregate {
    let layout_values: Vec<f64> = runs.iter().map(|r| r.layout_ms).collect();
    let frame_p95_values: Vec<f64> = runs.iter().map(|r| r.frame_p95_ms).collect();
    let nav_p95_values: Vec<f64> = runs.iter().map(|r| r.nav_p95_ms).collect();

    BenchmarkAggregate {
        runs: runs.len(),
        avg_layout_ms: average(&layout_values),
        min_layout_ms: layout_values.iter().copied().reduce(f64::min).unwrap_or(0.0),
        max_layout_ms: layout_values.iter().copied().reduce(f64::max).unwrap_or(0.0),
        avg_frame_p95_ms: average(&frame_p95_values),
        avg_nav_p95_ms: average(&nav_p95_values),
        total_errors: runs.iter().map(|r| r.errors).sum(),
    }
}

fn render_report_json(report: &BenchmarkReport) -> String {
    let mut out = String::new();
    out.push_str("{\n");
    out.push_str(&format!(
        "  \"schema_version\": {},\n",
        report.schema_version
    ));
    out.push_str(&format!(
        "  \"generated_at_unix_ms\": {},\n",
        report.generated_at_unix_ms
    ));
    out.push_str(&format!(
        "  \"benchmark\": \"{}\",\n",
        escape_json(&report.benchmark)
    ));
    out.push_str(&format!(
        "  \"mode\": \"{}\",\n",
        escape_json(report.mode.as_str())
    ));
    out.push_str(&format!("  \"items\": {},\n", report.items));
    out.push_str(&format!("  \"width\": {:.1},\n", report.width));
    out.push_str(&format!(
        "  \"viewport_height\": {:.1},\n",
        report.viewport_height
    ));
    out.push_str(&format!("  \"seed\": {},\n", report.seed));
    out.push_str(&format!(
        "  \"runs_requested\": {},\n",
        report.runs_requested
    ));

    out.push_str("  \"results\": [\n");
    for (idx, run) in report.results.iter().enumerate() {
        out.push_str("    {\n");
        out.push_str(&format!("      \"run_index\": {},\n", run.run_index));
        out.push_str(&format!(
            "      \"total_height\": {:.3},\n",
            run.total_height
        ));
        out.push_str(&format!("      \"layout_ms\": {:.3},\n", run.layout_ms));
        out.push_str(&format!("      \"frames\": {},\n", run.frames));
        out.push_str(&format!(
            "      \"frame_p50_ms\": {:.3},\n",
            run.frame_p50_ms
        ));
        out.push_str(&format!(
            "      \"frame_p95_ms\": {:.3},\n",
            run.frame_p95_ms
        ));
        out.push_str(&format!(
            "      \"frames_over_16ms\": {},\n",
            run.frames_over_16ms
        ));
        out.push_str(&format!(
            "      \"frames_over_33ms\": {},\n",
            run.frames_over_33ms
        ));
        out.push_str(&format!("      \"avg_visible\": {:.3},\n", run.avg_visible));
        out.push_str(&format!("      \"max_visible\": {},\n", run.max_visible));
        out.push_str(&format!("      \"nav_steps\": {},\n", run.nav_steps));
        out.push_str(&format!("      \"nav_p95_ms\": {:.3},\n", run.nav_p95_ms));
        out.push_str(&format!(
            "      \"scroll_messages\": {},\n",
            run.scroll_messages
        ));
        out.push_str(&format!(
            "      \"scrolls_coalesced\": {},\n",
            run.scrolls_coalesced
        ));
        out.push_str(&format!("      \"errors\": {}\n", run.errors));
        out.push_str("    }");
        if idx + 1 < report.results.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("  ],\n");

    let aggregate = &report.aggregate;
    out.push_str("  \"aggregate\": {\n");
    out.push_str(&format!("    \"runs\": {},\n", aggregate.runs));
    out.push_str(&format!(
        "    \"avg_layout_ms\": {:.3},\n",
        aggregate.avg_layout_ms
    ));
    out.push_str(&format!(
        "    \"min_layout_ms\": {:.3},\n",
        aggregate.min_layout_ms
    ));
    out.push_str(&format!(
        "    \"max_layout_ms\": {:.3},\n",
        aggregate.max_layout_ms
    ));
    out.push_str(&format!(
        "    \"avg_frame_p95_ms\": {:.3},\n",
        aggregate.avg_frame_p95_ms
    ));
    out.push_str(&format!(
        "    \"avg_nav_p95_ms\": {:.3},\n",
        aggregate.avg_nav_p95_ms
    ));
    out.push_str(&format!(
        "    \"total_errors\": {}\n",
        aggregate.total_errors
    ));
    out.push_str("  }\n");
    out.push_str("}\n");
    out
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn percentile_ms(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let clamped = p.clamp(0.0, 1.0);
    let idx = ((sorted.len() - 1) as f64 * clamped).round() as usize;
    sorted[idx]
}

fn escape_json(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\u{:04x}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}
