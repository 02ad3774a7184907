//! Reference runs for the optctl KKT solvers.
//!
//! Set `OPTCTL_OUT_DIR` to write the state, control and adjoint histories of
//! every global run, and `OPTCTL_VERBOSE=1` for per-iteration progress.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};
use optctl_core::output::write_history;
use optctl_core::{
    solve, AdvecDiffApp, AdvectionScheme, BlockArity, Discretization, GridParams, Neighbors,
    OptCtlResult, ProblemData, SolveResult, SolverSettings, TriApp, TriContext,
};

/// Minimal stderr logger.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging() {
    let level = match std::env::var("OPTCTL_LOG").as_deref() {
        Ok("debug") => LevelFilter::Debug,
        Ok("warn") => LevelFilter::Warn,
        _ => LevelFilter::Info,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn problem(m: usize, n: usize, nu: f64, alpha: f64, scheme: AdvectionScheme) -> ProblemData {
    let disc = Discretization {
        scheme,
        arity: BlockArity::Four,
    };
    ProblemData::new(GridParams::new(m, n, nu, alpha), disc)
}

fn write_result(dir: &Path, name: &str, res: &SolveResult) -> OptCtlResult<()> {
    std::fs::create_dir_all(dir)?;
    for (field, blocks) in [("u", &res.u), ("v", &res.v), ("w", &res.w)] {
        let path: PathBuf = dir.join(format!("{}.out.{}", name, field));
        let mut writer = BufWriter::new(File::create(&path)?);
        write_history(&mut writer, 1, blocks)?;
    }
    Ok(())
}

fn run_global(name: &str, prob: &ProblemData, settings: &SolverSettings) {
    let grid = &prob.grid;

    println!("\n{}", "=".repeat(60));
    println!("{}", name);
    println!("{}", "=".repeat(60));
    println!("Grid (m x n):     {} x {}", grid.m, grid.n);
    println!("nu, alpha:        {}, {}", grid.nu, grid.alpha);
    println!("Scheme:           {}", prob.discretization.scheme);
    println!();

    let start = Instant::now();
    let result = solve(prob, settings);
    let elapsed = start.elapsed();

    match result {
        Ok(res) => {
            println!("Status:           {}", res.status);
            println!("Iterations:       {}", res.info.iters);
            println!("Residual:         {:.6e}", res.info.residual_norm);
            println!("Solve time:       {:.3} ms", elapsed.as_secs_f64() * 1000.0);
            println!(
                "Time/iteration:   {:.3} ms",
                elapsed.as_secs_f64() * 1000.0 / res.info.iters.max(1) as f64
            );

            if let Ok(dir) = std::env::var("OPTCTL_OUT_DIR") {
                let slug = name.to_lowercase().replace(|c: char| !c.is_ascii_alphanumeric(), "-");
                if let Err(e) = write_result(Path::new(&dir), &slug, &res) {
                    println!("ERROR writing output: {}", e);
                }
            }
        }
        Err(e) => {
            println!("ERROR: {}", e);
        }
    }
}

/// Forward in-time sweeps of the local kernel over the whole history.
fn local_sweeps(app: &mut AdvecDiffApp, sweeps: usize) -> OptCtlResult<f64> {
    let n = app.operators().grid().n;
    let dt = app.operators().grid().dt;
    let mut points: Vec<_> = (0..n).map(|i| app.init(i)).collect();
    let mut worst = 0.0;

    for _ in 0..sweeps {
        worst = 0.0_f64;
        for i in 0..n {
            let ctx = TriContext {
                t: (i + 1) as f64 * dt,
                t_prev: i as f64 * dt,
                t_next: (i + 2) as f64 * dt,
                index: i,
                level: 0,
                homogeneous: false,
            };
            let (before, rest) = points.split_at_mut(i);
            if let Some((cur, after)) = rest.split_first_mut() {
                let nbrs = Neighbors {
                    left: before.last(),
                    right: after.first(),
                    forcing: None,
                };
                let outcome = app.solve(&ctx, &nbrs, cur)?;
                worst = worst.max(outcome.residual_inf);
            }
        }
    }

    for (i, p) in points.iter().enumerate() {
        app.access(i, p);
    }
    Ok(worst)
}

fn run_local(name: &str, prob: &ProblemData, settings: &SolverSettings, sweeps: usize) {
    println!("\n{}", "=".repeat(60));
    println!("{}", name);
    println!("{}", "=".repeat(60));

    let start = Instant::now();
    let result = AdvecDiffApp::new(prob, settings).and_then(|mut app| {
        let worst = local_sweeps(&mut app, sweeps)?;
        Ok((app, worst))
    });
    let elapsed = start.elapsed();

    match result {
        Ok((app, worst)) => {
            let stored = app.solution().iter().filter(|s| s.is_some()).count();
            println!("Sweeps:           {}", sweeps);
            println!("Buffer size:      {} reals", app.buf_size());
            println!("Max local resid:  {:.6e}", worst);
            println!("Stored points:    {}", stored);
            println!("Time:             {:.3} ms", elapsed.as_secs_f64() * 1000.0);
        }
        Err(e) => {
            println!("ERROR: {}", e);
        }
    }
}

fn main() {
    init_logging();

    println!("optctl Reference Runs");
    println!("=====================\n");

    let settings = SolverSettings {
        max_iter: 300,
        tol: 1e-6,
        ..Default::default()
    };

    let prob = problem(12, 4096, 1.5, 0.005, AdvectionScheme::Central);
    run_global("Block GS central (m=12, n=4096)", &prob, &settings);

    let prob = problem(12, 512, 1.5, 0.005, AdvectionScheme::Upwind);
    run_global("Block GS upwind (m=12, n=512)", &prob, &settings);

    let prob = problem(12, 4096, -1.5, 0.005, AdvectionScheme::Central);
    run_global("Block GS ill-posed (nu=-1.5)", &prob, &settings);

    let prob = problem(8, 256, 2.0, 0.005, AdvectionScheme::Upwind);
    run_local("Local kernel upwind (m=8, n=256)", &prob, &settings, 5);

    println!("\n{}", "=".repeat(60));
    println!("Runs complete");
    println!("{}", "=".repeat(60));
}
