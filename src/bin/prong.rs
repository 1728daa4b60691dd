use anyhow::{Context, Result};
use prong::schema::{self, Kind, Labels, Value};
use prong::set::IntSet;
use prong::{data_type, discriminate, disjunctions, Discrimination, Options};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
  name = "prong",
  about = "Reports discriminators for schema disjunctions"
)]
struct Opt {
  /// Show information on all disjunctions, not just imperfect ones
  #[structopt(short = "a", long = "all")]
  all: bool,

  /// Print a trace of the discrimination search to stderr
  #[structopt(short = "v", long = "verbose")]
  verbose: bool,

  /// Discriminate a single expression instead of walking packages
  #[structopt(short = "e", long = "expr")]
  expr: Option<String>,

  /// Check a JSON value from a file against the tree (requires -e)
  #[structopt(short = "c", long = "check", parse(from_os_str))]
  check: Option<PathBuf>,

  /// Merge compatible arms when no perfect discriminator can be found
  #[structopt(short = "m")]
  merge_imperfect: bool,

  /// Merge compatible arms even when the discriminator is perfect
  #[structopt(short = "M")]
  merge_always: bool,

  /// Show the merged data type for every merged group
  #[structopt(short = "t", long = "types")]
  types: bool,

  /// Keep going over remaining packages after an error
  #[structopt(long = "continue-on-error")]
  continue_on_error: bool,

  /// Schema package files (YAML mapping definition names to sources)
  #[structopt(parse(from_os_str))]
  packages: Vec<PathBuf>,
}

/// A schema package: named definitions in source form.
#[derive(Debug, Deserialize)]
struct Package {
  definitions: BTreeMap<String, String>,
}

fn main() {
  let opt = match Opt::from_args_safe() {
    Ok(opt) => opt,
    Err(err) => {
      if err.use_stderr() {
        eprintln!("{}", err.message);
        process::exit(2);
      }
      // Help and version output exit successfully.
      err.exit();
    }
  };
  if opt.check.is_some() && opt.expr.is_none() {
    eprintln!("prong: -c requires -e");
    process::exit(2);
  }
  if opt.expr.is_none() && opt.packages.is_empty() {
    eprintln!("usage: prong [flags] [package...]");
    process::exit(2);
  }
  process::exit(run(&opt));
}

fn run(opt: &Opt) -> i32 {
  if let Some(expr) = &opt.expr {
    return match run_expr(opt, expr) {
      Ok(()) => 0,
      Err(err) => {
        eprintln!("prong: {:#}", err);
        1
      }
    };
  }
  let mut reporter = Reporter { printed: false };
  for path in &opt.packages {
    if let Err(err) = run_package(opt, &mut reporter, path) {
      eprintln!("prong: {}: {:#}", path.display(), err);
      if !opt.continue_on_error {
        return 1;
      }
    }
  }
  0
}

fn run_expr(opt: &Opt, expr: &str) -> Result<()> {
  let v = schema::parse(expr).context("cannot parse expression")?;
  let arms = disjunctions(&v);
  if opt.verbose {
    print_arms(&arms);
  }
  let d = discriminate_arms(opt, &arms);
  if opt.types || opt.verbose {
    print_merged_types(&arms, &d.groups);
  }
  if !d.perfect {
    println!("discriminator is imperfect");
  }
  print!("{}", d.node);

  if let Some(path) = &opt.check {
    let file = File::open(path)
      .with_context(|| format!("cannot open {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_reader(file)
      .with_context(|| format!("cannot read {}", path.display()))?;
    let chosen = d.node.check(&Value::from_json(&json));
    println!("chosen: {}", chosen);
  }
  Ok(())
}

fn run_package(opt: &Opt, reporter: &mut Reporter, path: &PathBuf) -> Result<()> {
  let file = File::open(path)
    .with_context(|| format!("cannot open {}", path.display()))?;
  let pkg: Package = serde_yaml::from_reader(file)
    .with_context(|| format!("cannot load package {}", path.display()))?;
  for (name, source) in &pkg.definitions {
    let v = schema::parse(source)
      .with_context(|| format!("cannot parse definition {}", name))?;
    reporter.walk(opt, name, &v);
  }
  Ok(())
}

/// Runs the discrimination, retrying with merging when requested and
/// the plain search came up imperfect.
fn discriminate_arms(opt: &Opt, arms: &[Value]) -> Discrimination {
  let d = discriminate_once(opt, arms, opt.merge_always);
  if d.perfect || !opt.merge_imperfect {
    return d;
  }
  discriminate_once(opt, arms, true)
}

fn discriminate_once(opt: &Opt, arms: &[Value], merge: bool) -> Discrimination {
  let mut stderr = io::stderr();
  let log_to: Option<&mut dyn io::Write> = if opt.verbose {
    Some(&mut stderr)
  } else {
    None
  };
  discriminate(
    arms,
    Options {
      log_to,
      merge_compatible: merge,
    },
  )
}

fn print_arms(arms: &[Value]) {
  for (i, arm) in arms.iter().enumerate() {
    println!("{}: {}", i, arm);
  }
}

fn print_merged_types(arms: &[Value], groups: &[IntSet]) {
  for group in groups {
    if group.len() < 2 {
      continue;
    }
    let members: Vec<Value> =
      group.values().iter().map(|&i| arms[i].clone()).collect();
    println!("merged {} into {}", group, data_type(&members));
  }
}

/// Walks every struct field of a definition and reports the fields
/// whose value is a disjunction.
struct Reporter {
  printed: bool,
}

impl Reporter {
  fn walk(&mut self, opt: &Opt, path: &str, v: &Value) {
    if !v.incomplete_kind().intersects(Kind::STRUCT) {
      return;
    }
    for field in v.fields(Labels::all()) {
      let field_path = format!("{}.{}", path, field.name);
      let arms = disjunctions(&field.value);
      if arms.len() > 1 {
        let d = discriminate_arms(opt, &arms);
        if opt.all || !d.perfect {
          if self.printed {
            println!();
          }
          self.printed = true;
          println!("{}:", field_path);
          if opt.verbose {
            print_arms(&arms);
          }
          if opt.types || opt.verbose {
            print_merged_types(&arms, &d.groups);
          }
          if !d.perfect {
            println!("discriminator is imperfect");
          }
          print!("{}", d.node);
        }
      }
      self.walk(opt, &field_path, &field.value);
    }
  }
}
