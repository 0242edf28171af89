use std::env;
use std::fs;
use std::process;

fn main() {
  let args: Vec<String> = env::args().collect();
  if args.len() < 2 {
    println!("usage: pl0 file");
    process::exit(1);
  }

  let path = &args[1];
  let source = match fs::read_to_string(path) {
    Ok(source) => source,
    Err(_) => {
      eprintln!("can't open the source file.");
      process::exit(-1);
    }
  };

  let mut ast = match pl0::parse_source(&source, path) {
    Ok(ast) => ast,
    Err(err) => {
      eprintln!("{err}");
      process::exit(-1);
    }
  };

  // Semantic and emission diagnostics are reported but do not fail the
  // process; neither does a runtime fault caught by the generated handler.
  if let Err(err) = pl0::compile_and_run(&mut ast) {
    eprintln!("{err}");
  }
}
