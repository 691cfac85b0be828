// crates/conff-cli/src/main.rs
use clap::Parser;
use conff_cli::{init_logging, run, Args, Options};

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let options = match Options::from_args_and_config(args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&options) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
